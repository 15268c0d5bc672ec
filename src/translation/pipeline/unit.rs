//! 翻译单元与来源映射
//!
//! 单元标识形如 `chunk-<n>`，按数字后缀排序。来源映射记录每个单元来自
//! 哪个章节以及它在该章节单元序列中的位置，重组时据此精确回填。

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::translation::config::constants;
use crate::translation::error::TranslationError;

/// 单元标识
///
/// 比较和排序按数字后缀进行，因此 `chunk-2 < chunk-10`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(u64);

impl UnitId {
    pub fn new(n: u64) -> Self {
        Self(n)
    }

    /// 数字后缀
    pub fn index(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", constants::UNIT_ID_PREFIX, self.0)
    }
}

impl FromStr for UnitId {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(constants::UNIT_ID_PREFIX)
            .and_then(|suffix| suffix.parse::<u64>().ok())
            .map(UnitId)
            .ok_or_else(|| TranslationError::ParseError(format!("无效的单元标识: {}", s)))
    }
}

impl Serialize for UnitId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UnitId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// 单元标识计数器
///
/// 每个任务持有一个实例，在提取过程中显式传递。
#[derive(Debug, Default, Clone)]
pub struct UnitIdCounter {
    next: u64,
}

impl UnitIdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从指定值开始计数
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }

    /// 分配下一个标识
    pub fn next_id(&mut self) -> UnitId {
        let id = UnitId(self.next);
        self.next += 1;
        id
    }

    /// 已分配的数量
    pub fn issued(&self) -> u64 {
        self.next
    }
}

/// 待翻译单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub id: UnitId,
    pub text: String,
}

impl Unit {
    pub fn new(id: UnitId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}

/// 单元来源：章节名与章节内位置
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub item: String,
    pub pos: usize,
}

impl ProvenanceEntry {
    pub fn new(item: impl Into<String>, pos: usize) -> Self {
        Self {
            item: item.into(),
            pos,
        }
    }
}

/// 单元标识到来源的映射
pub type Provenance = BTreeMap<UnitId, ProvenanceEntry>;

/// 单元标识到译文的映射，可以只覆盖部分单元
pub type ResultMap = BTreeMap<UnitId, String>;

/// 来源映射的反向索引：`(章节, 位置) → 单元标识`
#[derive(Debug, Default)]
pub struct ProvenanceIndex {
    by_location: HashMap<(String, usize), UnitId>,
    per_item: HashMap<String, usize>,
}

impl ProvenanceIndex {
    pub fn build(provenance: &Provenance) -> Self {
        let mut index = Self::default();
        for (id, entry) in provenance {
            index
                .by_location
                .insert((entry.item.clone(), entry.pos), *id);
            *index.per_item.entry(entry.item.clone()).or_insert(0) += 1;
        }
        index
    }

    /// 查找指定位置的单元
    pub fn lookup(&self, item: &str, pos: usize) -> Option<UnitId> {
        self.by_location.get(&(item.to_string(), pos)).copied()
    }

    /// 指定章节的单元数
    pub fn count_for(&self, item: &str) -> usize {
        self.per_item.get(item).copied().unwrap_or(0)
    }

    /// 出现过的章节名
    pub fn items(&self) -> impl Iterator<Item = &str> {
        self.per_item.keys().map(String::as_str)
    }

    /// 检查每个章节的位置是否从 0 开始连续且唯一
    pub fn is_contiguous(&self) -> bool {
        self.by_location.len() == self.per_item.values().sum::<usize>()
            && self.per_item.iter().all(|(item, &count)| {
                (0..count).all(|pos| self.by_location.contains_key(&(item.clone(), pos)))
            })
    }
}

/// 按单元标识的数字顺序返回译文
pub fn ordered_results(results: &ResultMap) -> Vec<(UnitId, &str)> {
    // BTreeMap 已按 UnitId 的数字顺序排列
    results
        .iter()
        .map(|(id, text)| (*id, text.as_str()))
        .collect()
}
