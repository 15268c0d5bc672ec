//! 结构感知的文本切分器
//!
//! 将章节内容切分为有大小上限的翻译单元。算法是纯函数，相同的输入和上限
//! 总是得到相同的单元边界，重组阶段依赖这一点重新恢复单元。
//!
//! ## 算法
//!
//! 1. 按分段标记（默认 `</p>`）切开内容，标记保留在片段末尾
//! 2. 贪心地把片段累积进缓冲区，超过上限时结束当前单元
//! 3. 单个片段本身超过上限时改为按句子切分，再按同样的方式累积
//! 4. 输出剩余缓冲区
//!
//! 所有单元按顺序拼接后与原内容逐字节相同。

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::translation::config::constants;

/// 切分模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationMode {
    /// 按段落和句子切分
    #[default]
    Paragraph,
    /// 整个章节作为一个单元（逐页转写得到的文档）
    WholeSection,
}

/// 文本切分器
#[derive(Debug, Clone)]
pub struct Segmenter {
    boundary_marker: String,
    max_unit_size: usize,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(
            constants::DEFAULT_BOUNDARY_MARKER,
            constants::DEFAULT_MAX_UNIT_SIZE,
        )
    }
}

impl Segmenter {
    pub fn new(boundary_marker: impl Into<String>, max_unit_size: usize) -> Self {
        Self {
            boundary_marker: boundary_marker.into(),
            max_unit_size,
        }
    }

    pub fn max_unit_size(&self) -> usize {
        self.max_unit_size
    }

    pub fn boundary_marker(&self) -> &str {
        &self.boundary_marker
    }

    /// 按模式切分
    pub fn split_with_mode(&self, content: &str, mode: SegmentationMode) -> Vec<String> {
        match mode {
            SegmentationMode::Paragraph => self.split(content),
            SegmentationMode::WholeSection => {
                if content.trim().is_empty() {
                    Vec::new()
                } else {
                    vec![content.to_string()]
                }
            }
        }
    }

    /// 将内容切分为单元
    pub fn split(&self, content: &str) -> Vec<String> {
        let mut units = Vec::new();
        let mut buffer = String::new();
        let mut buffer_len = 0;

        for fragment in self.fragments(content) {
            let fragment_len = char_len(&fragment);

            if buffer_len + fragment_len <= self.max_unit_size {
                buffer.push_str(&fragment);
                buffer_len += fragment_len;
                continue;
            }

            if !buffer.is_empty() {
                units.push(std::mem::take(&mut buffer));
                buffer_len = 0;
            }

            if fragment_len > self.max_unit_size {
                units.extend(self.split_sentences(&fragment));
            } else {
                buffer = fragment;
                buffer_len = fragment_len;
            }
        }

        if !buffer.is_empty() {
            units.push(buffer);
        }

        units
    }

    /// 按句子切分超长片段
    ///
    /// 句号后跟空白和大写字母视为句末，缩写和数字后的句号除外。
    /// 句号留在前一个句子的末尾。单个句子超过上限时原样输出。
    pub fn split_sentences(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut start = 0;

        for candidate in sentence_boundary().find_iter(text) {
            let period = candidate.start();
            if period < start || !is_sentence_end(text, period) {
                continue;
            }
            sentences.push(&text[start..=period]);
            start = period + 1;
        }
        if start < text.len() {
            sentences.push(&text[start..]);
        }

        let mut units = Vec::new();
        let mut buffer = String::new();
        let mut buffer_len = 0;

        for sentence in sentences {
            let sentence_len = char_len(sentence);
            if !buffer.is_empty() && buffer_len + sentence_len > self.max_unit_size {
                units.push(std::mem::take(&mut buffer));
                buffer_len = 0;
            }
            buffer.push_str(sentence);
            buffer_len += sentence_len;
        }

        if !buffer.is_empty() {
            units.push(buffer);
        }

        units
    }

    /// 按分段标记切出片段
    ///
    /// 只含空白的片段并入前一个片段（没有前一个时并入后一个），
    /// 这样拼接结果与原内容完全一致。内容全为空白时不产生片段。
    fn fragments(&self, content: &str) -> Vec<String> {
        let marker = self.boundary_marker.as_str();
        let pieces: Vec<&str> = content.split(marker).collect();
        let last = pieces.len().saturating_sub(1);

        let mut fragments: Vec<String> = Vec::new();
        let mut leading = String::new();

        for (i, piece) in pieces.into_iter().enumerate() {
            let mut fragment = piece.to_string();
            if i < last {
                fragment.push_str(marker);
            }
            if fragment.is_empty() {
                continue;
            }

            if piece.trim().is_empty() {
                match fragments.last_mut() {
                    Some(previous) => previous.push_str(&fragment),
                    None => leading.push_str(&fragment),
                }
                continue;
            }

            if !leading.is_empty() {
                fragment.insert_str(0, &std::mem::take(&mut leading));
            }
            fragments.push(fragment);
        }

        fragments
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn sentence_boundary() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\.\s+[A-Z]").expect("sentence pattern is valid"))
}

/// 判断 `period` 处的句号是否是句末
fn is_sentence_end(text: &str, period: usize) -> bool {
    let before = &text[..period];

    match before.chars().next_back() {
        Some(c) if c.is_ascii_digit() => return false,
        None => return true,
        _ => {}
    }

    let token_start = before
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '.')
        .last()
        .map(|(i, _)| i)
        .unwrap_or(period);
    let token = before[token_start..].trim_matches('.').to_lowercase();

    !constants::ABBREVIATIONS.contains(&token.as_str())
}
