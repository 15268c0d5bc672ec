//! 文档重组
//!
//! 对每个正文章节重新运行切分器以恢复提取时的单元边界，再按
//! `(章节, 位置)` 查到单元标识并替换为译文。没有译文的单元保留原文，
//! 透传成员逐字节复制，成员顺序不变。
//!
//! 重新切分得到的单元数与来源映射不一致时直接报错，不做任何猜测。

use std::collections::HashMap;

use super::segmenter::{SegmentationMode, Segmenter};
use super::unit::{ordered_results, Provenance, ProvenanceIndex, ResultMap, Unit, UnitId};
use crate::translation::document::{Document, Section, SectionBody};
use crate::translation::error::{TranslationError, TranslationResult};

/// 文档重组器
pub struct Reassembler<'a> {
    segmenter: &'a Segmenter,
    mode: SegmentationMode,
    expected_text: Option<HashMap<UnitId, &'a str>>,
}

impl<'a> Reassembler<'a> {
    pub fn new(segmenter: &'a Segmenter, mode: SegmentationMode) -> Self {
        Self {
            segmenter,
            mode,
            expected_text: None,
        }
    }

    /// 启用单元文本校验
    ///
    /// 重新切分出的每个单元必须与持久化的单元文本完全一致，
    /// 否则返回 `UnitContentMismatch`。
    pub fn with_units(mut self, units: &'a [Unit]) -> Self {
        self.expected_text = Some(
            units
                .iter()
                .map(|unit| (unit.id, unit.text.as_str()))
                .collect(),
        );
        self
    }

    /// 重组文档，结果映射可以只覆盖部分单元
    pub fn reassemble(
        &self,
        document: &Document,
        results: &ResultMap,
        provenance: &Provenance,
    ) -> TranslationResult<Document> {
        let index = ProvenanceIndex::build(provenance);

        for item in index.items() {
            if !document
                .section(item)
                .is_some_and(|section| section.is_content_bearing())
            {
                return Err(TranslationError::StructuralMismatch {
                    section: item.to_string(),
                    expected: index.count_for(item),
                    found: 0,
                });
            }
        }

        let mut substituted = 0usize;
        let mut sections = Vec::with_capacity(document.sections.len());

        for section in &document.sections {
            let rebuilt = match &section.body {
                SectionBody::Binary(_) => section.clone(),
                SectionBody::Text(content) => {
                    let (text, count) =
                        self.rebuild_section(&section.name, content, results, &index)?;
                    substituted += count;
                    Section::text(section.name.clone(), text)
                }
            };
            sections.push(rebuilt);
        }

        tracing::info!(
            "重组完成: {}/{} 个单元使用译文",
            substituted,
            provenance.len()
        );

        Ok(Document::new(sections))
    }

    fn rebuild_section(
        &self,
        name: &str,
        content: &str,
        results: &ResultMap,
        index: &ProvenanceIndex,
    ) -> TranslationResult<(String, usize)> {
        let pieces = self.segmenter.split_with_mode(content, self.mode);
        let expected = index.count_for(name);

        if pieces.len() != expected {
            return Err(TranslationError::StructuralMismatch {
                section: name.to_string(),
                expected,
                found: pieces.len(),
            });
        }

        // 没有单元的章节（例如只含空白）保持原样
        if pieces.is_empty() {
            return Ok((content.to_string(), 0));
        }

        let mut output = String::with_capacity(content.len());
        let mut substituted = 0;

        for (pos, piece) in pieces.iter().enumerate() {
            let id = index
                .lookup(name, pos)
                .ok_or_else(|| TranslationError::StructuralMismatch {
                    section: name.to_string(),
                    expected,
                    found: pieces.len(),
                })?;

            if let Some(expected_text) = &self.expected_text {
                if expected_text.get(&id).copied() != Some(piece.as_str()) {
                    return Err(TranslationError::UnitContentMismatch {
                        unit: id.to_string(),
                        section: name.to_string(),
                        pos,
                    });
                }
            }

            match results.get(&id) {
                Some(translated) => {
                    output.push_str(translated);
                    substituted += 1;
                }
                None => output.push_str(piece),
            }
        }

        Ok((output, substituted))
    }
}

/// 重组文档
pub fn reassemble(
    document: &Document,
    results: &ResultMap,
    provenance: &Provenance,
    segmenter: &Segmenter,
    mode: SegmentationMode,
) -> TranslationResult<Document> {
    Reassembler::new(segmenter, mode).reassemble(document, results, provenance)
}

/// 按单元标识的数字顺序列出译文（逐页转写的文档按此顺序成页）
pub fn assemble_in_order(results: &ResultMap) -> Vec<String> {
    ordered_results(results)
        .into_iter()
        .map(|(_, text)| text.to_string())
        .collect()
}
