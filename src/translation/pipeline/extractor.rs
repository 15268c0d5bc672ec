//! 单元提取
//!
//! 按章节出现顺序对正文章节逐一切分，为每个单元分配全局递增的标识，
//! 并记录它来自哪个章节以及在该章节中的位置。

use super::segmenter::{SegmentationMode, Segmenter};
use super::unit::{Provenance, ProvenanceEntry, Unit, UnitIdCounter};
use crate::translation::document::Document;

/// 提取结果
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub units: Vec<Unit>,
    pub provenance: Provenance,
}

impl Extraction {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// 从文档中提取翻译单元
///
/// 透传成员不产生单元。`counter` 由调用方持有，提取结束后停在下一个可用值。
pub fn extract_units(
    document: &Document,
    segmenter: &Segmenter,
    mode: SegmentationMode,
    counter: &mut UnitIdCounter,
) -> Extraction {
    let mut extraction = Extraction::default();

    for section in &document.sections {
        let Some(content) = section.content() else {
            continue;
        };

        let pieces = segmenter.split_with_mode(content, mode);
        tracing::debug!("章节 {} 切分出 {} 个单元", section.name, pieces.len());

        for (pos, text) in pieces.into_iter().enumerate() {
            let id = counter.next_id();
            extraction
                .provenance
                .insert(id, ProvenanceEntry::new(section.name.clone(), pos));
            extraction.units.push(Unit::new(id, text));
        }
    }

    tracing::info!(
        "提取完成: {} 个单元，来自 {} 个正文章节",
        extraction.len(),
        document.content_sections().count()
    );

    extraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::document::Section;
    use crate::translation::pipeline::unit::{ProvenanceIndex, UnitId};

    fn sample_document() -> Document {
        Document::new(vec![
            Section::binary("mimetype", b"application/epub+zip".to_vec()),
            Section::text("a.xhtml", "<p>First.</p><p>Second.</p>"),
            Section::binary("cover.png", vec![1, 2, 3]),
            Section::text("b.xhtml", "<p>Third.</p>"),
        ])
    }

    #[test]
    fn test_units_follow_section_order() {
        let segmenter = Segmenter::new("</p>", 15);
        let mut counter = UnitIdCounter::new();
        let extraction = extract_units(
            &sample_document(),
            &segmenter,
            SegmentationMode::Paragraph,
            &mut counter,
        );

        let texts: Vec<&str> = extraction.units.iter().map(|u| u.text.as_str()).collect();
        assert_eq!(texts, vec!["<p>First.</p>", "<p>Second.</p>", "<p>Third.</p>"]);

        let ids: Vec<UnitId> = extraction.units.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![UnitId::new(0), UnitId::new(1), UnitId::new(2)]);
        assert_eq!(counter.issued(), 3);
    }

    #[test]
    fn test_provenance_positions_restart_per_section() {
        let segmenter = Segmenter::new("</p>", 15);
        let mut counter = UnitIdCounter::new();
        let extraction = extract_units(
            &sample_document(),
            &segmenter,
            SegmentationMode::Paragraph,
            &mut counter,
        );

        assert_eq!(
            extraction.provenance[&UnitId::new(1)],
            ProvenanceEntry::new("a.xhtml", 1)
        );
        assert_eq!(
            extraction.provenance[&UnitId::new(2)],
            ProvenanceEntry::new("b.xhtml", 0)
        );
        assert!(ProvenanceIndex::build(&extraction.provenance).is_contiguous());
    }

    #[test]
    fn test_counter_continues_from_caller_value() {
        let segmenter = Segmenter::default();
        let mut counter = UnitIdCounter::starting_at(40);
        let extraction = extract_units(
            &sample_document(),
            &segmenter,
            SegmentationMode::WholeSection,
            &mut counter,
        );

        assert_eq!(extraction.len(), 2);
        assert_eq!(extraction.units[0].id.to_string(), "chunk-40");
        assert_eq!(extraction.units[1].id.to_string(), "chunk-41");
    }

    #[test]
    fn test_document_without_content_yields_nothing() {
        let document = Document::new(vec![Section::binary("font.otf", vec![0; 4])]);
        let extraction = extract_units(
            &document,
            &Segmenter::default(),
            SegmentationMode::Paragraph,
            &mut UnitIdCounter::new(),
        );
        assert!(extraction.is_empty());
        assert!(extraction.provenance.is_empty());
    }
}
