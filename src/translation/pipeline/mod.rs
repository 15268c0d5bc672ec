//! 翻译管道模块
//!
//! 提供单元切分、提取和重组

pub mod extractor;
pub mod reassembler;
pub mod segmenter;
pub mod unit;

// 重新导出主要类型
pub use extractor::{extract_units, Extraction};
pub use reassembler::{assemble_in_order, reassemble, Reassembler};
pub use segmenter::{SegmentationMode, Segmenter};
pub use unit::{
    ordered_results, Provenance, ProvenanceEntry, ProvenanceIndex, ResultMap, Unit, UnitId,
    UnitIdCounter,
};
