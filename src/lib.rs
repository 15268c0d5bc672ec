//! # Book Relay Library
//!
//! 把长篇结构化文档（电子书容器、逐页转写的文档）切分为有大小上限的单元，
//! 交给外部转换服务翻译，再重组为结构相同的文档。任务状态持久化在任务目录中，
//! 中断后可以从最后一个检查点继续，不会重复已完成的工作。
//!
//! ## 模块组织
//!
//! - `translation` - 切分、状态存储、批次编排和重组
//! - `env` - 类型安全的环境变量
//! - `logging` - 日志初始化

pub mod env;
pub mod logging;
pub mod translation;

// Re-export commonly used items for convenience
pub use translation::{
    Document, JobMetadata, JobOutcome, Section, TranslationConfig, TranslationError,
    TranslationResult, TranslationService,
};
