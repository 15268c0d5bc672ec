//! 翻译模块
//!
//! 采用清晰的模块化架构：
//! - **document**: 文档与章节模型
//! - **pipeline**: 单元切分、提取和重组
//! - **storage**: 任务目录的持久化
//! - **core**: 重试、批次编排和任务服务
//! - **config**: 配置管理
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use book_relay::translation::{
//!     Document, JobMetadata, TranslationConfig, TranslationError, TranslationService,
//! };
//!
//! # async fn example(members: Vec<(String, Vec<u8>)>) -> Result<(), TranslationError> {
//! let config = TranslationConfig::default_with_lang("en", "de");
//! let document = Document::from_members(members, &config.content_extensions);
//! let service = TranslationService::new(config)?;
//!
//! // 任何返回 `TranslationResult<String>` 的异步函数都可以作为转换能力
//! let transform = |text: String| async move { Ok::<_, TranslationError>(text) };
//!
//! let metadata = JobMetadata::new("book.epub", "en", "de", "my-model");
//! let outcome = service.run_job("book-en-de", &document, metadata, &transform).await?;
//! let members = outcome.document.into_members();
//! # let _ = members;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 配置管理模块
pub mod config;

/// 核心模块 - 重试策略、批次编排和任务服务
pub mod core;

/// 文档模型
pub mod document;

/// 错误处理模块 - 统一的错误类型和处理机制
pub mod error;

/// 文本处理管道模块 - 单元切分、提取和重组
pub mod pipeline;

/// 存储管理模块 - 任务状态的原子持久化
pub mod storage;

// ============================================================================
// 核心API导出
// ============================================================================

pub use config::{constants, ConfigManager, TranslationConfig};
pub use self::core::{
    Backoff, BatchOrchestrator, JobOutcome, OrchestratorConfig, RetryPolicy, Transform,
    TranslationService,
};
pub use document::{Document, Section, SectionBody};
pub use error::{ErrorCategory, ErrorSeverity, TranslationError, TranslationResult};
pub use pipeline::{
    assemble_in_order, extract_units, reassemble, Provenance, ResultMap, SegmentationMode,
    Segmenter, Unit, UnitId, UnitIdCounter,
};
pub use storage::{JobMetadata, JobProgress, JobStateStore};
