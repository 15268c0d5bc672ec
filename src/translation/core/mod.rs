//! 翻译任务核心模块
//!
//! 提供可恢复的批次翻译：
//!
//! - **transform**: 外部转换能力的抽象
//! - **retry**: 单元级重试策略
//! - **orchestrator**: 批次串行、批内并发的编排器，每批结束后写检查点
//! - **service**: 把提取、编排和重组串成完整任务
//!
//! ## 模块依赖关系
//!
//! ```text
//! TranslationService (service.rs)
//!     ├── Segmenter / extract_units (pipeline)
//!     ├── JobStateStore (storage)
//!     ├── BatchOrchestrator (orchestrator.rs)
//!     │       ├── RetryPolicy (retry.rs)
//!     │       └── Transform (transform.rs)
//!     └── Reassembler (pipeline)
//! ```

pub mod orchestrator;
pub mod retry;
pub mod service;
pub mod transform;

pub use orchestrator::{
    BatchOrchestrator, OrchestratorConfig, OrchestratorStats, OrchestratorStatsSnapshot,
    UnitOutcome,
};
pub use retry::{Backoff, RetryPolicy};
pub use service::{JobOutcome, TranslationService};
pub use transform::{sanitize_fenced_output, Transform};
