//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型和错误处理机制。
//!
//! 错误分为三层：
//! - 单元级（转换失败）：在编排器内部重试并吸收，不会中断任务
//! - 任务级（持久化、结构不一致、输入变化）：必须上抛给调用方
//! - 恢复级（旧状态缺失或损坏）：按“无旧状态”处理，不构成错误

use std::fmt;

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 输入验证错误
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 外部转换服务失败（网络、配额、内容策略等，一律视为暂时性错误）
    #[error("转换失败: {0}")]
    TransformFailed(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    TimeoutError(String),

    /// 持久化错误（磁盘已满、权限不足等）
    #[error("持久化错误: {0}")]
    Persistence(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    ParseError(String),

    /// 重组时章节的单元数与来源映射不一致
    #[error("结构不一致: 章节 {section} 预期 {expected} 个单元，实际切分出 {found} 个")]
    StructuralMismatch {
        section: String,
        expected: usize,
        found: usize,
    },

    /// 重组时单元文本与持久化的单元文本不一致
    #[error("单元内容不一致: {unit} (章节 {section} 位置 {pos})")]
    UnitContentMismatch {
        unit: String,
        section: String,
        pos: usize,
    },

    /// 恢复任务时源文档已发生变化
    #[error("任务 {job_id} 的源文档已变化，无法继续恢复")]
    InputChanged { job_id: String },
}

impl TranslationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::TransformFailed(_) => true,
            TranslationError::TimeoutError(_) => true,
            TranslationError::ConfigError(_) => false,
            TranslationError::InvalidInput(_) => false,
            TranslationError::Persistence(_) => false,
            TranslationError::SerializationError(_) => false,
            TranslationError::ParseError(_) => false,
            TranslationError::StructuralMismatch { .. } => false,
            TranslationError::UnitContentMismatch { .. } => false,
            TranslationError::InputChanged { .. } => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::InvalidInput(_) => ErrorSeverity::Info,
            TranslationError::TransformFailed(_) => ErrorSeverity::Warning,
            TranslationError::TimeoutError(_) => ErrorSeverity::Warning,
            TranslationError::Persistence(_) => ErrorSeverity::Critical,
            TranslationError::SerializationError(_) => ErrorSeverity::Error,
            TranslationError::ParseError(_) => ErrorSeverity::Error,
            TranslationError::StructuralMismatch { .. } => ErrorSeverity::Critical,
            TranslationError::UnitContentMismatch { .. } => ErrorSeverity::Critical,
            TranslationError::InputChanged { .. } => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::InvalidInput(_) => ErrorCategory::Input,
            TranslationError::TransformFailed(_) => ErrorCategory::Service,
            TranslationError::TimeoutError(_) => ErrorCategory::Timeout,
            TranslationError::Persistence(_) => ErrorCategory::Storage,
            TranslationError::SerializationError(_) => ErrorCategory::Serialization,
            TranslationError::ParseError(_) => ErrorCategory::Parsing,
            TranslationError::StructuralMismatch { .. } => ErrorCategory::Structure,
            TranslationError::UnitContentMismatch { .. } => ErrorCategory::Structure,
            TranslationError::InputChanged { .. } => ErrorCategory::Structure,
        }
    }

    /// 创建带上下文的错误
    ///
    /// 结构化变体保持原样，只有携带消息的变体会追加上下文。
    pub fn with_context<T: fmt::Display>(mut self, context: T) -> Self {
        match &mut self {
            TranslationError::ConfigError(msg)
            | TranslationError::InvalidInput(msg)
            | TranslationError::TransformFailed(msg)
            | TranslationError::TimeoutError(msg)
            | TranslationError::Persistence(msg)
            | TranslationError::SerializationError(msg)
            | TranslationError::ParseError(msg) => {
                *msg = format!("{} (上下文: {})", msg, context);
            }
            TranslationError::StructuralMismatch { .. }
            | TranslationError::UnitContentMismatch { .. }
            | TranslationError::InputChanged { .. } => {}
        }

        self
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Service,
    Timeout,
    Storage,
    Serialization,
    Parsing,
    Structure,
}

/// 标准错误转换
impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::Persistence(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ParseError(format!("TOML解析错误: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::TimeoutError(format!("异步操作超时: {}", error))
    }
}

impl From<tempfile::PersistError> for TranslationError {
    fn from(error: tempfile::PersistError) -> Self {
        TranslationError::Persistence(format!("原子替换失败: {}", error.error))
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 记录并返回错误
    pub fn log_error<T>(error: TranslationError) -> TranslationResult<T> {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }

        Err(error)
    }

    /// 创建转换失败错误
    pub fn transform_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::TransformFailed(msg.to_string())
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::ConfigError(msg.to_string())
    }

    /// 创建持久化错误
    pub fn persistence_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::Persistence(msg.to_string())
    }

    /// 创建输入验证错误
    pub fn validation_error<T: fmt::Display>(msg: T) -> TranslationError {
        TranslationError::InvalidInput(msg.to_string())
    }
}
