//! 简化的配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::core::retry::{Backoff, RetryPolicy};
use crate::translation::error::{helpers, TranslationError, TranslationResult};
use crate::translation::pipeline::segmenter::{SegmentationMode, Segmenter};

/// 翻译任务配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    // 基础配置
    pub source_lang: String,
    pub target_lang: String,
    pub model: String,
    pub job_root: String,

    // 切分配置
    pub max_unit_size: usize,
    pub boundary_marker: String,
    pub segmentation_mode: SegmentationMode,
    pub content_extensions: Vec<String>,

    // 批次配置
    pub batch_size: usize,
    pub max_retry_attempts: usize,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: Option<u64>,
    pub attempt_timeout_secs: Option<u64>,

    // 功能开关
    pub strip_code_fences: bool,
    pub verify_unit_text: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_lang: "auto".to_string(),
            target_lang: "zh".to_string(),
            model: String::new(),
            job_root: constants::DEFAULT_JOB_ROOT.to_string(),

            max_unit_size: constants::DEFAULT_MAX_UNIT_SIZE,
            boundary_marker: constants::DEFAULT_BOUNDARY_MARKER.to_string(),
            segmentation_mode: SegmentationMode::Paragraph,
            content_extensions: constants::CONTENT_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),

            batch_size: constants::DEFAULT_BATCH_SIZE,
            max_retry_attempts: constants::DEFAULT_MAX_ATTEMPTS,
            retry_base_delay_ms: constants::DEFAULT_BACKOFF_BASE.as_millis() as u64,
            retry_max_delay_ms: None,
            attempt_timeout_secs: None,

            strip_code_fences: false,
            verify_unit_text: true,
        }
    }
}

impl TranslationConfig {
    /// 创建带指定语言的默认配置
    pub fn default_with_lang(source_lang: &str, target_lang: &str) -> Self {
        Self {
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            ..Self::default()
        }
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.batch_size == 0 {
            return Err(TranslationError::ConfigError("批次大小不能为0".to_string()));
        }

        if self.max_unit_size == 0 {
            return Err(TranslationError::ConfigError("单元大小上限不能为0".to_string()));
        }

        if self.max_retry_attempts == 0 {
            return Err(TranslationError::ConfigError("最大尝试次数不能为0".to_string()));
        }

        if self.boundary_marker.is_empty() {
            return Err(helpers::validation_error("分段标记不能为空"));
        }

        if self.job_root.trim().is_empty() {
            return Err(helpers::validation_error("任务根目录不能为空"));
        }

        Ok(())
    }

    /// 应用环境变量覆盖（使用类型安全环境变量系统）
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{storage, translation, EnvVar};

        if let Ok(source_lang) = translation::SourceLang::get() {
            self.source_lang = source_lang;
        }

        if let Ok(target_lang) = translation::TargetLang::get() {
            self.target_lang = target_lang;
        }

        if let Ok(model) = translation::Model::get() {
            self.model = model;
        }

        if let Ok(max_unit_size) = translation::MaxUnitSize::get() {
            self.max_unit_size = max_unit_size;
        }

        if let Ok(batch_size) = translation::BatchSize::get() {
            self.batch_size = batch_size;
        }

        if let Ok(attempts) = translation::MaxRetryAttempts::get() {
            self.max_retry_attempts = attempts;
        }

        if let Ok(timeout) = translation::AttemptTimeout::get() {
            self.attempt_timeout_secs = Some(timeout.as_secs());
        }

        if let Ok(job_root) = storage::JobRoot::get() {
            tracing::info!("环境变量覆盖任务目录: {}", job_root);
            self.job_root = job_root;
        }
    }

    /// 任务根目录（展开 `~`）
    pub fn job_root(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.job_root).as_ref())
    }

    /// 根据配置构造切分器
    pub fn segmenter(&self) -> Segmenter {
        Segmenter::new(self.boundary_marker.clone(), self.max_unit_size)
    }

    /// 根据配置构造重试策略
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retry_attempts,
            backoff: Backoff::Exponential {
                base: Duration::from_millis(self.retry_base_delay_ms),
                cap: self.retry_max_delay_ms.map(Duration::from_millis),
            },
        }
    }

    /// 单次尝试的超时时间
    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_secs.map(Duration::from_secs)
    }
}

/// 简化的配置管理器
pub struct ConfigManager {
    config: TranslationConfig,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new() -> TranslationResult<Self> {
        let mut config = Self::load_config()?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config })
    }

    /// 使用给定配置创建管理器（不读取文件和环境变量）
    pub fn with_config(config: TranslationConfig) -> TranslationResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 获取配置
    pub fn get_config(&self) -> &TranslationConfig {
        &self.config
    }

    /// 从文件加载配置
    fn load_config() -> TranslationResult<TranslationConfig> {
        // 首先尝试加载 .env 文件
        Self::load_dotenv();

        // 查找配置文件
        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(&expanded_path);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(TranslationConfig::default())
    }

    /// 从指定文件加载配置
    pub fn load_from_file(path: &str) -> TranslationResult<TranslationConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| helpers::config_error(format!("读取配置文件失败: {}", e)))?;

        if path.ends_with(".toml") {
            Ok(toml::from_str(&content)?)
        } else {
            serde_json::from_str(&content)
                .map_err(|e| helpers::config_error(format!("解析JSON配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env.development", ".env.production", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> TranslationResult<()> {
        let config = TranslationConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| helpers::config_error(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| helpers::config_error(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TranslationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_retry_attempts, 3);
        assert_eq!(config.boundary_marker, "</p>");
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = TranslationConfig {
            batch_size: 0,
            ..TranslationConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TranslationError::ConfigError(_))
        ));
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book-relay.toml");
        std::fs::write(&path, "batch_size = 4\nsegmentation_mode = \"whole_section\"\n").unwrap();

        let config = ConfigManager::load_from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.segmentation_mode, SegmentationMode::WholeSection);
        assert_eq!(config.max_unit_size, constants::DEFAULT_MAX_UNIT_SIZE);
    }

    #[test]
    fn test_example_config_round_trips_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.toml");
        let path = path.to_str().unwrap();

        ConfigManager::generate_example_config(path).unwrap();
        let loaded = ConfigManager::load_from_file(path).unwrap();
        assert_eq!(loaded.batch_size, TranslationConfig::default().batch_size);
        assert_eq!(loaded.content_extensions.len(), constants::CONTENT_EXTENSIONS.len());
    }

    #[test]
    fn test_retry_policy_uses_configured_delays() {
        let config = TranslationConfig {
            retry_base_delay_ms: 10,
            retry_max_delay_ms: Some(25),
            ..TranslationConfig::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for(0), Duration::from_millis(10));
        assert_eq!(policy.delay_for(2), Duration::from_millis(25));
    }
}
