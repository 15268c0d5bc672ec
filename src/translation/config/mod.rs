//! 翻译配置管理模块
//!
//! 提供简化的配置管理，支持环境变量、配置文件和默认值

pub mod manager;

// 重新导出主要类型
pub use manager::{ConfigManager, TranslationConfig};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 切分相关
    pub const DEFAULT_MAX_UNIT_SIZE: usize = 10000;
    pub const DEFAULT_BOUNDARY_MARKER: &str = "</p>";

    // 批次处理相关
    pub const DEFAULT_BATCH_SIZE: usize = 10;
    pub const DEFAULT_MAX_ATTEMPTS: usize = 3;
    pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

    // 单元标识前缀，形如 chunk-12
    pub const UNIT_ID_PREFIX: &str = "chunk-";

    // 任务目录下的文件
    pub const STATE_FILE: &str = "job_state.json";
    pub const CHUNKS_FILE: &str = "chunks.json";
    pub const TRANSLATIONS_FILE: &str = "translations.json";
    pub const METADATA_FILE: &str = "job.json";
    pub const PROGRESS_LOG: &str = "progress.log";

    pub const DEFAULT_JOB_ROOT: &str = "./jobs";

    // 承载正文内容的成员扩展名
    pub const CONTENT_EXTENSIONS: &[&str] = &[".html", ".xhtml", ".htm"];

    // 句子切分时不视为句末的缩写（比较时忽略大小写和末尾的点）
    pub const ABBREVIATIONS: &[&str] = &[
        "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "etc", "vs", "e.g", "i.e", "viz", "cf",
        "ch", "p", "pp", "vol", "ex", "no",
    ];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "book-relay.toml",
        ".book-relay.toml",
        "book-relay.json",
        "~/.config/book-relay/config.toml",
        "/etc/book-relay/config.toml",
    ];
}
