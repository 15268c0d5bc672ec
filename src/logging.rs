//! 日志初始化
//!
//! 过滤规则优先取 `RUST_LOG`，否则使用 `BOOK_RELAY_LOG_LEVEL`。
//! 多次调用是安全的，后续调用不会生效。

use tracing_subscriber::EnvFilter;

use crate::env::{core, EnvVar};

/// 初始化进程级日志
pub fn init_logging() {
    let level = core::LogLevel::get_or_default("info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let _ = if core::JsonLogs::get_or_default(false) {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
