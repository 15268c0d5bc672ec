//! 重试策略
//!
//! 编排器对每个单元统一应用同一个策略。尝试次数从 0 开始计数，
//! 第 `attempt` 次失败后等待 `delay_for(attempt)` 再进行下一次尝试。

use std::time::Duration;

use crate::translation::config::constants;

/// 退避方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backoff {
    /// `base * 2^attempt`，可选上限
    Exponential { base: Duration, cap: Option<Duration> },
    /// 固定间隔
    Fixed(Duration),
    /// 立即重试
    None,
}

/// 重试策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 每个单元的最大尝试次数（包括第一次）
    pub max_attempts: usize,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
            backoff: Backoff::Exponential {
                base: constants::DEFAULT_BACKOFF_BASE,
                cap: None,
            },
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// 不等待的策略，测试中常用
    pub fn immediate(max_attempts: usize) -> Self {
        Self::new(max_attempts, Backoff::None)
    }

    /// 第 `attempt` 次尝试失败后的等待时间
    pub fn delay_for(&self, attempt: usize) -> Duration {
        match &self.backoff {
            Backoff::Exponential { base, cap } => {
                let factor = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
                let delay = base.saturating_mul(factor);
                match cap {
                    Some(cap) => delay.min(*cap),
                    None => delay,
                }
            }
            Backoff::Fixed(delay) => *delay,
            Backoff::None => Duration::ZERO,
        }
    }

    /// 第 `attempt` 次失败后是否还有下一次尝试
    pub fn should_retry(&self, attempt: usize) -> bool {
        attempt + 1 < self.max_attempts
    }
}
