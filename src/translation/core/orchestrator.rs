//! 批次编排器
//!
//! 将待处理单元按原顺序切成固定大小的批次，批次之间严格串行，批次内部并发
//! 调用转换能力并等待全部结束。每个批次结束后把完整的结果映射写入任务
//! 存储，并追加一行进度日志，这就是恢复时的检查点。
//!
//! 单元级失败在这里被吸收：重试耗尽的单元只记录日志，不出现在结果映射里。
//! 持久化失败会直接上抛。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::join_all;
use tokio::time::{sleep, timeout};

use super::retry::RetryPolicy;
use super::transform::{sanitize_fenced_output, Transform};
use crate::translation::config::{constants, TranslationConfig};
use crate::translation::error::{helpers, TranslationError, TranslationResult};
use crate::translation::pipeline::unit::{ResultMap, Unit, UnitId};
use crate::translation::storage::JobStateStore;

/// 编排器配置
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// 每批并发的单元数
    pub batch_size: usize,
    pub retry: RetryPolicy,
    /// 单次尝试的超时，超时按失败处理
    pub attempt_timeout: Option<Duration>,
    /// 去掉输出外层的代码围栏
    pub strip_code_fences: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_size: constants::DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::default(),
            attempt_timeout: None,
            strip_code_fences: false,
        }
    }
}

impl From<&TranslationConfig> for OrchestratorConfig {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            retry: config.retry_policy(),
            attempt_timeout: config.attempt_timeout(),
            strip_code_fences: config.strip_code_fences,
        }
    }
}

/// 单个单元的处理结果
#[derive(Debug, Clone)]
pub enum UnitOutcome {
    Translated {
        id: UnitId,
        text: String,
    },
    Failed {
        id: UnitId,
        attempts: usize,
        error: TranslationError,
    },
}

/// 编排统计
#[derive(Debug, Default)]
pub struct OrchestratorStats {
    /// 提交给转换能力的单元数
    pub submitted: AtomicUsize,
    pub translated: AtomicUsize,
    /// 重试耗尽的单元数
    pub failed: AtomicUsize,
    /// 已有结果而跳过的单元数
    pub skipped: AtomicUsize,
    pub retries: AtomicUsize,
    pub batches: AtomicUsize,
}

impl OrchestratorStats {
    pub fn snapshot(&self) -> OrchestratorStatsSnapshot {
        OrchestratorStatsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            translated: self.translated.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
        }
    }
}

/// 编排统计的快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorStatsSnapshot {
    pub submitted: usize,
    pub translated: usize,
    pub failed: usize,
    pub skipped: usize,
    pub retries: usize,
    pub batches: usize,
}

/// 批次编排器
#[derive(Debug, Default)]
pub struct BatchOrchestrator {
    config: OrchestratorConfig,
    stats: OrchestratorStats,
}

impl BatchOrchestrator {
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            stats: OrchestratorStats::default(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn stats(&self) -> &OrchestratorStats {
        &self.stats
    }

    /// 处理全部单元，返回累计的结果映射
    ///
    /// 存储中已有结果的单元直接跳过。返回的映射包含之前的全部结果。
    pub async fn run<T>(
        &self,
        store: &mut JobStateStore,
        units: &[Unit],
        transform: &T,
    ) -> TranslationResult<ResultMap>
    where
        T: Transform + ?Sized,
    {
        let total = units.len();
        let mut results = store.load_results()?;

        let pending: Vec<&Unit> = units
            .iter()
            .filter(|unit| !results.contains_key(&unit.id))
            .collect();
        let skipped = total - pending.len();
        self.stats.skipped.fetch_add(skipped, Ordering::Relaxed);

        let batch_size = self.config.batch_size.max(1);
        tracing::info!(
            "开始处理任务 {}: 共 {} 个单元，已完成 {}，待处理 {}，批次大小 {}",
            store.job_id(),
            total,
            skipped,
            pending.len(),
            batch_size
        );

        if pending.is_empty() {
            self.persist_progress(store, total, skipped)?;
            return Ok(results);
        }

        for (batch_index, batch) in pending.chunks(batch_size).enumerate() {
            self.stats.batches.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("批次 {}: {} 个单元", batch_index + 1, batch.len());

            let outcomes = join_all(
                batch
                    .iter()
                    .map(|unit| self.translate_unit(unit, transform)),
            )
            .await;

            for outcome in outcomes {
                match outcome {
                    UnitOutcome::Translated { id, text } => {
                        results.insert(id, text);
                    }
                    UnitOutcome::Failed {
                        id,
                        attempts,
                        error,
                    } => {
                        tracing::error!("单元 {} 在 {} 次尝试后仍然失败: {}", id, attempts, error);
                        store.append_log(&format!(
                            "Failed to translate chunk {} after {} attempts: {}",
                            id, attempts, error
                        ));
                    }
                }
            }

            if let Err(e) = store.save_results(&results) {
                store.append_log(&format!("Failed to save translations: {}", e));
                return helpers::log_error(e);
            }

            let completed = completed_count(units, &results);
            self.persist_progress(store, total, completed)?;
            store.append_log(&format!("Processed {}/{} chunks", completed, total));
        }

        let snapshot = self.stats.snapshot();
        tracing::info!(
            "任务 {} 处理结束: 成功 {}, 失败 {}, 重试 {}",
            store.job_id(),
            snapshot.translated,
            snapshot.failed,
            snapshot.retries
        );

        Ok(results)
    }

    /// 按重试策略处理单个单元
    pub async fn translate_unit<T>(&self, unit: &Unit, transform: &T) -> UnitOutcome
    where
        T: Transform + ?Sized,
    {
        self.stats.submitted.fetch_add(1, Ordering::Relaxed);
        let policy = &self.config.retry;
        let mut attempt = 0;

        loop {
            match self.attempt(unit, transform).await {
                Ok(text) => {
                    if attempt > 0 {
                        tracing::info!("单元 {} 在第 {} 次重试后成功", unit.id, attempt);
                    }
                    self.stats.translated.fetch_add(1, Ordering::Relaxed);
                    return UnitOutcome::Translated { id: unit.id, text };
                }
                Err(error) => {
                    if !policy.should_retry(attempt) {
                        self.stats.failed.fetch_add(1, Ordering::Relaxed);
                        return UnitOutcome::Failed {
                            id: unit.id,
                            attempts: attempt + 1,
                            error,
                        };
                    }

                    let delay = policy.delay_for(attempt);
                    tracing::warn!(
                        "单元 {} 处理失败，{:.1}秒后进行第 {} 次重试: {}",
                        unit.id,
                        delay.as_secs_f32(),
                        attempt + 1,
                        error
                    );
                    self.stats.retries.fetch_add(1, Ordering::Relaxed);
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt<T>(&self, unit: &Unit, transform: &T) -> TranslationResult<String>
    where
        T: Transform + ?Sized,
    {
        let call = transform.transform(unit.text.clone());
        let output = match self.config.attempt_timeout {
            Some(limit) => timeout(limit, call).await??,
            None => call.await?,
        };

        if output.trim().is_empty() && !unit.text.trim().is_empty() {
            return Err(helpers::transform_error("转换结果为空"));
        }

        if self.config.strip_code_fences {
            Ok(sanitize_fenced_output(&output))
        } else {
            Ok(output)
        }
    }

    fn persist_progress(
        &self,
        store: &mut JobStateStore,
        total: usize,
        completed: usize,
    ) -> TranslationResult<()> {
        if let Err(e) = store.save_progress(total, completed) {
            store.append_log(&format!("Failed to save progress: {}", e));
            return helpers::log_error(e);
        }
        Ok(())
    }
}

fn completed_count(units: &[Unit], results: &ResultMap) -> usize {
    units
        .iter()
        .filter(|unit| results.contains_key(&unit.id))
        .count()
}
