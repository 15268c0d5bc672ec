//! 翻译任务服务
//!
//! 把切分、状态存储、批次编排和重组串成一个可恢复的任务：
//!
//! 1. 打开任务目录
//! 2. 校验源文档指纹；已有单元列表时直接复用，否则按任务记录的切分设置提取单元并保存
//! 3. 编排器处理尚未完成的单元
//! 4. 用（可能不完整的）结果映射重组文档
//!
//! 中途中断后用同一个任务标识再次调用 [`TranslationService::run_job`]
//! 即可从最后一个检查点继续。

use std::path::PathBuf;

use super::orchestrator::{BatchOrchestrator, OrchestratorConfig, OrchestratorStatsSnapshot};
use super::transform::Transform;
use crate::translation::config::{ConfigManager, TranslationConfig};
use crate::translation::document::Document;
use crate::translation::error::{helpers, TranslationError, TranslationResult};
use crate::translation::pipeline::{
    extract_units, Provenance, ProvenanceIndex, Reassembler, ResultMap, Segmenter, Unit,
    UnitIdCounter,
};
use crate::translation::storage::{
    JobMetadata, JobProgress, JobStateStore, SegmentationSettings,
};

/// 一次任务运行的结果
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// 重组后的文档，未翻译的单元保留原文
    pub document: Document,
    pub results: ResultMap,
    pub total: usize,
    pub completed: usize,
}

impl JobOutcome {
    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }

    /// 没有译文的单元数
    pub fn missing(&self) -> usize {
        self.total.saturating_sub(self.completed)
    }
}

/// 翻译任务服务
pub struct TranslationService {
    config: TranslationConfig,
    segmenter: Segmenter,
    orchestrator: BatchOrchestrator,
}

impl TranslationService {
    /// 使用给定配置创建服务
    pub fn new(config: TranslationConfig) -> TranslationResult<Self> {
        config.validate()?;

        let segmenter = config.segmenter();
        let orchestrator = BatchOrchestrator::new(OrchestratorConfig::from(&config));

        tracing::info!(
            "翻译服务已创建: {} -> {}，任务目录 {}",
            config.source_lang,
            config.target_lang,
            config.job_root().display()
        );

        Ok(Self {
            config,
            segmenter,
            orchestrator,
        })
    }

    /// 从配置文件和环境变量创建服务
    pub fn from_env() -> TranslationResult<Self> {
        Self::from_manager(&ConfigManager::new()?)
    }

    /// 使用配置管理器中已经加载好的配置
    pub fn from_manager(manager: &ConfigManager) -> TranslationResult<Self> {
        Self::new(manager.get_config().clone())
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn stats(&self) -> OrchestratorStatsSnapshot {
        self.orchestrator.stats().snapshot()
    }

    fn job_dir(&self, job_id: &str) -> PathBuf {
        self.config.job_root().join(job_id)
    }

    /// 运行（或恢复）一个任务
    pub async fn run_job<T>(
        &self,
        job_id: &str,
        document: &Document,
        metadata: JobMetadata,
        transform: &T,
    ) -> TranslationResult<JobOutcome>
    where
        T: Transform + ?Sized,
    {
        let mut store = JobStateStore::open(self.config.job_root(), job_id)?;
        let plan = self.prepare_units(&mut store, document, metadata)?;

        let results = self
            .orchestrator
            .run(&mut store, &plan.units, transform)
            .await?;

        let segmenter = plan.settings.segmenter();
        let mut reassembler = Reassembler::new(&segmenter, plan.settings.mode);
        if self.config.verify_unit_text {
            reassembler = reassembler.with_units(&plan.units);
        }
        let output = match reassembler.reassemble(document, &results, &plan.provenance) {
            Ok(output) => output,
            Err(e) => {
                store.append_log(&format!("Reassembly failed: {}", e));
                return helpers::log_error(e);
            }
        };

        let total = plan.units.len();
        let completed = plan
            .units
            .iter()
            .filter(|unit| results.contains_key(&unit.id))
            .count();

        if completed < total {
            tracing::warn!("任务 {} 有 {} 个单元未翻译，保留原文", job_id, total - completed);
        }
        store.append_log(&format!(
            "Reassembled document with {}/{} chunks translated",
            completed, total
        ));

        Ok(JobOutcome {
            document: output,
            results,
            total,
            completed,
        })
    }

    /// 读取任务的持久化进度，任务不存在时返回 `None`
    pub fn job_status(&self, job_id: &str) -> TranslationResult<Option<JobProgress>> {
        if !self.job_dir(job_id).is_dir() {
            return Ok(None);
        }

        let mut store = JobStateStore::open(self.config.job_root(), job_id)?;
        store.load_progress()
    }

    /// 读取已保存的单元，来源映射与单元列表对不上时按无旧状态处理
    fn load_saved_units(
        &self,
        store: &JobStateStore,
    ) -> TranslationResult<Option<(Vec<Unit>, Provenance)>> {
        let Some((units, provenance)) = store.load_units()? else {
            return Ok(None);
        };

        let consistent = units.len() == provenance.len()
            && units.iter().all(|unit| provenance.contains_key(&unit.id))
            && ProvenanceIndex::build(&provenance).is_contiguous();
        if !consistent {
            tracing::warn!("任务 {} 的单元列表与来源映射不一致，重新提取", store.job_id());
            store.append_log("Saved chunk list is inconsistent, extracting again");
            return Ok(None);
        }

        Ok(Some((units, provenance)))
    }

    /// 复用已保存的单元，或提取并保存新单元
    ///
    /// 切分设置以任务创建时记录的为准，当前配置只用于新任务。
    fn prepare_units(
        &self,
        store: &mut JobStateStore,
        document: &Document,
        metadata: JobMetadata,
    ) -> TranslationResult<JobPlan> {
        let fingerprint = document.fingerprint();
        let saved_metadata = store.load_metadata()?;

        if let Some(saved) = &saved_metadata {
            if !saved.source_fingerprint.is_empty() && saved.source_fingerprint != fingerprint {
                store.append_log("Source document changed since the job was created");
                return helpers::log_error(TranslationError::InputChanged {
                    job_id: store.job_id().to_string(),
                });
            }
        }

        let current = SegmentationSettings::new(&self.segmenter, self.config.segmentation_mode);
        let recorded = saved_metadata.and_then(|saved| saved.segmentation);
        let settings_known = recorded.is_some();
        let settings = match recorded {
            Some(recorded) if recorded != current => {
                tracing::warn!(
                    "任务 {} 的切分设置与当前配置不同，沿用创建时的设置",
                    store.job_id()
                );
                store.append_log("Keeping segmentation settings recorded at job creation");
                recorded
            }
            Some(recorded) => recorded,
            None => current,
        };
        let metadata = metadata
            .with_fingerprint(fingerprint)
            .with_segmentation(settings.clone());

        if let Some((units, provenance)) = self.load_saved_units(store)? {
            if !settings_known {
                tracing::warn!("任务 {} 缺少切分设置，重新记录元数据", store.job_id());
                store.save_metadata(&metadata)?;
            }

            tracing::info!("恢复任务 {}: {} 个单元", store.job_id(), units.len());
            store.append_log(&format!("Resuming job with {} chunks", units.len()));
            return Ok(JobPlan {
                units,
                provenance,
                settings,
            });
        }

        // 不知道旧单元的切分设置时，已有译文的编号对不上新提取的单元
        if !settings_known && store.paths().translations_file.exists() {
            tracing::warn!("任务 {} 的旧译文无法对应到单元，丢弃", store.job_id());
            store.append_log("Discarding translations without a matching chunk list");
            store.save_results(&ResultMap::new())?;
        }

        let extraction = extract_units(
            document,
            &settings.segmenter(),
            settings.mode,
            &mut UnitIdCounter::new(),
        );

        store.save_units(&extraction.units, &extraction.provenance)?;
        store.save_metadata(&metadata)?;
        store.append_log(&format!(
            "Created job with {} chunks from {} sections",
            extraction.len(),
            document.content_sections().count()
        ));

        Ok(JobPlan {
            units: extraction.units,
            provenance: extraction.provenance,
            settings,
        })
    }
}

/// 一次运行要处理的单元，以及切分它们所用的设置
struct JobPlan {
    units: Vec<Unit>,
    provenance: Provenance,
    settings: SegmentationSettings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::document::Section;

    fn config(root: &std::path::Path) -> TranslationConfig {
        TranslationConfig {
            job_root: root.to_string_lossy().into_owned(),
            max_unit_size: 20,
            retry_base_delay_ms: 1,
            ..TranslationConfig::default_with_lang("en", "de")
        }
    }

    fn document() -> Document {
        Document::new(vec![
            Section::text("a.xhtml", "<p>Hello world.</p><p>Bye.</p>"),
            Section::binary("cover.jpg", vec![0xff, 0xd8]),
        ])
    }

    #[test]
    fn test_from_manager_uses_managed_config() {
        let root = tempfile::tempdir().unwrap();
        let manager = ConfigManager::with_config(config(root.path())).unwrap();

        let service = TranslationService::from_manager(&manager).unwrap();
        assert_eq!(service.config().max_unit_size, 20);
        assert_eq!(service.config().target_lang, "de");
        assert_eq!(service.config().job_root(), root.path());
    }

    #[tokio::test]
    async fn test_inconsistent_saved_units_are_extracted_again() {
        let root = tempfile::tempdir().unwrap();
        let service = TranslationService::new(config(root.path())).unwrap();

        let mut store = JobStateStore::open(root.path(), "job-b").unwrap();
        let orphan = vec![Unit::new(crate::translation::pipeline::UnitId::new(7), "<p>x</p>")];
        store.save_units(&orphan, &Provenance::new()).unwrap();

        let transform = |text: String| async move { Ok::<_, TranslationError>(text) };
        let outcome = service
            .run_job("job-b", &document(), JobMetadata::new("a.epub", "en", "de", "m"), &transform)
            .await
            .unwrap();
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.document, document());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = TranslationConfig {
            batch_size: 0,
            ..TranslationConfig::default()
        };
        assert!(TranslationService::new(config).is_err());
    }

    #[tokio::test]
    async fn test_run_job_translates_and_reports_status() {
        let root = tempfile::tempdir().unwrap();
        let service = TranslationService::new(config(root.path())).unwrap();
        let transform = |text: String| async move {
            Ok::<_, TranslationError>(text.replace("Bye", "Tschüss"))
        };

        assert!(service.job_status("job-a").unwrap().is_none());

        let outcome = service
            .run_job("job-a", &document(), JobMetadata::new("a.epub", "en", "de", "m"), &transform)
            .await
            .unwrap();

        assert!(outcome.is_complete());
        assert_eq!(outcome.total, 2);
        assert_eq!(
            outcome.document.sections[0].content(),
            Some("<p>Hello world.</p><p>Tschüss.</p>")
        );
        assert_eq!(outcome.document.sections[1], document().sections[1]);

        let status = service.job_status("job-a").unwrap().unwrap();
        assert_eq!(status.chunks_total, 2);
        assert_eq!(status.chunks_completed, 2);
    }
}
