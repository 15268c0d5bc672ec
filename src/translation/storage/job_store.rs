//! 任务状态存储
//!
//! 每个任务独占一个目录：
//!
//! ```text
//! <root>/<job_id>/
//!     job_state.json     进度 {chunks_total, chunks_completed, last_updated}
//!     chunks.json        单元与来源 {chunks: [[id, text], ...], chapter_map: {id: {item, pos}}}
//!     translations.json  译文 {id: text}
//!     job.json           任务元数据
//!     progress.log       追加写入的进度日志
//! ```
//!
//! 除日志外的文件都通过原子替换写入。读取时文件不存在或内容损坏都按
//! “没有旧状态”处理，其他 I/O 错误上抛。

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::atomic::{write_json_atomic, StagedWrite};
use crate::translation::config::constants;
use crate::translation::error::{helpers, TranslationResult};
use crate::translation::pipeline::segmenter::{SegmentationMode, Segmenter};
use crate::translation::pipeline::unit::{Provenance, ResultMap, Unit, UnitId};

/// 任务进度
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub chunks_total: usize,
    pub chunks_completed: usize,
    pub last_updated: DateTime<Utc>,
}

impl JobProgress {
    pub fn is_complete(&self) -> bool {
        self.chunks_completed >= self.chunks_total
    }
}

/// `chunks.json` 的内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitsFile {
    pub chunks: Vec<(UnitId, String)>,
    pub chapter_map: Provenance,
}

impl UnitsFile {
    pub fn new(units: &[Unit], provenance: &Provenance) -> Self {
        Self {
            chunks: units
                .iter()
                .map(|unit| (unit.id, unit.text.clone()))
                .collect(),
            chapter_map: provenance.clone(),
        }
    }

    pub fn into_parts(self) -> (Vec<Unit>, Provenance) {
        let units = self
            .chunks
            .into_iter()
            .map(|(id, text)| Unit::new(id, text))
            .collect();
        (units, self.chapter_map)
    }
}

/// 任务创建时使用的切分设置
///
/// 单元边界由这些设置决定，恢复和重组都必须沿用创建时的值。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationSettings {
    pub boundary_marker: String,
    pub max_unit_size: usize,
    pub mode: SegmentationMode,
}

impl SegmentationSettings {
    pub fn new(segmenter: &Segmenter, mode: SegmentationMode) -> Self {
        Self {
            boundary_marker: segmenter.boundary_marker().to_string(),
            max_unit_size: segmenter.max_unit_size(),
            mode,
        }
    }

    pub fn segmenter(&self) -> Segmenter {
        Segmenter::new(self.boundary_marker.clone(), self.max_unit_size)
    }
}

/// 任务元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetadata {
    pub input_file: String,
    pub from_lang: String,
    pub to_lang: String,
    pub model: String,
    /// 源文档指纹，恢复时用于确认输入未变
    #[serde(default)]
    pub source_fingerprint: String,
    /// 旧版本写入的元数据没有这一项
    #[serde(default)]
    pub segmentation: Option<SegmentationSettings>,
    pub created_at: DateTime<Utc>,
}

impl JobMetadata {
    pub fn new(
        input_file: impl Into<String>,
        from_lang: impl Into<String>,
        to_lang: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            input_file: input_file.into(),
            from_lang: from_lang.into(),
            to_lang: to_lang.into(),
            model: model.into(),
            source_fingerprint: String::new(),
            segmentation: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.source_fingerprint = fingerprint.into();
        self
    }

    pub fn with_segmentation(mut self, settings: SegmentationSettings) -> Self {
        self.segmentation = Some(settings);
        self
    }
}

/// 任务目录中各文件的路径
#[derive(Debug, Clone)]
pub struct JobPaths {
    pub job_dir: PathBuf,
    pub state_file: PathBuf,
    pub chunks_file: PathBuf,
    pub translations_file: PathBuf,
    pub metadata_file: PathBuf,
    pub progress_log: PathBuf,
}

impl JobPaths {
    pub fn new(job_dir: PathBuf) -> Self {
        Self {
            state_file: job_dir.join(constants::STATE_FILE),
            chunks_file: job_dir.join(constants::CHUNKS_FILE),
            translations_file: job_dir.join(constants::TRANSLATIONS_FILE),
            metadata_file: job_dir.join(constants::METADATA_FILE),
            progress_log: job_dir.join(constants::PROGRESS_LOG),
            job_dir,
        }
    }
}

/// 最近一次成功读写的快照，只在写入成功后更新
#[derive(Debug, Default, Clone)]
pub struct StateCache {
    pub progress: Option<JobProgress>,
    pub results: Option<ResultMap>,
}

impl StateCache {
    pub fn clear(&mut self) {
        self.progress = None;
        self.results = None;
    }
}

/// 任务状态存储
#[derive(Debug)]
pub struct JobStateStore {
    job_id: String,
    paths: JobPaths,
    cache: StateCache,
}

impl JobStateStore {
    /// 打开任务目录，不存在时创建
    pub fn open(root: impl AsRef<Path>, job_id: &str) -> TranslationResult<Self> {
        if job_id.is_empty() || job_id.contains(['/', '\\']) || job_id == "." || job_id == ".." {
            return Err(helpers::validation_error(format!("无效的任务标识: {:?}", job_id)));
        }

        let job_dir = root.as_ref().join(job_id);
        std::fs::create_dir_all(&job_dir).map_err(|e| {
            helpers::persistence_error(format!("创建任务目录 {} 失败: {}", job_dir.display(), e))
        })?;
        tracing::debug!("打开任务目录: {}", job_dir.display());

        Ok(Self {
            job_id: job_id.to_string(),
            paths: JobPaths::new(job_dir),
            cache: StateCache::default(),
        })
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn paths(&self) -> &JobPaths {
        &self.paths
    }

    /// 保存进度，`completed` 不会超过 `total`
    pub fn save_progress(&mut self, total: usize, completed: usize) -> TranslationResult<()> {
        let progress = JobProgress {
            chunks_total: total,
            chunks_completed: completed.min(total),
            last_updated: Utc::now(),
        };
        write_json_atomic(&self.paths.state_file, &progress)?;
        self.cache.progress = Some(progress);
        Ok(())
    }

    /// 暂存整个结果映射，调用 [`StagedWrite::commit`] 后才替换文件
    pub fn stage_results(&self, results: &ResultMap) -> TranslationResult<StagedWrite> {
        StagedWrite::json(&self.paths.translations_file, results)
    }

    /// 保存整个结果映射
    pub fn save_results(&mut self, results: &ResultMap) -> TranslationResult<()> {
        self.stage_results(results)?.commit()?;
        self.cache.results = Some(results.clone());
        Ok(())
    }

    /// 保存单元列表和来源映射，每个任务只写一次
    pub fn save_units(&mut self, units: &[Unit], provenance: &Provenance) -> TranslationResult<()> {
        write_json_atomic(&self.paths.chunks_file, &UnitsFile::new(units, provenance))
    }

    pub fn save_metadata(&mut self, metadata: &JobMetadata) -> TranslationResult<()> {
        write_json_atomic(&self.paths.metadata_file, metadata)
    }

    /// 读取进度，没有旧状态时返回 `None`
    pub fn load_progress(&mut self) -> TranslationResult<Option<JobProgress>> {
        if let Some(progress) = &self.cache.progress {
            return Ok(Some(progress.clone()));
        }

        let progress: Option<JobProgress> = read_json(&self.paths.state_file)?;
        self.cache.progress = progress.clone();
        Ok(progress)
    }

    /// 读取结果映射，没有旧状态时返回空映射
    pub fn load_results(&mut self) -> TranslationResult<ResultMap> {
        if let Some(results) = &self.cache.results {
            return Ok(results.clone());
        }

        let results: ResultMap = read_json(&self.paths.translations_file)?.unwrap_or_default();
        self.cache.results = Some(results.clone());
        Ok(results)
    }

    /// 读取单元列表和来源映射
    pub fn load_units(&self) -> TranslationResult<Option<(Vec<Unit>, Provenance)>> {
        let file: Option<UnitsFile> = read_json(&self.paths.chunks_file)?;
        Ok(file.map(UnitsFile::into_parts))
    }

    pub fn load_metadata(&self) -> TranslationResult<Option<JobMetadata>> {
        read_json(&self.paths.metadata_file)
    }

    /// 追加一行带时间戳的进度日志
    ///
    /// 写入失败只记录警告，不会中断任务。
    pub fn append_log(&self, message: &str) {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let line = format!("[{}] {}\n", timestamp, message);

        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.paths.progress_log)
            .and_then(|mut file| {
                file.write_all(line.as_bytes())?;
                file.flush()?;
                file.sync_all()
            });

        if let Err(e) = written {
            tracing::warn!("无法写入进度日志: {}", e);
            tracing::info!("进度: {}", message);
        }
    }

    /// 读取进度日志的全部行
    pub fn read_log(&self) -> TranslationResult<Vec<String>> {
        match std::fs::read_to_string(&self.paths.progress_log) {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// 清空内存缓存，下次读取直接访问磁盘
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

/// 读取 JSON 文件
///
/// 文件不存在或内容无法解析时返回 `None`。
fn read_json<T: DeserializeOwned>(path: &Path) -> TranslationResult<Option<T>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) if e.kind() == ErrorKind::InvalidData => {
            tracing::warn!("状态文件 {} 不是有效的 UTF-8，按无旧状态处理", path.display());
            return Ok(None);
        }
        Err(e) => {
            return Err(helpers::persistence_error(format!(
                "读取 {} 失败: {}",
                path.display(),
                e
            )))
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!("状态文件 {} 已损坏，按无旧状态处理: {}", path.display(), e);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::error::TranslationError;
    use crate::translation::pipeline::unit::ProvenanceEntry;

    fn open_store() -> (tempfile::TempDir, JobStateStore) {
        let root = tempfile::tempdir().unwrap();
        let store = JobStateStore::open(root.path(), "job-1").unwrap();
        (root, store)
    }

    #[test]
    fn test_open_creates_job_directory() {
        let (root, store) = open_store();
        assert!(root.path().join("job-1").is_dir());
        assert_eq!(store.job_id(), "job-1");
        assert!(store.paths().state_file.ends_with("job_state.json"));
    }

    #[test]
    fn test_open_rejects_path_like_job_ids() {
        let root = tempfile::tempdir().unwrap();
        assert!(JobStateStore::open(root.path(), "../escape").is_err());
        assert!(JobStateStore::open(root.path(), "").is_err());
    }

    #[test]
    fn test_fresh_job_has_no_state() {
        let (_root, mut store) = open_store();
        assert_eq!(store.load_progress().unwrap(), None);
        assert!(store.load_results().unwrap().is_empty());
        assert!(store.load_units().unwrap().is_none());
        assert!(store.load_metadata().unwrap().is_none());
    }

    #[test]
    fn test_progress_is_clamped_and_cached() {
        let (_root, mut store) = open_store();
        store.save_progress(5, 9).unwrap();

        let progress = store.load_progress().unwrap().unwrap();
        assert_eq!(progress.chunks_completed, 5);
        assert!(progress.is_complete());

        store.clear_cache();
        let from_disk = store.load_progress().unwrap().unwrap();
        assert_eq!(from_disk, progress);
    }

    #[test]
    fn test_progress_file_uses_expected_field_names() {
        let (_root, mut store) = open_store();
        store.save_progress(25, 10).unwrap();

        let raw = std::fs::read_to_string(&store.paths().state_file).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["chunks_total"], 25);
        assert_eq!(value["chunks_completed"], 10);
        assert!(value["last_updated"].is_string());
    }

    #[test]
    fn test_units_file_layout() {
        let (_root, mut store) = open_store();
        let units = vec![Unit::new(UnitId::new(0), "<p>a</p>")];
        let mut provenance = Provenance::new();
        provenance.insert(UnitId::new(0), ProvenanceEntry::new("ch1.xhtml", 0));
        store.save_units(&units, &provenance).unwrap();

        let raw = std::fs::read_to_string(&store.paths().chunks_file).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["chunks"][0][0], "chunk-0");
        assert_eq!(value["chunks"][0][1], "<p>a</p>");
        assert_eq!(value["chapter_map"]["chunk-0"]["item"], "ch1.xhtml");
        assert_eq!(value["chapter_map"]["chunk-0"]["pos"], 0);

        let (loaded_units, loaded_provenance) = store.load_units().unwrap().unwrap();
        assert_eq!(loaded_units, units);
        assert_eq!(loaded_provenance, provenance);
    }

    #[test]
    fn test_malformed_results_are_treated_as_absent() {
        let (_root, mut store) = open_store();
        std::fs::write(&store.paths().translations_file, "{ not json").unwrap();
        assert!(store.load_results().unwrap().is_empty());
    }

    #[test]
    fn test_unreadable_state_is_persistence_error() {
        let (_root, mut store) = open_store();
        std::fs::create_dir(&store.paths().state_file).unwrap();
        assert!(matches!(
            store.load_progress(),
            Err(TranslationError::Persistence(_))
        ));
    }

    #[test]
    fn test_failed_save_keeps_cache() {
        let (root, mut store) = open_store();
        let mut results = ResultMap::new();
        results.insert(UnitId::new(1), "eins".to_string());
        store.save_results(&results).unwrap();

        std::fs::remove_dir_all(root.path().join("job-1")).unwrap();
        let mut more = results.clone();
        more.insert(UnitId::new(2), "zwei".to_string());
        assert!(store.save_results(&more).is_err());

        assert_eq!(store.load_results().unwrap(), results);
    }

    #[test]
    fn test_append_log_writes_timestamped_lines() {
        let (_root, store) = open_store();
        store.append_log("Processed 10/25 chunks");
        store.append_log("Processed 20/25 chunks");

        let lines = store.read_log().unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].contains(" UTC] Processed 10/25 chunks"));
    }

    #[test]
    fn test_append_log_failure_is_swallowed() {
        let (root, store) = open_store();
        std::fs::remove_dir_all(root.path().join("job-1")).unwrap();
        store.append_log("lost line");
        assert!(store.read_log().unwrap().is_empty());
    }

    #[test]
    fn test_metadata_round_trip() {
        let (_root, mut store) = open_store();
        let settings =
            SegmentationSettings::new(&Segmenter::new("</p>", 500), SegmentationMode::Paragraph);
        let metadata = JobMetadata::new("book.epub", "en", "de", "test-model")
            .with_fingerprint("abc")
            .with_segmentation(settings.clone());
        store.save_metadata(&metadata).unwrap();

        let loaded = store.load_metadata().unwrap().unwrap();
        assert_eq!(loaded, metadata);
        assert_eq!(loaded.segmentation.unwrap().segmenter().max_unit_size(), 500);
    }

    #[test]
    fn test_metadata_without_segmentation_still_loads() {
        let (_root, store) = open_store();
        std::fs::write(
            &store.paths().metadata_file,
            r#"{"input_file":"book.epub","from_lang":"en","to_lang":"de","model":"m",
               "source_fingerprint":"abc","created_at":"2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();

        let loaded = store.load_metadata().unwrap().expect("older metadata should load");
        assert_eq!(loaded.source_fingerprint, "abc");
        assert!(loaded.segmentation.is_none());
    }
}
