// 集成测试公共模块
//
// 提供测试辅助工具和共享功能

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use book_relay::translation::config::TranslationConfig;
use book_relay::translation::core::{Transform, TranslationService};
use book_relay::translation::document::{Document, Section};
use book_relay::translation::error::{helpers, TranslationError};
use book_relay::translation::storage::{JobMetadata, JobStateStore};

use tempfile::TempDir;

/// 测试配置构建器
pub struct TestConfigBuilder {
    config: TranslationConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: TranslationConfig {
                max_unit_size: 30,
                retry_base_delay_ms: 1,
                retry_max_delay_ms: Some(5),
                ..TranslationConfig::default_with_lang("en", "de")
            },
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn with_max_unit_size(mut self, max_unit_size: usize) -> Self {
        self.config.max_unit_size = max_unit_size;
        self
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.config.max_retry_attempts = attempts;
        self
    }

    pub fn with_whole_sections(mut self) -> Self {
        self.config.segmentation_mode = book_relay::translation::SegmentationMode::WholeSection;
        self
    }

    pub fn build(self) -> TranslationConfig {
        self.config
    }
}

/// 测试环境：临时任务根目录加配置
pub struct TestEnvironment {
    pub root: TempDir,
    pub config: TranslationConfig,
}

impl TestEnvironment {
    pub fn new(builder: TestConfigBuilder) -> Self {
        let root = tempfile::tempdir().expect("Failed to create temp job root");
        let mut config = builder.build();
        config.job_root = root.path().to_string_lossy().into_owned();
        Self { root, config }
    }

    pub fn default() -> Self {
        Self::new(TestConfigBuilder::new())
    }

    pub fn service(&self) -> TranslationService {
        TranslationService::new(self.config.clone()).expect("Test config should be valid")
    }

    pub fn store(&self, job_id: &str) -> JobStateStore {
        JobStateStore::open(self.root.path(), job_id).expect("Failed to open job store")
    }

    pub fn metadata(&self) -> JobMetadata {
        JobMetadata::new("book.epub", "en", "de", "test-model")
    }
}

/// 测试数据生成器
pub struct TestDataGenerator;

impl TestDataGenerator {
    /// 每段 20 个字符，在 30 字符上限下一段一个单元
    pub fn paragraph(n: usize) -> String {
        format!("<p>Paragraph {:02}.</p>", n)
    }

    pub fn paragraphs(range: std::ops::Range<usize>) -> String {
        range.map(Self::paragraph).collect()
    }

    /// 单个章节，包含 `count` 个段落
    pub fn single_chapter_book(count: usize) -> Document {
        Document::new(vec![
            Section::binary("mimetype", b"application/epub+zip".to_vec()),
            Section::text("OEBPS/ch1.xhtml", Self::paragraphs(0..count)),
        ])
    }

    /// 两个正文章节夹着一个图片成员
    pub fn two_chapter_book() -> Document {
        Document::new(vec![
            Section::text("OEBPS/A.xhtml", Self::paragraphs(0..2)),
            Section::binary("OEBPS/cover.png", vec![0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a]),
            Section::text("OEBPS/B.xhtml", Self::paragraphs(2..3)),
        ])
    }

    /// 逐页转写得到的文档，每页一个章节
    pub fn paged_document(pages: usize) -> Document {
        Document::new(
            (0..pages)
                .map(|i| {
                    Section::text(format!("page-{:03}.html", i), format!("<h1>Page {}</h1>", i))
                })
                .collect(),
        )
    }

    pub fn epub_members() -> Vec<(String, Vec<u8>)> {
        vec![
            ("mimetype".to_string(), b"application/epub+zip".to_vec()),
            (
                "META-INF/container.xml".to_string(),
                b"<?xml version=\"1.0\"?><container/>".to_vec(),
            ),
            (
                "OEBPS/ch1.xhtml".to_string(),
                Self::paragraphs(0..4).into_bytes(),
            ),
            ("OEBPS/img/fig1.png".to_string(), vec![0x89, 0x50, 0x4e, 0x47]),
            (
                "OEBPS/ch2.xhtml".to_string(),
                "<p>Mr. Smith arrived. He sat down.</p>\n".as_bytes().to_vec(),
            ),
        ]
    }
}

/// 转换能力辅助工具
pub struct TransformHelper;

impl TransformHelper {
    /// 原样返回
    pub fn echo() -> impl Transform {
        |text: String| async move { Ok::<_, TranslationError>(text) }
    }

    /// 把 `Paragraph` 翻成 `Absatz`
    pub fn german() -> impl Transform {
        |text: String| async move { Ok::<_, TranslationError>(text.replace("Paragraph", "Absatz")) }
    }

    /// 统计调用次数
    pub fn counting(calls: Arc<AtomicUsize>) -> impl Transform {
        move |text: String| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, TranslationError>(text.replace("Paragraph", "Absatz")) }
        }
    }

    /// 记录每次调用的输入
    pub fn recording(seen: Arc<Mutex<Vec<String>>>) -> impl Transform {
        move |text: String| {
            seen.lock().expect("recording lock poisoned").push(text.clone());
            async move { Ok::<_, TranslationError>(text) }
        }
    }

    /// 输入包含 `pattern` 时总是失败
    pub fn failing_for(pattern: &'static str) -> impl Transform {
        move |text: String| async move {
            if text.contains(pattern) {
                Err(helpers::transform_error(format!("content policy: {}", pattern)))
            } else {
                Ok(text.replace("Paragraph", "Absatz"))
            }
        }
    }

    /// 记录同时在途的最大调用数
    pub fn concurrency_tracker(
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    ) -> impl Transform {
        move |text: String| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, TranslationError>(text)
            }
        }
    }
}

/// 断言辅助工具
pub struct AssertionHelper;

impl AssertionHelper {
    /// 从进度日志中取出所有 `Processed n/total` 的 `(n, total)`
    pub fn processed_counts(store: &JobStateStore) -> Vec<(usize, usize)> {
        store
            .read_log()
            .expect("Progress log should be readable")
            .iter()
            .filter_map(|line| {
                let rest = line.split("Processed ").nth(1)?;
                let counts = rest.strip_suffix(" chunks")?;
                let (done, total) = counts.split_once('/')?;
                Some((done.parse().ok()?, total.parse().ok()?))
            })
            .collect()
    }

    pub fn log_contains(store: &JobStateStore, needle: &str) -> bool {
        store
            .read_log()
            .expect("Progress log should be readable")
            .iter()
            .any(|line| line.contains(needle))
    }
}
