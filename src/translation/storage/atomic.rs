//! 原子替换写入
//!
//! 先写入同目录下的临时文件，刷新并 `fsync` 后再重命名覆盖目标文件。
//! 重命名是唯一对外可见的状态变化：提交前丢弃 [`StagedWrite`] 会删除临时
//! 文件，目标文件保持原样。

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::translation::error::{helpers, TranslationResult};

/// 已写入临时文件、尚未提交的写操作
#[derive(Debug)]
pub struct StagedWrite {
    file: NamedTempFile,
    target: PathBuf,
}

impl StagedWrite {
    /// 在目标文件所在目录创建临时文件
    pub fn new(target: impl Into<PathBuf>) -> TranslationResult<Self> {
        let target = target.into();
        let dir = target.parent().ok_or_else(|| {
            helpers::persistence_error(format!("无效的目标路径: {}", target.display()))
        })?;
        let file = NamedTempFile::new_in(dir)
            .map_err(|e| helpers::persistence_error(format!("创建临时文件失败: {}", e)))?;

        Ok(Self { file, target })
    }

    /// 将值序列化为带缩进的 JSON 并暂存
    pub fn json<T: Serialize + ?Sized>(
        target: impl Into<PathBuf>,
        value: &T,
    ) -> TranslationResult<Self> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let mut staged = Self::new(target)?;
        staged.write_all(&bytes)?;
        Ok(staged)
    }

    pub fn write_all(&mut self, bytes: &[u8]) -> TranslationResult<()> {
        self.file.write_all(bytes)?;
        Ok(())
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// 刷新、同步并重命名覆盖目标文件
    pub fn commit(mut self) -> TranslationResult<()> {
        self.file.flush()?;
        self.file.as_file().sync_all()?;
        self.file.persist(&self.target)?;
        sync_parent_dir(&self.target);
        Ok(())
    }
}

/// 原子地把值写成 JSON 文件
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> TranslationResult<()> {
    StagedWrite::json(path, value)?.commit()
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    if let Some(dir) = path.parent() {
        if let Err(e) = std::fs::File::open(dir).and_then(|d| d.sync_all()) {
            tracing::debug!("同步目录 {} 失败: {}", dir.display(), e);
        }
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}
