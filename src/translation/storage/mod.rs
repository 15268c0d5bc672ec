//! 存储模块
//!
//! 提供任务目录的持久化：原子替换写入、冷启动恢复和进度日志。

pub mod atomic;
pub mod job_store;

pub use atomic::{write_json_atomic, StagedWrite};
pub use job_store::{
    JobMetadata, JobPaths, JobProgress, JobStateStore, SegmentationSettings, StateCache,
    UnitsFile,
};
