//! 核心作业控制逻辑
//!
//! 包含资源采样、用量差值计算以及后台任务表

pub mod job_table;
pub mod usage;
