//! 工具模块
//!
//! 提供配置路径与日志初始化等辅助功能

pub mod config_paths;
pub mod logger;
