//! 配置路径管理
//!
//! 配置文件默认保存在 `$XDG_CONFIG_HOME/doit/config.toml`
//! (macOS: `~/Library/Application Support/doit/config.toml`)

use crate::config::CONFIG_FILE_NAME;
use std::path::PathBuf;

/// 配置目录
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("doit"))
}

/// 默认配置文件
pub fn default_config_file() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}
