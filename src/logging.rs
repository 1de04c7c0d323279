//! 轻量日志封装
//!
//! Thin helpers over `tracing` so call sites can pass owned `format!` strings.

pub fn debug(message: impl AsRef<str>) {
    tracing::debug!(target: "doit", "{}", message.as_ref());
}

pub fn info(message: impl AsRef<str>) {
    tracing::info!(target: "doit", "{}", message.as_ref());
}

pub fn warn(message: impl AsRef<str>) {
    tracing::warn!(target: "doit", "{}", message.as_ref());
}
