//! 平台相关的进程与资源查询

#[cfg(unix)]
mod unix;

#[cfg(unix)]
pub use unix::*;
