//! 工具模块
//!
//! 包含错误类型、诊断日志、级别计数、十六进制转储和进程相关工具。

pub mod dump;
pub mod error;
pub mod logger;
pub mod metrics;
pub mod process;

// 重导出常用类型
pub use error::{error_code, CoreError, Result};
pub use logger::{LogGuard, Logger, LoggerConfig, LoggerConfigBuilder};
pub use metrics::{SeverityCounters, SeverityReport};
pub use process::{Identity, ProcessTerminator, QuitPolicy, RecordingTerminator, Termination, Terminator};
