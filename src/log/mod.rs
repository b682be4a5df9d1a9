//! 日志分发
//!
//! - [`severity`]：级别与选项位
//! - [`handler`]：处理器类型、实例与句柄 trait
//! - [`handlers`]：内置处理器
//! - [`stack`]：调用栈采集
//! - [`engine`]：分发引擎

pub mod engine;
pub mod handler;
pub mod handlers;
pub mod severity;
pub mod stack;

pub use engine::{AppInfo, InformCallback, LogEngine, LogEngineBuilder};
pub use handler::{HandlerFactory, HandlerInstance, HandlerType, LogHandler, TAKE_OWNERSHIP};
pub use handlers::{
    ConsoleHandler, MemoryHandler, MemoryRecord, RotatingFileHandler, RotationStrategy, UdpHandler,
};
pub use severity::{must_ignore, LogOptions, Severity};
