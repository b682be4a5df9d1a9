//! 内置处理器类型
//!
//! - `stdout`：控制台
//! - `file`：按时间轮转的文件
//! - `udp`：UDP 数据报
//! - `memory`：内存记录（测试与进程内采集）

pub mod console;
pub mod file;
pub mod memory;
pub mod udp;

pub use console::ConsoleHandler;
pub use file::{RotatingFileHandler, RotationStrategy};
pub use memory::{MemoryHandler, MemoryRecord};
pub use udp::UdpHandler;

use crate::log::handler::HandlerType;

/// 启动时注册的内置类型
pub fn builtin_types() -> Vec<HandlerType> {
    vec![
        ConsoleHandler::handler_type(),
        RotatingFileHandler::handler_type(),
        UdpHandler::handler_type(),
    ]
}
