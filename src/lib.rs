//! # jlog-core - 结构化日志分发与 JSON 配置
//!
//! 提供两个相互独立的子系统：
//!
//! - **日志分发引擎**: 按名称注册处理器类型和处理器实例，每次日志调用按级别过滤后
//!   扇出到所有实例，组装成一行 JSON（可选时间戳与进程标识），支持调用栈输出和
//!   按选项请求终止进程
//! - **JSON 配置流水线**: 合并固定配置、可变配置、配置文件和参数配置，
//!   展开 `{^^name^^}` / `[^^name^^]` 范围模板和 `(^^var^^)` 变量宏
//!
//! 两者共用一个轻量 JSON 缓冲构建器和类型化的字段列表。
//!
//! ## 快速开始
//!
//! ```rust
//! use jlog_core::json::Fields;
//! use jlog_core::log::{LogEngine, LogOptions, MemoryHandler};
//!
//! let engine = LogEngine::new();
//! engine.startup("demo", "1.0", "/usr/bin/demo").unwrap();
//! engine.register_handler_type(MemoryHandler::handler_type()).unwrap();
//!
//! let memory = MemoryHandler::new();
//! engine
//!     .add_handler("mem", "memory", LogOptions::UP_WARNING, Box::new(memory.clone()))
//!     .unwrap();
//!
//! engine.warning(LogOptions::NONE, Fields::new().str("msg", "disk almost full").int("free_mb", 12));
//! engine.info(LogOptions::NONE, Fields::new().str("msg", "filtered out"));
//! assert_eq!(memory.writes().len(), 1);
//! ```
//!
//! ## 模块结构
//!
//! - `json` - JSON 缓冲构建器、转义、字段列表
//! - `log` - 级别、处理器、分发引擎
//! - `config` - 配置加载、合并、模板展开
//! - `core` - 应用配置
//! - `utils` - 错误类型、诊断日志、计数、转储、进程工具

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod core;
pub mod json;
pub mod log;
pub mod utils;

// 重导出常用类型，方便使用
pub use config::{json_config, ConfigFiles, JsonConfigRequest, SubstitutionMode};
pub use crate::core::config::{ConfigSources, CoreConfig, CoreConfigBuilder, HandlerSpec, LogSettings};
pub use json::{FieldValue, Fields, JsonBuffer, JsonPool};
pub use log::{LogEngine, LogHandler, LogOptions, Severity};
pub use utils::logger::{LogGuard, Logger, LoggerConfig};
pub use utils::process::{ProcessTerminator, QuitPolicy, Termination, Terminator};
pub use utils::{error_code, CoreError, Result};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
