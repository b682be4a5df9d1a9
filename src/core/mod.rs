//! 核心模块
//!
//! 应用配置：日志分发设置和诊断日志设置，经配置流水线加载。

pub mod config;

pub use config::{
    ConfigSources, CoreConfig, CoreConfigBuilder, DiagnosticsConfig, HandlerSpec, LogSettings,
};
