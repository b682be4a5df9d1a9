//! 内部诊断日志
//!
//! 引擎和配置流水线自身的诊断信息（处理器注册、拒绝的操作、配置阶段）
//! 通过 `tracing` 输出。本模块负责安装 `tracing-subscriber`：
//!
//! - 级别过滤（`EnvFilter`，优先使用 `RUST_LOG`）
//! - 文本或 JSON 格式
//! - 输出到标准错误（非阻塞），标准输出留给日志处理器和配置打印
//!
//! # 示例
//!
//! ```rust,no_run
//! use jlog_core::utils::logger::{Logger, LoggerConfig};
//!
//! let config = LoggerConfig::builder()
//!     .level("debug")
//!     .json_format(true)
//!     .build();
//! let _guard = Logger::init(config).unwrap();
//!
//! tracing::info!(handler = "console", "处理器已添加");
//! ```

use crate::core::config::DiagnosticsConfig;
use crate::utils::{CoreError, Result};
use std::io;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// 日志配置
// ============================================================================

/// 诊断日志配置
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// 日志级别（trace/debug/info/warn/error）
    pub level: String,

    /// 是否输出 JSON 格式
    pub json_format: bool,

    /// 自定义过滤指令（EnvFilter 格式，逗号分隔）
    pub filter_directives: Option<String>,

    /// 是否使用 ANSI 颜色
    pub ansi_colors: bool,

    /// 是否显示 target
    pub show_target: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json_format: false,
            filter_directives: None,
            ansi_colors: true,
            show_target: true,
        }
    }
}

impl LoggerConfig {
    /// 创建配置构建器
    pub fn builder() -> LoggerConfigBuilder {
        LoggerConfigBuilder::new()
    }

    /// 从应用配置的 diagnostics 段创建
    pub fn from_diagnostics(diagnostics: &DiagnosticsConfig) -> Self {
        Self {
            level: diagnostics.level.clone(),
            json_format: diagnostics.json_format,
            filter_directives: diagnostics.filter_directives.clone(),
            ansi_colors: !diagnostics.json_format,
            ..Self::default()
        }
    }
}

/// 诊断日志配置构建器
#[derive(Debug, Default)]
pub struct LoggerConfigBuilder {
    config: LoggerConfig,
}

impl LoggerConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
        }
    }

    /// 设置日志级别
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// 设置是否使用 JSON 格式
    pub fn json_format(mut self, enable: bool) -> Self {
        self.config.json_format = enable;
        self
    }

    /// 设置过滤指令
    pub fn filter_directives(mut self, directives: impl Into<String>) -> Self {
        self.config.filter_directives = Some(directives.into());
        self
    }

    /// 设置是否使用 ANSI 颜色
    pub fn ansi_colors(mut self, enable: bool) -> Self {
        self.config.ansi_colors = enable;
        self
    }

    /// 设置是否显示 target
    pub fn show_target(mut self, enable: bool) -> Self {
        self.config.show_target = enable;
        self
    }

    /// 构建配置
    pub fn build(self) -> LoggerConfig {
        self.config
    }
}

// ============================================================================
// 日志守卫
// ============================================================================

/// 日志守卫
///
/// 丢弃时等待所有挂起的诊断日志写完。
pub struct LogGuard {
    _guard: Option<WorkerGuard>,
}

impl LogGuard {
    fn empty() -> Self {
        Self { _guard: None }
    }

    /// 是否真正安装了订阅者
    pub fn is_active(&self) -> bool {
        self._guard.is_some()
    }
}

// ============================================================================
// 日志系统
// ============================================================================

/// 全局日志初始化状态
static LOGGER_INITIALIZED: OnceLock<bool> = OnceLock::new();

/// 诊断日志系统
pub struct Logger;

impl Logger {
    /// 安装诊断日志订阅者
    ///
    /// # Errors
    ///
    /// 已初始化，或全局已有其他订阅者时返回 [`CoreError::InitFailed`]
    pub fn init(config: LoggerConfig) -> Result<LogGuard> {
        if LOGGER_INITIALIZED.get().is_some() {
            return Err(CoreError::InitFailed(
                "日志系统已初始化，不能重复初始化".to_string(),
            ));
        }

        let env_filter = Self::create_env_filter(&config);
        let (writer, guard) = tracing_appender::non_blocking(io::stderr());

        let result = if config.json_format {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(writer)
                        .with_target(config.show_target)
                        .with_ansi(false),
                )
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .with_target(config.show_target)
                        .with_ansi(config.ansi_colors),
                )
                .try_init()
        };
        result.map_err(|e| CoreError::InitFailed(format!("日志系统初始化失败: {}", e)))?;

        let _ = LOGGER_INITIALIZED.set(true);
        Ok(LogGuard {
            _guard: Some(guard),
        })
    }

    /// 尝试初始化，失败时返回空守卫
    pub fn try_init(config: LoggerConfig) -> LogGuard {
        Self::init(config).unwrap_or_else(|_| LogGuard::empty())
    }

    /// 创建 EnvFilter，`RUST_LOG` 优先；无法解析的指令被忽略
    fn create_env_filter(config: &LoggerConfig) -> EnvFilter {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.level));

        match config.filter_directives {
            Some(ref directives) => directives
                .split(',')
                .filter_map(|d| d.trim().parse().ok())
                .fold(filter, |f, directive| f.add_directive(directive)),
            None => filter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_config_default() {
        let config = LoggerConfig::default();
        assert_eq!(config.level, "warn");
        assert!(!config.json_format);
        assert!(config.filter_directives.is_none());
        assert!(config.ansi_colors);
    }

    #[test]
    fn test_logger_config_builder() {
        let config = LoggerConfig::builder()
            .level("trace")
            .json_format(true)
            .filter_directives("jlog_core=debug")
            .ansi_colors(false)
            .show_target(false)
            .build();

        assert_eq!(config.level, "trace");
        assert!(config.json_format);
        assert_eq!(config.filter_directives.as_deref(), Some("jlog_core=debug"));
        assert!(!config.ansi_colors);
        assert!(!config.show_target);
    }

    #[test]
    fn test_from_diagnostics() {
        let diagnostics = DiagnosticsConfig {
            level: "debug".to_string(),
            json_format: true,
            filter_directives: Some("jlog_core::config=trace".to_string()),
        };
        let config = LoggerConfig::from_diagnostics(&diagnostics);
        assert_eq!(config.level, "debug");
        assert!(config.json_format);
        assert!(!config.ansi_colors);
    }

    #[test]
    fn test_env_filter_ignores_bad_directives() {
        let config = LoggerConfig::builder()
            .filter_directives("jlog_core=debug, ===bad===")
            .build();
        let _ = Logger::create_env_filter(&config);
    }

    #[test]
    fn test_logger_try_init_never_fails() {
        let _guard = Logger::try_init(LoggerConfig::default());
        let guard2 = Logger::try_init(LoggerConfig::default());
        assert!(!guard2.is_active());
    }
}
