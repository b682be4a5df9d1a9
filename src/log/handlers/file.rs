//! 轮转文件处理器
//!
//! 基于 `tracing-appender` 的 `RollingFileAppender`，每条日志写一行。

use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::log::handler::{HandlerType, LogHandler};
use crate::log::severity::Severity;
use crate::utils::{CoreError, Result};

/// 文件处理器类型名
pub const TYPE_NAME: &str = "file";

// ============================================================================
// 轮转策略
// ============================================================================

/// 日志轮转策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationStrategy {
    /// 不轮转（单个日志文件）
    Never,
    /// 每分钟轮转（主要用于测试）
    Minutely,
    /// 每小时轮转
    Hourly,
    /// 每天轮转（默认）
    #[default]
    Daily,
}

impl RotationStrategy {
    /// 转换为 tracing-appender 的 Rotation 类型
    fn to_rotation(self) -> Rotation {
        match self {
            RotationStrategy::Never => Rotation::NEVER,
            RotationStrategy::Minutely => Rotation::MINUTELY,
            RotationStrategy::Hourly => Rotation::HOURLY,
            RotationStrategy::Daily => Rotation::DAILY,
        }
    }

    /// 从字符串解析轮转策略，无法识别时返回 `Daily`
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "never" | "none" => RotationStrategy::Never,
            "minutely" | "minute" => RotationStrategy::Minutely,
            "hourly" | "hour" => RotationStrategy::Hourly,
            _ => RotationStrategy::Daily,
        }
    }
}

impl std::fmt::Display for RotationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RotationStrategy::Never => write!(f, "never"),
            RotationStrategy::Minutely => write!(f, "minutely"),
            RotationStrategy::Hourly => write!(f, "hourly"),
            RotationStrategy::Daily => write!(f, "daily"),
        }
    }
}

// ============================================================================
// 处理器
// ============================================================================

/// 写入轮转文件的处理器
pub struct RotatingFileHandler {
    appender: Option<RollingFileAppender>,
    directory: PathBuf,
    prefix: String,
}

impl RotatingFileHandler {
    /// 打开文件处理器
    ///
    /// 文件名为 `{prefix}.log`，轮转后追加日期后缀。
    pub fn open(directory: impl AsRef<Path>, prefix: &str, rotation: RotationStrategy) -> Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory)?;
        let appender = RollingFileAppender::new(
            rotation.to_rotation(),
            &directory,
            format!("{}.log", prefix),
        );
        tracing::debug!(directory = %directory.display(), prefix, %rotation, "打开日志文件");
        Ok(Self {
            appender: Some(appender),
            directory,
            prefix: prefix.to_string(),
        })
    }

    /// 处理器类型描述
    ///
    /// 参数：`{"directory": str, "prefix": str, "rotation": "daily"|"hourly"|...}`
    pub fn handler_type() -> HandlerType {
        HandlerType::new(TYPE_NAME).with_factory(|params: &Value| {
            let directory = params
                .get("directory")
                .and_then(Value::as_str)
                .ok_or_else(|| CoreError::HandlerOpenFailed {
                    name: TYPE_NAME.to_string(),
                    reason: "缺少 directory 参数".to_string(),
                })?;
            let prefix = params
                .get("prefix")
                .and_then(Value::as_str)
                .unwrap_or("jlog");
            let rotation = params
                .get("rotation")
                .and_then(Value::as_str)
                .map(RotationStrategy::parse)
                .unwrap_or_default();
            let handler = RotatingFileHandler::open(directory, prefix, rotation)?;
            Ok(Box::new(handler) as Box<dyn LogHandler>)
        })
    }

    /// 日志目录
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// 文件名前缀
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn write_line(&mut self, bytes: &[u8]) -> i32 {
        let Some(appender) = self.appender.as_mut() else {
            return 0;
        };
        let result = appender
            .write_all(bytes)
            .and_then(|_| appender.write_all(b"\n"))
            .and_then(|_| appender.flush());
        if let Err(e) = result {
            tracing::warn!(directory = %self.directory.display(), "写日志文件失败: {}", e);
        }
        0
    }
}

impl LogHandler for RotatingFileHandler {
    fn write(&mut self, _severity: Severity, bytes: &[u8]) -> i32 {
        self.write_line(bytes)
    }

    fn format(&mut self, _severity: Severity, text: &str) -> i32 {
        self.write_line(text.as_bytes())
    }

    fn close(&mut self) {
        if let Some(mut appender) = self.appender.take() {
            let _ = appender.flush();
        }
    }
}
