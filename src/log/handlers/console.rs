//! 控制台处理器

use std::io::{self, Write};

use serde_json::Value;

use crate::log::handler::{HandlerType, LogHandler};
use crate::log::severity::Severity;

/// 控制台处理器类型名
pub const TYPE_NAME: &str = "stdout";

/// 输出到标准输出的处理器
#[derive(Debug, Clone, Default)]
pub struct ConsoleHandler {
    /// 是否按级别着色
    colors: bool,
}

impl ConsoleHandler {
    /// 创建控制台处理器
    pub fn new(colors: bool) -> Self {
        Self { colors }
    }

    /// 处理器类型描述
    ///
    /// 参数：`{"colors": bool}`
    pub fn handler_type() -> HandlerType {
        HandlerType::new(TYPE_NAME).with_factory(|params: &Value| {
            let colors = params
                .get("colors")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            Ok(Box::new(ConsoleHandler::new(colors)) as Box<dyn LogHandler>)
        })
    }

    fn color(severity: Severity) -> &'static str {
        match severity {
            Severity::Emerg | Severity::Alert | Severity::Crit | Severity::Err => "\x1b[1;31m",
            Severity::Warning => "\x1b[1;33m",
            Severity::Notice | Severity::Info => "\x1b[0;32m",
            Severity::Debug => "\x1b[0;36m",
            Severity::Audit | Severity::Monitor => "\x1b[0;35m",
        }
    }

    fn emit(&self, color: Option<&str>, bytes: &[u8]) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        match color {
            Some(color) => {
                out.write_all(color.as_bytes())?;
                out.write_all(bytes)?;
                out.write_all(b"\x1b[0m\n")?;
            }
            None => {
                out.write_all(bytes)?;
                out.write_all(b"\n")?;
            }
        }
        out.flush()
    }
}

// 写失败由处理器自己吞掉：负值的含义是“接管消息”，不能用来报告错误
impl LogHandler for ConsoleHandler {
    fn write(&mut self, severity: Severity, bytes: &[u8]) -> i32 {
        let color = self.colors.then(|| Self::color(severity));
        let _ = self.emit(color, bytes);
        0
    }

    fn format(&mut self, _severity: Severity, text: &str) -> i32 {
        let _ = self.emit(None, text.as_bytes());
        0
    }
}
