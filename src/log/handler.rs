//! 处理器类型与处理器实例
//!
//! - 处理器类型（[`HandlerType`]）：按名称注册的行为描述，声明是否提供
//!   write/format 能力，并可携带一个按 JSON 参数打开实例的工厂
//! - 处理器实例（[`HandlerInstance`]）：命名的输出目标，绑定一个类型和一个句柄
//!
//! 句柄实现 [`LogHandler`]；实例被删除时调用一次 [`LogHandler::close`]。

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::log::severity::{LogOptions, Severity};
use crate::utils::Result;

/// write 返回负值：处理器接管了这条消息，本次调用不再继续分发
pub const TAKE_OWNERSHIP: i32 = -1;

/// 处理器句柄
pub trait LogHandler: Send {
    /// 写入一条完整的日志（JSON 行或预格式化文本）
    ///
    /// 返回负值表示接管消息，停止向后续处理器分发。
    fn write(&mut self, severity: Severity, bytes: &[u8]) -> i32;

    /// 写入一行人类可读文本（调用栈、转储等）
    fn format(&mut self, severity: Severity, text: &str) -> i32 {
        self.write(severity, text.as_bytes())
    }

    /// 释放句柄持有的资源
    fn close(&mut self) {}
}

/// 按 JSON 参数打开处理器句柄的工厂
pub type HandlerFactory = Arc<dyn Fn(&Value) -> Result<Box<dyn LogHandler>> + Send + Sync>;

/// 处理器类型描述
#[derive(Clone)]
pub struct HandlerType {
    name: String,
    has_write: bool,
    has_format: bool,
    factory: Option<HandlerFactory>,
}

impl HandlerType {
    /// 创建同时提供 write 和 format 的类型
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            has_write: true,
            has_format: true,
            factory: None,
        }
    }

    /// 是否提供结构化 write
    pub fn with_write(mut self, enable: bool) -> Self {
        self.has_write = enable;
        self
    }

    /// 是否提供文本 format
    pub fn with_format(mut self, enable: bool) -> Self {
        self.has_format = enable;
        self
    }

    /// 设置按参数打开实例的工厂
    pub fn with_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Value) -> Result<Box<dyn LogHandler>> + Send + Sync + 'static,
    {
        self.factory = Some(Arc::new(factory));
        self
    }

    /// 类型名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 是否提供 write
    pub fn has_write(&self) -> bool {
        self.has_write
    }

    /// 是否提供 format
    pub fn has_format(&self) -> bool {
        self.has_format
    }

    /// 打开工厂
    pub fn factory(&self) -> Option<&HandlerFactory> {
        self.factory.as_ref()
    }
}

impl fmt::Debug for HandlerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerType")
            .field("name", &self.name)
            .field("has_write", &self.has_write)
            .field("has_format", &self.has_format)
            .field("openable", &self.factory.is_some())
            .finish()
    }
}

/// 处理器实例，归分发引擎独占
pub struct HandlerInstance {
    /// 实例名（唯一）
    pub name: String,
    /// 级别与行为选项
    pub options: LogOptions,
    /// 所属类型
    pub handler_type: HandlerType,
    /// 句柄
    pub handle: Box<dyn LogHandler>,
}

impl HandlerInstance {
    /// 是否忽略该级别
    pub fn must_ignore(&self, severity: Severity) -> bool {
        crate::log::severity::must_ignore(self.options, severity)
    }
}

impl fmt::Debug for HandlerInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerInstance")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("type", &self.handler_type.name())
            .finish()
    }
}
