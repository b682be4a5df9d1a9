//! 内存处理器
//!
//! 把 write/format/close 调用记录到共享存储，用于测试断言和进程内采集。
//! 可配置为在 write 时返回负值，模拟接管消息的处理器。

use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::log::handler::{HandlerType, LogHandler, TAKE_OWNERSHIP};
use crate::log::severity::Severity;

/// 内存处理器类型名
pub const TYPE_NAME: &str = "memory";

/// 一条记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryRecord {
    /// write 调用
    Write(Severity, String),
    /// format 调用
    Format(Severity, String),
}

#[derive(Debug, Default)]
struct Store {
    records: Vec<MemoryRecord>,
    closes: usize,
}

/// 记录到内存的处理器
///
/// 克隆得到的句柄共享同一份存储。
#[derive(Debug, Clone, Default)]
pub struct MemoryHandler {
    store: Arc<Mutex<Store>>,
    take_ownership: bool,
}

impl MemoryHandler {
    /// 创建内存处理器
    pub fn new() -> Self {
        Self::default()
    }

    /// write 时返回负值，停止后续分发
    pub fn taking_ownership(mut self) -> Self {
        self.take_ownership = true;
        self
    }

    /// 处理器类型描述
    ///
    /// 参数：`{"take_ownership": bool}`
    pub fn handler_type() -> HandlerType {
        HandlerType::new(TYPE_NAME).with_factory(|params: &Value| {
            let mut handler = MemoryHandler::new();
            if params.get("take_ownership").and_then(Value::as_bool) == Some(true) {
                handler = handler.taking_ownership();
            }
            Ok(Box::new(handler) as Box<dyn LogHandler>)
        })
    }

    /// 所有记录
    pub fn records(&self) -> Vec<MemoryRecord> {
        self.store
            .lock()
            .map(|s| s.records.clone())
            .unwrap_or_default()
    }

    /// 所有 write 的内容
    pub fn writes(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                MemoryRecord::Write(_, text) => Some(text),
                MemoryRecord::Format(..) => None,
            })
            .collect()
    }

    /// 所有 format 的内容
    pub fn formats(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                MemoryRecord::Format(_, text) => Some(text),
                MemoryRecord::Write(..) => None,
            })
            .collect()
    }

    /// close 被调用的次数
    pub fn close_count(&self) -> usize {
        self.store.lock().map(|s| s.closes).unwrap_or(0)
    }

    /// 清空记录
    pub fn clear(&self) {
        if let Ok(mut store) = self.store.lock() {
            store.records.clear();
        }
    }

    fn push(&self, record: MemoryRecord) {
        if let Ok(mut store) = self.store.lock() {
            store.records.push(record);
        }
    }
}

impl LogHandler for MemoryHandler {
    fn write(&mut self, severity: Severity, bytes: &[u8]) -> i32 {
        self.push(MemoryRecord::Write(
            severity,
            String::from_utf8_lossy(bytes).into_owned(),
        ));
        if self.take_ownership {
            TAKE_OWNERSHIP
        } else {
            0
        }
    }

    fn format(&mut self, severity: Severity, text: &str) -> i32 {
        self.push(MemoryRecord::Format(severity, text.to_string()));
        0
    }

    fn close(&mut self) {
        if let Ok(mut store) = self.store.lock() {
            store.closes += 1;
        }
    }
}
