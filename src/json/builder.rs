//! 轻量 JSON 缓冲构建器
//!
//! 不经过通用 JSON 库，直接把扁平的键值对拼接成 JSON 对象文本。
//! 日志引擎依赖它在诊断 JSON/内存子系统故障时仍能输出日志。
//!
//! # 输出格式
//!
//! - 紧凑模式：`{"k": "v", "n": 42 }`
//! - 缩进模式：每个字段独占一行，前置 4 个空格
//!
//! # 句柄池
//!
//! [`JsonPool`] 管理最多 [`MAX_GENERATORS`] 个缓冲槽，句柄 [`Hgen`] 从 1 开始编号。
//! 池不做引用计数：同一句柄被两个调用点交叉使用时结果未定义，
//! 调用方必须保证每个句柄同一时刻只有一个使用者。
//!
//! ```
//! use jlog_core::json::builder::JsonPool;
//!
//! let mut pool = JsonPool::new();
//! let h = pool.acquire().unwrap();
//! pool.reset(h, false).unwrap();
//! pool.append_string(h, "k", "v").unwrap();
//! let text = pool.finalize(h).unwrap();
//! assert_eq!(text, r#"{"k": "v" }"#);
//! ```

use std::fmt;

use crate::json::escape::{escape_into, format_double};
use crate::utils::{CoreError, Result};

/// 缓冲池中可同时存在的生成器数量上限
pub const MAX_GENERATORS: usize = 20;

/// 缩进宽度
const INDENT: &str = "    ";

// ============================================================================
// JsonBuffer
// ============================================================================

/// 单个可增长的 JSON 文本缓冲
///
/// 附带一个转义用的临时缓冲，避免每次追加都重新分配。
#[derive(Debug, Default, Clone)]
pub struct JsonBuffer {
    /// 正在构建的 JSON 文本
    text: String,
    /// 转义临时缓冲
    scratch: String,
    /// 已追加的字段数
    items: usize,
    /// 是否缩进
    indented: bool,
}

impl JsonBuffer {
    /// 创建新缓冲（已处于 reset 之后的状态）
    pub fn new(indented: bool) -> Self {
        let mut buffer = Self::default();
        buffer.reset(indented);
        buffer
    }

    /// 重新初始化为 `{` 或 `{\n`，清空字段计数
    pub fn reset(&mut self, indented: bool) {
        self.text.clear();
        self.items = 0;
        self.indented = indented;
        self.text.push('{');
        if indented {
            self.text.push('\n');
        }
    }

    /// 已追加的字段数
    pub fn items(&self) -> usize {
        self.items
    }

    /// 是否处于缩进模式
    pub fn is_indented(&self) -> bool {
        self.indented
    }

    /// 追加字符串字段
    pub fn append_string(&mut self, key: &str, value: &str) {
        self.begin_item(key);
        self.push_escaped(value);
    }

    /// 追加 null 字段
    pub fn append_null(&mut self, key: &str) {
        self.begin_item(key);
        self.text.push_str("null");
    }

    /// 追加实数字段
    pub fn append_double(&mut self, key: &str, value: f64) {
        self.begin_item(key);
        self.text.push_str(&format_double(value));
    }

    /// 追加整数字段
    pub fn append_integer(&mut self, key: &str, value: i64) {
        self.begin_item(key);
        self.text.push_str(&value.to_string());
    }

    /// 追加结尾的 `}` 并返回完整文本
    ///
    /// 缓冲仍然有效，可再次 [`reset`](Self::reset) 后复用。
    pub fn finalize(&mut self) -> &str {
        if self.indented {
            self.text.push_str("\n}");
        } else {
            self.text.push_str(" }");
        }
        &self.text
    }

    fn begin_item(&mut self, key: &str) {
        if self.items > 0 {
            self.text.push(',');
            if self.indented {
                self.text.push('\n');
            } else {
                self.text.push(' ');
            }
        }
        if self.indented {
            self.text.push_str(INDENT);
        }
        self.items += 1;
        self.push_escaped(key);
        self.text.push_str(": ");
    }

    fn push_escaped(&mut self, value: &str) {
        self.scratch.clear();
        escape_into(&mut self.scratch, value);
        self.text.push('"');
        self.text.push_str(&self.scratch);
        self.text.push('"');
    }
}

// ============================================================================
// JsonPool
// ============================================================================

/// 缓冲池句柄（从 1 开始）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hgen(usize);

impl Hgen {
    /// 句柄的数值
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for Hgen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 固定容量的 JSON 缓冲池
///
/// 槽 0 保留为无效句柄，有效句柄满足 `1 <= h < slots.len()`。
#[derive(Debug)]
pub struct JsonPool {
    slots: Vec<JsonBuffer>,
    capacity: usize,
}

impl Default for JsonPool {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonPool {
    /// 创建默认容量的缓冲池
    pub fn new() -> Self {
        Self::with_capacity(MAX_GENERATORS)
    }

    /// 创建指定容量的缓冲池
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity + 1);
        slots.push(JsonBuffer::default());
        Self { slots, capacity }
    }

    /// 已分配的生成器数量
    pub fn len(&self) -> usize {
        self.slots.len() - 1
    }

    /// 是否尚未分配任何生成器
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 分配下一个缓冲槽
    ///
    /// # Errors
    ///
    /// 池已满时返回 [`CoreError::PoolExhausted`]
    pub fn acquire(&mut self) -> Result<Hgen> {
        if self.len() >= self.capacity {
            tracing::error!(max = self.capacity, "JSON 缓冲池已耗尽");
            return Err(CoreError::PoolExhausted(self.capacity));
        }
        self.slots.push(JsonBuffer::new(false));
        Ok(Hgen(self.slots.len() - 1))
    }

    /// 获取句柄对应的缓冲
    pub fn buffer(&mut self, h: Hgen) -> Result<&mut JsonBuffer> {
        if h.0 < 1 || h.0 >= self.slots.len() {
            return Err(CoreError::InvalidHandle(h.0));
        }
        Ok(&mut self.slots[h.0])
    }

    /// 重新初始化缓冲
    pub fn reset(&mut self, h: Hgen, indented: bool) -> Result<()> {
        self.buffer(h)?.reset(indented);
        Ok(())
    }

    /// 追加字符串字段
    pub fn append_string(&mut self, h: Hgen, key: &str, value: &str) -> Result<()> {
        self.buffer(h)?.append_string(key, value);
        Ok(())
    }

    /// 追加 null 字段
    pub fn append_null(&mut self, h: Hgen, key: &str) -> Result<()> {
        self.buffer(h)?.append_null(key);
        Ok(())
    }

    /// 追加实数字段
    pub fn append_double(&mut self, h: Hgen, key: &str, value: f64) -> Result<()> {
        self.buffer(h)?.append_double(key, value);
        Ok(())
    }

    /// 追加整数字段
    pub fn append_integer(&mut self, h: Hgen, key: &str, value: i64) -> Result<()> {
        self.buffer(h)?.append_integer(key, value);
        Ok(())
    }

    /// 结束对象并返回文本副本
    pub fn finalize(&mut self, h: Hgen) -> Result<String> {
        Ok(self.buffer(h)?.finalize().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_round_trip_single_field() {
        let mut buffer = JsonBuffer::new(false);
        buffer.append_string("k", "v");
        let parsed: Value = serde_json::from_str(buffer.finalize()).unwrap();
        assert_eq!(parsed, json!({"k": "v"}));
    }

    #[test]
    fn test_empty_object() {
        let mut buffer = JsonBuffer::new(false);
        assert_eq!(buffer.finalize(), "{ }");

        buffer.reset(true);
        assert_eq!(buffer.finalize(), "{\n\n}");
    }

    #[test]
    fn test_compact_layout() {
        let mut buffer = JsonBuffer::new(false);
        buffer.append_string("msg", "hello");
        buffer.append_integer("count", -3);
        buffer.append_null("none");
        assert_eq!(
            buffer.finalize(),
            r#"{"msg": "hello", "count": -3, "none": null }"#
        );
    }

    #[test]
    fn test_indented_layout() {
        let mut buffer = JsonBuffer::new(true);
        buffer.append_string("a", "1");
        buffer.append_double("b", 2.0);
        assert_eq!(buffer.finalize(), "{\n    \"a\": \"1\",\n    \"b\": 2.0\n}");
    }

    #[test]
    fn test_doubles_stay_real() {
        let mut buffer = JsonBuffer::new(false);
        buffer.append_double("x", 3.0);
        let parsed: Value = serde_json::from_str(buffer.finalize()).unwrap();
        assert!(parsed["x"].is_f64());
    }

    #[test]
    fn test_escaped_content_parses() {
        let mut buffer = JsonBuffer::new(false);
        buffer.append_string("we\"ird", "line1\nline2\t\"quoted\" \\ \u{02}");
        let parsed: Value = serde_json::from_str(buffer.finalize()).unwrap();
        assert_eq!(parsed["we\"ird"], "line1\nline2\t\"quoted\" \\ \u{02}");
    }

    #[test]
    fn test_reset_reuses_buffer() {
        let mut buffer = JsonBuffer::new(false);
        buffer.append_string("first", "1");
        buffer.finalize();
        buffer.reset(false);
        assert_eq!(buffer.items(), 0);
        buffer.append_string("second", "2");
        assert_eq!(buffer.finalize(), r#"{"second": "2" }"#);
    }

    #[test]
    fn test_pool_exhaustion() {
        let mut pool = JsonPool::new();
        for i in 1..=MAX_GENERATORS {
            let h = pool.acquire().unwrap();
            assert_eq!(h.index(), i);
        }
        let err = pool.acquire().unwrap_err();
        assert!(matches!(err, CoreError::PoolExhausted(MAX_GENERATORS)));
    }

    #[test]
    fn test_pool_invalid_handle() {
        let mut pool = JsonPool::with_capacity(2);
        assert!(pool.is_empty());
        let h = pool.acquire().unwrap();
        assert!(pool.reset(h, false).is_ok());
        assert!(matches!(
            pool.reset(Hgen(0), false),
            Err(CoreError::InvalidHandle(0))
        ));
        assert!(matches!(
            pool.append_integer(Hgen(5), "k", 1),
            Err(CoreError::InvalidHandle(5))
        ));
    }

    #[test]
    fn test_pool_round_trip() {
        let mut pool = JsonPool::new();
        let h = pool.acquire().unwrap();
        pool.reset(h, true).unwrap();
        pool.append_string(h, "service", "agent").unwrap();
        pool.append_integer(h, "port", 8080).unwrap();
        let text = pool.finalize(h).unwrap();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, json!({"service": "agent", "port": 8080}));
    }
}
