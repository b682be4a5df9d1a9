//! 日志字段
//!
//! 一次日志调用携带一个有序的键值列表（[`Fields`]），值是带标签的 [`FieldValue`]。
//!
//! 除了类型化的构建方式，还保留了按 printf 格式说明符推断类型的方式
//! （[`Fields::push_formatted`]），每个格式串只识别第一个转换说明符。
//!
//! ```
//! use jlog_core::json::fields::{Fields, FormatArg};
//!
//! let mut fields = Fields::new().str("msg", "connected").int("port", 8080);
//! fields.push_formatted("ratio", "%f", FormatArg::Float(0.5)).unwrap();
//! assert_eq!(fields.len(), 3);
//! ```

use serde_json::Value;

use crate::json::builder::JsonBuffer;
use crate::utils::{CoreError, Result};

/// 被单独捕获为“最近消息”的字段名
pub const MSG_KEY: &str = "msg";

// ============================================================================
// 字段值
// ============================================================================

/// 日志字段值
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// 字符串
    Str(String),
    /// 64 位有符号整数
    Int(i64),
    /// 实数
    Real(f64),
    /// null
    Null,
    /// 任意 JSON 值，输出时压缩成单引号字符串
    Json(Value),
}

impl FieldValue {
    /// 把字段追加到 JSON 缓冲
    pub fn append_to(&self, buffer: &mut JsonBuffer, key: &str) {
        match self {
            FieldValue::Str(s) => buffer.append_string(key, s),
            FieldValue::Int(i) => buffer.append_integer(key, *i),
            FieldValue::Real(r) => buffer.append_double(key, *r),
            FieldValue::Null => buffer.append_null(key),
            FieldValue::Json(v) => buffer.append_string(key, &json_as_single_quoted(v)),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i as i64)
    }
}

impl From<u32> for FieldValue {
    fn from(i: u32) -> Self {
        FieldValue::Int(i as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(r: f64) -> Self {
        FieldValue::Real(r)
    }
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        FieldValue::Json(v)
    }
}

/// 把 JSON 值压缩序列化，并把双引号替换成单引号，以便嵌入外层字符串
pub fn json_as_single_quoted(value: &Value) -> String {
    value.to_string().replace('"', "'")
}

// ============================================================================
// 格式说明符
// ============================================================================

/// printf 转换说明符的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// `d i`，`long` 表示带 `l`/`ll` 修饰
    SignedInt { long: bool },
    /// `o u x X`
    UnsignedInt { long: bool },
    /// `e E f F g G a A`，`long_double` 表示带 `L` 修饰
    Float { long_double: bool },
    /// `s`，`wide` 表示带 `l` 修饰
    Str { wide: bool },
    /// `p`
    Pointer,
    /// `j`：JSON 值
    Json,
    /// `%%`
    Percent,
    /// `c`
    Char,
}

impl Conversion {
    /// 解析格式串中的第一个转换说明符
    ///
    /// 没有 `%` 或说明符不完整时返回 `None`。后续说明符不予解析。
    pub fn parse(format: &str) -> Option<Self> {
        let start = format.find('%')?;
        let mut long = 0usize;
        let mut long_double = false;

        for c in format[start + 1..].chars() {
            match c {
                // 标志、宽度、精度
                '-' | '+' | ' ' | '#' | '0'..='9' | '.' | '*' | '\'' => continue,
                'l' => long += 1,
                'L' => long_double = true,
                'h' | 'q' | 'z' | 't' => continue,
                '%' => return Some(Conversion::Percent),
                'd' | 'i' => return Some(Conversion::SignedInt { long: long > 0 }),
                'o' | 'u' | 'x' | 'X' => return Some(Conversion::UnsignedInt { long: long > 0 }),
                'e' | 'E' | 'f' | 'F' | 'g' | 'G' | 'a' | 'A' => {
                    return Some(Conversion::Float { long_double })
                }
                's' => return Some(Conversion::Str { wide: long > 0 }),
                'p' => return Some(Conversion::Pointer),
                'j' => return Some(Conversion::Json),
                'c' => return Some(Conversion::Char),
                _ => return None,
            }
        }
        None
    }
}

/// 与格式说明符配对的参数
#[derive(Debug, Clone, PartialEq)]
pub enum FormatArg {
    /// 整数参数
    Int(i64),
    /// 浮点参数
    Float(f64),
    /// 字符串参数
    Str(String),
    /// 指针参数
    Ptr(usize),
    /// JSON 参数
    Json(Value),
    /// 字符参数
    Char(char),
}

/// 按转换说明符把参数转换为字段值
///
/// `%%` 和 `%c` 被识别但不产生字段，返回 `Ok(None)`。
pub fn convert(conversion: Conversion, arg: FormatArg) -> std::result::Result<Option<FieldValue>, FormatArg> {
    let value = match (conversion, arg) {
        (Conversion::Percent, _) | (Conversion::Char, _) => return Ok(None),
        (Conversion::SignedInt { long: true }, FormatArg::Int(i))
        | (Conversion::UnsignedInt { long: true }, FormatArg::Int(i)) => FieldValue::Int(i),
        (Conversion::SignedInt { long: false }, FormatArg::Int(i)) => FieldValue::Int(i as i32 as i64),
        (Conversion::UnsignedInt { long: false }, FormatArg::Int(i)) => FieldValue::Int(i as u32 as i64),
        (Conversion::Float { .. }, FormatArg::Float(f)) => FieldValue::Real(f),
        (Conversion::Float { .. }, FormatArg::Int(i)) => FieldValue::Real(i as f64),
        (Conversion::Str { .. }, FormatArg::Str(s)) => FieldValue::Str(s),
        (Conversion::Pointer, FormatArg::Ptr(p)) => FieldValue::Str(format!("{:#x}", p)),
        (Conversion::Json, FormatArg::Json(v)) => FieldValue::Str(json_as_single_quoted(&v)),
        (_, other) => return Err(other),
    };
    Ok(Some(value))
}

// ============================================================================
// 字段列表
// ============================================================================

/// 一次日志调用的有序字段列表
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    items: Vec<(String, FieldValue)>,
}

impl Fields {
    /// 创建空列表
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加任意字段
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.items.push((key.into(), value.into()));
    }

    /// 追加字符串字段（构建器形式）
    pub fn str(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.items.push((key.into(), FieldValue::Str(value.into())));
        self
    }

    /// 追加整数字段
    pub fn int(mut self, key: impl Into<String>, value: i64) -> Self {
        self.items.push((key.into(), FieldValue::Int(value)));
        self
    }

    /// 追加实数字段
    pub fn real(mut self, key: impl Into<String>, value: f64) -> Self {
        self.items.push((key.into(), FieldValue::Real(value)));
        self
    }

    /// 追加 null 字段
    pub fn null(mut self, key: impl Into<String>) -> Self {
        self.items.push((key.into(), FieldValue::Null));
        self
    }

    /// 追加 JSON 字段
    pub fn json(mut self, key: impl Into<String>, value: Value) -> Self {
        self.items.push((key.into(), FieldValue::Json(value)));
        self
    }

    /// 按 printf 格式说明符追加字段
    ///
    /// # Errors
    ///
    /// 格式串没有可识别的说明符，或参数类型与说明符不符时返回
    /// [`CoreError::FormatMismatch`]
    pub fn push_formatted(&mut self, key: &str, format: &str, arg: FormatArg) -> Result<()> {
        let mismatch = || CoreError::FormatMismatch {
            key: key.to_string(),
            format: format.to_string(),
        };
        let conversion = Conversion::parse(format).ok_or_else(mismatch)?;
        match convert(conversion, arg) {
            Ok(Some(value)) => {
                self.items.push((key.to_string(), value));
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(_) => Err(mismatch()),
        }
    }

    /// 字段数量
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 按顺序遍历字段
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.items.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// 查找字段
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// 最后一个字符串类型 `msg` 字段的值
    pub fn message(&self) -> Option<&str> {
        self.items.iter().rev().find_map(|(k, v)| match v {
            FieldValue::Str(s) if k == MSG_KEY => Some(s.as_str()),
            _ => None,
        })
    }

    /// 把所有字段按顺序追加到 JSON 缓冲
    pub fn append_to(&self, buffer: &mut JsonBuffer) {
        for (key, value) in &self.items {
            value.append_to(buffer, key);
        }
    }
}

impl<K: Into<String>, V: Into<FieldValue>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
