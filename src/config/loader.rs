//! 配置文本加载
//!
//! 文件和内存字符串通过同一个按行读取的入口（任意 [`BufRead`]）加载，
//! 每行 `#^^` 之后的内容作为注释丢弃，然后整体解析为 JSON。

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::Path;

use serde_json::{Map, Value};

use crate::utils::{CoreError, Result};

/// 行尾注释标记
pub const COMMENT_MARKER: &str = "#^^";

/// 去掉一行中 `#^^` 及其后的内容
pub fn strip_comment(line: &str) -> &str {
    match line.find(COMMENT_MARKER) {
        Some(pos) => &line[..pos],
        None => line,
    }
}

/// 逐行读取并去掉注释，返回拼接后的文本
pub fn read_stripped<R: BufRead>(mut reader: R) -> Result<String> {
    let mut text = String::new();
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let stripped = strip_comment(&line);
        text.push_str(stripped);
        // 注释吃掉了换行符时补回来，保持行号不变
        if stripped.len() != line.len() && line.ends_with('\n') {
            text.push('\n');
        }
    }
    Ok(text)
}

/// 从任意按行读取的来源加载 JSON
pub fn load_reader<R: BufRead>(reader: R, source_name: &str) -> Result<Value> {
    let text = read_stripped(reader)?;
    parse_text(&text, source_name)
}

/// 从内存字符串加载 JSON
pub fn load_str(text: &str, source_name: &str) -> Result<Value> {
    load_reader(Cursor::new(text.as_bytes()), source_name)
}

/// 从文件加载 JSON
pub fn load_file(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let source_name = path.display().to_string();
    let file = File::open(path).map_err(|e| CoreError::ConfigParse {
        source_name: source_name.clone(),
        reason: e.to_string(),
    })?;
    tracing::debug!(path = %source_name, "加载配置文件");
    load_reader(BufReader::new(file), &source_name)
}

/// 加载必须是对象的配置，空文本得到空对象
pub fn load_object(text: &str, source_name: &str) -> Result<Map<String, Value>> {
    if text.trim().is_empty() {
        return Ok(Map::new());
    }
    into_object(load_str(text, source_name)?, source_name)
}

/// 要求配置顶层是对象
pub fn into_object(value: Value, source_name: &str) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CoreError::ConfigParse {
            source_name: source_name.to_string(),
            reason: format!("顶层必须是对象, 实际是 {}", type_name(&other)),
        }),
    }
}

fn parse_text(text: &str, source_name: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| CoreError::ConfigParse {
        source_name: source_name.to_string(),
        reason: format!("第 {} 行第 {} 列: {}", e.line(), e.column(), e),
    })
}

/// JSON 值的类型名
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
