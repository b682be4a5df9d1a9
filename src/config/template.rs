//! 配置模板展开
//!
//! 三种模板语法：
//!
//! | 语法 | 位置 | 作用 |
//! |------|------|------|
//! | `{^^name^^}` | 对象键 | 按范围把 `__content__` 展开多次，结果合并为对象 `name` |
//! | `[^^name^^]` | 对象键 | 按范围把 `__content__` 展开多次，结果追加到数组 `name` |
//! | `(^^var^^)` | 任意文本 | 用变量值替换 |
//!
//! 范围模板的值必须是对象，且恰好包含 `__range__`、`__vars__`、`__content__` 三个键：
//!
//! ```json
//! {
//!     "{^^ports^^}": {
//!         "__range__": [[8000, 8002], 9000],
//!         "__vars__": {"host": "localhost"},
//!         "__content__": {"p(^^__range__^^)": "(^^host^^):(^^__range__^^)"}
//!     }
//! }
//! ```
//!
//! 每次展开前 `__vars__.__range__` 被设为当前整数的十进制字符串。

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::loader::type_name;
use crate::config::merge::json_dict_recursive_update;
use crate::utils::{CoreError, Result};

/// 对象范围展开键
pub const DICT_RANGE_PATTERN: &str = r"\{\^\^(.+?)\^\^\}";
/// 数组范围展开键
pub const LIST_RANGE_PATTERN: &str = r"\[\^\^(.+?)\^\^\]";
/// 变量宏
pub const MACRO_PATTERN: &str = r"\(\^\^(.+?)\^\^\)";

/// 范围模板中的范围键
pub const RANGE_KEY: &str = "__range__";
/// 范围模板中的变量键
pub const VARS_KEY: &str = "__vars__";
/// 范围模板中的内容键
pub const CONTENT_KEY: &str = "__content__";

/// 一次 `replace_vars` 最多执行的替换次数
pub const MAX_SUBSTITUTIONS: usize = 10_000;

/// 变量替换方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubstitutionMode {
    /// 在序列化后的 JSON 文本上替换，然后重新解析
    ///
    /// 变量值原样插入文本，值中的 JSON 语法字符会改变文档结构。
    #[default]
    Text,
    /// 只在字符串值和对象键内部替换
    Tree,
}

// ============================================================================
// 范围集合
// ============================================================================

/// 把范围描述展开为整数集合（按首次出现排序，去重）
///
/// 元素可以是整数、`[a, b]`（`a <= b`，闭区间）或嵌套数组。
///
/// ```
/// use jlog_core::config::template::listsrange2set;
/// use serde_json::json;
///
/// let set = listsrange2set(json!([1, [3, 5], 3, 7]).as_array().unwrap()).unwrap();
/// assert_eq!(set, vec![1, 3, 4, 5, 7]);
/// ```
pub fn listsrange2set(items: &[Value]) -> Result<Vec<i64>> {
    let mut set = Vec::new();
    collect_range(items, &mut set)?;
    Ok(set)
}

fn collect_range(items: &[Value], set: &mut Vec<i64>) -> Result<()> {
    for item in items {
        match item {
            Value::Number(n) => {
                let n = n
                    .as_i64()
                    .ok_or_else(|| CoreError::InvalidRange(format!("不是整数: {}", n)))?;
                insert_unique(set, n);
            }
            Value::Array(inner) => match as_bounds(inner) {
                Some((from, to)) => {
                    for n in from..=to {
                        insert_unique(set, n);
                    }
                }
                None => collect_range(inner, set)?,
            },
            other => {
                return Err(CoreError::InvalidRange(format!(
                    "范围元素必须是整数或数组, 实际是 {}",
                    type_name(other)
                )))
            }
        }
    }
    Ok(())
}

fn as_bounds(pair: &[Value]) -> Option<(i64, i64)> {
    match pair {
        [from, to] => {
            let (from, to) = (from.as_i64()?, to.as_i64()?);
            (from <= to).then_some((from, to))
        }
        _ => None,
    }
}

fn insert_unique(set: &mut Vec<i64>, n: i64) {
    if !set.contains(&n) {
        set.push(n);
    }
}

/// `__range__` 的值：数组按 [`listsrange2set`] 展开，单个整数视为单元素集合
pub fn range_set(value: &Value) -> Result<Vec<i64>> {
    match value {
        Value::Array(items) => listsrange2set(items),
        Value::Number(_) => listsrange2set(std::slice::from_ref(value)),
        other => Err(CoreError::InvalidRange(format!(
            "__range__ 必须是数组或整数, 实际是 {}",
            type_name(other)
        ))),
    }
}

// ============================================================================
// 展开器
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeKind {
    Dict,
    List,
}

/// 模板展开器，持有编译好的三个模式
#[derive(Debug, Clone)]
pub struct TemplateExpander {
    dict: Regex,
    list: Regex,
    var: Regex,
    mode: SubstitutionMode,
}

impl TemplateExpander {
    /// 编译模式
    pub fn new(mode: SubstitutionMode) -> Result<Self> {
        Ok(Self {
            dict: Regex::new(DICT_RANGE_PATTERN)?,
            list: Regex::new(LIST_RANGE_PATTERN)?,
            var: Regex::new(MACRO_PATTERN)?,
            mode,
        })
    }

    /// 变量替换方式
    pub fn mode(&self) -> SubstitutionMode {
        self.mode
    }

    /// 先展开对象范围，再展开数组范围
    pub fn expand(&self, value: &mut Value) -> Result<()> {
        self.expand_dict_ranges(value)?;
        self.expand_list_ranges(value)
    }

    /// 展开所有 `{^^name^^}` 键
    pub fn expand_dict_ranges(&self, value: &mut Value) -> Result<()> {
        self.expand_ranges(value, RangeKind::Dict)
    }

    /// 展开所有 `[^^name^^]` 键
    pub fn expand_list_ranges(&self, value: &mut Value) -> Result<()> {
        self.expand_ranges(value, RangeKind::List)
    }

    fn pattern(&self, kind: RangeKind) -> &Regex {
        match kind {
            RangeKind::Dict => &self.dict,
            RangeKind::List => &self.list,
        }
    }

    fn expand_ranges(&self, value: &mut Value, kind: RangeKind) -> Result<()> {
        match value {
            Value::Object(map) => self.expand_object(map, kind),
            Value::Array(items) => {
                for item in items.iter_mut() {
                    self.expand_ranges(item, kind)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// 逐个处理当前层的键：匹配的键就地展开后再深入展开结果，不匹配的键直接深入
    fn expand_object(&self, map: &mut Map<String, Value>, kind: RangeKind) -> Result<()> {
        let keys: Vec<String> = map.keys().cloned().collect();
        for key in keys {
            let group = self
                .pattern(kind)
                .captures(&key)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string());

            let Some(group) = group else {
                if let Some(child) = map.get_mut(&key) {
                    self.expand_ranges(child, kind)?;
                }
                continue;
            };

            let index = map.keys().position(|k| *k == key).unwrap_or(map.len());
            let Some(template) = map.shift_remove(&key) else {
                continue;
            };
            let expansions = self.instantiate(&key, &template)?;
            tracing::debug!(template = %key, group = %group, count = expansions.len(), "展开范围模板");

            match kind {
                RangeKind::Dict => {
                    let mut merged = Map::new();
                    for expansion in expansions {
                        match expansion {
                            Value::Object(obj) => json_dict_recursive_update(&mut merged, &obj, true),
                            other => {
                                return Err(CoreError::Template(format!(
                                    "'{}' 的展开结果必须是对象, 实际是 {}",
                                    key,
                                    type_name(&other)
                                )))
                            }
                        }
                    }
                    insert_at(map, index, group.clone(), Value::Object(merged));
                }
                RangeKind::List => match map.get_mut(&group) {
                    Some(Value::Array(existing)) => existing.extend(expansions),
                    Some(other) => {
                        return Err(CoreError::Template(format!(
                            "'{}' 已存在且不是数组 ({})",
                            group,
                            type_name(other)
                        )))
                    }
                    None => insert_at(map, index, group.clone(), Value::Array(expansions)),
                },
            }

            if let Some(result) = map.get_mut(&group) {
                self.expand_ranges(result, kind)?;
            }
        }
        Ok(())
    }

    /// 对范围中的每个整数实例化一次 `__content__`
    fn instantiate(&self, key: &str, template: &Value) -> Result<Vec<Value>> {
        let Value::Object(template) = template else {
            return Err(CoreError::Template(format!(
                "'{}' 的值必须是对象, 实际是 {}",
                key,
                type_name(template)
            )));
        };
        if let Some(extra) = template
            .keys()
            .find(|k| ![RANGE_KEY, VARS_KEY, CONTENT_KEY].contains(&k.as_str()))
        {
            return Err(CoreError::Template(format!(
                "'{}' 含有多余的键 '{}'",
                key, extra
            )));
        }
        let field = |name: &str| {
            template.get(name).ok_or_else(|| CoreError::TemplateMissingKey {
                template: key.to_string(),
                key: name.to_string(),
            })
        };
        let range = range_set(field(RANGE_KEY)?)?;
        let mut vars = match field(VARS_KEY)? {
            Value::Object(vars) => vars.clone(),
            other => {
                return Err(CoreError::Template(format!(
                    "'{}' 的 __vars__ 必须是对象, 实际是 {}",
                    key,
                    type_name(other)
                )))
            }
        };
        let content = field(CONTENT_KEY)?;

        range
            .into_iter()
            .map(|n| {
                vars.insert(RANGE_KEY.to_string(), Value::String(n.to_string()));
                self.replace_vars(content, &vars)
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // 变量替换
    // ------------------------------------------------------------------------

    /// 用 `vars` 替换 `value` 中的 `(^^name^^)`，未定义的变量原样保留
    pub fn replace_vars(&self, value: &Value, vars: &Map<String, Value>) -> Result<Value> {
        match self.mode {
            SubstitutionMode::Text => {
                let text = serde_json::to_string(value)?;
                let text = self.substitute(text, vars)?;
                serde_json::from_str(&text).map_err(|e| CoreError::ConfigParse {
                    source_name: "replace_vars".to_string(),
                    reason: format!("替换后的文本不是合法 JSON: {}", e),
                })
            }
            SubstitutionMode::Tree => self.replace_in_tree(value, vars),
        }
    }

    fn replace_in_tree(&self, value: &Value, vars: &Map<String, Value>) -> Result<Value> {
        Ok(match value {
            Value::String(s) => Value::String(self.substitute(s.clone(), vars)?),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.replace_in_tree(item, vars))
                    .collect::<Result<_>>()?,
            ),
            Value::Object(map) => {
                let mut out = Map::new();
                for (k, v) in map {
                    out.insert(self.substitute(k.clone(), vars)?, self.replace_in_tree(v, vars)?);
                }
                Value::Object(out)
            }
            other => other.clone(),
        })
    }

    /// 不动点替换：每次找最左边的已定义宏，替换它的全部出现后从头重新扫描
    fn substitute(&self, mut text: String, vars: &Map<String, Value>) -> Result<String> {
        let mut pos = 0;
        let mut substitutions = 0;
        while let Some(caps) = self.var.captures(&text[pos..]) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                break;
            };
            let Some(replacement) = vars.get(name.as_str()) else {
                pos += whole.end();
                continue;
            };

            let macro_text = whole.as_str().to_string();
            let rendered = render_var(replacement);
            if rendered.contains(&macro_text) {
                return Err(CoreError::Template(format!("变量 {} 引用了自身", macro_text)));
            }
            substitutions += 1;
            if substitutions > MAX_SUBSTITUTIONS {
                return Err(CoreError::Template(format!(
                    "变量替换超过 {} 次",
                    MAX_SUBSTITUTIONS
                )));
            }
            text = text.replace(&macro_text, &rendered);
            pos = 0;
        }
        Ok(text)
    }
}

/// 变量值的文本形式：字符串原样，整数十进制，其余为紧凑 JSON
fn render_var(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 用 `vars` 替换 `value` 中的变量宏
///
/// ```
/// use jlog_core::config::template::{replace_vars, SubstitutionMode};
/// use serde_json::json;
///
/// let vars = json!({"a": "X"});
/// let out = replace_vars(&json!("(^^a^^)-(^^a^^)"), vars.as_object().unwrap(), SubstitutionMode::Text).unwrap();
/// assert_eq!(out, json!("X-X"));
/// ```
pub fn replace_vars(value: &Value, vars: &Map<String, Value>, mode: SubstitutionMode) -> Result<Value> {
    TemplateExpander::new(mode)?.replace_vars(value, vars)
}

/// 把新键放到 `index` 处；键已存在时保持原位只替换值
fn insert_at(map: &mut Map<String, Value>, index: usize, key: String, value: Value) {
    if let Some(slot) = map.get_mut(&key) {
        *slot = value;
        return;
    }
    let mut entries: Vec<(String, Value)> = std::mem::take(map).into_iter().collect();
    entries.insert(index.min(entries.len()), (key, value));
    map.extend(entries);
}
