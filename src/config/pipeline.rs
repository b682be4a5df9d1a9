//! 配置流水线
//!
//! 按固定顺序把最多四个来源合成一份最终配置：
//!
//! 1. 解析固定配置（只读基线）和可变配置（可写基线）
//! 2. 按顺序把每个配置文件合并进可变配置（覆盖）
//! 3. 把参数配置合并进可变配置（覆盖）
//! 4. 把可变配置合并进固定配置（不覆盖，固定配置优先）
//! 5. 展开 `{^^name^^}` 对象范围模板
//! 6. 展开 `[^^name^^]` 数组范围模板
//! 7. 若顶层有 `__json_config_variables__`，移除它、注入 `__hostname__`，
//!    并用它对整个文档做一次变量替换
//!
//! 出错时按 [`QuitPolicy`] 处理；设置打印标志时打印结果并请求以 0 退出。

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::loader::{self, type_name};
use crate::config::merge::json_dict_recursive_update;
use crate::config::template::{SubstitutionMode, TemplateExpander};
use crate::utils::process::{self, QuitPolicy, Termination, Terminator};
use crate::utils::{CoreError, Result};

/// 顶层变量表键
pub const VARIABLES_KEY: &str = "__json_config_variables__";
/// 注入变量表的主机名键
pub const HOSTNAME_VAR: &str = "__hostname__";

// ============================================================================
// 配置文件列表
// ============================================================================

/// 配置文件列表：单个路径，或 JSON 数组形式的多个路径
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFiles(pub Vec<PathBuf>);

impl ConfigFiles {
    /// 解析文件描述
    ///
    /// 以 `[` 开头时按 JSON 字符串数组解析，否则视为单个路径；空白得到空列表。
    ///
    /// ```
    /// use jlog_core::config::ConfigFiles;
    ///
    /// assert_eq!(ConfigFiles::parse("a.json").unwrap().len(), 1);
    /// assert_eq!(ConfigFiles::parse(r#"["a.json", "b.json"]"#).unwrap().len(), 2);
    /// ```
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Ok(Self::default());
        }
        if !spec.starts_with('[') {
            return Ok(Self(vec![PathBuf::from(spec)]));
        }

        let items = match loader::load_str(spec, "config files")? {
            Value::Array(items) => items,
            other => {
                return Err(CoreError::ConfigParse {
                    source_name: "config files".to_string(),
                    reason: format!("应为数组, 实际是 {}", type_name(&other)),
                })
            }
        };
        items
            .into_iter()
            .map(|item| match item {
                Value::String(path) => Ok(PathBuf::from(path)),
                other => Err(CoreError::ConfigParse {
                    source_name: "config files".to_string(),
                    reason: format!("文件路径必须是字符串, 实际是 {}", type_name(&other)),
                }),
            })
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    /// 文件数
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 遍历路径
    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.0.iter()
    }
}

impl From<Vec<PathBuf>> for ConfigFiles {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self(paths)
    }
}

// ============================================================================
// 请求
// ============================================================================

/// 一次配置流水线的输入
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonConfigRequest {
    /// 打印合并后（展开前）的文档和最终文档，然后退出
    pub print_verbose: bool,
    /// 打印最终文档，然后退出
    pub print_final: bool,
    /// 固定配置文本（优先级最高）
    pub fixed_config: String,
    /// 可变配置文本
    pub variable_config: String,
    /// 配置文件
    pub files: ConfigFiles,
    /// 参数配置文本（如命令行覆盖）
    pub parameter_config: String,
    /// 错误处理策略
    pub quit_policy: QuitPolicy,
    /// 变量替换方式
    pub substitution: SubstitutionMode,
}

impl JsonConfigRequest {
    /// 创建空请求
    pub fn new() -> Self {
        Self::default()
    }

    /// 固定配置
    pub fn fixed(mut self, text: impl Into<String>) -> Self {
        self.fixed_config = text.into();
        self
    }

    /// 可变配置
    pub fn variable(mut self, text: impl Into<String>) -> Self {
        self.variable_config = text.into();
        self
    }

    /// 配置文件
    pub fn files(mut self, files: impl Into<ConfigFiles>) -> Self {
        self.files = files.into();
        self
    }

    /// 参数配置
    pub fn parameters(mut self, text: impl Into<String>) -> Self {
        self.parameter_config = text.into();
        self
    }

    /// 错误处理策略
    pub fn quit_policy(mut self, policy: QuitPolicy) -> Self {
        self.quit_policy = policy;
        self
    }

    /// 变量替换方式
    pub fn substitution(mut self, mode: SubstitutionMode) -> Self {
        self.substitution = mode;
        self
    }

    /// 打印标志
    pub fn print(mut self, verbose: bool, final_only: bool) -> Self {
        self.print_verbose = verbose;
        self.print_final = final_only;
        self
    }
}

// ============================================================================
// 流水线
// ============================================================================

/// 运行配置流水线，返回最终文档的缩进 JSON 文本
///
/// 出错时按 `quit_policy` 请求终止；`Continue` 或终止请求返回后都得到 `Err`。
/// 设置打印标志时，结果打印到标准输出并请求 `Exit(0)`，终止请求返回后仍返回结果文本。
pub fn json_config(request: &JsonConfigRequest, terminator: &dyn Terminator) -> Result<String> {
    let value = match build_document(request) {
        Ok(value) => value,
        Err(err) => return Err(quit(request.quit_policy, terminator, err)),
    };

    let text = match serde_json::to_string_pretty(&value) {
        Ok(text) => text,
        Err(err) => return Err(quit(request.quit_policy, terminator, err.into())),
    };

    if request.print_verbose || request.print_final {
        println!("{}", text);
        terminator.terminate(Termination::Exit(0));
    }
    Ok(text)
}

/// 运行流水线直到得到最终文档，出错时直接返回错误，不请求终止
pub fn json_config_value(request: &JsonConfigRequest) -> Result<Value> {
    build_document(request)
}

fn build_document(request: &JsonConfigRequest) -> Result<Value> {
    let mut fixed = loader::load_object(&request.fixed_config, "fixed config")?;
    let mut variable = loader::load_object(&request.variable_config, "variable config")?;

    for path in request.files.iter() {
        let file = loader::into_object(loader::load_file(path)?, &path.display().to_string())?;
        json_dict_recursive_update(&mut variable, &file, true);
    }

    let parameters = loader::load_object(&request.parameter_config, "parameter config")?;
    json_dict_recursive_update(&mut variable, &parameters, true);

    json_dict_recursive_update(&mut fixed, &variable, false);
    let mut document = Value::Object(fixed);
    tracing::debug!(files = request.files.len(), "配置来源已合并");

    if request.print_verbose {
        println!("{}", serde_json::to_string_pretty(&document)?);
    }

    let expander = TemplateExpander::new(request.substitution)?;
    expander.expand_dict_ranges(&mut document)?;
    expander.expand_list_ranges(&mut document)?;

    apply_variables(&expander, document)
}

/// 用顶层变量表替换整个文档
fn apply_variables(expander: &TemplateExpander, mut document: Value) -> Result<Value> {
    let variables = match document.as_object_mut() {
        Some(map) => map.shift_remove(VARIABLES_KEY),
        None => None,
    };
    let Some(variables) = variables else {
        return Ok(document);
    };

    let mut variables = match variables {
        Value::Object(vars) => vars,
        other => {
            return Err(CoreError::Template(format!(
                "{} 必须是对象, 实际是 {}",
                VARIABLES_KEY,
                type_name(&other)
            )))
        }
    };
    variables.insert(HOSTNAME_VAR.to_string(), Value::String(process::hostname()));
    expander.replace_vars(&document, &variables)
}

fn quit(policy: QuitPolicy, terminator: &dyn Terminator, err: CoreError) -> CoreError {
    tracing::error!(code = err.error_code(), ?policy, "配置加载失败: {}", err);
    if let Some(termination) = policy.termination() {
        terminator.terminate(termination);
    }
    err
}
