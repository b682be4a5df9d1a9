//! 应用配置
//!
//! 应用配置本身也经过 JSON 配置流水线加载，因此可以使用范围模板和变量：
//!
//! ```json
//! {
//!     "logging": {
//!         "app_name": "gateway",
//!         "handlers": [
//!             {"name": "console", "type": "stdout", "options": ["up_warning"]},
//!             {"name": "audit", "type": "file", "options": ["audit", "notime"],
//!              "params": {"directory": "/var/log/gateway", "rotation": "daily"}}
//!         ]
//!     },
//!     "diagnostics": {"level": "warn"}
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::pipeline::{json_config_value, ConfigFiles, JsonConfigRequest};
use crate::log::{LogEngine, LogOptions};
use crate::utils::logger::LoggerConfig;
use crate::utils::process::Terminator;
use crate::utils::Result;

/// 处理器实例配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerSpec {
    /// 实例名
    pub name: String,

    /// 处理器类型名
    #[serde(rename = "type")]
    pub type_name: String,

    /// 选项名列表（见 [`LogOptions::from_names`]），为空时接收所有级别
    #[serde(default)]
    pub options: Vec<String>,

    /// 传给类型工厂的参数
    #[serde(default = "default_params")]
    pub params: Value,
}

fn default_params() -> Value {
    Value::Object(Default::default())
}

impl HandlerSpec {
    /// 创建处理器配置
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            options: Vec::new(),
            params: default_params(),
        }
    }

    /// 设置选项
    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    /// 设置参数
    pub fn params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// 解析选项
    pub fn log_options(&self) -> Result<LogOptions> {
        LogOptions::from_names(&self.options)
    }
}

/// 日志分发配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    /// 应用名
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// 应用版本
    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// 处理器实例，按顺序添加
    #[serde(default)]
    pub handlers: Vec<HandlerSpec>,

    /// 处理器类型数量上限
    #[serde(default = "default_max_handler_types")]
    pub max_handler_types: usize,

    /// JSON 日志行是否缩进
    #[serde(default)]
    pub indented: bool,
}

fn default_app_name() -> String {
    "jlog".to_string()
}

fn default_app_version() -> String {
    crate::VERSION.to_string()
}

fn default_max_handler_types() -> usize {
    crate::log::engine::DEFAULT_MAX_HANDLER_TYPES
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            app_version: default_app_version(),
            handlers: Vec::new(),
            max_handler_types: default_max_handler_types(),
            indented: false,
        }
    }
}

/// 内部诊断日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// 诊断日志级别
    #[serde(default = "default_diagnostics_level")]
    pub level: String,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json_format: bool,

    /// 自定义过滤指令
    #[serde(default)]
    pub filter_directives: Option<String>,
}

fn default_diagnostics_level() -> String {
    "warn".to_string()
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            level: default_diagnostics_level(),
            json_format: false,
            filter_directives: None,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// 日志分发
    #[serde(default)]
    pub logging: LogSettings,

    /// 内部诊断日志
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

/// 应用配置的来源
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// 固定配置文本
    pub fixed: String,
    /// 可变配置文本
    pub variable: String,
    /// 配置文件
    pub files: ConfigFiles,
    /// 参数配置文本
    pub parameters: String,
}

impl ConfigSources {
    fn to_request(&self) -> JsonConfigRequest {
        JsonConfigRequest::new()
            .fixed(self.fixed.clone())
            .variable(self.variable.clone())
            .files(self.files.clone())
            .parameters(self.parameters.clone())
    }
}

impl CoreConfig {
    /// 创建配置构建器
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::new()
    }

    /// 经配置流水线合并、展开后反序列化
    pub fn from_sources(sources: &ConfigSources) -> Result<Self> {
        let value = json_config_value(&sources.to_request())?;
        Ok(serde_json::from_value(value)?)
    }

    /// 从单个文件加载
    pub fn from_file(path: impl Into<std::path::PathBuf>) -> Result<Self> {
        Self::from_sources(&ConfigSources {
            files: ConfigFiles(vec![path.into()]),
            ..ConfigSources::default()
        })
    }

    /// 从 JSON 文本加载（同样支持模板）
    pub fn from_json_str(text: &str) -> Result<Self> {
        Self::from_sources(&ConfigSources {
            variable: text.to_string(),
            ..ConfigSources::default()
        })
    }

    /// 诊断日志配置，命令行给出的级别优先于 diagnostics 段
    pub fn logger_config(&self, level: Option<&str>) -> LoggerConfig {
        let mut config = LoggerConfig::from_diagnostics(&self.diagnostics);
        if let Some(level) = level {
            config.level = level.to_string();
        }
        config
    }
}

impl LogEngine {
    /// 按配置创建并启动引擎，依次打开配置中的处理器
    pub fn from_config(
        settings: &LogSettings,
        executable: &str,
        terminator: std::sync::Arc<dyn Terminator>,
    ) -> Result<Self> {
        let engine = LogEngine::builder()
            .max_handler_types(settings.max_handler_types)
            .indented(settings.indented)
            .terminator(terminator)
            .build();
        engine.startup(&settings.app_name, &settings.app_version, executable)?;

        for spec in &settings.handlers {
            let options = spec.log_options()?;
            engine.open_handler(&spec.name, &spec.type_name, options, &spec.params)?;
        }
        Ok(engine)
    }
}

/// 配置构建器
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            config: CoreConfig::default(),
        }
    }

    /// 设置应用名
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.config.logging.app_name = name.into();
        self
    }

    /// 设置应用版本
    pub fn app_version(mut self, version: impl Into<String>) -> Self {
        self.config.logging.app_version = version.into();
        self
    }

    /// 添加处理器
    pub fn handler(mut self, spec: HandlerSpec) -> Self {
        self.config.logging.handlers.push(spec);
        self
    }

    /// 设置处理器类型数量上限
    pub fn max_handler_types(mut self, max: usize) -> Self {
        self.config.logging.max_handler_types = max;
        self
    }

    /// 启用缩进 JSON
    pub fn indented(mut self) -> Self {
        self.config.logging.indented = true;
        self
    }

    /// 设置诊断日志级别
    pub fn diagnostics_level(mut self, level: impl Into<String>) -> Self {
        self.config.diagnostics.level = level.into();
        self
    }

    /// 诊断日志使用 JSON 格式
    pub fn diagnostics_json(mut self) -> Self {
        self.config.diagnostics.json_format = true;
        self
    }

    /// 构建配置
    pub fn build(self) -> CoreConfig {
        self.config
    }
}
