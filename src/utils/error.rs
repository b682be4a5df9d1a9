//! 错误类型定义
//!
//! 本模块定义了日志分发引擎、JSON 缓冲构建器和配置加载器使用的所有错误类型。

use thiserror::Error;

/// 核心错误类型
#[derive(Error, Debug)]
pub enum CoreError {
    // ==================== 日志引擎错误 ====================

    /// 引擎已启动
    #[error("日志引擎已启动: '{0}'")]
    AlreadyInitialized(String),

    /// 引擎未启动
    #[error("日志引擎未启动")]
    NotInitialized,

    /// 处理器类型表已满
    #[error("处理器类型表已满: 最多 {max} 个, 拒绝注册 '{name}'")]
    HandlerTableFull {
        max: usize,
        name: String,
    },

    /// 处理器类型已存在
    #[error("处理器类型已存在: '{0}'")]
    HandlerTypeExists(String),

    /// 处理器类型未找到
    #[error("处理器类型未找到: '{0}'")]
    HandlerTypeNotFound(String),

    /// 处理器实例已存在
    #[error("处理器实例已存在: '{0}'")]
    HandlerExists(String),

    /// 处理器类型不支持按参数打开
    #[error("处理器类型 '{0}' 不支持按参数打开")]
    HandlerNotOpenable(String),

    /// 处理器打开失败
    #[error("处理器打开失败: '{name}' - {reason}")]
    HandlerOpenFailed {
        name: String,
        reason: String,
    },

    /// 未知的日志选项名
    #[error("未知的日志选项: '{0}'")]
    UnknownOption(String),

    // ==================== JSON 缓冲错误 ====================

    /// 缓冲池已耗尽
    #[error("JSON 缓冲池已耗尽: 最多 {0} 个生成器")]
    PoolExhausted(usize),

    /// 无效的缓冲句柄
    #[error("无效的 JSON 缓冲句柄: {0}")]
    InvalidHandle(usize),

    /// 格式说明符与参数类型不匹配
    #[error("格式说明符不匹配: key '{key}', format '{format}'")]
    FormatMismatch {
        key: String,
        format: String,
    },

    // ==================== 配置错误 ====================

    /// 配置解析失败
    #[error("配置解析失败: {source_name} - {reason}")]
    ConfigParse {
        source_name: String,
        reason: String,
    },

    /// 模板缺少必需的键
    #[error("模板 '{template}' 缺少必需的键 '{key}'")]
    TemplateMissingKey {
        template: String,
        key: String,
    },

    /// 模板展开失败
    #[error("模板展开失败: {0}")]
    Template(String),

    /// 无效的范围定义
    #[error("无效的范围定义: {0}")]
    InvalidRange(String),

    /// 正则表达式编译失败
    #[error("正则表达式错误: {0}")]
    Regex(#[from] regex::Error),

    // ==================== IO 和序列化错误 ====================

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    // ==================== 通用错误 ====================

    /// 初始化失败
    #[error("初始化失败: {0}")]
    InitFailed(String),
}

/// 操作结果类型别名
pub type Result<T> = std::result::Result<T, CoreError>;

/// 错误码常量
pub mod error_code {
    // 日志引擎错误 (LOG-xxx)
    pub const LOG_ALREADY_INITIALIZED: &str = "LOG-001";
    pub const LOG_NOT_INITIALIZED: &str = "LOG-002";
    pub const LOG_TABLE_FULL: &str = "LOG-003";
    pub const LOG_TYPE_NOT_FOUND: &str = "LOG-004";
    pub const LOG_DUPLICATE: &str = "LOG-005";
    pub const LOG_HANDLER_OPEN_FAILED: &str = "LOG-006";
    pub const LOG_BAD_OPTION: &str = "LOG-007";

    // JSON 缓冲错误 (JSON-xxx)
    pub const JSON_POOL_EXHAUSTED: &str = "JSON-001";
    pub const JSON_INVALID_HANDLE: &str = "JSON-002";
    pub const JSON_FORMAT_MISMATCH: &str = "JSON-003";
    pub const JSON_SERDE: &str = "JSON-004";

    // 配置错误 (CONFIG-xxx)
    pub const CONFIG_PARSE: &str = "CONFIG-001";
    pub const CONFIG_TEMPLATE: &str = "CONFIG-002";
    pub const CONFIG_RANGE: &str = "CONFIG-003";

    // IO 错误 (IO-xxx)
    pub const IO_ERROR: &str = "IO-001";
}

impl CoreError {
    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::AlreadyInitialized(_) => error_code::LOG_ALREADY_INITIALIZED,
            CoreError::NotInitialized => error_code::LOG_NOT_INITIALIZED,
            CoreError::HandlerTableFull { .. } => error_code::LOG_TABLE_FULL,
            CoreError::HandlerTypeNotFound(_) => error_code::LOG_TYPE_NOT_FOUND,
            CoreError::HandlerTypeExists(_) | CoreError::HandlerExists(_) => {
                error_code::LOG_DUPLICATE
            }
            CoreError::HandlerNotOpenable(_) | CoreError::HandlerOpenFailed { .. } => {
                error_code::LOG_HANDLER_OPEN_FAILED
            }
            CoreError::UnknownOption(_) => error_code::LOG_BAD_OPTION,
            CoreError::PoolExhausted(_) => error_code::JSON_POOL_EXHAUSTED,
            CoreError::InvalidHandle(_) => error_code::JSON_INVALID_HANDLE,
            CoreError::FormatMismatch { .. } => error_code::JSON_FORMAT_MISMATCH,
            CoreError::Json(_) => error_code::JSON_SERDE,
            CoreError::ConfigParse { .. } => error_code::CONFIG_PARSE,
            CoreError::TemplateMissingKey { .. } | CoreError::Template(_) | CoreError::Regex(_) => {
                error_code::CONFIG_TEMPLATE
            }
            CoreError::InvalidRange(_) => error_code::CONFIG_RANGE,
            CoreError::Io(_) => error_code::IO_ERROR,
            CoreError::InitFailed(_) => "UNKNOWN",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::HandlerTypeNotFound("syslog".to_string());
        assert!(err.to_string().contains("syslog"));
    }

    #[test]
    fn test_error_code() {
        let err = CoreError::HandlerTableFull {
            max: 10,
            name: "extra".to_string(),
        };
        assert_eq!(err.error_code(), error_code::LOG_TABLE_FULL);

        let err = CoreError::Template("bad".to_string());
        assert_eq!(err.error_code(), error_code::CONFIG_TEMPLATE);
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let core_err: CoreError = io_err.into();
        assert!(matches!(core_err, CoreError::Io(_)));
        assert_eq!(core_err.error_code(), error_code::IO_ERROR);
    }
}
