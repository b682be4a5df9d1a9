//! 日志级别与选项位集

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::utils::{CoreError, Result};

// ============================================================================
// Severity
// ============================================================================

/// 日志级别，数值越小越严重
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// 系统不可用
    Emerg = 0,
    /// 必须立即处理
    Alert = 1,
    /// 严重错误
    Crit = 2,
    /// 错误
    Err = 3,
    /// 警告
    Warning = 4,
    /// 需要注意的正常事件
    Notice = 5,
    /// 信息
    Info = 6,
    /// 调试
    Debug = 7,
    /// 审计
    Audit = 8,
    /// 监控
    Monitor = 9,
}

impl Severity {
    /// 所有级别，按数值顺序
    pub const ALL: [Severity; 10] = [
        Severity::Emerg,
        Severity::Alert,
        Severity::Crit,
        Severity::Err,
        Severity::Warning,
        Severity::Notice,
        Severity::Info,
        Severity::Debug,
        Severity::Audit,
        Severity::Monitor,
    ];

    /// 级别对应的选项位
    pub fn option_bit(self) -> LogOptions {
        LogOptions(1 << self as u32)
    }

    /// 级别名称
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Emerg => "EMERGENCY",
            Severity::Alert => "ALERT",
            Severity::Crit => "CRITICAL",
            Severity::Err => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Notice => "NOTICE",
            Severity::Info => "INFO",
            Severity::Debug => "DEBUG",
            Severity::Audit => "AUDIT",
            Severity::Monitor => "MONITOR",
        }
    }

    /// 数组下标
    pub fn index(self) -> usize {
        self as usize
    }

    /// 按名称解析级别（不区分大小写，接受缩写）
    pub fn from_name(name: &str) -> Result<Self> {
        let severity = match name.trim().to_lowercase().as_str() {
            "emerg" | "emergency" => Severity::Emerg,
            "alert" => Severity::Alert,
            "crit" | "critical" => Severity::Crit,
            "err" | "error" => Severity::Err,
            "warn" | "warning" => Severity::Warning,
            "notice" => Severity::Notice,
            "info" => Severity::Info,
            "debug" => Severity::Debug,
            "audit" => Severity::Audit,
            "monitor" => Severity::Monitor,
            other => return Err(CoreError::UnknownOption(other.to_string())),
        };
        Ok(severity)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// LogOptions
// ============================================================================

/// 日志选项位集
///
/// 低位是各级别的开关（处理器实例据此过滤），高位是行为标志。
/// 同一类型既用作处理器实例的选项，也用作单次日志调用的选项。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LogOptions(pub u32);

impl LogOptions {
    /// 空集
    pub const NONE: LogOptions = LogOptions(0);
    /// 级别位 EMERG
    pub const EMERG: LogOptions = LogOptions(1 << 0);
    /// 级别位 ALERT
    pub const ALERT: LogOptions = LogOptions(1 << 1);
    /// 级别位 CRIT
    pub const CRITICAL: LogOptions = LogOptions(1 << 2);
    /// 级别位 ERR
    pub const ERROR: LogOptions = LogOptions(1 << 3);
    /// 级别位 WARNING
    pub const WARNING: LogOptions = LogOptions(1 << 4);
    /// 级别位 NOTICE
    pub const NOTICE: LogOptions = LogOptions(1 << 5);
    /// 级别位 INFO
    pub const INFO: LogOptions = LogOptions(1 << 6);
    /// 级别位 DEBUG
    pub const DEBUG: LogOptions = LogOptions(1 << 7);
    /// 级别位 AUDIT
    pub const AUDIT: LogOptions = LogOptions(1 << 8);
    /// 级别位 MONITOR
    pub const MONITOR: LogOptions = LogOptions(1 << 9);

    /// 输出调用栈
    pub const TRACE_STACK: LogOptions = LogOptions(1 << 12);
    /// 不加时间戳
    pub const NOTIME: LogOptions = LogOptions(1 << 13);
    /// 不加 process/hostname/pid（CRIT 及以上仍然添加）
    pub const NODISCOVER: LogOptions = LogOptions(1 << 14);
    /// 日志后以 0 退出
    pub const EXIT_ZERO: LogOptions = LogOptions(1 << 16);
    /// 日志后以 -1 退出
    pub const EXIT_NEGATIVE: LogOptions = LogOptions(1 << 17);
    /// 日志后 abort
    pub const ABORT: LogOptions = LogOptions(1 << 18);

    /// EMERG 到 ERR
    pub const UP_ERROR: LogOptions = LogOptions(0x000F);
    /// EMERG 到 WARNING
    pub const UP_WARNING: LogOptions = LogOptions(0x001F);
    /// EMERG 到 INFO
    pub const UP_INFO: LogOptions = LogOptions(0x007F);
    /// 所有级别
    pub const ALL: LogOptions = LogOptions(0x03FF);

    /// 是否包含 `other` 的所有位
    pub fn contains(self, other: LogOptions) -> bool {
        self.0 & other.0 == other.0
    }

    /// 是否与 `other` 有交集
    pub fn intersects(self, other: LogOptions) -> bool {
        self.0 & other.0 != 0
    }

    /// 是否为空
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// 是否请求终止进程
    pub fn wants_termination(self) -> bool {
        self.intersects(LogOptions::EXIT_ZERO | LogOptions::EXIT_NEGATIVE | LogOptions::ABORT)
    }

    /// 从选项名列表解析
    ///
    /// ```
    /// use jlog_core::log::LogOptions;
    ///
    /// let opts = LogOptions::from_names(["error", "warning", "notime"]).unwrap();
    /// assert!(opts.contains(LogOptions::ERROR | LogOptions::NOTIME));
    /// ```
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = LogOptions::NONE;
        for name in names {
            options |= Self::from_name(name.as_ref())?;
        }
        Ok(options)
    }

    fn from_name(name: &str) -> Result<Self> {
        let option = match name.trim().to_lowercase().as_str() {
            "emerg" | "emergency" => LogOptions::EMERG,
            "alert" => LogOptions::ALERT,
            "crit" | "critical" => LogOptions::CRITICAL,
            "err" | "error" => LogOptions::ERROR,
            "warn" | "warning" => LogOptions::WARNING,
            "notice" => LogOptions::NOTICE,
            "info" => LogOptions::INFO,
            "debug" => LogOptions::DEBUG,
            "audit" => LogOptions::AUDIT,
            "monitor" => LogOptions::MONITOR,
            "up_error" => LogOptions::UP_ERROR,
            "up_warning" => LogOptions::UP_WARNING,
            "up_info" => LogOptions::UP_INFO,
            "all" => LogOptions::ALL,
            "trace_stack" => LogOptions::TRACE_STACK,
            "notime" => LogOptions::NOTIME,
            "nodiscover" => LogOptions::NODISCOVER,
            "exit_zero" => LogOptions::EXIT_ZERO,
            "exit_negative" => LogOptions::EXIT_NEGATIVE,
            "abort" => LogOptions::ABORT,
            other => return Err(CoreError::UnknownOption(other.to_string())),
        };
        Ok(option)
    }
}

impl BitOr for LogOptions {
    type Output = LogOptions;

    fn bitor(self, rhs: LogOptions) -> LogOptions {
        LogOptions(self.0 | rhs.0)
    }
}

impl BitOrAssign for LogOptions {
    fn bitor_assign(&mut self, rhs: LogOptions) {
        self.0 |= rhs.0;
    }
}

/// 处理器实例是否忽略该级别
pub fn must_ignore(options: LogOptions, severity: Severity) -> bool {
    !options.contains(severity.option_bit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Severity::Emerg < Severity::Crit);
        assert!(Severity::Err <= Severity::Err);
        assert!(Severity::Debug > Severity::Err);
        assert_eq!(Severity::Monitor.index(), 9);
    }

    #[test]
    fn test_severity_from_name() {
        assert_eq!(Severity::from_name("WARN").unwrap(), Severity::Warning);
        assert_eq!(Severity::from_name(" crit ").unwrap(), Severity::Crit);
        assert!(Severity::from_name("fatal").is_err());
    }

    #[test]
    fn test_must_ignore_truth_table() {
        // 对任意级别 S 和选项集 O：S 的位在 O 中时才接收
        for mask in [0u32, 0x001, 0x008, 0x0F0, 0x155, 0x2AA, 0x3FF] {
            let options = LogOptions(mask);
            for severity in Severity::ALL {
                let expected = mask & (1 << severity as u32) != 0;
                assert_eq!(!must_ignore(options, severity), expected);
            }
        }
    }

    #[test]
    fn test_flags_do_not_enable_severities() {
        let options = LogOptions::TRACE_STACK | LogOptions::NOTIME | LogOptions::NODISCOVER;
        for severity in Severity::ALL {
            assert!(must_ignore(options, severity));
        }
    }

    #[test]
    fn test_presets() {
        assert!(!must_ignore(LogOptions::UP_ERROR, Severity::Err));
        assert!(must_ignore(LogOptions::UP_ERROR, Severity::Warning));
        assert!(!must_ignore(LogOptions::UP_WARNING, Severity::Warning));
        assert!(!must_ignore(LogOptions::UP_INFO, Severity::Info));
        assert!(must_ignore(LogOptions::UP_INFO, Severity::Debug));
        assert!(!must_ignore(LogOptions::ALL, Severity::Monitor));
    }

    #[test]
    fn test_from_names() {
        let options = LogOptions::from_names(["all", "nodiscover"]).unwrap();
        assert!(options.contains(LogOptions::ALL));
        assert!(options.contains(LogOptions::NODISCOVER));

        let err = LogOptions::from_names(["verbose"]).unwrap_err();
        assert!(matches!(err, CoreError::UnknownOption(_)));
    }

    #[test]
    fn test_wants_termination() {
        assert!(!LogOptions::TRACE_STACK.wants_termination());
        assert!(LogOptions::EXIT_ZERO.wants_termination());
        assert!((LogOptions::ERROR | LogOptions::ABORT).wants_termination());
    }
}
