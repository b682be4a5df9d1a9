//! 日志计数
//!
//! 每个级别一个原子计数器，日志调用开始时递增，计数值同时传给 inform 回调。
//!
//! ```rust
//! use jlog_core::log::Severity;
//! use jlog_core::utils::metrics::SeverityCounters;
//!
//! let counters = SeverityCounters::new();
//! assert_eq!(counters.increment(Severity::Err), 1);
//! assert_eq!(counters.get(Severity::Err), 1);
//!
//! let report = counters.export();
//! let json = serde_json::to_string_pretty(&report).unwrap();
//! assert!(json.contains("ERROR"));
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::log::Severity;

/// 按级别计数的收集器
#[derive(Debug)]
pub struct SeverityCounters {
    /// 各级别计数，下标为 `Severity::index()`
    counts: [AtomicU64; 10],
    /// 收集开始时间
    start_time: DateTime<Utc>,
}

/// 计数报告
#[derive(Debug, Clone, Serialize)]
pub struct SeverityReport {
    /// 导出时间
    pub timestamp: DateTime<Utc>,
    /// 运行时长（秒）
    pub uptime_seconds: u64,
    /// 级别名 -> 计数（按严重程度排列）
    pub counts: IndexMap<String, u64>,
    /// 总数
    pub total: u64,
}

impl SeverityCounters {
    /// 创建计数器
    pub fn new() -> Self {
        Self {
            counts: Default::default(),
            start_time: Utc::now(),
        }
    }

    /// 递增并返回递增后的值
    pub fn increment(&self, severity: Severity) -> u64 {
        self.counts[severity.index()].fetch_add(1, Ordering::Relaxed) + 1
    }

    /// 当前计数
    pub fn get(&self, severity: Severity) -> u64 {
        self.counts[severity.index()].load(Ordering::Relaxed)
    }

    /// 所有级别的总数
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    /// 清零
    pub fn reset(&self) {
        for count in &self.counts {
            count.store(0, Ordering::Relaxed);
        }
    }

    /// 导出报告
    pub fn export(&self) -> SeverityReport {
        let counts = Severity::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), self.get(*s)))
            .collect();
        SeverityReport {
            timestamp: Utc::now(),
            uptime_seconds: Utc::now()
                .signed_duration_since(self.start_time)
                .num_seconds()
                .max(0) as u64,
            counts,
            total: self.total(),
        }
    }
}

impl Default for SeverityCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_increment_and_reset() {
        let counters = SeverityCounters::new();
        assert_eq!(counters.increment(Severity::Info), 1);
        assert_eq!(counters.increment(Severity::Info), 2);
        assert_eq!(counters.increment(Severity::Debug), 1);
        assert_eq!(counters.total(), 3);

        counters.reset();
        assert_eq!(counters.get(Severity::Info), 0);
        assert_eq!(counters.total(), 0);
    }

    #[test]
    fn test_concurrent_increments() {
        let counters = Arc::new(SeverityCounters::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = counters.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        c.increment(Severity::Warning);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counters.get(Severity::Warning), 800);
    }

    #[test]
    fn test_export_order() {
        let counters = SeverityCounters::new();
        counters.increment(Severity::Monitor);
        let report = counters.export();
        let names: Vec<&String> = report.counts.keys().collect();
        assert_eq!(names.first().map(|s| s.as_str()), Some("EMERGENCY"));
        assert_eq!(names.last().map(|s| s.as_str()), Some("MONITOR"));
        assert_eq!(report.counts["MONITOR"], 1);
        assert_eq!(report.total, 1);
    }
}
