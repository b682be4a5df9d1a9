//! 进程相关工具
//!
//! - 进程终止策略（`Terminator`），由调用方注入，替代库内部直接 `exit`/`abort`
//! - 错误输入的处理策略（`QuitPolicy`）
//! - 主机标识（主机名、进程 ID、进程名）

use std::path::Path;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

// ============================================================================
// 终止动作
// ============================================================================

/// 进程终止动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// 以指定退出码退出
    Exit(i32),
    /// 调用 `abort()`
    Abort,
}

/// 进程终止器
///
/// 日志引擎和配置管道在需要结束进程时调用此 trait，
/// 而不是直接调用 `std::process::exit`。生产环境使用 [`ProcessTerminator`]，
/// 测试中使用 [`RecordingTerminator`]。
pub trait Terminator: Send + Sync {
    /// 执行终止动作
    fn terminate(&self, termination: Termination);
}

/// 真正结束当前进程的终止器
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTerminator;

impl Terminator for ProcessTerminator {
    fn terminate(&self, termination: Termination) {
        match termination {
            Termination::Exit(code) => std::process::exit(code),
            Termination::Abort => std::process::abort(),
        }
    }
}

/// 只记录终止请求、不结束进程的终止器
#[derive(Debug, Default)]
pub struct RecordingTerminator {
    requests: Mutex<Vec<Termination>>,
}

impl RecordingTerminator {
    /// 创建新的记录终止器
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取所有已记录的终止请求
    pub fn requests(&self) -> Vec<Termination> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// 最近一次终止请求
    pub fn last(&self) -> Option<Termination> {
        self.requests().last().copied()
    }
}

impl Terminator for RecordingTerminator {
    fn terminate(&self, termination: Termination) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(termination);
        }
    }
}

// ============================================================================
// 错误输入处理策略
// ============================================================================

/// 遇到错误输入（JSON 格式错误、模板缺键等）时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuitPolicy {
    /// 返回错误，由调用方处理
    #[default]
    Continue,
    /// 以 -1 退出进程
    Exit,
    /// 调用 abort
    Abort,
}

impl QuitPolicy {
    /// 对应的终止动作（`Continue` 没有终止动作）
    pub fn termination(self) -> Option<Termination> {
        match self {
            QuitPolicy::Continue => None,
            QuitPolicy::Exit => Some(Termination::Exit(-1)),
            QuitPolicy::Abort => Some(Termination::Abort),
        }
    }
}

// ============================================================================
// 主机标识
// ============================================================================

/// 当前主机名，获取失败时返回空字符串
pub fn hostname() -> String {
    nix::unistd::gethostname()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// 进程标识，用于日志的 discover 字段
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// 进程名（可执行文件名）
    pub process: String,
    /// 主机名
    pub hostname: String,
    /// 进程 ID
    pub pid: u32,
}

impl Identity {
    /// 从可执行文件路径构建标识
    pub fn from_executable(executable: &str) -> Self {
        let process = Path::new(executable)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| executable.to_string());

        Self {
            process,
            hostname: hostname(),
            pid: std::process::id(),
        }
    }

    /// 当前进程的标识
    pub fn current() -> Self {
        let exe = std::env::args().next().unwrap_or_default();
        Self::from_executable(&exe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_terminator() {
        let terminator = RecordingTerminator::new();
        assert!(terminator.last().is_none());

        terminator.terminate(Termination::Exit(0));
        terminator.terminate(Termination::Abort);

        assert_eq!(
            terminator.requests(),
            vec![Termination::Exit(0), Termination::Abort]
        );
        assert_eq!(terminator.last(), Some(Termination::Abort));
    }

    #[test]
    fn test_quit_policy_termination() {
        assert_eq!(QuitPolicy::Continue.termination(), None);
        assert_eq!(QuitPolicy::Exit.termination(), Some(Termination::Exit(-1)));
        assert_eq!(QuitPolicy::Abort.termination(), Some(Termination::Abort));
    }

    #[test]
    fn test_identity_from_executable() {
        let identity = Identity::from_executable("/usr/local/bin/yuno_agent");
        assert_eq!(identity.process, "yuno_agent");
        assert_eq!(identity.pid, std::process::id());
    }
}
