//! 调用栈捕获
//!
//! 使用 `backtrace` crate 遍历当前调用栈，每帧渲染为
//! `name() ip=.. sp=.. off=..` 一行，经处理器的 format 输出。
//! 通过 [`ReentrancyGuard`] 防止展开过程中的故障递归进入。

use std::sync::atomic::{AtomicBool, Ordering};

/// 单次捕获的最大帧数
pub const MAX_FRAMES: usize = 64;

/// 调用栈的一帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// 符号名（解析失败时为 `??`）
    pub name: String,
    /// 指令指针
    pub ip: usize,
    /// 栈指针
    pub sp: usize,
    /// 相对符号起始地址的偏移
    pub offset: usize,
}

/// 捕获当前调用栈
pub fn capture(max_frames: usize) -> Vec<StackFrame> {
    let mut frames = Vec::new();

    backtrace::trace(|frame| {
        let ip = frame.ip() as usize;
        let sp = frame.sp() as usize;
        let symbol_address = frame.symbol_address() as usize;

        let mut name = None;
        backtrace::resolve_frame(frame, |symbol| {
            if name.is_none() {
                name = symbol.name().map(|n| format!("{:#}", n));
            }
        });

        frames.push(StackFrame {
            name: name.unwrap_or_else(|| "??".to_string()),
            ip,
            sp,
            offset: ip.saturating_sub(symbol_address),
        });
        frames.len() < max_frames
    });

    frames
}

/// 渲染为输出行（含首尾分隔行）
pub fn render(frames: &[StackFrame]) -> Vec<String> {
    let mut lines = Vec::with_capacity(frames.len() + 2);
    lines.push("===============> begin stack trace <==================".to_string());
    for (index, frame) in frames.iter().enumerate() {
        lines.push(format!(
            "{:<3} {:<40} ip={:#x} sp={:#x} off={:#x}",
            index,
            format!("{}()", frame.name),
            frame.ip,
            frame.sp,
            frame.offset
        ));
    }
    lines.push("===============> end stack trace <==================".to_string());
    lines
}

/// 调用栈捕获的重入保护
///
/// 持有期间再次 [`enter`](Self::enter) 返回 `None`。
#[derive(Debug)]
pub struct ReentrancyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ReentrancyGuard<'a> {
    /// 尝试进入；已在捕获中时返回 `None`
    pub fn enter(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ReentrancyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
