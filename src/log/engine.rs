//! 日志分发引擎
//!
//! 持有处理器类型注册表和处理器实例列表，把每次日志调用扇出到所有
//! 未忽略该级别的处理器实例（按添加顺序）。
//!
//! # 状态机
//!
//! 未启动 → [`startup`](LogEngine::startup) → （添加/删除处理器）* → [`shutdown`](LogEngine::shutdown) → 未启动
//!
//! # 分发规则
//!
//! 对每个处理器实例：
//! 1. 级别位不在实例选项中时跳过
//! 2. 类型提供 write 时：在共享 JSON 缓冲中组装 `timestamp`（除非 `NOTIME`）、
//!    调用方字段、discover 字段（CRIT 及以上，或实例没有 `NODISCOVER`），交给 write；
//!    write 返回负值时本次调用不再分发给后续实例
//! 3. 类型提供 format，且调用选项含 `TRACE_STACK`/`EXIT_*`/`ABORT`，
//!    或实例含 `TRACE_STACK` 且级别不低于 ERR 时，输出调用栈
//!
//! 所有实例处理完后，按调用选项请求终止进程（ABORT 优先于 EXIT_NEGATIVE 优先于 EXIT_ZERO），
//! 最后调用 inform 回调。
//!
//! # 并发
//!
//! 处理器列表和共享 JSON 缓冲由同一把互斥锁保护，处理器的 write/format
//! 在持锁状态下同步执行。处理器实现不得在 write/format 中回调同一个引擎。
//!
//! ```
//! use jlog_core::log::{LogEngine, LogOptions, MemoryHandler};
//! use jlog_core::json::Fields;
//!
//! let engine = LogEngine::new();
//! engine.startup("demo", "1.0.0", "/usr/bin/demo").unwrap();
//! engine.register_handler_type(MemoryHandler::handler_type()).unwrap();
//!
//! let memory = MemoryHandler::new();
//! engine
//!     .add_handler("mem", "memory", LogOptions::ALL | LogOptions::NODISCOVER, Box::new(memory.clone()))
//!     .unwrap();
//!
//! engine.info(LogOptions::NOTIME, Fields::new().str("msg", "ready"));
//! assert_eq!(memory.writes().len(), 1);
//! ```

use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use indexmap::IndexMap;
use serde_json::Value;

use crate::json::builder::{Hgen, JsonBuffer, JsonPool};
use crate::json::fields::Fields;
use crate::log::handler::{HandlerInstance, HandlerType, LogHandler};
use crate::log::handlers;
use crate::log::severity::{LogOptions, Severity};
use crate::log::stack::{self, ReentrancyGuard};
use crate::utils::dump::{hex_string, tdump_lines};
use crate::utils::metrics::{SeverityCounters, SeverityReport};
use crate::utils::process::{Identity, ProcessTerminator, Termination, Terminator};
use crate::utils::{CoreError, Result};

/// 默认的处理器类型数量上限
pub const DEFAULT_MAX_HANDLER_TYPES: usize = 10;

/// “最近消息”缓冲的字节上限
pub const LAST_MESSAGE_CAPACITY: usize = 256;

/// inform 回调：`(级别, 该级别的累计次数)`
pub type InformCallback = Arc<dyn Fn(Severity, u64) + Send + Sync>;

// ============================================================================
// 引擎状态
// ============================================================================

/// 启动时登记的应用信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    /// 应用名
    pub name: String,
    /// 应用版本
    pub version: String,
    /// 可执行文件路径
    pub executable: String,
}

struct EngineState {
    app: Option<AppInfo>,
    identity: Identity,
    types: IndexMap<String, HandlerType>,
    handlers: IndexMap<String, HandlerInstance>,
    pool: JsonPool,
    hgen: Option<Hgen>,
    last_message: String,
}

impl EngineState {
    fn set_last_message(&mut self, message: &str) {
        self.last_message.clear();
        let mut end = message.len().min(LAST_MESSAGE_CAPACITY);
        while !message.is_char_boundary(end) {
            end -= 1;
        }
        self.last_message.push_str(&message[..end]);
    }
}

// ============================================================================
// 构建器
// ============================================================================

/// 引擎构建器
pub struct LogEngineBuilder {
    max_handler_types: usize,
    indented: bool,
    register_builtins: bool,
    terminator: Arc<dyn Terminator>,
}

impl Default for LogEngineBuilder {
    fn default() -> Self {
        Self {
            max_handler_types: DEFAULT_MAX_HANDLER_TYPES,
            indented: false,
            register_builtins: true,
            terminator: Arc::new(ProcessTerminator),
        }
    }
}

impl LogEngineBuilder {
    /// 创建构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 处理器类型数量上限
    pub fn max_handler_types(mut self, max: usize) -> Self {
        self.max_handler_types = max;
        self
    }

    /// JSON 日志行是否缩进（4 空格）
    pub fn indented(mut self, enable: bool) -> Self {
        self.indented = enable;
        self
    }

    /// 启动时是否注册内置类型（stdout/file/udp）
    pub fn register_builtins(mut self, enable: bool) -> Self {
        self.register_builtins = enable;
        self
    }

    /// 终止进程的方式
    pub fn terminator(mut self, terminator: Arc<dyn Terminator>) -> Self {
        self.terminator = terminator;
        self
    }

    /// 构建引擎（未启动状态）
    pub fn build(self) -> LogEngine {
        LogEngine {
            state: Mutex::new(EngineState {
                app: None,
                identity: Identity::current(),
                types: IndexMap::new(),
                handlers: IndexMap::new(),
                pool: JsonPool::new(),
                hgen: None,
                last_message: String::new(),
            }),
            counters: SeverityCounters::new(),
            inform: RwLock::new(None),
            terminator: self.terminator,
            in_backtrace: AtomicBool::new(false),
            max_handler_types: self.max_handler_types,
            indented: self.indented,
            register_builtins: self.register_builtins,
        }
    }
}

// ============================================================================
// LogEngine
// ============================================================================

/// 日志分发引擎
pub struct LogEngine {
    state: Mutex<EngineState>,
    counters: SeverityCounters,
    inform: RwLock<Option<InformCallback>>,
    terminator: Arc<dyn Terminator>,
    in_backtrace: AtomicBool,
    max_handler_types: usize,
    indented: bool,
    register_builtins: bool,
}

impl Default for LogEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LogEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogEngine")
            .field("started", &self.is_started())
            .field("handlers", &self.handler_names())
            .field("types", &self.handler_type_names())
            .finish()
    }
}

impl LogEngine {
    /// 使用默认设置创建引擎
    pub fn new() -> Self {
        LogEngineBuilder::default().build()
    }

    /// 创建构建器
    pub fn builder() -> LogEngineBuilder {
        LogEngineBuilder::new()
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        // 处理器 panic 后仍要能继续记录日志
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ------------------------------------------------------------------------
    // 生命周期
    // ------------------------------------------------------------------------

    /// 启动引擎
    ///
    /// 注册内置处理器类型并分配共享 JSON 缓冲。只能调用一次（直到 `shutdown`）。
    /// 内置类型放不进类型表时不改变任何状态，可以调整后重试。
    ///
    /// # Errors
    ///
    /// - 已启动：[`CoreError::AlreadyInitialized`]
    /// - 内置类型与已注册类型重名：[`CoreError::HandlerTypeExists`]
    /// - 类型表容纳不下内置类型：[`CoreError::HandlerTableFull`]
    pub fn startup(&self, app_name: &str, app_version: &str, executable: &str) -> Result<()> {
        let builtins = if self.register_builtins {
            handlers::builtin_types()
        } else {
            Vec::new()
        };

        let refused = {
            let mut state = self.state();
            if let Some(app) = &state.app {
                Some(CoreError::AlreadyInitialized(app.name.clone()))
            } else if let Some(err) = self.check_capacity(&state, &builtins) {
                Some(err)
            } else {
                if state.hgen.is_none() {
                    let hgen = state.pool.acquire()?;
                    state.hgen = Some(hgen);
                }
                for handler_type in builtins {
                    state
                        .types
                        .insert(handler_type.name().to_string(), handler_type);
                }
                state.app = Some(AppInfo {
                    name: app_name.to_string(),
                    version: app_version.to_string(),
                    executable: executable.to_string(),
                });
                state.identity = Identity::from_executable(executable);
                None
            }
        };
        if let Some(err) = refused {
            return self.refuse(err);
        }

        tracing::debug!(app = app_name, version = app_version, "日志引擎已启动");
        Ok(())
    }

    /// 检查一组新类型能否全部登记
    fn check_capacity(&self, state: &EngineState, incoming: &[HandlerType]) -> Option<CoreError> {
        for (staged, handler_type) in incoming.iter().enumerate() {
            if state.types.contains_key(handler_type.name()) {
                return Some(CoreError::HandlerTypeExists(handler_type.name().to_string()));
            }
            if state.types.len() + staged >= self.max_handler_types {
                return Some(CoreError::HandlerTableFull {
                    max: self.max_handler_types,
                    name: handler_type.name().to_string(),
                });
            }
        }
        None
    }

    /// 关闭引擎：删除所有处理器实例（各自调用 close）并回到未启动状态
    ///
    /// 返回删除的实例数。
    pub fn shutdown(&self) -> usize {
        let deleted = self.del_handler("");
        let mut state = self.state();
        state.types.clear();
        state.app = None;
        tracing::debug!(deleted, "日志引擎已关闭");
        deleted
    }

    /// 是否已启动
    pub fn is_started(&self) -> bool {
        self.state().app.is_some()
    }

    /// 启动时登记的应用信息
    pub fn app_info(&self) -> Option<AppInfo> {
        self.state().app.clone()
    }

    /// 当前的进程标识
    pub fn identity(&self) -> Identity {
        self.state().identity.clone()
    }

    // ------------------------------------------------------------------------
    // 处理器类型与实例
    // ------------------------------------------------------------------------

    /// 注册处理器类型
    ///
    /// # Errors
    ///
    /// - 类型表已满：[`CoreError::HandlerTableFull`]
    /// - 同名类型已存在：[`CoreError::HandlerTypeExists`]
    pub fn register_handler_type(&self, handler_type: HandlerType) -> Result<()> {
        let refused = {
            let mut state = self.state();
            if let Some(err) = self.check_capacity(&state, std::slice::from_ref(&handler_type)) {
                Some(err)
            } else {
                state
                    .types
                    .insert(handler_type.name().to_string(), handler_type);
                None
            }
        };
        match refused {
            Some(err) => self.refuse(err),
            None => Ok(()),
        }
    }

    /// 添加处理器实例
    ///
    /// `options` 为空时使用 [`LogOptions::ALL`]。被拒绝时句柄会被 close。
    ///
    /// # Errors
    ///
    /// - 引擎未启动：[`CoreError::NotInitialized`]
    /// - 类型未注册：[`CoreError::HandlerTypeNotFound`]
    /// - 同名实例已存在：[`CoreError::HandlerExists`]
    pub fn add_handler(
        &self,
        name: &str,
        type_name: &str,
        options: LogOptions,
        mut handle: Box<dyn LogHandler>,
    ) -> Result<()> {
        let refused = {
            let mut state = self.state();
            if state.app.is_none() {
                Some(CoreError::NotInitialized)
            } else if state.handlers.contains_key(name) {
                Some(CoreError::HandlerExists(name.to_string()))
            } else {
                match state.types.get(type_name).cloned() {
                    None => Some(CoreError::HandlerTypeNotFound(type_name.to_string())),
                    Some(handler_type) => {
                        let options = if options.intersects(LogOptions::ALL) {
                            options
                        } else {
                            options | LogOptions::ALL
                        };
                        state.handlers.insert(
                            name.to_string(),
                            HandlerInstance {
                                name: name.to_string(),
                                options,
                                handler_type,
                                handle,
                            },
                        );
                        tracing::debug!(handler = name, r#type = type_name, "添加日志处理器");
                        return Ok(());
                    }
                }
            }
        };

        handle.close();
        match refused {
            Some(err) => self.refuse(err),
            None => Ok(()),
        }
    }

    /// 通过类型工厂按参数打开并添加处理器实例
    pub fn open_handler(
        &self,
        name: &str,
        type_name: &str,
        options: LogOptions,
        params: &Value,
    ) -> Result<()> {
        let factory = {
            let state = self.state();
            state
                .types
                .get(type_name)
                .map(|t| t.factory().cloned())
        };
        let factory = match factory {
            None => return self.refuse(CoreError::HandlerTypeNotFound(type_name.to_string())),
            Some(None) => return Err(CoreError::HandlerNotOpenable(type_name.to_string())),
            Some(Some(factory)) => factory,
        };
        let handle = factory(params)?;
        self.add_handler(name, type_name, options, handle)
    }

    /// 删除处理器实例，`name` 为空时删除全部
    ///
    /// 每个被删除的实例调用一次 close，返回删除的数量；不存在时返回 0。
    pub fn del_handler(&self, name: &str) -> usize {
        let removed: Vec<HandlerInstance> = {
            let mut state = self.state();
            if name.is_empty() {
                state.handlers.drain(..).map(|(_, h)| h).collect()
            } else {
                state.handlers.shift_remove(name).into_iter().collect()
            }
        };

        let count = removed.len();
        for mut instance in removed {
            instance.handle.close();
            tracing::debug!(handler = %instance.name, "删除日志处理器");
        }
        count
    }

    /// 处理器实例名（添加顺序）
    pub fn handler_names(&self) -> Vec<String> {
        self.state().handlers.keys().cloned().collect()
    }

    /// 处理器类型名（注册顺序）
    pub fn handler_type_names(&self) -> Vec<String> {
        self.state().types.keys().cloned().collect()
    }

    /// 是否存在该实例
    pub fn has_handler(&self, name: &str) -> bool {
        self.state().handlers.contains_key(name)
    }

    // ------------------------------------------------------------------------
    // 回调、计数、最近消息
    // ------------------------------------------------------------------------

    /// 设置 inform 回调
    pub fn set_inform<F>(&self, callback: F)
    where
        F: Fn(Severity, u64) + Send + Sync + 'static,
    {
        if let Ok(mut inform) = self.inform.write() {
            *inform = Some(Arc::new(callback));
        }
    }

    /// 移除 inform 回调
    pub fn clear_inform(&self) {
        if let Ok(mut inform) = self.inform.write() {
            *inform = None;
        }
    }

    /// 某级别的累计次数
    pub fn count(&self, severity: Severity) -> u64 {
        self.counters.get(severity)
    }

    /// 计数报告
    pub fn counters(&self) -> SeverityReport {
        self.counters.export()
    }

    /// 清零计数
    pub fn reset_counters(&self) {
        self.counters.reset();
    }

    /// 最近一次 `msg` 字段
    pub fn last_message(&self) -> String {
        self.state().last_message.clone()
    }

    // ------------------------------------------------------------------------
    // 结构化日志
    // ------------------------------------------------------------------------

    /// 按级别记录一条结构化日志
    pub fn log(&self, severity: Severity, options: LogOptions, fields: Fields) {
        let count = self.counters.increment(severity);
        let global_trace =
            options.contains(LogOptions::TRACE_STACK) || options.wants_termination();

        {
            let mut guard = self.state();
            let state = &mut *guard;
            if let Some(message) = fields.message() {
                state.set_last_message(message);
            }

            let mut stack_lines: Option<Vec<String>> = None;
            let hgen = state.hgen;
            for instance in state.handlers.values_mut() {
                if instance.must_ignore(severity) {
                    continue;
                }

                if let (true, Some(h)) = (instance.handler_type.has_write(), hgen) {
                    if let Ok(buffer) = state.pool.buffer(h) {
                        let line = render_record(
                            buffer,
                            self.indented,
                            severity,
                            instance.options,
                            &fields,
                            &state.identity,
                        );
                        if instance.handle.write(severity, line.as_bytes()) < 0 {
                            break;
                        }
                    }
                }

                let wants_stack = global_trace
                    || (instance.options.contains(LogOptions::TRACE_STACK)
                        && severity <= Severity::Err);
                if instance.handler_type.has_format() && wants_stack {
                    let lines = stack_lines.get_or_insert_with(|| self.capture_stack());
                    for line in lines.iter() {
                        instance.handle.format(severity, line);
                    }
                }
            }
        }

        self.finish(severity, options, Some(count));
    }

    /// ALERT 级别
    pub fn alert(&self, options: LogOptions, fields: Fields) {
        self.log(Severity::Alert, options, fields);
    }

    /// CRIT 级别
    pub fn critical(&self, options: LogOptions, fields: Fields) {
        self.log(Severity::Crit, options, fields);
    }

    /// ERR 级别
    pub fn error(&self, options: LogOptions, fields: Fields) {
        self.log(Severity::Err, options, fields);
    }

    /// WARNING 级别
    pub fn warning(&self, options: LogOptions, fields: Fields) {
        self.log(Severity::Warning, options, fields);
    }

    /// INFO 级别
    pub fn info(&self, options: LogOptions, fields: Fields) {
        self.log(Severity::Info, options, fields);
    }

    /// DEBUG 级别
    pub fn debug(&self, options: LogOptions, fields: Fields) {
        self.log(Severity::Debug, options, fields);
    }

    /// MONITOR 级别
    pub fn monitor(&self, options: LogOptions, fields: Fields) {
        self.log(Severity::Monitor, options, fields);
    }

    // ------------------------------------------------------------------------
    // 原始字节与文本
    // ------------------------------------------------------------------------

    /// 把预格式化的字节直接交给各处理器的 write，不组装 JSON
    pub fn log_bf(&self, severity: Severity, options: LogOptions, bytes: &[u8]) {
        {
            let mut state = self.state();
            for instance in state.handlers.values_mut() {
                if instance.must_ignore(severity) || !instance.handler_type.has_write() {
                    continue;
                }
                if instance.handle.write(severity, bytes) < 0 {
                    break;
                }
            }
        }
        self.finish(severity, options, None);
    }

    /// 以 DEBUG 级别输出一行带时间戳的文本
    pub fn trace_msg(&self, text: &str) {
        let line = format!("{} - {}", timestamp(), text);
        self.log_bf(Severity::Debug, LogOptions::NONE, line.as_bytes());
    }

    /// 以 INFO 级别输出一行带时间戳的文本
    pub fn info_msg(&self, text: &str) {
        let line = format!("{} - {}", timestamp(), text);
        self.log_bf(Severity::Info, LogOptions::NONE, line.as_bytes());
    }

    // ------------------------------------------------------------------------
    // 转储
    // ------------------------------------------------------------------------

    /// 十六进制转储，经各处理器的 format 输出
    pub fn debug_dump(&self, bytes: &[u8], label: &str) {
        let mut lines = Vec::with_capacity(bytes.len() / 16 + 2);
        lines.push(format!("{} - {} ({} bytes)", timestamp(), label, bytes.len()));
        lines.extend(tdump_lines(bytes));
        self.format_lines(Severity::Debug, &lines);
    }

    /// JSON 转储（缩进格式）
    pub fn debug_json(&self, value: &Value, label: &str) {
        let mut lines = vec![format!("{} - {}", timestamp(), label)];
        match serde_json::to_string_pretty(value) {
            Ok(text) => lines.extend(text.lines().map(str::to_string)),
            Err(e) => lines.push(format!("<json error: {}>", e)),
        }
        self.format_lines(Severity::Debug, &lines);
    }

    /// 单行十六进制消息
    pub fn trace_hex_msg(&self, bytes: &[u8], label: &str) {
        let line = format!(
            "{} - {} [{}] {}",
            timestamp(),
            label,
            bytes.len(),
            hex_string(bytes)
        );
        self.format_lines(Severity::Debug, &[line]);
    }

    fn format_lines(&self, severity: Severity, lines: &[String]) {
        let mut state = self.state();
        for instance in state.handlers.values_mut() {
            if instance.must_ignore(severity) || !instance.handler_type.has_format() {
                continue;
            }
            for line in lines {
                instance.handle.format(severity, line);
            }
        }
    }

    // ------------------------------------------------------------------------
    // 内部
    // ------------------------------------------------------------------------

    fn capture_stack(&self) -> Vec<String> {
        match ReentrancyGuard::enter(&self.in_backtrace) {
            Some(_guard) => stack::render(&stack::capture(stack::MAX_FRAMES)),
            None => Vec::new(),
        }
    }

    fn finish(&self, severity: Severity, options: LogOptions, count: Option<u64>) {
        if let Some(termination) = termination_for(options) {
            self.terminator.terminate(termination);
        }

        if let Some(count) = count {
            let callback = self.inform.read().ok().and_then(|i| i.clone());
            if let Some(callback) = callback {
                callback(severity, count);
            }
        }
    }

    /// 拒绝执行的操作：记录到引擎自身的错误通道后返回错误
    fn refuse<T>(&self, err: CoreError) -> Result<T> {
        tracing::warn!(code = err.error_code(), "{}", err);
        self.error(
            LogOptions::NONE,
            Fields::new()
                .str("msgset", "Internal Error")
                .str("msg", err.to_string())
                .str("code", err.error_code()),
        );
        Err(err)
    }
}

impl Drop for LogEngine {
    fn drop(&mut self) {
        self.del_handler("");
    }
}

/// 调用选项对应的终止动作，多个标志同时存在时取最严重的
fn termination_for(options: LogOptions) -> Option<Termination> {
    if !options.wants_termination() {
        None
    } else if options.contains(LogOptions::ABORT) {
        Some(Termination::Abort)
    } else if options.contains(LogOptions::EXIT_NEGATIVE) {
        Some(Termination::Exit(-1))
    } else {
        Some(Termination::Exit(0))
    }
}

/// 本地时间戳
pub fn timestamp() -> String {
    chrono::Local::now()
        .format("%Y-%m-%dT%H:%M:%S%.6f%:z")
        .to_string()
}

fn render_record(
    buffer: &mut JsonBuffer,
    indented: bool,
    severity: Severity,
    options: LogOptions,
    fields: &Fields,
    identity: &Identity,
) -> String {
    buffer.reset(indented);
    if !options.contains(LogOptions::NOTIME) {
        buffer.append_string("timestamp", &timestamp());
    }
    fields.append_to(buffer);
    if severity <= Severity::Crit || !options.contains(LogOptions::NODISCOVER) {
        buffer.append_string("process", &identity.process);
        buffer.append_string("hostname", &identity.hostname);
        buffer.append_integer("pid", identity.pid as i64);
    }
    buffer.finalize().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::handlers::MemoryHandler;
    use crate::utils::process::RecordingTerminator;
    use serde_json::json;

    fn started_engine() -> (LogEngine, Arc<RecordingTerminator>) {
        let terminator = Arc::new(RecordingTerminator::new());
        let engine = LogEngine::builder()
            .terminator(terminator.clone())
            .build();
        engine.startup("test", "0.1.0", "/opt/bin/tester").unwrap();
        engine
            .register_handler_type(MemoryHandler::handler_type())
            .unwrap();
        (engine, terminator)
    }

    #[test]
    fn test_startup_is_one_shot() {
        let (engine, _) = started_engine();
        assert!(engine.is_started());
        let err = engine.startup("again", "1", "x").unwrap_err();
        assert!(matches!(err, CoreError::AlreadyInitialized(_)));
        assert_eq!(engine.app_info().unwrap().name, "test");
        assert_eq!(engine.identity().process, "tester");
    }

    #[test]
    fn test_builtin_types_registered() {
        let (engine, _) = started_engine();
        assert_eq!(
            engine.handler_type_names(),
            vec!["stdout", "file", "udp", "memory"]
        );
    }

    #[test]
    fn test_startup_failure_leaves_engine_stopped() {
        let engine = LogEngine::builder()
            .max_handler_types(2)
            .terminator(Arc::new(RecordingTerminator::new()))
            .build();

        let err = engine.startup("a", "1", "a").unwrap_err();
        assert!(matches!(err, CoreError::HandlerTableFull { max: 2, .. }));
        assert!(!engine.is_started());
        assert!(engine.handler_type_names().is_empty());

        // 重试得到同样的容量错误，而不是“已启动”
        let err = engine.startup("a", "1", "a").unwrap_err();
        assert!(matches!(err, CoreError::HandlerTableFull { .. }));
    }

    #[test]
    fn test_startup_rejects_clashing_type() {
        let engine = LogEngine::builder()
            .terminator(Arc::new(RecordingTerminator::new()))
            .build();
        engine
            .register_handler_type(HandlerType::new("file"))
            .unwrap();

        let err = engine.startup("a", "1", "a").unwrap_err();
        assert!(matches!(err, CoreError::HandlerTypeExists(_)));
        assert!(!engine.is_started());
        assert_eq!(engine.handler_type_names(), vec!["file"]);
    }

    #[test]
    fn test_add_handler_requires_startup() {
        let engine = LogEngine::builder().register_builtins(false).build();
        engine
            .register_handler_type(MemoryHandler::handler_type())
            .unwrap();
        let memory = MemoryHandler::new();
        let err = engine
            .add_handler("m", "memory", LogOptions::ALL, Box::new(memory.clone()))
            .unwrap_err();
        assert!(matches!(err, CoreError::NotInitialized));
        assert_eq!(memory.close_count(), 1);
    }

    #[test]
    fn test_record_layout() {
        let (engine, _) = started_engine();
        let memory = MemoryHandler::new();
        engine
            .add_handler("m", "memory", LogOptions::ALL, Box::new(memory.clone()))
            .unwrap();

        engine.info(
            LogOptions::NONE,
            Fields::new().str("msg", "hello").int("n", 7),
        );

        let writes = memory.writes();
        assert_eq!(writes.len(), 1);
        let record: Value = serde_json::from_str(&writes[0]).unwrap();
        let keys: Vec<&String> = record.as_object().unwrap().keys().collect();
        assert_eq!(
            keys,
            vec!["timestamp", "msg", "n", "process", "hostname", "pid"]
        );
        assert_eq!(record["process"], "tester");
        assert_eq!(record["pid"], json!(std::process::id()));
    }

    #[test]
    fn test_notime_and_nodiscover() {
        let (engine, _) = started_engine();
        let memory = MemoryHandler::new();
        engine
            .add_handler(
                "m",
                "memory",
                LogOptions::ALL | LogOptions::NOTIME | LogOptions::NODISCOVER,
                Box::new(memory.clone()),
            )
            .unwrap();

        engine.warning(LogOptions::NONE, Fields::new().str("msg", "w"));
        // CRIT 及以上总是带 discover 字段
        engine.critical(LogOptions::NONE, Fields::new().str("msg", "c"));

        let writes = memory.writes();
        let warning: Value = serde_json::from_str(&writes[0]).unwrap();
        assert_eq!(warning, json!({"msg": "w"}));
        let critical: Value = serde_json::from_str(&writes[1]).unwrap();
        assert!(critical.get("timestamp").is_none());
        assert!(critical.get("hostname").is_some());
    }

    #[test]
    fn test_indented_records() {
        let engine = LogEngine::builder()
            .indented(true)
            .terminator(Arc::new(RecordingTerminator::new()))
            .build();
        engine.startup("t", "1", "t").unwrap();
        engine
            .register_handler_type(MemoryHandler::handler_type())
            .unwrap();
        let memory = MemoryHandler::new();
        engine
            .add_handler(
                "m",
                "memory",
                LogOptions::ALL | LogOptions::NOTIME | LogOptions::NODISCOVER,
                Box::new(memory.clone()),
            )
            .unwrap();
        engine.info(LogOptions::NONE, Fields::new().str("msg", "x"));
        assert_eq!(memory.writes()[0], "{\n    \"msg\": \"x\"\n}");
    }

    #[test]
    fn test_severity_filtering() {
        let (engine, _) = started_engine();
        let errors = MemoryHandler::new();
        let everything = MemoryHandler::new();
        engine
            .add_handler("errors", "memory", LogOptions::UP_ERROR, Box::new(errors.clone()))
            .unwrap();
        engine
            .add_handler("all", "memory", LogOptions::ALL, Box::new(everything.clone()))
            .unwrap();

        engine.error(LogOptions::NONE, Fields::new().str("msg", "e"));
        engine.debug(LogOptions::NONE, Fields::new().str("msg", "d"));
        engine.monitor(LogOptions::NONE, Fields::new().str("msg", "m"));

        assert_eq!(errors.writes().len(), 1);
        assert_eq!(everything.writes().len(), 3);
    }

    #[test]
    fn test_fan_out_short_circuit() {
        let (engine, _) = started_engine();
        let first = MemoryHandler::new().taking_ownership();
        let second = MemoryHandler::new();
        engine
            .add_handler("a", "memory", LogOptions::ALL, Box::new(first.clone()))
            .unwrap();
        engine
            .add_handler("b", "memory", LogOptions::ALL, Box::new(second.clone()))
            .unwrap();

        engine.info(LogOptions::NONE, Fields::new().str("msg", "owned"));
        engine.log_bf(Severity::Info, LogOptions::NONE, b"raw");

        assert_eq!(first.writes().len(), 2);
        assert!(second.writes().is_empty());
    }

    #[test]
    fn test_del_handler_closes_once() {
        let (engine, _) = started_engine();
        let memory = MemoryHandler::new();
        engine
            .add_handler("m", "memory", LogOptions::ALL, Box::new(memory.clone()))
            .unwrap();

        assert_eq!(engine.del_handler("m"), 1);
        assert_eq!(memory.close_count(), 1);
        assert_eq!(engine.del_handler("m"), 0);
        assert_eq!(engine.del_handler("never-added"), 0);
        assert_eq!(memory.close_count(), 1);
    }

    #[test]
    fn test_duplicate_handler_refused() {
        let (engine, _) = started_engine();
        let observer = MemoryHandler::new();
        engine
            .add_handler("m", "memory", LogOptions::ALL, Box::new(observer.clone()))
            .unwrap();
        let err = engine
            .add_handler("m", "memory", LogOptions::ALL, Box::new(MemoryHandler::new()))
            .unwrap_err();
        assert!(matches!(err, CoreError::HandlerExists(_)));

        // 拒绝本身经 ERR 通道记录
        let record: Value = serde_json::from_str(&observer.writes()[0]).unwrap();
        assert_eq!(record["msgset"], "Internal Error");
        assert_eq!(record["code"], "LOG-005");
    }

    #[test]
    fn test_type_not_found() {
        let (engine, _) = started_engine();
        let err = engine
            .add_handler("x", "syslog", LogOptions::ALL, Box::new(MemoryHandler::new()))
            .unwrap_err();
        assert!(matches!(err, CoreError::HandlerTypeNotFound(_)));
        assert!(engine.handler_names().is_empty());
    }

    #[test]
    fn test_type_table_full() {
        let engine = LogEngine::builder()
            .max_handler_types(4)
            .terminator(Arc::new(RecordingTerminator::new()))
            .build();
        engine.startup("t", "1", "t").unwrap();
        engine
            .register_handler_type(MemoryHandler::handler_type())
            .unwrap();
        let err = engine
            .register_handler_type(HandlerType::new("extra"))
            .unwrap_err();
        assert!(matches!(err, CoreError::HandlerTableFull { max: 4, .. }));
    }

    #[test]
    fn test_termination_priority() {
        let (engine, terminator) = started_engine();
        engine.info(LogOptions::EXIT_ZERO, Fields::new());
        engine.info(LogOptions::EXIT_ZERO | LogOptions::EXIT_NEGATIVE, Fields::new());
        engine.info(
            LogOptions::EXIT_ZERO | LogOptions::EXIT_NEGATIVE | LogOptions::ABORT,
            Fields::new(),
        );
        engine.log_bf(Severity::Err, LogOptions::EXIT_NEGATIVE, b"bye");
        assert_eq!(
            terminator.requests(),
            vec![
                Termination::Exit(0),
                Termination::Exit(-1),
                Termination::Abort,
                Termination::Exit(-1)
            ]
        );
    }

    #[test]
    fn test_trace_stack_goes_to_format() {
        let (engine, _) = started_engine();
        let traced = MemoryHandler::new();
        let plain = MemoryHandler::new();
        engine
            .add_handler(
                "traced",
                "memory",
                LogOptions::ALL | LogOptions::TRACE_STACK,
                Box::new(traced.clone()),
            )
            .unwrap();
        engine
            .add_handler("plain", "memory", LogOptions::ALL, Box::new(plain.clone()))
            .unwrap();

        engine.warning(LogOptions::NONE, Fields::new().str("msg", "no stack"));
        assert!(traced.formats().is_empty());

        engine.error(LogOptions::NONE, Fields::new().str("msg", "stack"));
        let formats = traced.formats();
        assert!(formats.first().unwrap().contains("begin stack trace"));
        assert!(formats.last().unwrap().contains("end stack trace"));
        assert!(plain.formats().is_empty());

        engine.info(LogOptions::TRACE_STACK, Fields::new().str("msg", "forced"));
        assert!(!plain.formats().is_empty());
    }

    #[test]
    fn test_inform_and_counters() {
        let (engine, _) = started_engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        engine.set_inform(move |severity, count| {
            sink.lock().unwrap().push((severity, count));
        });

        engine.error(LogOptions::NONE, Fields::new());
        engine.error(LogOptions::NONE, Fields::new());
        engine.info(LogOptions::NONE, Fields::new());

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (Severity::Err, 1),
                (Severity::Err, 2),
                (Severity::Info, 1)
            ]
        );
        assert_eq!(engine.count(Severity::Err), 2);
        assert_eq!(engine.counters().total, 3);

        engine.clear_inform();
        engine.reset_counters();
        engine.error(LogOptions::NONE, Fields::new());
        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_eq!(engine.count(Severity::Err), 1);
    }

    #[test]
    fn test_last_message_is_bounded() {
        let (engine, _) = started_engine();
        engine.info(LogOptions::NONE, Fields::new().str("msg", "short"));
        assert_eq!(engine.last_message(), "short");

        let long = "é".repeat(200);
        engine.info(LogOptions::NONE, Fields::new().str("msg", long));
        let last = engine.last_message();
        assert!(last.len() <= LAST_MESSAGE_CAPACITY);
        assert!(last.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_dump_paths_use_format() {
        let (engine, _) = started_engine();
        let memory = MemoryHandler::new();
        let quiet = MemoryHandler::new();
        engine
            .add_handler("m", "memory", LogOptions::ALL, Box::new(memory.clone()))
            .unwrap();
        engine
            .add_handler("q", "memory", LogOptions::UP_ERROR, Box::new(quiet.clone()))
            .unwrap();

        engine.debug_dump(b"0123456789abcdefXYZ", "payload");
        engine.debug_json(&json!({"a": 1}), "config");
        engine.trace_hex_msg(&[0xca, 0xfe], "frame");

        let formats = memory.formats();
        assert!(formats[0].ends_with("payload (19 bytes)"));
        assert!(formats[1].starts_with("0000: 30 31"));
        assert!(formats[2].starts_with("0010: 58 59 5A"));
        assert!(formats.iter().any(|l| l.contains("\"a\": 1")));
        assert!(formats.last().unwrap().ends_with("frame [2] cafe"));
        assert!(memory.writes().is_empty());
        assert!(quiet.records().is_empty());
    }

    #[test]
    fn test_text_helpers_use_write() {
        let (engine, _) = started_engine();
        let memory = MemoryHandler::new();
        engine
            .add_handler("m", "memory", LogOptions::INFO, Box::new(memory.clone()))
            .unwrap();
        engine.trace_msg("hidden");
        engine.info_msg("visible");
        let writes = memory.writes();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].ends_with(" - visible"));
    }

    #[test]
    fn test_shutdown_closes_everything() {
        let (engine, _) = started_engine();
        let a = MemoryHandler::new();
        let b = MemoryHandler::new();
        engine
            .add_handler("a", "memory", LogOptions::ALL, Box::new(a.clone()))
            .unwrap();
        engine
            .add_handler("b", "memory", LogOptions::ALL, Box::new(b.clone()))
            .unwrap();

        assert_eq!(engine.shutdown(), 2);
        assert!(!engine.is_started());
        assert_eq!(a.close_count(), 1);
        assert_eq!(b.close_count(), 1);
        assert!(engine.handler_type_names().is_empty());

        // 可以重新启动
        engine.startup("again", "2", "again").unwrap();
        assert!(engine.is_started());
    }

    #[test]
    fn test_open_handler_via_factory() {
        let (engine, _) = started_engine();
        engine
            .open_handler("m", "memory", LogOptions::ALL, &json!({}))
            .unwrap();
        assert!(engine.has_handler("m"));

        let err = engine
            .open_handler("x", "nope", LogOptions::ALL, &json!({}))
            .unwrap_err();
        assert!(matches!(err, CoreError::HandlerTypeNotFound(_)));

        engine
            .register_handler_type(HandlerType::new("bare"))
            .unwrap();
        let err = engine
            .open_handler("y", "bare", LogOptions::ALL, &json!({}))
            .unwrap_err();
        assert!(matches!(err, CoreError::HandlerNotOpenable(_)));
    }
}
