//! jlog 命令行入口
//!
//! # 命令概览
//!
//! - `config` - 运行 JSON 配置流水线并输出最终配置
//! - `log` - 通过日志分发引擎输出一条结构化日志
//! - `version` - 显示版本信息
//!
//! # 使用示例
//!
//! ```bash
//! # 合并固定配置和两个配置文件，命令行参数覆盖
//! jlog config --fixed '{"port": 80}' --files '["base.json", "site.json"]' --params '{"debug": true}'
//!
//! # 打印合并后（展开前）和最终的配置
//! jlog config --files app.json --verbose
//!
//! # 输出一条 WARNING 日志
//! jlog log --severity warning --msg "disk almost full" --field free_mb=12
//!
//! # 按应用配置中的处理器输出
//! jlog log --config app.json --severity info --msg hello
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use jlog_core::config::{json_config, ConfigFiles, JsonConfigRequest, SubstitutionMode};
use jlog_core::json::{FieldValue, Fields};
use jlog_core::log::{LogEngine, LogOptions, Severity};
use jlog_core::utils::process::{ProcessTerminator, QuitPolicy};
use jlog_core::{CoreConfig, Logger, LoggerConfig};

/// jlog - 结构化日志与 JSON 配置工具
#[derive(Parser)]
#[command(name = "jlog")]
#[command(version, about = "结构化日志分发与模板化 JSON 配置", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// 诊断日志级别 (trace, debug, info, warn, error)，默认 warn；
    /// `log --config` 时默认取配置中的 diagnostics 段
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 子命令
    #[command(subcommand)]
    command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
enum Commands {
    /// 运行配置流水线
    ///
    /// 依次合并固定配置、可变配置、配置文件和参数配置，展开模板后输出。
    Config {
        /// 固定配置（JSON 文本，优先级最高）
        #[arg(long, default_value = "")]
        fixed: String,

        /// 可变配置（JSON 文本）
        #[arg(long, default_value = "")]
        variable: String,

        /// 配置文件：单个路径或 JSON 数组
        #[arg(long, default_value = "")]
        files: String,

        /// 参数配置（JSON 文本）
        #[arg(long, default_value = "")]
        params: String,

        /// 只打印最终配置
        #[arg(long)]
        print: bool,

        /// 同时打印展开前的配置
        #[arg(long)]
        verbose: bool,

        /// 出错时的处理策略 (continue, exit, abort)
        #[arg(long, default_value = "continue", value_parser = parse_quit_policy)]
        quit: QuitPolicy,

        /// 只在字符串内部替换变量
        #[arg(long)]
        tree: bool,
    },

    /// 输出一条结构化日志
    Log {
        /// 应用配置文件（不指定则输出到控制台）
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// 日志级别
        #[arg(short, long, default_value = "info", value_parser = parse_severity)]
        severity: Severity,

        /// 消息
        #[arg(short, long)]
        msg: String,

        /// 附加字段（key=value，可重复）
        #[arg(short, long = "field")]
        fields: Vec<String>,

        /// 调用选项（如 trace_stack）
        #[arg(short, long = "option")]
        options: Vec<String>,
    },

    /// 查看版本信息
    Version,
}

fn parse_quit_policy(s: &str) -> Result<QuitPolicy, String> {
    match s.to_lowercase().as_str() {
        "continue" => Ok(QuitPolicy::Continue),
        "exit" => Ok(QuitPolicy::Exit),
        "abort" => Ok(QuitPolicy::Abort),
        other => Err(format!("未知策略: {}", other)),
    }
}

fn parse_severity(s: &str) -> Result<Severity, String> {
    Severity::from_name(s).map_err(|e| e.to_string())
}

/// key=value，值依次尝试整数、浮点数，否则作为字符串
fn parse_field(field: &str) -> Result<(String, FieldValue), String> {
    let (key, value) = field
        .split_once('=')
        .ok_or_else(|| format!("字段格式应为 key=value: {}", field))?;
    let value = if let Ok(n) = value.parse::<i64>() {
        FieldValue::Int(n)
    } else if let Ok(x) = value.parse::<f64>() {
        FieldValue::Real(x)
    } else {
        FieldValue::Str(value.to_string())
    };
    Ok((key.to_string(), value))
}

/// 运行配置流水线
#[allow(clippy::too_many_arguments)]
fn run_config(
    fixed: String,
    variable: String,
    files: &str,
    params: String,
    print: bool,
    verbose: bool,
    quit: QuitPolicy,
    tree: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let request = JsonConfigRequest::new()
        .fixed(fixed)
        .variable(variable)
        .files(ConfigFiles::parse(files)?)
        .parameters(params)
        .quit_policy(quit)
        .substitution(if tree {
            SubstitutionMode::Tree
        } else {
            SubstitutionMode::Text
        })
        .print(verbose, print);

    // 打印标志会让流水线自己打印并退出
    let text = json_config(&request, &ProcessTerminator)?;
    println!("{}", text);
    Ok(())
}

/// 未指定 `--log-level` 时的诊断级别
const DEFAULT_LOG_LEVEL: &str = "warn";

fn cli_logger(log_level: Option<&str>) -> LoggerConfig {
    LoggerConfig::builder()
        .level(log_level.unwrap_or(DEFAULT_LOG_LEVEL))
        .build()
}

/// 输出一条日志
fn run_log(
    log_level: Option<&str>,
    config: Option<PathBuf>,
    severity: Severity,
    msg: String,
    fields: Vec<String>,
    options: Vec<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let executable = std::env::args().next().unwrap_or_else(|| "jlog".to_string());
    let terminator = Arc::new(ProcessTerminator);

    let (engine, _guard) = match config {
        Some(path) => {
            let config = CoreConfig::from_file(path)?;
            let guard = Logger::try_init(config.logger_config(log_level));
            (
                LogEngine::from_config(&config.logging, &executable, terminator)?,
                guard,
            )
        }
        None => {
            let guard = Logger::try_init(cli_logger(log_level));
            let engine = LogEngine::builder().terminator(terminator).build();
            engine.startup("jlog", jlog_core::VERSION, &executable)?;
            engine.open_handler(
                "console",
                "stdout",
                LogOptions::ALL,
                &serde_json::json!({"colors": true}),
            )?;
            (engine, guard)
        }
    };

    let mut record = Fields::new().str("msg", msg);
    for field in &fields {
        let (key, value) = parse_field(field)?;
        record.push(key, value);
    }
    let options = LogOptions::from_names(&options)?;

    engine.log(severity, options, record);
    engine.shutdown();
    Ok(())
}

/// 显示版本信息
fn print_version() {
    println!();
    println!("jlog - 结构化日志与 JSON 配置");
    println!("═══════════════════════════════════════");
    println!("  版本:             {}", jlog_core::VERSION);
    println!();
    println!("构建信息:");
    println!("  目标平台:         {}", std::env::consts::ARCH);
    println!("  操作系统:         {}", std::env::consts::OS);
    println!("═══════════════════════════════════════");
    println!();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let log_level = cli.log_level.as_deref();

    match cli.command {
        Commands::Config {
            fixed,
            variable,
            files,
            params,
            print,
            verbose,
            quit,
            tree,
        } => {
            let _guard = Logger::try_init(cli_logger(log_level));
            run_config(fixed, variable, &files, params, print, verbose, quit, tree)?
        }

        Commands::Log {
            config,
            severity,
            msg,
            fields,
            options,
        } => run_log(log_level, config, severity, msg, fields, options)?,

        Commands::Version => print_version(),
    }

    Ok(())
}
