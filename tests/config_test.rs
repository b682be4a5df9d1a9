//! 配置流水线集成测试
//!
//! 测试多来源合并、模板展开和应用配置加载的完整流程

use jlog_core::config::{json_config, ConfigFiles, JsonConfigRequest, SubstitutionMode};
use jlog_core::utils::process::{QuitPolicy, RecordingTerminator, Termination};
use jlog_core::{ConfigSources, CoreConfig, CoreError, LogEngine};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

fn run(request: &JsonConfigRequest) -> Value {
    let terminator = RecordingTerminator::new();
    let text = json_config(request, &terminator).unwrap();
    serde_json::from_str(&text).unwrap()
}

/// 测试完整的配置加载流程
#[test]
fn test_full_pipeline_workflow() {
    let temp_dir = TempDir::new().unwrap();

    // 站点公共配置
    let base_path = temp_dir.path().join("base.json");
    std::fs::write(
        &base_path,
        r#"{
    #^^ 公共配置
    "service": {"name": "gateway", "port": 8080, "tags": ["edge"]},
    "limits": {"rps": 100}
}
"#,
    )
    .unwrap();

    // 主机配置
    let host_path = temp_dir.path().join("host.json");
    std::fs::write(
        &host_path,
        r#"{"service": {"port": 9090, "tags": ["edge", "eu"]}, "limits": {"rps": 250}}"#,
    )
    .unwrap();

    let files = ConfigFiles::parse(&format!(
        r#"["{}", "{}"]"#,
        base_path.display(),
        host_path.display()
    ))
    .unwrap();

    let request = JsonConfigRequest::new()
        .fixed(r#"{"limits": {"rps": 50}, "fixed_only": true}"#)
        .variable(r#"{"variable_only": 1}"#)
        .files(files)
        .parameters(r#"{"service": {"port": 7000}}"#);

    let value = run(&request);

    // 固定配置优先
    assert_eq!(value["limits"]["rps"], 50);
    assert_eq!(value["fixed_only"], true);
    // 参数配置覆盖文件
    assert_eq!(value["service"]["port"], 7000);
    // 文件按顺序合并，数组按集合合并
    assert_eq!(value["service"]["name"], "gateway");
    assert_eq!(value["service"]["tags"], json!(["edge", "eu"]));
    assert_eq!(value["variable_only"], 1);
}

/// 测试对象和数组范围模板一起展开
#[test]
fn test_dict_and_list_templates() {
    let request = JsonConfigRequest::new().fixed(
        r#"{
            "__json_config_variables__": {"domain": "example.org"},
            "{^^shards^^}": {
                "__range__": [[1, 3], 5],
                "__vars__": {"prefix": "shard"},
                "__content__": {"(^^prefix^^)(^^__range__^^)": {"host": "s(^^__range__^^).(^^domain^^)"}}
            },
            "[^^listeners^^]": {
                "__range__": [80, 443],
                "__vars__": {},
                "__content__": {"port": "(^^__range__^^)"}
            }
        }"#,
    );

    let value = run(&request);
    let shards = value["shards"].as_object().unwrap();
    let names: Vec<&String> = shards.keys().collect();
    assert_eq!(names, vec!["shard1", "shard2", "shard3", "shard5"]);
    assert_eq!(value["shards"]["shard5"]["host"], "s5.example.org");
    assert_eq!(
        value["listeners"],
        json!([{"port": "80"}, {"port": "443"}])
    );
}

/// 测试文本替换与树替换的差异
#[test]
fn test_substitution_modes() {
    let fixed = r#"{"__json_config_variables__": {"v": "a\",\"b\":\"c"}, "x": "(^^v^^)"}"#;

    let text_mode = run(&JsonConfigRequest::new().fixed(fixed));
    assert_eq!(text_mode["x"], "a");
    assert_eq!(text_mode["b"], "c");

    let tree_mode = run(&JsonConfigRequest::new()
        .fixed(fixed)
        .substitution(SubstitutionMode::Tree));
    assert_eq!(tree_mode["x"], "a\",\"b\":\"c");
    assert!(tree_mode.get("b").is_none());
}

/// 测试错误输入按策略处理
#[test]
fn test_malformed_input_policies() {
    let terminator = RecordingTerminator::new();

    let request = JsonConfigRequest::new().variable("{\"a\": [1, 2}");
    let err = json_config(&request, &terminator).unwrap_err();
    assert!(matches!(err, CoreError::ConfigParse { .. }));
    assert!(terminator.requests().is_empty());

    let request = JsonConfigRequest::new()
        .fixed(r#"{"[^^l^^]": {"__vars__": {}, "__content__": 1}}"#)
        .quit_policy(QuitPolicy::Exit);
    let err = json_config(&request, &terminator).unwrap_err();
    assert!(matches!(err, CoreError::TemplateMissingKey { .. }));
    assert_eq!(terminator.requests(), vec![Termination::Exit(-1)]);
}

/// 测试应用配置经流水线加载后创建引擎
#[test]
fn test_core_config_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let log_dir = temp_dir.path().join("logs");
    let config_path = temp_dir.path().join("app.json");
    std::fs::write(
        &config_path,
        json!({
            "logging": {
                "app_name": "svc",
                "handlers": [
                    {"name": "audit", "type": "file", "options": ["audit", "notime"],
                     "params": {"directory": log_dir, "prefix": "audit", "rotation": "never"}}
                ]
            },
            "diagnostics": {"level": "debug"}
        })
        .to_string(),
    )
    .unwrap();

    let config = CoreConfig::from_file(&config_path).unwrap();
    assert_eq!(config.logging.app_name, "svc");
    assert_eq!(config.diagnostics.level, "debug");

    let engine = LogEngine::from_config(
        &config.logging,
        "/usr/bin/svc",
        Arc::new(RecordingTerminator::new()),
    )
    .unwrap();
    assert_eq!(engine.handler_names(), vec!["audit"]);
    engine.shutdown();
    assert!(log_dir.exists());
}

/// 测试参数配置可以覆盖可变配置中的处理器设置
#[test]
fn test_core_config_sources_precedence() {
    let sources = ConfigSources {
        fixed: r#"{"logging": {"app_name": "locked"}}"#.to_string(),
        variable: r#"{"logging": {"app_name": "free", "indented": false}}"#.to_string(),
        files: ConfigFiles::default(),
        parameters: r#"{"logging": {"indented": true}}"#.to_string(),
    };
    let config = CoreConfig::from_sources(&sources).unwrap();
    assert_eq!(config.logging.app_name, "locked");
    assert!(config.logging.indented);
}
