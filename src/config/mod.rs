//! JSON 配置加载
//!
//! - [`loader`]：按行读取、`#^^` 注释、解析
//! - [`merge`]：深度合并
//! - [`template`]：范围展开与变量替换
//! - [`pipeline`]：完整的合并/展开流水线

pub mod loader;
pub mod merge;
pub mod pipeline;
pub mod template;

pub use loader::{load_file, load_str};
pub use merge::json_dict_recursive_update;
pub use pipeline::{json_config, json_config_value, ConfigFiles, JsonConfigRequest};
pub use template::{listsrange2set, replace_vars, SubstitutionMode, TemplateExpander};
