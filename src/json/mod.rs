//! 轻量 JSON 构建
//!
//! 日志引擎使用的扁平 JSON 对象构建器，不依赖通用 JSON 库的分配路径。

pub mod builder;
pub mod escape;
pub mod fields;

pub use builder::{Hgen, JsonBuffer, JsonPool, MAX_GENERATORS};
pub use fields::{Conversion, FieldValue, Fields, FormatArg};
