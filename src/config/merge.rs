//! 配置深度合并
//!
//! - 对象：递归合并
//! - 数组：按集合合并，源数组中与目标所有元素都不相等（深度比较）的元素追加到末尾
//! - 标量及类型不同的值：`overwrite` 为真时用源值替换
//! - 目标中不存在的键：直接插入

use serde_json::{Map, Value};

/// 把 `src` 深度合并进 `dst`
pub fn json_dict_recursive_update(dst: &mut Map<String, Value>, src: &Map<String, Value>, overwrite: bool) {
    for (key, value) in src {
        match dst.get_mut(key) {
            None => {
                dst.insert(key.clone(), value.clone());
            }
            Some(existing) => merge_value(existing, value, overwrite),
        }
    }
}

/// 按集合语义把 `src` 合并进 `dst`
pub fn json_list_update(dst: &mut Vec<Value>, src: &[Value]) {
    for value in src {
        if !dst.contains(value) {
            dst.push(value.clone());
        }
    }
}

fn merge_value(dst: &mut Value, src: &Value, overwrite: bool) {
    match (dst, src) {
        (Value::Object(d), Value::Object(s)) => json_dict_recursive_update(d, s, overwrite),
        (Value::Array(d), Value::Array(s)) => json_list_update(d, s),
        (d, s) => {
            if overwrite {
                *d = s.clone();
            }
        }
    }
}
