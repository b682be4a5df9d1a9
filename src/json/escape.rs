//! JSON 字符串转义与数值格式化
//!
//! 转义规则：
//! - `\b \f \n \r \t` 使用简写形式
//! - `"` → `\"`，`\` → `\\`
//! - 其他小于 0x20 的控制字符 → `\u00XX`
//! - 0x7F 及以上的字符原样保留（不做 UTF-8 校验）

/// 把 `src` 转义后追加到 `dst`
pub fn escape_into(dst: &mut String, src: &str) {
    for c in src.chars() {
        match c {
            '"' => dst.push_str("\\\""),
            '\\' => dst.push_str("\\\\"),
            '\u{08}' => dst.push_str("\\b"),
            '\u{0C}' => dst.push_str("\\f"),
            '\n' => dst.push_str("\\n"),
            '\r' => dst.push_str("\\r"),
            '\t' => dst.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                dst.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => dst.push(c),
        }
    }
}

/// 转义字符串
pub fn escape(src: &str) -> String {
    let mut out = String::with_capacity(src.len() + 2);
    escape_into(&mut out, src);
    out
}

/// 有效数字位数
const SIGNIFICANT_DIGITS: usize = 20;

/// 按 `%.20g` 的规则格式化浮点数
///
/// 结果只包含数字和负号时追加 `.0`，保证解析回来仍是实数。
/// 非有限值（NaN、无穷）输出 `null`。
///
/// ```
/// use jlog_core::json::escape::format_double;
///
/// assert_eq!(format_double(2.0), "2.0");
/// assert_eq!(format_double(-0.5), "-0.5");
/// assert_eq!(format_double(1e21), "1e+21");
/// ```
pub fn format_double(value: f64) -> String {
    if !value.is_finite() {
        return "null".to_string();
    }

    let mut text = format_g(value, SIGNIFICANT_DIGITS);
    if text.bytes().all(|b| b.is_ascii_digit() || b == b'-') {
        text.push_str(".0");
    }
    text
}

/// C 语言 `%.{precision}g` 的等价实现
fn format_g(value: f64, precision: usize) -> String {
    let precision = precision.max(1);
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // 先按科学计数法取得十进制指数
    let sci = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exponent < -4 || exponent >= precision as i32 {
        let mantissa = strip_trailing_zeros(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        strip_trailing_zeros(&format!("{:.*}", decimals, value)).to_string()
    }
}

fn strip_trailing_zeros(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}
