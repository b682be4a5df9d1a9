//! 十六进制/ASCII 转储
//!
//! 为 `debug_dump`、`trace_hex_msg` 提供的格式化原语。
//! 每行 16 字节：偏移、十六进制列、可打印字符列。

/// 每行字节数
const BYTES_PER_LINE: usize = 16;

/// 把字节序列渲染为转储行
///
/// ```
/// use jlog_core::utils::dump::tdump_lines;
///
/// let lines = tdump_lines(b"AB");
/// assert_eq!(lines.len(), 1);
/// assert!(lines[0].starts_with("0000: 41 42"));
/// ```
pub fn tdump_lines(bytes: &[u8]) -> Vec<String> {
    bytes
        .chunks(BYTES_PER_LINE)
        .enumerate()
        .map(|(index, chunk)| {
            let mut hex = String::with_capacity(BYTES_PER_LINE * 3);
            for i in 0..BYTES_PER_LINE {
                match chunk.get(i) {
                    Some(b) => hex.push_str(&format!("{:02X} ", b)),
                    None => hex.push_str("   "),
                }
            }
            let ascii: String = chunk
                .iter()
                .map(|&b| {
                    if b.is_ascii_graphic() || b == b' ' {
                        b as char
                    } else {
                        '.'
                    }
                })
                .collect();
            format!("{:04X}: {}{}", index * BYTES_PER_LINE, hex, ascii)
        })
        .collect()
}

/// 把字节序列渲染为连续的小写十六进制串
pub fn hex_string(bytes: &[u8]) -> String {
    hex::encode(bytes)
}
