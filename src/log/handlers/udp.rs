//! UDP 处理器
//!
//! 每条日志作为一个数据报发送到远端采集器，超长消息截断。
//! 发送是同步的，慢网络会阻塞调用线程。

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use serde_json::Value;

use crate::log::handler::{HandlerType, LogHandler};
use crate::log::severity::Severity;
use crate::utils::{CoreError, Result};

/// UDP 处理器类型名
pub const TYPE_NAME: &str = "udp";

/// 默认最大数据报长度
pub const DEFAULT_MAX_DATAGRAM: usize = 8 * 1024;

/// 发送到 UDP 端点的处理器
#[derive(Debug)]
pub struct UdpHandler {
    socket: Option<UdpSocket>,
    peer: SocketAddr,
    max_datagram: usize,
}

impl UdpHandler {
    /// 连接到远端地址，`url` 可以带 `udp://` 前缀
    pub fn connect(url: &str, max_datagram: usize) -> Result<Self> {
        let address = url.strip_prefix("udp://").unwrap_or(url);
        let peer = address
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| CoreError::HandlerOpenFailed {
                name: TYPE_NAME.to_string(),
                reason: format!("无法解析地址 '{}'", url),
            })?;
        let bind: SocketAddr = if peer.is_ipv4() {
            ([0u8; 4], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind)?;
        socket.connect(peer)?;
        Ok(Self {
            socket: Some(socket),
            peer,
            max_datagram: max_datagram.max(1),
        })
    }

    /// 处理器类型描述
    ///
    /// 参数：`{"url": "udp://host:port", "max_datagram": int}`
    pub fn handler_type() -> HandlerType {
        HandlerType::new(TYPE_NAME).with_factory(|params: &Value| {
            let url = params
                .get("url")
                .and_then(Value::as_str)
                .ok_or_else(|| CoreError::HandlerOpenFailed {
                    name: TYPE_NAME.to_string(),
                    reason: "缺少 url 参数".to_string(),
                })?;
            let max_datagram = params
                .get("max_datagram")
                .and_then(Value::as_u64)
                .map(|n| n as usize)
                .unwrap_or(DEFAULT_MAX_DATAGRAM);
            Ok(Box::new(UdpHandler::connect(url, max_datagram)?) as Box<dyn LogHandler>)
        })
    }

    /// 远端地址
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    fn send(&self, bytes: &[u8]) -> i32 {
        let Some(socket) = self.socket.as_ref() else {
            return 0;
        };
        let len = bytes.len().min(self.max_datagram);
        if let Err(e) = socket.send(&bytes[..len]) {
            tracing::warn!(peer = %self.peer, "UDP 日志发送失败: {}", e);
        }
        0
    }
}

impl LogHandler for UdpHandler {
    fn write(&mut self, _severity: Severity, bytes: &[u8]) -> i32 {
        self.send(bytes)
    }

    fn format(&mut self, _severity: Severity, text: &str) -> i32 {
        self.send(text.as_bytes())
    }

    fn close(&mut self) {
        self.socket = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_udp_handler_sends_datagrams() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let url = format!("udp://{}", receiver.local_addr().unwrap());

        let mut handler = UdpHandler::connect(&url, 5).unwrap();
        assert_eq!(handler.write(Severity::Info, b"hello world"), 0);

        let mut buf = [0u8; 64];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello");

        handler.close();
        assert_eq!(handler.write(Severity::Info, b"dropped"), 0);
    }

    #[test]
    fn test_factory_requires_url() {
        let handler_type = UdpHandler::handler_type();
        let factory = handler_type.factory().unwrap();
        assert!(factory(&serde_json::json!({"max_datagram": 10})).is_err());
    }
}
