// signalk_transport/src/error.rs

//! 定义 WebSocket 传输层相关的错误类型。

use thiserror::Error;

/// WebSocket 传输层的统一错误类型。
#[derive(Error, Debug)]
pub enum WsError {
    /// WebSocket 协议相关的错误，例如握手失败、连接被重置、帧格式不正确等。
    #[error("WebSocket协议错误: {0}")]
    WebSocketProtocolError(#[from] tokio_tungstenite::tungstenite::Error),

    /// 底层 I/O 错误。
    #[error("I/O错误: {0}")]
    IoError(#[from] std::io::Error),

    /// 握手在限定时间内没有完成。
    #[error("连接超时")]
    ConnectionTimeout,

    /// URL 无法解析，或协议不是 `ws`/`wss`。
    #[error("无效的URL: {0}")]
    InvalidUrl(String),
}

impl WsError {
    /// 是否为超时错误。
    pub fn is_timeout(&self) -> bool {
        matches!(self, WsError::ConnectionTimeout)
    }
}
