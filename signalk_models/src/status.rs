// signalk_models/src/status.rs

//! 连接状态值。
//!
//! HTTP 发现状态和 WebSocket 状态是两个相互独立的实例，但共用同一个结构：
//! 一个布尔的 "OK" 标志加上一条供界面直接显示的文案。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 发现请求已发出、尚未返回。
pub const MSG_CONNECTING: &str = "Connecting...";
/// 发现失败 (网络错误、非 2xx 响应或响应体无法解析)。
pub const MSG_UNKNOWN_ERROR: &str = "Unknown Error";
/// WebSocket 已打开。
pub const MSG_CONNECTED: &str = "Connected";
/// WebSocket 传输层报告错误。
pub const MSG_UNSPECIFIED_ERROR: &str = "Unspecified Error";
/// WebSocket 已关闭。
pub const MSG_DISCONNECTED: &str = "Disconnected";
/// 发现请求或 WebSocket 握手超过配置的超时时间。
pub const MSG_TIMEOUT: &str = "Connection Timeout";

/// `(ok, message)` 形式的连接状态。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectionStatus {
    pub ok: bool,
    pub message: String,
}

impl ConnectionStatus {
    pub fn new(ok: bool, message: impl Into<String>) -> Self {
        Self { ok, message: message.into() }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(true, message)
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(false, message)
    }

    pub fn connecting() -> Self {
        Self::failed(MSG_CONNECTING)
    }

    pub fn unknown_error() -> Self {
        Self::failed(MSG_UNKNOWN_ERROR)
    }

    pub fn ws_connected() -> Self {
        Self::ok(MSG_CONNECTED)
    }

    pub fn ws_error() -> Self {
        Self::failed(MSG_UNSPECIFIED_ERROR)
    }

    pub fn ws_disconnected() -> Self {
        Self::failed(MSG_DISCONNECTED)
    }

    pub fn timeout() -> Self {
        Self::failed(MSG_TIMEOUT)
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", if self.ok { "OK" } else { "--" }, self.message)
    }
}
