// signalk_client/src/error.rs

//! `signalk_client` 的错误类型定义模块。
//!
//! 这些错误只在 crate 内部流转并写入日志；对界面层而言，
//! 所有连接失败都只通过状态流上的文案体现。

use signalk_transport::WsError;
use std::time::Duration;
use thiserror::Error;

/// SignalK 客户端的主要错误类型。
#[derive(Error, Debug)]
pub enum SignalKError {
    /// HTTP 请求在传输层失败 (连接被拒绝、DNS 失败、URL 无效等)。
    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),

    /// 服务器返回了非 2xx 的状态码。
    #[error("服务器返回非成功状态码 {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// 发现响应体不是合法的 `EndpointDiscoveryResponse`。
    #[error("发现响应解析失败: {0}")]
    Decode(#[source] serde_json::Error),

    /// 网络操作超过限时。
    #[error("操作超时 (限时 {0:?})")]
    Timeout(Duration),

    /// 服务器的 `v1` 端点表中缺少所需的端点。
    #[error("服务器未公布端点 '{0}'")]
    MissingEndpoint(&'static str),

    /// WebSocket 传输层错误。
    #[error("WebSocket 错误: {0}")]
    WebSocket(#[from] WsError),

    /// 配置文件读取、解析或写入失败。
    #[error("配置错误: {0}")]
    Config(String),
}
