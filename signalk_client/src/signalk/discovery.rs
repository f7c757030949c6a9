// signalk_client/src/signalk/discovery.rs

//! SignalK HTTP 服务发现。
//!
//! 对服务器 URL 发起一次 `GET`，要求 2xx 状态码和可解析的 JSON 响应体。
//! 成功时同时保留 HTTP 状态码和原因短语，用于拼出界面上显示的状态文案。

use crate::error::SignalKError;
use log::{debug, info};
use signalk_models::{DiscoveredEndpoints, EndpointDiscoveryResponse, ServerInfo};

/// 一次成功的服务发现结果。
#[derive(Debug, Clone)]
pub struct DiscoveryOutcome {
    /// HTTP 状态码，例如 `200`。
    pub status_code: u16,
    /// 状态码的标准原因短语，例如 `"OK"`。
    /// 取自 `StatusCode::canonical_reason`，不是服务器实际发送的短语。
    /// 服务器使用非标准短语时两者不同；非标准状态码为空字符串。
    pub status_text: String,
    /// 解析后的响应体。
    pub response: EndpointDiscoveryResponse,
}

impl DiscoveryOutcome {
    /// 界面上显示的 HTTP 状态文案。
    pub fn status_message(&self) -> String {
        format_status_message(self.status_code, &self.status_text, &self.response.server)
    }

    /// `v1` 条目中的端点地址。
    pub fn endpoints(&self) -> DiscoveredEndpoints {
        self.response.discovered_endpoints()
    }
}

/// 拼出 `"HTTP <code>: <text>. Server: <id> Ver: <version>"`。
pub fn format_status_message(status_code: u16, status_text: &str, server: &ServerInfo) -> String {
    format!(
        "HTTP {}: {}. Server: {} Ver: {}",
        status_code, status_text, server.id, server.version
    )
}

/// 执行服务发现请求。
///
/// 不做重试，也不设限时；限时由调用方 (`SignalKService`) 统一套上。
pub async fn fetch_endpoints(client: &reqwest::Client, url: &str) -> Result<DiscoveryOutcome, SignalKError> {
    info!("[服务发现] 正在请求 SignalK 端点: {}", url);
    let response = client.get(url).send().await?;
    let status = response.status();
    debug!("[服务发现] {} 返回状态码 {}", url, status);

    if !status.is_success() {
        // 响应体只用于日志，读取失败时留空
        let body = response.text().await.unwrap_or_default();
        return Err(SignalKError::HttpStatus { status: status.as_u16(), body });
    }

    let bytes = response.bytes().await?;
    let parsed: EndpointDiscoveryResponse = serde_json::from_slice(&bytes).map_err(SignalKError::Decode)?;

    Ok(DiscoveryOutcome {
        status_code: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("").to_string(),
        response: parsed,
    })
}
