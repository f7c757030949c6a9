// signalk_models/src/discovery.rs

//! SignalK 服务发现响应的数据结构。
//!
//! 客户端对配置的服务器 URL 发起一次 `GET` 请求，服务器返回形如下面的 JSON：
//!
//! ```json
//! {
//!   "endpoints": {
//!     "v1": {
//!       "version": "1.0.0",
//!       "signalk-http": "http://host:3000/signalk/v1/api/",
//!       "signalk-ws": "ws://host:3000/signalk/v1/stream",
//!       "signalk-tcp": "tcp://host:8375"
//!     }
//!   },
//!   "server": { "id": "signalk-server-node", "version": "1.2.0" }
//! }
//! ```
//!
//! 只有 `v1` 条目会被使用；其他版本的条目被容忍但忽略。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 单个 API 版本下服务器公布的能力端点。
///
/// 三个端点都是可选的：服务器可能只开放其中一部分协议。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ApiEndpoints {
    /// 该 API 版本的完整版本号，例如 `"1.0.0"`。部分服务器会省略此字段。
    #[serde(default)]
    pub version: Option<String>,

    /// REST (HTTP) 接口的基础地址。
    #[serde(rename = "signalk-http", default)]
    pub signalk_http: Option<String>,

    /// 实时数据流 WebSocket 的地址。
    #[serde(rename = "signalk-ws", default)]
    pub signalk_ws: Option<String>,

    /// 原始 TCP 数据流地址。
    #[serde(rename = "signalk-tcp", default)]
    pub signalk_tcp: Option<String>,
}

/// 服务器身份信息。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// 服务器实现的标识，例如 `"signalk-server-node"`。
    pub id: String,
    /// 服务器软件版本。
    pub version: String,
}

/// 服务发现请求的完整响应体。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EndpointDiscoveryResponse {
    /// API 版本号 (`"v1"`, `"v2"` ...) 到端点集合的映射。
    pub endpoints: HashMap<String, ApiEndpoints>,
    /// 服务器身份。
    pub server: ServerInfo,
}

impl EndpointDiscoveryResponse {
    /// 当前客户端使用的 API 版本键。
    pub const API_VERSION: &'static str = "v1";

    /// 取出 `v1` 端点；服务器未公布 `v1` 时返回 `None`。
    pub fn v1(&self) -> Option<&ApiEndpoints> {
        self.endpoints.get(Self::API_VERSION)
    }

    /// 把 `v1` 端点整理为 `DiscoveredEndpoints`。缺少 `v1` 时所有字段均为 `None`。
    pub fn discovered_endpoints(&self) -> DiscoveredEndpoints {
        match self.v1() {
            Some(v1) => DiscoveredEndpoints {
                http: v1.signalk_http.clone(),
                ws: v1.signalk_ws.clone(),
                tcp: v1.signalk_tcp.clone(),
            },
            None => DiscoveredEndpoints::default(),
        }
    }
}

/// 连接管理器为当前 URL 代次保存的端点地址。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct DiscoveredEndpoints {
    pub http: Option<String>,
    pub ws: Option<String>,
    pub tcp: Option<String>,
}
