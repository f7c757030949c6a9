// signalk_client/src/event.rs

//! 状态事件定义模块。
//!
//! 界面层通过事件名和 JSON 负载接收连接状态的变化。本模块集中定义事件名称常量
//! 和对应的负载结构体；`signalk-monitor` 把它们逐行打印为 JSON。

use chrono::{DateTime, Utc};
use serde::Serialize;
use signalk_models::{ConnectionPhase, ConnectionStatus};

/// 事件名称：HTTP 服务发现状态变化。
pub const HTTP_STATUS_EVENT: &str = "signalk-http-status";
/// 事件名称：WebSocket 状态变化。
pub const WS_STATUS_EVENT: &str = "signalk-ws-status";
/// 事件名称：连接阶段变化。
pub const PHASE_EVENT: &str = "signalk-phase";

/// `(ok, message)` 状态事件的负载。
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct ConnectionStatusEvent {
    /// 事件名称，`HTTP_STATUS_EVENT` 或 `WS_STATUS_EVENT`。
    pub event: &'static str,
    pub ok: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ConnectionStatusEvent {
    pub fn http(status: &ConnectionStatus) -> Self {
        Self::with_name(HTTP_STATUS_EVENT, status)
    }

    pub fn ws(status: &ConnectionStatus) -> Self {
        Self::with_name(WS_STATUS_EVENT, status)
    }

    fn with_name(event: &'static str, status: &ConnectionStatus) -> Self {
        Self {
            event,
            ok: status.ok,
            message: status.message.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// 连接阶段事件的负载。
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct PhaseEvent {
    pub event: &'static str,
    pub phase: ConnectionPhase,
    pub timestamp: DateTime<Utc>,
}

impl PhaseEvent {
    pub fn new(phase: ConnectionPhase) -> Self {
        Self { event: PHASE_EVENT, phase, timestamp: Utc::now() }
    }
}
