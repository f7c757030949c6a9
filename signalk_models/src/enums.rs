//! 通用枚举模块。
//!
//! 目前只有连接管理器的状态机阶段。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 连接管理器在当前 URL 代次中所处的阶段。
///
/// ```text
/// Idle --(新 URL)--> Discovering
/// Discovering --(HTTP 成功)--> ConnectingWs
/// Discovering --(HTTP 失败/超时)--> Failed
/// ConnectingWs --(WS 打开)--> Connected
/// ConnectingWs --(WS 错误/超时)--> Failed
/// Connected --(WS 错误)--> Failed
/// Connected --(WS 关闭)--> Disconnected
/// 任意阶段 --(新 URL)--> Discovering
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionPhase {
    /// 尚未收到任何服务器 URL，或服务已关闭。
    #[default]
    Idle,
    /// HTTP 发现请求进行中。
    Discovering,
    /// 发现成功，正在建立 WebSocket 连接。
    ConnectingWs,
    /// WebSocket 已打开。
    Connected,
    /// 当前代次的连接尝试失败，只有新 URL 才会重新触发。
    Failed,
    /// WebSocket 被关闭。
    Disconnected,
}

impl ConnectionPhase {
    /// 是否处于等待网络结果的中间阶段。
    pub fn is_in_progress(self) -> bool {
        matches!(self, ConnectionPhase::Discovering | ConnectionPhase::ConnectingWs)
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
