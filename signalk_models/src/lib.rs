//! `signalk_models` 公共模型库 crate。
//!
//! 本 crate 集中定义了 SignalK 连接客户端各组件之间共享的数据结构：
//! - **服务发现 (`discovery`)**: SignalK 服务器对 HTTP 探测请求返回的服务器标识与按 API 版本划分的端点表。
//! - **连接状态 (`status`)**: HTTP 发现状态与 WebSocket 状态共用的 `(ok, message)` 状态值，
//!   以及界面上显示的固定状态文案。
//! - **通用枚举 (`enums`)**: 连接管理器状态机的阶段 (`ConnectionPhase`)。
//! - **数据帧 (`frame`)**: 从 WebSocket 收到、原样转交给消息处理钩子的原始帧。
//!
//! 所有模型都派生 `Serialize`/`Deserialize`/`Debug`/`Clone`，以便写入日志、
//! 通过事件发送给界面层或在测试中比较。

pub mod discovery; // SignalK 服务发现响应
pub mod enums; // 连接阶段等通用枚举
pub mod frame; // 原始 WebSocket 数据帧
pub mod status; // 连接状态值与状态文案

pub use discovery::{ApiEndpoints, DiscoveredEndpoints, EndpointDiscoveryResponse, ServerInfo};
pub use enums::ConnectionPhase;
pub use frame::{FrameData, RawFrame};
pub use status::ConnectionStatus;
