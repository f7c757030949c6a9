//! `signalk_client`：SignalK 服务器连接客户端。
//!
//! 给定一个服务器 URL，客户端先通过 HTTP 发现 API 端点，再连接服务器公布的
//! WebSocket 数据流，并以状态流的形式报告连接健康状况。

pub mod config;   // 应用配置加载与保存。
pub mod error;    // 错误类型。
pub mod event;    // 状态事件名称与负载。
pub mod settings; // 服务器 URL 的设置服务。
pub mod signalk;  // 服务发现与连接管理。

pub use error::SignalKError;
pub use signalk::{ConnectionTimeouts, MessageHandler, SignalKService};
