// signalk_client/src/signalk/mod.rs

//! SignalK 连接核心逻辑模块。
//!
//! - `discovery`: HTTP 服务发现，读取服务器公布的 `v1` 端点。
//! - `service`: 连接管理器 `SignalKService`，负责代次、WebSocket 生命周期与状态发布。
//! - `subject`: "最新值回放" 状态流。
//! - `handler`: 入站数据帧的处理钩子。

pub mod discovery;
pub mod handler;
pub mod service;
pub mod subject;

pub use handler::{ChannelMessageHandler, MessageHandler, NoopMessageHandler};
pub use service::{ConnectionTimeouts, SignalKService};
pub use subject::{StatusSubject, StatusSubscription};
