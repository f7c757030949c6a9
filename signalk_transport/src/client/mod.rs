// signalk_transport/src/client/mod.rs

//! WebSocket 客户端模块。
//!
//! `transport` 子模块负责连接建立、收帧和关闭，把 `tokio-tungstenite`
//! 的细节挡在上层之外。

pub mod transport;
