//! `signalk_transport` 封装了 SignalK 数据流所用的 WebSocket 客户端传输层。
//!
//! 它只关心连接的生命周期：建立连接、按到达顺序取出数据帧、关闭连接。
//! 帧内容不做任何解析，原样交给上层。
//!
//! 主要模块包括：
//! - `error`: 传输层统一错误类型 `WsError`。
//! - `client`: 客户端连接与收帧逻辑。

pub mod client;
pub mod error;

pub use client::transport::{connect_client, connect_client_with_timeout, receive_frame, ClientConnection};
pub use error::WsError;
