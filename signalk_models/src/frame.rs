// signalk_models/src/frame.rs

//! 从 SignalK 数据流收到的原始帧。
//!
//! 连接层不解析帧内容 (delta 协议由独立组件处理)，只负责按到达顺序逐帧转交。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 帧负载：文本或二进制。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum FrameData {
    Text(String),
    Binary(Vec<u8>),
}

impl FrameData {
    pub fn len(&self) -> usize {
        match self {
            FrameData::Text(text) => text.len(),
            FrameData::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 文本帧的内容；二进制帧返回 `None`。
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FrameData::Text(text) => Some(text),
            FrameData::Binary(_) => None,
        }
    }
}

/// 一条入站帧及其元数据。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// 帧所属连接的 URL 代次。
    pub generation: u64,
    /// 客户端收到该帧的 UTC 时间。
    pub received_at: DateTime<Utc>,
    pub data: FrameData,
}

impl RawFrame {
    pub fn new(generation: u64, data: FrameData) -> Self {
        Self { generation, received_at: Utc::now(), data }
    }
}
