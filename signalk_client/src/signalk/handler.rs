// signalk_client/src/signalk/handler.rs

//! 入站数据帧的处理钩子。
//!
//! 连接管理器对每一条入站帧调用一次 [`MessageHandler::on_message`]，
//! 按到达顺序、不缓冲、不施加背压。帧的解码 (SignalK delta 协议) 由钩子的实现者负责。

use log::trace;
use signalk_models::RawFrame;
use tokio::sync::mpsc;

/// 数据帧处理钩子。
///
/// 实现必须尽快返回：它在 WebSocket 读循环中同步调用，耗时的处理会推迟下一帧的读取。
pub trait MessageHandler: Send + Sync + 'static {
    fn on_message(&self, frame: RawFrame);
}

/// 丢弃所有帧的默认钩子。
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMessageHandler;

impl MessageHandler for NoopMessageHandler {
    fn on_message(&self, frame: RawFrame) {
        trace!("[消息钩子] 丢弃一条 {} 字节的帧 (代次 {})", frame.data.len(), frame.generation);
    }
}

/// 把帧转发到无界通道的钩子，供异步消费者使用。
#[derive(Debug, Clone)]
pub struct ChannelMessageHandler {
    tx: mpsc::UnboundedSender<RawFrame>,
}

impl ChannelMessageHandler {
    /// 创建钩子及其对应的接收端。
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RawFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MessageHandler for ChannelMessageHandler {
    fn on_message(&self, frame: RawFrame) {
        // 接收端已关闭时静默丢弃
        let _ = self.tx.send(frame);
    }
}
