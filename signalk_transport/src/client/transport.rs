// signalk_transport/src/client/transport.rs

//! 客户端 WebSocket 传输层核心逻辑。
//!
//! 本模块提供连接 SignalK 数据流所需的三个操作：
//! - [`connect_client`] / [`connect_client_with_timeout`]: 解析 URL 并完成 WebSocket 握手。
//! - [`receive_frame`]: 从接收端取出下一条数据帧，跳过控制帧。
//! - [`ClientConnection::close`]: 发送 Close 帧并关闭连接。

use crate::error::WsError;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt,
    StreamExt,
};
use log::{debug, error, info};
use signalk_models::FrameData;
use std::time::Duration;
use std::io::ErrorKind;
use tokio_tungstenite::{
    connect_async,
    tungstenite::error::ProtocolError,
    tungstenite::protocol::Message,
    tungstenite::Error as TungsteniteError,
    WebSocketStream,
};
use url::Url;

/// 客户端连接成功后得到的流类型 (可能经过 TLS 加密的 TCP 流)。
pub type ClientWsStream = WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// 一个活动的客户端 WebSocket 连接。
///
/// 发送端只用于关闭握手；SignalK 连接层不向服务器发送业务消息。
pub struct ClientConnection {
    /// 连接的目标地址，仅用于日志。
    pub url: String,
    /// 发送端 (`Sink`)。
    pub ws_sender: SplitSink<ClientWsStream, Message>,
    /// 接收端 (`Stream`)，配合 [`receive_frame`] 使用。
    pub ws_receiver: SplitStream<ClientWsStream>,
}

impl ClientConnection {
    /// 发送 Close 帧并关闭发送端。
    ///
    /// 连接已经被对方关闭时视为成功。
    pub async fn close(&mut self) -> Result<(), WsError> {
        debug!("客户端：正在关闭与 {} 的连接。", self.url);
        match self.ws_sender.close().await {
            Ok(()) => Ok(()),
            Err(TungsteniteError::ConnectionClosed) | Err(TungsteniteError::AlreadyClosed) => Ok(()),
            Err(e) => Err(WsError::WebSocketProtocolError(e)),
        }
    }
}

/// 校验 URL 字符串：必须能被解析，且协议为 `ws` 或 `wss`。
fn parse_ws_url(url_str: &str) -> Result<Url, WsError> {
    let parsed = Url::parse(url_str)
        .map_err(|e| WsError::InvalidUrl(format!("无效的 WebSocket URL '{}': {}", url_str, e)))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed),
        other => Err(WsError::InvalidUrl(format!(
            "WebSocket URL '{}' 的协议 '{}' 不受支持，只接受 ws/wss",
            url_str, other
        ))),
    }
}

/// 异步连接到指定的 WebSocket 服务器。
///
/// 握手成功后把流拆分为发送端和接收端，封装进 [`ClientConnection`]。
pub async fn connect_client(url_str: &str) -> Result<ClientConnection, WsError> {
    info!("客户端：开始尝试连接到 WebSocket 服务器，URL: {}", url_str);
    let parsed_url = parse_ws_url(url_str)?;

    match connect_async(parsed_url.as_str()).await {
        Ok((ws_stream, response)) => {
            info!("客户端：已成功连接到 {} (HTTP 状态码: {})", url_str, response.status());
            debug!("客户端：WebSocket 连接响应头: {:?}", response.headers());
            let (ws_sender, ws_receiver) = ws_stream.split();
            Ok(ClientConnection { url: url_str.to_string(), ws_sender, ws_receiver })
        }
        Err(TungsteniteError::Io(e)) => {
            error!("客户端：连接到 {} 时发生 I/O 错误: {}", url_str, e);
            Err(WsError::IoError(e))
        }
        Err(e) => {
            error!("客户端：连接到 {} 失败，错误: {}", url_str, e);
            Err(WsError::WebSocketProtocolError(e))
        }
    }
}

/// 对方未经关闭握手就断开了连接 (TCP 被重置或直接关闭)。
fn is_abrupt_close(e: &TungsteniteError) -> bool {
    match e {
        TungsteniteError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
        TungsteniteError::Io(io) => matches!(
            io.kind(),
            ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe | ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}

/// 与 [`connect_client`] 相同，但握手必须在 `limit` 内完成，否则返回 [`WsError::ConnectionTimeout`]。
pub async fn connect_client_with_timeout(url_str: &str, limit: Duration) -> Result<ClientConnection, WsError> {
    match tokio::time::timeout(limit, connect_client(url_str)).await {
        Ok(result) => result,
        Err(_) => {
            error!("客户端：连接到 {} 超时 (限时 {:?})。", url_str, limit);
            Err(WsError::ConnectionTimeout)
        }
    }
}

/// 从接收端取出下一条数据帧。
///
/// Ping/Pong 由 `tokio-tungstenite` 自动应答，这里直接跳过。
///
/// # Returns
/// - `Some(Ok(frame))`: 收到一条文本或二进制帧。
/// - `Some(Err(e))`: 传输层错误 (协议错误、非法帧等)。
/// - `None`: 连接已关闭。包括收到 Close 帧、流已结束，以及对方未经关闭握手直接断开。
pub async fn receive_frame(ws_receiver: &mut SplitStream<ClientWsStream>) -> Option<Result<FrameData, WsError>> {
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    debug!("客户端：收到文本帧，长度: {} 字节", text.len());
                    break Some(Ok(FrameData::Text(text)));
                }
                Message::Binary(bin) => {
                    debug!("客户端：收到二进制帧，长度: {} 字节", bin.len());
                    break Some(Ok(FrameData::Binary(bin)));
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    // 控制帧，继续等待数据帧
                }
                Message::Close(close_frame) => {
                    debug!("客户端：收到 Close 控制帧: {:?}", close_frame);
                    break None;
                }
            },
            Some(Err(TungsteniteError::ConnectionClosed)) | Some(Err(TungsteniteError::AlreadyClosed)) => {
                debug!("客户端：连接已关闭 (ConnectionClosed/AlreadyClosed)。");
                break None;
            }
            Some(Err(e)) if is_abrupt_close(&e) => {
                info!("客户端：对方未经关闭握手断开了连接: {}", e);
                break None;
            }
            Some(Err(e)) => {
                error!("客户端：从 WebSocket 流接收数据时发生底层错误: {}", e);
                break Some(Err(WsError::WebSocketProtocolError(e)));
            }
            None => {
                debug!("客户端：WebSocket 接收流已结束。");
                break None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::accept_async;

    fn init_test_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[tokio::test]
    async fn test_invalid_urls_are_rejected() {
        init_test_logger();
        let err = connect_client("not a url").await.err().expect("应返回错误");
        assert!(matches!(err, WsError::InvalidUrl(_)), "实际错误: {:?}", err);

        let err = connect_client("http://127.0.0.1:1/stream").await.err().expect("应返回错误");
        assert!(matches!(err, WsError::InvalidUrl(_)), "实际错误: {:?}", err);
    }

    #[tokio::test]
    async fn test_connect_refused_is_io_error() {
        init_test_logger();
        // 先绑定再释放，得到一个大概率无人监听的端口
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("绑定失败");
        let addr = listener.local_addr().expect("获取地址失败");
        drop(listener);

        let err = connect_client(&format!("ws://{}", addr)).await.err().expect("应返回错误");
        assert!(matches!(err, WsError::IoError(_)), "实际错误: {:?}", err);
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        init_test_logger();
        // 只接受 TCP 连接，从不完成 WebSocket 握手
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("绑定失败");
        let addr = listener.local_addr().expect("获取地址失败");
        let server = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.expect("accept 失败");
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let err = connect_client_with_timeout(&format!("ws://{}", addr), Duration::from_millis(100))
            .await
            .err()
            .expect("应超时");
        assert!(err.is_timeout(), "实际错误: {:?}", err);
        server.abort();
    }

    #[tokio::test]
    async fn test_receive_frames_in_order_then_close() {
        init_test_logger();
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("绑定失败");
        let addr = listener.local_addr().expect("获取地址失败");

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept 失败");
            let mut ws = accept_async(stream).await.expect("服务端握手失败");
            ws.send(Message::Text("first".to_string())).await.expect("发送失败");
            ws.send(Message::Ping(vec![1, 2, 3])).await.expect("发送失败");
            ws.send(Message::Binary(vec![9, 8, 7])).await.expect("发送失败");
            ws.send(Message::Text("third".to_string())).await.expect("发送失败");
            ws.close(None).await.expect("关闭失败");
            // 等待客户端完成关闭握手
            while let Some(Ok(_)) = ws.next().await {}
        });

        let mut conn = connect_client(&format!("ws://{}", addr)).await.expect("连接失败");
        let wait = Duration::from_secs(5);

        let first = timeout(wait, receive_frame(&mut conn.ws_receiver)).await.expect("超时");
        assert_eq!(first.expect("应有帧").expect("不应出错"), FrameData::Text("first".to_string()));

        let second = timeout(wait, receive_frame(&mut conn.ws_receiver)).await.expect("超时");
        assert_eq!(second.expect("应有帧").expect("不应出错"), FrameData::Binary(vec![9, 8, 7]));

        let third = timeout(wait, receive_frame(&mut conn.ws_receiver)).await.expect("超时");
        assert_eq!(third.expect("应有帧").expect("不应出错"), FrameData::Text("third".to_string()));

        let end = timeout(wait, receive_frame(&mut conn.ws_receiver)).await.expect("超时");
        assert!(end.is_none(), "服务端关闭后应返回 None");

        server.abort();
    }

    #[tokio::test]
    async fn test_drop_without_close_handshake_is_close() {
        init_test_logger();
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("绑定失败");
        let addr = listener.local_addr().expect("获取地址失败");

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept 失败");
            let mut ws = accept_async(stream).await.expect("服务端握手失败");
            ws.send(Message::Text("last".to_string())).await.expect("发送失败");
            // 不发送 Close 帧，直接断开 TCP
            drop(ws);
        });

        let mut conn = connect_client(&format!("ws://{}", addr)).await.expect("连接失败");
        let wait = Duration::from_secs(5);

        let last = timeout(wait, receive_frame(&mut conn.ws_receiver)).await.expect("超时");
        assert_eq!(last.expect("应有帧").expect("不应出错"), FrameData::Text("last".to_string()));

        let end = timeout(wait, receive_frame(&mut conn.ws_receiver)).await.expect("超时");
        assert!(end.is_none(), "未经关闭握手的断开应视为关闭，实际: {:?}", end.map(|r| r.map_err(|e| e.to_string())));

        server.await.expect("服务端任务失败");
    }

    #[tokio::test]
    async fn test_invalid_frame_is_error() {
        init_test_logger();
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("绑定失败");
        let addr = listener.local_addr().expect("获取地址失败");

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept 失败");
            let mut ws = accept_async(stream).await.expect("服务端握手失败");
            // FIN + 保留的操作码 0xF
            ws.get_mut().write_all(&[0x8F, 0x00]).await.expect("写入失败");
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut conn = connect_client(&format!("ws://{}", addr)).await.expect("连接失败");
        let next = timeout(Duration::from_secs(5), receive_frame(&mut conn.ws_receiver)).await.expect("超时");
        assert!(matches!(next, Some(Err(WsError::WebSocketProtocolError(_)))), "非法帧应返回错误");

        server.abort();
    }
}
