// signalk_client/tests/support/mod.rs

//! 集成测试共用的模拟 SignalK 服务器。
//!
//! 路由:
//! - `/signalk`: 正常的发现响应，`signalk-ws` 指向 `/signalk/v1/stream`
//! - `/slow/signalk`: 延迟 `slow_delay` 后返回发现响应，`signalk-ws` 指向 `/slow/stream`
//! - `/broken/signalk`: 500
//! - `/garbage/signalk`: 200，但响应体不是 JSON
//! - `/no-ws/signalk`: 发现响应中没有 `signalk-ws`
//! - `/external/signalk`: `signalk-ws` 指向 `MockOptions::external_ws` (另一个进程内服务)
//! - `/drop/signalk`: `signalk-ws` 指向 `/drop/stream`，该数据流在握手后不经关闭握手直接断开
//! - `/non-authoritative/signalk`: 以 203 返回正常的发现响应
//! - `/signalk/v1/stream`, `/slow/stream`: WebSocket 数据流

#![allow(dead_code)]

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{info, LevelFilter};
use serde_json::{json, Value};
use signalk_client::signalk::StatusSubscription;
use std::fmt::Debug;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::Notify;

pub const WAIT_LIMIT: Duration = Duration::from_secs(5);

pub fn init_test_logger() {
    let _ = env_logger::builder().filter_level(LevelFilter::Debug).is_test(true).try_init();
}

#[derive(Debug, Clone)]
pub struct MockOptions {
    /// 连接建立后依次发送的文本帧。
    pub frames: Vec<String>,
    /// `/slow/signalk` 的响应延迟。
    pub slow_delay: Duration,
    /// `/external/signalk` 公布的 WebSocket 地址。
    pub external_ws: Option<String>,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self { frames: Vec::new(), slow_delay: Duration::from_millis(500), external_ws: None }
    }
}

pub struct MockState {
    pub addr: SocketAddr,
    pub options: MockOptions,
    pub discovery_hits: AtomicUsize,
    pub ws_connects: AtomicUsize,
    pub open_ws: AtomicUsize,
    pub max_open_ws: AtomicUsize,
    pub ws_paths: Mutex<Vec<String>>,
    close_streams: Notify,
}

impl MockState {
    fn discovery_body(&self, ws_path: Option<&str>) -> Value {
        self.discovery_body_with_url(ws_path.map(|path| format!("ws://{}{}", self.addr, path)))
    }

    fn discovery_body_with_url(&self, ws_url: Option<String>) -> Value {
        let mut v1 = json!({
            "version": "1.0.0",
            "signalk-http": format!("http://{}/signalk/v1/api/", self.addr),
        });
        if let Some(url) = ws_url {
            v1["signalk-ws"] = json!(url);
        }
        json!({
            "endpoints": { "v1": v1 },
            "server": { "id": "S1", "version": "1.2" }
        })
    }

    pub fn ws_paths(&self) -> Vec<String> {
        self.ws_paths.lock().expect("ws_paths 锁中毒").clone()
    }
}

pub struct MockSignalKServer {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockSignalKServer {
    pub async fn start() -> Self {
        Self::start_with(MockOptions::default()).await
    }

    pub async fn start_with(options: MockOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("无法绑定到随机端口");
        let addr = listener.local_addr().expect("无法获取本地监听地址");
        let state = Arc::new(MockState {
            addr,
            options,
            discovery_hits: AtomicUsize::new(0),
            ws_connects: AtomicUsize::new(0),
            open_ws: AtomicUsize::new(0),
            max_open_ws: AtomicUsize::new(0),
            ws_paths: Mutex::new(Vec::new()),
            close_streams: Notify::new(),
        });

        let app = Router::new()
            .route("/signalk", get(discovery))
            .route("/slow/signalk", get(slow_discovery))
            .route("/broken/signalk", get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }))
            .route("/garbage/signalk", get(|| async { "this is not json" }))
            .route("/no-ws/signalk", get(no_ws_discovery))
            .route("/external/signalk", get(external_discovery))
            .route("/drop/signalk", get(drop_discovery))
            .route("/non-authoritative/signalk", get(non_authoritative_discovery))
            .route("/drop/stream", get(drop_stream))
            .route("/signalk/v1/stream", get(stream))
            .route("/slow/stream", get(stream))
            .with_state(Arc::clone(&state));

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                log::error!("[Mock Server] 服务退出: {}", e);
            }
        });
        info!("[Mock Server] 正在监听 {}", addr);
        Self { addr, state }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn discovery_url(&self) -> String {
        self.url("/signalk")
    }

    /// 让服务器主动关闭当前的 WebSocket。
    pub fn close_streams(&self) {
        self.state.close_streams.notify_one();
    }
}

async fn discovery(State(state): State<Arc<MockState>>) -> Json<Value> {
    state.discovery_hits.fetch_add(1, Ordering::SeqCst);
    Json(state.discovery_body(Some("/signalk/v1/stream")))
}

async fn slow_discovery(State(state): State<Arc<MockState>>) -> Json<Value> {
    state.discovery_hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(state.options.slow_delay).await;
    Json(state.discovery_body(Some("/slow/stream")))
}

async fn no_ws_discovery(State(state): State<Arc<MockState>>) -> Json<Value> {
    state.discovery_hits.fetch_add(1, Ordering::SeqCst);
    Json(state.discovery_body(None))
}

async fn external_discovery(State(state): State<Arc<MockState>>) -> Json<Value> {
    state.discovery_hits.fetch_add(1, Ordering::SeqCst);
    Json(state.discovery_body_with_url(state.options.external_ws.clone()))
}

async fn drop_discovery(State(state): State<Arc<MockState>>) -> Json<Value> {
    state.discovery_hits.fetch_add(1, Ordering::SeqCst);
    Json(state.discovery_body(Some("/drop/stream")))
}

async fn non_authoritative_discovery(State(state): State<Arc<MockState>>) -> (StatusCode, Json<Value>) {
    state.discovery_hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::NON_AUTHORITATIVE_INFORMATION, Json(state.discovery_body(Some("/signalk/v1/stream"))))
}

/// 握手完成后稍等片刻，不发送 Close 帧直接丢弃连接。
async fn drop_stream(ws: WebSocketUpgrade, uri: Uri, State(state): State<Arc<MockState>>) -> Response {
    state.ws_paths.lock().expect("ws_paths 锁中毒").push(uri.path().to_string());
    ws.on_upgrade(move |socket| async move {
        state.ws_connects.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(300)).await;
        drop(socket);
    })
    .into_response()
}

async fn stream(ws: WebSocketUpgrade, uri: Uri, State(state): State<Arc<MockState>>) -> Response {
    state.ws_paths.lock().expect("ws_paths 锁中毒").push(uri.path().to_string());
    ws.on_upgrade(move |socket| handle_socket(socket, state)).into_response()
}

async fn handle_socket(mut socket: WebSocket, state: Arc<MockState>) {
    state.ws_connects.fetch_add(1, Ordering::SeqCst);
    let open = state.open_ws.fetch_add(1, Ordering::SeqCst) + 1;
    state.max_open_ws.fetch_max(open, Ordering::SeqCst);

    for frame in &state.options.frames {
        if socket.send(Message::Text(frame.clone())).await.is_err() {
            break;
        }
    }

    loop {
        tokio::select! {
            _ = state.close_streams.notified() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    state.open_ws.fetch_sub(1, Ordering::SeqCst);
}

async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("无法绑定到随机端口");
    listener.local_addr().expect("无法获取本地监听地址")
}

/// 返回一个当前无人监听的本地 URL。
pub async fn refused_url() -> String {
    format!("http://{}/signalk", unused_addr().await)
}

/// 返回一个当前无人监听的 WebSocket 地址。
pub async fn refused_ws_url() -> String {
    format!("ws://{}/signalk/v1/stream", unused_addr().await)
}

/// 启动一个只接受 TCP 连接、从不完成 WebSocket 握手的服务，返回其 WebSocket 地址。
pub async fn spawn_stalling_ws_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("无法绑定到随机端口");
    let addr = listener.local_addr().expect("无法获取本地监听地址");
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });
    format!("ws://{}/stream", addr)
}

/// 启动一个完成握手后立即发送非法帧的 WebSocket 服务，返回其地址。
pub async fn spawn_bad_frame_ws_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("无法绑定到随机端口");
    let addr = listener.local_addr().expect("无法获取本地监听地址");
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept 失败");
        let mut ws = tokio_tungstenite::accept_async(stream).await.expect("服务端握手失败");
        tokio::time::sleep(Duration::from_millis(200)).await;
        // FIN + 保留的控制帧操作码 0xF
        ws.get_mut().write_all(&[0x8F, 0x00]).await.expect("写入非法帧失败");
        tokio::time::sleep(Duration::from_secs(5)).await;
    });
    format!("ws://{}/stream", addr)
}

/// 从订阅中持续读取，直到读到 `expected`；返回途中读到的所有值 (含 `expected`)。
pub async fn wait_for<T: Clone + PartialEq + Debug>(sub: &mut StatusSubscription<T>, expected: &T) -> Vec<T> {
    let mut seen = Vec::new();
    let result = tokio::time::timeout(WAIT_LIMIT, async {
        while let Some(value) = sub.recv().await {
            let done = value == *expected;
            seen.push(value);
            if done {
                return true;
            }
        }
        false
    })
    .await;
    assert_eq!(result, Ok(true), "等待 {:?} 失败，已收到: {:?}", expected, seen);
    seen
}

/// 轮询直到条件成立。
pub async fn eventually<F: Fn() -> bool>(what: &str, condition: F) {
    let deadline = tokio::time::Instant::now() + WAIT_LIMIT;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "等待条件超时: {}", what);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
