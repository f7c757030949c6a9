// signalk_client/src/signalk/service.rs

//! SignalK 连接管理器。
//!
//! `SignalKService` 维护当前服务器 URL，对每个 URL 执行两阶段引导：
//! 先用 HTTP 请求发现版本化的 API 端点，再连接其中的 `signalk-ws` 数据流。
//! 连接健康状况通过三个 "最新值回放" 状态流发布：HTTP 发现状态、WebSocket 状态、连接阶段。
//!
//! # 代次 (generation)
//! 每次调用 `set_server_url` 都会使代次加一。后台任务在发布任何结果前都会在状态锁内
//! 比较自己的代次与当前代次，过期的结果直接丢弃，因此迟到的旧响应不会覆盖新状态。
//!
//! # 单一套接字
//! 每个代次只有一个后台任务，WebSocket 由该任务独占。切换 URL 时旧任务先收到取消信号并
//! 关闭套接字；新任务在发起任何网络请求前先等待旧任务结束，所以任何时刻最多只有一个打开的套接字。

use crate::config::AppConfig;
use crate::error::SignalKError;
use crate::signalk::discovery;
use crate::signalk::handler::MessageHandler;
use crate::signalk::subject::{StatusSubject, StatusSubscription};
use log::{debug, error, info, warn};
use signalk_models::{ConnectionPhase, ConnectionStatus, DiscoveredEndpoints, RawFrame};
use signalk_transport::{connect_client_with_timeout, receive_frame, ClientConnection};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// 主动关闭时等待服务器回应 Close 帧的最长时间。
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);
/// 新代次等待旧任务自行退出的最长时间，超时后强制中止旧任务。
const PREVIOUS_TASK_GRACE: Duration = Duration::from_secs(3);

/// 两个网络挂起点的限时。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionTimeouts {
    /// HTTP 服务发现请求。
    pub discovery: Duration,
    /// WebSocket 握手。
    pub ws_connect: Duration,
}

impl Default for ConnectionTimeouts {
    fn default() -> Self {
        Self { discovery: Duration::from_secs(10), ws_connect: Duration::from_secs(10) }
    }
}

impl ConnectionTimeouts {
    pub fn from_config(config: &AppConfig) -> Self {
        Self { discovery: config.discovery_timeout(), ws_connect: config.ws_connect_timeout() }
    }
}

/// 正在运行的代次任务。
struct ActiveGeneration {
    generation: u64,
    handle: JoinHandle<()>,
    cancel: Option<oneshot::Sender<()>>,
}

impl ActiveGeneration {
    fn cancel(&mut self) {
        if let Some(tx) = self.cancel.take() {
            // 任务已经结束时接收端不存在，忽略即可
            let _ = tx.send(());
        }
    }
}

/// 受状态锁保护的可变状态。
struct ManagerState {
    generation: u64,
    server_url: Option<String>,
    endpoints: DiscoveredEndpoints,
    active: Option<ActiveGeneration>,
    /// 当前代次的 WebSocket 是否已打开。
    socket_open: bool,
}

/// 打开套接字计数的 RAII 守卫。
struct SocketGuard {
    counter: Arc<AtomicUsize>,
}

impl SocketGuard {
    fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter: Arc::clone(counter) }
    }
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 连接管理器独占的 WebSocket。字段按声明顺序释放：先关闭连接，再减少计数。
struct ActiveSocket {
    conn: ClientConnection,
    _guard: SocketGuard,
}

impl ActiveSocket {
    /// 发送 Close 帧，并在限定时间内等待服务器完成关闭握手。
    async fn close_gracefully(&mut self) {
        if let Err(e) = self.conn.close().await {
            debug!("[SignalK服务] 关闭 {} 时发生错误 (忽略): {}", self.conn.url, e);
            return;
        }
        let receiver = &mut self.conn.ws_receiver;
        let drain = async move { while let Some(Ok(_)) = receive_frame(receiver).await {} };
        if tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, drain).await.is_err() {
            debug!("[SignalK服务] 等待 {} 的关闭握手超时，直接释放连接。", self.conn.url);
        }
    }
}

struct ServiceInner {
    http_client: reqwest::Client,
    timeouts: ConnectionTimeouts,
    handler: Arc<dyn MessageHandler>,
    http_status: StatusSubject<ConnectionStatus>,
    ws_status: StatusSubject<ConnectionStatus>,
    phase: StatusSubject<ConnectionPhase>,
    state: Mutex<ManagerState>,
    open_sockets: Arc<AtomicUsize>,
}

/// SignalK 连接管理器。克隆得到的句柄共享同一个管理器。
#[derive(Clone)]
pub struct SignalKService {
    inner: Arc<ServiceInner>,
}

impl SignalKService {
    /// 创建管理器。此时处于 `Idle` 阶段，直到第一次收到服务器 URL。
    pub fn new(timeouts: ConnectionTimeouts, handler: Arc<dyn MessageHandler>) -> Result<Self, SignalKError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("signalk_client/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(timeouts.discovery)
            .build()?;
        info!("[SignalK服务] 正在初始化，限时配置: {:?}", timeouts);
        Ok(Self {
            inner: Arc::new(ServiceInner {
                http_client,
                timeouts,
                handler,
                http_status: StatusSubject::new("http", ConnectionStatus::default()),
                ws_status: StatusSubject::new("ws", ConnectionStatus::default()),
                phase: StatusSubject::new("phase", ConnectionPhase::Idle),
                state: Mutex::new(ManagerState {
                    generation: 0,
                    server_url: None,
                    endpoints: DiscoveredEndpoints::default(),
                    active: None,
                    socket_open: false,
                }),
                open_sockets: Arc::new(AtomicUsize::new(0)),
            }),
        })
    }

    /// 以应用配置中的限时创建管理器。
    pub fn from_config(config: &AppConfig, handler: Arc<dyn MessageHandler>) -> Result<Self, SignalKError> {
        Self::new(ConnectionTimeouts::from_config(config), handler)
    }

    /// 采用新的服务器 URL 并重新引导连接。
    ///
    /// 同步完成以下动作：代次加一；发布 HTTP 状态 `(false, "Connecting...")`；
    /// 向旧代次任务发出取消信号 (若旧套接字已打开，WebSocket 状态随即变为 `Disconnected`)；
    /// 启动新代次的发现与连接任务。所有失败都只通过状态流体现，本方法不会返回错误。
    pub fn set_server_url(&self, url: impl Into<String>) {
        let url = url.into();
        info!("[SignalK服务] 重置 SignalK 服务器地址: {}", url);

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("[SignalK服务] 当前线程没有 Tokio 运行时，无法连接 {}: {}", url, e);
                self.inner.http_status.publish(ConnectionStatus::unknown_error());
                self.inner.phase.publish(ConnectionPhase::Failed);
                return;
            }
        };

        let mut state = self.inner.lock_state();
        state.generation += 1;
        let generation = state.generation;
        state.server_url = Some(url.clone());
        state.endpoints = DiscoveredEndpoints::default();
        if self.inner.phase.current().is_in_progress() {
            debug!("[SignalK服务] 打断代次 {} 尚未完成的连接过程。", generation - 1);
        }
        let previous = self.inner.teardown_locked(&mut state);

        self.inner.http_status.publish(ConnectionStatus::connecting());
        self.inner.phase.publish(ConnectionPhase::Discovering);

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let inner = Arc::clone(&self.inner);
        let handle = runtime.spawn(inner.run_generation(generation, url, previous, cancel_rx));
        state.active = Some(ActiveGeneration { generation, handle, cancel: Some(cancel_tx) });
        debug!("[SignalK服务] 代次 {} 的连接任务已启动。", generation);
    }

    /// 订阅设置服务推送的服务器 URL：立即处理当前值，之后每次变更都调用 `set_server_url`。
    ///
    /// 当前线程没有 Tokio 运行时时不启动监听，按 `set_server_url` 的方式报告失败并返回 `None`。
    pub fn subscribe_to_settings(&self, mut url_rx: watch::Receiver<String>) -> Option<JoinHandle<()>> {
        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("[SignalK服务] 当前线程没有 Tokio 运行时，无法监听服务器地址变更: {}", e);
                self.inner.http_status.publish(ConnectionStatus::unknown_error());
                self.inner.phase.publish(ConnectionPhase::Failed);
                return None;
            }
        };
        let service = self.clone();
        let listener = runtime.spawn(async move {
            let initial = url_rx.borrow_and_update().clone();
            service.set_server_url(initial);
            while url_rx.changed().await.is_ok() {
                let url = url_rx.borrow_and_update().clone();
                service.set_server_url(url);
            }
            info!("[SignalK服务] 设置服务已关闭，停止监听服务器地址变更。");
        });
        Some(listener)
    }

    /// 停止当前代次：关闭套接字并回到 `Idle`。之后仍可再次调用 `set_server_url`。
    pub fn shutdown(&self) {
        // 旧任务会自行完成关闭握手，这里不等待
        drop(self.inner.begin_shutdown());
    }

    /// 与 [`shutdown`](Self::shutdown) 相同，但等待后台任务退出。
    pub async fn shutdown_and_wait(&self) {
        if let Some(previous) = self.inner.begin_shutdown() {
            ServiceInner::wait_for_previous(previous).await;
        }
    }

    /// 订阅 HTTP 发现状态。
    pub fn http_status(&self) -> StatusSubscription<ConnectionStatus> {
        self.inner.http_status.subscribe()
    }

    /// 订阅 WebSocket 状态。
    pub fn ws_status(&self) -> StatusSubscription<ConnectionStatus> {
        self.inner.ws_status.subscribe()
    }

    /// 订阅连接阶段。
    pub fn phase(&self) -> StatusSubscription<ConnectionPhase> {
        self.inner.phase.subscribe()
    }

    pub fn current_http_status(&self) -> ConnectionStatus {
        self.inner.http_status.current()
    }

    pub fn current_ws_status(&self) -> ConnectionStatus {
        self.inner.ws_status.current()
    }

    pub fn current_phase(&self) -> ConnectionPhase {
        self.inner.phase.current()
    }

    /// 最近一次设置的服务器 URL。
    pub fn server_url(&self) -> Option<String> {
        self.inner.lock_state().server_url.clone()
    }

    /// 当前代次；尚未设置过 URL 时为 0。
    pub fn generation(&self) -> u64 {
        self.inner.lock_state().generation
    }

    /// 当前代次发现到的端点；发现尚未成功时全部为 `None`。
    pub fn endpoints(&self) -> DiscoveredEndpoints {
        self.inner.lock_state().endpoints.clone()
    }

    /// 当前打开的 WebSocket 数量 (0 或 1)。
    pub fn open_socket_count(&self) -> usize {
        self.inner.open_sockets.load(Ordering::SeqCst)
    }
}

impl ServiceInner {
    fn lock_state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 取消当前代次任务并返回其句柄。调用方必须持有状态锁。
    fn teardown_locked(&self, state: &mut ManagerState) -> Option<JoinHandle<()>> {
        if state.socket_open {
            state.socket_open = false;
            self.ws_status.publish(ConnectionStatus::ws_disconnected());
        }
        state.active.take().map(|mut active| {
            debug!("[SignalK服务] 正在取消代次 {} 的连接任务。", active.generation);
            active.cancel();
            active.handle
        })
    }

    fn begin_shutdown(&self) -> Option<JoinHandle<()>> {
        let mut state = self.lock_state();
        info!("[SignalK服务] 正在关闭连接 (代次 {})。", state.generation);
        state.generation += 1;
        let previous = self.teardown_locked(&mut state);
        self.phase.publish(ConnectionPhase::Idle);
        previous
    }

    /// 仅当 `generation` 仍是当前代次时，在状态锁内执行 `publish`。
    fn publish_if_current<F>(&self, generation: u64, publish: F) -> bool
    where
        F: FnOnce(&ServiceInner, &mut ManagerState),
    {
        let mut state = self.lock_state();
        if state.generation != generation {
            debug!(
                "[SignalK服务] 丢弃过期代次 {} 的结果 (当前代次 {})。",
                generation, state.generation
            );
            return false;
        }
        publish(self, &mut state);
        true
    }

    async fn wait_for_previous(mut previous: JoinHandle<()>) {
        if tokio::time::timeout(PREVIOUS_TASK_GRACE, &mut previous).await.is_err() {
            warn!("[SignalK服务] 旧连接任务未能在 {:?} 内退出，强制中止。", PREVIOUS_TASK_GRACE);
            previous.abort();
            let _ = previous.await;
        }
    }

    /// 一个代次的完整生命周期：等待旧任务退出，服务发现，连接 WebSocket，读循环。
    async fn run_generation(
        self: Arc<Self>,
        generation: u64,
        url: String,
        previous: Option<JoinHandle<()>>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        if let Some(previous) = previous {
            Self::wait_for_previous(previous).await;
        }

        let endpoints = tokio::select! {
            biased;
            _ = &mut cancel_rx => {
                debug!("[SignalK服务] 代次 {} 在服务发现期间被取消。", generation);
                return;
            }
            endpoints = self.perform_discovery(generation, &url) => endpoints,
        };
        let Some(endpoints) = endpoints else {
            return;
        };

        let Some(ws_url) = endpoints.ws else {
            error!("[SignalK服务] {} ({})", SignalKError::MissingEndpoint("signalk-ws"), url);
            self.publish_if_current(generation, |inner, _| {
                inner.ws_status.publish(ConnectionStatus::ws_error());
                inner.phase.publish(ConnectionPhase::Failed);
            });
            return;
        };

        self.connect_web_socket(generation, &ws_url, cancel_rx).await;
    }

    /// 服务发现。成功时发布 HTTP OK 状态并返回端点；失败时发布失败状态并返回 `None`。
    async fn perform_discovery(&self, generation: u64, url: &str) -> Option<DiscoveredEndpoints> {
        let limit = self.timeouts.discovery;
        let result = match tokio::time::timeout(limit, discovery::fetch_endpoints(&self.http_client, url)).await {
            Ok(result) => result,
            Err(_) => Err(SignalKError::Timeout(limit)),
        };

        match result {
            Ok(outcome) => {
                let endpoints = outcome.endpoints();
                let message = outcome.status_message();
                let stored = endpoints.clone();
                let log_message = message.clone();
                let current = self.publish_if_current(generation, move |inner, state| {
                    state.endpoints = stored;
                    inner.http_status.publish(ConnectionStatus::ok(message));
                    inner.phase.publish(ConnectionPhase::ConnectingWs);
                });
                if !current {
                    return None;
                }
                info!("[SignalK服务] 服务发现成功: {}", log_message);
                info!(
                    "[SignalK服务] HTTP 端点: {}",
                    endpoints.http.as_deref().unwrap_or("(未公布)")
                );
                Some(endpoints)
            }
            Err(e) => {
                error!("[SignalK服务] 服务发现失败 ({}): {}", url, e);
                let status = match e {
                    SignalKError::Timeout(_) => ConnectionStatus::timeout(),
                    _ => ConnectionStatus::unknown_error(),
                };
                self.publish_if_current(generation, |inner, _| {
                    inner.http_status.publish(status);
                    inner.phase.publish(ConnectionPhase::Failed);
                });
                None
            }
        }
    }

    /// 连接 WebSocket 并运行读循环，直到连接关闭、出错或被取消。
    async fn connect_web_socket(&self, generation: u64, ws_url: &str, mut cancel_rx: oneshot::Receiver<()>) {
        info!("[SignalK服务] 代次 {} 正在连接 WebSocket: {}", generation, ws_url);

        let connected = tokio::select! {
            biased;
            _ = &mut cancel_rx => {
                debug!("[SignalK服务] 代次 {} 在 WebSocket 握手期间被取消。", generation);
                return;
            }
            result = connect_client_with_timeout(ws_url, self.timeouts.ws_connect) => result,
        };

        let conn = match connected {
            Ok(conn) => conn,
            Err(e) => {
                let status = if e.is_timeout() { ConnectionStatus::timeout() } else { ConnectionStatus::ws_error() };
                error!("[SignalK服务] {}", SignalKError::from(e));
                self.publish_if_current(generation, |inner, _| {
                    inner.ws_status.publish(status);
                    inner.phase.publish(ConnectionPhase::Failed);
                });
                return;
            }
        };

        let mut socket = ActiveSocket { conn, _guard: SocketGuard::acquire(&self.open_sockets) };
        let opened = self.publish_if_current(generation, |inner, state| {
            state.socket_open = true;
            inner.ws_status.publish(ConnectionStatus::ws_connected());
            inner.phase.publish(ConnectionPhase::Connected);
        });
        if !opened {
            socket.close_gracefully().await;
            return;
        }

        loop {
            tokio::select! {
                biased;
                _ = &mut cancel_rx => {
                    info!("[SignalK服务] 代次 {} 的 WebSocket 已被替换，正在关闭。", generation);
                    socket.close_gracefully().await;
                    break;
                }
                next = receive_frame(&mut socket.conn.ws_receiver) => match next {
                    Some(Ok(data)) => self.handler.on_message(RawFrame::new(generation, data)),
                    Some(Err(e)) => {
                        error!("[SignalK服务] 代次 {} 的 WebSocket 出错: {}", generation, e);
                        // 出错后套接字不再可用：先报告错误，再报告关闭
                        self.publish_if_current(generation, |inner, state| {
                            state.socket_open = false;
                            inner.ws_status.publish(ConnectionStatus::ws_error());
                            inner.ws_status.publish(ConnectionStatus::ws_disconnected());
                            inner.phase.publish(ConnectionPhase::Failed);
                        });
                        break;
                    }
                    None => {
                        info!("[SignalK服务] 代次 {} 的 WebSocket 已关闭。", generation);
                        self.publish_if_current(generation, |inner, state| {
                            state.socket_open = false;
                            inner.ws_status.publish(ConnectionStatus::ws_disconnected());
                            inner.phase.publish(ConnectionPhase::Disconnected);
                        });
                        break;
                    }
                },
            }
        }
    }
}
