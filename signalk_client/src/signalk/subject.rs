// signalk_client/src/signalk/subject.rs

//! 单槽 "最新值回放" 广播原语。
//!
//! `StatusSubject` 保存一个当前值和一组活动观察者。新订阅者在订阅时立即收到当前值，
//! 之后按发布顺序收到每一次更新。已被丢弃的订阅会在下一次发布时被清理掉。

use log::trace;
use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

struct SubjectInner<T> {
    current: T,
    observers: Vec<mpsc::UnboundedSender<T>>,
}

/// 保存最新值并向所有观察者推送更新的状态主题。
pub struct StatusSubject<T> {
    name: &'static str,
    inner: Mutex<SubjectInner<T>>,
}

impl<T: Clone + Debug + Send + 'static> StatusSubject<T> {
    /// 以初始值创建主题。`name` 只用于日志。
    pub fn new(name: &'static str, initial: T) -> Self {
        Self {
            name,
            inner: Mutex::new(SubjectInner { current: initial, observers: Vec::new() }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SubjectInner<T>> {
        // 锁内只做内存操作，不会在持锁期间 panic；即便中毒也继续使用内部数据
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 发布新值：替换当前值并推送给所有仍然存活的观察者。
    pub fn publish(&self, value: T) {
        let mut inner = self.lock();
        trace!("[状态主题:{}] 发布新值: {:?}", self.name, value);
        inner.observers.retain(|tx| tx.send(value.clone()).is_ok());
        inner.current = value;
    }

    /// 当前值的副本。
    pub fn current(&self) -> T {
        self.lock().current.clone()
    }

    /// 订阅主题。返回的订阅首先产出当前值。
    pub fn subscribe(&self) -> StatusSubscription<T> {
        let mut inner = self.lock();
        let (tx, rx) = mpsc::unbounded_channel();
        // 接收端就在本函数内，发送不会失败
        let _ = tx.send(inner.current.clone());
        inner.observers.push(tx);
        StatusSubscription { rx }
    }

    #[cfg(test)]
    fn observer_count(&self) -> usize {
        let mut inner = self.lock();
        inner.observers.retain(|tx| !tx.is_closed());
        inner.observers.len()
    }
}

/// `StatusSubject` 的一个订阅。
pub struct StatusSubscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> StatusSubscription<T> {
    /// 等待下一个值。主题被销毁后返回 `None`。
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// 非阻塞地取出下一个已到达的值。
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// 取出所有已到达但尚未消费的值。
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::new();
        while let Ok(value) = self.rx.try_recv() {
            values.push(value);
        }
        values
    }
}
