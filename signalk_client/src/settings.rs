// signalk_client/src/settings.rs

//! 应用设置服务。
//!
//! `AppSettingsService` 持有当前配置，并通过 `watch` 通道推送服务器 URL：
//! 任意时刻只有一个有效值，新订阅者立即看到它。连接管理器订阅这个通道，
//! 在初始值和之后每次变更时重新连接。

use crate::config::{save_app_config, AppConfig};
use crate::error::SignalKError;
use log::{error, info};
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

pub struct AppSettingsService {
    config: RwLock<AppConfig>,
    /// 设置后，每次修改都会写回该文件。
    config_path: Option<PathBuf>,
    signalk_url_tx: watch::Sender<String>,
}

impl AppSettingsService {
    /// 以已加载的配置创建服务。`config_path` 为 `None` 时修改只保存在内存中。
    pub fn new(config: AppConfig, config_path: Option<PathBuf>) -> Self {
        let (signalk_url_tx, _) = watch::channel(config.signalk_url.clone());
        Self { config: RwLock::new(config), config_path, signalk_url_tx }
    }

    fn read(&self) -> RwLockReadGuard<'_, AppConfig> {
        self.config.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AppConfig> {
        self.config.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 当前配置的副本。
    pub fn config(&self) -> AppConfig {
        self.read().clone()
    }

    /// 当前服务器 URL。
    pub fn signalk_url(&self) -> String {
        self.signalk_url_tx.borrow().clone()
    }

    /// 订阅服务器 URL。接收端立即持有当前值。
    pub fn signalk_url_receiver(&self) -> watch::Receiver<String> {
        self.signalk_url_tx.subscribe()
    }

    /// 修改服务器 URL。
    ///
    /// 值未变化时什么也不做。否则先更新内存并通知订阅者，再写回配置文件；
    /// 写文件失败时返回错误，但新 URL 仍然生效。
    pub fn set_signalk_url(&self, url: impl Into<String>) -> Result<(), SignalKError> {
        let url = url.into();
        if *self.signalk_url_tx.borrow() == url {
            return Ok(());
        }

        let snapshot = {
            let mut config = self.write();
            config.signalk_url = url.clone();
            config.clone()
        };
        info!("[设置服务] SignalK 服务器地址已变更为: {}", url);
        self.signalk_url_tx.send_replace(url);

        match &self.config_path {
            Some(path) => save_app_config(path, &snapshot).map_err(|e| {
                error!("[设置服务] 保存新的服务器地址失败: {}", e);
                e
            }),
            None => Ok(()),
        }
    }
}
