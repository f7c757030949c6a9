// signalk_client/src/config.rs

//! SignalK 客户端配置管理模块。
//!
//! 本模块定义 `AppConfig` (应用配置)，并提供把它加载自/保存到 JSON 文件
//! (默认 `app_settings.json`) 的函数。配置文件不存在时会用默认值创建。

use crate::error::SignalKError;
use log::{error, info, warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::{
    env,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

/// 配置文件的默认文件名。
pub const CONFIG_FILE_NAME: &str = "app_settings.json";
/// 指定配置文件路径的环境变量。
pub const CONFIG_PATH_ENV: &str = "SIGNALK_CONFIG";
/// 启动时覆盖服务器 URL 的环境变量。
pub const SIGNALK_URL_ENV: &str = "SIGNALK_URL";

/// 应用配置结构体，对应配置文件中的内容。
///
/// 缺失的字段取默认值，因此旧版本的配置文件仍能加载。
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// SignalK 服务器的发现地址，例如 `"http://demo.signalk.org/signalk"`。
    pub signalk_url: String,

    /// 日志级别: `"trace"`, `"debug"`, `"info"`, `"warn"`, `"error"`, `"off"`。
    pub log_level: String,

    /// 服务发现请求的限时，单位毫秒。
    pub discovery_timeout_ms: u64,

    /// WebSocket 握手的限时，单位毫秒。
    pub ws_connect_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            signalk_url: "http://localhost:3000/signalk".to_string(), // 本机 SignalK 服务器的默认地址
            log_level: "info".to_string(),
            discovery_timeout_ms: 10_000,
            ws_connect_timeout_ms: 10_000,
        }
    }
}

impl AppConfig {
    /// 把 `log_level` 转为 `LevelFilter`；无法识别时退回 `Info`。
    pub fn log_level_filter(&self) -> LevelFilter {
        match self.log_level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "debug" => LevelFilter::Debug,
            "trace" => LevelFilter::Trace,
            other => {
                warn!("[配置模块] 无法识别的日志级别 '{}'，将使用 info。", other);
                LevelFilter::Info
            }
        }
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn ws_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.ws_connect_timeout_ms)
    }

    /// 应用环境变量覆盖 (目前只有 `SIGNALK_URL`)。
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var(SIGNALK_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                info!("[配置模块] 环境变量 {} 覆盖了服务器地址: {}", SIGNALK_URL_ENV, url);
                self.signalk_url = url.to_string();
            }
        }
    }
}

/// 确定配置文件路径：优先使用 `SIGNALK_CONFIG`，否则为当前目录下的 `app_settings.json`。
pub fn config_file_path() -> PathBuf {
    match env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => {
            let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            current_dir.join(CONFIG_FILE_NAME)
        }
    }
}

/// 加载配置文件。
///
/// 1. 文件存在：读取并反序列化。内容不是合法 JSON 时返回 `SignalKError::Config`。
/// 2. 文件不存在：生成默认配置，写入该路径，再返回默认配置。
pub fn load_app_config(config_file_path: &Path) -> Result<AppConfig, SignalKError> {
    if config_file_path.exists() {
        let config_content = fs::read_to_string(config_file_path).map_err(|e| {
            SignalKError::Config(format!("读取配置文件 '{}' 失败: {}", config_file_path.display(), e))
        })?;
        let app_config: AppConfig = serde_json::from_str(&config_content).map_err(|e| {
            SignalKError::Config(format!("解析配置文件 '{}' 的内容失败: {}", config_file_path.display(), e))
        })?;
        info!("[配置模块] 已从 {} 加载应用配置。", config_file_path.display());
        Ok(app_config)
    } else {
        info!(
            "[配置模块] 配置文件 '{}' 未找到，将使用默认配置参数创建新文件。",
            config_file_path.display()
        );
        let default_config = AppConfig::default();
        save_app_config(config_file_path, &default_config)?;
        Ok(default_config)
    }
}

/// 把配置以格式化 JSON 写入文件，必要时创建父目录。
pub fn save_app_config(config_file_path: &Path, app_config: &AppConfig) -> Result<(), SignalKError> {
    if let Some(parent_dir) = config_file_path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            fs::create_dir_all(parent_dir).map_err(|e| {
                SignalKError::Config(format!("创建配置目录 '{}' 失败: {}", parent_dir.display(), e))
            })?;
        }
    }

    let config_content = serde_json::to_string_pretty(app_config)
        .map_err(|e| SignalKError::Config(format!("序列化应用配置到 JSON 字符串失败: {}", e)))?;

    fs::write(config_file_path, config_content).map_err(|e| {
        SignalKError::Config(format!("写入配置文件 '{}' 失败: {}", config_file_path.display(), e))
    })?;

    info!("[配置模块] 应用配置已保存至: '{}'", config_file_path.display());
    Ok(())
}

/// 初始化应用配置。
///
/// 加载失败时记录错误并退回默认配置；最后应用环境变量覆盖。
pub fn init_app_config(config_file_path: &Path) -> AppConfig {
    info!("[配置模块] 开始初始化应用配置...");
    let mut config = match load_app_config(config_file_path) {
        Ok(config) => config,
        Err(e) => {
            error!("[配置模块] {}。将使用默认配置。", e);
            AppConfig::default()
        }
    };
    config.apply_env_overrides();
    config
}
