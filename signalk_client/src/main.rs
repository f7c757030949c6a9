// signalk_client/src/main.rs

//! `signalk-monitor`：连接 SignalK 服务器并把状态变化逐行打印为 JSON。
//!
//! 启动顺序：加载配置 -> 初始化日志 -> 创建设置服务与连接管理器 -> 订阅服务器 URL。
//! 按 Ctrl-C 时关闭连接并退出。

use anyhow::Context;
use log::{debug, info};
use signalk_client::config::{config_file_path, init_app_config};
use signalk_client::event::{ConnectionStatusEvent, PhaseEvent};
use signalk_client::settings::AppSettingsService;
use signalk_client::signalk::{ChannelMessageHandler, SignalKService};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = config_file_path();
    let config = init_app_config(&config_path);

    // RUST_LOG 存在时以它为准，否则使用配置文件中的级别
    let mut logger = env_logger::Builder::new();
    logger.filter_level(config.log_level_filter()).format_timestamp_millis();
    if let Ok(filters) = std::env::var("RUST_LOG") {
        logger.parse_filters(&filters);
    }
    logger.try_init().context("初始化 env_logger 日志服务失败")?;

    info!("[signalk-monitor] 正在启动，配置文件: {}", config_path.display());

    let settings = AppSettingsService::new(config.clone(), Some(config_path));
    let (handler, mut frames) = ChannelMessageHandler::new();
    let service = SignalKService::from_config(&config, Arc::new(handler)).context("创建 SignalK 服务失败")?;

    let mut http_status = service.http_status();
    let mut ws_status = service.ws_status();
    let mut phase = service.phase();
    let settings_listener = service.subscribe_to_settings(settings.signalk_url_receiver());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("[signalk-monitor] 收到 Ctrl-C，正在关闭...");
                break;
            }
            Some(status) = http_status.recv() => {
                print_json(&ConnectionStatusEvent::http(&status))?;
            }
            Some(status) = ws_status.recv() => {
                print_json(&ConnectionStatusEvent::ws(&status))?;
            }
            Some(current) = phase.recv() => {
                print_json(&PhaseEvent::new(current))?;
            }
            Some(frame) = frames.recv() => {
                if frame.data.is_empty() {
                    debug!("[signalk-monitor] 收到空帧 (代次 {})", frame.generation);
                } else {
                    debug!(
                        "[signalk-monitor] 收到 {} 字节的帧 (代次 {})",
                        frame.data.len(),
                        frame.generation
                    );
                }
            }
        }
    }

    if let Some(listener) = settings_listener {
        listener.abort();
    }
    service.shutdown_and_wait().await;
    info!("[signalk-monitor] 已退出。");
    Ok(())
}

fn print_json<T: serde::Serialize>(event: &T) -> anyhow::Result<()> {
    let line = serde_json::to_string(event).context("序列化状态事件失败")?;
    println!("{}", line);
    Ok(())
}
