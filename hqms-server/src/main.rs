//! HQMS服务器主程序

use anyhow::{Context, Result};
use clap::Parser;
use hqms_admin::{init_logging, ConfigManager, HqmsConfig};
use hqms_queue::{MemoryTokenStore, QueueManager};
use hqms_web::{AppState, WebServer};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// HQMS服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "hqms-server")]
#[command(about = "HQMS (Hospital Queue Management System) 门诊排队叫号服务器")]
struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 监听地址，覆盖配置文件
    #[arg(long)]
    host: Option<String>,

    /// 服务器端口，覆盖配置文件
    #[arg(short, long)]
    port: Option<u16>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_manager = match &args.config {
        Some(path) => ConfigManager::new(path)?,
        None => ConfigManager::from_config(HqmsConfig::default())?,
    };
    let mut config = config_manager.get_config().await;
    apply_overrides(&mut config, &args);

    // 初始化日志
    init_logging(&config.logging)?;

    info!("启动HQMS服务器...");
    info!("  服务名称: {}", config.server.name);
    info!("  监听地址: {}:{}", config.server.host, config.server.port);
    info!("  默认就诊时长: {} 分钟", config.queue.default_consultation_minutes);

    if config.directory.doctors.is_empty() {
        warn!("No doctors configured, registrations will be rejected");
    }

    let directory = Arc::new(config.directory.build_directory());
    let manager = Arc::new(QueueManager::new(
        Arc::new(MemoryTokenStore::new()),
        directory.clone(),
        config.queue.clone(),
    ));

    let recovered = manager.recover().await?;
    info!("Recovered {} tokens from store", recovered);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid listen address")?;

    let state = AppState::new(manager, directory, config.server.name.clone());
    let server = WebServer::new(addr, state, config.server.cors_permissive);

    if let Err(e) = server.run().await {
        error!("服务器启动失败: {}", e);
        return Err(e);
    }

    Ok(())
}

/// 命令行参数优先于配置文件
fn apply_overrides(config: &mut HqmsConfig, args: &Args) {
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let args = Args::parse_from(["hqms-server", "--port", "9000", "--log-level", "debug"]);
        let mut config = HqmsConfig::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.logging.level, "debug");
    }
}
