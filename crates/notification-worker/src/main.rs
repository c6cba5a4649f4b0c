//! 通知工作者服务入口
//!
//! 加载配置、初始化日志与数据库连接，装配收件人解析器、
//! 投递渠道与仓储后启动 Kafka 消费循环，监听信号优雅关闭。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use campus_shared::config::AppConfig;
use campus_shared::database::Database;
use notification_worker::consumer::NotificationConsumer;
use notification_worker::processor::NotificationProcessor;
use notification_worker::repository::{PgDeliveryLogRepository, PgPreferenceRepository};
use notification_worker::resolver::HttpRecipientResolver;
use notification_worker::sinks::{FcmPushSink, SmtpEmailSink};
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. 加载配置
    let config = AppConfig::load("notification-worker").unwrap_or_else(|e| {
        eprintln!("配置加载失败，使用默认配置: {e}");
        AppConfig::default()
    });

    // 2. 初始化日志
    init_tracing(&config);
    info!("Starting notification-worker...");
    info!(environment = %config.environment, "Configuration loaded");

    // 3. 初始化数据库连接
    let db = Database::connect(&config.database).await?;
    let pool = db.pool().clone();
    info!("Database connection established");

    // 4. 装配仓储、解析器与投递渠道
    let preferences = Arc::new(PgPreferenceRepository::new(pool.clone()));
    let delivery_log = Arc::new(PgDeliveryLogRepository::new(pool.clone()));
    let resolver = Arc::new(HttpRecipientResolver::new(&config.services)?);
    let email = Arc::new(SmtpEmailSink::new(&config.smtp)?);
    let push = Arc::new(FcmPushSink::new(&config.push)?);

    let processor = Arc::new(NotificationProcessor::new(
        resolver,
        preferences,
        delivery_log,
        email,
        push,
        Duration::from_secs(config.delivery.send_timeout_seconds),
    ));
    info!("Notification processor initialized");

    // 5. 连接 broker（固定间隔有界重试，耗尽后作为致命错误退出）
    let consumer = NotificationConsumer::connect(&config, processor).await?;
    info!("Kafka broker reachable");

    // 6. 信号触发优雅关闭
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    // 7. 启动消费循环
    consumer.run(shutdown_rx).await?;

    db.close().await;
    info!("Service shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.observability.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    if config.observability.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// 优雅关闭信号处理
///
/// 监听 Ctrl+C 和 SIGTERM 信号，用于 Kubernetes 优雅关闭
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}
