//! 通知消费者
//!
//! 从 Kafka 消费通知事件，按 `event_type` 判别字段分发到处理器。
//! 消息处理失败只记录日志，消费循环永不因单条坏消息停止。
//! auto-commit 下消息一经投递即视为已消费，失败不会重投。

use std::sync::Arc;
use std::time::Duration;

use campus_shared::config::AppConfig;
use campus_shared::error::CampusError;
use campus_shared::events::{NotificationEvent, is_known_event_type};
use campus_shared::kafka::{ConsumerMessage, KafkaConsumer, topics};
use campus_shared::retry::{RetryPolicy, retry_with_policy};
use tokio::sync::watch;
use tracing::{error, info};

use crate::error::{NotificationError, Result};
use crate::processor::NotificationProcessor;

/// broker 可达性校验的单次超时
const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(5);

/// 通知消费者
pub struct NotificationConsumer {
    consumer: KafkaConsumer,
    processor: Arc<NotificationProcessor>,
}

impl NotificationConsumer {
    /// 创建消费者并确认 broker 可达
    ///
    /// rdkafka 的连接是惰性的，启动阶段用固定间隔的有界重试
    /// 主动确认连通性；重试耗尽时错误上抛，由 main 作为致命错误退出。
    pub async fn connect(
        config: &AppConfig,
        processor: Arc<NotificationProcessor>,
    ) -> Result<Self> {
        let kafka_config = config.kafka.clone();
        let policy = RetryPolicy::fixed_interval(
            kafka_config.connect_attempts,
            Duration::from_secs(kafka_config.connect_delay_seconds),
        );

        let consumer = retry_with_policy(
            &policy,
            "kafka_connect",
            CampusError::is_retryable,
            || async {
                let consumer = KafkaConsumer::new(&kafka_config)?;
                consumer.check_connectivity(CONNECTIVITY_TIMEOUT)?;
                Ok(consumer)
            },
        )
        .await?;

        Ok(Self {
            consumer,
            processor,
        })
    }

    /// 启动消费循环，直到收到 shutdown 信号
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        self.consumer.subscribe(&[topics::NOTIFICATIONS])?;

        info!(topic = topics::NOTIFICATIONS, "通知消费者已启动");

        let processor = self.processor;

        self.consumer
            .start(shutdown, |msg| {
                let processor = processor.clone();
                async move {
                    if let Err(e) = handle_message(&processor, &msg).await {
                        error!(
                            error = %e,
                            topic = %msg.topic,
                            partition = msg.partition,
                            offset = msg.offset,
                            "处理通知事件失败"
                        );
                    }
                    Ok(())
                }
            })
            .await;

        info!("通知消费者已停止");
        Ok(())
    }
}

/// 处理单条 Kafka 通知消息
///
/// 拆分为独立函数而非方法，便于在测试中直接调用而无需构造完整的 Consumer。
/// 解析分三步，区分三类丢弃原因：JSON 整体不合法、判别字段缺失、
/// 判别值未知；通过这三关后字段级的解析失败仍归为反序列化失败。
pub async fn handle_message(
    processor: &NotificationProcessor,
    msg: &ConsumerMessage,
) -> Result<()> {
    let value: serde_json::Value = serde_json::from_slice(&msg.payload)
        .map_err(|e| NotificationError::DeserializationFailed(e.to_string()))?;

    let tag = value
        .get("event_type")
        .and_then(|t| t.as_str())
        .ok_or(NotificationError::MissingEventType)?;

    if !is_known_event_type(tag) {
        return Err(NotificationError::UnknownEventType {
            event_type: tag.to_string(),
        });
    }

    let event: NotificationEvent = serde_json::from_value(value)
        .map_err(|e| NotificationError::DeserializationFailed(e.to_string()))?;

    match event {
        NotificationEvent::User(user) => processor.process_user(&user).await,
        NotificationEvent::Course(course) => processor.process_course(&course).await,
        NotificationEvent::AuxTeacher(aux) => processor.process_aux_teacher(&aux).await,
    }
}
