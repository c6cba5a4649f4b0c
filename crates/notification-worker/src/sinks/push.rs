//! 推送渠道
//!
//! 通过 FCM HTTP 接口发送移动端推送。推送失败是常态（令牌过期、
//! 设备离线），因此以 `bool` 返回发送结果而不是错误，由投递层决定是否落日志。

use async_trait::async_trait;
use campus_shared::config::PushConfig;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{NotificationError, Result};

/// 推送发送接口
///
/// 返回 `true` 表示 FCM 接受了该消息；任何失败（HTTP 错误、非 2xx、超时）
/// 都是普通的 `false`，绝不上抛错误。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushSink: Send + Sync {
    async fn send(&self, token: &str, title: &str, body: &str) -> bool;
}

#[derive(Serialize)]
struct FcmMessage<'a> {
    to: &'a str,
    notification: FcmNotification<'a>,
}

#[derive(Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

/// FCM 推送发送器
pub struct FcmPushSink {
    client: reqwest::Client,
    fcm_url: String,
    server_key: String,
}

impl FcmPushSink {
    pub fn new(config: &PushConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| NotificationError::Shared(
                campus_shared::error::CampusError::Internal(format!("HTTP 客户端构建失败: {e}")),
            ))?;

        Ok(Self {
            client,
            fcm_url: config.fcm_url.clone(),
            server_key: config.server_key.clone(),
        })
    }
}

#[async_trait]
impl PushSink for FcmPushSink {
    async fn send(&self, token: &str, title: &str, body: &str) -> bool {
        let message = FcmMessage {
            to: token,
            notification: FcmNotification { title, body },
        };

        let response = self
            .client
            .post(&self.fcm_url)
            .header("Authorization", format!("key={}", self.server_key))
            .json(&message)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                info!(title, "推送通知已发送");
                true
            }
            Ok(resp) => {
                warn!(status = %resp.status(), title, "FCM 拒绝了推送请求");
                false
            }
            Err(e) => {
                warn!(error = %e, title, "推送请求失败");
                false
            }
        }
    }
}
