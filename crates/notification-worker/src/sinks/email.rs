//! 邮件渠道
//!
//! 通过 lettre 异步 SMTP（STARTTLS，凭据可选）发送纯文本邮件。
//! 发送失败以 `Err` 上抛，由投递层记录并跳过该渠道。

use async_trait::async_trait;
use campus_shared::config::SmtpConfig;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::error::{NotificationError, Result};

/// 邮件发送接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSink: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}

/// SMTP 邮件发送器
pub struct SmtpEmailSink {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpEmailSink {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| NotificationError::SendFailed {
                channel: "email".to_string(),
                reason: format!("SMTP 传输构建失败: {e}"),
            })?
            .port(config.port);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl EmailSink for SmtpEmailSink {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let send_failed = |reason: String| NotificationError::SendFailed {
            channel: "email".to_string(),
            reason,
        };

        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e| send_failed(format!("发件地址无效: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| send_failed(format!("收件地址无效: {e}")))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| send_failed(format!("邮件构建失败: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| send_failed(e.to_string()))?;

        info!(to, subject, "邮件通知已发送");
        Ok(())
    }
}
