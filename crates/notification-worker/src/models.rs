//! 存储模型
//!
//! 用户订阅偏好与投递日志的数据库模型，以及投递渠道与收件人信息的内存模型。

use campus_shared::events::EventCategory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// 投递渠道
// ---------------------------------------------------------------------------

/// 投递渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryChannel {
    Email,
    Push,
}

impl DeliveryChannel {
    /// 投递日志与结构化日志使用的渠道标签
    pub fn label(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Push => "push",
        }
    }
}

impl std::fmt::Display for DeliveryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// 用户订阅偏好
// ---------------------------------------------------------------------------

/// 用户订阅偏好
///
/// 四个布尔开关覆盖（类别 × 渠道）的组合，默认全部开启；
/// 首次引用时按默认值惰性建行。`push_token` 为空表示该用户无法接收推送。
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct UserPreferences {
    pub user_id: i64,
    pub assignment_email: bool,
    pub assignment_push: bool,
    pub exam_email: bool,
    pub exam_push: bool,
    pub push_token: Option<String>,
}

impl UserPreferences {
    /// 指定用户的默认偏好（全部订阅、无推送令牌）
    pub fn default_for(user_id: i64) -> Self {
        Self {
            user_id,
            assignment_email: true,
            assignment_push: true,
            exam_email: true,
            exam_push: true,
            push_token: None,
        }
    }

    /// 二维查表：该（事件类别，投递渠道）组合是否开启
    ///
    /// 显式枚举全部组合，不做字段名拼接。
    pub fn channel_enabled(&self, category: EventCategory, channel: DeliveryChannel) -> bool {
        match (category, channel) {
            (EventCategory::Assignment, DeliveryChannel::Email) => self.assignment_email,
            (EventCategory::Assignment, DeliveryChannel::Push) => self.assignment_push,
            (EventCategory::Exam, DeliveryChannel::Email) => self.exam_email,
            (EventCategory::Exam, DeliveryChannel::Push) => self.exam_push,
        }
    }

    /// 推送令牌存在且非空白
    pub fn has_push_token(&self) -> bool {
        self.push_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }
}

/// 偏好的部分更新
///
/// 所有字段可选，仅更新给定的字段；供外部偏好管理接口使用。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferenceUpdate {
    pub assignment_email: Option<bool>,
    pub assignment_push: Option<bool>,
    pub exam_email: Option<bool>,
    pub exam_push: Option<bool>,
    /// `Some(None)` 清空令牌，`None` 保持不变
    pub push_token: Option<Option<String>>,
}

// ---------------------------------------------------------------------------
// 投递日志
// ---------------------------------------------------------------------------

/// 投递日志条目
///
/// 仅追加：只有确认送达的通知才会落一条记录。
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeliveryLogEntry {
    pub id: i64,
    pub user_id: i64,
    /// 事件类别标签（"Tarea" / "Examen" / "Docente Auxiliar"）
    pub category: String,
    /// 事件动作标签（"Nuevo" / "Calificado" / "add" 等）
    pub event: String,
    /// 投递渠道标签（"email" / "push"）
    pub channel: String,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// 待写入的投递日志（不含数据库生成字段）
#[derive(Debug, Clone)]
pub struct NewDeliveryLog {
    pub user_id: i64,
    pub category: String,
    pub event: String,
    pub channel: String,
    pub subject: String,
    pub body: String,
}

// ---------------------------------------------------------------------------
// 收件人信息
// ---------------------------------------------------------------------------

/// 收件人信息，来自身份服务
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecipientProfile {
    pub email: String,
    #[serde(default)]
    pub display_name: String,
}
