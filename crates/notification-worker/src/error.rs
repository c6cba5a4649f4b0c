//! 通知服务错误类型
//!
//! 定义消息解析、收件人解析和渠道投递等场景的错误分类，
//! 便于消费循环按类别记录日志后丢弃消息而不中断消费。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("通知反序列化失败: {0}")]
    DeserializationFailed(String),

    #[error("消息缺少 event_type 判别字段")]
    MissingEventType,

    #[error("未知的事件类型: {event_type}")]
    UnknownEventType { event_type: String },

    #[error("收件人信息获取失败: 用户={user_id}, 原因={reason}")]
    ProfileLookupFailed { user_id: i64, reason: String },

    #[error("课程成员列表获取失败: 课程={course_id}, 原因={reason}")]
    RosterLookupFailed { course_id: String, reason: String },

    #[error("课程成员列表为空: 课程={course_id}")]
    EmptyCourseRoster { course_id: String },

    #[error("通知发送失败: 渠道={channel}, 原因={reason}")]
    SendFailed { channel: String, reason: String },

    #[error(transparent)]
    Shared(#[from] campus_shared::error::CampusError),
}

pub type Result<T> = std::result::Result<T, NotificationError>;
