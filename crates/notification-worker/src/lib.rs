//! 通知工作者服务
//!
//! 从 Kafka 消费课程平台的通知事件，按事件类型分发处理：
//! 解析收件人、读取订阅偏好、格式化西语文案，
//! 经邮件与推送两个渠道投递，确认送达后写入投递日志。
//! 单个渠道或单个成员的失败不影响其余投递。

pub mod consumer;
pub mod error;
pub mod formatter;
pub mod models;
pub mod processor;
pub mod repository;
pub mod resolver;
pub mod sinks;
