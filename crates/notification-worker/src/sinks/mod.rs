//! 投递渠道
//!
//! 邮件与推送两个渠道通过独立 trait 抽象。两者的失败语义不同：
//! 邮件发送失败是错误（`Err`），推送发送失败是普通返回值（`false`）。

pub mod email;
pub mod push;

pub use email::{EmailSink, SmtpEmailSink};
pub use push::{FcmPushSink, PushSink};
