//! 通知扇出处理器
//!
//! 按事件类型处理通知：解析收件人、读取偏好、格式化文案，
//! 经邮件与推送渠道投递并在确认送达后写投递日志。
//! 课程广播对成员逐个处理，单个成员失败只跳过该成员；
//! 辅助教师角色变更强制投递，不受订阅偏好约束。

use std::sync::Arc;
use std::time::Duration;

use campus_shared::events::{
    AuxTeacherNotification, CourseNotification, EventCategory, UserNotification,
};
use tracing::{info, warn};

use crate::error::{NotificationError, Result};
use crate::formatter;
use crate::models::{DeliveryChannel, NewDeliveryLog, RecipientProfile, UserPreferences};
use crate::repository::{DeliveryLogRepositoryTrait, PreferenceRepositoryTrait};
use crate::resolver::RecipientResolver;
use crate::sinks::{EmailSink, PushSink};

/// 辅助教师通知在投递日志中的类别标签
const AUX_TEACHER_CATEGORY: &str = "Docente Auxiliar";

/// 通知扇出处理器
pub struct NotificationProcessor {
    resolver: Arc<dyn RecipientResolver>,
    preferences: Arc<dyn PreferenceRepositoryTrait>,
    delivery_log: Arc<dyn DeliveryLogRepositoryTrait>,
    email: Arc<dyn EmailSink>,
    push: Arc<dyn PushSink>,
    /// 单次渠道调用的超时上限
    send_timeout: Duration,
}

impl NotificationProcessor {
    pub fn new(
        resolver: Arc<dyn RecipientResolver>,
        preferences: Arc<dyn PreferenceRepositoryTrait>,
        delivery_log: Arc<dyn DeliveryLogRepositoryTrait>,
        email: Arc<dyn EmailSink>,
        push: Arc<dyn PushSink>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            preferences,
            delivery_log,
            email,
            push,
            send_timeout,
        }
    }

    /// 处理单用户通知
    ///
    /// 收件人信息获取失败时上抛（事件无法投递给任何人）。
    pub async fn process_user(&self, notification: &UserNotification) -> Result<()> {
        let user_id = notification.id_user;
        info!(
            user_id,
            category = %notification.notification_type,
            event = %notification.event,
            "处理单用户通知"
        );

        let prefs = self.preferences.get_or_create(user_id).await?;
        let profile = self.resolver.get_profile(user_id).await?;

        let (subject, body) = formatter::format_event(
            notification.notification_type,
            notification.event,
            &notification.data,
        );

        self.send_notifications(
            user_id,
            &profile,
            &prefs,
            Some(notification.notification_type),
            notification.notification_type.label(),
            notification.event.label(),
            &subject,
            &body,
        )
        .await;

        Ok(())
    }

    /// 处理课程广播通知
    ///
    /// 成员列表获取失败或为空时上抛；单个成员的偏好或联系信息
    /// 获取失败只跳过该成员，不中断其余成员的投递。
    pub async fn process_course(&self, notification: &CourseNotification) -> Result<()> {
        let course_id = &notification.id_course;
        info!(
            course_id,
            category = %notification.notification_type,
            event = %notification.event,
            "处理课程广播通知"
        );

        let members = self.resolver.get_course_members(course_id).await?;
        if members.is_empty() {
            return Err(NotificationError::EmptyCourseRoster {
                course_id: course_id.clone(),
            });
        }

        let (subject, body) = formatter::format_event(
            notification.notification_type,
            notification.event,
            &notification.data,
        );

        for user_id in members {
            let prefs = match self.preferences.get_or_create(user_id).await {
                Ok(prefs) => prefs,
                Err(e) => {
                    warn!(user_id, course_id, error = %e, "成员偏好获取失败，跳过该成员");
                    continue;
                }
            };

            let profile = match self.resolver.get_profile(user_id).await {
                Ok(profile) => profile,
                Err(e) => {
                    warn!(user_id, course_id, error = %e, "成员联系信息获取失败，跳过该成员");
                    continue;
                }
            };

            self.send_notifications(
                user_id,
                &profile,
                &prefs,
                Some(notification.notification_type),
                notification.notification_type.label(),
                notification.event.label(),
                &subject,
                &body,
            )
            .await;
        }

        Ok(())
    }

    /// 处理辅助教师角色变更通知
    ///
    /// 角色变更强制投递：订阅偏好完全不参与渠道决策，
    /// 偏好行仅作为推送令牌的来源。
    pub async fn process_aux_teacher(&self, notification: &AuxTeacherNotification) -> Result<()> {
        let teacher_id = notification.teacher_id;
        info!(
            teacher_id,
            course_id = %notification.id_course,
            action = %notification.event,
            "处理辅助教师角色变更通知"
        );

        let prefs = self.preferences.get_or_create(teacher_id).await?;
        let profile = self.resolver.get_profile(teacher_id).await?;

        let (subject, body) = formatter::format_aux_teacher(notification);

        self.send_notifications(
            teacher_id,
            &profile,
            &prefs,
            None,
            AUX_TEACHER_CATEGORY,
            notification.event.label(),
            &subject,
            &body,
        )
        .await;

        Ok(())
    }

    /// 共享投递步骤
    ///
    /// `gating` 为 `Some` 时按偏好开关过滤渠道，`None` 表示强制投递。
    /// 推送额外要求存在非空令牌。每次渠道调用受 `send_timeout` 约束；
    /// 单渠道失败（错误、`false` 或超时）只记录告警，不影响另一渠道，
    /// 也不产生投递日志。日志写入失败同样只告警。
    #[allow(clippy::too_many_arguments)]
    async fn send_notifications(
        &self,
        user_id: i64,
        profile: &RecipientProfile,
        prefs: &UserPreferences,
        gating: Option<EventCategory>,
        category_label: &str,
        event_label: &str,
        subject: &str,
        body: &str,
    ) {
        let email_allowed =
            gating.is_none_or(|c| prefs.channel_enabled(c, DeliveryChannel::Email));
        let push_allowed = gating.is_none_or(|c| prefs.channel_enabled(c, DeliveryChannel::Push))
            && prefs.has_push_token();

        if email_allowed {
            match tokio::time::timeout(
                self.send_timeout,
                self.email.send(&profile.email, subject, body),
            )
            .await
            {
                Ok(Ok(())) => {
                    self.append_log(user_id, category_label, event_label, DeliveryChannel::Email, subject, body)
                        .await;
                }
                Ok(Err(e)) => {
                    warn!(user_id, error = %e, "邮件发送失败");
                }
                Err(_) => {
                    warn!(user_id, timeout = ?self.send_timeout, "邮件发送超时");
                }
            }
        }

        if push_allowed {
            // push_allowed 已验证令牌存在
            let token = prefs.push_token.as_deref().unwrap_or_default();
            match tokio::time::timeout(self.send_timeout, self.push.send(token, subject, body))
                .await
            {
                Ok(true) => {
                    self.append_log(user_id, category_label, event_label, DeliveryChannel::Push, subject, body)
                        .await;
                }
                Ok(false) => {
                    warn!(user_id, "推送发送未成功");
                }
                Err(_) => {
                    warn!(user_id, timeout = ?self.send_timeout, "推送发送超时");
                }
            }
        }
    }

    /// 确认送达后追加投递日志；写入失败只告警，绝不影响投递结果
    async fn append_log(
        &self,
        user_id: i64,
        category: &str,
        event: &str,
        channel: DeliveryChannel,
        subject: &str,
        body: &str,
    ) {
        let entry = NewDeliveryLog {
            user_id,
            category: category.to_string(),
            event: event.to_string(),
            channel: channel.label().to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        };

        if let Err(e) = self.delivery_log.append(entry).await {
            warn!(user_id, channel = %channel, error = %e, "投递日志写入失败");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_shared::events::{AuxTeacherAction, EventData, EventKind, PermissionSet};
    use mockall::predicate::eq;

    use crate::repository::traits::{MockDeliveryLogRepositoryTrait, MockPreferenceRepositoryTrait};
    use crate::resolver::MockRecipientResolver;
    use crate::sinks::email::MockEmailSink;
    use crate::sinks::push::MockPushSink;

    struct Mocks {
        resolver: MockRecipientResolver,
        preferences: MockPreferenceRepositoryTrait,
        delivery_log: MockDeliveryLogRepositoryTrait,
        email: MockEmailSink,
        push: MockPushSink,
    }

    impl Mocks {
        fn new() -> Self {
            Self {
                resolver: MockRecipientResolver::new(),
                preferences: MockPreferenceRepositoryTrait::new(),
                delivery_log: MockDeliveryLogRepositoryTrait::new(),
                email: MockEmailSink::new(),
                push: MockPushSink::new(),
            }
        }

        fn into_processor(self) -> NotificationProcessor {
            NotificationProcessor::new(
                Arc::new(self.resolver),
                Arc::new(self.preferences),
                Arc::new(self.delivery_log),
                Arc::new(self.email),
                Arc::new(self.push),
                Duration::from_secs(5),
            )
        }
    }

    fn prefs_with_token(user_id: i64) -> UserPreferences {
        UserPreferences {
            push_token: Some("fcm-token".to_string()),
            ..UserPreferences::default_for(user_id)
        }
    }

    fn profile(email: &str) -> RecipientProfile {
        RecipientProfile {
            email: email.to_string(),
            display_name: String::new(),
        }
    }

    fn user_notification(user_id: i64) -> UserNotification {
        UserNotification {
            id_user: user_id,
            notification_type: EventCategory::Assignment,
            event: EventKind::Graded,
            data: EventData {
                titulo: "TP 1".to_string(),
                descripcion: None,
                fecha: "2024-03-20".to_string(),
                instrucciones: None,
                nota: Some(8.0),
                feedback: None,
                hora: None,
            },
        }
    }

    #[tokio::test]
    async fn test_user_notification_both_channels() {
        let mut mocks = Mocks::new();

        mocks
            .preferences
            .expect_get_or_create()
            .with(eq(1))
            .times(1)
            .returning(|id| Ok(prefs_with_token(id)));
        mocks
            .resolver
            .expect_get_profile()
            .with(eq(1))
            .times(1)
            .returning(|_| Ok(profile("alumno@campus.edu")));
        mocks
            .email
            .expect_send()
            .withf(|to, subject, _| to == "alumno@campus.edu" && subject.starts_with("[Tarea]"))
            .times(1)
            .returning(|_, _, _| Ok(()));
        mocks
            .push
            .expect_send()
            .withf(|token, _, _| token == "fcm-token")
            .times(1)
            .returning(|_, _, _| true);
        // 两个渠道都确认送达，各落一条日志
        mocks
            .delivery_log
            .expect_append()
            .withf(|e| e.user_id == 1 && e.category == "Tarea" && e.event == "Calificado")
            .times(2)
            .returning(|_| Ok(()));

        let processor = mocks.into_processor();
        processor.process_user(&user_notification(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_email_disabled_only_push() {
        let mut mocks = Mocks::new();

        mocks.preferences.expect_get_or_create().returning(|id| {
            Ok(UserPreferences {
                assignment_email: false,
                ..prefs_with_token(id)
            })
        });
        mocks
            .resolver
            .expect_get_profile()
            .returning(|_| Ok(profile("alumno@campus.edu")));
        mocks.email.expect_send().times(0);
        mocks.push.expect_send().times(1).returning(|_, _, _| true);
        mocks
            .delivery_log
            .expect_append()
            .withf(|e| e.channel == "push")
            .times(1)
            .returning(|_| Ok(()));

        let processor = mocks.into_processor();
        processor.process_user(&user_notification(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_graded_email_only_content() {
        let mut mocks = Mocks::new();

        mocks.preferences.expect_get_or_create().returning(|id| {
            Ok(UserPreferences {
                assignment_push: false,
                ..prefs_with_token(id)
            })
        });
        mocks
            .resolver
            .expect_get_profile()
            .returning(|_| Ok(profile("alumno@campus.edu")));
        mocks
            .email
            .expect_send()
            .withf(|_, subject, body| {
                subject.contains("calificado") && body.contains("8") && body.contains("Muy bien")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        mocks.push.expect_send().times(0);
        mocks
            .delivery_log
            .expect_append()
            .withf(|e| e.channel == "email")
            .times(1)
            .returning(|_| Ok(()));

        let mut notification = user_notification(1);
        notification.data.feedback = Some("Muy bien".to_string());

        let processor = mocks.into_processor();
        processor.process_user(&notification).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_push_token_skips_push() {
        let mut mocks = Mocks::new();

        // 偏好全开但没有令牌
        mocks
            .preferences
            .expect_get_or_create()
            .returning(|id| Ok(UserPreferences::default_for(id)));
        mocks
            .resolver
            .expect_get_profile()
            .returning(|_| Ok(profile("alumno@campus.edu")));
        mocks.email.expect_send().times(1).returning(|_, _, _| Ok(()));
        mocks.push.expect_send().times(0);
        mocks
            .delivery_log
            .expect_append()
            .withf(|e| e.channel == "email")
            .times(1)
            .returning(|_| Ok(()));

        let processor = mocks.into_processor();
        processor.process_user(&user_notification(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_push_false_no_log_entry() {
        let mut mocks = Mocks::new();

        mocks
            .preferences
            .expect_get_or_create()
            .returning(|id| Ok(prefs_with_token(id)));
        mocks
            .resolver
            .expect_get_profile()
            .returning(|_| Ok(profile("alumno@campus.edu")));
        mocks.email.expect_send().times(1).returning(|_, _, _| Ok(()));
        // 推送失败返回 false，不算错误
        mocks.push.expect_send().times(1).returning(|_, _, _| false);
        // 只有邮件落日志
        mocks
            .delivery_log
            .expect_append()
            .withf(|e| e.channel == "email")
            .times(1)
            .returning(|_| Ok(()));

        let processor = mocks.into_processor();
        processor.process_user(&user_notification(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_email_error_push_still_attempted() {
        let mut mocks = Mocks::new();

        mocks
            .preferences
            .expect_get_or_create()
            .returning(|id| Ok(prefs_with_token(id)));
        mocks
            .resolver
            .expect_get_profile()
            .returning(|_| Ok(profile("alumno@campus.edu")));
        mocks.email.expect_send().times(1).returning(|_, _, _| {
            Err(NotificationError::SendFailed {
                channel: "email".to_string(),
                reason: "SMTP unavailable".to_string(),
            })
        });
        mocks.push.expect_send().times(1).returning(|_, _, _| true);
        // 邮件失败不落日志，推送成功落一条
        mocks
            .delivery_log
            .expect_append()
            .withf(|e| e.channel == "push")
            .times(1)
            .returning(|_| Ok(()));

        let processor = mocks.into_processor();
        // 渠道失败不上抛
        processor.process_user(&user_notification(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_log_append_failure_not_escalated() {
        let mut mocks = Mocks::new();

        mocks
            .preferences
            .expect_get_or_create()
            .returning(|id| Ok(UserPreferences::default_for(id)));
        mocks
            .resolver
            .expect_get_profile()
            .returning(|_| Ok(profile("alumno@campus.edu")));
        mocks.email.expect_send().times(1).returning(|_, _, _| Ok(()));
        mocks.delivery_log.expect_append().times(1).returning(|_| {
            Err(NotificationError::Shared(
                campus_shared::error::CampusError::Internal("db down".to_string()),
            ))
        });

        let processor = mocks.into_processor();
        processor.process_user(&user_notification(1)).await.unwrap();
    }

    #[tokio::test]
    async fn test_user_profile_failure_propagates() {
        let mut mocks = Mocks::new();

        mocks
            .preferences
            .expect_get_or_create()
            .returning(|id| Ok(UserPreferences::default_for(id)));
        mocks.resolver.expect_get_profile().returning(|user_id| {
            Err(NotificationError::ProfileLookupFailed {
                user_id,
                reason: "identity service 503".to_string(),
            })
        });
        mocks.email.expect_send().times(0);
        mocks.push.expect_send().times(0);

        let processor = mocks.into_processor();
        let result = processor.process_user(&user_notification(1)).await;
        assert!(matches!(
            result,
            Err(NotificationError::ProfileLookupFailed { user_id: 1, .. })
        ));
    }

    fn course_notification() -> CourseNotification {
        CourseNotification {
            id_course: "curso-1".to_string(),
            notification_type: EventCategory::Exam,
            event: EventKind::Created,
            data: EventData {
                titulo: "Parcial 1".to_string(),
                descripcion: Some("Primer parcial".to_string()),
                fecha: "2024-04-10".to_string(),
                instrucciones: None,
                nota: None,
                feedback: None,
                hora: None,
            },
        }
    }

    #[tokio::test]
    async fn test_course_member_failure_skipped() {
        let mut mocks = Mocks::new();

        mocks
            .resolver
            .expect_get_course_members()
            .with(eq("curso-1"))
            .times(1)
            .returning(|_| Ok(vec![1, 2, 3]));
        mocks
            .preferences
            .expect_get_or_create()
            .times(3)
            .returning(|id| Ok(UserPreferences::default_for(id)));
        // 成员 2 的联系信息获取失败，其余两人正常投递
        mocks.resolver.expect_get_profile().times(3).returning(|id| {
            if id == 2 {
                Err(NotificationError::ProfileLookupFailed {
                    user_id: id,
                    reason: "not found".to_string(),
                })
            } else {
                Ok(profile("alumno@campus.edu"))
            }
        });
        mocks.email.expect_send().times(2).returning(|_, _, _| Ok(()));
        mocks
            .delivery_log
            .expect_append()
            .times(2)
            .returning(|_| Ok(()));

        let processor = mocks.into_processor();
        processor.process_course(&course_notification()).await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_roster_is_error() {
        let mut mocks = Mocks::new();

        mocks
            .resolver
            .expect_get_course_members()
            .returning(|_| Ok(vec![]));
        mocks.email.expect_send().times(0);
        mocks.push.expect_send().times(0);

        let processor = mocks.into_processor();
        let result = processor.process_course(&course_notification()).await;
        assert!(matches!(
            result,
            Err(NotificationError::EmptyCourseRoster { .. })
        ));
    }

    #[tokio::test]
    async fn test_roster_failure_propagates() {
        let mut mocks = Mocks::new();

        mocks.resolver.expect_get_course_members().returning(|id| {
            Err(NotificationError::RosterLookupFailed {
                course_id: id.to_string(),
                reason: "course service 500".to_string(),
            })
        });

        let processor = mocks.into_processor();
        let result = processor.process_course(&course_notification()).await;
        assert!(matches!(
            result,
            Err(NotificationError::RosterLookupFailed { .. })
        ));
    }

    fn aux_notification() -> AuxTeacherNotification {
        AuxTeacherNotification {
            id_course: "curso-1".to_string(),
            course_name: "Programación I".to_string(),
            teacher_id: 7,
            event: AuxTeacherAction::Added,
            permissions: Some(PermissionSet {
                edit_course: true,
                create_module: true,
                create_task: false,
                grade_task: false,
            }),
        }
    }

    #[tokio::test]
    async fn test_aux_teacher_bypasses_preferences() {
        let mut mocks = Mocks::new();

        // 偏好全关，角色变更仍然双渠道投递
        mocks.preferences.expect_get_or_create().with(eq(7)).returning(|id| {
            Ok(UserPreferences {
                assignment_email: false,
                assignment_push: false,
                exam_email: false,
                exam_push: false,
                ..prefs_with_token(id)
            })
        });
        mocks
            .resolver
            .expect_get_profile()
            .with(eq(7))
            .returning(|_| Ok(profile("docente@campus.edu")));
        mocks.email.expect_send().times(1).returning(|_, _, _| Ok(()));
        mocks.push.expect_send().times(1).returning(|_, _, _| true);
        mocks
            .delivery_log
            .expect_append()
            .withf(|e| e.category == "Docente Auxiliar" && e.event == "add")
            .times(2)
            .returning(|_| Ok(()));

        let processor = mocks.into_processor();
        processor.process_aux_teacher(&aux_notification()).await.unwrap();
    }

    #[tokio::test]
    async fn test_aux_teacher_without_token_email_only() {
        let mut mocks = Mocks::new();

        mocks
            .preferences
            .expect_get_or_create()
            .returning(|id| Ok(UserPreferences::default_for(id)));
        mocks
            .resolver
            .expect_get_profile()
            .returning(|_| Ok(profile("docente@campus.edu")));
        mocks.email.expect_send().times(1).returning(|_, _, _| Ok(()));
        // 强制投递也无法绕过缺失的令牌
        mocks.push.expect_send().times(0);
        mocks
            .delivery_log
            .expect_append()
            .times(1)
            .returning(|_| Ok(()));

        let processor = mocks.into_processor();
        processor.process_aux_teacher(&aux_notification()).await.unwrap();
    }
}
