//! 通知事件模型
//!
//! 定义队列中流转的三类通知事件及其负载结构。字段名与枚举取值保持与
//! 现有生产方的 JSON 约定一致（西语取值如 "Tarea"/"Nuevo"），
//! 事件类型由显式的 `event_type` 判别字段决定，不按字段存在性推断。

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// NotificationEvent — 事件信封
// ---------------------------------------------------------------------------

/// 队列通知事件
///
/// 内部标签式（internally tagged）序列化：`event_type` 字段携带判别值，
/// 缺失或未知判别值在反序列化阶段即失败，由消费侧记录日志后丢弃。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum NotificationEvent {
    /// 面向单个学生的事件（作业/考试的提交与评分）
    #[serde(rename = "user_notification")]
    User(UserNotification),

    /// 面向整个课程成员的广播事件（作业/考试的创建与更新）
    #[serde(rename = "course_notification")]
    Course(CourseNotification),

    /// 辅助教师角色变更事件（添加/移除/权限更新）
    #[serde(rename = "aux_teacher_notification")]
    AuxTeacher(AuxTeacherNotification),
}

/// 判别值是否为已知的事件类型
///
/// 供消费侧在反序列化失败时区分「未知事件类型」与「字段格式错误」两种日志分类。
pub fn is_known_event_type(tag: &str) -> bool {
    matches!(
        tag,
        "user_notification" | "course_notification" | "aux_teacher_notification"
    )
}

/// 单用户通知事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserNotification {
    pub id_user: i64,
    pub notification_type: EventCategory,
    pub event: EventKind,
    pub data: EventData,
}

/// 课程广播通知事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseNotification {
    pub id_course: String,
    pub notification_type: EventCategory,
    pub event: EventKind,
    pub data: EventData,
}

/// 辅助教师角色变更事件
///
/// 角色变更通知是强制投递的，不走收件人的订阅偏好；
/// `permissions` 在移除场景下可整体缺失。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxTeacherNotification {
    pub id_course: String,
    pub course_name: String,
    pub teacher_id: i64,
    pub event: AuxTeacherAction,
    #[serde(default)]
    pub permissions: Option<PermissionSet>,
}

// ---------------------------------------------------------------------------
// 枚举取值
// ---------------------------------------------------------------------------

/// 事件类别：通知的主题分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventCategory {
    #[serde(rename = "Tarea")]
    Assignment,
    #[serde(rename = "Examen")]
    Exam,
}

impl EventCategory {
    /// 通知主题前缀与投递日志使用的标签（与线上取值一致）
    pub fn label(&self) -> &'static str {
        match self {
            Self::Assignment => "Tarea",
            Self::Exam => "Examen",
        }
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// 事件动作：通知对应的生命周期动作
///
/// `Unknown` 通过 `#[serde(other)]` 吸收未定义的取值，
/// 使格式化层可以返回固定的兜底文案而不是让整条事件解析失败。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "Nuevo")]
    Created,
    #[serde(rename = "Actualizado")]
    Updated,
    #[serde(rename = "Entregado")]
    Submitted,
    #[serde(rename = "Calificado")]
    Graded,
    #[serde(other)]
    Unknown,
}

impl EventKind {
    /// 投递日志使用的动作标签
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created => "Nuevo",
            Self::Updated => "Actualizado",
            Self::Submitted => "Entregado",
            Self::Graded => "Calificado",
            Self::Unknown => "Desconocido",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// 辅助教师角色变更动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuxTeacherAction {
    #[serde(rename = "add")]
    Added,
    #[serde(rename = "remove")]
    Removed,
    #[serde(rename = "update")]
    Updated,
}

impl AuxTeacherAction {
    /// 投递日志使用的动作标签
    pub fn label(&self) -> &'static str {
        match self {
            Self::Added => "add",
            Self::Removed => "remove",
            Self::Updated => "update",
        }
    }
}

impl std::fmt::Display for AuxTeacherAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// ---------------------------------------------------------------------------
// 事件负载
// ---------------------------------------------------------------------------

/// 事件业务负载
///
/// 除 `titulo` 和 `fecha` 外均为可选字段；缺失字段在格式化时按空省略，
/// 绝不因此使整条通知失败。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub titulo: String,
    #[serde(default)]
    pub descripcion: Option<String>,
    /// ISO-8601 日期或日期时间字符串
    pub fecha: String,
    #[serde(default)]
    pub instrucciones: Option<String>,
    #[serde(default)]
    pub nota: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub hora: Option<String>,
}

/// 辅助教师权限集
///
/// 四个独立布尔值，序列化字段名与生产方约定一致。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionSet {
    #[serde(default)]
    pub edit_course: bool,
    #[serde(default)]
    pub create_module: bool,
    #[serde(default)]
    pub create_task: bool,
    #[serde(default)]
    pub grade_task: bool,
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_notification_deserialize() {
        let json = r#"{
            "event_type": "user_notification",
            "id_user": 1,
            "notification_type": "Tarea",
            "event": "Calificado",
            "data": {
                "titulo": "Tarea 1",
                "fecha": "2024-03-20",
                "nota": 9.5,
                "feedback": "Excelente trabajo"
            }
        }"#;

        let event: NotificationEvent = serde_json::from_str(json).unwrap();
        let NotificationEvent::User(user) = event else {
            panic!("应解析为 User 变体");
        };

        assert_eq!(user.id_user, 1);
        assert_eq!(user.notification_type, EventCategory::Assignment);
        assert_eq!(user.event, EventKind::Graded);
        assert_eq!(user.data.titulo, "Tarea 1");
        assert_eq!(user.data.nota, Some(9.5));
        assert_eq!(user.data.feedback.as_deref(), Some("Excelente trabajo"));
        assert!(user.data.descripcion.is_none());
    }

    #[test]
    fn test_course_notification_deserialize() {
        let json = r#"{
            "event_type": "course_notification",
            "id_course": "curso-123",
            "notification_type": "Examen",
            "event": "Nuevo",
            "data": {
                "titulo": "Parcial 1",
                "descripcion": "Primer parcial",
                "fecha": "2024-04-10T14:00:00"
            }
        }"#;

        let event: NotificationEvent = serde_json::from_str(json).unwrap();
        let NotificationEvent::Course(course) = event else {
            panic!("应解析为 Course 变体");
        };

        assert_eq!(course.id_course, "curso-123");
        assert_eq!(course.notification_type, EventCategory::Exam);
        assert_eq!(course.event, EventKind::Created);
    }

    #[test]
    fn test_aux_teacher_notification_deserialize() {
        let json = r#"{
            "event_type": "aux_teacher_notification",
            "event": "add",
            "id_course": "curso-123",
            "course_name": "Curso de Programación",
            "teacher_id": 7,
            "permissions": {
                "edit_course": true,
                "create_module": false,
                "create_task": true,
                "grade_task": false
            }
        }"#;

        let event: NotificationEvent = serde_json::from_str(json).unwrap();
        let NotificationEvent::AuxTeacher(aux) = event else {
            panic!("应解析为 AuxTeacher 变体");
        };

        assert_eq!(aux.teacher_id, 7);
        assert_eq!(aux.event, AuxTeacherAction::Added);
        let perms = aux.permissions.unwrap();
        assert!(perms.edit_course);
        assert!(!perms.create_module);
        assert!(perms.create_task);
        assert!(!perms.grade_task);
    }

    #[test]
    fn test_aux_teacher_notification_without_permissions() {
        // 移除事件不携带权限集
        let json = r#"{
            "event_type": "aux_teacher_notification",
            "event": "remove",
            "id_course": "curso-123",
            "course_name": "Curso de Programación",
            "teacher_id": 7
        }"#;

        let event: NotificationEvent = serde_json::from_str(json).unwrap();
        let NotificationEvent::AuxTeacher(aux) = event else {
            panic!("应解析为 AuxTeacher 变体");
        };

        assert_eq!(aux.event, AuxTeacherAction::Removed);
        assert!(aux.permissions.is_none());
    }

    #[test]
    fn test_missing_event_type_fails() {
        // 不按 id_user/id_course 字段推断事件类型——判别字段是必须的
        let json = r#"{
            "id_user": 1,
            "notification_type": "Tarea",
            "event": "Entregado",
            "data": {"titulo": "Tarea 1", "fecha": "2024-03-20"}
        }"#;

        let result: Result<NotificationEvent, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_event_type_fails() {
        let json = r#"{"event_type": "invalid_type", "id_user": 1}"#;
        let result: Result<NotificationEvent, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_is_known_event_type() {
        assert!(is_known_event_type("user_notification"));
        assert!(is_known_event_type("course_notification"));
        assert!(is_known_event_type("aux_teacher_notification"));
        assert!(!is_known_event_type("invalid_type"));
        assert!(!is_known_event_type(""));
    }

    #[test]
    fn test_unknown_event_kind_falls_through() {
        // 未定义的动作取值不让解析失败，由格式化层兜底
        let json = r#"{
            "event_type": "user_notification",
            "id_user": 1,
            "notification_type": "Tarea",
            "event": "Archivado",
            "data": {"titulo": "Tarea 1", "fecha": "2024-03-20"}
        }"#;

        let event: NotificationEvent = serde_json::from_str(json).unwrap();
        let NotificationEvent::User(user) = event else {
            panic!("应解析为 User 变体");
        };
        assert_eq!(user.event, EventKind::Unknown);
    }

    #[test]
    fn test_category_and_kind_labels() {
        assert_eq!(EventCategory::Assignment.to_string(), "Tarea");
        assert_eq!(EventCategory::Exam.to_string(), "Examen");
        assert_eq!(EventKind::Created.to_string(), "Nuevo");
        assert_eq!(EventKind::Graded.to_string(), "Calificado");
        assert_eq!(AuxTeacherAction::Removed.to_string(), "remove");
    }

    #[test]
    fn test_roundtrip_serialization() {
        let event = NotificationEvent::Course(CourseNotification {
            id_course: "curso-9".to_string(),
            notification_type: EventCategory::Assignment,
            event: EventKind::Updated,
            data: EventData {
                titulo: "TP 2".to_string(),
                descripcion: None,
                fecha: "2024-05-01".to_string(),
                instrucciones: Some("Entregar por la plataforma".to_string()),
                nota: None,
                feedback: None,
                hora: None,
            },
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""event_type":"course_notification""#));
        assert!(json.contains(r#""event":"Actualizado""#));

        let back: NotificationEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
