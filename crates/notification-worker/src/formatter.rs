//! 通知文案格式化
//!
//! 将事件负载渲染为（主题，正文）文案对。纯函数、全函数：
//! 任何输入都产出文案，缺失的可选字段按行省略，未知动作返回固定兜底文案。
//! 面向用户的文案为西语（平台语言）。

use campus_shared::events::{
    AuxTeacherAction, AuxTeacherNotification, EventCategory, EventData, EventKind,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// 未知动作的兜底文案对
pub const FALLBACK_SUBJECT: &str = "Notificación";
pub const FALLBACK_BODY: &str = "Evento desconocido.";

// ---------------------------------------------------------------------------
// 课程事件格式化
// ---------------------------------------------------------------------------

/// 渲染课程事件文案
///
/// 主题带 `[Tarea]` / `[Examen]` 类别前缀；兜底文案不带前缀。
pub fn format_event(category: EventCategory, kind: EventKind, data: &EventData) -> (String, String) {
    let (subject, body) = match kind {
        EventKind::Created => format_created(data),
        EventKind::Updated => format_updated(data),
        EventKind::Submitted => format_submitted(data),
        EventKind::Graded => format_graded(data),
        EventKind::Unknown => {
            return (FALLBACK_SUBJECT.to_string(), FALLBACK_BODY.to_string());
        }
    };

    (format!("[{}] {}", category.label(), subject), body)
}

fn format_created(data: &EventData) -> (String, String) {
    let mut lines = Vec::new();
    if let Some(descripcion) = non_empty(data.descripcion.as_deref()) {
        lines.push(descripcion.to_string());
    }
    if let Some(instrucciones) = non_empty(data.instrucciones.as_deref()) {
        lines.push(instrucciones.to_string());
    }
    if let Some(fecha) = render_date_line(&data.fecha, data.hora.as_deref()) {
        lines.push(fecha);
    }

    (data.titulo.clone(), lines.join("\n"))
}

fn format_updated(data: &EventData) -> (String, String) {
    let mut lines = vec!["Se actualizaron los datos.".to_string()];
    if let Some(instrucciones) = non_empty(data.instrucciones.as_deref()) {
        lines.push(instrucciones.to_string());
    }
    if let Some(fecha) = render_date_line(&data.fecha, data.hora.as_deref()) {
        lines.push(fecha);
    }

    (format!("{} (Actualizado)", data.titulo), lines.join("\n"))
}

fn format_submitted(data: &EventData) -> (String, String) {
    let mut lines = vec!["Tu entrega fue recibida.".to_string()];
    if let Some(fecha) = render_date_line(&data.fecha, data.hora.as_deref()) {
        lines.push(fecha);
    }

    (
        format!("Entrega recibida: {}", data.titulo),
        lines.join("\n"),
    )
}

fn format_graded(data: &EventData) -> (String, String) {
    let mut lines = Vec::new();
    if let Some(nota) = data.nota {
        lines.push(format!("Nota: {nota}"));
    }
    if let Some(feedback) = non_empty(data.feedback.as_deref()) {
        lines.push(format!("Comentarios: {feedback}"));
    }
    if let Some(fecha) = render_date_line(&data.fecha, data.hora.as_deref()) {
        lines.push(fecha);
    }

    (format!("{} calificado", data.titulo), lines.join("\n"))
}

// ---------------------------------------------------------------------------
// 辅助教师事件格式化
// ---------------------------------------------------------------------------

/// 渲染辅助教师角色变更文案
///
/// 权限块按固定顺序枚举四项权限；事件不携带权限集时整块省略。
pub fn format_aux_teacher(event: &AuxTeacherNotification) -> (String, String) {
    match event.event {
        AuxTeacherAction::Added => {
            let mut body = format!(
                "Fuiste asignado como docente auxiliar del curso {}.",
                event.course_name
            );
            if let Some(perms) = &event.permissions {
                body.push('\n');
                body.push_str(&render_permissions(perms));
            }
            (
                format!("Nuevo rol: docente auxiliar en {}", event.course_name),
                body,
            )
        }
        AuxTeacherAction::Updated => {
            let mut body = format!(
                "Se actualizaron tus permisos de docente auxiliar en el curso {}.",
                event.course_name
            );
            if let Some(perms) = &event.permissions {
                body.push('\n');
                body.push_str(&render_permissions(perms));
            }
            (
                format!("Permisos actualizados en {}", event.course_name),
                body,
            )
        }
        AuxTeacherAction::Removed => (
            format!(
                "Rol de docente auxiliar finalizado en {}",
                event.course_name
            ),
            format!(
                "Ya no formás parte del curso {} como docente auxiliar.",
                event.course_name
            ),
        ),
    }
}

fn render_permissions(perms: &campus_shared::events::PermissionSet) -> String {
    let granted = |flag: bool| if flag { "concedido" } else { "no concedido" };
    [
        "Permisos:".to_string(),
        format!("- Editar curso: {}", granted(perms.edit_course)),
        format!("- Crear módulos: {}", granted(perms.create_module)),
        format!("- Crear tareas: {}", granted(perms.create_task)),
        format!("- Calificar tareas: {}", granted(perms.grade_task)),
    ]
    .join("\n")
}

// ---------------------------------------------------------------------------
// 日期渲染
// ---------------------------------------------------------------------------

/// 渲染日期行
///
/// 依次尝试带时区的日期时间、裸日期时间和裸日期三种 ISO-8601 形式；
/// 解析成功渲染为 `Fecha: DD/MM/YYYY[, HH:MM]`，失败则省略整行。
/// `hora` 存在时以 ` a las <hora>` 追加在行尾。
fn render_date_line(fecha: &str, hora: Option<&str>) -> Option<String> {
    let rendered = parse_fecha(fecha)?;

    match non_empty(hora) {
        Some(hora) => Some(format!("Fecha: {rendered} a las {hora}")),
        None => Some(format!("Fecha: {rendered}")),
    }
}

fn parse_fecha(fecha: &str) -> Option<String> {
    let fecha = fecha.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(fecha) {
        return Some(dt.format("%d/%m/%Y, %H:%M").to_string());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(fecha, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.format("%d/%m/%Y, %H:%M").to_string());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(fecha, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt.format("%d/%m/%Y, %H:%M").to_string());
    }
    if let Ok(date) = NaiveDate::parse_from_str(fecha, "%Y-%m-%d") {
        return Some(date.format("%d/%m/%Y").to_string());
    }

    None
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
