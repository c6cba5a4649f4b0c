//! 订阅偏好仓储
//!
//! 偏好行惰性创建：用户首次被通知引用时以默认值建行（全部订阅、无令牌）。

use async_trait::async_trait;
use campus_shared::error::CampusError;
use sqlx::PgPool;

use super::traits::PreferenceRepositoryTrait;
use crate::error::Result;
use crate::models::{PreferenceUpdate, UserPreferences};

/// 订阅偏好仓储
pub struct PgPreferenceRepository {
    pool: PgPool,
}

impl PgPreferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceRepositoryTrait for PgPreferenceRepository {
    async fn get(&self, user_id: i64) -> Result<Option<UserPreferences>> {
        let prefs = sqlx::query_as::<_, UserPreferences>(
            r#"
            SELECT user_id, assignment_email, assignment_push,
                   exam_email, exam_push, push_token
            FROM user_preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CampusError::Database)?;

        Ok(prefs)
    }

    async fn get_or_create(&self, user_id: i64) -> Result<UserPreferences> {
        // 幂等插入：并发首次引用时只有一方建行，另一方命中 DO NOTHING 后重查
        sqlx::query(
            r#"
            INSERT INTO user_preferences (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(CampusError::Database)?;

        let prefs = sqlx::query_as::<_, UserPreferences>(
            r#"
            SELECT user_id, assignment_email, assignment_push,
                   exam_email, exam_push, push_token
            FROM user_preferences
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(CampusError::Database)?;

        Ok(prefs)
    }

    async fn update(&self, user_id: i64, update: PreferenceUpdate) -> Result<UserPreferences> {
        // 先保证行存在，再做部分更新
        self.get_or_create(user_id).await?;

        let set_token = update.push_token.is_some();
        let token_value = update.push_token.flatten();

        let prefs = sqlx::query_as::<_, UserPreferences>(
            r#"
            UPDATE user_preferences
            SET assignment_email = COALESCE($2, assignment_email),
                assignment_push  = COALESCE($3, assignment_push),
                exam_email       = COALESCE($4, exam_email),
                exam_push        = COALESCE($5, exam_push),
                push_token       = CASE WHEN $6 THEN $7 ELSE push_token END,
                updated_at       = NOW()
            WHERE user_id = $1
            RETURNING user_id, assignment_email, assignment_push,
                      exam_email, exam_push, push_token
            "#,
        )
        .bind(user_id)
        .bind(update.assignment_email)
        .bind(update.assignment_push)
        .bind(update.exam_email)
        .bind(update.exam_push)
        .bind(set_token)
        .bind(token_value)
        .fetch_one(&self.pool)
        .await
        .map_err(CampusError::Database)?;

        Ok(prefs)
    }
}
