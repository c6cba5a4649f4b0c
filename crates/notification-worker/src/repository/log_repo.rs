//! 投递日志仓储
//!
//! 仅追加的投递记录表：确认送达后写入，供外部查询接口分页读取。

use async_trait::async_trait;
use campus_shared::error::CampusError;
use sqlx::PgPool;

use super::traits::DeliveryLogRepositoryTrait;
use crate::error::Result;
use crate::models::{DeliveryLogEntry, NewDeliveryLog};

/// 投递日志仓储
pub struct PgDeliveryLogRepository {
    pool: PgPool,
}

impl PgDeliveryLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryLogRepositoryTrait for PgDeliveryLogRepository {
    async fn append(&self, entry: NewDeliveryLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_logs (user_id, category, event, channel, subject, body)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.user_id)
        .bind(&entry.category)
        .bind(&entry.event)
        .bind(&entry.channel)
        .bind(&entry.subject)
        .bind(&entry.body)
        .execute(&self.pool)
        .await
        .map_err(CampusError::Database)?;

        Ok(())
    }

    async fn list_by_user(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<DeliveryLogEntry>> {
        let entries = sqlx::query_as::<_, DeliveryLogEntry>(
            r#"
            SELECT id, user_id, category, event, channel, subject, body, created_at
            FROM notification_logs
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(CampusError::Database)?;

        Ok(entries)
    }
}
