//! 仓储 Trait 定义
//!
//! 定义仓储接口，便于处理层依赖抽象而非具体实现，支持 mock 测试

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{DeliveryLogEntry, NewDeliveryLog, PreferenceUpdate, UserPreferences};

/// 订阅偏好仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PreferenceRepositoryTrait: Send + Sync {
    /// 获取用户偏好
    async fn get(&self, user_id: i64) -> Result<Option<UserPreferences>>;

    /// 获取用户偏好，不存在时按默认值建行后返回
    ///
    /// 幂等：并发的首次引用只会建一行。
    async fn get_or_create(&self, user_id: i64) -> Result<UserPreferences>;

    /// 部分更新用户偏好，返回更新后的行
    async fn update(&self, user_id: i64, update: PreferenceUpdate) -> Result<UserPreferences>;
}

/// 投递日志仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliveryLogRepositoryTrait: Send + Sync {
    /// 追加一条投递日志
    async fn append(&self, entry: NewDeliveryLog) -> Result<()>;

    /// 按用户分页查询投递日志，最新在前
    async fn list_by_user(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<DeliveryLogEntry>>;
}
