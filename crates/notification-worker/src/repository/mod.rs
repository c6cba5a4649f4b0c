//! 通知仓储层
//!
//! 用户订阅偏好与投递日志的数据访问，按 trait 抽象便于 mock 测试。

pub mod log_repo;
pub mod preference_repo;
pub mod traits;

pub use log_repo::PgDeliveryLogRepository;
pub use preference_repo::PgPreferenceRepository;
pub use traits::{DeliveryLogRepositoryTrait, PreferenceRepositoryTrait};
