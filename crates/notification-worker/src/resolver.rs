//! 收件人解析
//!
//! 从身份服务获取用户联系信息，从课程服务获取课程成员列表。
//! 两个调用都带请求级超时与服务令牌，非 2xx 一律视为解析失败。

use async_trait::async_trait;
use campus_shared::config::ServicesConfig;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{NotificationError, Result};
use crate::models::RecipientProfile;

/// 收件人解析接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecipientResolver: Send + Sync {
    /// 获取单个用户的联系信息
    async fn get_profile(&self, user_id: i64) -> Result<RecipientProfile>;

    /// 获取课程全部成员的用户 ID
    async fn get_course_members(&self, course_id: &str) -> Result<Vec<i64>>;
}

/// 课程服务的成员列表响应
#[derive(Debug, Deserialize)]
struct CourseMembersResponse {
    users: Vec<i64>,
}

/// 基于 HTTP 的收件人解析器
///
/// 身份服务与课程服务各自独立的 base URL，共用一个带超时的 reqwest 客户端。
pub struct HttpRecipientResolver {
    client: reqwest::Client,
    users_base_url: String,
    courses_base_url: String,
    service_token: String,
}

impl HttpRecipientResolver {
    pub fn new(config: &ServicesConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| {
                campus_shared::error::CampusError::Internal(format!("HTTP 客户端构建失败: {e}"))
            })?;

        Ok(Self {
            client,
            users_base_url: config.users_base_url.trim_end_matches('/').to_string(),
            courses_base_url: config.courses_base_url.trim_end_matches('/').to_string(),
            service_token: config.service_token.clone(),
        })
    }
}

#[async_trait]
impl RecipientResolver for HttpRecipientResolver {
    async fn get_profile(&self, user_id: i64) -> Result<RecipientProfile> {
        let url = format!("{}/user/{}", self.users_base_url, user_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.service_token)
            .send()
            .await
            .map_err(|e| NotificationError::ProfileLookupFailed {
                user_id,
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(NotificationError::ProfileLookupFailed {
                user_id,
                reason: format!("身份服务返回 {}", response.status()),
            });
        }

        response
            .json::<RecipientProfile>()
            .await
            .map_err(|e| NotificationError::ProfileLookupFailed {
                user_id,
                reason: format!("响应解析失败: {e}"),
            })
    }

    async fn get_course_members(&self, course_id: &str) -> Result<Vec<i64>> {
        let url = format!("{}/course/{}/users", self.courses_base_url, course_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.service_token)
            .send()
            .await
            .map_err(|e| NotificationError::RosterLookupFailed {
                course_id: course_id.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(NotificationError::RosterLookupFailed {
                course_id: course_id.to_string(),
                reason: format!("课程服务返回 {}", response.status()),
            });
        }

        let members = response
            .json::<CourseMembersResponse>()
            .await
            .map_err(|e| NotificationError::RosterLookupFailed {
                course_id: course_id.to_string(),
                reason: format!("响应解析失败: {e}"),
            })?;

        Ok(members.users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = ServicesConfig {
            users_base_url: "http://users.internal/".to_string(),
            courses_base_url: "http://courses.internal///".to_string(),
            service_token: "token".to_string(),
            request_timeout_seconds: 5,
        };

        let resolver = HttpRecipientResolver::new(&config).unwrap();
        assert_eq!(resolver.users_base_url, "http://users.internal");
        assert_eq!(resolver.courses_base_url, "http://courses.internal");
    }

    #[test]
    fn test_course_members_response_deserialize() {
        let json = r#"{"users": [1, 2, 3]}"#;
        let response: CourseMembersResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.users, vec![1, 2, 3]);
    }
}
