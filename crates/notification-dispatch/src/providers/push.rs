//! 推送发送器

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use super::names;
use crate::error::NotificationError;
use crate::models::{Notification, NotificationChannel, NotificationResult};
use crate::sender::NotificationSender;
use crate::validation::{ValidableSender, ValidationError, has_content, is_blank};

/// FCM 设备 token 的最短长度
const DEVICE_TOKEN_MIN_LENGTH: usize = 100;
const MAX_TITLE_LENGTH: usize = 100;
const MAX_BODY_LENGTH: usize = 4096;
/// 日志中只保留 token 前缀
const TOKEN_LOG_PREFIX: usize = 20;

/// 模拟 APP 推送发送器
///
/// 生产环境中替换为 APNs / FCM 等推送服务的 SDK 调用
pub struct MockPushSender;

fn token_prefix(token: &str) -> String {
    let prefix: String = token.chars().take(TOKEN_LOG_PREFIX).collect();
    format!("{}...", prefix)
}

#[async_trait]
impl NotificationSender for MockPushSender {
    async fn send(
        &self,
        notification: &Notification,
    ) -> Result<NotificationResult, NotificationError> {
        let message_id = Uuid::new_v4().to_string();

        info!(
            channel = "PUSH",
            notification_id = %notification.id(),
            device_token = %token_prefix(notification.recipient()),
            title = ?notification.subject(),
            message_id = %message_id,
            "模拟发送 APP 推送通知"
        );

        Ok(NotificationResult::success(
            notification.id(),
            message_id,
            NotificationChannel::Push,
            self.provider_name(),
        ))
    }

    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Push
    }

    fn provider_name(&self) -> String {
        names::PUSH_PROVIDER_1.to_string()
    }

    fn as_validable(&self) -> Option<&dyn ValidableSender> {
        Some(self)
    }
}

impl ValidableSender for MockPushSender {
    fn validate(&self, notification: &Notification) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let token = notification.recipient();

        if is_blank(token) {
            errors.push(ValidationError::new("recipient", "Device token is required"));
        } else if token.chars().count() < DEVICE_TOKEN_MIN_LENGTH {
            errors.push(ValidationError::with_code(
                "recipient",
                "Device token appears to be invalid (too short)",
                "INVALID_DEVICE_TOKEN",
            ));
        }

        if !has_content(notification) {
            errors.push(ValidationError::new(
                "body",
                "Push notification body or template is required",
            ));
        } else if notification
            .body()
            .is_some_and(|b| b.chars().count() > MAX_BODY_LENGTH)
        {
            errors.push(ValidationError::with_code(
                "body",
                format!(
                    "Push body exceeds maximum length of {} characters",
                    MAX_BODY_LENGTH
                ),
                "PUSH_BODY_TOO_LONG",
            ));
        }

        if notification
            .subject()
            .is_some_and(|s| s.chars().count() > MAX_TITLE_LENGTH)
        {
            errors.push(ValidationError::with_code(
                "subject",
                format!(
                    "Push title exceeds maximum length of {} characters",
                    MAX_TITLE_LENGTH
                ),
                "PUSH_TITLE_TOO_LONG",
            ));
        }

        errors
    }
}
