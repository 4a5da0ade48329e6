//! 短信发送器

use async_trait::async_trait;
use regex::Regex;
use tracing::info;
use uuid::Uuid;

use super::names;
use crate::error::NotificationError;
use crate::models::{Notification, NotificationChannel, NotificationResult};
use crate::sender::NotificationSender;
use crate::validation::{ValidableSender, ValidationError, has_content, is_blank};

/// 单条短信正文上限（拼接短信）
const MAX_SMS_LENGTH: usize = 1600;

/// 模拟短信发送器
///
/// 生产环境中替换为短信服务商的 API 调用。号码需为 E.164 风格，
/// 消息 ID 模拟服务商格式：`SM` + 32 位十六进制。
pub struct MockSmsSender {
    phone_regex: Regex,
}

impl MockSmsSender {
    pub fn new() -> Self {
        Self {
            phone_regex: Regex::new(r"^\+?[1-9]\d{6,14}$").expect("手机号正则非法"),
        }
    }
}

impl Default for MockSmsSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSender for MockSmsSender {
    async fn send(
        &self,
        notification: &Notification,
    ) -> Result<NotificationResult, NotificationError> {
        let message_id = format!("SM{}", Uuid::new_v4().simple());

        info!(
            channel = "SMS",
            notification_id = %notification.id(),
            recipient = %notification.recipient(),
            body = ?notification.body(),
            message_id = %message_id,
            "模拟发送短信通知"
        );

        Ok(NotificationResult::success(
            notification.id(),
            message_id,
            NotificationChannel::Sms,
            self.provider_name(),
        ))
    }

    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Sms
    }

    fn provider_name(&self) -> String {
        names::SMS_PROVIDER_1.to_string()
    }

    fn as_validable(&self) -> Option<&dyn ValidableSender> {
        Some(self)
    }
}

impl ValidableSender for MockSmsSender {
    fn validate(&self, notification: &Notification) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let recipient = notification.recipient();

        if is_blank(recipient) {
            errors.push(ValidationError::new("recipient", "Phone number is required"));
        } else if !self.phone_regex.is_match(recipient) {
            errors.push(ValidationError::with_code(
                "recipient",
                format!("Invalid phone number format: {}", recipient),
                "INVALID_PHONE_FORMAT",
            ));
        }

        if !has_content(notification) {
            errors.push(ValidationError::new("body", "SMS body or template is required"));
        } else if notification
            .body()
            .is_some_and(|b| b.chars().count() > MAX_SMS_LENGTH)
        {
            errors.push(ValidationError::with_code(
                "body",
                format!(
                    "SMS body exceeds maximum length of {} characters",
                    MAX_SMS_LENGTH
                ),
                "SMS_BODY_TOO_LONG",
            ));
        }

        errors
    }
}
