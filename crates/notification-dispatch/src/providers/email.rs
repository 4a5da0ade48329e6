//! 邮件发送器

use async_trait::async_trait;
use regex::Regex;
use tracing::info;
use uuid::Uuid;

use super::names;
use crate::error::NotificationError;
use crate::models::{Notification, NotificationChannel, NotificationResult};
use crate::sender::NotificationSender;
use crate::validation::{ValidableSender, ValidationError, has_content, is_blank};

/// 模拟邮件发送器（主）
///
/// 生产环境中替换为 SMTP / 邮件服务商 API 调用
pub struct MockEmailSender {
    email_regex: Regex,
}

impl MockEmailSender {
    pub fn new() -> Self {
        Self {
            email_regex: Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
                .expect("邮箱格式正则非法"),
        }
    }
}

impl Default for MockEmailSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSender for MockEmailSender {
    async fn send(
        &self,
        notification: &Notification,
    ) -> Result<NotificationResult, NotificationError> {
        let message_id = Uuid::new_v4().to_string();

        info!(
            channel = "EMAIL",
            notification_id = %notification.id(),
            recipient = %notification.recipient(),
            subject = ?notification.subject(),
            message_id = %message_id,
            "模拟发送邮件通知"
        );

        Ok(NotificationResult::success(
            notification.id(),
            message_id,
            NotificationChannel::Email,
            self.provider_name(),
        ))
    }

    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Email
    }

    fn provider_name(&self) -> String {
        names::EMAIL_PROVIDER_1.to_string()
    }

    fn as_validable(&self) -> Option<&dyn ValidableSender> {
        Some(self)
    }
}

impl ValidableSender for MockEmailSender {
    fn validate(&self, notification: &Notification) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let recipient = notification.recipient();

        if is_blank(recipient) {
            errors.push(ValidationError::new("recipient", "Email recipient is required"));
        } else if !self.email_regex.is_match(recipient) {
            errors.push(ValidationError::with_code(
                "recipient",
                format!("Invalid email format: {}", recipient),
                "INVALID_EMAIL_FORMAT",
            ));
        }

        if !has_content(notification) {
            errors.push(ValidationError::new("body", "Email body or template is required"));
        }

        errors
    }
}

/// 模拟备用邮件发送器
///
/// 不做任何校验，作为主发送器被拒绝时的兜底
pub struct MockEmailFallback;

#[async_trait]
impl NotificationSender for MockEmailFallback {
    async fn send(
        &self,
        notification: &Notification,
    ) -> Result<NotificationResult, NotificationError> {
        let message_id = Uuid::new_v4().to_string();

        info!(
            channel = "EMAIL",
            notification_id = %notification.id(),
            recipient = %notification.recipient(),
            subject = ?notification.subject(),
            message_id = %message_id,
            "模拟发送邮件通知（备用通道）"
        );

        Ok(NotificationResult::success(
            notification.id(),
            message_id,
            NotificationChannel::Email,
            self.provider_name(),
        ))
    }

    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Email
    }

    fn provider_name(&self) -> String {
        names::EMAIL_PROVIDER_2.to_string()
    }
}
