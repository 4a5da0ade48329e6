//! 请求 DTO
//!
//! 渠道无关的发送请求，只存在于入站边界。分发引擎收到后的第一件事
//! 就是把它投影为 [`Notification`](crate::models::Notification) 加一个渠道键。

use std::borrow::Cow;
use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{NotificationChannel, NotificationResult, Priority};

/// 发送通知请求
///
/// `channel` 与 `recipient` 必填，其余字段可选。`scheduled_at` / `ttl_seconds`
/// 只随通知透传，分发核心不据此延迟或丢弃发送。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationRequest {
    pub channel: NotificationChannel,
    #[validate(custom(function = "validate_not_blank"))]
    pub recipient: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub template_variables: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    /// 为空时按 NORMAL 处理
    #[serde(default)]
    pub priority: Option<Priority>,
    /// 保留调用方给出的时区偏移
    #[serde(default)]
    pub scheduled_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub ttl_seconds: Option<u32>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
}

fn validate_not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("required")
            .with_message(Cow::Borrowed("Recipient is required")));
    }
    Ok(())
}

impl SendNotificationRequest {
    /// 创建只包含必填字段的请求，其余字段通过结构体更新语法补充
    pub fn new(channel: NotificationChannel, recipient: impl Into<String>) -> Self {
        Self {
            channel,
            recipient: recipient.into(),
            subject: None,
            body: None,
            template_id: None,
            template_variables: HashMap::new(),
            metadata: HashMap::new(),
            priority: None,
            scheduled_at: None,
            ttl_seconds: None,
            from: None,
            reply_to: None,
        }
    }

    /// 入站边界校验
    ///
    /// 校验失败时返回 `VALIDATION_ERROR` 结果，调用方可直接作为响应返回。
    /// 分发引擎本身不调用此方法。
    pub fn check(&self) -> Result<(), NotificationResult> {
        self.validate().map_err(|errors| {
            let mut messages: Vec<String> = errors
                .field_errors()
                .iter()
                .flat_map(|(field, errs)| {
                    errs.iter().map(move |e| {
                        format!("{}: {}", field, e.message.as_deref().unwrap_or("invalid"))
                    })
                })
                .collect();
            messages.sort();
            NotificationResult::validation_failure(None, Some(self.channel), messages.join("; "))
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::models::{ErrorCode, Notification};

    #[test]
    fn test_check_accepts_minimal_request() {
        let request = SendNotificationRequest::new(NotificationChannel::Email, "user@example.com");
        assert_ok!(request.check());
    }

    #[test]
    fn test_check_rejects_blank_recipient() {
        let request = SendNotificationRequest::new(NotificationChannel::Sms, "   ");
        let result = assert_err!(request.check());

        assert!(!result.success);
        assert_eq!(result.error_code, Some(ErrorCode::ValidationError));
        assert_eq!(result.channel, Some(NotificationChannel::Sms));
        assert!(result.notification_id.is_none());
        assert_eq!(
            result.error_message.as_deref(),
            Some("recipient: Recipient is required")
        );
    }

    #[test]
    fn test_deserialize_camel_case_request() {
        let json = serde_json::json!({
            "channel": "PUSH",
            "recipient": "device-token",
            "templateId": "tpl-001",
            "ttlSeconds": 3600,
            "replyTo": "support@example.com",
            "priority": "HIGH",
            "metadata": {"source": "example"}
        });

        let request: SendNotificationRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.channel, NotificationChannel::Push);
        assert_eq!(request.template_id.as_deref(), Some("tpl-001"));
        assert_eq!(request.ttl_seconds, Some(3600));
        assert_eq!(request.reply_to.as_deref(), Some("support@example.com"));
        assert_eq!(request.priority, Some(Priority::High));
        assert_eq!(request.metadata["source"], "example");
        assert!(request.template_variables.is_empty());
    }

    #[test]
    fn test_scheduled_at_keeps_caller_offset() {
        let json = serde_json::json!({
            "channel": "EMAIL",
            "recipient": "user@example.com",
            "scheduledAt": "2026-10-16T10:00:00+08:00"
        });

        let request: SendNotificationRequest = serde_json::from_value(json).unwrap();
        let scheduled = request.scheduled_at.unwrap();
        assert_eq!(scheduled.offset().local_minus_utc(), 8 * 3600);

        let notification = Notification::from(request);
        assert_eq!(
            notification.scheduled_at().map(|t| t.to_rfc3339()).as_deref(),
            Some("2026-10-16T10:00:00+08:00")
        );
        assert_eq!(
            serde_json::to_value(&notification).unwrap()["scheduledAt"],
            "2026-10-16T10:00:00+08:00"
        );
    }

    #[test]
    fn test_deserialize_requires_channel() {
        let json = serde_json::json!({ "recipient": "user@example.com" });
        let result: Result<SendNotificationRequest, _> = serde_json::from_value(json);
        assert!(result.is_err());
    }
}
