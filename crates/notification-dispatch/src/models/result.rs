//! 发送结果
//!
//! 发送器与分发引擎共用同一结果类型。失败结果的 `error_code` 总是有值，
//! 成功结果的 `error_code` / `error_message` 总是为空。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ErrorCode, NotificationChannel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResult {
    pub success: bool,
    pub notification_id: Option<String>,
    /// 外部服务商返回的消息标识
    pub provider_message_id: Option<String>,
    pub channel: Option<NotificationChannel>,
    pub provider_name: Option<String>,
    pub error_code: Option<ErrorCode>,
    pub error_message: Option<String>,
    pub processed_at: DateTime<Utc>,
    #[serde(default)]
    pub provider_response: HashMap<String, serde_json::Value>,
}

impl NotificationResult {
    pub fn success(
        notification_id: impl Into<String>,
        provider_message_id: impl Into<String>,
        channel: NotificationChannel,
        provider_name: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            notification_id: Some(notification_id.into()),
            provider_message_id: Some(provider_message_id.into()),
            channel: Some(channel),
            provider_name: Some(provider_name.into()),
            error_code: None,
            error_message: None,
            processed_at: Utc::now(),
            provider_response: HashMap::new(),
        }
    }

    pub fn failure(
        notification_id: Option<String>,
        channel: Option<NotificationChannel>,
        provider_name: Option<String>,
        error_code: ErrorCode,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            notification_id,
            provider_message_id: None,
            channel,
            provider_name,
            error_code: Some(error_code),
            error_message: Some(error_message.into()),
            processed_at: Utc::now(),
            provider_response: HashMap::new(),
        }
    }

    /// 请求边界校验失败，此时通知尚未创建
    pub fn validation_failure(
        notification_id: Option<String>,
        channel: Option<NotificationChannel>,
        error_message: impl Into<String>,
    ) -> Self {
        Self::failure(
            notification_id,
            channel,
            None,
            ErrorCode::ValidationError,
            error_message,
        )
    }

    pub fn with_provider_response(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.provider_response.insert(key.into(), value);
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_result() {
        let result = NotificationResult::success(
            "n-1",
            "msg-1",
            NotificationChannel::Email,
            "EMAIL_PROVIDER_1",
        );
        assert!(result.is_success());
        assert_eq!(result.notification_id.as_deref(), Some("n-1"));
        assert_eq!(result.provider_message_id.as_deref(), Some("msg-1"));
        assert!(result.error_code.is_none());
        assert!(result.error_message.is_none());
    }

    #[test]
    fn test_failure_result_carries_code() {
        let result = NotificationResult::failure(
            Some("n-1".to_string()),
            Some(NotificationChannel::Sms),
            Some("SMS_PROVIDER_1".to_string()),
            ErrorCode::UnknownError,
            "timeout",
        )
        .with_provider_response("status", serde_json::json!(504));

        assert!(!result.is_success());
        assert_eq!(result.error_code, Some(ErrorCode::UnknownError));
        assert_eq!(result.error_message.as_deref(), Some("timeout"));
        assert!(result.provider_message_id.is_none());
        assert_eq!(result.provider_response["status"], 504);
    }

    #[test]
    fn test_serialize_camel_case() {
        let result = NotificationResult::validation_failure(None, None, "recipient: Recipient is required");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["errorCode"], "VALIDATION_ERROR");
        assert_eq!(json["success"], false);
        assert!(json["notificationId"].is_null());
    }
}
