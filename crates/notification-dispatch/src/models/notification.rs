//! 通知实体
//!
//! 渠道无关的投递载荷，由请求投影而来，在一次分发中不可变地传给每个候选发送器。

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::Priority;
use crate::dto::SendNotificationRequest;

/// 通知
///
/// `id` 在创建时生成（UUID v4），同一请求分发两次会得到两个不同的 id。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    id: String,
    recipient: String,
    subject: Option<String>,
    body: Option<String>,
    template_id: Option<String>,
    template_variables: HashMap<String, serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
    priority: Priority,
    created_at: DateTime<Utc>,
    scheduled_at: Option<DateTime<FixedOffset>>,
    ttl_seconds: Option<u32>,
    from: Option<String>,
    reply_to: Option<String>,
}

impl Notification {
    pub fn new(recipient: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            recipient: recipient.into(),
            subject: None,
            body: None,
            template_id: None,
            template_variables: HashMap::new(),
            metadata: HashMap::new(),
            priority: Priority::default(),
            created_at: Utc::now(),
            scheduled_at: None,
            ttl_seconds: None,
            from: None,
            reply_to: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_template(
        mut self,
        template_id: impl Into<String>,
        variables: HashMap<String, serde_json::Value>,
    ) -> Self {
        self.template_id = Some(template_id.into());
        self.template_variables = variables;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn template_id(&self) -> Option<&str> {
        self.template_id.as_deref()
    }

    pub fn template_variables(&self) -> &HashMap<String, serde_json::Value> {
        &self.template_variables
    }

    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn scheduled_at(&self) -> Option<DateTime<FixedOffset>> {
        self.scheduled_at
    }

    pub fn ttl_seconds(&self) -> Option<u32> {
        self.ttl_seconds
    }

    /// 发件人地址
    pub fn from_address(&self) -> Option<&str> {
        self.from.as_deref()
    }

    pub fn reply_to(&self) -> Option<&str> {
        self.reply_to.as_deref()
    }
}

impl From<SendNotificationRequest> for Notification {
    fn from(request: SendNotificationRequest) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            recipient: request.recipient,
            subject: request.subject,
            body: request.body,
            template_id: request.template_id,
            template_variables: request.template_variables,
            metadata: request.metadata,
            priority: request.priority.unwrap_or_default(),
            created_at: Utc::now(),
            scheduled_at: request.scheduled_at,
            ttl_seconds: request.ttl_seconds,
            from: request.from,
            reply_to: request.reply_to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NotificationChannel;

    #[test]
    fn test_from_request_copies_every_field() {
        let scheduled = Utc::now().fixed_offset();
        let request = SendNotificationRequest {
            subject: Some("Welcome".to_string()),
            body: Some("Hello".to_string()),
            template_id: Some("tpl-welcome".to_string()),
            template_variables: HashMap::from([("name".to_string(), serde_json::json!("Ann"))]),
            metadata: HashMap::from([("source".to_string(), serde_json::json!("signup"))]),
            priority: Some(Priority::High),
            scheduled_at: Some(scheduled),
            ttl_seconds: Some(60),
            from: Some("noreply@example.com".to_string()),
            reply_to: Some("support@example.com".to_string()),
            ..SendNotificationRequest::new(NotificationChannel::Email, "user@example.com")
        };

        let before = Utc::now();
        let notification = Notification::from(request);

        assert!(!notification.id().is_empty());
        assert_eq!(notification.recipient(), "user@example.com");
        assert_eq!(notification.subject(), Some("Welcome"));
        assert_eq!(notification.body(), Some("Hello"));
        assert_eq!(notification.template_id(), Some("tpl-welcome"));
        assert_eq!(notification.template_variables()["name"], "Ann");
        assert_eq!(notification.metadata()["source"], "signup");
        assert_eq!(notification.priority(), Priority::High);
        assert_eq!(notification.scheduled_at(), Some(scheduled));
        assert_eq!(notification.ttl_seconds(), Some(60));
        assert_eq!(notification.from_address(), Some("noreply@example.com"));
        assert_eq!(notification.reply_to(), Some("support@example.com"));
        assert!(notification.created_at() >= before);
    }

    #[test]
    fn test_missing_priority_defaults_to_normal() {
        let request = SendNotificationRequest::new(NotificationChannel::Sms, "+1234567890");
        let notification = Notification::from(request);
        assert_eq!(notification.priority(), Priority::Normal);
        assert!(notification.template_variables().is_empty());
    }

    #[test]
    fn test_each_projection_gets_fresh_id() {
        let request = SendNotificationRequest::new(NotificationChannel::Push, "token");
        let first = Notification::from(request.clone());
        let second = Notification::from(request);
        assert_ne!(first.id(), second.id());
        assert!(Uuid::parse_str(first.id()).is_ok());
    }

    #[test]
    fn test_builder_methods() {
        let notification = Notification::new("user@example.com")
            .with_subject("Hi")
            .with_body("Body")
            .with_metadata("k", serde_json::json!(1))
            .with_priority(Priority::Low);

        assert_eq!(notification.subject(), Some("Hi"));
        assert_eq!(notification.body(), Some("Body"));
        assert_eq!(notification.metadata()["k"], 1);
        assert_eq!(notification.priority(), Priority::Low);
    }
}
