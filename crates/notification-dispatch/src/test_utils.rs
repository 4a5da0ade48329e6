//! 测试工具模块
//!
//! 提供可编程的桩发送器和测试数据生成器，供单元测试与集成测试共用。

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::dto::SendNotificationRequest;
use crate::error::NotificationError;
use crate::models::{ErrorCode, Notification, NotificationChannel, NotificationResult};
use crate::sender::NotificationSender;
use crate::validation::{ValidableSender, ValidationError};

// ==================== 桩发送器 ====================

/// 桩发送器被调用时的行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubBehavior {
    /// 返回成功结果
    Succeed,
    /// 返回 `success = false` 的结果
    Fail,
    /// 返回 `Err`
    Error,
    /// 直接 panic
    Panic,
}

/// 可编程桩发送器
///
/// 记录 `send` / `validate` 的调用次数以及收到的通知，便于断言故障转移路径。
pub struct StubSender {
    channel: NotificationChannel,
    name: String,
    behavior: StubBehavior,
    /// None 表示不具备校验能力
    validation_errors: Option<Vec<ValidationError>>,
    send_calls: AtomicUsize,
    validate_calls: AtomicUsize,
    received: Mutex<Vec<Notification>>,
}

impl StubSender {
    pub fn new(channel: NotificationChannel, name: impl Into<String>, behavior: StubBehavior) -> Self {
        Self {
            channel,
            name: name.into(),
            behavior,
            validation_errors: None,
            send_calls: AtomicUsize::new(0),
            validate_calls: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(channel: NotificationChannel, name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(channel, name, StubBehavior::Succeed))
    }

    pub fn failing(channel: NotificationChannel, name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(channel, name, StubBehavior::Fail))
    }

    pub fn erroring(channel: NotificationChannel, name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(channel, name, StubBehavior::Error))
    }

    pub fn panicking(channel: NotificationChannel, name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(channel, name, StubBehavior::Panic))
    }

    /// 具备校验能力且总是通过
    pub fn validating(mut self) -> Self {
        self.validation_errors = Some(Vec::new());
        self
    }

    /// 具备校验能力且总是拒绝
    pub fn rejecting(mut self, errors: Vec<ValidationError>) -> Self {
        self.validation_errors = Some(errors);
        self
    }

    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    /// 收到的所有通知（按调用顺序）
    pub fn received(&self) -> Vec<Notification> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl NotificationSender for StubSender {
    async fn send(
        &self,
        notification: &Notification,
    ) -> Result<NotificationResult, NotificationError> {
        let call = self.send_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.received.lock().push(notification.clone());

        match self.behavior {
            StubBehavior::Succeed => Ok(NotificationResult::success(
                notification.id(),
                format!("{}-msg-{}", self.name, call),
                self.channel,
                self.name.clone(),
            )),
            StubBehavior::Fail => Ok(NotificationResult::failure(
                Some(notification.id().to_string()),
                Some(self.channel),
                Some(self.name.clone()),
                ErrorCode::UnknownError,
                format!("{} rejected the message", self.name),
            )),
            StubBehavior::Error => Err(NotificationError::send_failed(&self.name, "gateway unavailable")),
            StubBehavior::Panic => panic!("{} panicked while sending", self.name),
        }
    }

    fn channel(&self) -> NotificationChannel {
        self.channel
    }

    fn provider_name(&self) -> String {
        self.name.clone()
    }

    fn as_validable(&self) -> Option<&dyn ValidableSender> {
        self.validation_errors.as_ref().map(|_| self as &dyn ValidableSender)
    }
}

impl ValidableSender for StubSender {
    fn validate(&self, _notification: &Notification) -> Vec<ValidationError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        self.validation_errors.clone().unwrap_or_default()
    }
}

// ==================== 测试数据生成器 ====================

/// 能通过邮件发送器校验的请求
pub fn email_request() -> SendNotificationRequest {
    SendNotificationRequest {
        subject: Some("Welcome!".to_string()),
        body: Some("Thanks for signing up.".to_string()),
        ..SendNotificationRequest::new(NotificationChannel::Email, "user@example.com")
    }
}

/// 能通过短信发送器校验的请求
pub fn sms_request() -> SendNotificationRequest {
    SendNotificationRequest {
        body: Some("Your verification code is 123456".to_string()),
        ..SendNotificationRequest::new(NotificationChannel::Sms, "+1234567890")
    }
}

/// 能通过推送发送器校验的请求
pub fn push_request() -> SendNotificationRequest {
    SendNotificationRequest {
        subject: Some("New message".to_string()),
        body: Some("You have a new message".to_string()),
        ..SendNotificationRequest::new(NotificationChannel::Push, test_device_token())
    }
}

/// 长度满足 FCM 要求的设备 token
pub fn test_device_token() -> String {
    format!("fcm-token-{}", "x".repeat(120))
}
