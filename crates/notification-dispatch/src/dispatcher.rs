//! 分发引擎
//!
//! 把渠道无关的请求投影为 [`Notification`]，按注册顺序在该渠道的发送器间
//! 做校验驱动的故障转移：
//!
//! 1. 具备校验能力的发送器先校验，不通过则记录日志并跳过，不调用 `send`
//! 2. 第一个返回成功的发送器胜出，后续候选不再尝试
//! 3. 发送失败或返回 `Err` 都视为该发送器本次分发的终态，继续下一个
//! 4. 没有任何成功时返回汇总失败 `PROVIDER_NOT_FOUND`
//!
//! 引擎本身不重试、不排队；`send` 只在限流装饰器获取许可时挂起。

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use notify_shared::observability::metrics;
use serde_json::{Value, json};
use tokio::runtime::Handle;
use tracing::{error, info, instrument, warn};

use crate::dto::SendNotificationRequest;
use crate::models::{ErrorCode, Notification, NotificationChannel, NotificationResult};
use crate::registry::SenderRegistry;

/// 所有候选发送器都失败时的错误信息
pub const ALL_SENDERS_FAILED: &str = "All senders failed";

/// 通知发送入站端口
#[async_trait]
pub trait SendNotificationCommand: Send + Sync {
    /// 同步分发，预期内的失败都以结果返回
    async fn send(&self, request: SendNotificationRequest) -> NotificationResult;

    /// 即发即弃：在给定运行时上调度 `send`，调用方拿不到结果，
    /// 结果和 panic 只会被记录到日志
    fn send_async(&self, request: SendNotificationRequest, handle: &Handle);
}

/// 通知分发引擎
///
/// 内部只持有只读注册表的 `Arc`，克隆开销很小，可在任务间自由传递。
#[derive(Clone)]
pub struct NotificationDispatcher {
    registry: Arc<SenderRegistry>,
}

impl NotificationDispatcher {
    pub fn new(registry: SenderRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &SenderRegistry {
        &self.registry
    }

    async fn dispatch(
        &self,
        channel: NotificationChannel,
        notification: &Notification,
    ) -> NotificationResult {
        let candidates = self.registry.get(channel);
        if candidates.is_empty() {
            warn!(
                notification_id = %notification.id(),
                channel = %channel,
                "渠道未配置任何发送器"
            );
            return NotificationResult::failure(
                None,
                Some(channel),
                None,
                ErrorCode::ChannelNotConfigured,
                format!("No sender configured for channel: {}", channel),
            );
        }

        let mut attempts: Vec<Value> = Vec::with_capacity(candidates.len());

        for sender in candidates {
            let provider = sender.provider_name();

            if let Some(validable) = sender.as_validable() {
                let errors = validable.validate(notification);
                if !errors.is_empty() {
                    warn!(
                        notification_id = %notification.id(),
                        provider = %provider,
                        errors = ?errors,
                        "发送器校验未通过，跳过"
                    );
                    metrics::record_validation_rejection(&provider);
                    attempts.push(json!({
                        "provider": provider,
                        "outcome": "VALIDATION_REJECTED",
                        "errors": errors,
                    }));
                    continue;
                }
            }

            match sender.send(notification).await {
                Ok(result) if result.success => {
                    metrics::record_provider_attempt(&provider, "success");
                    info!(
                        notification_id = %notification.id(),
                        provider = %provider,
                        provider_message_id = ?result.provider_message_id,
                        "通知发送成功"
                    );
                    return result;
                }
                Ok(result) => {
                    metrics::record_provider_attempt(&provider, "failure");
                    warn!(
                        notification_id = %notification.id(),
                        provider = %provider,
                        error_code = ?result.error_code,
                        error = ?result.error_message,
                        "发送器返回失败，尝试下一个发送器"
                    );
                    attempts.push(json!({
                        "provider": provider,
                        "outcome": "SEND_FAILED",
                        "errorCode": result.error_code,
                        "errorMessage": result.error_message,
                    }));
                }
                Err(e) => {
                    metrics::record_provider_attempt(&provider, "error");
                    error!(
                        notification_id = %notification.id(),
                        provider = %provider,
                        error = %e,
                        "发送器调用出错，尝试下一个发送器"
                    );
                    attempts.push(json!({
                        "provider": provider,
                        "outcome": "SEND_FAILED",
                        "errorCode": ErrorCode::UnknownError,
                        "errorMessage": e.to_string(),
                    }));
                }
            }
        }

        warn!(
            notification_id = %notification.id(),
            channel = %channel,
            attempts = attempts.len(),
            "所有发送器均未成功"
        );

        NotificationResult::failure(
            Some(notification.id().to_string()),
            Some(channel),
            None,
            ErrorCode::ProviderNotFound,
            ALL_SENDERS_FAILED,
        )
        .with_provider_response("attempts", Value::Array(attempts))
    }
}

fn outcome_label(result: &NotificationResult) -> &'static str {
    match result.error_code {
        None => "success",
        Some(code) => code.as_str(),
    }
}

#[async_trait]
impl SendNotificationCommand for NotificationDispatcher {
    #[instrument(skip(self, request), fields(channel = %request.channel))]
    async fn send(&self, request: SendNotificationRequest) -> NotificationResult {
        let started = Instant::now();
        let channel = request.channel;
        let notification = Notification::from(request);

        let result = self.dispatch(channel, &notification).await;

        metrics::record_dispatch(
            channel.as_str(),
            outcome_label(&result),
            started.elapsed().as_secs_f64(),
        );
        result
    }

    fn send_async(&self, request: SendNotificationRequest, handle: &Handle) {
        let dispatcher = self.clone();
        let channel = request.channel;
        let task = handle.spawn(async move { dispatcher.send(request).await });

        handle.spawn(async move {
            match task.await {
                Ok(result) if result.success => info!(
                    channel = %channel,
                    notification_id = ?result.notification_id,
                    provider = ?result.provider_name,
                    "异步通知发送成功"
                ),
                Ok(result) => warn!(
                    channel = %channel,
                    notification_id = ?result.notification_id,
                    error_code = ?result.error_code,
                    error = ?result.error_message,
                    "异步通知发送失败"
                ),
                Err(e) if e.is_panic() => error!(
                    channel = %channel,
                    error = %e,
                    "异步通知发送任务 panic"
                ),
                Err(e) => warn!(channel = %channel, error = %e, "异步通知发送任务被取消"),
            }
        });
    }
}
