//! 限流发送器装饰
//!
//! 包装任意发送器，在委托发送前向外部限流器申请许可。限流器按
//! `<发送器名称>_rate_limiter` 共享，多个实例使用同一个键时共享配额。
//!
//! - 未配置 `acquire_timeout_ms` 时无限等待许可
//! - 配置后等待超时直接返回 `RATE_LIMIT_EXCEEDED`，不调用被包装的发送器
//! - 限流器本身不可用（如 Redis 断开）时放行请求并记录告警

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use notify_shared::config::RateLimitConfig;
use notify_shared::error::SharedError;
use notify_shared::observability::metrics;
use notify_shared::rate_limiter::{RateLimiter, RateLimiterClient};
use tracing::{info, warn};

use crate::error::NotificationError;
use crate::models::{ErrorCode, Notification, NotificationChannel, NotificationResult};
use crate::sender::NotificationSender;
use crate::validation::ValidableSender;

/// 带分布式限流的发送器
pub struct RateLimitedSender {
    delegate: Arc<dyn NotificationSender>,
    limiter: Arc<dyn RateLimiter>,
    limiter_key: String,
    acquire_timeout: Option<Duration>,
}

impl RateLimitedSender {
    /// 创建限流装饰器，并在限流器上登记速率（已登记时沿用已有速率）
    pub async fn new(
        delegate: Arc<dyn NotificationSender>,
        config: &RateLimitConfig,
        client: &dyn RateLimiterClient,
    ) -> Result<Self, NotificationError> {
        config.validate().map_err(SharedError::from)?;

        let limiter_key = format!("{}_rate_limiter", delegate.provider_name());
        let limiter = client.rate_limiter(&limiter_key);

        let applied = limiter
            .try_set_rate(config.max_requests_per_window, config.window())
            .await?;

        info!(
            limiter = %limiter_key,
            max_requests = config.max_requests_per_window,
            rate = config.rate,
            unit = %config.rate_interval_unit,
            acquire_timeout_ms = ?config.acquire_timeout_ms,
            rate_applied = applied,
            "限流发送器初始化完成"
        );

        Ok(Self {
            delegate,
            limiter,
            limiter_key,
            acquire_timeout: config.acquire_timeout(),
        })
    }

    pub fn limiter_key(&self) -> &str {
        &self.limiter_key
    }

    fn rate_limit_exceeded(&self, notification: &Notification, timeout: Duration) -> NotificationResult {
        NotificationResult::failure(
            Some(notification.id().to_string()),
            Some(self.channel()),
            Some(self.provider_name()),
            ErrorCode::RateLimitExceeded,
            format!(
                "Rate limit permit not acquired within {}ms",
                timeout.as_millis()
            ),
        )
    }
}

#[async_trait]
impl NotificationSender for RateLimitedSender {
    async fn send(
        &self,
        notification: &Notification,
    ) -> Result<NotificationResult, NotificationError> {
        let acquired = match self.acquire_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.limiter.acquire()).await {
                Ok(acquired) => acquired,
                Err(_) => {
                    metrics::record_rate_limiter_acquire(&self.limiter_key, "timeout");
                    warn!(
                        limiter = %self.limiter_key,
                        notification_id = %notification.id(),
                        timeout_ms = timeout.as_millis() as u64,
                        "等待限流许可超时"
                    );
                    return Ok(self.rate_limit_exceeded(notification, timeout));
                }
            },
            None => self.limiter.acquire().await,
        };

        match acquired {
            Ok(()) => metrics::record_rate_limiter_acquire(&self.limiter_key, "acquired"),
            Err(e) => {
                // 限流器异常时放行请求，避免限流组件故障导致发送不可用
                metrics::record_rate_limiter_acquire(&self.limiter_key, "error");
                warn!(limiter = %self.limiter_key, error = %e, "限流检查失败，放行请求");
            }
        }

        self.delegate.send(notification).await
    }

    fn channel(&self) -> NotificationChannel {
        self.delegate.channel()
    }

    fn provider_name(&self) -> String {
        format!("{}[DistributedRateLimited]", self.delegate.provider_name())
    }

    fn as_validable(&self) -> Option<&dyn ValidableSender> {
        self.delegate.as_validable()
    }
}

/// 按配置为一组发送器加上限流装饰
///
/// 未启用限流时原样返回。
pub async fn with_rate_limit(
    senders: Vec<Arc<dyn NotificationSender>>,
    config: &RateLimitConfig,
    client: &dyn RateLimiterClient,
) -> Result<Vec<Arc<dyn NotificationSender>>, NotificationError> {
    if !config.enabled {
        return Ok(senders);
    }

    let mut wrapped: Vec<Arc<dyn NotificationSender>> = Vec::with_capacity(senders.len());
    for sender in senders {
        wrapped.push(Arc::new(RateLimitedSender::new(sender, config, client).await?));
    }
    Ok(wrapped)
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;
    use mockall::mock;
    use notify_shared::config::RateIntervalUnit;
    use notify_shared::rate_limiter::LocalRateLimiterClient;
    use tokio::time::Instant;

    use super::*;
    use crate::test_utils::{StubBehavior, StubSender};
    use crate::validation::ValidationError;

    mock! {
        pub Limiter {}

        #[async_trait]
        impl RateLimiter for Limiter {
            async fn try_set_rate(&self, permits: u64, window: Duration) -> notify_shared::error::Result<bool>;
            async fn acquire(&self) -> notify_shared::error::Result<()>;
        }
    }

    mock! {
        pub Client {}

        impl RateLimiterClient for Client {
            fn rate_limiter(&self, key: &str) -> Arc<dyn RateLimiter>;
        }
    }

    fn client_returning(limiter: MockLimiter, expected_key: &'static str) -> MockClient {
        let limiter: Arc<dyn RateLimiter> = Arc::new(limiter);
        let mut client = MockClient::new();
        client
            .expect_rate_limiter()
            .withf(move |key| key == expected_key)
            .times(1)
            .returning(move |_| limiter.clone());
        client
    }

    #[tokio::test]
    async fn test_construction_registers_rate_under_derived_key() {
        let mut limiter = MockLimiter::new();
        limiter
            .expect_try_set_rate()
            .withf(|permits, window| *permits == 10 && *window == Duration::from_secs(1))
            .times(1)
            .returning(|_, _| Ok(true));
        let client = client_returning(limiter, "SMS_PROVIDER_1_rate_limiter");

        let delegate = StubSender::succeeding(NotificationChannel::Sms, "SMS_PROVIDER_1");
        let sender = RateLimitedSender::new(delegate, &RateLimitConfig::default(), &client)
            .await
            .unwrap();

        assert_eq!(sender.limiter_key(), "SMS_PROVIDER_1_rate_limiter");
        assert_eq!(sender.provider_name(), "SMS_PROVIDER_1[DistributedRateLimited]");
        assert_eq!(sender.channel(), NotificationChannel::Sms);
    }

    #[tokio::test]
    async fn test_send_acquires_then_delegates() {
        let mut limiter = MockLimiter::new();
        limiter.expect_try_set_rate().returning(|_, _| Ok(false));
        limiter.expect_acquire().times(1).returning(|| Ok(()));
        let client = client_returning(limiter, "A_rate_limiter");

        let delegate = StubSender::succeeding(NotificationChannel::Email, "A");
        let sender = RateLimitedSender::new(delegate.clone(), &RateLimitConfig::default(), &client)
            .await
            .unwrap();

        let result = sender.send(&Notification::new("user@example.com")).await.unwrap();
        assert!(result.success);
        // 结果归属由被包装的发送器决定
        assert_eq!(result.provider_name.as_deref(), Some("A"));
        assert_eq!(delegate.send_calls(), 1);
    }

    #[tokio::test]
    async fn test_limiter_error_fails_open() {
        let mut limiter = MockLimiter::new();
        limiter.expect_try_set_rate().returning(|_, _| Ok(true));
        limiter
            .expect_acquire()
            .returning(|| Err(SharedError::Internal("redis down".to_string())));
        let client = client_returning(limiter, "A_rate_limiter");

        let delegate = StubSender::succeeding(NotificationChannel::Email, "A");
        let sender = RateLimitedSender::new(delegate.clone(), &RateLimitConfig::default(), &client)
            .await
            .unwrap();

        let result = sender.send(&Notification::new("user@example.com")).await.unwrap();
        assert!(result.success);
        assert_eq!(delegate.send_calls(), 1);
    }

    #[tokio::test]
    async fn test_try_set_rate_error_propagates() {
        let mut limiter = MockLimiter::new();
        limiter
            .expect_try_set_rate()
            .returning(|_, _| Err(SharedError::Internal("redis down".to_string())));
        let client = client_returning(limiter, "A_rate_limiter");

        let delegate = StubSender::succeeding(NotificationChannel::Email, "A");
        let result = RateLimitedSender::new(delegate, &RateLimitConfig::default(), &client).await;
        assert!(matches!(result, Err(NotificationError::Shared(_))));
    }

    #[tokio::test]
    async fn test_zero_permits_rejected_before_touching_limiter() {
        let mut client = MockClient::new();
        client.expect_rate_limiter().never();

        let delegate = StubSender::succeeding(NotificationChannel::Sms, "SMS_PROVIDER_1");
        let config = RateLimitConfig::of(0, 1, RateIntervalUnit::Seconds);
        let result = RateLimitedSender::new(delegate.clone(), &config, &client).await;

        match result {
            Err(NotificationError::Shared(e)) => assert_eq!(e.code(), "CONFIG_ERROR"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("配额为 0 的限流配置应被拒绝"),
        }
        assert_eq!(delegate.send_calls(), 0);
    }

    #[tokio::test]
    async fn test_with_rate_limit_rejects_zero_permits() {
        let client = LocalRateLimiterClient::new();
        let sender: Arc<dyn NotificationSender> =
            StubSender::succeeding(NotificationChannel::Email, "A");
        let config = RateLimitConfig {
            enabled: true,
            ..RateLimitConfig::of(0, 1, RateIntervalUnit::Seconds)
        };

        assert!(with_rate_limit(vec![sender], &config, &client).await.is_err());
        assert!(client.is_empty());
    }

    #[tokio::test]
    async fn test_forwards_validation_capability() {
        let client = LocalRateLimiterClient::new();
        let plain = StubSender::succeeding(NotificationChannel::Email, "plain");
        let validating = Arc::new(
            StubSender::new(NotificationChannel::Email, "strict", StubBehavior::Succeed)
                .rejecting(vec![ValidationError::new("body", "too long")]),
        );

        let plain = RateLimitedSender::new(plain, &RateLimitConfig::default(), &client)
            .await
            .unwrap();
        let strict = RateLimitedSender::new(validating, &RateLimitConfig::default(), &client)
            .await
            .unwrap();

        assert!(plain.as_validable().is_none());
        let errors = strict
            .as_validable()
            .map(|v| v.validate(&Notification::new("x")))
            .unwrap();
        assert_eq!(errors[0].code, "BODY");
    }

    #[tokio::test(start_paused = true)]
    async fn test_extra_call_waits_for_next_window() {
        let client = LocalRateLimiterClient::new();
        let config = RateLimitConfig::of(3, 1, RateIntervalUnit::Seconds);
        let delegate = StubSender::succeeding(NotificationChannel::Sms, "SMS_PROVIDER_1");
        let sender = RateLimitedSender::new(delegate.clone(), &config, &client)
            .await
            .unwrap();
        let notification = Notification::new("+1234567890").with_body("hi");

        let start = Instant::now();
        for _ in 0..3 {
            assert!(sender.send(&notification).await.unwrap().success);
        }
        assert!(start.elapsed() < Duration::from_secs(1));

        assert!(sender.send(&notification).await.unwrap().success);
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert_eq!(delegate.send_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_sends_share_one_window_quota() {
        let client = LocalRateLimiterClient::new();
        let config = RateLimitConfig::of(3, 1, RateIntervalUnit::Seconds);
        let delegate = StubSender::succeeding(NotificationChannel::Sms, "SMS_PROVIDER_1");
        let sender = Arc::new(
            RateLimitedSender::new(delegate.clone(), &config, &client)
                .await
                .unwrap(),
        );
        let notification = Notification::new("+1234567890").with_body("hi");

        let start = Instant::now();
        let sends = (0..4).map(|_| {
            let sender = Arc::clone(&sender);
            let notification = notification.clone();
            async move {
                let result = sender.send(&notification).await.unwrap();
                (result.success, start.elapsed())
            }
        });
        let finished = join_all(sends).await;

        assert!(finished.iter().all(|(success, _)| *success));
        let before_boundary = finished
            .iter()
            .filter(|(_, elapsed)| *elapsed < Duration::from_secs(1))
            .count();
        assert_eq!(before_boundary, 3);
        let last = finished.iter().map(|(_, elapsed)| *elapsed).max().unwrap();
        assert!(last >= Duration::from_secs(1));
        assert_eq!(delegate.send_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_wait_returns_rate_limit_exceeded() {
        let client = LocalRateLimiterClient::new();
        let config = RateLimitConfig::of(1, 10, RateIntervalUnit::Seconds)
            .with_acquire_timeout(Duration::from_millis(200));
        let delegate = StubSender::succeeding(NotificationChannel::Push, "PUSH_PROVIDER_1");
        let sender = RateLimitedSender::new(delegate.clone(), &config, &client)
            .await
            .unwrap();
        let notification = Notification::new("token").with_body("hi");

        assert!(sender.send(&notification).await.unwrap().success);

        let result = sender.send(&notification).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error_code, Some(ErrorCode::RateLimitExceeded));
        assert_eq!(result.notification_id.as_deref(), Some(notification.id()));
        assert_eq!(
            result.provider_name.as_deref(),
            Some("PUSH_PROVIDER_1[DistributedRateLimited]")
        );
        assert_eq!(delegate.send_calls(), 1);
    }

    #[tokio::test]
    async fn test_decorators_compose() {
        let client = LocalRateLimiterClient::new();
        let delegate = StubSender::succeeding(NotificationChannel::Email, "A");
        let inner: Arc<dyn NotificationSender> = Arc::new(
            RateLimitedSender::new(delegate, &RateLimitConfig::default(), &client)
                .await
                .unwrap(),
        );
        let outer = RateLimitedSender::new(inner, &RateLimitConfig::default(), &client)
            .await
            .unwrap();

        assert_eq!(
            outer.provider_name(),
            "A[DistributedRateLimited][DistributedRateLimited]"
        );
        assert_eq!(outer.limiter_key(), "A[DistributedRateLimited]_rate_limiter");
        assert!(outer.send(&Notification::new("a@b.co")).await.unwrap().success);
        assert_eq!(client.len(), 2);
    }

    #[tokio::test]
    async fn test_with_rate_limit_respects_enabled_flag() {
        let client = LocalRateLimiterClient::new();
        let email: Arc<dyn NotificationSender> = StubSender::succeeding(NotificationChannel::Email, "A");
        let sms: Arc<dyn NotificationSender> = StubSender::succeeding(NotificationChannel::Sms, "B");
        let senders = vec![email, sms];

        let untouched = with_rate_limit(senders.clone(), &RateLimitConfig::default(), &client)
            .await
            .unwrap();
        assert_eq!(untouched[0].provider_name(), "A");
        assert!(client.is_empty());

        let config = RateLimitConfig {
            enabled: true,
            ..RateLimitConfig::default()
        };
        let wrapped = with_rate_limit(senders, &config, &client).await.unwrap();
        let names: Vec<_> = wrapped.iter().map(|s| s.provider_name()).collect();
        assert_eq!(
            names,
            vec!["A[DistributedRateLimited]", "B[DistributedRateLimited]"]
        );
        assert_eq!(wrapped[1].channel(), NotificationChannel::Sms);
    }
}
