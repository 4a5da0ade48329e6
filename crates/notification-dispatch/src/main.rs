//! 通知分发服务
//!
//! 组装四个模拟发送器（可选限流），依次演示邮件、短信、推送的同步分发，
//! 以及一次邮件主通道校验失败后转移到备用通道的异步分发。

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use notification_dispatch::providers::{
    MockEmailFallback, MockEmailSender, MockPushSender, MockSmsSender,
};
use notification_dispatch::models::NotificationChannel;
use notification_dispatch::rate_limit::with_rate_limit;
use notification_dispatch::{
    NotificationSender, SendNotificationCommand, SendNotificationRequest, SenderRegistry,
};
use notify_shared::config::AppConfig;
use notify_shared::observability;
use notify_shared::rate_limiter::build_client;
use tokio::runtime::Handle;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("notification-dispatch")?;
    let _guard = observability::init(&config.observability).await?;

    info!(
        environment = %config.environment,
        rate_limit_enabled = config.rate_limit.enabled,
        "Starting notification-dispatch..."
    );

    // 注册顺序即故障转移顺序
    let senders: Vec<Arc<dyn NotificationSender>> = vec![
        Arc::new(MockEmailSender::new()),
        Arc::new(MockEmailFallback),
        Arc::new(MockSmsSender::new()),
        Arc::new(MockPushSender),
    ];
    let limiter_client = build_client(config.rate_limit.backend, &config.redis)?;
    let senders = with_rate_limit(senders, &config.rate_limit, limiter_client.as_ref()).await?;

    let dispatcher = SenderRegistry::builder().providers(senders).build();

    // FCM token 至少 100 个字符
    let device_token = format!("fcm-demo-{}", "a1b2c3d4".repeat(16));

    let requests = vec![
        SendNotificationRequest {
            subject: Some("Welcome!".to_string()),
            body: Some("Thanks for joining us.".to_string()),
            ..SendNotificationRequest::new(NotificationChannel::Email, "user@example.com")
        },
        SendNotificationRequest {
            body: Some("Your verification code is 123456".to_string()),
            ..SendNotificationRequest::new(NotificationChannel::Sms, "+1234567890")
        },
        SendNotificationRequest {
            subject: Some("New message".to_string()),
            body: Some("You have a new message".to_string()),
            ..SendNotificationRequest::new(NotificationChannel::Push, device_token)
        },
    ];

    let mut accepted = Vec::with_capacity(requests.len());
    for request in requests {
        match request.check() {
            Ok(()) => accepted.push(request),
            Err(rejection) => warn!(
                channel = %request.channel,
                error = ?rejection.error_message,
                "请求校验失败，跳过发送"
            ),
        }
    }

    let results = join_all(accepted.into_iter().map(|request| dispatcher.send(request))).await;
    for result in &results {
        let payload = serde_json::to_string(result)?;
        info!(
            success = result.success,
            channel = ?result.channel,
            provider = ?result.provider_name,
            result = %payload,
            "分发完成"
        );
    }

    // 非法邮箱会被主通道拒绝，由备用通道完成发送
    dispatcher.send_async(
        SendNotificationRequest {
            body: Some("Routed through the fallback provider".to_string()),
            ..SendNotificationRequest::new(NotificationChannel::Email, "not-an-email")
        },
        &Handle::current(),
    );
    tokio::time::sleep(Duration::from_millis(200)).await;

    info!("notification-dispatch finished");
    Ok(())
}
