//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use std::net::SocketAddr;
use std::sync::OnceLock;

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    _server_handle: tokio::task::JoinHandle<()>,
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    // 保存到全局，供其他地方获取指标快照
    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle {
        _server_handle: server_handle,
    })
}

/// 注册通用指标描述
///
/// 这些描述会出现在 /metrics 端点的 HELP 注释中
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!(
        "notification_dispatch_total",
        "Total number of notification dispatches"
    );
    metrics::describe_histogram!(
        "notification_dispatch_duration_seconds",
        "Notification dispatch duration in seconds"
    );
    metrics::describe_counter!(
        "notification_provider_attempts_total",
        "Total number of provider send attempts"
    );
    metrics::describe_counter!(
        "notification_validation_rejections_total",
        "Total number of notifications rejected by provider validation"
    );
    metrics::describe_counter!(
        "rate_limiter_acquire_total",
        "Total number of rate limiter permit acquisitions"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 指标记录函数
// ============================================================================

/// 记录一次完整的分发
#[inline]
pub fn record_dispatch(channel: &str, outcome: &str, duration_secs: f64) {
    metrics::counter!(
        "notification_dispatch_total",
        "channel" => channel.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "notification_dispatch_duration_seconds",
        "channel" => channel.to_string()
    )
    .record(duration_secs);
}

/// 记录单个发送器的一次发送尝试
#[inline]
pub fn record_provider_attempt(provider: &str, outcome: &str) {
    metrics::counter!(
        "notification_provider_attempts_total",
        "provider" => provider.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// 记录发送器校验拒绝
#[inline]
pub fn record_validation_rejection(provider: &str) {
    metrics::counter!(
        "notification_validation_rejections_total",
        "provider" => provider.to_string()
    )
    .increment(1);
}

/// 记录限流许可获取结果
#[inline]
pub fn record_rate_limiter_acquire(limiter: &str, outcome: &str) {
    metrics::counter!(
        "rate_limiter_acquire_total",
        "limiter" => limiter.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
