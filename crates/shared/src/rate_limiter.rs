//! 限流器模块
//!
//! 为发送器装饰器提供"阻塞直到拿到许可"的准入控制原语。调用方只依赖
//! [`RateLimiter`] / [`RateLimiterClient`] 两个 trait，具体算法可替换：
//!
//! - [`RedisRateLimiterClient`]: 基于 Redis INCR + EXPIRE 的固定窗口计数器，多实例共享配额
//! - [`LocalRateLimiterClient`]: 进程内固定窗口，适用于单实例部署和测试
//!
//! 两种实现在窗口配额耗尽时都会等待到下一个窗口边界再重试，没有超时。
//! 需要有界等待的调用方应在外层自行包裹 `tokio::time::timeout`。

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cache::{Cache, CacheKey};
use crate::config::{RateLimitBackend, RedisConfig};
use crate::error::{Result, SharedError};

/// 速率定义：每个窗口允许的许可数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSpec {
    pub permits: u64,
    pub window_ms: u64,
}

impl RateSpec {
    pub fn new(permits: u64, window: Duration) -> Self {
        Self {
            permits,
            // 零长度窗口没有意义，最小 1 毫秒
            window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX).max(1),
        }
    }

    /// 校验后创建，配额为 0 的速率会让 acquire 永远等待
    fn checked(key: &str, permits: u64, window: Duration) -> Result<Self> {
        if permits == 0 {
            return Err(SharedError::Config(::config::ConfigError::Message(format!(
                "限流器 {} 的窗口配额必须大于 0",
                key
            ))));
        }
        Ok(Self::new(permits, window))
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// 单个命名限流器
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// 仅当尚未设置速率时设置，返回是否由本次调用设置成功
    async fn try_set_rate(&self, permits: u64, window: Duration) -> Result<bool>;

    /// 等待直到获得一个许可
    async fn acquire(&self) -> Result<()>;
}

/// 限流器工厂，按名称返回共享的限流器实例
pub trait RateLimiterClient: Send + Sync {
    fn rate_limiter(&self, key: &str) -> Arc<dyn RateLimiter>;
}

/// 根据配置的后端创建限流器工厂
pub fn build_client(
    backend: RateLimitBackend,
    redis: &RedisConfig,
) -> Result<Arc<dyn RateLimiterClient>> {
    match backend {
        RateLimitBackend::Local => Ok(Arc::new(LocalRateLimiterClient::new())),
        RateLimitBackend::Redis => {
            let cache = Cache::new(redis)?;
            Ok(Arc::new(RedisRateLimiterClient::new(cache)))
        }
    }
}

// ---------------------------------------------------------------------------
// 进程内实现
// ---------------------------------------------------------------------------

struct WindowState {
    spec: Option<RateSpec>,
    /// 首次 acquire 时确定，之后按窗口长度对齐推进
    window_start: Option<Instant>,
    used: u64,
}

/// 进程内固定窗口限流器
///
/// 时钟使用 `tokio::time::Instant`，测试中可配合暂停时间精确推进窗口。
pub struct LocalRateLimiter {
    key: String,
    state: Mutex<WindowState>,
}

impl LocalRateLimiter {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: Mutex::new(WindowState {
                spec: None,
                window_start: None,
                used: 0,
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// 尝试在当前窗口占用一个许可，失败时返回需要等待的时长
    fn try_take(&self) -> Result<Option<Duration>> {
        let mut state = self.state.lock();
        let spec = state
            .spec
            .ok_or_else(|| SharedError::RateLimiterNotConfigured {
                key: self.key.clone(),
            })?;

        let window = spec.window();
        let now = Instant::now();
        let mut start = *state.window_start.get_or_insert(now);

        let elapsed = now.duration_since(start);
        if elapsed >= window {
            let window_nanos = window.as_nanos();
            let aligned = elapsed.as_nanos() - elapsed.as_nanos() % window_nanos;
            start += Duration::from_nanos(aligned as u64);
            state.window_start = Some(start);
            state.used = 0;
        }

        if state.used < spec.permits {
            state.used += 1;
            return Ok(None);
        }

        Ok(Some((start + window).duration_since(now)))
    }
}

#[async_trait]
impl RateLimiter for LocalRateLimiter {
    async fn try_set_rate(&self, permits: u64, window: Duration) -> Result<bool> {
        let requested = RateSpec::checked(&self.key, permits, window)?;
        let mut state = self.state.lock();
        if state.spec.is_some() {
            return Ok(false);
        }
        state.spec = Some(requested);
        Ok(true)
    }

    async fn acquire(&self) -> Result<()> {
        loop {
            match self.try_take()? {
                None => return Ok(()),
                Some(wait) => {
                    debug!(limiter = %self.key, wait_ms = wait.as_millis() as u64, "窗口配额耗尽，等待下一窗口");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

/// 进程内限流器工厂
///
/// 相同 key 返回同一个实例，保证同名发送器共享配额。
#[derive(Default)]
pub struct LocalRateLimiterClient {
    limiters: DashMap<String, Arc<LocalRateLimiter>>,
}

impl LocalRateLimiterClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}

impl RateLimiterClient for LocalRateLimiterClient {
    fn rate_limiter(&self, key: &str) -> Arc<dyn RateLimiter> {
        let limiter = self
            .limiters
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(LocalRateLimiter::new(key)))
            .clone();
        limiter
    }
}

// ---------------------------------------------------------------------------
// Redis 实现
// ---------------------------------------------------------------------------

/// 基于 Redis 的分布式固定窗口限流器
///
/// 速率定义以 SET NX 写入 `{key}:config`，首个设置者生效，其余实例读取共享定义。
/// 每个窗口使用独立计数键 `{key}:{window_index}`，INCR 的原子性保证多实例计数准确。
pub struct RedisRateLimiter {
    key: String,
    cache: Cache,
    spec: RwLock<Option<RateSpec>>,
}

impl RedisRateLimiter {
    pub fn new(key: impl Into<String>, cache: Cache) -> Self {
        Self {
            key: key.into(),
            cache,
            spec: RwLock::new(None),
        }
    }

    async fn resolve_spec(&self) -> Result<RateSpec> {
        let cached = *self.spec.read();
        if let Some(spec) = cached {
            return Ok(spec);
        }

        let stored: Option<RateSpec> = self
            .cache
            .get(&CacheKey::rate_limiter_config(&self.key))
            .await?;
        let spec = stored.ok_or_else(|| SharedError::RateLimiterNotConfigured {
            key: self.key.clone(),
        })?;
        *self.spec.write() = Some(spec);
        Ok(spec)
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn try_set_rate(&self, permits: u64, window: Duration) -> Result<bool> {
        let requested = RateSpec::checked(&self.key, permits, window)?;
        let config_key = CacheKey::rate_limiter_config(&self.key);

        let set = self.cache.set_if_absent(&config_key, &requested).await?;
        let effective = if set {
            requested
        } else {
            self.cache
                .get::<RateSpec>(&config_key)
                .await?
                .unwrap_or(requested)
        };

        if effective != requested {
            info!(
                limiter = %self.key,
                permits = effective.permits,
                window_ms = effective.window_ms,
                "沿用已存在的共享速率定义"
            );
        }

        *self.spec.write() = Some(effective);
        Ok(set)
    }

    async fn acquire(&self) -> Result<()> {
        let spec = self.resolve_spec().await?;

        loop {
            let now_ms = epoch_millis();
            let window_index = now_ms / spec.window_ms;
            let counter_key = CacheKey::rate_limiter_window(&self.key, window_index);

            // INCR 在 key 不存在时自动创建并设为 1
            let count = self.cache.incr(&counter_key, 1).await?;
            if count == 1 {
                // 保留两个窗口长度，确保窗口结束后自动清理
                self.cache.expire(&counter_key, spec.window() * 2).await?;
            }

            if count as u64 <= spec.permits {
                return Ok(());
            }

            let wait_ms = (window_index + 1)
                .saturating_mul(spec.window_ms)
                .saturating_sub(now_ms);
            debug!(limiter = %self.key, count, wait_ms, "窗口配额耗尽，等待下一窗口");
            tokio::time::sleep(Duration::from_millis(wait_ms.max(1))).await;
        }
    }
}

/// 基于 Redis 的限流器工厂
pub struct RedisRateLimiterClient {
    cache: Cache,
    limiters: DashMap<String, Arc<RedisRateLimiter>>,
}

impl RedisRateLimiterClient {
    pub fn new(cache: Cache) -> Self {
        Self {
            cache,
            limiters: DashMap::new(),
        }
    }
}

impl RateLimiterClient for RedisRateLimiterClient {
    fn rate_limiter(&self, key: &str) -> Arc<dyn RateLimiter> {
        let limiter = self
            .limiters
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(RedisRateLimiter::new(key, self.cache.clone())))
            .clone();
        limiter
    }
}
