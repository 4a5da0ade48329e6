//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::observability::ObservabilityConfig;

/// Redis 配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
        }
    }
}

/// 限流器后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitBackend {
    /// 进程内固定窗口，仅适用于单实例
    #[default]
    Local,
    /// 基于 Redis 的分布式固定窗口，多实例共享配额
    Redis,
}

/// 限流时间单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateIntervalUnit {
    Milliseconds,
    #[default]
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl RateIntervalUnit {
    /// 将 `amount` 个单位换算为 Duration，溢出时取上限
    pub fn to_duration(self, amount: u64) -> Duration {
        match self {
            Self::Milliseconds => Duration::from_millis(amount),
            Self::Seconds => Duration::from_secs(amount),
            Self::Minutes => Duration::from_secs(amount.saturating_mul(60)),
            Self::Hours => Duration::from_secs(amount.saturating_mul(3_600)),
            Self::Days => Duration::from_secs(amount.saturating_mul(86_400)),
        }
    }
}

impl std::fmt::Display for RateIntervalUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Milliseconds => write!(f, "MILLISECONDS"),
            Self::Seconds => write!(f, "SECONDS"),
            Self::Minutes => write!(f, "MINUTES"),
            Self::Hours => write!(f, "HOURS"),
            Self::Days => write!(f, "DAYS"),
        }
    }
}

/// 分布式限流配置
///
/// 窗口长度 = `rate` × `rate_interval_unit`，窗口内最多放行
/// `max_requests_per_window` 个请求。默认值即每秒 10 个请求。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// 是否为发送器启用限流装饰
    pub enabled: bool,
    pub backend: RateLimitBackend,
    pub max_requests_per_window: u64,
    pub rate_interval_unit: RateIntervalUnit,
    pub rate: u64,
    /// 获取许可的最长等待时间，为空表示无限等待
    pub acquire_timeout_ms: Option<u64>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: RateLimitBackend::Local,
            max_requests_per_window: 10,
            rate_interval_unit: RateIntervalUnit::Seconds,
            rate: 1,
            acquire_timeout_ms: None,
        }
    }
}

impl RateLimitConfig {
    pub fn of(max_requests_per_window: u64, rate: u64, unit: RateIntervalUnit) -> Self {
        Self {
            max_requests_per_window,
            rate,
            rate_interval_unit: unit,
            ..Default::default()
        }
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// 固定窗口长度，`rate` 为 0 时按 1 处理
    pub fn window(&self) -> Duration {
        self.rate_interval_unit.to_duration(self.rate.max(1))
    }

    pub fn acquire_timeout(&self) -> Option<Duration> {
        self.acquire_timeout_ms.map(Duration::from_millis)
    }

    /// 校验限流参数
    ///
    /// 窗口配额为 0 时任何请求都拿不到许可，直接拒绝该配置。
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests_per_window == 0 {
            return Err(ConfigError::Message(
                "rate_limit.max_requests_per_window 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service_name: String,
    pub environment: String,
    pub redis: RedisConfig,
    pub rate_limit: RateLimitConfig,
    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "notification-dispatch".to_string(),
            environment: "development".to_string(),
            redis: RedisConfig::default(),
            rate_limit: RateLimitConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. config/{service_name}.toml（服务特定配置）
    /// 4. 环境变量（NOTIFY__ 前缀，如 NOTIFY__RATE_LIMIT__ENABLED -> rate_limit.enabled）
    pub fn load(service_name: &str) -> Result<Self, ConfigError> {
        // .env 不存在时忽略
        let _ = dotenvy::dotenv();

        let env = std::env::var("NOTIFY_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        let builder = Config::builder()
            .set_default("service_name", service_name)?
            .set_default("environment", env.clone())?
            .add_source(File::from(Path::new(&config_dir).join("default.toml")).required(false))
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", env))).required(false),
            )
            .add_source(
                File::from(Path::new(&config_dir).join(format!("{}.toml", service_name)))
                    .required(false),
            )
            .add_source(
                Environment::with_prefix("NOTIFY")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;
        if config.rate_limit.enabled {
            config.rate_limit.validate()?;
        }
        // 指标与日志中的服务名始终跟随应用服务名
        config.observability.service_name = config.service_name.clone();
        Ok(config)
    }
}
