//! 统一错误处理模块
//!
//! 定义共享基础设施（配置、Redis、限流器）的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 共享基础设施错误类型
#[derive(Debug, Error)]
pub enum SharedError {
    // ==================== 缓存错误 ====================
    #[error("Redis 错误: {0}")]
    Redis(#[from] redis::RedisError),

    // ==================== 配置错误 ====================
    #[error("配置错误: {0}")]
    Config(#[from] config::ConfigError),

    // ==================== 限流错误 ====================
    #[error("限流器未配置速率: {key}")]
    RateLimiterNotConfigured { key: String },

    // ==================== 通用错误 ====================
    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, SharedError>;

impl SharedError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Redis(_) => "REDIS_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::RateLimiterNotConfigured { .. } => "RATE_LIMITER_NOT_CONFIGURED",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = SharedError::RateLimiterNotConfigured {
            key: "EMAIL_PROVIDER_1_rate_limiter".to_string(),
        };
        assert_eq!(err.code(), "RATE_LIMITER_NOT_CONFIGURED");
        assert_eq!(
            err.to_string(),
            "限流器未配置速率: EMAIL_PROVIDER_1_rate_limiter"
        );
    }

    #[test]
    fn test_wrapped_error_codes() {
        let config_err = SharedError::Config(config::ConfigError::Message("缺少字段".to_string()));
        assert_eq!(config_err.code(), "CONFIG_ERROR");
        assert_eq!(config_err.to_string(), "配置错误: 缺少字段");

        let internal = SharedError::Internal("boom".to_string());
        assert_eq!(internal.code(), "INTERNAL_ERROR");
    }
}
