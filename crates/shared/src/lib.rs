//! 共享库
//!
//! 包含分发核心共用的配置、错误处理、Redis 连接、限流器和可观测性等基础设施代码。

pub mod cache;
pub mod config;
pub mod error;
pub mod observability;
pub mod rate_limiter;
