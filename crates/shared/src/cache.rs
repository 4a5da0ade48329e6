//! Redis 缓存管理模块
//!
//! 提供 Redis 连接管理和限流器所需的原子操作封装。

use std::time::Duration;

use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{info, instrument};

use crate::config::RedisConfig;
use crate::error::{Result, SharedError};

/// Redis 缓存客户端
#[derive(Clone)]
pub struct Cache {
    client: Client,
}

impl Cache {
    /// 创建 Redis 客户端
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        info!("Redis client created");
        Ok(Self { client })
    }

    /// 获取连接
    async fn get_conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(SharedError::from)
    }

    /// 获取值
    #[instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.get_conn().await?;
        let value: Option<String> = conn.get(key).await?;

        match value {
            Some(v) => {
                let parsed: T = serde_json::from_str(&v).map_err(|e| {
                    SharedError::Serialization(format!("Cache deserialization error: {}", e))
                })?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// 仅在 key 不存在时写入（不设置过期时间）
    ///
    /// 基于 Redis SET NX 实现，返回 true 表示写入成功（key 原本不存在）。
    #[instrument(skip(self, value))]
    pub async fn set_if_absent<T: Serialize>(&self, key: &str, value: &T) -> Result<bool> {
        let mut conn = self.get_conn().await?;
        let serialized = serde_json::to_string(value).map_err(|e| {
            SharedError::Serialization(format!("Cache serialization error: {}", e))
        })?;

        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(serialized)
            .arg("NX")
            .query_async(&mut conn)
            .await?;

        Ok(result.is_some())
    }

    /// 删除值
    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.get_conn().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }

    /// 增量操作
    pub async fn incr(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.get_conn().await?;
        let result: i64 = conn.incr(key, delta).await?;
        Ok(result)
    }

    /// 设置过期时间（秒级精度，不足 1 秒按 1 秒处理）
    pub async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.get_conn().await?;
        let secs = ttl.as_secs().max(1) as i64;
        let _: () = conn.expire(key, secs).await?;
        Ok(())
    }
}

/// 缓存键生成器
pub struct CacheKey;

impl CacheKey {
    /// 限流器的速率定义
    pub fn rate_limiter_config(limiter: &str) -> String {
        format!("{}:config", limiter)
    }

    /// 限流器某个固定窗口的计数器
    pub fn rate_limiter_window(limiter: &str, window_index: u64) -> String {
        format!("{}:{}", limiter, window_index)
    }
}
