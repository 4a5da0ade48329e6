//! 发送器注册表
//!
//! 按渠道索引发送器，每个渠道下是一个有序、去重的发送器集合，
//! 注册顺序即故障转移的优先级顺序。
//!
//! ## 使用示例
//!
//! ```ignore
//! use std::sync::Arc;
//! use notification_dispatch::providers::{MockEmailFallback, MockEmailSender};
//! use notification_dispatch::registry::SenderRegistry;
//!
//! let dispatcher = SenderRegistry::builder()
//!     .provider(Arc::new(MockEmailSender::new()))
//!     .provider(Arc::new(MockEmailFallback))
//!     .build();
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::dispatcher::NotificationDispatcher;
use crate::models::NotificationChannel;
use crate::sender::NotificationSender;

/// 发送器注册表
///
/// 构建完成后只读，所有并发分发无锁共享。
pub struct SenderRegistry {
    senders: HashMap<NotificationChannel, Vec<Arc<dyn NotificationSender>>>,
}

impl SenderRegistry {
    pub fn builder() -> SenderRegistryBuilder {
        SenderRegistryBuilder::default()
    }

    /// 获取指定渠道的候选发送器（按注册顺序）
    ///
    /// 未注册的渠道返回空切片
    pub fn get(&self, channel: NotificationChannel) -> &[Arc<dyn NotificationSender>] {
        self.senders
            .get(&channel)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// 检查渠道是否至少注册了一个发送器
    pub fn contains(&self, channel: NotificationChannel) -> bool {
        !self.get(channel).is_empty()
    }

    /// 获取所有已注册的渠道（有序）
    pub fn registered_channels(&self) -> Vec<NotificationChannel> {
        let mut channels: Vec<_> = self.senders.keys().copied().collect();
        channels.sort();
        channels
    }

    /// 所有渠道下的发送器总数
    pub fn len(&self) -> usize {
        self.senders.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

/// 注册表构建器
///
/// 逐个累积发送器，最后一次性构建出不可变的分发引擎。
#[derive(Default)]
pub struct SenderRegistryBuilder {
    senders: HashMap<NotificationChannel, Vec<Arc<dyn NotificationSender>>>,
}

impl SenderRegistryBuilder {
    /// 注册一个发送器
    ///
    /// 发送器按其 `channel()` 归入对应渠道。同一实例重复注册时只保留首次注册的位置。
    pub fn provider(mut self, sender: Arc<dyn NotificationSender>) -> Self {
        let channel = sender.channel();
        let candidates = self.senders.entry(channel).or_default();

        if candidates.iter().any(|existing| same_instance(existing, &sender)) {
            debug!(
                channel = %channel,
                provider = %sender.provider_name(),
                "发送器已注册，忽略重复注册"
            );
            return self;
        }

        debug!(
            channel = %channel,
            provider = %sender.provider_name(),
            priority = candidates.len(),
            "注册通知发送器"
        );
        candidates.push(sender);
        self
    }

    /// 批量注册发送器，顺序即优先级
    pub fn providers<I>(self, senders: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn NotificationSender>>,
    {
        senders.into_iter().fold(self, Self::provider)
    }

    /// 只构建注册表
    pub fn build_registry(self) -> SenderRegistry {
        let registry = SenderRegistry {
            senders: self.senders,
        };

        info!(
            sender_count = registry.len(),
            channels = ?registry.registered_channels(),
            "通知发送器注册表初始化完成"
        );

        registry
    }

    /// 构建分发引擎
    pub fn build(self) -> NotificationDispatcher {
        NotificationDispatcher::new(self.build_registry())
    }
}

/// 按实例而非按值判断重复
fn same_instance(a: &Arc<dyn NotificationSender>, b: &Arc<dyn NotificationSender>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
