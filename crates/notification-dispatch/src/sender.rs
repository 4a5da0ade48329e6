//! 发送器 SPI
//!
//! 每个渠道的具体投递实现都通过 `NotificationSender` 接入分发引擎。
//! 发送器本身不做校验，除非同时实现了 [`ValidableSender`] 并通过
//! [`NotificationSender::as_validable`] 暴露出来。

use async_trait::async_trait;

use crate::error::NotificationError;
use crate::models::{Notification, NotificationChannel, NotificationResult};
use crate::validation::ValidableSender;

/// 通知发送器 trait，各渠道实现具体的推送逻辑
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// 发送通知
    ///
    /// 业务失败以 `success = false` 的结果返回；`Err` 仅用于调用本身出错。
    async fn send(
        &self,
        notification: &Notification,
    ) -> Result<NotificationResult, NotificationError>;

    /// 该发送器支持的渠道
    fn channel(&self) -> NotificationChannel;

    /// 稳定的发送器名称，用于日志、限流器键和结果归属
    fn provider_name(&self) -> String;

    /// 校验能力查询，未实现校验的发送器返回 None
    fn as_validable(&self) -> Option<&dyn ValidableSender> {
        None
    }
}
