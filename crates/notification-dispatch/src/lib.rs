//! 多渠道通知分发核心
//!
//! 接收渠道无关的发送请求，投影为通知实体后路由到该渠道注册的发送器，
//! 按注册顺序做校验驱动的故障转移，返回统一的发送结果。
//! 发送器可以被限流装饰器透明包装。

pub mod dispatcher;
pub mod dto;
pub mod error;
pub mod models;
pub mod providers;
pub mod rate_limit;
pub mod registry;
pub mod sender;
pub mod test_utils;
pub mod validation;

pub use dispatcher::{NotificationDispatcher, SendNotificationCommand};
pub use dto::SendNotificationRequest;
pub use error::NotificationError;
pub use registry::{SenderRegistry, SenderRegistryBuilder};
pub use sender::NotificationSender;
pub use validation::{ValidableSender, ValidationError};
