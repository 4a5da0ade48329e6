//! 分发核心领域模型
//!
//! 包含渠道、优先级、错误码等枚举，以及通知实体和发送结果。

pub mod enums;
pub mod notification;
pub mod result;

// 重新导出常用类型
pub use enums::{ErrorCode, NotificationChannel, Priority};
pub use notification::Notification;
pub use result::NotificationResult;
