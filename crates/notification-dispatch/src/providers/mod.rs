//! 模拟渠道发送器
//!
//! 各渠道的真实网关集成不在分发核心范围内，这里的实现只记录日志并返回
//! 成功结果，但保留了各渠道的校验规则，用于驱动故障转移。

pub mod email;
pub mod push;
pub mod sms;

pub use email::{MockEmailFallback, MockEmailSender};
pub use push::MockPushSender;
pub use sms::MockSmsSender;

/// 发送器名称
pub mod names {
    pub const EMAIL_PROVIDER_1: &str = "EMAIL_PROVIDER_1";
    pub const EMAIL_PROVIDER_2: &str = "EMAIL_PROVIDER_2";
    pub const SMS_PROVIDER_1: &str = "SMS_PROVIDER_1";
    pub const PUSH_PROVIDER_1: &str = "PUSH_PROVIDER_1";
}
