//! 分发核心错误类型
//!
//! 发送器返回 `Err` 表示调用本身出错（网络、SDK 异常等），
//! 分发引擎会把它记为一次 `UNKNOWN_ERROR` 尝试并继续故障转移。

use notify_shared::error::SharedError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("通知发送失败: 发送器={provider}, 原因={reason}")]
    SendFailed { provider: String, reason: String },

    #[error(transparent)]
    Shared(#[from] SharedError),
}

impl NotificationError {
    pub fn send_failed(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SendFailed {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::SendFailed { .. } => "SEND_FAILED",
            Self::Shared(e) => e.code(),
        }
    }
}
