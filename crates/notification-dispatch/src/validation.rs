//! 发送器校验能力
//!
//! 校验是可选能力：实现了 [`ValidableSender`] 的发送器可以在发送前拒绝
//! 自己处理不了的通知（号码格式、token 长度、正文上限等），分发引擎据此
//! 跳过该发送器，而不是把校验失败当成错误抛出。

use serde::Serialize;

use crate::models::Notification;

/// 单条校验错误
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub code: String,
}

impl ValidationError {
    /// 错误码默认取字段名的大写形式
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let code = field.to_uppercase();
        Self {
            field,
            message: message.into(),
            code,
        }
    }

    pub fn with_code(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.field, self.message)
    }
}

/// 可校验发送器
pub trait ValidableSender: Send + Sync {
    /// 返回空列表表示该发送器可以处理此通知
    fn validate(&self, notification: &Notification) -> Vec<ValidationError>;
}

/// 正文与模板至少提供一个
pub(crate) fn has_content(notification: &Notification) -> bool {
    notification.body().is_some_and(|b| !is_blank(b))
        || notification.template_id().is_some_and(|t| !is_blank(t))
}

pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
