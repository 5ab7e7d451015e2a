//! 应用层错误定义
//!
//! 所有用例以显式结果返回失败，不为可预期情况抛异常。
//! 每个变体对应一个机器可读错误码，供 UI 边界决定提示与重试策略。

use domain::DomainError;
use thiserror::Error;

/// 应用层错误类型
#[derive(Debug, Error)]
pub enum ChatError {
    /// 输入验证失败（格式错误的ID、空正文等），不自动重试
    #[error("验证失败: {field}: {message}")]
    Validation { field: String, message: String },

    /// 调用者不是会话的任何一方参与者
    #[error("无权访问该会话")]
    AccessDenied,

    /// 资源不存在
    #[error("资源不存在: {resource} {id}")]
    NotFound { resource: String, id: String },

    /// 身份解析出参与者类型但缺少可用ID（例如 contact 会话缺少 contact_id），
    /// 单独成码以便 UI 引导重新认证而不是重试
    #[error("缺少可用的调用者身份")]
    MissingIdentity,

    /// 基础设施错误（存储/推送），携带原始原因原样上抛，重试策略由调用方负责
    #[error("基础设施错误: {context}")]
    Infrastructure {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// 领域不变量违反，属于编程错误
    #[error("不变量违反: {0}")]
    Invariant(String),
}

impl ChatError {
    /// 创建验证错误
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 创建资源不存在错误
    pub fn not_found(resource: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }

    /// 创建基础设施错误
    pub fn infrastructure(context: impl Into<String>) -> Self {
        Self::Infrastructure {
            context: context.into(),
            source: None,
        }
    }

    /// 创建带原因的基础设施错误
    pub fn infrastructure_with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Infrastructure {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    /// 机器可读错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::AccessDenied => "access_denied",
            Self::NotFound { .. } => "not_found",
            Self::MissingIdentity => "missing_identity",
            Self::Infrastructure { .. } => "infrastructure",
            Self::Invariant(_) => "invariant",
        }
    }
}

impl From<DomainError> for ChatError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::ValidationError { field, message } => Self::Validation { field, message },
            DomainError::InvariantViolation { message } => Self::Invariant(message),
        }
    }
}

/// 应用层结果类型
pub type ChatResult<T> = Result<T, ChatError>;
