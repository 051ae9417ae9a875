//! 协调层统一错误定义
//!
//! 封闭的错误分类：等待超时、锁获取超时、租约过期、事件处理器失败、任务失败。
//! 调用方可对变体做穷尽匹配，自行决定重试、跳过或继续上抛。
//!
use std::time::Duration;
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordError {
    // --- 等待 ---
    #[error("wait for: {max_wait:?} timeout exceeded")]
    Timeout { max_wait: Duration },
    #[error("operation \"{operation}\" did not finish within {timeout:?}")]
    ExecutionTimeout { operation: String, timeout: Duration },

    // --- 锁 ---
    #[error("cannot acquire lock \"{name}\": gave up after {waited:?}")]
    LockTimeout { name: String, waited: Duration },
    #[error("cannot {action} lock \"{name}\" because the lock has already expired")]
    LockExpired { name: String, action: &'static str },

    // --- 事件与任务 ---
    #[error("event handler failed: handler={handler}, event_type={event_type}, reason={reason}")]
    HandlerFailure {
        handler: String,
        event_type: String,
        reason: String,
    },
    #[error("task failed: {reason}")]
    TaskFailure { reason: String },
}

impl CoordError {
    pub fn lock_expired(name: impl Into<String>, action: &'static str) -> Self {
        CoordError::LockExpired {
            name: name.into(),
            action,
        }
    }

    pub fn task_failure(reason: impl Into<String>) -> Self {
        CoordError::TaskFailure {
            reason: reason.into(),
        }
    }

    /// 是否为调用方可恢复的错误（锁竞争或等待超时）
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoordError::Timeout { .. }
                | CoordError::LockTimeout { .. }
                | CoordError::ExecutionTimeout { .. }
        )
    }
}

/// 统一 Result 类型别名
pub type CoordResult<T> = Result<T, CoordError>;
