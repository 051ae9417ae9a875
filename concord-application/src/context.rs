use concord_core::eventing::TransactionHandle;

/// 应用层上下文（Application Context）
///
/// 承载一次应用层调用所需的横切信息：
/// - 关联追踪 `correlation_id`；
/// - 当前所处的事务（`transaction`）：事件总线据此决定立即分发还是延迟到提交后分发。
///
/// 典型用法：
/// ```rust
/// use concord_application::context::AppContext;
/// use concord_core::eventing::TransactionHandle;
///
/// let ctx = AppContext::default()
///     .with_correlation_id("cor-123")
///     .in_transaction(TransactionHandle::new(1));
/// assert!(ctx.transaction.is_some());
/// ```
#[derive(Clone, Debug, Default)]
pub struct AppContext {
    /// 关联ID（链路追踪）
    pub correlation_id: Option<String>,
    /// 当前事务（可选）
    pub transaction: Option<TransactionHandle>,
}

impl AppContext {
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn in_transaction(mut self, transaction: TransactionHandle) -> Self {
        self.transaction = Some(transaction);
        self
    }
}
