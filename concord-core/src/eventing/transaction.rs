//! 事务协作方协议
//!
//! 事件总线本身不管理事务，只通过两个外部协作方感知事务：
//! - `PersistenceContext`：从调用上下文中取出当前事务，以及事务的根（发起者）；
//! - `TransactionCommitNotifier`：在事务（以根标识）提交后恰好调用一次回调，回滚时不调用。
//!
use std::sync::Arc;

/// 不透明的事务标识
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionHandle(u64);

impl TransactionHandle {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(&self) -> u64 {
        self.0
    }
}

/// 事务提交后执行的回调
pub type CommitCallback = Box<dyn FnOnce() + Send + Sync + 'static>;

/// 持久化上下文访问器
pub trait PersistenceContext<C: ?Sized>: Send + Sync {
    /// 调用上下文中的活动事务
    fn active_transaction(&self, context: &C) -> Option<TransactionHandle>;

    /// 事务的根（用于关联嵌套事务）
    fn transaction_root(&self, transaction: TransactionHandle) -> Option<TransactionHandle>;
}

/// 事务提交通知
pub trait TransactionCommitNotifier: Send + Sync {
    /// 登记回调：`transaction` 提交后调用恰好一次；回滚则丢弃
    ///
    /// 事务已结束（未知、已提交或已回滚）时不登记，丢弃回调并返回 `false`。
    fn listen_to_commit(&self, transaction: TransactionHandle, callback: CommitCallback) -> bool;
}

/// 事件总线的事务化分发所需的协作方
pub struct TransactionalDispatch<C: ?Sized> {
    pub context: Arc<dyn PersistenceContext<C>>,
    pub notifier: Arc<dyn TransactionCommitNotifier>,
}

impl<C: ?Sized> TransactionalDispatch<C> {
    pub fn new(
        context: Arc<dyn PersistenceContext<C>>,
        notifier: Arc<dyn TransactionCommitNotifier>,
    ) -> Self {
        Self { context, notifier }
    }

    /// 同一对象同时实现两个协议时的便捷构造
    pub fn from_shared<T>(shared: Arc<T>) -> Self
    where
        T: PersistenceContext<C> + TransactionCommitNotifier + 'static,
    {
        Self {
            context: shared.clone(),
            notifier: shared,
        }
    }
}

impl<C: ?Sized> Clone for TransactionalDispatch<C> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
            notifier: self.notifier.clone(),
        }
    }
}
