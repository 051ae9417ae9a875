use crate::{context::AppContext, error::AppError};
use concord_core::eventing::{
    CommitCallback, PersistenceContext, TransactionCommitNotifier, TransactionHandle,
};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// 基于内存的事务管理器
/// - 同时实现持久化上下文访问器与事务提交通知两个协议
/// - 嵌套事务关联到根事务；提交回调只登记在根上
/// - 提交根事务时按登记顺序执行回调（恰好一次），回滚根事务时丢弃回调
pub struct InMemoryTransactionManager {
    next_id: AtomicU64,
    // 根事务 -> 提交回调
    roots: DashMap<TransactionHandle, Vec<CommitCallback>>,
    // 嵌套事务 -> 根事务
    nested: DashMap<TransactionHandle, TransactionHandle>,
}

impl Default for InMemoryTransactionManager {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            roots: DashMap::new(),
            nested: DashMap::new(),
        }
    }
}

impl InMemoryTransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开启根事务
    pub fn begin(&self) -> TransactionHandle {
        let tx = self.next_handle();
        self.roots.insert(tx, Vec::new());
        debug!(transaction = tx.id(), "transaction started");
        tx
    }

    /// 在 `parent`（根或嵌套事务）内开启嵌套事务
    pub fn begin_nested(&self, parent: TransactionHandle) -> Result<TransactionHandle, AppError> {
        let root = self
            .root_of(parent)
            .ok_or(AppError::TransactionNotFound(parent.id()))?;

        let tx = self.next_handle();
        self.nested.insert(tx, root);
        debug!(
            transaction = tx.id(),
            root = root.id(),
            "nested transaction started"
        );
        Ok(tx)
    }

    /// 提交事务
    ///
    /// 提交根事务会结束其全部嵌套事务并执行已登记的回调；提交嵌套事务不执行回调。
    pub fn commit(&self, tx: TransactionHandle) -> Result<(), AppError> {
        if let Some((_, callbacks)) = self.roots.remove(&tx) {
            self.nested.retain(|_, root| *root != tx);
            debug!(
                transaction = tx.id(),
                callbacks = callbacks.len(),
                "transaction committed"
            );
            for callback in callbacks {
                callback();
            }
            return Ok(());
        }

        self.nested
            .remove(&tx)
            .map(|_| ())
            .ok_or(AppError::TransactionNotFound(tx.id()))
    }

    /// 回滚事务
    ///
    /// 回滚根事务会丢弃全部回调；回滚嵌套事务不影响根上已登记的回调。
    pub fn abort(&self, tx: TransactionHandle) -> Result<(), AppError> {
        if let Some((_, dropped)) = self.roots.remove(&tx) {
            self.nested.retain(|_, root| *root != tx);
            debug!(
                transaction = tx.id(),
                dropped = dropped.len(),
                "transaction aborted"
            );
            return Ok(());
        }

        self.nested
            .remove(&tx)
            .map(|_| ())
            .ok_or(AppError::TransactionNotFound(tx.id()))
    }

    pub fn is_active(&self, tx: TransactionHandle) -> bool {
        self.root_of(tx).is_some()
    }

    fn root_of(&self, tx: TransactionHandle) -> Option<TransactionHandle> {
        if self.roots.contains_key(&tx) {
            return Some(tx);
        }
        self.nested.get(&tx).map(|root| *root)
    }

    fn next_handle(&self) -> TransactionHandle {
        TransactionHandle::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl PersistenceContext<AppContext> for InMemoryTransactionManager {
    fn active_transaction(&self, context: &AppContext) -> Option<TransactionHandle> {
        // 已结束的事务视为不在事务中
        context.transaction.filter(|tx| self.is_active(*tx))
    }

    fn transaction_root(&self, transaction: TransactionHandle) -> Option<TransactionHandle> {
        self.root_of(transaction)
    }
}

impl TransactionCommitNotifier for InMemoryTransactionManager {
    fn listen_to_commit(&self, transaction: TransactionHandle, callback: CommitCallback) -> bool {
        let root = self.root_of(transaction).unwrap_or(transaction);
        match self.roots.get_mut(&root) {
            Some(mut callbacks) => {
                callbacks.push(callback);
                true
            }
            None => {
                warn!(
                    transaction = transaction.id(),
                    "transaction is not active, commit callback dropped"
                );
                false
            }
        }
    }
}
