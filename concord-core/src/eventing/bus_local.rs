//! 进程内事件总线（LocalEventBus）
//!
//! - 处理器注册表按事件类型保存处理器列表，注册顺序即提交顺序；
//! - 每次处理器调用作为独立任务提交到 `BoundedTaskPool`，慢处理器不会阻塞发布方或其它处理器；
//! - 处理器失败在分发边界记录日志，不回传给发布方；
//! - 配置了事务协作方且上下文处于事务中时，分发延迟到事务（根）提交之后，回滚则丢弃。
//!
//! 延迟分发的回调在事务提交方的调用栈上执行，需处于 tokio 运行时内。
//!
//! `emit` 先查询活动事务、再登记提交回调，两步之间事务可能被其它线程结束。
//! 此时无法区分提交与回滚，事件被丢弃并以 `warn` 记录。
//!
use super::{EventBus, EventHandler, TransactionalDispatch};
use crate::error::{CoordError, CoordResult};
use crate::pool::BoundedTaskPool;
use bon::{Builder, bon};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 事件总线配置
#[derive(Builder, Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventBusConfig {
    /// 处理器并发上限
    #[builder(default = 32)]
    pub concurrency: usize,
    /// 关闭时为每个未完成任务预留的等待时间
    #[builder(default = Duration::from_millis(5000))]
    pub shutdown_wait_per_task: Duration,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            concurrency: 32,
            shutdown_wait_per_task: Duration::from_millis(5000),
        }
    }
}

type Listeners<E> = Vec<Arc<dyn EventHandler<E>>>;

struct BusInner<E, C> {
    listeners: DashMap<String, Listeners<E>>,
    pool: BoundedTaskPool,
    config: EventBusConfig,
    transactions: Option<TransactionalDispatch<C>>,
}

/// 进程内事件总线
///
/// 克隆得到的是同一条总线。
pub struct LocalEventBus<E, C = ()> {
    inner: Arc<BusInner<E, C>>,
}

impl<E, C> Clone for LocalEventBus<E, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

#[bon]
impl<E, C> LocalEventBus<E, C>
where
    E: Send + Sync + 'static,
    C: 'static,
{
    #[builder]
    pub fn new(
        #[builder(default)] config: EventBusConfig,
        transactions: Option<TransactionalDispatch<C>>,
    ) -> Self {
        Self {
            inner: Arc::new(BusInner {
                listeners: DashMap::new(),
                pool: BoundedTaskPool::new(config.concurrency),
                config,
                transactions,
            }),
        }
    }

    pub fn config(&self) -> &EventBusConfig {
        &self.inner.config
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.inner
            .listeners
            .get(event_type)
            .map_or(0, |list| list.len())
    }

    pub fn has_listeners(&self, event_type: &str) -> bool {
        self.listener_count(event_type) > 0
    }

    /// 尚未结束的处理器调用数
    pub fn pending(&self) -> usize {
        self.inner.pool.current_pending()
    }

    /// 关闭钩子：等待进行中的处理器结束
    ///
    /// 最长等待 `shutdown_wait_per_task × 未完成数`，超时返回 `Timeout`。
    pub async fn wait_for_finish(&self) -> CoordResult<()> {
        let pending = self.inner.pool.current_pending();
        if pending == 0 {
            return Ok(());
        }

        let max_wait = self
            .inner
            .config
            .shutdown_wait_per_task
            .saturating_mul(u32::try_from(pending).unwrap_or(u32::MAX));
        info!(pending, ?max_wait, "waiting for in-flight event handlers");

        self.inner
            .pool
            .wait_for_all(max_wait)
            .await
            .inspect_err(|err| {
                warn!(
                    pending = self.inner.pool.current_pending(),
                    error = %err,
                    "event handlers still running after shutdown wait"
                );
            })
    }
}

impl<E, C> EventBus<E, C> for LocalEventBus<E, C>
where
    E: Send + Sync + 'static,
    C: 'static,
{
    fn listen(&self, event_type: &str, handler: Arc<dyn EventHandler<E>>) {
        debug!(
            event_type,
            handler = handler.handler_name(),
            "event handler registered"
        );
        self.inner
            .listeners
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
    }

    fn emit(&self, context: &C, event_type: &str, event: E) {
        let event = Arc::new(event);

        if let Some(tx) = &self.inner.transactions {
            if let Some(transaction) = tx.context.active_transaction(context) {
                let root = tx
                    .context
                    .transaction_root(transaction)
                    .unwrap_or(transaction);
                debug!(
                    event_type,
                    transaction = transaction.id(),
                    root = root.id(),
                    "event deferred until commit"
                );

                let inner = self.inner.clone();
                let deferred_type = event_type.to_string();
                let bound = tx.notifier.listen_to_commit(
                    root,
                    Box::new(move || inner.dispatch(&deferred_type, event)),
                );
                if !bound {
                    warn!(
                        event_type,
                        transaction = transaction.id(),
                        "transaction finished before the event was bound, event dropped"
                    );
                }
                return;
            }
        }

        self.inner.dispatch(event_type, event);
    }

    fn remove(&self, event_type: &str) {
        if let Some((_, removed)) = self.inner.listeners.remove(event_type) {
            debug!(event_type, count = removed.len(), "event handlers removed");
        }
    }
}

impl<E, C> BusInner<E, C>
where
    E: Send + Sync + 'static,
{
    fn dispatch(&self, event_type: &str, event: Arc<E>) {
        // 先复制处理器列表，避免在持有分片锁时提交任务
        let Some(handlers) = self.listeners.get(event_type).map(|list| list.clone()) else {
            debug!(event_type, "no listeners for event");
            return;
        };

        for handler in handlers {
            let event = event.clone();
            let event_type = event_type.to_string();
            let handler_name = handler.handler_name().to_string();

            self.pool.add(
                async move {
                    if let Err(err) = handler.handle(&event).await {
                        let failure = CoordError::HandlerFailure {
                            handler: handler.handler_name().to_string(),
                            event_type,
                            reason: format!("{err:#}"),
                        };
                        error!(error = %failure, "event handler failed");
                    }
                    Ok(())
                },
                move |err| {
                    error!(handler = %handler_name, error = %err, "event handler task failed");
                },
            );
        }
    }
}
