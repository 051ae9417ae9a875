//! 有界并发任务池（BoundedTaskPool）
//!
//! - 最多 `concurrency` 个任务同时执行，超出部分按提交顺序排队；
//! - 任务结束后，其所在槽位立即拉取下一个排队任务；
//! - 任务失败（返回错误或 panic）只交给该任务的 `on_error`，不影响提交方与其它任务；
//!   `on_error` 自身 panic 时仅记录日志；
//! - `current_pending` 统计已提交但尚未结束（含排队）的任务数，`wait_for_all` 据此等待清空。
//!
use crate::error::{CoordError, CoordResult};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, warn};

type ErrorCallback = Box<dyn FnOnce(CoordError) + Send + 'static>;

/// 一个待执行任务及其失败回调
struct PendingTask {
    future: BoxFuture<'static, anyhow::Result<()>>,
    on_error: ErrorCallback,
}

#[derive(Default)]
struct PoolState {
    running: usize,
    queue: VecDeque<PendingTask>,
}

struct Inner {
    concurrency: usize,
    state: Mutex<PoolState>,
    pending: AtomicUsize,
    drained: Notify,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }
    }
}

/// 有界并发任务池
///
/// 克隆得到的是同一个池。`add` 需要在 tokio 运行时内调用。
#[derive(Clone)]
pub struct BoundedTaskPool {
    inner: Arc<Inner>,
}

impl BoundedTaskPool {
    /// `concurrency` 为 0 时按 1 处理
    pub fn new(concurrency: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                concurrency: concurrency.max(1),
                state: Mutex::new(PoolState::default()),
                pending: AtomicUsize::new(0),
                drained: Notify::new(),
            }),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.inner.concurrency
    }

    /// 已提交但尚未结束的任务数（含排队中的任务）
    pub fn current_pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    pub fn has_pending(&self) -> bool {
        self.current_pending() > 0
    }

    /// 当前占用的执行槽位数
    pub fn running(&self) -> usize {
        self.inner.state().running
    }

    /// 提交任务
    ///
    /// 任务失败时以 `TaskFailure` 调用 `on_error`；错误不会返回给提交方。
    pub fn add<F, E>(&self, task: F, on_error: E)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
        E: FnOnce(CoordError) + Send + 'static,
    {
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        let task = PendingTask {
            future: Box::pin(task),
            on_error: Box::new(on_error),
        };

        let admitted = {
            let mut state = self.inner.state();
            if state.running < self.inner.concurrency {
                state.running += 1;
                Some(task)
            } else {
                state.queue.push_back(task);
                None
            }
        };

        if let Some(task) = admitted {
            tokio::spawn(run_slot(self.inner.clone(), task));
        }
    }

    /// 等待所有任务结束
    ///
    /// 仅是时间点上的检查：等待期间仍可提交新任务。超过 `max_wait` 返回 `Timeout`。
    pub async fn wait_for_all(&self, max_wait: Duration) -> CoordResult<()> {
        let drained = async {
            loop {
                let notified = self.inner.drained.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if self.current_pending() == 0 {
                    return;
                }
                notified.await;
            }
        };

        tokio::time::timeout(max_wait, drained)
            .await
            .map_err(|_| CoordError::Timeout { max_wait })
    }
}

impl std::fmt::Debug for BoundedTaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedTaskPool")
            .field("concurrency", &self.inner.concurrency)
            .field("pending", &self.current_pending())
            .finish()
    }
}

/// 一个执行槽位：执行任务，结束后继续拉取队首任务，队列为空时释放槽位
async fn run_slot(inner: Arc<Inner>, mut task: PendingTask) {
    loop {
        let PendingTask { future, on_error } = task;
        let failure = match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(CoordError::task_failure(format!("{err:#}"))),
            Err(panic) => Some(CoordError::task_failure(format!(
                "task panicked: {}",
                panic_message(panic.as_ref())
            ))),
        };
        // 回调本身 panic 也不能让槽位丢失
        if let Some(failure) = failure {
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| on_error(failure))) {
                warn!(
                    panic = panic_message(panic.as_ref()),
                    "task error callback panicked"
                );
            }
        }
        inner.settle();

        let next = {
            let mut state = inner.state();
            let next = state.queue.pop_front();
            if next.is_none() {
                state.running -= 1;
            }
            next
        };

        match next {
            Some(queued) => task = queued,
            None => break,
        }
    }
    debug!("task pool slot released");
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Instant, sleep};

    const MS: Duration = Duration::from_millis(1);

    fn ignore(_: CoordError) {}

    #[tokio::test(start_paused = true)]
    async fn admission_never_exceeds_concurrency() {
        let pool = BoundedTaskPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let max_running = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        for _ in 0..5 {
            let running = running.clone();
            let max_running = max_running.clone();
            pool.add(
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    max_running.fetch_max(now, Ordering::SeqCst);
                    sleep(100 * MS).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                },
                ignore,
            );
        }
        assert_eq!(pool.current_pending(), 5);

        pool.wait_for_all(Duration::from_secs(10)).await.unwrap();
        assert_eq!(max_running.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= 300 * MS);
        assert!(!pool.has_pending());
        assert_eq!(pool.running(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_tasks_are_admitted_in_submission_order() {
        let pool = BoundedTaskPool::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..4 {
            let order = order.clone();
            pool.add(
                async move {
                    order.lock().unwrap().push(i);
                    sleep(10 * MS).await;
                    Ok(())
                },
                ignore,
            );
        }

        pool.wait_for_all(Duration::from_secs(1)).await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_all_waits_for_in_flight_work() {
        let pool = BoundedTaskPool::new(4);
        pool.add(
            async {
                sleep(200 * MS).await;
                Ok(())
            },
            ignore,
        );

        let started = Instant::now();
        pool.wait_for_all(Duration::from_millis(1000)).await.unwrap();
        let waited = started.elapsed();
        assert!(waited >= 200 * MS && waited < 1000 * MS, "waited {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_all_gives_up_at_timeout() {
        let pool = BoundedTaskPool::new(4);
        pool.add(
            async {
                sleep(200 * MS).await;
                Ok(())
            },
            ignore,
        );

        let started = Instant::now();
        let err = pool.wait_for_all(50 * MS).await.unwrap_err();
        assert_eq!(err, CoordError::Timeout { max_wait: 50 * MS });
        assert!(started.elapsed() >= 50 * MS);
        assert!(pool.has_pending());
    }

    #[tokio::test]
    async fn wait_for_all_on_idle_pool_returns_immediately() {
        let pool = BoundedTaskPool::new(1);
        pool.wait_for_all(Duration::ZERO).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_routed_to_on_error_and_isolated() {
        let pool = BoundedTaskPool::new(1);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let completed = Arc::new(AtomicUsize::new(0));

        {
            let errors = errors.clone();
            pool.add(async { Err::<(), _>(anyhow::anyhow!("boom")) }, move |err| {
                errors.lock().unwrap().push(err)
            });
        }
        {
            let errors = errors.clone();
            let explode = true;
            pool.add(
                async move {
                    if explode {
                        panic!("kaput");
                    }
                    Ok(())
                },
                move |err| errors.lock().unwrap().push(err),
            );
        }
        {
            let completed = completed.clone();
            pool.add(
                async move {
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
                ignore,
            );
        }

        pool.wait_for_all(Duration::from_secs(1)).await.unwrap();
        assert_eq!(completed.load(Ordering::SeqCst), 1);

        let errors = errors.lock().unwrap();
        assert_eq!(
            *errors,
            vec![
                CoordError::task_failure("boom"),
                CoordError::task_failure("task panicked: kaput"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_error_callback_keeps_slot_alive() {
        let pool = BoundedTaskPool::new(1);
        let completed = Arc::new(AtomicUsize::new(0));

        pool.add(async { Err::<(), _>(anyhow::anyhow!("boom")) }, |_| {
            panic!("callback exploded")
        });
        for _ in 0..2 {
            let completed = completed.clone();
            pool.add(
                async move {
                    completed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                },
                ignore,
            );
        }

        pool.wait_for_all(Duration::from_secs(1)).await.unwrap();
        assert_eq!(completed.load(Ordering::SeqCst), 2);
        assert_eq!(pool.running(), 0);
        assert!(!pool.has_pending());
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        assert_eq!(BoundedTaskPool::new(0).concurrency(), 1);
    }
}
