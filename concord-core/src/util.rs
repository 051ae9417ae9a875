//! 异步辅助：带超时执行与有界并发映射
//!
use crate::error::{CoordError, CoordResult};
use futures_util::{StreamExt, stream};
use std::future::Future;
use std::time::Duration;

/// `timeout_execution` 的默认超时
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_millis(2500);

/// 在 `timeout` 内等待 `future` 完成，否则返回 `ExecutionTimeout`
pub async fn timeout_execution<F, T>(future: F, operation: &str, timeout: Duration) -> CoordResult<T>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| CoordError::ExecutionTimeout {
            operation: operation.to_string(),
            timeout,
        })
}

/// 以至多 `concurrency` 个并发对 `items` 做异步映射，结果保持输入顺序
pub async fn limit_map<I, F, Fut, U>(concurrency: usize, items: I, mapper: F) -> Vec<U>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = U>,
{
    stream::iter(items)
        .map(mapper)
        .buffered(concurrency.max(1))
        .collect()
        .await
}
