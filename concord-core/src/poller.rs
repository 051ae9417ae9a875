//! 条件轮询（ConditionPoller）
//!
//! 以固定间隔反复求值谓词，直到返回 `true` 或超过最大等待时间。
//! 谓词本身可以是异步的；若需要“检查并占用”，应在同一次求值内完成，
//! 轮询器不会在两次求值之间持有任何状态。
//!
use crate::error::{CoordError, CoordResult};
use bon::Builder;
use std::future::Future;
use std::time::Duration;

/// 默认轮询间隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// 默认最大等待时间
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(5000);

/// 轮询参数
#[derive(Builder, Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitOptions {
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    pub poll_interval: Duration,
    #[builder(default = DEFAULT_MAX_WAIT)]
    pub max_wait: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

impl WaitOptions {
    pub fn new(poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            poll_interval,
            max_wait,
        }
    }

    /// 允许的最大尝试序号：`max_wait / poll_interval`（向下取整）
    fn max_attempt(&self) -> u128 {
        self.max_wait.as_millis() / self.interval().as_millis()
    }

    fn interval(&self) -> Duration {
        self.poll_interval.max(Duration::from_millis(1))
    }
}

/// 等待谓词成立
///
/// 第 0 次求值立即进行，此后每次求值间隔 `poll_interval`；
/// 当尝试序号超过 `max_wait / poll_interval` 时返回 [`CoordError::Timeout`]。
pub async fn wait_for<F, Fut>(mut predicate: F, options: WaitOptions) -> CoordResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let max_attempt = options.max_attempt();
    let mut attempt: u128 = 0;

    loop {
        if attempt > max_attempt {
            return Err(CoordError::Timeout {
                max_wait: options.max_wait,
            });
        }
        attempt += 1;

        if predicate().await {
            return Ok(());
        }

        tokio::time::sleep(options.interval()).await;
    }
}
