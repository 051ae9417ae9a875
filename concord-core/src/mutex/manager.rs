//! 锁管理器（LockManager）
//!
//! 锁表为 `名称 -> 到期时间`，由 `DashMap` 保护；获取时通过 entry API
//! 在同一次求值内完成“检查存活并占用”，等待期间复用 `poller::wait_for`。
//!
use super::{LeaseExtender, LockHandle};
use crate::error::{CoordError, CoordResult};
use crate::poller::{self, DEFAULT_POLL_INTERVAL, WaitOptions};
use bon::Builder;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::FutureExt;
use std::future::{self, Future};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

// 租约超出 `Instant` 可表示范围时的上限（约 30 年）
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// 锁管理器配置
#[derive(Builder, Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockConfig {
    /// 锁被占用时的轮询间隔
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    pub poll_interval: Duration,
    /// 获取超时 = 租约时长 × 该系数
    #[builder(default = 100)]
    pub timeout_factor: u32,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout_factor: 100,
        }
    }
}

/// 进程内命名锁管理器
///
/// 克隆开销很小，所有克隆共享同一张锁表。
#[derive(Clone, Debug, Default)]
pub struct LockManager {
    locks: Arc<DashMap<String, Instant>>,
    config: LockConfig,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LockConfig) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// 获取锁
    ///
    /// 锁空闲（无记录或已过期）时立即占用；否则按 `poll_interval` 轮询，
    /// 在锁释放或过期的瞬间占用。等待超过 `lease × timeout_factor` 返回 `LockTimeout`。
    pub async fn lock(&self, name: &str, lease: Duration) -> CoordResult<LockHandle> {
        if !self.try_acquire(name, lease) {
            let timeout = lease.saturating_mul(self.config.timeout_factor);
            debug!(lock = name, ?timeout, "lock is busy, waiting");

            let started = Instant::now();
            let options = WaitOptions::new(self.config.poll_interval, timeout);
            poller::wait_for(|| future::ready(self.try_acquire(name, lease)), options)
                .await
                .map_err(|_| CoordError::LockTimeout {
                    name: name.to_string(),
                    waited: started.elapsed(),
                })?;
        }

        debug!(lock = name, ?lease, "lock acquired");
        Ok(LockHandle::new(name, self.clone()))
    }

    /// 续约：仅当存在存活条目时重置 `expires_at = now + lease`
    pub fn extend(&self, name: &str, lease: Duration) -> CoordResult<()> {
        let now = Instant::now();
        match self.locks.get_mut(name) {
            Some(mut expires_at) if *expires_at >= now => {
                *expires_at = expiry(now, lease);
                debug!(lock = name, ?lease, "lock extended");
                Ok(())
            }
            _ => Err(CoordError::lock_expired(name, "extend")),
        }
    }

    /// 释放锁；过期的陈旧条目同样会被清除，但仍返回 `LockExpired`
    pub fn unlock(&self, name: &str) -> CoordResult<()> {
        let now = Instant::now();
        match self.locks.remove(name) {
            Some((_, expires_at)) if expires_at >= now => {
                debug!(lock = name, "lock released");
                Ok(())
            }
            _ => Err(CoordError::lock_expired(name, "unlock")),
        }
    }

    pub fn is_locked(&self, name: &str) -> bool {
        let now = Instant::now();
        self.locks
            .get(name)
            .is_some_and(|expires_at| *expires_at >= now)
    }

    /// 在锁保护下执行 `body`
    ///
    /// `body` 得到绑定到该锁名的 [`LeaseExtender`]。无论 `body` 成功、失败或 panic 都会释放锁；
    /// `body` 的错误原样返回，panic 在释放后继续传播。`body` 成功但释放时租约已过期，则返回 `LockExpired`。
    pub async fn wrap<F, Fut, T, E>(&self, name: &str, lease: Duration, body: F) -> Result<T, E>
    where
        F: FnOnce(LeaseExtender) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CoordError>,
    {
        let handle = self.lock(name, lease).await?;
        let result = match AssertUnwindSafe(body(handle.extender())).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                if let Err(release) = handle.unlock() {
                    warn!(lock = name, error = %release, "lock lease lapsed before release");
                }
                warn!(lock = name, "guarded body panicked, lock released");
                panic::resume_unwind(payload);
            }
        };

        match (result, handle.unlock()) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(release)) => Err(release.into()),
            (Err(err), Err(release)) => {
                warn!(lock = name, error = %release, "lock lease lapsed before release");
                Err(err)
            }
            (Err(err), Ok(())) => Err(err),
        }
    }

    fn try_acquire(&self, name: &str, lease: Duration) -> bool {
        let now = Instant::now();
        match self.locks.entry(name.to_string()) {
            Entry::Occupied(mut entry) => {
                if *entry.get() >= now {
                    return false;
                }
                entry.insert(expiry(now, lease));
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(expiry(now, lease));
                true
            }
        }
    }
}

fn expiry(now: Instant, lease: Duration) -> Instant {
    now.checked_add(lease).unwrap_or_else(|| now + FAR_FUTURE)
}
