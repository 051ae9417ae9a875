use super::LockManager;
use crate::error::CoordResult;
use std::time::Duration;

/// 锁句柄
///
/// 仅是一项能力：持有名称与管理器引用，允许续约与释放，但并不拥有锁表条目。
/// 丢弃句柄不会释放锁，租约将自然过期。
#[must_use = "dropping a LockHandle leaves the lock held until its lease expires"]
#[derive(Debug)]
pub struct LockHandle {
    name: String,
    manager: LockManager,
}

impl LockHandle {
    pub(crate) fn new(name: impl Into<String>, manager: LockManager) -> Self {
        Self {
            name: name.into(),
            manager,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 续约：`expires_at = now + lease`
    pub fn extend(&self, lease: Duration) -> CoordResult<()> {
        self.manager.extend(&self.name, lease)
    }

    /// 释放锁；租约已过期时返回 `LockExpired`
    pub fn unlock(self) -> CoordResult<()> {
        self.manager.unlock(&self.name)
    }

    /// 绑定到当前锁名的续约能力
    pub fn extender(&self) -> LeaseExtender {
        LeaseExtender {
            name: self.name.clone(),
            manager: self.manager.clone(),
        }
    }
}

/// 续约能力，由 `LockManager::wrap` 交给临界区使用
#[derive(Clone, Debug)]
pub struct LeaseExtender {
    name: String,
    manager: LockManager,
}

impl LeaseExtender {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn extend(&self, lease: Duration) -> CoordResult<()> {
        self.manager.extend(&self.name, lease)
    }
}
