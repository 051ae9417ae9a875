//! 命名咨询锁（mutex）
//!
//! 基于租约的进程内命名锁：
//! - `LockManager`：锁表的唯一持有者，负责获取、续约、释放与 `wrap` 临界区；
//! - `LockHandle`：获取成功后返回的能力句柄（名称 + 管理器引用），可续约/释放；
//! - `LeaseExtender`：`wrap` 传入临界区的续约能力。
//!
//! 锁为咨询性质：绕过管理器直接访问资源的调用方不会被阻止。
//! 租约到期后锁被动失效（惰性清理），后续获取者无需等待显式释放。
//!
pub mod handle;
pub mod manager;

pub use handle::{LeaseExtender, LockHandle};
pub use manager::{LockConfig, LockManager};
