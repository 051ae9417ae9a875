//! 进程内并发协调基础库（concord-core）
//!
//! 提供三类相互独立又可组合的构件：
//! - 命名咨询锁（`mutex`）：基于租约，支持续约、释放与 `wrap` 临界区；
//! - 有界并发任务池（`pool`）：限制并发、统计未完成任务并支持有超时的等待清空；
//! - 进程内事件总线（`eventing`）：按类型注册处理器，经任务池分发，
//!   处于事务中时可延迟到事务提交后再分发。
//!
//! 以及它们共同依赖的条件轮询（`poller`）与统一错误类型（`error`）。
//!
//! 典型用法：
//! 1. 用 `LockManager::wrap` 保护“写某个缓存键”之类的临界区，长临界区内调用续约；
//! 2. 用 `BoundedTaskPool` 限制后台扇出任务的并发；
//! 3. 用 `LocalEventBus` 发布领域事件，接入事务协作方后获得“提交后投递”的语义。
//!
pub mod error;
#[cfg(feature = "eventing")]
pub mod eventing;
pub mod mutex;
pub mod poller;
pub mod pool;
pub mod util;

pub use error::{CoordError, CoordResult};
pub use mutex::{LeaseExtender, LockConfig, LockHandle, LockManager};
pub use poller::{WaitOptions, wait_for};
pub use pool::BoundedTaskPool;
