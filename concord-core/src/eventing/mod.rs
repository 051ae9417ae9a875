//! 事件子系统（eventing）
//!
//! 进程内事件发布/订阅：
//! - `EventBus`：统一的注册/发布/注销接口；
//! - `EventHandler`：对某类事件进行消费处理；
//! - `LocalEventBus`：经 `BoundedTaskPool` 并发执行处理器，并可将分发延迟到事务提交之后；
//! - `transaction`：事务协作方（上下文访问器与提交通知）协议。
//!
pub mod bus;
pub mod bus_local;
pub mod handler;
pub mod transaction;

pub use bus::EventBus;
pub use bus_local::{EventBusConfig, LocalEventBus};
pub use handler::EventHandler;
pub use transaction::{
    CommitCallback, PersistenceContext, TransactionCommitNotifier, TransactionHandle,
    TransactionalDispatch,
};
