//! 事件总线（EventBus）协议
//!
//! 按事件类型注册处理器，发布时依据调用上下文选择立即分发或延迟到事务提交后分发。
//!
use super::EventHandler;
use std::sync::Arc;

/// 事件总线：负责注册处理器与发布事件
///
/// - `E`：事件载荷类型；
/// - `C`：调用方上下文，用于判断当前是否处于事务中。
pub trait EventBus<E, C>: Send + Sync {
    /// 为 `event_type` 追加处理器；同一类型的处理器按注册顺序提交执行
    fn listen(&self, event_type: &str, handler: Arc<dyn EventHandler<E>>);

    /// 发布事件；处于事务中时延迟到事务提交后分发，事务回滚则丢弃
    fn emit(&self, context: &C, event_type: &str, event: E);

    /// 注销 `event_type` 的全部处理器
    fn remove(&self, event_type: &str);
}
