//! 事件处理器（EventHandler）
//!
//! 定义消费某一事件类型的处理逻辑与元信息（名称）。
//!
use async_trait::async_trait;

/// 事件处理器：处理某一类型的事件
///
/// 返回的错误由事件总线在分发边界捕获并记录，不会回传给发布方。
#[async_trait]
pub trait EventHandler<E>: Send + Sync {
    /// 处理器名称（用于失败日志）
    fn handler_name(&self) -> &str;
    /// 处理事件
    async fn handle(&self, event: &E) -> anyhow::Result<()>;
}
