use anyhow::Result;
use async_trait::async_trait;
use concord_application::InMemoryTransactionManager;
use concord_application::context::AppContext;
use concord_core::eventing::{
    EventBus, EventBusConfig, EventHandler, LocalEventBus, TransactionalDispatch,
};
use concord_core::{CoordError, LockManager};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const ORDER_CREATED: &str = "order.created";
const ORDER_LEASE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
struct OrderCreated {
    order_id: u32,
    amount: u64,
}

struct SendReceipt;

#[async_trait]
impl EventHandler<OrderCreated> for SendReceipt {
    fn handler_name(&self) -> &str {
        "send-receipt"
    }

    async fn handle(&self, event: &OrderCreated) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        info!(order_id = event.order_id, "receipt sent");
        Ok(())
    }
}

struct ReserveStock;

#[async_trait]
impl EventHandler<OrderCreated> for ReserveStock {
    fn handler_name(&self) -> &str {
        "reserve-stock"
    }

    async fn handle(&self, event: &OrderCreated) -> Result<()> {
        if event.amount == 0 {
            anyhow::bail!("order {} has nothing to reserve", event.order_id);
        }
        info!(order_id = event.order_id, amount = event.amount, "stock reserved");
        Ok(())
    }
}

/// 下单服务：在锁内完成写入，并在事务内发布事件
struct OrderService {
    mutex: LockManager,
    events: Arc<dyn EventBus<OrderCreated, AppContext>>,
    transactions: Arc<InMemoryTransactionManager>,
}

impl OrderService {
    async fn place_order(&self, ctx: &AppContext, order_id: u32, amount: u64) -> Result<()> {
        let tx = self.transactions.begin();
        let tx_ctx = ctx.clone().in_transaction(tx);

        let written = self
            .mutex
            .wrap(&format!("order:{order_id}"), ORDER_LEASE, |extender| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                extender.extend(ORDER_LEASE)?;
                Ok::<_, CoordError>(amount)
            })
            .await;

        match written {
            Ok(amount) => {
                self.events.emit(
                    &tx_ctx,
                    ORDER_CREATED,
                    OrderCreated { order_id, amount },
                );
                self.transactions.commit(tx)?;
                info!(order_id, "order committed");
                Ok(())
            }
            Err(err) => {
                self.transactions.abort(tx)?;
                Err(err.into())
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("concord_core=debug".parse()?)
                .add_directive("demo=info".parse()?),
        )
        .init();

    let transactions = Arc::new(InMemoryTransactionManager::new());
    let bus: LocalEventBus<OrderCreated, AppContext> = LocalEventBus::builder()
        .config(EventBusConfig::builder().concurrency(4).build())
        .transactions(TransactionalDispatch::from_shared(transactions.clone()))
        .build();

    bus.listen(ORDER_CREATED, Arc::new(SendReceipt));
    bus.listen(ORDER_CREATED, Arc::new(ReserveStock));

    let service = OrderService {
        mutex: LockManager::new(),
        events: Arc::new(bus.clone()),
        transactions,
    };

    let ctx = AppContext::default().with_correlation_id("demo-1");
    service.place_order(&ctx, 1, 3).await?;
    service.place_order(&ctx, 2, 0).await?;

    // 事务外发布：立即分发
    bus.emit(
        &ctx,
        ORDER_CREATED,
        OrderCreated {
            order_id: 3,
            amount: 1,
        },
    );

    bus.wait_for_finish().await?;
    info!("shutdown complete");
    Ok(())
}
