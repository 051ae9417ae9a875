use async_trait::async_trait;
use concord_application::InMemoryTransactionManager;
use concord_application::context::AppContext;
use concord_core::eventing::{EventBus, EventHandler, LocalEventBus, TransactionalDispatch};
use std::sync::Arc;

#[derive(Debug)]
struct UserRegistered {
    name: String,
}

struct WelcomeMail;

#[async_trait]
impl EventHandler<UserRegistered> for WelcomeMail {
    fn handler_name(&self) -> &str {
        "welcome-mail"
    }

    async fn handle(&self, event: &UserRegistered) -> anyhow::Result<()> {
        println!("welcome, {}", event.name);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let txm = Arc::new(InMemoryTransactionManager::new());
    let bus: LocalEventBus<UserRegistered, AppContext> = LocalEventBus::builder()
        .transactions(TransactionalDispatch::from_shared(txm.clone()))
        .build();
    bus.listen("user.registered", Arc::new(WelcomeMail));

    // 提交后投递
    let tx = txm.begin();
    let ctx = AppContext::default().in_transaction(tx);
    bus.emit(&ctx, "user.registered", UserRegistered { name: "alice".into() });
    println!("before commit: pending={}", bus.pending());
    txm.commit(tx)?;
    bus.wait_for_finish().await?;

    // 回滚则丢弃
    let tx = txm.begin();
    let ctx = AppContext::default().in_transaction(tx);
    bus.emit(&ctx, "user.registered", UserRegistered { name: "bob".into() });
    txm.abort(tx)?;
    bus.wait_for_finish().await?;
    println!("bob was never welcomed");

    Ok(())
}
