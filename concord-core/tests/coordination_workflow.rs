use anyhow::Result as AnyResult;
use async_trait::async_trait;
use concord_core::eventing::{EventBus, EventBusConfig, EventHandler, LocalEventBus};
use concord_core::{CoordError, LockManager};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug)]
struct CacheInvalidated {
    key: String,
}

/// 在锁内重建缓存的处理器；同一键的重建互斥
struct Rebuild {
    mutex: LockManager,
    inside: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    rebuilt: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl EventHandler<CacheInvalidated> for Rebuild {
    fn handler_name(&self) -> &str {
        "rebuild"
    }

    async fn handle(&self, event: &CacheInvalidated) -> AnyResult<()> {
        let name = format!("cache:{}", event.key);
        self.mutex
            .wrap(&name, Duration::from_secs(2), |_| async move {
                let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(15)).await;
                self.rebuilt.lock().unwrap().push(event.key.clone());
                self.inside.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, CoordError>(())
            })
            .await?;
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_handlers_serialize_on_shared_lock() -> AnyResult<()> {
    let bus: LocalEventBus<CacheInvalidated> = LocalEventBus::builder()
        .config(EventBusConfig::builder().concurrency(4).build())
        .build();
    let inside = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let rebuilt = Arc::new(Mutex::new(Vec::new()));

    bus.listen(
        "cache.invalidated",
        Arc::new(Rebuild {
            mutex: LockManager::new(),
            inside: inside.clone(),
            peak: peak.clone(),
            rebuilt: rebuilt.clone(),
        }),
    );

    for _ in 0..4 {
        bus.emit(
            &(),
            "cache.invalidated",
            CacheInvalidated {
                key: "home".into(),
            },
        );
    }
    assert_eq!(bus.pending(), 4);

    bus.wait_for_finish().await?;
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(rebuilt.lock().unwrap().len(), 4);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn handler_lock_timeouts_are_logged_not_raised() -> AnyResult<()> {
    let mutex = LockManager::new();
    // 占用锁且租约远长于处理器的获取超时
    let _held = mutex.lock("cache:home", Duration::from_secs(60)).await?;

    struct Impatient {
        mutex: LockManager,
        attempts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler<CacheInvalidated> for Impatient {
        fn handler_name(&self) -> &str {
            "impatient"
        }

        async fn handle(&self, event: &CacheInvalidated) -> AnyResult<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let handle = self
                .mutex
                .lock(&format!("cache:{}", event.key), Duration::from_millis(1))
                .await?;
            handle.unlock()?;
            Ok(())
        }
    }

    let attempts = Arc::new(AtomicUsize::new(0));
    let bus: LocalEventBus<CacheInvalidated> = LocalEventBus::builder().build();
    bus.listen(
        "cache.invalidated",
        Arc::new(Impatient {
            mutex: mutex.clone(),
            attempts: attempts.clone(),
        }),
    );

    bus.emit(
        &(),
        "cache.invalidated",
        CacheInvalidated {
            key: "home".into(),
        },
    );

    // LockTimeout 在分发边界被记录，不会传回发布方
    bus.wait_for_finish().await?;
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert!(mutex.is_locked("cache:home"));
    Ok(())
}
