/// 命名锁 + 有界任务池示例
/// 展示多个并发写入方在同一锁名下串行进入临界区，以及长临界区内的续约
use concord_core::{BoundedTaskPool, CoordError, LockManager};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mutex = LockManager::new();
    let pool = BoundedTaskPool::new(3);
    let written = Arc::new(AtomicUsize::new(0));

    for writer in 0..6 {
        let mutex = mutex.clone();
        let written = written.clone();
        pool.add(
            async move {
                mutex
                    .wrap("cache:avatar", Duration::from_millis(300), |extender| async move {
                        // 写入较慢时续约，避免租约在临界区内过期
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        extender.extend(Duration::from_millis(300))?;
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        written.fetch_add(1, Ordering::SeqCst);
                        println!("writer {writer} done");
                        Ok::<_, CoordError>(())
                    })
                    .await?;
                Ok(())
            },
            |err| eprintln!("writer failed: {err}"),
        );
    }

    println!("pending: {}", pool.current_pending());
    pool.wait_for_all(Duration::from_secs(30)).await?;
    println!("written: {}", written.load(Ordering::SeqCst));

    Ok(())
}
