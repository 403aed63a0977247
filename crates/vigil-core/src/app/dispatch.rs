//! DispatchPool - 非同期配送のワーカープール
//!
//! async モードの observer closure はここで実行されます。fire-and-forget
//! （バックプレッシャーなし、配送間の順序保証なし）。

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use crate::domain::{ChangeEvent, EntityId};

/// User closure invoked with the observed entity and the change.
pub type ChangeCallback = Arc<dyn Fn(EntityId, &ChangeEvent) + Send + Sync>;

/// One queued async delivery.
pub(crate) struct DeliveryJob {
    pub callback: ChangeCallback,
    pub entity: EntityId,
    pub change: ChangeEvent,
}

/// Cloneable feed into the pool.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::UnboundedSender<DeliveryJob>,
}

impl DispatchHandle {
    pub(crate) fn enqueue(&self, job: DeliveryJob) {
        // Pool already shut down: the delivery is dropped, per the
        // fire-and-forget contract.
        if self.tx.send(job).is_err() {
            tracing::warn!("dispatch pool is shut down; async delivery dropped");
        }
    }
}

/// Dispatch pool handle.
/// - `request_shutdown()` でワーカー全体が止まる
/// - `shutdown_and_join()` で全ワーカーの終了を待てる
pub struct DispatchPool {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
    handle: DispatchHandle,
}

impl DispatchPool {
    /// Spawn `n` dispatch workers.
    pub fn spawn(n: usize) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tx, rx) = mpsc::unbounded_channel();
        let rx = Arc::new(Mutex::new(rx));

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let rx = Arc::clone(&rx);
            let mut shutdown = shutdown_rx.clone();

            let join = tokio::spawn(async move {
                dispatch_loop(worker_id, rx, &mut shutdown).await;
            });
            joins.push(join);
        }

        Self {
            shutdown_tx,
            joins,
            handle: DispatchHandle { tx },
        }
    }

    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    /// Request shutdown for all workers.
    /// This does not cancel a closure already running; it just stops taking
    /// new jobs.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            let _ = j.await;
        }
    }
}

async fn dispatch_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<DeliveryJob>>>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        // shutdown が来ていたら抜ける
        if *shutdown_rx.borrow() {
            break;
        }

        // recv は「待つ」可能性があるので select で shutdown と競合させる
        let job = {
            let mut rx = rx.lock().await;
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    // 変更が入ったら次のループで判定
                    continue;
                }
                job = rx.recv() => job,
            }
        };

        let Some(job) = job else {
            // channel closed: all senders gone
            break;
        };

        // ここから先は receiver lock を手放した状態で closure を実行
        tracing::trace!(
            worker_id,
            entity = %job.entity,
            path = %job.change.path,
            "async delivery"
        );
        (job.callback)(job.entity, &job.change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChangeEvent, EntityId, KeyPath};
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::{Duration, timeout};
    use ulid::Ulid;

    fn job(counter: Arc<AtomicU32>, notify: Arc<tokio::sync::Notify>) -> DeliveryJob {
        let callback: ChangeCallback = Arc::new(move |_entity, _change| {
            counter.fetch_add(1, Ordering::SeqCst);
            notify.notify_one();
        });
        DeliveryJob {
            callback,
            entity: EntityId::from_ulid(Ulid::new()),
            change: ChangeEvent::set(KeyPath::new("score"), None, None, Utc::now()),
        }
    }

    #[tokio::test]
    async fn delivery_runs_on_a_worker() {
        let pool = DispatchPool::spawn(2);
        let counter = Arc::new(AtomicU32::new(0));
        let notify = Arc::new(tokio::sync::Notify::new());

        pool.handle()
            .enqueue(job(Arc::clone(&counter), Arc::clone(&notify)));

        timeout(Duration::from_secs(1), notify.notified())
            .await
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        pool.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn multiple_deliveries_all_run() {
        let pool = DispatchPool::spawn(4);
        let counter = Arc::new(AtomicU32::new(0));
        let notify = Arc::new(tokio::sync::Notify::new());

        for _ in 0..16 {
            pool.handle()
                .enqueue(job(Arc::clone(&counter), Arc::clone(&notify)));
        }

        timeout(Duration::from_secs(1), async {
            while counter.load(Ordering::SeqCst) < 16 {
                notify.notified().await;
            }
        })
        .await
        .unwrap();

        pool.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn enqueue_after_shutdown_is_dropped() {
        let pool = DispatchPool::spawn(1);
        let handle = pool.handle();
        pool.shutdown_and_join().await;

        let counter = Arc::new(AtomicU32::new(0));
        let notify = Arc::new(tokio::sync::Notify::new());
        handle.enqueue(job(Arc::clone(&counter), notify));

        // Workers are gone: the job never runs, and enqueue does not panic.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
