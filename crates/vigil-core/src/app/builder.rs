//! ObservatoryBuilder - ワイヤリングと起動時検証
//!
//! backend・dispatch pool・ID 生成器を束ねて Observatory を組み立てます。
//! 設定ミスは build() 時に弾く（Fail-fast）。

use std::sync::Arc;

use crate::domain::EntityId;
use crate::impls::{Entity, EntityList, InMemoryBackend};
use crate::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};

use super::dispatch::{DispatchHandle, DispatchPool};
use super::registry::RegistryMap;

/// BuildError は Observatory 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("dispatch pool needs at least one worker (got 0)")]
    NoDispatchWorkers,
}

/// Builder for [`Observatory`].
///
/// # 使用例
/// ```ignore
/// let observatory = ObservatoryBuilder::new()
///     .dispatch_workers(4)
///     .build()?;
/// let entity = observatory.entity();
/// ```
pub struct ObservatoryBuilder {
    dispatch_workers: usize,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl ObservatoryBuilder {
    pub fn new() -> Self {
        Self {
            dispatch_workers: 2,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
        }
    }

    /// Number of async-delivery workers (default 2).
    pub fn dispatch_workers(mut self, n: usize) -> Self {
        self.dispatch_workers = n;
        self
    }

    /// Clock used for change-event timestamps (default [`SystemClock`]).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// ID generator (default ULID over the system clock).
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Build and spawn the dispatch pool. Must run inside a tokio runtime.
    pub fn build(self) -> Result<Observatory, BuildError> {
        if self.dispatch_workers == 0 {
            return Err(BuildError::NoDispatchWorkers);
        }

        let backend = Arc::new(InMemoryBackend::new(
            Arc::clone(&self.clock),
            Arc::clone(&self.ids),
        ));
        let pool = DispatchPool::spawn(self.dispatch_workers);

        Ok(Observatory {
            backend,
            registries: Arc::new(RegistryMap::new()),
            pool,
            ids: self.ids,
        })
    }
}

impl Default for ObservatoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Composition root: the in-memory backend plus the machinery entities need
/// to hand out observation handles.
pub struct Observatory {
    backend: Arc<InMemoryBackend>,
    registries: Arc<RegistryMap>,
    pool: DispatchPool,
    ids: Arc<dyn IdGenerator>,
}

impl Observatory {
    /// Create a fresh observable entity.
    pub fn entity(&self) -> Entity {
        Entity::new(
            self.backend.create_entity(),
            Arc::clone(&self.backend),
            Arc::clone(&self.registries),
            self.pool.handle(),
            Arc::clone(&self.ids),
        )
    }

    /// Create a fresh observable collection.
    pub fn list(&self) -> EntityList {
        EntityList::new(
            self.backend.create_collection(),
            Arc::clone(&self.backend),
            Arc::clone(&self.registries),
            self.pool.handle(),
            Arc::clone(&self.ids),
        )
    }

    /// Handle to a previously created entity, e.g. one received from another
    /// task by id.
    pub fn entity_by_id(&self, id: EntityId) -> Entity {
        Entity::new(
            id,
            Arc::clone(&self.backend),
            Arc::clone(&self.registries),
            self.pool.handle(),
            Arc::clone(&self.ids),
        )
    }

    pub fn dispatch(&self) -> DispatchHandle {
        self.pool.handle()
    }

    /// Stop taking async deliveries; a closure already running finishes.
    pub fn request_shutdown(&self) {
        self.pool.request_shutdown();
    }

    /// Shutdown the dispatch pool and wait for the workers.
    pub async fn shutdown_and_join(self) {
        self.pool.shutdown_and_join().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::facade::{Observable, ObserverOpts};
    use crate::domain::KeyPath;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn build_rejects_zero_workers() {
        let result = ObservatoryBuilder::new().dispatch_workers(0).build();
        assert!(matches!(result, Err(BuildError::NoDispatchWorkers)));
    }

    #[tokio::test]
    async fn built_observatory_observes_end_to_end() {
        let observatory = ObservatoryBuilder::new().build().unwrap();
        let entity = observatory.entity();

        let count = Arc::new(AtomicU32::new(0));
        let cb = Arc::clone(&count);
        entity
            .add_observer(KeyPath::new("score"), ObserverOpts::sync(), move |_, _| {
                cb.fetch_add(1, Ordering::SeqCst);
            })
            .await
            .unwrap();

        entity.set("score", json!(1)).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        observatory.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn entity_by_id_shares_the_registry() {
        let observatory = ObservatoryBuilder::new().build().unwrap();
        let entity = observatory.entity();
        let alias = observatory.entity_by_id(entity.id());

        entity
            .add_observer(KeyPath::new("score"), ObserverOpts::sync(), |_, _| {})
            .await
            .unwrap();

        // The alias sees (and can tear down) the same bookkeeping.
        assert_eq!(alias.remove_all_observers().await.unwrap(), 1);

        observatory.shutdown_and_join().await;
    }
}
