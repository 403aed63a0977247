//! ObserverRegistry - entity ごとの観測 bookkeeping
//!
//! # 設計
//! - registry は entity ごとに 1 つ、初回利用時に遅延生成（RegistryMap）
//! - registry の変更（add/remove/clear）は entity ごとの Mutex で直列化する。
//!   単一のグローバルゲートではなく per-entity ロック
//! - 同一 (path, entity) の重複登録は許可する。削除は登録順で最初に一致した
//!   handle にだけ作用する

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::domain::{EntityId, KeyPath, ObserverId};

use super::handle::ObservationHandle;

/// Ordered list of the active observation handles of one entity.
#[derive(Default)]
pub struct ObserverRegistry {
    handles: Mutex<Vec<Arc<ObservationHandle>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handle. Duplicates per path are allowed; they were
    /// registered independently and deliver independently.
    pub async fn insert(&self, handle: Arc<ObservationHandle>) {
        self.handles.lock().await.push(handle);
    }

    /// Remove and return the first handle (in registration order) observing
    /// `path`. `None` when nothing matches.
    pub async fn remove_first(&self, path: &KeyPath) -> Option<Arc<ObservationHandle>> {
        let mut handles = self.handles.lock().await;
        let index = handles.iter().position(|h| h.path() == path)?;
        Some(handles.remove(index))
    }

    /// First handle observing `path`, left in place.
    pub async fn find_first(&self, path: &KeyPath) -> Option<Arc<ObservationHandle>> {
        let handles = self.handles.lock().await;
        handles.iter().find(|h| h.path() == path).cloned()
    }

    /// Remove a specific handle by observer id.
    pub async fn remove_by_id(&self, id: ObserverId) -> Option<Arc<ObservationHandle>> {
        let mut handles = self.handles.lock().await;
        let index = handles.iter().position(|h| h.id() == id)?;
        Some(handles.remove(index))
    }

    /// Empty the registry, returning every handle in registration order.
    pub async fn drain(&self) -> Vec<Arc<ObservationHandle>> {
        let mut handles = self.handles.lock().await;
        std::mem::take(&mut *handles)
    }

    /// Snapshot of the current handles, left in place.
    pub async fn snapshot(&self) -> Vec<Arc<ObservationHandle>> {
        self.handles.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.handles.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.handles.lock().await.is_empty()
    }
}

/// Lazily-created per-entity registries.
///
/// 共有されるのは map だけで、各 registry のロックは独立。別 entity への
/// add/remove は互いにブロックしません。
#[derive(Default)]
pub struct RegistryMap {
    inner: Mutex<HashMap<EntityId, Arc<ObserverRegistry>>>,
}

impl RegistryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry of `entity`, created on first use.
    pub async fn of(&self, entity: EntityId) -> Arc<ObserverRegistry> {
        let mut inner = self.inner.lock().await;
        Arc::clone(
            inner
                .entry(entity)
                .or_insert_with(|| Arc::new(ObserverRegistry::new())),
        )
    }

    /// The registry of `entity` if one was ever created.
    pub async fn get(&self, entity: EntityId) -> Option<Arc<ObserverRegistry>> {
        self.inner.lock().await.get(&entity).cloned()
    }
}
