//! Entity / EntityList - in-memory backend の観測可能ハンドル
//!
//! どちらも clone 可能な軽量ハンドルで、entity 本体（property map）は
//! backend が所有します。ハンドルは EntityId しか持たないので、observer の
//! bookkeeping が entity の寿命を延ばすことはありません。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::app::dispatch::DispatchHandle;
use crate::app::facade::{Observable, ObservableMembers, ObserverOpts};
use crate::app::handle::ObservationHandle;
use crate::app::registry::RegistryMap;
use crate::domain::{
    ChangeEvent, EntityId, KeyPath, MemberRange, ObserverId, VigilError,
};
use crate::ports::{IdGenerator, ObservationBackend};

use super::inmem::InMemoryBackend;

/// Handle to one observable entity.
#[derive(Clone)]
pub struct Entity {
    id: EntityId,
    backend: Arc<InMemoryBackend>,
    registries: Arc<RegistryMap>,
    dispatch: DispatchHandle,
    ids: Arc<dyn IdGenerator>,
}

impl Entity {
    pub(crate) fn new(
        id: EntityId,
        backend: Arc<InMemoryBackend>,
        registries: Arc<RegistryMap>,
        dispatch: DispatchHandle,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            id,
            backend,
            registries,
            dispatch,
            ids,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Run a setter. Sync observers for this path run inline before this
    /// returns; async observers are enqueued on the dispatch pool.
    pub fn set(&self, path: impl Into<KeyPath>, value: Value) -> Result<(), VigilError> {
        self.backend.set_property(self.id, path.into(), value)
    }

    pub fn get(&self, path: impl Into<KeyPath>) -> Result<Option<Value>, VigilError> {
        self.backend.get_property(self.id, &path.into())
    }
}

#[async_trait]
impl Observable for Entity {
    async fn add_observer<F>(
        &self,
        path: KeyPath,
        opts: ObserverOpts,
        callback: F,
    ) -> Result<ObserverId, VigilError>
    where
        F: Fn(EntityId, &ChangeEvent) + Send + Sync + 'static,
    {
        let registry = self.registries.of(self.id).await;
        let handle = ObservationHandle::register(
            self.ids.generate_observer_id(),
            Arc::clone(&self.backend) as Arc<dyn ObservationBackend>,
            self.dispatch.clone(),
            self.id,
            path,
            opts.mode,
            opts.options,
            Arc::new(callback),
        )?;
        let id = handle.id();
        registry.insert(handle).await;
        Ok(id)
    }

    async fn remove_observer(&self, path: &KeyPath) -> Result<Option<ObserverId>, VigilError> {
        let registry = self.registries.of(self.id).await;
        match registry.remove_first(path).await {
            Some(handle) => {
                handle.cancel()?;
                Ok(Some(handle.id()))
            }
            // Nothing observed this path: a no-op, not an error, and no
            // backend deregistration is issued.
            None => Ok(None),
        }
    }

    async fn remove_all_observers(&self) -> Result<usize, VigilError> {
        let registry = self.registries.of(self.id).await;
        let handles = registry.drain().await;
        for handle in &handles {
            handle.cancel()?;
        }
        Ok(handles.len())
    }
}

/// Handle to one observable collection of entities.
#[derive(Clone)]
pub struct EntityList {
    id: EntityId,
    backend: Arc<InMemoryBackend>,
    registries: Arc<RegistryMap>,
    dispatch: DispatchHandle,
    ids: Arc<dyn IdGenerator>,
}

impl EntityList {
    pub(crate) fn new(
        id: EntityId,
        backend: Arc<InMemoryBackend>,
        registries: Arc<RegistryMap>,
        dispatch: DispatchHandle,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            id,
            backend,
            registries,
            dispatch,
            ids,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn len(&self) -> Result<usize, VigilError> {
        self.backend.member_count(self.id)
    }

    pub fn is_empty(&self) -> Result<bool, VigilError> {
        Ok(self.len()? == 0)
    }

    /// Append a fresh member and return its handle.
    pub fn push(&self) -> Result<Entity, VigilError> {
        let member = self.backend.push_member(self.id)?;
        Ok(self.entity_handle(member))
    }

    /// Handle to the member at `index`.
    pub fn member(&self, index: usize) -> Result<Entity, VigilError> {
        let members = self.backend.member_ids(self.id)?;
        let id = members
            .get(index)
            .copied()
            .ok_or(VigilError::IndexOutOfBounds {
                index,
                len: members.len(),
            })?;
        Ok(self.entity_handle(id))
    }

    fn entity_handle(&self, id: EntityId) -> Entity {
        Entity::new(
            id,
            Arc::clone(&self.backend),
            Arc::clone(&self.registries),
            self.dispatch.clone(),
            Arc::clone(&self.ids),
        )
    }

    fn resolve(&self, range: MemberRange) -> Result<Vec<usize>, VigilError> {
        Ok(range.resolve(self.len()?))
    }
}

#[async_trait]
impl ObservableMembers for EntityList {
    async fn add_observer_to_members<F>(
        &self,
        path: KeyPath,
        opts: ObserverOpts,
        callback: F,
    ) -> Result<ObserverId, VigilError>
    where
        F: Fn(EntityId, &ChangeEvent) + Send + Sync + 'static,
    {
        // Range defaults to Full and is resolved against the collection
        // extent as of this call.
        let positions = self.resolve(opts.range)?;
        let registry = self.registries.of(self.id).await;
        let handle = ObservationHandle::register_members(
            self.ids.generate_observer_id(),
            Arc::clone(&self.backend) as Arc<dyn ObservationBackend>,
            self.dispatch.clone(),
            self.id,
            &positions,
            path,
            opts.mode,
            opts.options,
            Arc::new(callback),
        )?;
        let id = handle.id();
        registry.insert(handle).await;
        Ok(id)
    }

    async fn remove_observer_from_members(
        &self,
        path: &KeyPath,
        range: MemberRange,
    ) -> Result<Option<ObserverId>, VigilError> {
        let positions = self.resolve(range)?;
        let registry = self.registries.of(self.id).await;
        let Some(handle) = registry.find_first(path).await else {
            return Ok(None);
        };

        if handle.cancel_members(&positions)? {
            // Scope emptied: the handle is fully cancelled, drop it from
            // the bookkeeping too.
            registry.remove_by_id(handle.id()).await;
        }
        Ok(Some(handle.id()))
    }

    async fn remove_all_member_observers(
        &self,
        range: MemberRange,
    ) -> Result<usize, VigilError> {
        let positions = self.resolve(range)?;
        let registry = self.registries.of(self.id).await;

        let mut fully_cancelled = 0;
        for handle in registry.snapshot().await {
            if handle.cancel_members(&positions)? {
                registry.remove_by_id(handle.id()).await;
                fully_cancelled += 1;
            }
        }
        Ok(fully_cancelled)
    }
}
