//! ObservationHandle - 観測 1 件分の in-memory レコード
//!
//! (entity, path, delivery mode, closure) の組を backend registration と
//! 束ねます。handle は entity を EntityId でしか参照しない（強参照を持たない）
//! ので、bookkeeping が entity の寿命を延ばすことはありません。
//!
//! # State machine
//! Registered (on construction) → Cancelled (terminal). 逆遷移なし。

use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::{
    ChangeEvent, DeliveryMode, EntityId, KeyPath, ObserveOptions, ObserverId, RegistrationId,
    VigilError,
};
use crate::ports::{ChangeSink, ObservationBackend};

use super::dispatch::{ChangeCallback, DeliveryJob, DispatchHandle};

/// One active observation: registered with the backend for its entire
/// lifetime between construction and cancellation.
pub struct ObservationHandle {
    id: ObserverId,
    entity: EntityId,
    path: KeyPath,
    mode: DeliveryMode,
    callback: ChangeCallback,
    backend: Arc<dyn ObservationBackend>,
    dispatch: DispatchHandle,
    registration: OnceLock<RegistrationId>,

    /// One-shot cancel guard: exactly one caller performs the backend
    /// deregistration, every later call is a no-op.
    cancelled: AtomicBool,
}

impl ObservationHandle {
    /// Build a handle and register it with the backend for `(entity, path)`.
    ///
    /// The handle itself is the backend's delivery sink, so registration
    /// happens after construction; change events can start arriving before
    /// this function returns (notably the synthetic `Initial` event).
    #[allow(clippy::too_many_arguments)]
    pub fn register(
        id: ObserverId,
        backend: Arc<dyn ObservationBackend>,
        dispatch: DispatchHandle,
        entity: EntityId,
        path: KeyPath,
        mode: DeliveryMode,
        options: ObserveOptions,
        callback: ChangeCallback,
    ) -> Result<Arc<Self>, VigilError> {
        let handle = Arc::new(Self {
            id,
            entity,
            path: path.clone(),
            mode,
            callback,
            backend: Arc::clone(&backend),
            dispatch,
            registration: OnceLock::new(),
            cancelled: AtomicBool::new(false),
        });

        let sink: Arc<dyn ChangeSink> = Arc::clone(&handle) as Arc<dyn ChangeSink>;
        let registration = backend.register(entity, &path, options, sink)?;
        let _ = handle.registration.set(registration);

        tracing::debug!(observer = %handle.id, entity = %entity, path = %path, "observer registered");
        Ok(handle)
    }

    /// Member-scoped variant: observe `path` on the members of `collection`
    /// at the given positions.
    #[allow(clippy::too_many_arguments)]
    pub fn register_members(
        id: ObserverId,
        backend: Arc<dyn ObservationBackend>,
        dispatch: DispatchHandle,
        collection: EntityId,
        positions: &[usize],
        path: KeyPath,
        mode: DeliveryMode,
        options: ObserveOptions,
        callback: ChangeCallback,
    ) -> Result<Arc<Self>, VigilError> {
        let handle = Arc::new(Self {
            id,
            entity: collection,
            path: path.clone(),
            mode,
            callback,
            backend: Arc::clone(&backend),
            dispatch,
            registration: OnceLock::new(),
            cancelled: AtomicBool::new(false),
        });

        let sink: Arc<dyn ChangeSink> = Arc::clone(&handle) as Arc<dyn ChangeSink>;
        let registration = backend.register_members(collection, positions, &path, options, sink)?;
        let _ = handle.registration.set(registration);

        tracing::debug!(
            observer = %handle.id,
            collection = %collection,
            path = %path,
            members = positions.len(),
            "member observer registered"
        );
        Ok(handle)
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    /// The observed entity (collection id for member-scoped handles).
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    pub fn path(&self) -> &KeyPath {
        &self.path
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Deregister from the backend. Idempotent: returns `Ok(true)` for the
    /// call that actually performed the deregistration, `Ok(false)` for
    /// every call after it.
    pub fn cancel(&self) -> Result<bool, VigilError> {
        if self
            .cancelled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(false);
        }

        if let Some(&registration) = self.registration.get() {
            self.backend.deregister(registration)?;
        }
        tracing::debug!(observer = %self.id, path = %self.path, "observer cancelled");
        Ok(true)
    }

    /// Shrink a member-scoped handle by the given positions. When the scope
    /// empties, the handle transitions to Cancelled and is fully
    /// deregistered; returns `Ok(true)` in that case.
    pub fn cancel_members(&self, positions: &[usize]) -> Result<bool, VigilError> {
        if self.is_cancelled() {
            return Ok(false);
        }
        let Some(&registration) = self.registration.get() else {
            return Ok(false);
        };

        let remaining = self.backend.deregister_members(registration, positions)?;
        if remaining == 0 {
            return self.cancel();
        }
        Ok(false)
    }
}

impl ChangeSink for ObservationHandle {
    fn deliver(&self, entity: EntityId, change: &ChangeEvent) {
        // A delivery can race a concurrent cancel; the flag makes the
        // cancelled side lose quietly instead of running a dead closure.
        if self.is_cancelled() {
            return;
        }

        match self.mode {
            DeliveryMode::Sync => (self.callback)(entity, change),
            DeliveryMode::Async => self.dispatch.enqueue(DeliveryJob {
                callback: Arc::clone(&self.callback),
                entity,
                change: change.clone(),
            }),
        }
    }
}

impl std::fmt::Debug for ObservationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationHandle")
            .field("id", &self.id)
            .field("entity", &self.entity)
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::dispatch::DispatchPool;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicU32;
    use ulid::Ulid;

    /// Minimal backend double recording register/deregister traffic.
    #[derive(Default)]
    struct RecordingBackend {
        registered: Mutex<Vec<RegistrationId>>,
        deregistered: Mutex<Vec<RegistrationId>>,
    }

    impl ObservationBackend for RecordingBackend {
        fn register(
            &self,
            _entity: EntityId,
            _path: &KeyPath,
            _options: ObserveOptions,
            _sink: Arc<dyn ChangeSink>,
        ) -> Result<RegistrationId, VigilError> {
            let id = RegistrationId::from_ulid(Ulid::new());
            self.registered.lock().unwrap().push(id);
            Ok(id)
        }

        fn register_members(
            &self,
            entity: EntityId,
            _positions: &[usize],
            path: &KeyPath,
            options: ObserveOptions,
            sink: Arc<dyn ChangeSink>,
        ) -> Result<RegistrationId, VigilError> {
            self.register(entity, path, options, sink)
        }

        fn deregister(&self, registration: RegistrationId) -> Result<(), VigilError> {
            let mut deregistered = self.deregistered.lock().unwrap();
            if deregistered.contains(&registration) {
                return Err(VigilError::UnknownRegistration(registration));
            }
            deregistered.push(registration);
            Ok(())
        }

        fn deregister_members(
            &self,
            _registration: RegistrationId,
            _positions: &[usize],
        ) -> Result<usize, VigilError> {
            Ok(0)
        }
    }

    fn make_handle(
        backend: Arc<RecordingBackend>,
        dispatch: DispatchHandle,
        mode: DeliveryMode,
        callback: ChangeCallback,
    ) -> Arc<ObservationHandle> {
        ObservationHandle::register(
            ObserverId::from_ulid(Ulid::new()),
            backend,
            dispatch,
            EntityId::from_ulid(Ulid::new()),
            KeyPath::new("score"),
            mode,
            ObserveOptions::default(),
            callback,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn cancel_is_one_shot() {
        let backend = Arc::new(RecordingBackend::default());
        let pool = DispatchPool::spawn(1);

        let handle = make_handle(
            Arc::clone(&backend),
            pool.handle(),
            DeliveryMode::Sync,
            Arc::new(|_, _| {}),
        );

        assert!(!handle.is_cancelled());
        assert!(handle.cancel().unwrap());
        assert!(handle.is_cancelled());

        // Second cancel is a guarded no-op, not a backend error.
        assert!(!handle.cancel().unwrap());
        assert_eq!(backend.deregistered.lock().unwrap().len(), 1);

        pool.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn sync_delivery_runs_inline() {
        let backend = Arc::new(RecordingBackend::default());
        let pool = DispatchPool::spawn(1);
        let count = Arc::new(AtomicU32::new(0));

        let count_cb = Arc::clone(&count);
        let handle = make_handle(
            backend,
            pool.handle(),
            DeliveryMode::Sync,
            Arc::new(move |_, _| {
                count_cb.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let change = ChangeEvent::set(KeyPath::new("score"), None, None, Utc::now());
        handle.deliver(handle.entity(), &change);

        // Inline: visible immediately, no await needed.
        assert_eq!(count.load(Ordering::SeqCst), 1);

        pool.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn delivery_after_cancel_is_dropped() {
        let backend = Arc::new(RecordingBackend::default());
        let pool = DispatchPool::spawn(1);
        let count = Arc::new(AtomicU32::new(0));

        let count_cb = Arc::clone(&count);
        let handle = make_handle(
            backend,
            pool.handle(),
            DeliveryMode::Sync,
            Arc::new(move |_, _| {
                count_cb.fetch_add(1, Ordering::SeqCst);
            }),
        );

        handle.cancel().unwrap();

        let change = ChangeEvent::set(KeyPath::new("score"), None, None, Utc::now());
        handle.deliver(handle.entity(), &change);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        pool.shutdown_and_join().await;
    }

    #[tokio::test]
    async fn async_delivery_goes_through_the_pool() {
        let backend = Arc::new(RecordingBackend::default());
        let pool = DispatchPool::spawn(2);
        let count = Arc::new(AtomicU32::new(0));
        let notify = Arc::new(tokio::sync::Notify::new());

        let count_cb = Arc::clone(&count);
        let notify_cb = Arc::clone(&notify);
        let handle = make_handle(
            backend,
            pool.handle(),
            DeliveryMode::Async,
            Arc::new(move |_, _| {
                count_cb.fetch_add(1, Ordering::SeqCst);
                notify_cb.notify_one();
            }),
        );

        let change = ChangeEvent::set(KeyPath::new("score"), None, None, Utc::now());
        handle.deliver(handle.entity(), &change);

        tokio::time::timeout(std::time::Duration::from_secs(1), notify.notified())
            .await
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        pool.shutdown_and_join().await;
    }
}
