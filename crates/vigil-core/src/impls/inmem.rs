//! In-memory observation backend.
//!
//! 開発・テスト用の変更源。フラットな (KeyPath → Value) プロパティストアを
//! 持ち、setter が走るたびに登録済み sink へ変更イベントを配送します。
//! 等価チェックによる省略はしない（同じ値を set しても毎回通知する）。
//!
//! ネストしたパスの解釈はしません。パスは不透明なキーとして扱います。

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;

use crate::domain::{
    ChangeEvent, EntityId, KeyPath, ObserveOptions, RegistrationId, VigilError,
};
use crate::ports::{
    ChangeSink, Clock, IdGenerator, ObservationBackend, SystemClock, UlidGenerator,
};

/// What a registration is scoped to.
enum Target {
    /// A single entity.
    Entity(EntityId),

    /// The members of a collection at the given positions.
    Members {
        collection: EntityId,
        positions: BTreeSet<usize>,
    },
}

struct RegistrationRecord {
    target: Target,
    path: KeyPath,
    options: ObserveOptions,
    sink: Arc<dyn ChangeSink>,
}

/// In-memory backend state (single source of truth).
#[derive(Default)]
struct BackendState {
    /// Property maps, one per entity. Collections are entities too.
    entities: HashMap<EntityId, HashMap<KeyPath, Value>>,

    /// Collection membership (ordered).
    collections: HashMap<EntityId, Vec<EntityId>>,

    /// Active registrations.
    registrations: HashMap<RegistrationId, RegistrationRecord>,
}

/// One pending delivery, collected under the lock and run outside it.
struct PendingDelivery {
    sink: Arc<dyn ChangeSink>,
    entity: EntityId,
    change: ChangeEvent,
}

/// In-memory observation backend implementation.
pub struct InMemoryBackend {
    state: Mutex<BackendState>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryBackend {
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            state: Mutex::new(BackendState::default()),
            clock,
            ids,
        }
    }

    /// System clock + ULID ids; the wiring everything but the builder wants.
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(SystemClock),
            Arc::new(UlidGenerator::new(SystemClock)),
        )
    }

    // Poisoning only happens if a sink panicked while we were delivering;
    // the state itself is still consistent, so keep going.
    fn lock_state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an entity with an empty property map.
    pub fn create_entity(&self) -> EntityId {
        let id = self.ids.generate_entity_id();
        self.lock_state().entities.insert(id, HashMap::new());
        id
    }

    /// Create an empty collection. A collection is itself an entity (it can
    /// carry its own properties) plus an ordered member list.
    pub fn create_collection(&self) -> EntityId {
        let id = self.ids.generate_entity_id();
        let mut state = self.lock_state();
        state.entities.insert(id, HashMap::new());
        state.collections.insert(id, Vec::new());
        id
    }

    /// Append a fresh member entity to a collection.
    pub fn push_member(&self, collection: EntityId) -> Result<EntityId, VigilError> {
        let id = self.ids.generate_entity_id();
        let mut state = self.lock_state();
        if !state.collections.contains_key(&collection) {
            return Err(VigilError::NotACollection(collection));
        }
        state.entities.insert(id, HashMap::new());
        state
            .collections
            .get_mut(&collection)
            .ok_or(VigilError::NotACollection(collection))?
            .push(id);
        Ok(id)
    }

    pub fn member_ids(&self, collection: EntityId) -> Result<Vec<EntityId>, VigilError> {
        let state = self.lock_state();
        state
            .collections
            .get(&collection)
            .cloned()
            .ok_or(VigilError::NotACollection(collection))
    }

    pub fn member_count(&self, collection: EntityId) -> Result<usize, VigilError> {
        Ok(self.member_ids(collection)?.len())
    }

    pub fn get_property(
        &self,
        entity: EntityId,
        path: &KeyPath,
    ) -> Result<Option<Value>, VigilError> {
        let state = self.lock_state();
        let props = state
            .entities
            .get(&entity)
            .ok_or(VigilError::UnknownEntity(entity))?;
        Ok(props.get(path).cloned())
    }

    /// Run a setter: store the value, then deliver one change event to every
    /// registration observing `(entity, path)` — including member-scoped
    /// registrations whose collection contains `entity` at an observed
    /// position. Delivery happens on the calling thread, after the lock is
    /// released and before this function returns.
    pub fn set_property(
        &self,
        entity: EntityId,
        path: KeyPath,
        value: Value,
    ) -> Result<(), VigilError> {
        let pending = {
            let mut state = self.lock_state();
            let props = state
                .entities
                .get_mut(&entity)
                .ok_or(VigilError::UnknownEntity(entity))?;
            let old = props.insert(path.clone(), value.clone());

            let observed_at = self.clock.now();
            let mut pending = Vec::new();
            for record in state.registrations.values() {
                if record.path != path {
                    continue;
                }
                match &record.target {
                    Target::Entity(observed) if *observed == entity => {
                        pending.push(PendingDelivery {
                            sink: Arc::clone(&record.sink),
                            entity,
                            change: ChangeEvent::set(
                                path.clone(),
                                capture(record.options.old, &old),
                                capture(record.options.new, &Some(value.clone())),
                                observed_at,
                            ),
                        });
                    }
                    Target::Members {
                        collection,
                        positions,
                    } => {
                        let Some(members) = state.collections.get(collection) else {
                            continue;
                        };
                        let Some(index) = members.iter().position(|m| *m == entity) else {
                            continue;
                        };
                        if !positions.contains(&index) {
                            continue;
                        }
                        pending.push(PendingDelivery {
                            sink: Arc::clone(&record.sink),
                            entity,
                            change: ChangeEvent::set(
                                path.clone(),
                                capture(record.options.old, &old),
                                capture(record.options.new, &Some(value.clone())),
                                observed_at,
                            )
                            .at_member(index),
                        });
                    }
                    Target::Entity(_) => {}
                }
            }
            pending
        }; // Lock released here; sinks run on the mutating thread.

        for delivery in pending {
            delivery.sink.deliver(delivery.entity, &delivery.change);
        }
        Ok(())
    }
}

/// Apply a capture option to a value slot.
fn capture(wanted: bool, value: &Option<Value>) -> Option<Value> {
    if wanted { value.clone() } else { None }
}

impl ObservationBackend for InMemoryBackend {
    fn register(
        &self,
        entity: EntityId,
        path: &KeyPath,
        options: ObserveOptions,
        sink: Arc<dyn ChangeSink>,
    ) -> Result<RegistrationId, VigilError> {
        let (id, pending) = {
            let mut state = self.lock_state();
            if !state.entities.contains_key(&entity) {
                return Err(VigilError::UnknownEntity(entity));
            }

            let mut pending = Vec::new();
            if options.initial {
                let current = state
                    .entities
                    .get(&entity)
                    .and_then(|props| props.get(path))
                    .cloned();
                pending.push(PendingDelivery {
                    sink: Arc::clone(&sink),
                    entity,
                    change: ChangeEvent::initial(
                        path.clone(),
                        capture(options.new, &current),
                        self.clock.now(),
                    ),
                });
            }

            let id = self.ids.generate_registration_id();
            state.registrations.insert(
                id,
                RegistrationRecord {
                    target: Target::Entity(entity),
                    path: path.clone(),
                    options,
                    sink,
                },
            );
            (id, pending)
        };

        for delivery in pending {
            delivery.sink.deliver(delivery.entity, &delivery.change);
        }
        tracing::debug!(registration = %id, entity = %entity, path = %path, "registered");
        Ok(id)
    }

    fn register_members(
        &self,
        collection: EntityId,
        positions: &[usize],
        path: &KeyPath,
        options: ObserveOptions,
        sink: Arc<dyn ChangeSink>,
    ) -> Result<RegistrationId, VigilError> {
        let (id, pending) = {
            let mut state = self.lock_state();
            let members = state
                .collections
                .get(&collection)
                .ok_or(VigilError::NotACollection(collection))?;
            let len = members.len();
            for &index in positions {
                if index >= len {
                    return Err(VigilError::IndexOutOfBounds { index, len });
                }
            }
            let members = members.clone();

            let mut pending = Vec::new();
            if options.initial {
                let observed_at = self.clock.now();
                for &index in positions {
                    let member = members[index];
                    let current = state
                        .entities
                        .get(&member)
                        .and_then(|props| props.get(path))
                        .cloned();
                    pending.push(PendingDelivery {
                        sink: Arc::clone(&sink),
                        entity: member,
                        change: ChangeEvent::initial(
                            path.clone(),
                            capture(options.new, &current),
                            observed_at,
                        )
                        .at_member(index),
                    });
                }
            }

            let id = self.ids.generate_registration_id();
            state.registrations.insert(
                id,
                RegistrationRecord {
                    target: Target::Members {
                        collection,
                        positions: positions.iter().copied().collect(),
                    },
                    path: path.clone(),
                    options,
                    sink,
                },
            );
            (id, pending)
        };

        for delivery in pending {
            delivery.sink.deliver(delivery.entity, &delivery.change);
        }
        tracing::debug!(
            registration = %id,
            collection = %collection,
            path = %path,
            members = positions.len(),
            "member registration"
        );
        Ok(id)
    }

    fn deregister(&self, registration: RegistrationId) -> Result<(), VigilError> {
        let mut state = self.lock_state();
        state
            .registrations
            .remove(&registration)
            .ok_or(VigilError::UnknownRegistration(registration))?;
        tracing::debug!(registration = %registration, "deregistered");
        Ok(())
    }

    fn deregister_members(
        &self,
        registration: RegistrationId,
        positions: &[usize],
    ) -> Result<usize, VigilError> {
        let mut state = self.lock_state();
        let record = state
            .registrations
            .get_mut(&registration)
            .ok_or(VigilError::UnknownRegistration(registration))?;
        match &mut record.target {
            Target::Members {
                positions: scope, ..
            } => {
                for index in positions {
                    scope.remove(index);
                }
                Ok(scope.len())
            }
            Target::Entity(_) => Err(VigilError::Backend(format!(
                "registration {registration} is not member-scoped"
            ))),
        }
    }
}
