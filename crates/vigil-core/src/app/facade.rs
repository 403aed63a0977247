//! Observable / ObservableMembers - 観測 API の表面
//!
//! 「任意のオブジェクトへのメソッド注入」ではなく、観測可能な型が明示的に
//! 実装する capability trait として提供します。

use async_trait::async_trait;

use crate::domain::{
    ChangeEvent, DeliveryMode, EntityId, KeyPath, MemberRange, ObserveOptions, ObserverId,
    VigilError,
};

/// Per-call observer configuration: delivery mode, capture options, and
/// (for collections) the member range.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObserverOpts {
    pub mode: DeliveryMode,
    pub options: ObserveOptions,
    pub range: MemberRange,
}

impl ObserverOpts {
    /// Closure runs inline on the mutating thread.
    pub fn sync() -> Self {
        Self {
            mode: DeliveryMode::Sync,
            ..Self::default()
        }
    }

    /// Closure runs fire-and-forget on the dispatch pool.
    pub fn asynchronous() -> Self {
        Self {
            mode: DeliveryMode::Async,
            ..Self::default()
        }
    }

    pub fn with_options(mut self, options: ObserveOptions) -> Self {
        self.options = options;
        self
    }

    /// Member range for collection observation. Accepts native Rust ranges
    /// (`1..4`, `1..=4`, `..`) as well as an explicit [`MemberRange`].
    pub fn with_range(mut self, range: impl Into<MemberRange>) -> Self {
        self.range = range.into();
        self
    }
}

/// Capability trait for types whose properties can be observed.
///
/// # Contract
/// - `add_observer` の registry 変更は entity ごとに直列化される
/// - `remove_observer` は登録順で最初に一致した observer にだけ作用し、
///   一致がなければ `Ok(None)`（エラーにしない、backend 解除も呼ばれない）
/// - `remove_all_observers` は全 observer を解除して件数を返す
#[async_trait]
pub trait Observable {
    /// Register `callback` to run whenever `path` mutates.
    ///
    /// Duplicate observers for the same path are allowed and deliver
    /// independently.
    async fn add_observer<F>(
        &self,
        path: KeyPath,
        opts: ObserverOpts,
        callback: F,
    ) -> Result<ObserverId, VigilError>
    where
        F: Fn(EntityId, &ChangeEvent) + Send + Sync + 'static;

    /// Remove the first observer (in registration order) for `path`.
    async fn remove_observer(&self, path: &KeyPath) -> Result<Option<ObserverId>, VigilError>;

    /// Remove every observer of this entity; the explicit teardown hook to
    /// call before letting the entity go.
    async fn remove_all_observers(&self) -> Result<usize, VigilError>;
}

/// Capability trait for indexable collections: the same primitives with an
/// added range dimension.
#[async_trait]
pub trait ObservableMembers {
    /// Observe `path` on the members selected by `opts.range` (default: the
    /// whole collection as of this call).
    async fn add_observer_to_members<F>(
        &self,
        path: KeyPath,
        opts: ObserverOpts,
        callback: F,
    ) -> Result<ObserverId, VigilError>
    where
        F: Fn(EntityId, &ChangeEvent) + Send + Sync + 'static;

    /// Scope-cancel the first observer for `path`: the resolved positions
    /// are removed from its member scope, and the observer is fully
    /// cancelled once the scope empties.
    async fn remove_observer_from_members(
        &self,
        path: &KeyPath,
        range: MemberRange,
    ) -> Result<Option<ObserverId>, VigilError>;

    /// Scope-cancel every member observer by the resolved positions.
    /// Returns the number of observers fully cancelled.
    async fn remove_all_member_observers(&self, range: MemberRange)
    -> Result<usize, VigilError>;
}
