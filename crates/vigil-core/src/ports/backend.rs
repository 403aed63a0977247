//! ObservationBackend port - 変更検知サブシステムの抽象化
//!
//! 実際の変更検知（プロパティのミューテーションを捉えて before/after を
//! 組み立てる仕事）は外部サービスとして消費します。この trait はその
//! 登録・解除面だけを切り出したものです。
//!
//! # 実装
//! - **InMemoryBackend**: 開発・テスト用（impls/inmem）
//! - 将来: ファイル監視や外部ストアを変更源にする backend は別クレートに配置

use std::sync::Arc;

use crate::domain::{ChangeEvent, EntityId, KeyPath, ObserveOptions, RegistrationId, VigilError};

/// Delivery callback the backend invokes when an observed path mutates.
///
/// # Thread Safety
/// - backend はミューテーションを実行したスレッド上で呼ぶ
/// - `Send + Sync` を要求（どのスレッドから変更が来てもよい）
pub trait ChangeSink: Send + Sync {
    /// Invoked exclusively by the backend, never by user code.
    fn deliver(&self, entity: EntityId, change: &ChangeEvent);
}

/// ObservationBackend は (entity, path) の観測登録・解除を提供
///
/// # 契約
/// - `register` が返した [`RegistrationId`] は、`deregister` されるまで
///   有効で、その間 sink に変更イベントが届く
/// - 同じ registration を二重に `deregister` した場合は
///   [`VigilError::UnknownRegistration`]（呼び出し側の handle が
///   one-shot ガードで防ぐ前提）
/// - エラーは加工せずそのまま登録・解除の呼び出し元へ伝播する
pub trait ObservationBackend: Send + Sync {
    /// Observe `path` on a single entity.
    fn register(
        &self,
        entity: EntityId,
        path: &KeyPath,
        options: ObserveOptions,
        sink: Arc<dyn ChangeSink>,
    ) -> Result<RegistrationId, VigilError>;

    /// Observe `path` on the members of a collection at the given positions.
    ///
    /// An empty position set is legal and observes nothing.
    fn register_members(
        &self,
        collection: EntityId,
        positions: &[usize],
        path: &KeyPath,
        options: ObserveOptions,
        sink: Arc<dyn ChangeSink>,
    ) -> Result<RegistrationId, VigilError>;

    /// Tear down a registration entirely.
    fn deregister(&self, registration: RegistrationId) -> Result<(), VigilError>;

    /// Remove the given positions from a member-scoped registration.
    ///
    /// Returns the number of positions still observed; the caller is
    /// expected to `deregister` fully once this reaches zero.
    fn deregister_members(
        &self,
        registration: RegistrationId,
        positions: &[usize],
    ) -> Result<usize, VigilError>;
}
