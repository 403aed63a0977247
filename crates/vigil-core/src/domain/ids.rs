//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID + ジェネリック実装
//! ID は ULID (Universally Unique Lexicographically Sortable Identifier) を
//! 使用します。Phantom type パターンで共通実装を 1 つにまとめつつ、
//! `EntityId` と `ObserverId` を型レベルで区別します。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: timestamp が先頭にあるため、登録順にソートできる
//! - **分散生成可能**: 調整なしで複数スレッドから生成できる
//! - **UUID互換**: 128-bit で UUID と同じサイズ

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"entity-", "observer-", "reg-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    /// Display で使うプレフィックス（例: "entity-"）
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData で、実行時にはメモリを消費しませんが、
/// コンパイル時に型安全性を提供します。
///
/// # 例
/// ```ignore
/// let entity_id: EntityId = Id::from(Ulid::new());
/// let observer_id: ObserverId = Id::from(Ulid::new());
/// // entity_id と observer_id は異なる型なので、混同できない
/// ```
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// ULID から Id を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// 内部の ULID を取得
    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Entity のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Entity {}

impl IdMarker for Entity {
    fn prefix() -> &'static str {
        "entity-"
    }
}

/// Observer のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Observer {}

impl IdMarker for Observer {
    fn prefix() -> &'static str {
        "observer-"
    }
}

/// Registration のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Registration {}

impl IdMarker for Registration {
    fn prefix() -> &'static str {
        "reg-"
    }
}

// ========================================
// Type Alias（使いやすさのため）
// ========================================

/// Identifier of an observed entity (object or collection).
pub type EntityId = Id<Entity>;

/// Identifier of an observation handle (registry bookkeeping unit).
pub type ObserverId = Id<Observer>;

/// Identifier of a backend registration (register/deregister unit).
pub type RegistrationId = Id<Registration>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let ulid1 = Ulid::new();
        let ulid2 = Ulid::new();
        let ulid3 = Ulid::new();

        let entity = EntityId::from_ulid(ulid1);
        let observer = ObserverId::from_ulid(ulid2);
        let registration = RegistrationId::from_ulid(ulid3);

        assert_eq!(entity.as_ulid(), ulid1);
        assert_eq!(observer.as_ulid(), ulid2);
        assert_eq!(registration.as_ulid(), ulid3);

        // Display のプレフィックスが正しいことを確認
        assert!(entity.to_string().starts_with("entity-"));
        assert!(observer.to_string().starts_with("observer-"));
        assert!(registration.to_string().starts_with("reg-"));

        // The whole point: you can't accidentally mix these types.
        // (This is a compile-time property, so we just keep it as a comment.)
        // let _: EntityId = observer; // <- does not compile
    }

    #[test]
    fn ulid_ids_are_sortable() {
        // ULID は時刻ベースなので、生成順序でソート可能
        let id1 = EntityId::from_ulid(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = EntityId::from_ulid(Ulid::new());

        assert!(id1 < id2);
    }

    #[test]
    fn ids_serde_roundtrip() {
        let id = ObserverId::from_ulid(Ulid::new());
        let json = serde_json::to_string(&id).unwrap();
        let back: ObserverId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
