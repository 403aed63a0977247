//! IdGenerator port - ID 生成の抽象化
//!
//! テスト容易性のために trait として抽象化しています。
//!
//! # 実装
//! - **UlidGenerator**: ULID ベース（本番用）

use crate::domain::ids::{EntityId, ObserverId, RegistrationId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator は調整なしで一意な ID を生成
///
/// # Thread Safety
/// - `Send + Sync` を要求（複数スレッドから使える）
pub trait IdGenerator: Send + Sync {
    /// Entity ID を生成
    fn generate_entity_id(&self) -> EntityId;

    /// Observer ID を生成
    fn generate_observer_id(&self) -> ObserverId;

    /// Registration ID を生成
    fn generate_registration_id(&self) -> RegistrationId;
}

/// UlidGenerator は ULID ベースの ID 生成器
///
/// Clock を使って現在時刻ベースの ULID を生成します。
/// これにより、テスト時に FixedClock を使って決定的な timestamp 部を持つ
/// ID を生成できます。
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_entity_id(&self) -> EntityId {
        EntityId::from(self.next())
    }

    fn generate_observer_id(&self) -> ObserverId {
        ObserverId::from(self.next())
    }

    fn generate_registration_id(&self) -> RegistrationId {
        RegistrationId::from(self.next())
    }
}
