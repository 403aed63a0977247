//! App - アプリケーション層
//!
//! ports を組み合わせて観測レイヤーの本体を実装します。
//!
//! # 主要コンポーネント
//! - **ObservationHandle**: 観測 1 件分のレコード（one-shot cancel）
//! - **ObserverRegistry / RegistryMap**: entity ごとの bookkeeping
//! - **DispatchPool**: async 配送のワーカープール
//! - **Observable / ObservableMembers**: 観測 API の capability trait
//! - **ObservatoryBuilder / Observatory**: ワイヤリング

pub mod builder;
pub mod dispatch;
pub mod facade;
pub mod handle;
pub mod registry;

pub use self::builder::{BuildError, Observatory, ObservatoryBuilder};
pub use self::dispatch::{ChangeCallback, DispatchHandle, DispatchPool};
pub use self::facade::{Observable, ObservableMembers, ObserverOpts};
pub use self::handle::ObservationHandle;
pub use self::registry::{ObserverRegistry, RegistryMap};
