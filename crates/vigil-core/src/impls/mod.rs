//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryBackend**: 開発・テスト用の変更源（keyed property store）
//! - **Entity / EntityList**: InMemoryBackend 上の観測可能ハンドル
//!
//! # 本番用実装
//! 外部システムを変更源にする backend（ファイル監視、外部ストアなど）は
//! 別クレートに配置します。

pub mod entity;
pub mod inmem;

pub use self::entity::{Entity, EntityList};
pub use self::inmem::InMemoryBackend;
