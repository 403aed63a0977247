//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 変更検知サブシステム（ObservationBackend）・時刻（Clock）・ID 生成
//! （IdGenerator）を trait として切り出し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - 変更検知そのもの（setter を捉えて before/after を組み立てる仕事）は
//!   backend の責務。このクレートはその登録・解除と配送だけを扱う
//! - backend のエラーは加工せず呼び出し元へ伝播する

pub mod backend;
pub mod clock;
pub mod id_generator;

pub use self::backend::{ChangeSink, ObservationBackend};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
