//! vigil-core
//!
//! Closure-based property observation: register a closure to run when a
//! named property of an observed entity changes, synchronously on the
//! mutating thread or asynchronously on a worker pool, with per-entity
//! bookkeeping so observers can be removed one by one or all at once.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, path, options, change, range, errors）
//! - **ports**: 抽象化レイヤー（ObservationBackend, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（handle, registry, dispatch, facade, builder）
//! - **impls**: 実装（InMemoryBackend, Entity/EntityList など開発用）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
