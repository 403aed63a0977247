//! KeyPath - 観測対象プロパティの名前
//!
//! # 設計
//! - 値はただの文字列。パスの妥当性チェックは backend の責務（このレイヤーでは
//!   バリデーションしない）
//! - ネストしたパス（"address.city" など）の解釈も backend に委ねる

use serde::{Deserialize, Serialize};
use std::fmt;

/// KeyPath は観測対象のプロパティパス
///
/// 等価性・ハッシュは文字列値そのもの。registry の「最初に一致した handle を
/// 削除する」ルックアップはこの等価性で行われます。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyPath(String);

impl KeyPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for KeyPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for KeyPath {
    fn from(path: String) -> Self {
        Self(path)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
