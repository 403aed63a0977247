//! Change events delivered to observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::path::KeyPath;

/// What produced the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Synthetic event delivered during registration when
    /// `ObserveOptions::initial` is set. Carries the current value as `new`.
    Initial,

    /// A setter ran on the observed path.
    Set,
}

/// One observed mutation.
///
/// `old` / `new` are present only when the registration's
/// [`ObserveOptions`](super::ObserveOptions) requested them, and `old` is
/// `None` for a path that had no prior value. `member` is the collection
/// position for member-scoped observations, `None` for plain entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub path: KeyPath,
    pub kind: ChangeKind,
    pub member: Option<usize>,
    pub old: Option<Value>,
    pub new: Option<Value>,
    pub observed_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn set(
        path: KeyPath,
        old: Option<Value>,
        new: Option<Value>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            path,
            kind: ChangeKind::Set,
            member: None,
            old,
            new,
            observed_at,
        }
    }

    pub fn initial(path: KeyPath, current: Option<Value>, observed_at: DateTime<Utc>) -> Self {
        Self {
            path,
            kind: ChangeKind::Initial,
            member: None,
            old: None,
            new: current,
            observed_at,
        }
    }

    /// Attach the collection position this event was observed at.
    pub fn at_member(mut self, index: usize) -> Self {
        self.member = Some(index);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_event_carries_old_and_new() {
        let event = ChangeEvent::set(
            KeyPath::new("score"),
            Some(json!(0)),
            Some(json!(5)),
            Utc::now(),
        );
        assert_eq!(event.kind, ChangeKind::Set);
        assert_eq!(event.old, Some(json!(0)));
        assert_eq!(event.new, Some(json!(5)));
        assert_eq!(event.member, None);
    }

    #[test]
    fn initial_event_has_no_old_value() {
        let event = ChangeEvent::initial(KeyPath::new("score"), Some(json!(7)), Utc::now());
        assert_eq!(event.kind, ChangeKind::Initial);
        assert!(event.old.is_none());
        assert_eq!(event.new, Some(json!(7)));
    }

    #[test]
    fn at_member_tags_the_position() {
        let event =
            ChangeEvent::set(KeyPath::new("score"), None, Some(json!(1)), Utc::now()).at_member(3);
        assert_eq!(event.member, Some(3));
    }
}
