//! Observation options and delivery mode.

use serde::{Deserialize, Serialize};

/// Which values a [`ChangeEvent`](crate::domain::ChangeEvent) carries, and
/// whether a synthetic initial event is delivered at registration time.
///
/// デフォルトは `{ old: true, new: true, initial: false }`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserveOptions {
    /// Include the value the property held before the mutation.
    pub old: bool,

    /// Include the value the property holds after the mutation.
    pub new: bool,

    /// Deliver one synthetic `Initial` event (carrying the current value)
    /// during registration, before any real mutation.
    pub initial: bool,
}

impl ObserveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial(mut self) -> Self {
        self.initial = true;
        self
    }

    /// Neither old nor new values are captured; the event only reports that
    /// the path changed.
    pub fn bare() -> Self {
        Self {
            old: false,
            new: false,
            initial: false,
        }
    }
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            old: true,
            new: true,
            initial: false,
        }
    }
}

/// How the user closure runs relative to the mutating thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Inline on the thread that performed the mutation, before the setter
    /// returns. May block the mutator.
    #[default]
    Sync,

    /// Fire-and-forget on the dispatch pool. No ordering guarantee relative
    /// to other async deliveries, including deliveries for the same path.
    Async,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_captures_old_and_new() {
        let opts = ObserveOptions::default();
        assert!(opts.old);
        assert!(opts.new);
        assert!(!opts.initial);
    }

    #[test]
    fn bare_captures_nothing() {
        let opts = ObserveOptions::bare();
        assert!(!opts.old);
        assert!(!opts.new);
    }

    #[test]
    fn default_mode_is_sync() {
        assert_eq!(DeliveryMode::default(), DeliveryMode::Sync);
    }
}
