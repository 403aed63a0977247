//! Domain model (IDs, key paths, options, change events, ranges, errors).

pub mod change;
pub mod errors;
pub mod ids;
pub mod options;
pub mod path;
pub mod range;

pub use self::change::{ChangeEvent, ChangeKind};
pub use self::errors::VigilError;
pub use self::ids::{EntityId, ObserverId, RegistrationId};
pub use self::options::{DeliveryMode, ObserveOptions};
pub use self::path::KeyPath;
pub use self::range::MemberRange;
