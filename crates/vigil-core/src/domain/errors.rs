use thiserror::Error;

use super::ids::{EntityId, RegistrationId};

#[derive(Debug, Error)]
pub enum VigilError {
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),

    #[error("unknown registration {0}")]
    UnknownRegistration(RegistrationId),

    #[error("member index {index} out of bounds for collection of {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("entity {0} is not a collection")]
    NotACollection(EntityId),

    #[error("backend error: {0}")]
    Backend(String),
}
