use thiserror::Error;

use crate::id::Id;

#[derive(Error, Debug)]
pub enum MappingError {
    /// The collaborator store could not be reached. Never retried here;
    /// retry policy belongs to the caller.
    #[error("mapping store unavailable: {0}")]
    StoreUnavailable(#[from] authmap_kv::KvError),

    #[error("provided identifier has invalid format")]
    InvalidIdentifier,

    /// A stored record failed to decode. Fatal for the containing scan,
    /// unlike a dangling index entry which is skipped.
    #[error("corrupt mapping record: {0}")]
    CorruptRecord(serde_json::Error),

    #[error("unable to serialize mapping record: {0}")]
    UnprocessableMapping(serde_json::Error),

    #[error("principal {principal} is already mapped to resource {resource}")]
    DuplicateMapping { principal: Id, resource: Id },

    #[error("principal to resource mapping not found")]
    MappingNotFound,

    #[error("no principal found in the calling context")]
    NoPrincipal,
}

pub type Result<T> = std::result::Result<T, MappingError>;
