//! Session persistence
//!
//! Storage is a collaborator of the engine, not part of it. The traits
//! here are what the engine needs; [`FileStore`] is a directory-backed
//! implementation that writes whole sessions atomically.

pub mod file;

pub use file::FileStore;

use crate::error::StoreError;
use crate::session::{Session, SessionId};
use crate::space::ParameterVector;

/// Format for stored sessions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StoreFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// Version header, magic bytes, then bincode
    Binary,
}

impl StoreFormat {
    /// File name of a stored session in this format
    pub fn file_name(&self) -> &'static str {
        match self {
            StoreFormat::Json => "session.json",
            StoreFormat::Binary => "session.bin",
        }
    }
}

/// Whole-session snapshot storage
pub trait SessionStore {
    /// Persist every field of the session, replacing any earlier snapshot
    fn save(&self, session: &Session) -> Result<(), StoreError>;

    /// Restore a session exactly as saved
    fn load(&self, session_id: &SessionId) -> Result<Session, StoreError>;

    /// Whether a snapshot exists for the id
    fn exists(&self, session_id: &SessionId) -> bool;
}

/// Storage for the finalized best parameters of a session
pub trait BestParamsStore {
    /// Persist the best parameters
    fn save_best(&self, session_id: &SessionId, params: &ParameterVector)
        -> Result<(), StoreError>;

    /// Load previously saved best parameters
    fn load_best(&self, session_id: &SessionId) -> Result<ParameterVector, StoreError>;
}

/// Prelude for convenient imports
pub mod prelude {
    pub use super::file::*;
    pub use super::{BestParamsStore, SessionStore, StoreFormat};
}
