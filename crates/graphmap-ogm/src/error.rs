//! Error types for the graphmap-ogm crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OgmError {
    #[error("No node found for {0}")]
    NotFound(String),

    /// A graph store failure, passed through as-is.
    #[error(transparent)]
    Store(#[from] graphmap_graph::GraphError),

    #[error("Cannot map field `{field}`: {reason}")]
    Mapping { field: String, reason: String },

    #[error("Entity has no node binding; save it first")]
    NotSaved,

    #[error("Related entity is locked elsewhere")]
    Locked,
}

pub type Result<T> = std::result::Result<T, OgmError>;
