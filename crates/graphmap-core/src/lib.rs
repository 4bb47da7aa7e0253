//! graphmap-core: Shared types, configuration, and error handling for graphmap.
//!
//! This crate provides the foundational types used across all graphmap crates:
//! - Node and relationship identities as assigned by the graph store
//! - Property maps and the records returned by graph reads
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use error::GraphmapError;
pub use types::{Direction, NodeId, NodeRecord, Properties, RelationshipId, RelationshipRecord};
