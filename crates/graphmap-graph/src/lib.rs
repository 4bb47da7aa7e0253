//! graphmap Graph: the graph store capability set and its backends.
//!
//! [`GraphBackend`] is the narrow interface the mapper consumes. Two
//! implementations ship here: [`GraphClient`] talks to Neo4j over Bolt, and
//! [`MemoryGraph`] keeps the whole graph in process.

pub mod backend;
pub mod client;
pub mod memory;
pub mod mutations;
pub mod queries;

pub use backend::GraphBackend;
pub use client::{GraphClient, GraphConfig, GraphError};
pub use memory::MemoryGraph;
