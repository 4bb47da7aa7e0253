//! Core graph types shared between the graph backends and the mapper.
//!
//! Identities are the ones the graph store hands out; graphmap never
//! invents its own node keys.

use serde::{Deserialize, Serialize};

// ── Properties ────────────────────────────────────────────────────

/// A flat property set on a node or relationship.
///
/// Values are JSON scalars or arrays of scalars. Nested objects are not
/// representable in the graph store and are rejected before they get here.
pub type Properties = serde_json::Map<String, serde_json::Value>;

// ── Identities ────────────────────────────────────────────────────

/// Identity of a persisted node, as assigned by the graph store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub i64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a persisted relationship.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationshipId(pub i64);

impl std::fmt::Display for RelationshipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Records ───────────────────────────────────────────────────────

/// A node as read back from the graph store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub properties: Properties,
}

/// Which way a relationship points, seen from the node it was enumerated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// A relationship incident to some node, seen from that node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub id: RelationshipId,
    pub rel_type: String,
    pub properties: Properties,
    /// The endpoint that is not the node the relationship was enumerated for.
    /// For a self-loop this is the node itself.
    pub other: NodeId,
    pub direction: Direction,
}

impl RelationshipRecord {
    /// Whether this relationship has exactly the given type, properties and
    /// other endpoint.
    pub fn matches(&self, rel_type: &str, properties: &Properties, other: NodeId) -> bool {
        self.rel_type == rel_type && self.other == other && &self.properties == properties
    }
}
