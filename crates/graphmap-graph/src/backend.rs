//! The graph store capability set consumed by the mapper.

use async_trait::async_trait;

use graphmap_core::{NodeId, NodeRecord, Properties, RelationshipId, RelationshipRecord};

use crate::client::{GraphClient, GraphError};

/// Node/relationship CRUD and indexed lookup against some graph store.
///
/// Every call is a single request; implementations do not retry.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    /// Create a node with the given properties.
    async fn create_node(&self, properties: &Properties) -> Result<NodeId, GraphError>;

    /// Replace all properties of an existing node. `NotFound` if absent.
    async fn update_node(&self, id: NodeId, properties: &Properties) -> Result<(), GraphError>;

    /// Fetch a node by identity.
    async fn get_node(&self, id: NodeId) -> Result<Option<NodeRecord>, GraphError>;

    /// Fetch the node under a unique index entry, creating and indexing one
    /// with `properties` if there is none. An existing node is returned
    /// untouched.
    async fn get_or_create_indexed_node(
        &self,
        index: &str,
        key: &str,
        value: &serde_json::Value,
        properties: &Properties,
    ) -> Result<NodeRecord, GraphError>;

    /// Every node under an index entry, in the order they were indexed.
    async fn get_indexed_nodes(
        &self,
        index: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<NodeRecord>, GraphError>;

    /// Add an existing node to an index entry.
    async fn add_indexed_node(
        &self,
        index: &str,
        key: &str,
        value: &serde_json::Value,
        id: NodeId,
    ) -> Result<(), GraphError>;

    /// Create a relationship `(start)-[:rel_type]->(end)`.
    async fn create_relationship(
        &self,
        start: NodeId,
        rel_type: &str,
        end: NodeId,
        properties: &Properties,
    ) -> Result<RelationshipId, GraphError>;

    /// Every relationship incident to a node, in relationship-id order.
    async fn relationships(&self, id: NodeId) -> Result<Vec<RelationshipRecord>, GraphError>;

    /// Delete a node and every relationship attached to it.
    async fn delete_node(&self, id: NodeId) -> Result<(), GraphError>;

    /// Remove everything.
    async fn clear(&self) -> Result<(), GraphError>;
}

#[async_trait]
impl GraphBackend for GraphClient {
    async fn create_node(&self, properties: &Properties) -> Result<NodeId, GraphError> {
        GraphClient::create_node(self, properties).await
    }

    async fn update_node(&self, id: NodeId, properties: &Properties) -> Result<(), GraphError> {
        GraphClient::update_node(self, id, properties).await
    }

    async fn get_node(&self, id: NodeId) -> Result<Option<NodeRecord>, GraphError> {
        GraphClient::get_node(self, id).await
    }

    async fn get_or_create_indexed_node(
        &self,
        index: &str,
        key: &str,
        value: &serde_json::Value,
        properties: &Properties,
    ) -> Result<NodeRecord, GraphError> {
        GraphClient::get_or_create_indexed_node(self, index, key, value, properties).await
    }

    async fn get_indexed_nodes(
        &self,
        index: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<NodeRecord>, GraphError> {
        GraphClient::get_indexed_nodes(self, index, key, value).await
    }

    async fn add_indexed_node(
        &self,
        index: &str,
        key: &str,
        value: &serde_json::Value,
        id: NodeId,
    ) -> Result<(), GraphError> {
        GraphClient::add_indexed_node(self, index, key, value, id).await
    }

    async fn create_relationship(
        &self,
        start: NodeId,
        rel_type: &str,
        end: NodeId,
        properties: &Properties,
    ) -> Result<RelationshipId, GraphError> {
        GraphClient::create_relationship(self, start, rel_type, end, properties).await
    }

    async fn relationships(&self, id: NodeId) -> Result<Vec<RelationshipRecord>, GraphError> {
        GraphClient::relationships(self, id).await
    }

    async fn delete_node(&self, id: NodeId) -> Result<(), GraphError> {
        GraphClient::delete_node(self, id).await
    }

    async fn clear(&self) -> Result<(), GraphError> {
        GraphClient::clear(self).await
    }
}
