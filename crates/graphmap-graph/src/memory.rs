//! In-process graph store.
//!
//! Holds nodes, relationships and indexes behind a single lock. Indexes are
//! kept apart from node properties, so changing a property never moves a
//! node in or out of an index. Identities are handed out sequentially from 0
//! and never reused.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use graphmap_core::{Direction, NodeId, NodeRecord, Properties, RelationshipId, RelationshipRecord};

use crate::backend::GraphBackend;
use crate::client::GraphError;

/// An in-memory [`GraphBackend`].
#[derive(Debug, Default)]
pub struct MemoryGraph {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_node: i64,
    next_relationship: i64,
    nodes: BTreeMap<NodeId, Properties>,
    relationships: BTreeMap<RelationshipId, StoredRelationship>,
    indexes: HashMap<IndexEntry, Vec<NodeId>>,
}

#[derive(Debug, Clone)]
struct StoredRelationship {
    start: NodeId,
    end: NodeId,
    rel_type: String,
    properties: Properties,
}

/// `(index, key, value)` with the value in canonical JSON form, since
/// `serde_json::Value` is not hashable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IndexEntry {
    index: String,
    key: String,
    value: String,
}

impl IndexEntry {
    fn new(index: &str, key: &str, value: &serde_json::Value) -> Self {
        Self {
            index: index.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

impl Inner {
    fn insert_node(&mut self, properties: &Properties) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(id, properties.clone());
        id
    }

    fn record(&self, id: NodeId) -> Option<NodeRecord> {
        self.nodes.get(&id).map(|properties| NodeRecord {
            id,
            properties: properties.clone(),
        })
    }
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes currently stored.
    pub async fn node_count(&self) -> usize {
        self.inner.read().await.nodes.len()
    }

    /// Number of relationships currently stored.
    pub async fn relationship_count(&self) -> usize {
        self.inner.read().await.relationships.len()
    }
}

#[async_trait]
impl GraphBackend for MemoryGraph {
    async fn create_node(&self, properties: &Properties) -> Result<NodeId, GraphError> {
        let id = self.inner.write().await.insert_node(properties);
        tracing::debug!(node_id = %id, "Node created");
        Ok(id)
    }

    async fn update_node(&self, id: NodeId, properties: &Properties) -> Result<(), GraphError> {
        let mut inner = self.inner.write().await;
        match inner.nodes.get_mut(&id) {
            Some(stored) => {
                *stored = properties.clone();
                tracing::debug!(node_id = %id, "Node updated");
                Ok(())
            }
            None => Err(GraphError::node_not_found(id)),
        }
    }

    async fn get_node(&self, id: NodeId) -> Result<Option<NodeRecord>, GraphError> {
        Ok(self.inner.read().await.record(id))
    }

    async fn get_or_create_indexed_node(
        &self,
        index: &str,
        key: &str,
        value: &serde_json::Value,
        properties: &Properties,
    ) -> Result<NodeRecord, GraphError> {
        let entry = IndexEntry::new(index, key, value);
        let mut inner = self.inner.write().await;

        let existing = inner
            .indexes
            .get(&entry)
            .and_then(|ids| ids.first().copied());
        if let Some(record) = existing.and_then(|id| inner.record(id)) {
            return Ok(record);
        }

        let id = inner.insert_node(properties);
        inner.indexes.entry(entry).or_default().push(id);
        tracing::debug!(node_id = %id, index, key, "Indexed node created");

        Ok(NodeRecord {
            id,
            properties: properties.clone(),
        })
    }

    async fn get_indexed_nodes(
        &self,
        index: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<NodeRecord>, GraphError> {
        let inner = self.inner.read().await;
        let records: Vec<NodeRecord> = inner
            .indexes
            .get(&IndexEntry::new(index, key, value))
            .map(|ids| ids.iter().filter_map(|id| inner.record(*id)).collect())
            .unwrap_or_default();
        Ok(records)
    }

    async fn add_indexed_node(
        &self,
        index: &str,
        key: &str,
        value: &serde_json::Value,
        id: NodeId,
    ) -> Result<(), GraphError> {
        let mut inner = self.inner.write().await;
        if !inner.nodes.contains_key(&id) {
            return Err(GraphError::node_not_found(id));
        }

        let ids = inner
            .indexes
            .entry(IndexEntry::new(index, key, value))
            .or_default();
        if !ids.contains(&id) {
            ids.push(id);
        }
        Ok(())
    }

    async fn create_relationship(
        &self,
        start: NodeId,
        rel_type: &str,
        end: NodeId,
        properties: &Properties,
    ) -> Result<RelationshipId, GraphError> {
        let mut inner = self.inner.write().await;
        for endpoint in [start, end] {
            if !inner.nodes.contains_key(&endpoint) {
                return Err(GraphError::node_not_found(endpoint));
            }
        }

        let id = RelationshipId(inner.next_relationship);
        inner.next_relationship += 1;
        inner.relationships.insert(
            id,
            StoredRelationship {
                start,
                end,
                rel_type: rel_type.to_string(),
                properties: properties.clone(),
            },
        );

        tracing::debug!(%start, %end, rel_type, rel_id = %id, "Relationship created");
        Ok(id)
    }

    async fn relationships(&self, id: NodeId) -> Result<Vec<RelationshipRecord>, GraphError> {
        let inner = self.inner.read().await;
        if !inner.nodes.contains_key(&id) {
            return Err(GraphError::node_not_found(id));
        }

        let records: Vec<RelationshipRecord> = inner
            .relationships
            .iter()
            .filter_map(|(rel_id, rel)| {
                let (other, direction) = if rel.start == id {
                    (rel.end, Direction::Outgoing)
                } else if rel.end == id {
                    (rel.start, Direction::Incoming)
                } else {
                    return None;
                };
                Some(RelationshipRecord {
                    id: *rel_id,
                    rel_type: rel.rel_type.clone(),
                    properties: rel.properties.clone(),
                    other,
                    direction,
                })
            })
            .collect();
        Ok(records)
    }

    async fn delete_node(&self, id: NodeId) -> Result<(), GraphError> {
        let mut inner = self.inner.write().await;
        if inner.nodes.remove(&id).is_none() {
            return Ok(());
        }

        inner
            .relationships
            .retain(|_, rel| rel.start != id && rel.end != id);
        for ids in inner.indexes.values_mut() {
            ids.retain(|indexed| *indexed != id);
        }
        inner.indexes.retain(|_, ids| !ids.is_empty());

        tracing::debug!(node_id = %id, "Node deleted");
        Ok(())
    }

    async fn clear(&self) -> Result<(), GraphError> {
        let mut inner = self.inner.write().await;
        inner.nodes.clear();
        inner.relationships.clear();
        inner.indexes.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: serde_json::Value) -> Properties {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn create_update_and_get_node() {
        let graph = MemoryGraph::new();
        let id = graph.create_node(&props(json!({"name": "Alice"}))).await.unwrap();

        graph
            .update_node(id, &props(json!({"name": "Alice Allison"})))
            .await
            .unwrap();

        let record = graph.get_node(id).await.unwrap().unwrap();
        assert_eq!(record.properties, props(json!({"name": "Alice Allison"})));
        assert!(graph.get_node(NodeId(99)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_missing_node_is_not_found() {
        let graph = MemoryGraph::new();
        let result = graph.update_node(NodeId(3), &Properties::new()).await;
        assert!(matches!(result, Err(GraphError::NotFound { .. })));
    }

    #[tokio::test]
    async fn get_or_create_reuses_existing_node() {
        let graph = MemoryGraph::new();
        let email = json!("alice@example.com");

        let first = graph
            .get_or_create_indexed_node("People", "email", &email, &props(json!({"age": 34})))
            .await
            .unwrap();
        let second = graph
            .get_or_create_indexed_node("People", "email", &email, &props(json!({"age": 99})))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.properties, props(json!({"age": 34})));
        assert_eq!(graph.node_count().await, 1);
    }

    #[tokio::test]
    async fn index_values_are_typed() {
        let graph = MemoryGraph::new();
        graph
            .get_or_create_indexed_node("Codes", "code", &json!(7), &Properties::new())
            .await
            .unwrap();

        let as_string = graph
            .get_indexed_nodes("Codes", "code", &json!("7"))
            .await
            .unwrap();
        assert!(as_string.is_empty());

        let as_number = graph
            .get_indexed_nodes("Codes", "code", &json!(7))
            .await
            .unwrap();
        assert_eq!(as_number.len(), 1);
    }

    #[tokio::test]
    async fn relationships_report_direction_and_other_endpoint() {
        let graph = MemoryGraph::new();
        let alice = graph.create_node(&Properties::new()).await.unwrap();
        let bob = graph.create_node(&Properties::new()).await.unwrap();

        graph
            .create_relationship(alice, "LIKES", bob, &props(json!({"since": 1999})))
            .await
            .unwrap();

        let from_alice = graph.relationships(alice).await.unwrap();
        assert_eq!(from_alice.len(), 1);
        assert_eq!(from_alice[0].other, bob);
        assert_eq!(from_alice[0].direction, Direction::Outgoing);

        let from_bob = graph.relationships(bob).await.unwrap();
        assert_eq!(from_bob[0].other, alice);
        assert_eq!(from_bob[0].direction, Direction::Incoming);
    }

    #[tokio::test]
    async fn relationship_to_missing_node_fails() {
        let graph = MemoryGraph::new();
        let alice = graph.create_node(&Properties::new()).await.unwrap();
        let result = graph
            .create_relationship(alice, "LIKES", NodeId(42), &Properties::new())
            .await;
        assert!(matches!(result, Err(GraphError::NotFound { .. })));
        assert_eq!(graph.relationship_count().await, 0);
    }

    #[tokio::test]
    async fn delete_detaches_and_unindexes() {
        let graph = MemoryGraph::new();
        let value = json!("alice@example.com");
        let alice = graph
            .get_or_create_indexed_node("People", "email", &value, &Properties::new())
            .await
            .unwrap()
            .id;
        let bob = graph.create_node(&Properties::new()).await.unwrap();
        graph
            .create_relationship(alice, "LIKES", bob, &Properties::new())
            .await
            .unwrap();

        graph.delete_node(alice).await.unwrap();

        assert_eq!(graph.node_count().await, 1);
        assert_eq!(graph.relationship_count().await, 0);
        assert!(graph
            .get_indexed_nodes("People", "email", &value)
            .await
            .unwrap()
            .is_empty());
    }
}
