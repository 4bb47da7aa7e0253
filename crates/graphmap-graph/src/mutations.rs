//! Write operations against Neo4j.
//!
//! Property maps cross the wire as JSON strings and are expanded server-side
//! with `apoc.convert.fromJsonMap`, so any scalar or scalar-array property
//! survives without a per-type Bolt conversion.
//!
//! A named index is a node label plus a reserved property: index `People`,
//! key `email` is the set of `(:People)` nodes whose `__index:People:email`
//! property holds the value. Reserved properties survive `update_node` and
//! are stripped from everything read back, so entity fields and index
//! membership never interfere.

use neo4rs::query;

use graphmap_core::{NodeId, NodeRecord, Properties, RelationshipId};

use crate::client::{GraphClient, GraphError};
use crate::queries::{row_node_id, row_to_node_record};

impl GraphClient {
    // ── Nodes ────────────────────────────────────────────────────

    /// Create a node with the given properties and return its identity.
    pub async fn create_node(&self, properties: &Properties) -> Result<NodeId, GraphError> {
        let q = query(
            "CREATE (n)
             SET n = apoc.convert.fromJsonMap($props)
             RETURN id(n) AS id",
        )
        .param("props", props_json(properties)?);

        let row = self
            .query_one(q)
            .await?
            .ok_or_else(|| GraphError::Serialization("CREATE returned no row".to_string()))?;
        let id = row_node_id(&row, "id")?;

        tracing::debug!(node_id = %id, "Node created");
        Ok(id)
    }

    /// Replace all properties of an existing node. Index membership is kept.
    pub async fn update_node(&self, id: NodeId, properties: &Properties) -> Result<(), GraphError> {
        let q = query(
            "MATCH (n) WHERE id(n) = $id
             WITH n, [k IN keys(n) WHERE k STARTS WITH $prefix | [k, n[k]]] AS kept
             SET n = apoc.convert.fromJsonMap($props)
             SET n += apoc.map.fromPairs(kept)
             RETURN id(n) AS id",
        )
        .param("id", id.0)
        .param("prefix", INDEX_PREFIX)
        .param("props", props_json(properties)?);

        match self.query_one(q).await? {
            Some(_) => {
                tracing::debug!(node_id = %id, "Node updated");
                Ok(())
            }
            None => Err(GraphError::node_not_found(id)),
        }
    }

    /// Fetch the node under `index`/`key`/`value`, creating and indexing it
    /// with `properties` if no such node exists.
    pub async fn get_or_create_indexed_node(
        &self,
        index: &str,
        key: &str,
        value: &serde_json::Value,
        properties: &Properties,
    ) -> Result<NodeRecord, GraphError> {
        let cypher = format!(
            "WITH apoc.convert.fromJsonMap($entry) AS entry
             MERGE (n:{label} {{{key}: entry.value}})
             ON CREATE SET n += apoc.convert.fromJsonMap($props)
             RETURN id(n) AS id, apoc.convert.toJson(properties(n)) AS props",
            label = quote_ident(index),
            key = quote_ident(&index_property(index, key)),
        );

        let q = query(&cypher)
            .param("entry", entry_json(value)?)
            .param("props", props_json(properties)?);

        let row = self
            .query_one(q)
            .await?
            .ok_or_else(|| GraphError::Serialization("MERGE returned no row".to_string()))?;
        row_to_node_record(&row)
    }

    /// Add an existing node to the index under `key`/`value`.
    pub async fn add_indexed_node(
        &self,
        index: &str,
        key: &str,
        value: &serde_json::Value,
        id: NodeId,
    ) -> Result<(), GraphError> {
        let cypher = format!(
            "MATCH (n) WHERE id(n) = $id
             WITH n, apoc.convert.fromJsonMap($entry) AS entry
             SET n:{label}, n.{key} = entry.value
             RETURN id(n) AS id",
            label = quote_ident(index),
            key = quote_ident(&index_property(index, key)),
        );

        let q = query(&cypher)
            .param("id", id.0)
            .param("entry", entry_json(value)?);

        match self.query_one(q).await? {
            Some(_) => Ok(()),
            None => Err(GraphError::node_not_found(id)),
        }
    }

    /// Delete a node together with every relationship attached to it.
    pub async fn delete_node(&self, id: NodeId) -> Result<(), GraphError> {
        let q = query(
            "MATCH (n) WHERE id(n) = $id
             DETACH DELETE n",
        )
        .param("id", id.0);

        self.run(q).await
    }

    /// Remove every node and relationship from the database.
    pub async fn clear(&self) -> Result<(), GraphError> {
        self.run(query("MATCH (n) DETACH DELETE n")).await?;
        tracing::debug!("All nodes deleted");
        Ok(())
    }

    // ── Relationships ────────────────────────────────────────────

    /// Create a relationship `(start)-[:rel_type]->(end)`.
    pub async fn create_relationship(
        &self,
        start: NodeId,
        rel_type: &str,
        end: NodeId,
        properties: &Properties,
    ) -> Result<RelationshipId, GraphError> {
        let cypher = format!(
            "MATCH (a) WHERE id(a) = $start
             MATCH (b) WHERE id(b) = $end
             CREATE (a)-[r:{rel_type}]->(b)
             SET r = apoc.convert.fromJsonMap($props)
             RETURN id(r) AS id",
            rel_type = quote_ident(rel_type),
        );

        let q = query(&cypher)
            .param("start", start.0)
            .param("end", end.0)
            .param("props", props_json(properties)?);

        match self.query_one(q).await? {
            Some(row) => {
                let id: i64 = row.get("id").map_err(|e| {
                    GraphError::Serialization(format!("Failed to read relationship id: {e}"))
                })?;
                tracing::debug!(%start, %end, rel_type, rel_id = id, "Relationship created");
                Ok(RelationshipId(id))
            }
            None => Err(GraphError::NotFound {
                kind: "Relationship endpoint",
                id: format!("{start} or {end}"),
            }),
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────

/// Prefix of the reserved properties that record index membership.
pub(crate) const INDEX_PREFIX: &str = "__index:";

/// The reserved property holding a node's value under `index`/`key`.
pub(crate) fn index_property(index: &str, key: &str) -> String {
    format!("{INDEX_PREFIX}{index}:{key}")
}

/// Backtick-quote a label, relationship type or property key for Cypher.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

fn props_json(properties: &Properties) -> Result<String, GraphError> {
    serde_json::to_string(properties).map_err(|e| GraphError::Serialization(e.to_string()))
}

/// Wrap a single value as `{"value": ...}` so it can ride through
/// `apoc.convert.fromJsonMap` whatever its type.
pub(crate) fn entry_json(value: &serde_json::Value) -> Result<String, GraphError> {
    serde_json::to_string(&serde_json::json!({ "value": value }))
        .map_err(|e| GraphError::Serialization(e.to_string()))
}
