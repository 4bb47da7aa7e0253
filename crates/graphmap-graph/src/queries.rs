//! Read operations against Neo4j.

use neo4rs::query;

use graphmap_core::{Direction, NodeId, NodeRecord, Properties, RelationshipId, RelationshipRecord};

use crate::client::{GraphClient, GraphError};
use crate::mutations::{entry_json, index_property, quote_ident, INDEX_PREFIX};

impl GraphClient {
    // ── Node Lookups ─────────────────────────────────────────────

    /// Get a node by identity.
    pub async fn get_node(&self, id: NodeId) -> Result<Option<NodeRecord>, GraphError> {
        let q = query(
            "MATCH (n) WHERE id(n) = $id
             RETURN id(n) AS id, apoc.convert.toJson(properties(n)) AS props",
        )
        .param("id", id.0);

        match self.query_one(q).await? {
            Some(row) => Ok(Some(row_to_node_record(&row)?)),
            None => Ok(None),
        }
    }

    /// All nodes under `index`/`key`/`value`, oldest first.
    pub async fn get_indexed_nodes(
        &self,
        index: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<NodeRecord>, GraphError> {
        let cypher = format!(
            "WITH apoc.convert.fromJsonMap($entry) AS entry
             MATCH (n:{label})
             WHERE n.{key} = entry.value
             RETURN id(n) AS id, apoc.convert.toJson(properties(n)) AS props
             ORDER BY id",
            label = quote_ident(index),
            key = quote_ident(&index_property(index, key)),
        );

        let q = query(&cypher).param("entry", entry_json(value)?);

        let rows = self.query_rows(q).await?;
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            results.push(row_to_node_record(&row)?);
        }
        Ok(results)
    }

    // ── Relationship Queries ─────────────────────────────────────

    /// Every relationship incident to a node, in relationship-id order.
    pub async fn relationships(&self, id: NodeId) -> Result<Vec<RelationshipRecord>, GraphError> {
        let q = query(
            "MATCH (a)-[r]-(b) WHERE id(a) = $id
             RETURN DISTINCT id(r) AS id, type(r) AS rel_type, id(b) AS other,
                    id(startNode(r)) = id(a) AS outgoing,
                    apoc.convert.toJson(properties(r)) AS props
             ORDER BY id",
        )
        .param("id", id.0);

        let rows = self.query_rows(q).await?;
        let mut results = Vec::with_capacity(rows.len());

        for row in rows {
            let rel_id: i64 = row.get("id").map_err(|e| {
                GraphError::Serialization(format!("Failed to read relationship id: {e}"))
            })?;
            let rel_type: String = row.get("rel_type").map_err(|e| {
                GraphError::Serialization(format!("Failed to read relationship type: {e}"))
            })?;
            let outgoing: bool = row.get("outgoing").map_err(|e| {
                GraphError::Serialization(format!("Failed to read relationship direction: {e}"))
            })?;

            results.push(RelationshipRecord {
                id: RelationshipId(rel_id),
                rel_type,
                properties: row_properties(&row, "props")?,
                other: row_node_id(&row, "other")?,
                direction: if outgoing {
                    Direction::Outgoing
                } else {
                    Direction::Incoming
                },
            });
        }

        Ok(results)
    }
}

// ── Row decoding ─────────────────────────────────────────────────

pub(crate) fn row_node_id(row: &neo4rs::Row, column: &str) -> Result<NodeId, GraphError> {
    row.get::<i64>(column)
        .map(NodeId)
        .map_err(|e| GraphError::Serialization(format!("Failed to read node id: {e}")))
}

/// Decode a property map returned as `apoc.convert.toJson(...)`. Reserved
/// index properties are dropped.
fn row_properties(row: &neo4rs::Row, column: &str) -> Result<Properties, GraphError> {
    let json: String = row
        .get(column)
        .map_err(|e| GraphError::Serialization(format!("Failed to read properties: {e}")))?;
    parse_properties(&json)
}

pub(crate) fn row_to_node_record(row: &neo4rs::Row) -> Result<NodeRecord, GraphError> {
    Ok(NodeRecord {
        id: row_node_id(row, "id")?,
        properties: row_properties(row, "props")?,
    })
}

fn parse_properties(json: &str) -> Result<Properties, GraphError> {
    match serde_json::from_str::<serde_json::Value>(json) {
        Ok(serde_json::Value::Object(mut map)) => {
            map.retain(|key, _| !key.starts_with(INDEX_PREFIX));
            Ok(map)
        }
        Ok(serde_json::Value::Null) => Ok(Properties::new()),
        Ok(other) => Err(GraphError::Serialization(format!(
            "Expected a property map, got {other}"
        ))),
        Err(e) => Err(GraphError::Serialization(e.to_string())),
    }
}
