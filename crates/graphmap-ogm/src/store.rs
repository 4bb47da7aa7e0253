//! The entity store: save, load, relate and separate mapped entities.
//!
//! Saving is add-missing, no-prune: every staged relationship that the
//! store does not already hold (same type, direction, properties and other
//! endpoint, counted as a multiset) is created; relationships the store
//! holds but the bag does not mention are left alone.
//!
//! Unsaved related entities are saved first, depth-first, one call at a
//! time. Each shared entity is visited at most once per save, so cyclic
//! relationship graphs terminate. Nothing is rolled back if a call fails
//! partway through.

use std::collections::{HashMap, VecDeque};

use graphmap_core::{Direction, NodeId, NodeRecord, Properties, RelationshipRecord};
use graphmap_graph::GraphBackend;

use crate::error::{OgmError, Result};
use crate::mapped::{identity, try_lock, BagEntry, Endpoint, Mapped, RelationshipBag, Shared};
use crate::mapping::{self, Entity};

/// Maps entities onto a graph backend.
pub struct EntityStore<G> {
    graph: G,
}

/// A node whose staged relationships are still being written.
struct Frame {
    node: NodeId,
    pending: VecDeque<(String, BagEntry)>,
    existing: Vec<RelationshipRecord>,
}

impl<G: GraphBackend> EntityStore<G> {
    pub fn new(graph: G) -> Self {
        Self { graph }
    }

    /// The backend this store writes to.
    pub fn graph(&self) -> &G {
        &self.graph
    }

    // ── Staging ──────────────────────────────────────────────────

    /// Stage a relationship with no properties. Nothing is written until the
    /// source is saved.
    pub fn relate<T>(&self, source: &mut Mapped<T>, rel_type: &str, target: impl Into<Endpoint>) {
        self.relate_with(source, rel_type, target, Properties::new());
    }

    /// Stage a relationship carrying `properties`.
    pub fn relate_with<T>(
        &self,
        source: &mut Mapped<T>,
        rel_type: &str,
        target: impl Into<Endpoint>,
        properties: Properties,
    ) {
        source
            .relationships_mut()
            .push(rel_type, properties, target.into());
    }

    /// Unstage the first relationship of `rel_type` to `target`. Does
    /// nothing if there is no such relationship.
    pub fn separate<T>(&self, source: &mut Mapped<T>, rel_type: &str, target: impl Into<Endpoint>) {
        let target = target.into();
        if source
            .relationships_mut()
            .remove_first(rel_type, &target)
            .is_none()
        {
            tracing::trace!(rel_type, ?target, "Nothing to separate");
        }
    }

    // ── Saving ───────────────────────────────────────────────────

    /// Create or update the entity's node, then write its staged
    /// relationships.
    pub async fn save<T: Entity>(&self, entity: &mut Mapped<T>) -> Result<NodeId> {
        let properties = mapping::to_properties(entity.entity())?;
        let (node, created) = self.write_node(entity.node(), &properties).await?;
        entity.bind(node);

        self.reconcile(node, created, entity.relationships(), HashMap::new())
            .await?;
        Ok(node)
    }

    /// [`save`](Self::save) for an entity other entities may point back at.
    pub async fn save_shared<T: Entity>(&self, entity: &Shared<T>) -> Result<NodeId> {
        let (bound, properties, bag) = {
            let guard = try_lock(entity)?;
            (
                guard.node(),
                mapping::to_properties(guard.entity()),
                guard.relationships().clone(),
            )
        };
        let (node, created) = self.write_node(bound, &properties?).await?;
        try_lock(entity)?.bind(node);

        let mut visited = HashMap::new();
        visited.insert(identity(entity), node);
        self.reconcile(node, created, &bag, visited).await?;
        Ok(node)
    }

    /// Save through a unique index: reuse the node under
    /// `index`/`key`/`value` if there is one, otherwise create and index it.
    /// The entity is bound to that node whatever it was bound to before, and
    /// its fields overwrite the node's properties.
    pub async fn save_unique<T: Entity>(
        &self,
        entity: &mut Mapped<T>,
        index: &str,
        key: &str,
        value: impl Into<serde_json::Value>,
    ) -> Result<NodeId> {
        let properties = mapping::to_properties(entity.entity())?;
        let value = value.into();

        let record = self
            .graph
            .get_or_create_indexed_node(index, key, &value, &properties)
            .await?;
        if record.properties != properties {
            self.graph.update_node(record.id, &properties).await?;
        }
        entity.bind(record.id);
        tracing::debug!(node_id = %record.id, index, key, "Entity saved by unique index");

        self.reconcile(record.id, false, entity.relationships(), HashMap::new())
            .await?;
        Ok(record.id)
    }

    /// Save each entity, then add its node to `index` under `key`/`value`.
    pub async fn save_indexed<T: Entity>(
        &self,
        entities: &mut [Mapped<T>],
        index: &str,
        key: &str,
        value: impl Into<serde_json::Value>,
    ) -> Result<Vec<NodeId>> {
        let value = value.into();
        let mut nodes = Vec::with_capacity(entities.len());
        for entity in entities.iter_mut() {
            let node = self.save(entity).await?;
            self.graph.add_indexed_node(index, key, &value, node).await?;
            nodes.push(node);
        }
        Ok(nodes)
    }

    async fn write_node(
        &self,
        bound: Option<NodeId>,
        properties: &Properties,
    ) -> Result<(NodeId, bool)> {
        match bound {
            Some(node) => {
                self.graph.update_node(node, properties).await?;
                tracing::debug!(node_id = %node, "Entity updated");
                Ok((node, false))
            }
            None => {
                let node = self.graph.create_node(properties).await?;
                tracing::debug!(node_id = %node, "Entity created");
                Ok((node, true))
            }
        }
    }

    /// Write the staged relationships of `root` and, depth-first, of every
    /// unsaved entity they reach.
    async fn reconcile(
        &self,
        root: NodeId,
        created: bool,
        bag: &RelationshipBag,
        mut visited: HashMap<usize, NodeId>,
    ) -> Result<()> {
        let mut stack = vec![self.open_frame(root, created, bag).await?];

        while let Some(mut frame) = stack.pop() {
            let Some((rel_type, entry)) = frame.pending.pop_front() else {
                continue;
            };

            let target = match &entry.endpoint {
                Endpoint::Node(id) => *id,
                Endpoint::Entity(shared) => {
                    let key = identity(shared);
                    if let Some(id) = visited.get(&key).copied() {
                        id
                    } else {
                        let (bound, properties, bag) = {
                            let guard = try_lock(shared)?;
                            (guard.node(), guard.properties(), guard.relationships().clone())
                        };
                        if let Some(id) = bound {
                            visited.insert(key, id);
                            id
                        } else {
                            let id = self.graph.create_node(&properties?).await?;
                            try_lock(shared)?.bind(id);
                            visited.insert(key, id);
                            tracing::debug!(node_id = %id, "Related entity created");

                            // Come back to this entry once the target's own
                            // relationships are written.
                            let resolved = BagEntry {
                                properties: entry.properties.clone(),
                                endpoint: Endpoint::Node(id),
                                direction: entry.direction,
                            };
                            frame.pending.push_front((rel_type, resolved));
                            stack.push(frame);
                            stack.push(self.open_frame(id, true, &bag).await?);
                            continue;
                        }
                    }
                }
            };

            let held = frame.existing.iter().position(|r| {
                r.direction == entry.direction && r.matches(&rel_type, &entry.properties, target)
            });
            match held {
                Some(pos) => {
                    frame.existing.remove(pos);
                }
                None => {
                    let (start, end) = match entry.direction {
                        Direction::Outgoing => (frame.node, target),
                        Direction::Incoming => (target, frame.node),
                    };
                    self.graph
                        .create_relationship(start, &rel_type, end, &entry.properties)
                        .await?;
                }
            }
            stack.push(frame);
        }

        Ok(())
    }

    async fn open_frame(&self, node: NodeId, created: bool, bag: &RelationshipBag) -> Result<Frame> {
        // A node created in this save has no relationships yet.
        let existing = if created || bag.is_empty() {
            Vec::new()
        } else {
            self.graph.relationships(node).await?
        };

        Ok(Frame {
            node,
            pending: bag
                .iter()
                .map(|(rel_type, entry)| (rel_type.to_string(), entry.clone()))
                .collect(),
            existing,
        })
    }

    // ── Loading ──────────────────────────────────────────────────

    /// Load the entity bound to `node`, with its relationships.
    pub async fn load<T: Entity>(&self, node: NodeId) -> Result<Mapped<T>> {
        let record = self
            .graph
            .get_node(node)
            .await?
            .ok_or_else(|| OgmError::NotFound(format!("node {node}")))?;
        self.hydrate(record).await
    }

    /// Load the entity under a unique index entry.
    pub async fn load_unique<T: Entity>(
        &self,
        index: &str,
        key: &str,
        value: impl Into<serde_json::Value>,
    ) -> Result<Mapped<T>> {
        let value = value.into();
        let record = self
            .graph
            .get_indexed_nodes(index, key, &value)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| OgmError::NotFound(format!("{index} {key}={value}")))?;
        self.hydrate(record).await
    }

    /// Load every entity under an index entry, in index order.
    pub async fn load_indexed<T: Entity>(
        &self,
        index: &str,
        key: &str,
        value: impl Into<serde_json::Value>,
    ) -> Result<Vec<Mapped<T>>> {
        let records = self
            .graph
            .get_indexed_nodes(index, key, &value.into())
            .await?;

        let mut loaded = Vec::with_capacity(records.len());
        for record in records {
            loaded.push(self.hydrate(record).await?);
        }
        Ok(loaded)
    }

    /// Load the targets of `entity`'s outgoing `rel_type` relationships, in
    /// bag order. Incoming entries from a load are skipped. An unknown type
    /// yields nothing.
    pub async fn load_related<T, U: Entity>(
        &self,
        entity: &Mapped<T>,
        rel_type: &str,
    ) -> Result<Vec<Mapped<U>>> {
        let mut nodes = Vec::new();
        for entry in entity.relationships().get(rel_type) {
            if entry.direction == Direction::Incoming {
                continue;
            }
            nodes.push(entry.endpoint.resolve()?.ok_or(OgmError::NotSaved)?);
        }

        let mut related = Vec::with_capacity(nodes.len());
        for node in nodes {
            related.push(self.load(node).await?);
        }
        Ok(related)
    }

    /// Refresh a bound entity from its node. Fields the node lacks revert to
    /// their defaults, and the bag is replaced with the stored relationships.
    pub async fn reload<T: Entity>(&self, entity: &mut Mapped<T>) -> Result<()> {
        let node = entity.node().ok_or(OgmError::NotSaved)?;
        let record = self
            .graph
            .get_node(node)
            .await?
            .ok_or_else(|| OgmError::NotFound(format!("node {node}")))?;

        entity.set_entity(mapping::from_properties(&record.properties)?);
        let relationships = self.graph.relationships(node).await?;
        entity.set_relationships(RelationshipBag::from_records(relationships));
        Ok(())
    }

    async fn hydrate<T: Entity>(&self, record: NodeRecord) -> Result<Mapped<T>> {
        let entity = mapping::from_properties(&record.properties)?;
        let relationships = self.graph.relationships(record.id).await?;
        Ok(Mapped::from_parts(
            entity,
            record.id,
            RelationshipBag::from_records(relationships),
        ))
    }

    // ── Deleting ─────────────────────────────────────────────────

    /// Delete the entity's node with all its relationships and drop the
    /// binding. An unbound entity is left as it is.
    pub async fn delete<T>(&self, entity: &mut Mapped<T>) -> Result<()> {
        if let Some(node) = entity.node() {
            self.graph.delete_node(node).await?;
            entity.unbind();
            tracing::debug!(node_id = %node, "Entity deleted");
        }
        Ok(())
    }

    /// Whether the entity is bound to a node that still exists.
    pub async fn is_saved<T>(&self, entity: &Mapped<T>) -> Result<bool> {
        match entity.node() {
            Some(node) => Ok(self.graph.get_node(node).await?.is_some()),
            None => Ok(false),
        }
    }
}
