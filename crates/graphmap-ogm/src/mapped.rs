//! The mapped-entity wrapper and its relationship bag.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use graphmap_core::{Direction, NodeId, Properties, RelationshipRecord};

use crate::error::{OgmError, Result};
use crate::mapping::{self, Entity};

// ── Mapped ───────────────────────────────────────────────────────

/// An entity together with its node binding and relationship bag.
///
/// The binding is set by the store on save or load and only changes again
/// through [`Mapped::bind`], [`Mapped::unbind`] or an explicit store call.
#[derive(Debug, Clone)]
pub struct Mapped<T> {
    entity: T,
    node: Option<NodeId>,
    relationships: RelationshipBag,
}

/// A mapped entity that other entities can point at.
pub type Shared<T> = Arc<Mutex<Mapped<T>>>;

impl<T> Mapped<T> {
    /// Wrap an unsaved entity with an empty bag.
    pub fn new(entity: T) -> Self {
        Self {
            entity,
            node: None,
            relationships: RelationshipBag::default(),
        }
    }

    pub(crate) fn from_parts(entity: T, node: NodeId, relationships: RelationshipBag) -> Self {
        Self {
            entity,
            node: Some(node),
            relationships,
        }
    }

    pub fn entity(&self) -> &T {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut T {
        &mut self.entity
    }

    pub fn into_inner(self) -> T {
        self.entity
    }

    pub(crate) fn set_entity(&mut self, entity: T) {
        self.entity = entity;
    }

    /// The node this entity is bound to, if it has been saved or loaded.
    pub fn node(&self) -> Option<NodeId> {
        self.node
    }

    pub fn is_bound(&self) -> bool {
        self.node.is_some()
    }

    /// Point this entity at a node, replacing any earlier binding.
    pub fn bind(&mut self, node: NodeId) {
        self.node = Some(node);
    }

    /// Drop the binding, returning the node it referred to.
    pub fn unbind(&mut self) -> Option<NodeId> {
        self.node.take()
    }

    pub fn relationships(&self) -> &RelationshipBag {
        &self.relationships
    }

    pub fn relationships_mut(&mut self) -> &mut RelationshipBag {
        &mut self.relationships
    }

    pub(crate) fn set_relationships(&mut self, relationships: RelationshipBag) {
        self.relationships = relationships;
    }

    /// Whether both are bound to the same node. Unbound entities are never
    /// the same as anything.
    pub fn same_node<U>(&self, other: &Mapped<U>) -> bool {
        matches!((self.node, other.node), (Some(a), Some(b)) if a == b)
    }

    /// Compare by a caller-chosen key, e.g. `|p| p.email.clone()`.
    pub fn same_by<K, F>(&self, other: &Mapped<T>, key: F) -> bool
    where
        K: PartialEq,
        F: Fn(&T) -> K,
    {
        key(&self.entity) == key(&other.entity)
    }

    /// Move into shared ownership so other entities can relate to it.
    pub fn shared(self) -> Shared<T> {
        Arc::new(Mutex::new(self))
    }
}

impl<T> Deref for Mapped<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.entity
    }
}

impl<T> DerefMut for Mapped<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.entity
    }
}

// ── Type erasure for relationship targets ────────────────────────

/// What the store needs from a related entity of any type.
pub trait Persist: Send {
    fn properties(&self) -> Result<Properties>;
    fn node(&self) -> Option<NodeId>;
    fn bind(&mut self, node: NodeId);
    fn relationships(&self) -> &RelationshipBag;
}

impl<T: Entity> Persist for Mapped<T> {
    fn properties(&self) -> Result<Properties> {
        mapping::to_properties(&self.entity)
    }

    fn node(&self) -> Option<NodeId> {
        self.node
    }

    fn bind(&mut self, node: NodeId) {
        self.node = Some(node);
    }

    fn relationships(&self) -> &RelationshipBag {
        &self.relationships
    }
}

/// A shared entity of erased type.
pub type SharedEntity = Arc<Mutex<dyn Persist>>;

/// Lock without blocking. A poisoned lock still holds a usable value, so it
/// is recovered; a lock held elsewhere is an error rather than a deadlock.
pub(crate) fn try_lock<P: ?Sized>(shared: &Arc<Mutex<P>>) -> Result<MutexGuard<'_, P>> {
    match shared.try_lock() {
        Ok(guard) => Ok(guard),
        Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => Err(OgmError::Locked),
    }
}

/// Address of the shared allocation; stable for as long as the Arc lives.
pub(crate) fn identity<P: ?Sized>(shared: &Arc<Mutex<P>>) -> usize {
    Arc::as_ptr(shared) as *const () as usize
}

// ── Endpoint ─────────────────────────────────────────────────────

/// The far end of a staged relationship.
#[derive(Clone)]
pub enum Endpoint {
    /// A persisted node.
    Node(NodeId),
    /// An in-memory entity, saved on demand.
    Entity(SharedEntity),
}

impl Endpoint {
    /// The node this endpoint resolves to, if known. Never blocks: an
    /// entity that is unsaved, or locked elsewhere, gives `None`.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Endpoint::Node(id) => Some(*id),
            Endpoint::Entity(shared) => match try_lock(shared) {
                Ok(guard) => guard.node(),
                Err(_) => {
                    tracing::trace!("Endpoint entity locked elsewhere; node unknown");
                    None
                }
            },
        }
    }

    pub(crate) fn resolve(&self) -> Result<Option<NodeId>> {
        match self {
            Endpoint::Node(id) => Ok(Some(*id)),
            Endpoint::Entity(shared) => Ok(try_lock(shared)?.node()),
        }
    }

    /// Node-identity equivalence: the same shared entity, or two endpoints
    /// resolving to the same node. A shared entity that is locked elsewhere
    /// has no known node, so it is only the same as itself; `separate` with
    /// such a target does nothing.
    pub fn is_same(&self, other: &Endpoint) -> bool {
        if let (Endpoint::Entity(a), Endpoint::Entity(b)) = (self, other) {
            if identity(a) == identity(b) {
                return true;
            }
        }
        matches!((self.node(), other.node()), (Some(a), Some(b)) if a == b)
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Node(id) => f.debug_tuple("Node").field(id).finish(),
            Endpoint::Entity(_) => f.debug_tuple("Entity").field(&self.node()).finish(),
        }
    }
}

impl From<NodeId> for Endpoint {
    fn from(id: NodeId) -> Self {
        Endpoint::Node(id)
    }
}

impl<T: Entity> From<&Shared<T>> for Endpoint {
    fn from(shared: &Shared<T>) -> Self {
        let erased: SharedEntity = shared.clone();
        Endpoint::Entity(erased)
    }
}

impl<T: Entity> From<Shared<T>> for Endpoint {
    fn from(shared: Shared<T>) -> Self {
        let erased: SharedEntity = shared;
        Endpoint::Entity(erased)
    }
}

impl From<&Endpoint> for Endpoint {
    fn from(endpoint: &Endpoint) -> Self {
        endpoint.clone()
    }
}

// ── Relationship bag ─────────────────────────────────────────────

/// One staged relationship.
#[derive(Debug, Clone)]
pub struct BagEntry {
    pub properties: Properties,
    pub endpoint: Endpoint,
    /// Outgoing for anything staged with `relate`; loaded relationships keep
    /// the direction they have in the store.
    pub direction: Direction,
}

/// Relationship type → ordered entries.
#[derive(Debug, Clone, Default)]
pub struct RelationshipBag {
    entries: BTreeMap<String, Vec<BagEntry>>,
}

impl RelationshipBag {
    /// Group store relationships by type, keeping their order.
    pub fn from_records(records: Vec<RelationshipRecord>) -> Self {
        let mut bag = Self::default();
        for record in records {
            bag.entries.entry(record.rel_type).or_default().push(BagEntry {
                properties: record.properties,
                endpoint: Endpoint::Node(record.other),
                direction: record.direction,
            });
        }
        bag
    }

    pub fn push(&mut self, rel_type: &str, properties: Properties, endpoint: Endpoint) {
        self.entries
            .entry(rel_type.to_string())
            .or_default()
            .push(BagEntry {
                properties,
                endpoint,
                direction: Direction::Outgoing,
            });
    }

    /// Remove the first entry under `rel_type` whose endpoint is the same as
    /// `endpoint`. The type keeps its (possibly empty) sequence.
    pub fn remove_first(&mut self, rel_type: &str, endpoint: &Endpoint) -> Option<BagEntry> {
        let entries = self.entries.get_mut(rel_type)?;
        let pos = entries.iter().position(|e| e.endpoint.is_same(endpoint))?;
        Some(entries.remove(pos))
    }

    /// Entries under `rel_type`; empty if the type was never staged.
    pub fn get(&self, rel_type: &str) -> &[BagEntry] {
        self.entries
            .get(rel_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains_type(&self, rel_type: &str) -> bool {
        self.entries.contains_key(rel_type)
    }

    pub fn rel_types(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Every entry, grouped by type.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BagEntry)> {
        self.entries
            .iter()
            .flat_map(|(rel_type, entries)| entries.iter().map(move |e| (rel_type.as_str(), e)))
    }

    /// Total number of entries across all types.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphmap_core::RelationshipId;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    struct Person {
        email: String,
        name: String,
    }

    fn person(email: &str, name: &str) -> Mapped<Person> {
        Mapped::new(Person {
            email: email.to_string(),
            name: name.to_string(),
        })
    }

    #[test]
    fn same_node_requires_both_bound() {
        let mut a = person("a@example.com", "A");
        let mut b = person("a@example.com", "A");
        assert!(!a.same_node(&b));

        a.bind(NodeId(1));
        b.bind(NodeId(1));
        assert!(a.same_node(&b));

        b.bind(NodeId(2));
        assert!(!a.same_node(&b));
    }

    #[test]
    fn same_by_compares_with_key_function() {
        let a = person("alice@example.com", "Alice");
        let b = person("alice@example.com", "Alice Allison");
        assert!(a.same_by(&b, |p| p.email.clone()));
        assert!(!a.same_by(&b, |p| p.name.clone()));
    }

    #[test]
    fn unbind_clears_binding() {
        let mut a = person("a@example.com", "A");
        a.bind(NodeId(5));
        assert_eq!(a.unbind(), Some(NodeId(5)));
        assert!(!a.is_bound());
    }

    #[test]
    fn entity_endpoints_match_by_identity_or_node() {
        let bob = person("bob@example.org", "Bob").shared();
        let bob_twin = person("bob@example.org", "Bob").shared();

        let e1 = Endpoint::from(&bob);
        let e2 = Endpoint::from(&bob);
        let twin = Endpoint::from(&bob_twin);
        assert!(e1.is_same(&e2));
        // Equal fields do not make the same node.
        assert!(!e1.is_same(&twin));

        bob.lock().unwrap().bind(NodeId(9));
        assert!(e1.is_same(&Endpoint::Node(NodeId(9))));
        assert!(Endpoint::Node(NodeId(9)).is_same(&e1));
        assert!(!e1.is_same(&Endpoint::Node(NodeId(10))));
    }

    #[test]
    fn locked_entity_endpoint_matches_by_identity_only() {
        let bob = person("bob@example.org", "Bob").shared();
        bob.lock().unwrap().bind(NodeId(9));
        let endpoint = Endpoint::from(&bob);

        let guard = bob.lock().unwrap();
        assert_eq!(endpoint.node(), None);
        assert!(endpoint.is_same(&Endpoint::from(&bob)));
        assert!(!endpoint.is_same(&Endpoint::Node(NodeId(9))));
        drop(guard);

        assert_eq!(endpoint.node(), Some(NodeId(9)));
        assert!(endpoint.is_same(&Endpoint::Node(NodeId(9))));
    }

    #[test]
    fn bag_preserves_order_per_type() {
        let mut bag = RelationshipBag::default();
        bag.push("LIKES", Properties::new(), Endpoint::Node(NodeId(1)));
        bag.push("DISLIKES", Properties::new(), Endpoint::Node(NodeId(3)));
        bag.push("LIKES", Properties::new(), Endpoint::Node(NodeId(2)));

        let likes: Vec<_> = bag.get("LIKES").iter().map(|e| e.endpoint.node()).collect();
        assert_eq!(likes, vec![Some(NodeId(1)), Some(NodeId(2))]);
        assert_eq!(bag.get("DISLIKES").len(), 1);
        assert!(bag.get("HATES").is_empty());
        assert_eq!(bag.len(), 3);
    }

    #[test]
    fn remove_first_only_removes_one_match() {
        let mut bag = RelationshipBag::default();
        bag.push("LIKES", Properties::new(), Endpoint::Node(NodeId(1)));
        bag.push("LIKES", Properties::new(), Endpoint::Node(NodeId(1)));

        assert!(bag.remove_first("LIKES", &Endpoint::Node(NodeId(1))).is_some());
        assert_eq!(bag.get("LIKES").len(), 1);
        assert!(bag.remove_first("LIKES", &Endpoint::Node(NodeId(2))).is_none());
        assert!(bag.remove_first("HATES", &Endpoint::Node(NodeId(1))).is_none());

        bag.remove_first("LIKES", &Endpoint::Node(NodeId(1)));
        assert!(bag.contains_type("LIKES"));
        assert!(bag.get("LIKES").is_empty());
    }

    #[test]
    fn from_records_groups_in_store_order() {
        let record = |id: i64, rel_type: &str, other: i64, direction| RelationshipRecord {
            id: RelationshipId(id),
            rel_type: rel_type.to_string(),
            properties: json!({"rank": id}).as_object().cloned().unwrap(),
            other: NodeId(other),
            direction,
        };

        let bag = RelationshipBag::from_records(vec![
            record(0, "LIKES", 5, Direction::Outgoing),
            record(1, "KNOWS", 6, Direction::Incoming),
            record(2, "LIKES", 4, Direction::Outgoing),
        ]);

        let likes = bag.get("LIKES");
        assert_eq!(likes.len(), 2);
        assert_eq!(likes[0].endpoint.node(), Some(NodeId(5)));
        assert_eq!(likes[1].endpoint.node(), Some(NodeId(4)));
        assert_eq!(bag.get("KNOWS")[0].direction, Direction::Incoming);
        assert_eq!(bag.rel_types().collect::<Vec<_>>(), vec!["KNOWS", "LIKES"]);
    }
}
