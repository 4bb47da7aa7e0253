//! graphmap OGM: keep plain Rust values in step with graph nodes.
//!
//! A value is wrapped in [`Mapped`], which carries its node binding and a
//! staged bag of outgoing relationships. [`EntityStore`] writes those to a
//! [`GraphBackend`](graphmap_graph::GraphBackend) on save and rebuilds them
//! on load.
//!
//! ```no_run
//! # use graphmap_ogm::{EntityStore, Mapped};
//! # use graphmap_graph::MemoryGraph;
//! # #[derive(Default, serde::Serialize, serde::Deserialize)]
//! # struct Person { email: String, name: String }
//! # async fn demo() -> graphmap_ogm::Result<()> {
//! let store = EntityStore::new(MemoryGraph::new());
//! let mut alice = Mapped::new(Person { email: "alice@example.com".into(), name: "Alice".into() });
//! let bob = Mapped::new(Person { email: "bob@example.org".into(), name: "Bob".into() }).shared();
//! store.relate(&mut alice, "LIKES", &bob);
//! store.save(&mut alice).await?;
//! let friends: Vec<Mapped<Person>> = store.load_related(&alice, "LIKES").await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod mapped;
pub mod mapping;
pub mod store;

pub use error::{OgmError, Result};
pub use mapped::{BagEntry, Endpoint, Mapped, Persist, RelationshipBag, Shared, SharedEntity};
pub use mapping::Entity;
pub use store::EntityStore;
