//! Vector index primitives behind the `VectorIndex` / `CollectionSource`
//! seams: an exact in-memory index and a LanceDB store with one table per
//! collection.

pub mod memory;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use memory::{InMemoryIndex, InMemorySource};
pub use search::{LanceCollectionIndex, LanceStore};
pub use writer::{passage_id, LancePassageWriter};
