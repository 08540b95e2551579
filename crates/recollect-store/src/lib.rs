mod filter_match;
mod object;
mod store;

pub use object::{ObjectClass, ScoredObject, StoredObject, StoredRecord};
pub use store::{RedbStore, VectorStore};
