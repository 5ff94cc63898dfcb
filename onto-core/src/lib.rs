pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod scope;
pub mod store;

pub use cache::{CacheBackend, CacheError, CacheKey, CachedGraph, MokaCache};
pub use config::OntoConfig;
pub use error::{EntityKind, ErrorKind, OntoError, OntoResult};
pub use export::{Exporter, OntologyDocument};
pub use scope::Scope;
pub use store::{
    ConversationUpdate, EntityStore, GraphBackend, MemoryBackend, PgBackend, Tombstone, Update,
    WriteBatch, Written,
};
