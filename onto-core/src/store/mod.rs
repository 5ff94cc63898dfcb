//! Entity Store: typed CRUD and soft-delete over the ontology graph
//!
//! Layering:
//! - [`GraphBackend`]: the relational-store seam (atomic batch writes + scoped selects)
//! - [`PgBackend`] / [`MemoryBackend`]: the two backends
//! - [`EntityStore`]: NotFound mapping, validation, name conflicts, graph assembly

pub mod assemble;
pub mod batch;
pub mod entity;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::OntoResult;
use crate::models::{
    CompetencyQuestions, Conversation, DataProperty, Domain, DomainRangePair, ImportantTerms,
    Instance, ObjectProperty, OntologyClass, Range,
};

pub use batch::{Tombstone, Update, WriteBatch};
pub use entity::{ConversationUpdate, EntityStore, Written};
#[cfg(any(test, feature = "testing"))]
pub use memory::LiveCounts;
pub use memory::MemoryBackend;
pub use postgres::PgBackend;

/// Relational store as seen by the engine.
///
/// Every select returns live rows only (tombstoned rows are invisible, including
/// by-id lookups), in insertion order. `apply` is the only write path and is
/// atomic.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    async fn apply(&self, batch: WriteBatch) -> OntoResult<()>;

    async fn conversation(&self, id: Uuid) -> OntoResult<Option<Conversation>>;
    async fn conversations_for_user(&self, user_id: Uuid) -> OntoResult<Vec<Conversation>>;

    async fn class(&self, id: Uuid) -> OntoResult<Option<OntologyClass>>;
    async fn classes(&self, conversation_id: Uuid) -> OntoResult<Vec<OntologyClass>>;

    async fn data_property(&self, id: Uuid) -> OntoResult<Option<DataProperty>>;
    async fn object_property(&self, id: Uuid) -> OntoResult<Option<ObjectProperty>>;
    async fn instance(&self, id: Uuid) -> OntoResult<Option<Instance>>;
    async fn domain(&self, id: Uuid) -> OntoResult<Option<Domain>>;
    async fn range(&self, id: Uuid) -> OntoResult<Option<Range>>;
    async fn pair(&self, id: Uuid) -> OntoResult<Option<DomainRangePair>>;

    /// Data properties reachable through a live class link, keyed by the linking class.
    async fn linked_data_properties(
        &self,
        class_ids: &[Uuid],
    ) -> OntoResult<Vec<(Uuid, DataProperty)>>;

    /// Object properties reachable through a live class link, keyed by the linking class.
    async fn linked_object_properties(
        &self,
        class_ids: &[Uuid],
    ) -> OntoResult<Vec<(Uuid, ObjectProperty)>>;

    /// Instances reachable through a live class link, keyed by the linking class.
    async fn linked_instances(&self, class_ids: &[Uuid]) -> OntoResult<Vec<(Uuid, Instance)>>;

    async fn domains(&self, object_property_ids: &[Uuid]) -> OntoResult<Vec<Domain>>;
    async fn ranges(&self, object_property_ids: &[Uuid]) -> OntoResult<Vec<Range>>;
    async fn pairs(&self, object_property_ids: &[Uuid]) -> OntoResult<Vec<DomainRangePair>>;

    async fn important_terms(&self, conversation_id: Uuid) -> OntoResult<Option<ImportantTerms>>;
    async fn competency_questions(
        &self,
        conversation_id: Uuid,
    ) -> OntoResult<Option<CompetencyQuestions>>;
    async fn competency_questions_by_id(&self, id: Uuid)
        -> OntoResult<Option<CompetencyQuestions>>;
}
