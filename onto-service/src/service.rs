//! `OntologyService`: the exposed API, wired once from config.
//!
//! Every read is cache-backed; every write invalidates the scopes it touched
//! after the store has committed.

use std::sync::Arc;

use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use onto_core::db;
use onto_core::models::{
    ClassInstances, ClassWithProperties, CompetencyQuestions, Conversation, DataProperty, Domain,
    DomainRangePair, ImportantTerms, Instance, ObjectProperty, ObjectPropertyView, OntologyClass,
    Range,
};
use onto_core::{
    CacheBackend, CachedGraph, ConversationUpdate, EntityStore, Exporter, GraphBackend, MokaCache,
    OntoConfig, OntoResult, OntologyDocument, PgBackend,
};
use onto_ingest::{Fragment, IngestEngine, IngestOutcome};

#[derive(Clone)]
pub struct OntologyService {
    graph: CachedGraph,
    engine: IngestEngine,
    exporter: Exporter,
    pool: Option<PgPool>,
}

impl OntologyService {
    /// Connect to Postgres and build the full stack from `config`.
    pub async fn bootstrap(config: &OntoConfig) -> OntoResult<Self> {
        let pool = db::create_pool(&config.database).await?;
        let backend: Arc<dyn GraphBackend> = Arc::new(PgBackend::new(pool.clone()));
        let cache: Arc<dyn CacheBackend> = Arc::new(MokaCache::from_config(&config.cache));

        let mut service = Self::with_backend(backend, cache, config);
        service.pool = Some(pool);
        tracing::info!(
            cache_enabled = config.cache.enabled,
            ttl_seconds = config.cache.ttl_seconds,
            "Ontology service ready"
        );
        Ok(service)
    }

    /// Build over an arbitrary backend and cache (tests, embedding).
    pub fn with_backend(
        backend: Arc<dyn GraphBackend>,
        cache: Arc<dyn CacheBackend>,
        config: &OntoConfig,
    ) -> Self {
        let graph = CachedGraph::from_config(EntityStore::new(backend), cache, &config.cache);
        Self {
            engine: IngestEngine::new(graph.clone()),
            exporter: Exporter::from_config(graph.clone(), &config.export),
            graph,
            pool: None,
        }
    }

    /// The Postgres pool when bootstrapped against a database.
    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }

    pub fn graph(&self) -> &CachedGraph {
        &self.graph
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    pub async fn ingest(&self, conversation_id: Uuid, fragment: &Fragment) -> OntoResult<IngestOutcome> {
        self.engine.ingest(conversation_id, fragment).await
    }

    pub async fn ingest_json(&self, conversation_id: Uuid, payload: Value) -> OntoResult<IngestOutcome> {
        self.engine.ingest_value(conversation_id, payload).await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn get_conversation(&self, id: Uuid) -> OntoResult<Conversation> {
        self.graph.conversation(id).await
    }

    pub async fn get_user_conversations(&self, user_id: Uuid) -> OntoResult<Vec<Conversation>> {
        self.graph.user_conversations(user_id).await
    }

    pub async fn get_classes(&self, conversation_id: Uuid) -> OntoResult<Vec<ClassWithProperties>> {
        self.graph.classes(conversation_id).await
    }

    pub async fn get_data_properties(&self, class_id: Uuid) -> OntoResult<Vec<DataProperty>> {
        self.graph.data_properties(class_id).await
    }

    pub async fn get_object_properties(&self, class_id: Uuid) -> OntoResult<Vec<ObjectPropertyView>> {
        self.graph.object_properties(class_id).await
    }

    pub async fn get_domains(&self, object_property_id: Uuid) -> OntoResult<Vec<Domain>> {
        self.graph.domains(object_property_id).await
    }

    pub async fn get_ranges(&self, object_property_id: Uuid) -> OntoResult<Vec<Range>> {
        self.graph.ranges(object_property_id).await
    }

    pub async fn get_instances(&self, conversation_id: Uuid) -> OntoResult<Vec<ClassInstances>> {
        self.graph.conversation_instances(conversation_id).await
    }

    pub async fn get_class_instances(&self, class_id: Uuid) -> OntoResult<Vec<Instance>> {
        self.graph.class_instances(class_id).await
    }

    pub async fn get_important_terms(&self, conversation_id: Uuid) -> OntoResult<Option<ImportantTerms>> {
        self.graph.important_terms(conversation_id).await
    }

    pub async fn get_competency_questions(
        &self,
        conversation_id: Uuid,
    ) -> OntoResult<Option<CompetencyQuestions>> {
        self.graph.competency_questions(conversation_id).await
    }

    // ========================================================================
    // Creates and updates
    // ========================================================================

    pub async fn create_conversation(
        &self,
        user_id: Option<Uuid>,
        domain: &str,
        scope: &str,
    ) -> OntoResult<Conversation> {
        self.graph.create_conversation(user_id, domain, scope).await
    }

    pub async fn update_conversation(&self, id: Uuid, update: ConversationUpdate) -> OntoResult<Conversation> {
        self.graph.update_conversation(id, update).await
    }

    pub async fn create_class(
        &self,
        conversation_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> OntoResult<OntologyClass> {
        self.graph.create_class(conversation_id, name, description).await
    }

    pub async fn update_class(&self, id: Uuid, name: &str, description: Option<&str>) -> OntoResult<OntologyClass> {
        self.graph.update_class(id, name, description).await
    }

    pub async fn create_data_property(&self, class_id: Uuid, name: &str, data_type: &str) -> OntoResult<DataProperty> {
        self.graph.create_data_property(class_id, name, data_type).await
    }

    pub async fn update_data_property(&self, id: Uuid, name: &str, data_type: &str) -> OntoResult<DataProperty> {
        self.graph.update_data_property(id, name, data_type).await
    }

    pub async fn create_object_property(&self, class_id: Uuid, name: &str) -> OntoResult<ObjectProperty> {
        self.graph.create_object_property(class_id, name).await
    }

    pub async fn update_object_property(&self, id: Uuid, name: &str) -> OntoResult<ObjectProperty> {
        self.graph.update_object_property(id, name).await
    }

    pub async fn create_instance(&self, class_id: Uuid, name: &str) -> OntoResult<Instance> {
        self.graph.create_instance(class_id, name).await
    }

    pub async fn update_instance(&self, id: Uuid, name: &str) -> OntoResult<Instance> {
        self.graph.update_instance(id, name).await
    }

    pub async fn create_domain_range_pair(
        &self,
        object_property_id: Uuid,
        domain: &str,
        range: &str,
    ) -> OntoResult<DomainRangePair> {
        self.graph
            .create_domain_range_pair(object_property_id, domain, range)
            .await
    }

    pub async fn update_domain(&self, id: Uuid, name: &str) -> OntoResult<Domain> {
        self.graph.update_domain(id, name).await
    }

    pub async fn update_range(&self, id: Uuid, name: &str) -> OntoResult<Range> {
        self.graph.update_range(id, name).await
    }

    pub async fn save_important_terms(&self, conversation_id: Uuid, terms: Vec<String>) -> OntoResult<ImportantTerms> {
        self.graph.save_important_terms(conversation_id, terms).await
    }

    pub async fn save_competency_questions(
        &self,
        conversation_id: Uuid,
        questions: Vec<String>,
    ) -> OntoResult<CompetencyQuestions> {
        self.graph
            .save_competency_questions(conversation_id, questions)
            .await
    }

    pub async fn validate_competency_questions(&self, id: Uuid, is_valid: bool) -> OntoResult<CompetencyQuestions> {
        self.graph.validate_competency_questions(id, is_valid).await
    }

    // ========================================================================
    // Cascading deletes
    // ========================================================================

    pub async fn delete_conversation(&self, id: Uuid) -> OntoResult<()> {
        self.graph.delete_conversation(id).await
    }

    pub async fn delete_class(&self, id: Uuid) -> OntoResult<()> {
        self.graph.delete_class(id).await
    }

    pub async fn delete_data_property(&self, id: Uuid) -> OntoResult<()> {
        self.graph.delete_data_property(id).await
    }

    pub async fn delete_object_property(&self, id: Uuid) -> OntoResult<()> {
        self.graph.delete_object_property(id).await
    }

    pub async fn delete_instance(&self, id: Uuid) -> OntoResult<()> {
        self.graph.delete_instance(id).await
    }

    pub async fn delete_domain_range_pair(&self, pair_id: Uuid) -> OntoResult<()> {
        self.graph.delete_domain_range_pair(pair_id).await
    }

    // ========================================================================
    // Export
    // ========================================================================

    pub async fn export(&self, conversation_id: Uuid) -> OntoResult<OntologyDocument> {
        self.exporter.export(conversation_id).await
    }

    pub async fn export_turtle(&self, conversation_id: Uuid) -> OntoResult<String> {
        Ok(self.export(conversation_id).await?.to_turtle())
    }
}
