//! Cache coherence under interleaved reads and writes
//!
//! These tests verify:
//! 1. A fill whose load overlapped a committed write is not kept
//! 2. Per-user conversation lists follow conversation writes

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use onto_core::models::{
    CompetencyQuestions, Conversation, DataProperty, Domain, DomainRangePair, ImportantTerms,
    Instance, ObjectProperty, OntologyClass, Range,
};
use onto_core::{
    CachedGraph, ConversationUpdate, EntityStore, GraphBackend, MemoryBackend, MokaCache,
    OntoResult, WriteBatch,
};
use tokio::sync::Notify;
use uuid::Uuid;

/// Memory backend whose next `classes` call parks after reading its rows.
#[derive(Default)]
struct ParkingBackend {
    inner: MemoryBackend,
    armed: AtomicBool,
    parked: Notify,
    resume: Notify,
}

#[async_trait]
impl GraphBackend for ParkingBackend {
    async fn apply(&self, batch: WriteBatch) -> OntoResult<()> {
        self.inner.apply(batch).await
    }

    async fn conversation(&self, id: Uuid) -> OntoResult<Option<Conversation>> {
        self.inner.conversation(id).await
    }

    async fn conversations_for_user(&self, user_id: Uuid) -> OntoResult<Vec<Conversation>> {
        self.inner.conversations_for_user(user_id).await
    }

    async fn class(&self, id: Uuid) -> OntoResult<Option<OntologyClass>> {
        self.inner.class(id).await
    }

    async fn classes(&self, conversation_id: Uuid) -> OntoResult<Vec<OntologyClass>> {
        let rows = self.inner.classes(conversation_id).await?;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.parked.notify_one();
            self.resume.notified().await;
        }
        Ok(rows)
    }

    async fn data_property(&self, id: Uuid) -> OntoResult<Option<DataProperty>> {
        self.inner.data_property(id).await
    }

    async fn object_property(&self, id: Uuid) -> OntoResult<Option<ObjectProperty>> {
        self.inner.object_property(id).await
    }

    async fn instance(&self, id: Uuid) -> OntoResult<Option<Instance>> {
        self.inner.instance(id).await
    }

    async fn domain(&self, id: Uuid) -> OntoResult<Option<Domain>> {
        self.inner.domain(id).await
    }

    async fn range(&self, id: Uuid) -> OntoResult<Option<Range>> {
        self.inner.range(id).await
    }

    async fn pair(&self, id: Uuid) -> OntoResult<Option<DomainRangePair>> {
        self.inner.pair(id).await
    }

    async fn linked_data_properties(&self, class_ids: &[Uuid]) -> OntoResult<Vec<(Uuid, DataProperty)>> {
        self.inner.linked_data_properties(class_ids).await
    }

    async fn linked_object_properties(
        &self,
        class_ids: &[Uuid],
    ) -> OntoResult<Vec<(Uuid, ObjectProperty)>> {
        self.inner.linked_object_properties(class_ids).await
    }

    async fn linked_instances(&self, class_ids: &[Uuid]) -> OntoResult<Vec<(Uuid, Instance)>> {
        self.inner.linked_instances(class_ids).await
    }

    async fn domains(&self, object_property_ids: &[Uuid]) -> OntoResult<Vec<Domain>> {
        self.inner.domains(object_property_ids).await
    }

    async fn ranges(&self, object_property_ids: &[Uuid]) -> OntoResult<Vec<Range>> {
        self.inner.ranges(object_property_ids).await
    }

    async fn pairs(&self, object_property_ids: &[Uuid]) -> OntoResult<Vec<DomainRangePair>> {
        self.inner.pairs(object_property_ids).await
    }

    async fn important_terms(&self, conversation_id: Uuid) -> OntoResult<Option<ImportantTerms>> {
        self.inner.important_terms(conversation_id).await
    }

    async fn competency_questions(
        &self,
        conversation_id: Uuid,
    ) -> OntoResult<Option<CompetencyQuestions>> {
        self.inner.competency_questions(conversation_id).await
    }

    async fn competency_questions_by_id(&self, id: Uuid) -> OntoResult<Option<CompetencyQuestions>> {
        self.inner.competency_questions_by_id(id).await
    }
}

fn graph_over(backend: Arc<dyn GraphBackend>) -> CachedGraph {
    CachedGraph::new(
        EntityStore::new(backend),
        Arc::new(MokaCache::new(1_000)),
        Duration::from_secs(300),
    )
}

// ===========================================================================
// TEST 1: a write committed during a cache-miss load wins over the fill
// ===========================================================================
#[tokio::test]
async fn test_fill_overlapping_write_is_discarded() {
    let backend = Arc::new(ParkingBackend::default());
    let graph = graph_over(backend.clone());
    let conversation = graph
        .create_conversation(None, "energy", "solar")
        .await
        .unwrap();

    backend.armed.store(true, Ordering::SeqCst);
    let reader = {
        let graph = graph.clone();
        let conversation_id = conversation.id;
        tokio::spawn(async move { graph.classes(conversation_id).await })
    };

    // The reader has loaded an empty class list and is parked before filling.
    backend.parked.notified().await;
    graph
        .create_class(conversation.id, "Solar Panel", None)
        .await
        .unwrap();
    backend.resume.notify_one();

    let overlapped = reader.await.unwrap().unwrap();
    assert!(overlapped.is_empty());

    let after = graph.classes(conversation.id).await.unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].name, "Solar Panel");
}

// ===========================================================================
// TEST 2: a fill with no concurrent write is kept
// ===========================================================================
#[tokio::test]
async fn test_undisturbed_fill_is_served_from_cache() {
    let backend = Arc::new(MemoryBackend::new());
    let graph = graph_over(backend.clone());
    let conversation = graph
        .create_conversation(None, "energy", "solar")
        .await
        .unwrap();
    graph.classes(conversation.id).await.unwrap();

    // Written behind the layer's back, so only a cache hit hides it.
    let mut batch = WriteBatch::now();
    batch.classes.push(OntologyClass {
        id: Uuid::new_v4(),
        conversation_id: conversation.id,
        name: "Inverter".into(),
        description: None,
        created_at: batch.at,
        updated_at: None,
    });
    backend.apply(batch).await.unwrap();

    assert!(graph.classes(conversation.id).await.unwrap().is_empty());
}

// ===========================================================================
// TEST 3: a user's conversation list follows create, update and delete
// ===========================================================================
#[tokio::test]
async fn test_user_conversations_follow_writes() {
    let graph = graph_over(Arc::new(MemoryBackend::new()));
    let user = Uuid::new_v4();
    let first = graph
        .create_conversation(Some(user), "energy", "solar")
        .await
        .unwrap();
    assert_eq!(graph.user_conversations(user).await.unwrap().len(), 1);

    let second = graph
        .create_conversation(Some(user), "transport", "roads")
        .await
        .unwrap();
    assert_eq!(graph.user_conversations(user).await.unwrap().len(), 2);

    graph
        .update_conversation(
            first.id,
            ConversationUpdate {
                title: Some("Solar farm".into()),
                domain: "energy".into(),
                scope: "solar".into(),
                is_active: true,
            },
        )
        .await
        .unwrap();
    let listed = graph.user_conversations(user).await.unwrap();
    let renamed = listed.iter().find(|c| c.id == first.id).unwrap();
    assert_eq!(renamed.title.as_deref(), Some("Solar farm"));

    graph.delete_conversation(second.id).await.unwrap();
    let listed = graph.user_conversations(user).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, first.id);
}
