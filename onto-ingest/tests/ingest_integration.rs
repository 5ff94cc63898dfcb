//! Integration tests for fragment ingestion on the in-memory backend
//!
//! These tests verify:
//! 1. A fragment lands as exactly the rows it describes
//! 2. Re-ingesting reuses classes and appends everything else
//! 3. Class names dedup by normalized name
//! 4. A failing write leaves no partial rows and no invalidation
//! 5. Cache keys are dropped only after the commit
//! 6. Empty, malformed, and orphaned inputs

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use onto_core::{
    CacheBackend, CacheError, CachedGraph, EntityStore, ErrorKind, MemoryBackend, MokaCache,
};
use onto_ingest::{Fragment, IngestEngine};
use serde_json::json;
use uuid::Uuid;

struct Fixture {
    backend: Arc<MemoryBackend>,
    engine: IngestEngine,
    conversation_id: Uuid,
}

async fn fixture_with(cache: Arc<dyn CacheBackend>, backend: Arc<MemoryBackend>) -> Fixture {
    let store = EntityStore::new(backend.clone());
    let graph = CachedGraph::new(store, cache, Duration::from_secs(300));
    let conversation = graph
        .create_conversation(None, "transport", "road vehicles")
        .await
        .expect("Failed to create conversation");

    Fixture {
        backend,
        engine: IngestEngine::new(graph),
        conversation_id: conversation.id,
    }
}

async fn fixture() -> Fixture {
    fixture_with(Arc::new(MokaCache::new(1_000)), Arc::new(MemoryBackend::new())).await
}

fn vehicle_fragment() -> Fragment {
    Fragment::from_value(json!({
        "classes": [{
            "name": "Vehicle",
            "instances": ["Car1"],
            "dataProperties": [{"name": "speed", "recommendedDataType": "integer"}],
            "objectProperties": [{
                "name": "drives",
                "recommendedDomain": ["Vehicle"],
                "recommendedRange": ["Road"]
            }]
        }]
    }))
    .expect("fixture fragment is valid")
}

/// Records, for every deleted key, the number of live classes at that moment.
struct RecordingCache {
    backend: Arc<MemoryBackend>,
    deletes: Mutex<Vec<(String, usize)>>,
}

#[async_trait]
impl CacheBackend for RecordingCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let classes = self
            .backend
            .live_counts()
            .map_err(|e| CacheError::Unavailable(e.to_string()))?
            .classes;
        self.deletes.lock().unwrap().push((key.to_string(), classes));
        Ok(())
    }
}

struct DownCache;

#[async_trait]
impl CacheBackend for DownCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        Err(CacheError::Operation {
            key: key.to_string(),
            reason: "connection reset".into(),
        })
    }
}

// ===========================================================================
// TEST 1: the Vehicle fragment produces exactly one row per described entity
// ===========================================================================
#[tokio::test]
async fn test_vehicle_fragment_row_counts() {
    let f = fixture().await;

    let outcome = f
        .engine
        .ingest(f.conversation_id, &vehicle_fragment())
        .await
        .unwrap();

    assert_eq!(outcome.classes_created.len(), 1);
    let counts = f.backend.live_counts().unwrap();
    assert_eq!(counts.classes, 1);
    assert_eq!(counts.instances, 1);
    assert_eq!(counts.class_instance_links, 1);
    assert_eq!(counts.data_properties, 1);
    assert_eq!(counts.class_data_links, 1);
    assert_eq!(counts.object_properties, 1);
    assert_eq!(counts.class_object_links, 1);
    assert_eq!(counts.domains, 1);
    assert_eq!(counts.ranges, 1);
    assert_eq!(counts.pairs, 1);

    let classes = f.engine.graph().classes(f.conversation_id).await.unwrap();
    let drives = &classes[0].object_properties[0];
    assert_eq!(drives.domains[0].name, "Vehicle");
    assert_eq!(drives.domains[0].ranges[0].name, "Road");
}

// ===========================================================================
// TEST 2: re-ingesting reuses the class and duplicates the rest
// ===========================================================================
#[tokio::test]
async fn test_reingest_reuses_class() {
    let f = fixture().await;
    let first = f
        .engine
        .ingest(f.conversation_id, &vehicle_fragment())
        .await
        .unwrap();
    let second = f
        .engine
        .ingest(f.conversation_id, &vehicle_fragment())
        .await
        .unwrap();

    assert!(second.classes_created.is_empty());
    assert_eq!(second.classes_reused, first.classes_created);

    let counts = f.backend.live_counts().unwrap();
    assert_eq!(counts.classes, 1);
    assert_eq!(counts.instances, 2);
    assert_eq!(counts.data_properties, 2);
    assert_eq!(counts.object_properties, 2);
    assert_eq!(counts.pairs, 2);
}

// ===========================================================================
// TEST 3: "Solar Panel" and "solarpanel" are the same class
// ===========================================================================
#[tokio::test]
async fn test_class_names_dedup_by_normalized_form() {
    let f = fixture().await;
    f.engine
        .ingest_value(
            f.conversation_id,
            json!({"classes": [{"name": "Solar Panel", "instances": ["P1"]}]}),
        )
        .await
        .unwrap();
    let outcome = f
        .engine
        .ingest_value(
            f.conversation_id,
            json!({"classes": [{"name": "solarpanel", "instances": ["P2"]}]}),
        )
        .await
        .unwrap();

    assert_eq!(outcome.classes_reused.len(), 1);
    let classes = f.engine.graph().classes(f.conversation_id).await.unwrap();
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].name, "Solar Panel");
    let instances = f
        .engine
        .graph()
        .class_instances(classes[0].id)
        .await
        .unwrap();
    assert_eq!(instances.len(), 2);
}

// ===========================================================================
// TEST 4: a failing write leaves nothing behind and invalidates nothing
// ===========================================================================
#[tokio::test]
async fn test_failed_write_rolls_back() {
    let backend = Arc::new(MemoryBackend::new());
    let cache = Arc::new(RecordingCache {
        backend: backend.clone(),
        deletes: Mutex::new(Vec::new()),
    });
    let f = fixture_with(cache.clone(), backend).await;
    cache.deletes.lock().unwrap().clear();

    f.backend.set_fail_writes(true);
    let err = f
        .engine
        .ingest(f.conversation_id, &vehicle_fragment())
        .await
        .unwrap_err();
    f.backend.set_fail_writes(false);

    assert_eq!(err.kind(), ErrorKind::Store);
    let counts = f.backend.live_counts().unwrap();
    assert_eq!(counts.classes, 0);
    assert_eq!(counts.instances, 0);
    assert_eq!(counts.pairs, 0);
    assert!(cache.deletes.lock().unwrap().is_empty());
}

// ===========================================================================
// TEST 5: invalidation happens after the rows are visible
// ===========================================================================
#[tokio::test]
async fn test_invalidation_follows_commit() {
    let backend = Arc::new(MemoryBackend::new());
    let cache = Arc::new(RecordingCache {
        backend: backend.clone(),
        deletes: Mutex::new(Vec::new()),
    });
    let f = fixture_with(cache.clone(), backend).await;
    cache.deletes.lock().unwrap().clear();

    let outcome = f
        .engine
        .ingest(f.conversation_id, &vehicle_fragment())
        .await
        .unwrap();

    let deletes = cache.deletes.lock().unwrap();
    assert!(deletes.iter().all(|(_, classes)| *classes == 1));

    let keys: Vec<&str> = deletes.iter().map(|(k, _)| k.as_str()).collect();
    let class_id = outcome.classes_created[0];
    let op_id = outcome.object_property_ids[0];
    assert!(keys.contains(&format!("conversation_graph_{}", f.conversation_id).as_str()));
    assert!(keys.contains(&format!("conversation_instances_{}", f.conversation_id).as_str()));
    assert!(keys.contains(&format!("class_instances_{class_id}").as_str()));
    assert!(keys.contains(&format!("object_property_ranges_{op_id}").as_str()));
}

// ===========================================================================
// TEST 6: an unreachable cache does not fail ingestion
// ===========================================================================
#[tokio::test]
async fn test_cache_failures_are_absorbed() {
    let f = fixture_with(Arc::new(DownCache), Arc::new(MemoryBackend::new())).await;

    f.engine
        .ingest(f.conversation_id, &vehicle_fragment())
        .await
        .unwrap();

    let classes = f.engine.graph().classes(f.conversation_id).await.unwrap();
    assert_eq!(classes.len(), 1);
}

// ===========================================================================
// TEST 7: empty fragment is a no-op
// ===========================================================================
#[tokio::test]
async fn test_empty_fragment_is_noop() {
    let f = fixture().await;
    let outcome = f
        .engine
        .ingest_value(f.conversation_id, json!({"classes": []}))
        .await
        .unwrap();

    assert!(outcome.classes_created.is_empty());
    assert_eq!(f.backend.live_counts().unwrap().classes, 0);
}

// ===========================================================================
// TEST 8: malformed fragments are rejected before any write
// ===========================================================================
#[tokio::test]
async fn test_malformed_fragment_is_validation_error() {
    let f = fixture().await;
    let err = f
        .engine
        .ingest_value(
            f.conversation_id,
            json!({"classes": [{"name": "Vehicle", "dataProperties": [{"name": "speed"}]}]}),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(f.backend.live_counts().unwrap().classes, 0);
}

// ===========================================================================
// TEST 9: unknown or deleted conversation
// ===========================================================================
#[tokio::test]
async fn test_unknown_conversation_is_not_found() {
    let f = fixture().await;

    let err = f
        .engine
        .ingest(Uuid::new_v4(), &vehicle_fragment())
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    f.engine
        .graph()
        .delete_conversation(f.conversation_id)
        .await
        .unwrap();
    let err = f
        .engine
        .ingest(f.conversation_id, &Fragment::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

// ===========================================================================
// TEST 10: important terms are upserted alongside the classes
// ===========================================================================
#[tokio::test]
async fn test_important_terms_upsert() {
    let f = fixture().await;
    f.engine
        .ingest_value(f.conversation_id, json!({"important_terms": ["vehicle"]}))
        .await
        .unwrap();
    let first = f
        .engine
        .graph()
        .important_terms(f.conversation_id)
        .await
        .unwrap()
        .unwrap();

    f.engine
        .ingest_value(f.conversation_id, json!({"importantTerms": ["road", "lane"]}))
        .await
        .unwrap();
    let second = f
        .engine
        .graph()
        .important_terms(f.conversation_id)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.terms, vec!["road", "lane"]);
}
