//! Cache-aside reads and invalidating writes over the [`EntityStore`].
//!
//! Reads try the cache, fall back to the store on a miss and repopulate.
//! Writes go to the store first; invalidation runs only once the store call
//! has returned successfully. Cache failures never reach the caller.
//!
//! A fill whose load overlapped an invalidation is not kept: every
//! invalidation bumps an epoch, and a reader that sees the epoch move between
//! its load and its `set` drops the value it wrote.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::keys::{invalidation_keys, CacheKey};
use super::CacheBackend;
use crate::config::CacheConfig;
use crate::error::OntoResult;
use crate::models::{
    ClassInstances, ClassWithProperties, CompetencyQuestions, Conversation, DataProperty, Domain,
    DomainRangePair, ImportantTerms, Instance, ObjectProperty, ObjectPropertyView, OntologyClass,
    Range,
};
use crate::scope::Scope;
use crate::store::{ConversationUpdate, EntityStore, Written};

#[derive(Clone)]
pub struct CachedGraph {
    store: EntityStore,
    cache: Option<Arc<dyn CacheBackend>>,
    ttl: Duration,
    /// Bumped before every invalidation; shared by clones.
    epoch: Arc<AtomicU64>,
}

impl CachedGraph {
    pub fn new(store: EntityStore, cache: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self {
            store,
            cache: Some(cache),
            ttl,
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Every read goes straight to the store.
    pub fn uncached(store: EntityStore) -> Self {
        Self {
            store,
            cache: None,
            ttl: Duration::ZERO,
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_config(store: EntityStore, cache: Arc<dyn CacheBackend>, config: &CacheConfig) -> Self {
        if config.enabled {
            Self::new(store, cache, Duration::from_secs(config.ttl_seconds))
        } else {
            Self::uncached(store)
        }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    async fn cached<T, F, Fut>(&self, key: CacheKey, load: F) -> OntoResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = OntoResult<T>>,
    {
        let Some(cache) = &self.cache else {
            return load().await;
        };
        let key = key.to_string();
        let epoch = self.epoch.load(Ordering::SeqCst);

        match cache.get(&key).await {
            Ok(Some(payload)) => match serde_json::from_str(&payload) {
                Ok(value) => {
                    debug!(%key, "Cache hit");
                    return Ok(value);
                }
                Err(e) => warn!(%key, error = %e, "Discarding undecodable cached payload"),
            },
            Ok(None) => debug!(%key, "Cache miss"),
            Err(e) => warn!(%key, error = %e, "Cache read failed, falling back to store"),
        }

        let value = load().await?;
        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!(%key, "Invalidated during load, not filling");
            return Ok(value);
        }

        let payload = match serde_json::to_string(&value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%key, error = %e, "Could not encode value for cache");
                return Ok(value);
            }
        };
        if let Err(e) = cache.set(&key, payload, self.ttl).await {
            warn!(%key, error = %e, "Cache write failed");
            return Ok(value);
        }

        // An invalidation that landed between the check and the set may have
        // deleted the key before the stale payload arrived.
        if self.epoch.load(Ordering::SeqCst) != epoch {
            if let Err(e) = cache.delete(&key).await {
                warn!(%key, error = %e, "Could not drop stale fill");
            }
        }
        Ok(value)
    }

    /// Drop every key derived from the given scopes. Failures are logged only.
    pub async fn invalidate<I>(&self, scopes: I)
    where
        I: IntoIterator<Item = Scope>,
    {
        self.invalidate_keys(scopes.into_iter().flat_map(invalidation_keys))
            .await;
    }

    async fn invalidate_keys<I>(&self, keys: I)
    where
        I: IntoIterator<Item = CacheKey>,
    {
        let Some(cache) = &self.cache else {
            return;
        };
        self.epoch.fetch_add(1, Ordering::SeqCst);

        let mut seen = HashSet::new();
        for key in keys {
            if !seen.insert(key) {
                continue;
            }
            let key = key.to_string();
            if let Err(e) = cache.delete(&key).await {
                warn!(%key, error = %e, "Cache invalidation failed");
            }
        }
        debug!(keys = seen.len(), "Invalidated cache keys");
    }

    async fn written<T>(&self, written: Written<T>) -> T {
        self.invalidate([written.scope]).await;
        written.value
    }

    async fn conversation_written(&self, written: Written<Conversation>) -> Conversation {
        let user_key = written.value.user_id.map(CacheKey::UserConversations);
        self.invalidate_keys(invalidation_keys(written.scope).into_iter().chain(user_key))
            .await;
        written.value
    }

    // ========================================================================
    // Cached reads
    // ========================================================================

    pub async fn user_conversations(&self, user_id: Uuid) -> OntoResult<Vec<Conversation>> {
        self.cached(CacheKey::UserConversations(user_id), || {
            self.store.conversations_for_user(user_id)
        })
        .await
    }

    pub async fn conversation(&self, id: Uuid) -> OntoResult<Conversation> {
        self.cached(CacheKey::Conversation(id), || self.store.conversation(id))
            .await
    }

    /// All live classes of the conversation with their properties.
    pub async fn classes(&self, conversation_id: Uuid) -> OntoResult<Vec<ClassWithProperties>> {
        self.cached(CacheKey::ConversationGraph(conversation_id), || {
            self.store.class_graph(conversation_id)
        })
        .await
    }

    pub async fn data_properties(&self, class_id: Uuid) -> OntoResult<Vec<DataProperty>> {
        self.cached(CacheKey::ClassDataProperties(class_id), || {
            self.store.data_properties(class_id)
        })
        .await
    }

    pub async fn object_properties(&self, class_id: Uuid) -> OntoResult<Vec<ObjectPropertyView>> {
        self.cached(CacheKey::ClassObjectProperties(class_id), || {
            self.store.object_properties(class_id)
        })
        .await
    }

    pub async fn domains(&self, object_property_id: Uuid) -> OntoResult<Vec<Domain>> {
        self.cached(CacheKey::ObjectPropertyDomains(object_property_id), || {
            self.store.domains(object_property_id)
        })
        .await
    }

    pub async fn ranges(&self, object_property_id: Uuid) -> OntoResult<Vec<Range>> {
        self.cached(CacheKey::ObjectPropertyRanges(object_property_id), || {
            self.store.ranges(object_property_id)
        })
        .await
    }

    pub async fn conversation_instances(&self, conversation_id: Uuid) -> OntoResult<Vec<ClassInstances>> {
        self.cached(CacheKey::ConversationInstances(conversation_id), || {
            self.store.conversation_instances(conversation_id)
        })
        .await
    }

    pub async fn class_instances(&self, class_id: Uuid) -> OntoResult<Vec<Instance>> {
        self.cached(CacheKey::ClassInstances(class_id), || {
            self.store.instances(class_id)
        })
        .await
    }

    pub async fn important_terms(&self, conversation_id: Uuid) -> OntoResult<Option<ImportantTerms>> {
        self.cached(CacheKey::ImportantTerms(conversation_id), || {
            self.store.important_terms(conversation_id)
        })
        .await
    }

    pub async fn competency_questions(
        &self,
        conversation_id: Uuid,
    ) -> OntoResult<Option<CompetencyQuestions>> {
        self.cached(CacheKey::CompetencyQuestions(conversation_id), || {
            self.store.competency_questions(conversation_id)
        })
        .await
    }

    // ========================================================================
    // Writes with invalidation
    // ========================================================================

    pub async fn create_conversation(
        &self,
        user_id: Option<Uuid>,
        domain: &str,
        scope: &str,
    ) -> OntoResult<Conversation> {
        let written = self.store.create_conversation(user_id, domain, scope).await?;
        Ok(self.conversation_written(written).await)
    }

    pub async fn update_conversation(&self, id: Uuid, update: ConversationUpdate) -> OntoResult<Conversation> {
        let written = self.store.update_conversation(id, update).await?;
        Ok(self.conversation_written(written).await)
    }

    /// Conversation delete also drops the keys of every class it owned and
    /// the owner's conversation list.
    pub async fn delete_conversation(&self, id: Uuid) -> OntoResult<()> {
        let user_key = self
            .store
            .conversation(id)
            .await?
            .user_id
            .map(CacheKey::UserConversations);
        let mut owned = Vec::new();
        for class in self.store.class_graph(id).await? {
            owned.push(Scope::class(id, class.id));
            owned.extend(class.object_properties.iter().map(|op| Scope::ObjectProperty {
                conversation_id: id,
                class_id: class.id,
                object_property_id: op.id,
            }));
        }

        let scope = self.store.delete_conversation(id).await?;
        let keys = std::iter::once(scope)
            .chain(owned)
            .flat_map(invalidation_keys)
            .chain(user_key);
        self.invalidate_keys(keys).await;
        Ok(())
    }

    pub async fn create_class(
        &self,
        conversation_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> OntoResult<OntologyClass> {
        let written = self.store.create_class(conversation_id, name, description).await?;
        Ok(self.written(written).await)
    }

    pub async fn update_class(&self, id: Uuid, name: &str, description: Option<&str>) -> OntoResult<OntologyClass> {
        let written = self.store.update_class(id, name, description).await?;
        Ok(self.written(written).await)
    }

    /// Class delete also drops the keys of the object properties it owned.
    pub async fn delete_class(&self, id: Uuid) -> OntoResult<()> {
        let owned: Vec<Uuid> = self
            .store
            .object_properties(id)
            .await?
            .into_iter()
            .map(|op| op.id)
            .collect();

        let scope = self.store.delete_class(id).await?;
        let op_scopes = owned.into_iter().map(|op| Scope::ObjectProperty {
            conversation_id: scope.conversation_id(),
            class_id: id,
            object_property_id: op,
        });
        self.invalidate(std::iter::once(scope).chain(op_scopes)).await;
        Ok(())
    }

    pub async fn create_data_property(&self, class_id: Uuid, name: &str, data_type: &str) -> OntoResult<DataProperty> {
        let written = self.store.create_data_property(class_id, name, data_type).await?;
        Ok(self.written(written).await)
    }

    pub async fn update_data_property(&self, id: Uuid, name: &str, data_type: &str) -> OntoResult<DataProperty> {
        let written = self.store.update_data_property(id, name, data_type).await?;
        Ok(self.written(written).await)
    }

    pub async fn delete_data_property(&self, id: Uuid) -> OntoResult<()> {
        let scope = self.store.delete_data_property(id).await?;
        self.invalidate([scope]).await;
        Ok(())
    }

    pub async fn create_object_property(&self, class_id: Uuid, name: &str) -> OntoResult<ObjectProperty> {
        let written = self.store.create_object_property(class_id, name).await?;
        Ok(self.written(written).await)
    }

    pub async fn update_object_property(&self, id: Uuid, name: &str) -> OntoResult<ObjectProperty> {
        let written = self.store.update_object_property(id, name).await?;
        Ok(self.written(written).await)
    }

    pub async fn delete_object_property(&self, id: Uuid) -> OntoResult<()> {
        let scope = self.store.delete_object_property(id).await?;
        self.invalidate([scope]).await;
        Ok(())
    }

    pub async fn create_instance(&self, class_id: Uuid, name: &str) -> OntoResult<Instance> {
        let written = self.store.create_instance(class_id, name).await?;
        Ok(self.written(written).await)
    }

    pub async fn update_instance(&self, id: Uuid, name: &str) -> OntoResult<Instance> {
        let written = self.store.update_instance(id, name).await?;
        Ok(self.written(written).await)
    }

    pub async fn delete_instance(&self, id: Uuid) -> OntoResult<()> {
        let scope = self.store.delete_instance(id).await?;
        self.invalidate([scope]).await;
        Ok(())
    }

    pub async fn create_domain_range_pair(
        &self,
        object_property_id: Uuid,
        domain: &str,
        range: &str,
    ) -> OntoResult<DomainRangePair> {
        let written = self
            .store
            .create_domain_range_pair(object_property_id, domain, range)
            .await?;
        Ok(self.written(written).await)
    }

    pub async fn update_domain(&self, id: Uuid, name: &str) -> OntoResult<Domain> {
        let written = self.store.update_domain(id, name).await?;
        Ok(self.written(written).await)
    }

    pub async fn update_range(&self, id: Uuid, name: &str) -> OntoResult<Range> {
        let written = self.store.update_range(id, name).await?;
        Ok(self.written(written).await)
    }

    pub async fn delete_domain_range_pair(&self, pair_id: Uuid) -> OntoResult<()> {
        let scope = self.store.delete_domain_range_pair(pair_id).await?;
        self.invalidate([scope]).await;
        Ok(())
    }

    pub async fn save_important_terms(&self, conversation_id: Uuid, terms: Vec<String>) -> OntoResult<ImportantTerms> {
        let written = self.store.save_important_terms(conversation_id, terms).await?;
        Ok(self.written(written).await)
    }

    pub async fn save_competency_questions(
        &self,
        conversation_id: Uuid,
        questions: Vec<String>,
    ) -> OntoResult<CompetencyQuestions> {
        let written = self
            .store
            .save_competency_questions(conversation_id, questions)
            .await?;
        Ok(self.written(written).await)
    }

    pub async fn validate_competency_questions(&self, id: Uuid, is_valid: bool) -> OntoResult<CompetencyQuestions> {
        let written = self.store.validate_competency_questions(id, is_valid).await?;
        Ok(self.written(written).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheError, MokaCache};
    use crate::store::MemoryBackend;
    use async_trait::async_trait;

    struct FailingCache;

    #[async_trait]
    impl CacheBackend for FailingCache {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
    }

    fn graph_with(cache: Arc<dyn CacheBackend>) -> CachedGraph {
        let store = EntityStore::new(Arc::new(MemoryBackend::new()));
        CachedGraph::new(store, cache, Duration::from_secs(300))
    }

    // ========================================================================
    // TEST 1: a populated key is served from the cache
    // ========================================================================
    #[tokio::test]
    async fn test_second_read_is_served_from_cache() {
        let cache = Arc::new(MokaCache::new(100));
        let graph = graph_with(cache.clone());
        let convo = graph.create_conversation(None, "energy", "solar").await.unwrap();

        graph.classes(convo.id).await.unwrap();
        let key = CacheKey::ConversationGraph(convo.id).to_string();
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("[]"));
    }

    // ========================================================================
    // TEST 2: a write through the layer invalidates the aggregate
    // ========================================================================
    #[tokio::test]
    async fn test_create_class_invalidates_conversation_graph() {
        let graph = graph_with(Arc::new(MokaCache::new(100)));
        let convo = graph.create_conversation(None, "energy", "solar").await.unwrap();

        assert!(graph.classes(convo.id).await.unwrap().is_empty());
        graph.create_class(convo.id, "Solar Panel", None).await.unwrap();

        let classes = graph.classes(convo.id).await.unwrap();
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].name, "Solar Panel");
    }

    // ========================================================================
    // TEST 3: garbage in the cache is treated as a miss
    // ========================================================================
    #[tokio::test]
    async fn test_undecodable_payload_is_a_miss() {
        let cache = Arc::new(MokaCache::new(100));
        let graph = graph_with(cache.clone());
        let convo = graph.create_conversation(None, "energy", "solar").await.unwrap();

        let key = CacheKey::Conversation(convo.id).to_string();
        cache
            .set(&key, "not json".into(), Duration::from_secs(60))
            .await
            .unwrap();

        let fetched = graph.conversation(convo.id).await.unwrap();
        assert_eq!(fetched.id, convo.id);
    }

    // ========================================================================
    // TEST 4: a broken cache never surfaces to the caller
    // ========================================================================
    #[tokio::test]
    async fn test_cache_errors_are_absorbed() {
        let graph = graph_with(Arc::new(FailingCache));
        let convo = graph.create_conversation(None, "energy", "solar").await.unwrap();
        let class = graph.create_class(convo.id, "Panel", None).await.unwrap();

        graph.delete_class(class.id).await.unwrap();
        assert!(graph.classes(convo.id).await.unwrap().is_empty());
    }

    // ========================================================================
    // TEST 5: disabled cache reads through to the store
    // ========================================================================
    #[tokio::test]
    async fn test_disabled_cache_reads_store() {
        let cache = Arc::new(MokaCache::new(100));
        let store = EntityStore::new(Arc::new(MemoryBackend::new()));
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let graph = CachedGraph::from_config(store, cache.clone(), &config);

        let convo = graph.create_conversation(None, "energy", "solar").await.unwrap();
        graph.classes(convo.id).await.unwrap();

        assert_eq!(cache.entry_count().await, 0);
    }
}
