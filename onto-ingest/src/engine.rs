use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use onto_core::{CachedGraph, OntoResult};

use crate::fragment::Fragment;
use crate::plan::{plan, IngestOutcome};

/// Applies language-model fragments to a conversation's graph.
///
/// One fragment is one write batch: either every row lands or none does.
/// Cache keys are dropped only after the batch committed.
#[derive(Clone)]
pub struct IngestEngine {
    graph: CachedGraph,
}

impl IngestEngine {
    pub fn new(graph: CachedGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &CachedGraph {
        &self.graph
    }

    pub async fn ingest_value(&self, conversation_id: Uuid, payload: Value) -> OntoResult<IngestOutcome> {
        let fragment = Fragment::from_value(payload)?;
        self.ingest(conversation_id, &fragment).await
    }

    pub async fn ingest(&self, conversation_id: Uuid, fragment: &Fragment) -> OntoResult<IngestOutcome> {
        fragment.validate()?;

        let store = self.graph.store();
        // Fails with NotFound for a missing or deleted conversation, even when
        // the fragment is empty.
        store.conversation(conversation_id).await?;

        if fragment.is_empty() {
            debug!(%conversation_id, "Empty fragment, nothing to ingest");
            return Ok(IngestOutcome::empty(conversation_id));
        }

        let classes_by_name = store.class_ids_by_name(conversation_id).await?;
        let existing_terms = if fragment.important_terms.is_empty() {
            None
        } else {
            store.important_terms(conversation_id).await?.map(|t| t.id)
        };

        let staged = plan(
            conversation_id,
            fragment,
            classes_by_name,
            existing_terms,
            Utc::now(),
        );
        let rows = staged.batch.insert_count();
        store.apply(staged.batch).await?;

        let outcome = staged.outcome;
        info!(
            %conversation_id,
            rows,
            classes_created = outcome.classes_created.len(),
            classes_reused = outcome.classes_reused.len(),
            object_properties = outcome.object_property_ids.len(),
            skipped_ranges = outcome.skipped_ranges,
            "Ingested fragment"
        );

        self.graph.invalidate(staged.scopes).await;
        Ok(outcome)
    }
}
