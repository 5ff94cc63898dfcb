//! Staging of a fragment into one write batch.
//!
//! Pure: given the conversation's existing class names, produces the batch to
//! apply, the ids it will create, and the scopes whose cache keys go stale.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use onto_core::models::{
    normalize_name, ClassLink, DataProperty, Domain, DomainRangePair, ImportantTerms, Instance,
    ObjectProperty, OntologyClass, Range,
};
use onto_core::{Scope, Update, WriteBatch};

use crate::fragment::{ClassFragment, Fragment, ObjectPropertyFragment};

/// Ids created or reused by one ingestion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub conversation_id: Uuid,
    pub classes_created: Vec<Uuid>,
    pub classes_reused: Vec<Uuid>,
    pub instance_ids: Vec<Uuid>,
    pub data_property_ids: Vec<Uuid>,
    pub object_property_ids: Vec<Uuid>,
    pub domain_ids: Vec<Uuid>,
    pub range_ids: Vec<Uuid>,
    pub pair_ids: Vec<Uuid>,
    /// Range names dropped because their object property declared no domain.
    pub skipped_ranges: usize,
}

impl IngestOutcome {
    pub fn empty(conversation_id: Uuid) -> Self {
        Self {
            conversation_id,
            classes_created: Vec::new(),
            classes_reused: Vec::new(),
            instance_ids: Vec::new(),
            data_property_ids: Vec::new(),
            object_property_ids: Vec::new(),
            domain_ids: Vec::new(),
            range_ids: Vec::new(),
            pair_ids: Vec::new(),
            skipped_ranges: 0,
        }
    }
}

#[derive(Debug)]
pub struct IngestPlan {
    pub batch: WriteBatch,
    pub outcome: IngestOutcome,
    /// Conversation first, then each touched class and object property.
    pub scopes: Vec<Scope>,
}

struct Planner {
    conversation_id: Uuid,
    classes_by_name: HashMap<String, Uuid>,
    created: HashSet<Uuid>,
    touched: HashSet<Uuid>,
    batch: WriteBatch,
    outcome: IngestOutcome,
    scopes: Vec<Scope>,
}

/// Build the write batch for `fragment`.
///
/// `classes_by_name` maps normalized names of live classes to their ids;
/// `existing_terms` is the id of the conversation's live important-terms row.
pub fn plan(
    conversation_id: Uuid,
    fragment: &Fragment,
    classes_by_name: HashMap<String, Uuid>,
    existing_terms: Option<Uuid>,
    at: DateTime<Utc>,
) -> IngestPlan {
    let mut planner = Planner {
        conversation_id,
        classes_by_name,
        created: HashSet::new(),
        touched: HashSet::new(),
        batch: WriteBatch::new(at),
        outcome: IngestOutcome::empty(conversation_id),
        scopes: vec![Scope::conversation(conversation_id)],
    };

    for class in &fragment.classes {
        planner.stage_class(class);
    }
    if !fragment.important_terms.is_empty() {
        planner.stage_terms(&fragment.important_terms, existing_terms);
    }

    IngestPlan {
        batch: planner.batch,
        outcome: planner.outcome,
        scopes: planner.scopes,
    }
}

impl Planner {
    fn resolve_class(&mut self, name: &str) -> Uuid {
        let key = normalize_name(name);
        if let Some(&id) = self.classes_by_name.get(&key) {
            if !self.created.contains(&id) && self.touched.insert(id) {
                self.outcome.classes_reused.push(id);
                self.scopes.push(Scope::class(self.conversation_id, id));
            }
            return id;
        }

        let class = OntologyClass {
            id: Uuid::new_v4(),
            conversation_id: self.conversation_id,
            name: name.to_string(),
            description: None,
            created_at: self.batch.at,
            updated_at: None,
        };
        let id = class.id;
        self.classes_by_name.insert(key, id);
        self.created.insert(id);
        self.touched.insert(id);
        self.batch.classes.push(class);
        self.outcome.classes_created.push(id);
        self.scopes.push(Scope::class(self.conversation_id, id));
        id
    }

    fn stage_class(&mut self, fragment: &ClassFragment) {
        let class_id = self.resolve_class(fragment.name.trim());
        let at = self.batch.at;

        for name in &fragment.instances {
            let instance = Instance {
                id: Uuid::new_v4(),
                class_id,
                name: name.trim().to_string(),
                created_at: at,
                updated_at: None,
            };
            self.outcome.instance_ids.push(instance.id);
            self.batch
                .class_instance_links
                .push(ClassLink::new(class_id, instance.id));
            self.batch.instances.push(instance);
        }

        for dp in &fragment.data_properties {
            let property = DataProperty {
                id: Uuid::new_v4(),
                class_id,
                name: dp.name.trim().to_string(),
                data_type: dp.recommended_data_type.trim().to_string(),
                created_at: at,
                updated_at: None,
            };
            self.outcome.data_property_ids.push(property.id);
            self.batch
                .class_data_links
                .push(ClassLink::new(class_id, property.id));
            self.batch.data_properties.push(property);
        }

        for op in &fragment.object_properties {
            self.stage_object_property(class_id, op);
        }
    }

    /// One domain row per domain name; one range row and one pair per
    /// (domain, range) combination.
    fn stage_object_property(&mut self, class_id: Uuid, fragment: &ObjectPropertyFragment) {
        let at = self.batch.at;
        let property = ObjectProperty {
            id: Uuid::new_v4(),
            class_id,
            name: fragment.name.trim().to_string(),
            created_at: at,
            updated_at: None,
        };
        let op_id = property.id;
        self.outcome.object_property_ids.push(op_id);
        self.batch
            .class_object_links
            .push(ClassLink::new(class_id, op_id));
        self.batch.object_properties.push(property);
        self.scopes.push(Scope::ObjectProperty {
            conversation_id: self.conversation_id,
            class_id,
            object_property_id: op_id,
        });

        if fragment.recommended_domain.is_empty() && !fragment.recommended_range.is_empty() {
            warn!(
                object_property = %fragment.name,
                ranges = fragment.recommended_range.len(),
                "Object property declares ranges without a domain, skipping ranges"
            );
            self.outcome.skipped_ranges += fragment.recommended_range.len();
            return;
        }

        for domain_name in &fragment.recommended_domain {
            let domain = Domain {
                id: Uuid::new_v4(),
                object_property_id: op_id,
                name: domain_name.trim().to_string(),
                created_at: at,
                updated_at: None,
            };
            let domain_id = domain.id;
            self.outcome.domain_ids.push(domain_id);
            self.batch.domains.push(domain);

            for range_name in &fragment.recommended_range {
                let range = Range {
                    id: Uuid::new_v4(),
                    object_property_id: op_id,
                    name: range_name.trim().to_string(),
                    created_at: at,
                    updated_at: None,
                };
                let pair = DomainRangePair {
                    id: Uuid::new_v4(),
                    object_property_id: op_id,
                    domain_id,
                    range_id: range.id,
                    created_at: at,
                };
                self.outcome.range_ids.push(range.id);
                self.outcome.pair_ids.push(pair.id);
                self.batch.ranges.push(range);
                self.batch.pairs.push(pair);
            }
        }
    }

    fn stage_terms(&mut self, terms: &[String], existing: Option<Uuid>) {
        let terms: Vec<String> = terms.iter().map(|t| t.trim().to_string()).collect();
        match existing {
            Some(id) => self.batch.updates.push(Update::ImportantTerms { id, terms }),
            None => self.batch.important_terms.push(ImportantTerms {
                id: Uuid::new_v4(),
                conversation_id: self.conversation_id,
                terms,
                created_at: self.batch.at,
                updated_at: None,
            }),
        }
    }
}
