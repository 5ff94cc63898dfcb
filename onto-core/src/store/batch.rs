//! Unit-of-work description handed to a [`GraphBackend`](super::GraphBackend).
//!
//! A `WriteBatch` is applied all-or-nothing: inserts first (parents before
//! children), then updates by id, then cascading tombstones. Any update or
//! tombstone whose target is absent or already tombstoned fails the whole
//! batch with `NotFound`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::EntityKind;
use crate::models::{
    ClassLink, CompetencyQuestions, Conversation, DataProperty, Domain, DomainRangePair,
    ImportantTerms, Instance, ObjectProperty, OntologyClass, Range,
};

#[derive(Debug, Clone)]
pub struct WriteBatch {
    /// Timestamp written to every `updated_at` / `deleted_at` touched by the batch.
    pub at: DateTime<Utc>,
    pub conversations: Vec<Conversation>,
    pub classes: Vec<OntologyClass>,
    pub instances: Vec<Instance>,
    pub data_properties: Vec<DataProperty>,
    pub object_properties: Vec<ObjectProperty>,
    pub domains: Vec<Domain>,
    pub ranges: Vec<Range>,
    pub class_instance_links: Vec<ClassLink>,
    pub class_data_links: Vec<ClassLink>,
    pub class_object_links: Vec<ClassLink>,
    pub pairs: Vec<DomainRangePair>,
    pub important_terms: Vec<ImportantTerms>,
    pub competency_questions: Vec<CompetencyQuestions>,
    pub updates: Vec<Update>,
    pub tombstones: Vec<Tombstone>,
}

impl WriteBatch {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            at,
            conversations: Vec::new(),
            classes: Vec::new(),
            instances: Vec::new(),
            data_properties: Vec::new(),
            object_properties: Vec::new(),
            domains: Vec::new(),
            ranges: Vec::new(),
            class_instance_links: Vec::new(),
            class_data_links: Vec::new(),
            class_object_links: Vec::new(),
            pairs: Vec::new(),
            important_terms: Vec::new(),
            competency_questions: Vec::new(),
            updates: Vec::new(),
            tombstones: Vec::new(),
        }
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn with_update(mut self, update: Update) -> Self {
        self.updates.push(update);
        self
    }

    pub fn with_tombstone(mut self, tombstone: Tombstone) -> Self {
        self.tombstones.push(tombstone);
        self
    }

    /// Number of rows inserted by this batch.
    pub fn insert_count(&self) -> usize {
        self.conversations.len()
            + self.classes.len()
            + self.instances.len()
            + self.data_properties.len()
            + self.object_properties.len()
            + self.domains.len()
            + self.ranges.len()
            + self.class_instance_links.len()
            + self.class_data_links.len()
            + self.class_object_links.len()
            + self.pairs.len()
            + self.important_terms.len()
            + self.competency_questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insert_count() == 0 && self.updates.is_empty() && self.tombstones.is_empty()
    }
}

/// Mutable-field update of one live row. Identity never changes.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    Conversation {
        id: Uuid,
        title: Option<String>,
        domain: String,
        scope: String,
        is_active: bool,
    },
    Class {
        id: Uuid,
        name: String,
        description: Option<String>,
    },
    DataProperty {
        id: Uuid,
        name: String,
        data_type: String,
    },
    ObjectProperty {
        id: Uuid,
        name: String,
    },
    Instance {
        id: Uuid,
        name: String,
    },
    Domain {
        id: Uuid,
        name: String,
    },
    Range {
        id: Uuid,
        name: String,
    },
    ImportantTerms {
        id: Uuid,
        terms: Vec<String>,
    },
    CompetencyQuestions {
        id: Uuid,
        questions: Vec<String>,
    },
    ValidateCompetencyQuestions {
        id: Uuid,
        is_valid: bool,
    },
}

impl Update {
    pub fn target(&self) -> (EntityKind, Uuid) {
        match self {
            Update::Conversation { id, .. } => (EntityKind::Conversation, *id),
            Update::Class { id, .. } => (EntityKind::Class, *id),
            Update::DataProperty { id, .. } => (EntityKind::DataProperty, *id),
            Update::ObjectProperty { id, .. } => (EntityKind::ObjectProperty, *id),
            Update::Instance { id, .. } => (EntityKind::Instance, *id),
            Update::Domain { id, .. } => (EntityKind::Domain, *id),
            Update::Range { id, .. } => (EntityKind::Range, *id),
            Update::ImportantTerms { id, .. } => (EntityKind::ImportantTerms, *id),
            Update::CompetencyQuestions { id, .. }
            | Update::ValidateCompetencyQuestions { id, .. } => {
                (EntityKind::CompetencyQuestions, *id)
            }
        }
    }
}

/// Soft-delete of one live row together with everything it owns.
///
/// - `Conversation`: the conversation, every live class (cascading), its notes
/// - `Class`: the class, owned data/object properties and instances, every
///   junction row touching any of them, and the object properties' pairs
/// - `ObjectProperty`: the property, its domains, ranges, pairs and class links
/// - `DomainRangePair`: the junction row, its range, and its domain once no
///   other live pair uses it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tombstone {
    Conversation(Uuid),
    Class(Uuid),
    DataProperty(Uuid),
    ObjectProperty(Uuid),
    Instance(Uuid),
    DomainRangePair(Uuid),
}

impl Tombstone {
    pub fn target(&self) -> (EntityKind, Uuid) {
        match *self {
            Tombstone::Conversation(id) => (EntityKind::Conversation, id),
            Tombstone::Class(id) => (EntityKind::Class, id),
            Tombstone::DataProperty(id) => (EntityKind::DataProperty, id),
            Tombstone::ObjectProperty(id) => (EntityKind::ObjectProperty, id),
            Tombstone::Instance(id) => (EntityKind::Instance, id),
            Tombstone::DomainRangePair(id) => (EntityKind::DomainRangePair, id),
        }
    }
}
