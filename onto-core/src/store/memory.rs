//! In-memory graph backend
//!
//! Arena/table model: every table is an append-only `Vec` of rows carrying a
//! tombstone, plus an id → position index. The row position is the surrogate
//! sequence id and is never exposed. A batch is applied to a staged copy of the
//! tables, which replaces the live tables only if every step succeeded.
//!
//! Used by tests and embedded callers; `PgBackend` is the production backend.

use std::collections::HashMap;
#[cfg(any(test, feature = "testing"))]
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::batch::{Tombstone, Update, WriteBatch};
use super::GraphBackend;
use crate::error::{EntityKind, OntoError, OntoResult};
use crate::models::{
    ClassLink, CompetencyQuestions, Conversation, DataProperty, Domain, DomainRangePair,
    ImportantTerms, Instance, ObjectProperty, OntologyClass, Range,
};

fn lock_err(context: &'static str) -> OntoError {
    OntoError::Store(format!("poisoned lock: {context}"))
}

fn require(present: bool, kind: EntityKind, id: Uuid) -> OntoResult<()> {
    if present {
        Ok(())
    } else {
        Err(OntoError::not_found(kind, id))
    }
}

trait Keyed {
    fn key(&self) -> Uuid;
}

macro_rules! keyed {
    ($($ty:ty),* $(,)?) => {
        $(impl Keyed for $ty {
            fn key(&self) -> Uuid {
                self.id
            }
        })*
    };
}

keyed!(
    Conversation,
    OntologyClass,
    Instance,
    DataProperty,
    ObjectProperty,
    Domain,
    Range,
    DomainRangePair,
    ImportantTerms,
    CompetencyQuestions,
);

#[derive(Debug, Clone)]
struct Row<T> {
    record: T,
    deleted_at: Option<DateTime<Utc>>,
}

impl<T> Row<T> {
    fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

#[derive(Debug, Clone)]
struct Table<T> {
    rows: Vec<Row<T>>,
    index: HashMap<Uuid, usize>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Keyed> Table<T> {
    fn insert(&mut self, record: T) -> OntoResult<()> {
        let key = record.key();
        if self.index.contains_key(&key) {
            return Err(OntoError::Store(format!("duplicate key: {key}")));
        }
        self.index.insert(key, self.rows.len());
        self.rows.push(Row {
            record,
            deleted_at: None,
        });
        Ok(())
    }

    /// Live rows in insertion order. All list reads go through here.
    fn live(&self) -> impl Iterator<Item = &T> + '_ {
        self.rows.iter().filter(|r| r.is_live()).map(|r| &r.record)
    }

    fn get(&self, id: Uuid) -> Option<&T> {
        let row = &self.rows[*self.index.get(&id)?];
        row.is_live().then_some(&row.record)
    }

    fn contains(&self, id: Uuid) -> bool {
        self.get(id).is_some()
    }

    fn get_mut(&mut self, id: Uuid) -> Option<&mut T> {
        let row = &mut self.rows[*self.index.get(&id)?];
        if row.is_live() {
            Some(&mut row.record)
        } else {
            None
        }
    }

    fn tombstone(&mut self, id: Uuid, at: DateTime<Utc>) -> bool {
        match self.index.get(&id) {
            Some(&i) if self.rows[i].is_live() => {
                self.rows[i].deleted_at = Some(at);
                true
            }
            _ => false,
        }
    }

    fn tombstone_where(&mut self, at: DateTime<Utc>, pred: impl Fn(&T) -> bool) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for row in self.rows.iter_mut().filter(|r| r.is_live()) {
            if pred(&row.record) {
                row.deleted_at = Some(at);
                ids.push(row.record.key());
            }
        }
        ids
    }
}

#[derive(Debug, Clone, Default)]
struct Junction {
    rows: Vec<Row<ClassLink>>,
}

impl Junction {
    fn insert(&mut self, link: ClassLink) {
        self.rows.push(Row {
            record: link,
            deleted_at: None,
        });
    }

    fn live(&self) -> impl Iterator<Item = &ClassLink> + '_ {
        self.rows.iter().filter(|r| r.is_live()).map(|r| &r.record)
    }

    fn tombstone_where(&mut self, at: DateTime<Utc>, pred: impl Fn(&ClassLink) -> bool) {
        for row in self.rows.iter_mut().filter(|r| r.is_live()) {
            if pred(&row.record) {
                row.deleted_at = Some(at);
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
struct GraphTables {
    conversations: Table<Conversation>,
    classes: Table<OntologyClass>,
    instances: Table<Instance>,
    data_properties: Table<DataProperty>,
    object_properties: Table<ObjectProperty>,
    domains: Table<Domain>,
    ranges: Table<Range>,
    class_instances: Junction,
    class_data: Junction,
    class_objects: Junction,
    pairs: Table<DomainRangePair>,
    important_terms: Table<ImportantTerms>,
    competency_questions: Table<CompetencyQuestions>,
}

impl GraphTables {
    fn apply(&mut self, batch: WriteBatch) -> OntoResult<()> {
        let at = batch.at;

        for c in batch.conversations {
            self.conversations.insert(c)?;
        }
        for c in batch.classes {
            self.require_conversation(c.conversation_id)?;
            self.classes.insert(c)?;
        }
        for i in batch.instances {
            self.require_class(i.class_id)?;
            self.instances.insert(i)?;
        }
        for dp in batch.data_properties {
            self.require_class(dp.class_id)?;
            self.data_properties.insert(dp)?;
        }
        for op in batch.object_properties {
            self.require_class(op.class_id)?;
            self.object_properties.insert(op)?;
        }
        for d in batch.domains {
            self.require_object_property(d.object_property_id)?;
            self.domains.insert(d)?;
        }
        for r in batch.ranges {
            self.require_object_property(r.object_property_id)?;
            self.ranges.insert(r)?;
        }
        for link in batch.class_instance_links {
            self.require_class(link.class_id)?;
            require(
                self.instances.contains(link.member_id),
                EntityKind::Instance,
                link.member_id,
            )?;
            self.class_instances.insert(link);
        }
        for link in batch.class_data_links {
            self.require_class(link.class_id)?;
            require(
                self.data_properties.contains(link.member_id),
                EntityKind::DataProperty,
                link.member_id,
            )?;
            self.class_data.insert(link);
        }
        for link in batch.class_object_links {
            self.require_class(link.class_id)?;
            self.require_object_property(link.member_id)?;
            self.class_objects.insert(link);
        }
        for p in batch.pairs {
            self.require_object_property(p.object_property_id)?;
            require(self.domains.contains(p.domain_id), EntityKind::Domain, p.domain_id)?;
            require(self.ranges.contains(p.range_id), EntityKind::Range, p.range_id)?;
            self.pairs.insert(p)?;
        }
        for t in batch.important_terms {
            self.require_conversation(t.conversation_id)?;
            self.important_terms.insert(t)?;
        }
        for q in batch.competency_questions {
            self.require_conversation(q.conversation_id)?;
            self.competency_questions.insert(q)?;
        }

        for update in batch.updates {
            self.update(update, at)?;
        }
        for tombstone in batch.tombstones {
            self.tombstone(tombstone, at)?;
        }
        Ok(())
    }

    fn require_conversation(&self, id: Uuid) -> OntoResult<()> {
        require(self.conversations.contains(id), EntityKind::Conversation, id)
    }

    fn require_class(&self, id: Uuid) -> OntoResult<()> {
        require(self.classes.contains(id), EntityKind::Class, id)
    }

    fn require_object_property(&self, id: Uuid) -> OntoResult<()> {
        require(self.object_properties.contains(id), EntityKind::ObjectProperty, id)
    }

    fn update(&mut self, update: Update, at: DateTime<Utc>) -> OntoResult<()> {
        let (kind, target) = update.target();
        let missing = move || OntoError::not_found(kind, target);

        match update {
            Update::Conversation {
                id,
                title,
                domain,
                scope,
                is_active,
            } => {
                let row = self.conversations.get_mut(id).ok_or_else(missing)?;
                row.title = title;
                row.domain = domain;
                row.scope = scope;
                row.is_active = is_active;
                row.updated_at = Some(at);
            }
            Update::Class {
                id,
                name,
                description,
            } => {
                let row = self.classes.get_mut(id).ok_or_else(missing)?;
                row.name = name;
                row.description = description;
                row.updated_at = Some(at);
            }
            Update::DataProperty {
                id,
                name,
                data_type,
            } => {
                let row = self.data_properties.get_mut(id).ok_or_else(missing)?;
                row.name = name;
                row.data_type = data_type;
                row.updated_at = Some(at);
            }
            Update::ObjectProperty { id, name } => {
                let row = self.object_properties.get_mut(id).ok_or_else(missing)?;
                row.name = name;
                row.updated_at = Some(at);
            }
            Update::Instance { id, name } => {
                let row = self.instances.get_mut(id).ok_or_else(missing)?;
                row.name = name;
                row.updated_at = Some(at);
            }
            Update::Domain { id, name } => {
                let row = self.domains.get_mut(id).ok_or_else(missing)?;
                row.name = name;
                row.updated_at = Some(at);
            }
            Update::Range { id, name } => {
                let row = self.ranges.get_mut(id).ok_or_else(missing)?;
                row.name = name;
                row.updated_at = Some(at);
            }
            Update::ImportantTerms { id, terms } => {
                let row = self.important_terms.get_mut(id).ok_or_else(missing)?;
                row.terms = terms;
                row.updated_at = Some(at);
            }
            Update::CompetencyQuestions { id, questions } => {
                let row = self.competency_questions.get_mut(id).ok_or_else(missing)?;
                row.questions = questions;
                row.updated_at = Some(at);
            }
            Update::ValidateCompetencyQuestions { id, is_valid } => {
                let row = self.competency_questions.get_mut(id).ok_or_else(missing)?;
                row.is_valid = is_valid;
                row.updated_at = Some(at);
                row.validated_at = Some(at);
            }
        }
        Ok(())
    }

    fn tombstone(&mut self, tombstone: Tombstone, at: DateTime<Utc>) -> OntoResult<()> {
        let (kind, target) = tombstone.target();
        let missing = OntoError::not_found(kind, target);

        match tombstone {
            Tombstone::Conversation(id) => {
                if !self.conversations.tombstone(id, at) {
                    return Err(missing);
                }
                // Deactivation is a second, separate write after the tombstone.
                if let Some(&i) = self.conversations.index.get(&id) {
                    let record = &mut self.conversations.rows[i].record;
                    record.is_active = false;
                    record.updated_at = Some(at);
                }
                for class_id in self.classes.tombstone_where(at, |c| c.conversation_id == id) {
                    self.cascade_class(class_id, at);
                }
                self.important_terms
                    .tombstone_where(at, |t| t.conversation_id == id);
                self.competency_questions
                    .tombstone_where(at, |q| q.conversation_id == id);
            }
            Tombstone::Class(id) => {
                if !self.classes.tombstone(id, at) {
                    return Err(missing);
                }
                self.cascade_class(id, at);
            }
            Tombstone::DataProperty(id) => {
                if !self.data_properties.tombstone(id, at) {
                    return Err(missing);
                }
                self.class_data.tombstone_where(at, |l| l.member_id == id);
            }
            Tombstone::Instance(id) => {
                if !self.instances.tombstone(id, at) {
                    return Err(missing);
                }
                self.class_instances.tombstone_where(at, |l| l.member_id == id);
            }
            Tombstone::ObjectProperty(id) => {
                if !self.object_properties.tombstone(id, at) {
                    return Err(missing);
                }
                self.cascade_object_property(id, at);
            }
            Tombstone::DomainRangePair(id) => {
                let pair = self.pairs.get(id).cloned().ok_or(missing)?;
                self.pairs.tombstone(id, at);
                self.ranges.tombstone(pair.range_id, at);
                let domain_in_use = self.pairs.live().any(|p| p.domain_id == pair.domain_id);
                if !domain_in_use {
                    self.domains.tombstone(pair.domain_id, at);
                }
            }
        }
        Ok(())
    }

    fn cascade_class(&mut self, class_id: Uuid, at: DateTime<Utc>) {
        let object_properties = self
            .object_properties
            .tombstone_where(at, |op| op.class_id == class_id);
        for op_id in object_properties {
            self.cascade_object_property(op_id, at);
        }

        let data_properties = self
            .data_properties
            .tombstone_where(at, |dp| dp.class_id == class_id);
        self.class_data.tombstone_where(at, |l| {
            l.class_id == class_id || data_properties.contains(&l.member_id)
        });

        let instances = self.instances.tombstone_where(at, |i| i.class_id == class_id);
        self.class_instances
            .tombstone_where(at, |l| l.class_id == class_id || instances.contains(&l.member_id));

        self.class_objects.tombstone_where(at, |l| l.class_id == class_id);
    }

    fn cascade_object_property(&mut self, op_id: Uuid, at: DateTime<Utc>) {
        self.pairs.tombstone_where(at, |p| p.object_property_id == op_id);
        self.domains.tombstone_where(at, |d| d.object_property_id == op_id);
        self.ranges.tombstone_where(at, |r| r.object_property_id == op_id);
        self.class_objects.tombstone_where(at, |l| l.member_id == op_id);
    }
}

/// Live row counts per table.
#[cfg(any(test, feature = "testing"))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveCounts {
    pub conversations: usize,
    pub classes: usize,
    pub instances: usize,
    pub data_properties: usize,
    pub object_properties: usize,
    pub domains: usize,
    pub ranges: usize,
    pub class_instance_links: usize,
    pub class_data_links: usize,
    pub class_object_links: usize,
    pub pairs: usize,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<GraphTables>,
    #[cfg(any(test, feature = "testing"))]
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&GraphTables) -> R) -> OntoResult<R> {
        let state = self.state.read().map_err(|_| lock_err("read"))?;
        Ok(f(&state))
    }
}

/// Inspection and fault injection, enabled by the `testing` feature.
#[cfg(any(test, feature = "testing"))]
impl MemoryBackend {
    /// Make every subsequent `apply` fail with a store error (fault injection).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn live_counts(&self) -> OntoResult<LiveCounts> {
        self.with_state(|s| LiveCounts {
            conversations: s.conversations.live().count(),
            classes: s.classes.live().count(),
            instances: s.instances.live().count(),
            data_properties: s.data_properties.live().count(),
            object_properties: s.object_properties.live().count(),
            domains: s.domains.live().count(),
            ranges: s.ranges.live().count(),
            class_instance_links: s.class_instances.live().count(),
            class_data_links: s.class_data.live().count(),
            class_object_links: s.class_objects.live().count(),
            pairs: s.pairs.live().count(),
        })
    }

    /// Live junction rows with an endpoint that is absent or tombstoned.
    pub fn dangling_links(&self) -> OntoResult<usize> {
        self.with_state(|s| {
            let instance_links = s
                .class_instances
                .live()
                .filter(|l| !s.classes.contains(l.class_id) || !s.instances.contains(l.member_id))
                .count();
            let data_links = s
                .class_data
                .live()
                .filter(|l| {
                    !s.classes.contains(l.class_id) || !s.data_properties.contains(l.member_id)
                })
                .count();
            let object_links = s
                .class_objects
                .live()
                .filter(|l| {
                    !s.classes.contains(l.class_id) || !s.object_properties.contains(l.member_id)
                })
                .count();
            let pairs = s
                .pairs
                .live()
                .filter(|p| {
                    !s.object_properties.contains(p.object_property_id)
                        || !s.domains.contains(p.domain_id)
                        || !s.ranges.contains(p.range_id)
                })
                .count();
            instance_links + data_links + object_links + pairs
        })
    }
}

fn linked<T: Clone + Keyed>(
    junction: &Junction,
    table: &Table<T>,
    class_ids: &[Uuid],
) -> Vec<(Uuid, T)> {
    junction
        .live()
        .filter(|l| class_ids.contains(&l.class_id))
        .filter_map(|l| table.get(l.member_id).map(|m| (l.class_id, m.clone())))
        .collect()
}

fn scoped<T: Clone + Keyed>(
    table: &Table<T>,
    ids: &[Uuid],
    owner: impl Fn(&T) -> Uuid,
) -> Vec<T> {
    table
        .live()
        .filter(|r| ids.contains(&owner(r)))
        .cloned()
        .collect()
}

#[async_trait]
impl GraphBackend for MemoryBackend {
    async fn apply(&self, batch: WriteBatch) -> OntoResult<()> {
        #[cfg(any(test, feature = "testing"))]
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(OntoError::Store("write rejected by fault injection".to_string()));
        }

        let mut state = self.state.write().map_err(|_| lock_err("apply"))?;
        let mut staged = state.clone();
        staged.apply(batch)?;
        *state = staged;
        Ok(())
    }

    async fn conversation(&self, id: Uuid) -> OntoResult<Option<Conversation>> {
        self.with_state(|s| s.conversations.get(id).cloned())
    }

    async fn conversations_for_user(&self, user_id: Uuid) -> OntoResult<Vec<Conversation>> {
        self.with_state(|s| {
            s.conversations
                .live()
                .filter(|c| c.user_id == Some(user_id))
                .cloned()
                .collect()
        })
    }

    async fn class(&self, id: Uuid) -> OntoResult<Option<OntologyClass>> {
        self.with_state(|s| s.classes.get(id).cloned())
    }

    async fn classes(&self, conversation_id: Uuid) -> OntoResult<Vec<OntologyClass>> {
        self.with_state(|s| scoped(&s.classes, &[conversation_id], |c| c.conversation_id))
    }

    async fn data_property(&self, id: Uuid) -> OntoResult<Option<DataProperty>> {
        self.with_state(|s| s.data_properties.get(id).cloned())
    }

    async fn object_property(&self, id: Uuid) -> OntoResult<Option<ObjectProperty>> {
        self.with_state(|s| s.object_properties.get(id).cloned())
    }

    async fn instance(&self, id: Uuid) -> OntoResult<Option<Instance>> {
        self.with_state(|s| s.instances.get(id).cloned())
    }

    async fn domain(&self, id: Uuid) -> OntoResult<Option<Domain>> {
        self.with_state(|s| s.domains.get(id).cloned())
    }

    async fn range(&self, id: Uuid) -> OntoResult<Option<Range>> {
        self.with_state(|s| s.ranges.get(id).cloned())
    }

    async fn pair(&self, id: Uuid) -> OntoResult<Option<DomainRangePair>> {
        self.with_state(|s| s.pairs.get(id).cloned())
    }

    async fn linked_data_properties(
        &self,
        class_ids: &[Uuid],
    ) -> OntoResult<Vec<(Uuid, DataProperty)>> {
        self.with_state(|s| linked(&s.class_data, &s.data_properties, class_ids))
    }

    async fn linked_object_properties(
        &self,
        class_ids: &[Uuid],
    ) -> OntoResult<Vec<(Uuid, ObjectProperty)>> {
        self.with_state(|s| linked(&s.class_objects, &s.object_properties, class_ids))
    }

    async fn linked_instances(&self, class_ids: &[Uuid]) -> OntoResult<Vec<(Uuid, Instance)>> {
        self.with_state(|s| linked(&s.class_instances, &s.instances, class_ids))
    }

    async fn domains(&self, object_property_ids: &[Uuid]) -> OntoResult<Vec<Domain>> {
        self.with_state(|s| scoped(&s.domains, object_property_ids, |d| d.object_property_id))
    }

    async fn ranges(&self, object_property_ids: &[Uuid]) -> OntoResult<Vec<Range>> {
        self.with_state(|s| scoped(&s.ranges, object_property_ids, |r| r.object_property_id))
    }

    async fn pairs(&self, object_property_ids: &[Uuid]) -> OntoResult<Vec<DomainRangePair>> {
        self.with_state(|s| scoped(&s.pairs, object_property_ids, |p| p.object_property_id))
    }

    async fn important_terms(&self, conversation_id: Uuid) -> OntoResult<Option<ImportantTerms>> {
        self.with_state(|s| {
            s.important_terms
                .live()
                .find(|t| t.conversation_id == conversation_id)
                .cloned()
        })
    }

    async fn competency_questions(
        &self,
        conversation_id: Uuid,
    ) -> OntoResult<Option<CompetencyQuestions>> {
        self.with_state(|s| {
            s.competency_questions
                .live()
                .find(|q| q.conversation_id == conversation_id)
                .cloned()
        })
    }

    async fn competency_questions_by_id(
        &self,
        id: Uuid,
    ) -> OntoResult<Option<CompetencyQuestions>> {
        self.with_state(|s| s.competency_questions.get(id).cloned())
    }
}
