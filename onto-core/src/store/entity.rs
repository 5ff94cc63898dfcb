//! Typed entity operations over a [`GraphBackend`].
//!
//! Creates and updates return the written row together with the [`Scope`] it
//! touched; deletes return the scope only. Callers that keep a cache use the
//! scope to invalidate after the write has committed.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::assemble;
use super::batch::{Tombstone, Update, WriteBatch};
use super::GraphBackend;
use crate::error::{EntityKind, OntoError, OntoResult};
use crate::models::{
    normalize_name, ClassInstances, ClassLink, ClassWithProperties, CompetencyQuestions,
    Conversation, DataProperty, Domain, DomainRangePair, ImportantTerms, Instance,
    ObjectProperty, ObjectPropertyView, OntologyClass, Range,
};
use crate::scope::Scope;

/// A committed write and the scope it touched.
#[derive(Debug, Clone, PartialEq)]
pub struct Written<T> {
    pub value: T,
    pub scope: Scope,
}

impl<T> Written<T> {
    fn new(value: T, scope: Scope) -> Self {
        Self { value, scope }
    }
}

/// Mutable fields of a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationUpdate {
    pub title: Option<String>,
    pub domain: String,
    pub scope: String,
    pub is_active: bool,
}

/// Trimmed, non-empty name or a `Validation` error.
pub(crate) fn require_name(what: &str, name: &str) -> OntoResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(OntoError::Validation(format!("{what} name must not be blank")));
    }
    Ok(trimmed.to_string())
}

fn found<T>(row: Option<T>, kind: EntityKind, id: Uuid) -> OntoResult<T> {
    row.ok_or_else(|| OntoError::not_found(kind, id))
}

#[derive(Clone)]
pub struct EntityStore {
    backend: Arc<dyn GraphBackend>,
}

impl EntityStore {
    pub fn new(backend: Arc<dyn GraphBackend>) -> Self {
        Self { backend }
    }

    /// Apply a prepared batch as one unit of work.
    pub async fn apply(&self, batch: WriteBatch) -> OntoResult<()> {
        self.backend.apply(batch).await
    }

    // ========================================================================
    // Scope resolution
    // ========================================================================

    async fn class_scope(&self, class_id: Uuid) -> OntoResult<(OntologyClass, Scope)> {
        let class = self.class(class_id).await?;
        let scope = Scope::class(class.conversation_id, class.id);
        Ok((class, scope))
    }

    async fn object_property_scope(&self, object_property_id: Uuid) -> OntoResult<Scope> {
        let op = self.object_property(object_property_id).await?;
        let class = self.class(op.class_id).await?;
        Ok(Scope::ObjectProperty {
            conversation_id: class.conversation_id,
            class_id: class.id,
            object_property_id: op.id,
        })
    }

    // ========================================================================
    // Conversations
    // ========================================================================

    pub async fn create_conversation(
        &self,
        user_id: Option<Uuid>,
        domain: &str,
        scope: &str,
    ) -> OntoResult<Written<Conversation>> {
        let mut batch = WriteBatch::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id,
            title: None,
            domain: domain.trim().to_string(),
            scope: scope.trim().to_string(),
            is_active: true,
            created_at: batch.at,
            updated_at: None,
        };
        batch.conversations.push(conversation.clone());
        self.backend.apply(batch).await?;

        info!(conversation_id = %conversation.id, "Created conversation");
        let scope = Scope::conversation(conversation.id);
        Ok(Written::new(conversation, scope))
    }

    pub async fn update_conversation(
        &self,
        id: Uuid,
        update: ConversationUpdate,
    ) -> OntoResult<Written<Conversation>> {
        let ConversationUpdate {
            title,
            domain,
            scope,
            is_active,
        } = update;
        self.backend
            .apply(WriteBatch::now().with_update(Update::Conversation {
                id,
                title,
                domain,
                scope,
                is_active,
            }))
            .await?;

        let conversation = self.conversation(id).await?;
        Ok(Written::new(conversation, Scope::conversation(id)))
    }

    /// Tombstone the conversation, deactivate it, and cascade to its classes and notes.
    pub async fn delete_conversation(&self, id: Uuid) -> OntoResult<Scope> {
        self.backend
            .apply(WriteBatch::now().with_tombstone(Tombstone::Conversation(id)))
            .await?;
        info!(conversation_id = %id, "Deleted conversation");
        Ok(Scope::conversation(id))
    }

    pub async fn conversation(&self, id: Uuid) -> OntoResult<Conversation> {
        found(
            self.backend.conversation(id).await?,
            EntityKind::Conversation,
            id,
        )
    }

    pub async fn conversations_for_user(&self, user_id: Uuid) -> OntoResult<Vec<Conversation>> {
        self.backend.conversations_for_user(user_id).await
    }

    // ========================================================================
    // Classes
    // ========================================================================

    /// Live class ids of a conversation keyed by normalized name. When two live
    /// classes collide the first one created wins.
    pub async fn class_ids_by_name(&self, conversation_id: Uuid) -> OntoResult<HashMap<String, Uuid>> {
        let mut by_name = HashMap::new();
        for class in self.backend.classes(conversation_id).await? {
            by_name.entry(normalize_name(&class.name)).or_insert(class.id);
        }
        Ok(by_name)
    }

    async fn ensure_unique_class_name(
        &self,
        conversation_id: Uuid,
        name: &str,
        except: Option<Uuid>,
    ) -> OntoResult<()> {
        let key = normalize_name(name);
        let taken = self
            .backend
            .classes(conversation_id)
            .await?
            .into_iter()
            .any(|c| Some(c.id) != except && normalize_name(&c.name) == key);
        if taken {
            return Err(OntoError::Conflict(format!(
                "class '{name}' already exists in conversation {conversation_id}"
            )));
        }
        Ok(())
    }

    pub async fn create_class(
        &self,
        conversation_id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> OntoResult<Written<OntologyClass>> {
        let name = require_name("class", name)?;
        self.conversation(conversation_id).await?;
        self.ensure_unique_class_name(conversation_id, &name, None)
            .await?;

        let mut batch = WriteBatch::now();
        let class = OntologyClass {
            id: Uuid::new_v4(),
            conversation_id,
            name,
            description: description.map(str::to_string),
            created_at: batch.at,
            updated_at: None,
        };
        batch.classes.push(class.clone());
        self.backend.apply(batch).await?;

        info!(class_id = %class.id, %conversation_id, "Created class '{}'", class.name);
        let scope = Scope::class(conversation_id, class.id);
        Ok(Written::new(class, scope))
    }

    pub async fn update_class(
        &self,
        id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> OntoResult<Written<OntologyClass>> {
        let name = require_name("class", name)?;
        let (current, scope) = self.class_scope(id).await?;
        self.ensure_unique_class_name(current.conversation_id, &name, Some(id))
            .await?;

        self.backend
            .apply(WriteBatch::now().with_update(Update::Class {
                id,
                name,
                description: description.map(str::to_string),
            }))
            .await?;

        Ok(Written::new(self.class(id).await?, scope))
    }

    /// Tombstone the class and everything it owns.
    pub async fn delete_class(&self, id: Uuid) -> OntoResult<Scope> {
        let (_, scope) = self.class_scope(id).await?;
        self.backend
            .apply(WriteBatch::now().with_tombstone(Tombstone::Class(id)))
            .await?;
        info!(class_id = %id, "Deleted class with cascade");
        Ok(scope)
    }

    pub async fn class(&self, id: Uuid) -> OntoResult<OntologyClass> {
        found(self.backend.class(id).await?, EntityKind::Class, id)
    }

    pub async fn classes(&self, conversation_id: Uuid) -> OntoResult<Vec<OntologyClass>> {
        self.conversation(conversation_id).await?;
        self.backend.classes(conversation_id).await
    }

    /// Every live class of the conversation with its data properties and
    /// object properties (domains → ranges nested).
    pub async fn class_graph(&self, conversation_id: Uuid) -> OntoResult<Vec<ClassWithProperties>> {
        let classes = self.classes(conversation_id).await?;
        let class_ids: Vec<Uuid> = classes.iter().map(|c| c.id).collect();

        let data_properties = self.backend.linked_data_properties(&class_ids).await?;
        let linked = self.backend.linked_object_properties(&class_ids).await?;
        let object_properties = self.expand_object_properties(linked).await?;

        Ok(assemble::class_graph(classes, data_properties, object_properties))
    }

    async fn expand_object_properties(
        &self,
        linked: Vec<(Uuid, ObjectProperty)>,
    ) -> OntoResult<Vec<(Uuid, ObjectPropertyView)>> {
        let op_ids: Vec<Uuid> = linked.iter().map(|(_, op)| op.id).collect();
        let domains = self.backend.domains(&op_ids).await?;
        let ranges = self.backend.ranges(&op_ids).await?;
        let pairs = self.backend.pairs(&op_ids).await?;

        let (class_ids, properties): (Vec<Uuid>, Vec<ObjectProperty>) = linked.into_iter().unzip();
        let views = assemble::object_property_views(properties, &domains, &ranges, &pairs);
        Ok(class_ids.into_iter().zip(views).collect())
    }

    // ========================================================================
    // Data properties
    // ========================================================================

    pub async fn create_data_property(
        &self,
        class_id: Uuid,
        name: &str,
        data_type: &str,
    ) -> OntoResult<Written<DataProperty>> {
        let name = require_name("data property", name)?;
        let data_type = require_name("data type", data_type)?;
        let (_, class_scope) = self.class_scope(class_id).await?;

        let mut batch = WriteBatch::now();
        let dp = DataProperty {
            id: Uuid::new_v4(),
            class_id,
            name,
            data_type,
            created_at: batch.at,
            updated_at: None,
        };
        batch.data_properties.push(dp.clone());
        batch.class_data_links.push(ClassLink::new(class_id, dp.id));
        self.backend.apply(batch).await?;

        info!(data_property_id = %dp.id, %class_id, "Created data property '{}'", dp.name);
        let scope = Scope::DataProperty {
            conversation_id: class_scope.conversation_id(),
            class_id,
            data_property_id: dp.id,
        };
        Ok(Written::new(dp, scope))
    }

    pub async fn update_data_property(
        &self,
        id: Uuid,
        name: &str,
        data_type: &str,
    ) -> OntoResult<Written<DataProperty>> {
        let name = require_name("data property", name)?;
        let data_type = require_name("data type", data_type)?;
        let scope = self.data_property_scope(id).await?;

        self.backend
            .apply(WriteBatch::now().with_update(Update::DataProperty {
                id,
                name,
                data_type,
            }))
            .await?;

        Ok(Written::new(self.data_property(id).await?, scope))
    }

    pub async fn delete_data_property(&self, id: Uuid) -> OntoResult<Scope> {
        let scope = self.data_property_scope(id).await?;
        self.backend
            .apply(WriteBatch::now().with_tombstone(Tombstone::DataProperty(id)))
            .await?;
        info!(data_property_id = %id, "Deleted data property");
        Ok(scope)
    }

    async fn data_property_scope(&self, id: Uuid) -> OntoResult<Scope> {
        let dp = self.data_property(id).await?;
        let (class, _) = self.class_scope(dp.class_id).await?;
        Ok(Scope::DataProperty {
            conversation_id: class.conversation_id,
            class_id: class.id,
            data_property_id: id,
        })
    }

    pub async fn data_property(&self, id: Uuid) -> OntoResult<DataProperty> {
        found(
            self.backend.data_property(id).await?,
            EntityKind::DataProperty,
            id,
        )
    }

    pub async fn data_properties(&self, class_id: Uuid) -> OntoResult<Vec<DataProperty>> {
        self.class(class_id).await?;
        Ok(self
            .backend
            .linked_data_properties(&[class_id])
            .await?
            .into_iter()
            .map(|(_, dp)| dp)
            .collect())
    }

    // ========================================================================
    // Object properties
    // ========================================================================

    pub async fn create_object_property(
        &self,
        class_id: Uuid,
        name: &str,
    ) -> OntoResult<Written<ObjectProperty>> {
        let name = require_name("object property", name)?;
        let (_, class_scope) = self.class_scope(class_id).await?;

        let mut batch = WriteBatch::now();
        let op = ObjectProperty {
            id: Uuid::new_v4(),
            class_id,
            name,
            created_at: batch.at,
            updated_at: None,
        };
        batch.object_properties.push(op.clone());
        batch.class_object_links.push(ClassLink::new(class_id, op.id));
        self.backend.apply(batch).await?;

        info!(object_property_id = %op.id, %class_id, "Created object property '{}'", op.name);
        let scope = Scope::ObjectProperty {
            conversation_id: class_scope.conversation_id(),
            class_id,
            object_property_id: op.id,
        };
        Ok(Written::new(op, scope))
    }

    pub async fn update_object_property(
        &self,
        id: Uuid,
        name: &str,
    ) -> OntoResult<Written<ObjectProperty>> {
        let name = require_name("object property", name)?;
        let scope = self.object_property_scope(id).await?;

        self.backend
            .apply(WriteBatch::now().with_update(Update::ObjectProperty { id, name }))
            .await?;

        Ok(Written::new(self.object_property(id).await?, scope))
    }

    /// Tombstone the property with its domains, ranges and pairs.
    pub async fn delete_object_property(&self, id: Uuid) -> OntoResult<Scope> {
        let scope = self.object_property_scope(id).await?;
        self.backend
            .apply(WriteBatch::now().with_tombstone(Tombstone::ObjectProperty(id)))
            .await?;
        info!(object_property_id = %id, "Deleted object property with cascade");
        Ok(scope)
    }

    pub async fn object_property(&self, id: Uuid) -> OntoResult<ObjectProperty> {
        found(
            self.backend.object_property(id).await?,
            EntityKind::ObjectProperty,
            id,
        )
    }

    pub async fn object_properties(&self, class_id: Uuid) -> OntoResult<Vec<ObjectPropertyView>> {
        self.class(class_id).await?;
        let linked = self.backend.linked_object_properties(&[class_id]).await?;
        Ok(self
            .expand_object_properties(linked)
            .await?
            .into_iter()
            .map(|(_, view)| view)
            .collect())
    }

    // ========================================================================
    // Instances
    // ========================================================================

    pub async fn create_instance(&self, class_id: Uuid, name: &str) -> OntoResult<Written<Instance>> {
        let name = require_name("instance", name)?;
        let (_, class_scope) = self.class_scope(class_id).await?;

        let mut batch = WriteBatch::now();
        let instance = Instance {
            id: Uuid::new_v4(),
            class_id,
            name,
            created_at: batch.at,
            updated_at: None,
        };
        batch.instances.push(instance.clone());
        batch
            .class_instance_links
            .push(ClassLink::new(class_id, instance.id));
        self.backend.apply(batch).await?;

        info!(instance_id = %instance.id, %class_id, "Created instance '{}'", instance.name);
        let scope = Scope::Instance {
            conversation_id: class_scope.conversation_id(),
            class_id,
            instance_id: instance.id,
        };
        Ok(Written::new(instance, scope))
    }

    pub async fn update_instance(&self, id: Uuid, name: &str) -> OntoResult<Written<Instance>> {
        let name = require_name("instance", name)?;
        let scope = self.instance_scope(id).await?;

        self.backend
            .apply(WriteBatch::now().with_update(Update::Instance { id, name }))
            .await?;

        Ok(Written::new(self.instance(id).await?, scope))
    }

    pub async fn delete_instance(&self, id: Uuid) -> OntoResult<Scope> {
        let scope = self.instance_scope(id).await?;
        self.backend
            .apply(WriteBatch::now().with_tombstone(Tombstone::Instance(id)))
            .await?;
        info!(instance_id = %id, "Deleted instance");
        Ok(scope)
    }

    async fn instance_scope(&self, id: Uuid) -> OntoResult<Scope> {
        let instance = self.instance(id).await?;
        let (class, _) = self.class_scope(instance.class_id).await?;
        Ok(Scope::Instance {
            conversation_id: class.conversation_id,
            class_id: class.id,
            instance_id: id,
        })
    }

    pub async fn instance(&self, id: Uuid) -> OntoResult<Instance> {
        found(self.backend.instance(id).await?, EntityKind::Instance, id)
    }

    pub async fn instances(&self, class_id: Uuid) -> OntoResult<Vec<Instance>> {
        self.class(class_id).await?;
        Ok(self
            .backend
            .linked_instances(&[class_id])
            .await?
            .into_iter()
            .map(|(_, i)| i)
            .collect())
    }

    /// Instances of every live class of the conversation, grouped by class.
    pub async fn conversation_instances(
        &self,
        conversation_id: Uuid,
    ) -> OntoResult<Vec<ClassInstances>> {
        let classes = self.classes(conversation_id).await?;
        let class_ids: Vec<Uuid> = classes.iter().map(|c| c.id).collect();
        let instances = self.backend.linked_instances(&class_ids).await?;
        Ok(assemble::class_instances(classes, instances))
    }

    // ========================================================================
    // Domains, ranges and pairs
    // ========================================================================

    /// Add one (domain, range) combination to an object property. A live
    /// domain with the same name is reused; the range row is always new.
    pub async fn create_domain_range_pair(
        &self,
        object_property_id: Uuid,
        domain: &str,
        range: &str,
    ) -> OntoResult<Written<DomainRangePair>> {
        let domain_name = require_name("domain", domain)?;
        let range_name = require_name("range", range)?;
        let scope = self.object_property_scope(object_property_id).await?;

        let mut batch = WriteBatch::now();
        let existing = self
            .backend
            .domains(&[object_property_id])
            .await?
            .into_iter()
            .find(|d| d.name == domain_name);
        let domain_id = match existing {
            Some(d) => d.id,
            None => {
                let d = Domain {
                    id: Uuid::new_v4(),
                    object_property_id,
                    name: domain_name,
                    created_at: batch.at,
                    updated_at: None,
                };
                let id = d.id;
                batch.domains.push(d);
                id
            }
        };
        let range = Range {
            id: Uuid::new_v4(),
            object_property_id,
            name: range_name,
            created_at: batch.at,
            updated_at: None,
        };
        let pair = DomainRangePair {
            id: Uuid::new_v4(),
            object_property_id,
            domain_id,
            range_id: range.id,
            created_at: batch.at,
        };
        batch.ranges.push(range);
        batch.pairs.push(pair.clone());
        self.backend.apply(batch).await?;

        info!(pair_id = %pair.id, %object_property_id, "Created domain-range pair");
        Ok(Written::new(pair, scope))
    }

    pub async fn update_domain(&self, id: Uuid, name: &str) -> OntoResult<Written<Domain>> {
        let name = require_name("domain", name)?;
        let domain = self.domain(id).await?;
        let scope = self.object_property_scope(domain.object_property_id).await?;

        self.backend
            .apply(WriteBatch::now().with_update(Update::Domain { id, name }))
            .await?;

        Ok(Written::new(self.domain(id).await?, scope))
    }

    pub async fn update_range(&self, id: Uuid, name: &str) -> OntoResult<Written<Range>> {
        let name = require_name("range", name)?;
        let range = self.range(id).await?;
        let scope = self.object_property_scope(range.object_property_id).await?;

        self.backend
            .apply(WriteBatch::now().with_update(Update::Range { id, name }))
            .await?;

        Ok(Written::new(self.range(id).await?, scope))
    }

    /// Tombstone one pair and its range; the domain goes once no live pair uses it.
    pub async fn delete_domain_range_pair(&self, pair_id: Uuid) -> OntoResult<Scope> {
        let pair = found(
            self.backend.pair(pair_id).await?,
            EntityKind::DomainRangePair,
            pair_id,
        )?;
        let scope = self.object_property_scope(pair.object_property_id).await?;

        self.backend
            .apply(WriteBatch::now().with_tombstone(Tombstone::DomainRangePair(pair_id)))
            .await?;
        info!(%pair_id, "Deleted domain-range pair");
        Ok(scope)
    }

    pub async fn domain(&self, id: Uuid) -> OntoResult<Domain> {
        found(self.backend.domain(id).await?, EntityKind::Domain, id)
    }

    pub async fn range(&self, id: Uuid) -> OntoResult<Range> {
        found(self.backend.range(id).await?, EntityKind::Range, id)
    }

    /// Live domains of the property; empty when the property is absent or tombstoned.
    pub async fn domains(&self, object_property_id: Uuid) -> OntoResult<Vec<Domain>> {
        self.backend.domains(&[object_property_id]).await
    }

    /// Live ranges of the property; empty when the property is absent or tombstoned.
    pub async fn ranges(&self, object_property_id: Uuid) -> OntoResult<Vec<Range>> {
        self.backend.ranges(&[object_property_id]).await
    }

    // ========================================================================
    // Important terms & competency questions
    // ========================================================================

    pub async fn save_important_terms(
        &self,
        conversation_id: Uuid,
        terms: Vec<String>,
    ) -> OntoResult<Written<ImportantTerms>> {
        self.conversation(conversation_id).await?;

        let mut batch = WriteBatch::now();
        match self.backend.important_terms(conversation_id).await? {
            Some(existing) => batch.updates.push(Update::ImportantTerms {
                id: existing.id,
                terms,
            }),
            None => batch.important_terms.push(ImportantTerms {
                id: Uuid::new_v4(),
                conversation_id,
                terms,
                created_at: batch.at,
                updated_at: None,
            }),
        }
        self.backend.apply(batch).await?;

        let saved = self.important_terms(conversation_id).await?;
        let saved = found(saved, EntityKind::ImportantTerms, conversation_id)?;
        Ok(Written::new(saved, Scope::conversation(conversation_id)))
    }

    pub async fn important_terms(&self, conversation_id: Uuid) -> OntoResult<Option<ImportantTerms>> {
        self.conversation(conversation_id).await?;
        self.backend.important_terms(conversation_id).await
    }

    pub async fn save_competency_questions(
        &self,
        conversation_id: Uuid,
        questions: Vec<String>,
    ) -> OntoResult<Written<CompetencyQuestions>> {
        self.conversation(conversation_id).await?;

        let mut batch = WriteBatch::now();
        match self.backend.competency_questions(conversation_id).await? {
            Some(existing) => batch.updates.push(Update::CompetencyQuestions {
                id: existing.id,
                questions,
            }),
            None => batch.competency_questions.push(CompetencyQuestions {
                id: Uuid::new_v4(),
                conversation_id,
                questions,
                is_valid: false,
                created_at: batch.at,
                updated_at: None,
                validated_at: None,
            }),
        }
        self.backend.apply(batch).await?;

        let saved = self.competency_questions(conversation_id).await?;
        let saved = found(saved, EntityKind::CompetencyQuestions, conversation_id)?;
        Ok(Written::new(saved, Scope::conversation(conversation_id)))
    }

    pub async fn validate_competency_questions(
        &self,
        id: Uuid,
        is_valid: bool,
    ) -> OntoResult<Written<CompetencyQuestions>> {
        let current = found(
            self.backend.competency_questions_by_id(id).await?,
            EntityKind::CompetencyQuestions,
            id,
        )?;

        self.backend
            .apply(
                WriteBatch::now()
                    .with_update(Update::ValidateCompetencyQuestions { id, is_valid }),
            )
            .await?;

        let validated = found(
            self.backend.competency_questions_by_id(id).await?,
            EntityKind::CompetencyQuestions,
            id,
        )?;
        Ok(Written::new(
            validated,
            Scope::conversation(current.conversation_id),
        ))
    }

    pub async fn competency_questions(
        &self,
        conversation_id: Uuid,
    ) -> OntoResult<Option<CompetencyQuestions>> {
        self.conversation(conversation_id).await?;
        self.backend.competency_questions(conversation_id).await
    }
}
