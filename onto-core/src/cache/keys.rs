//! Cache key naming and invalidation fan-out.
//!
//! | scope              | keys |
//! |--------------------|------|
//! | conversation `c`   | `conversation_{c}`, `conversation_graph_{c}`, `conversation_instances_{c}`, `important_terms_{c}`, `competency_questions_{c}` |
//! | class `x`          | `class_data_properties_{x}`, `class_object_properties_{x}`, `class_instances_{x}` |
//! | object property `p`| `object_property_domains_{p}`, `object_property_ranges_{p}` |
//!
//! `conversations_by_user_{u}` sits outside the scope tree; conversation
//! writes drop it for the row's user.
//!
//! Data properties and instances have no keys of their own; their mutations
//! reach the owning class and conversation through the scope chain.

use std::fmt;

use uuid::Uuid;

use crate::scope::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    UserConversations(Uuid),
    Conversation(Uuid),
    ConversationGraph(Uuid),
    ConversationInstances(Uuid),
    ImportantTerms(Uuid),
    CompetencyQuestions(Uuid),
    ClassDataProperties(Uuid),
    ClassObjectProperties(Uuid),
    ClassInstances(Uuid),
    ObjectPropertyDomains(Uuid),
    ObjectPropertyRanges(Uuid),
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::UserConversations(id) => write!(f, "conversations_by_user_{id}"),
            CacheKey::Conversation(id) => write!(f, "conversation_{id}"),
            CacheKey::ConversationGraph(id) => write!(f, "conversation_graph_{id}"),
            CacheKey::ConversationInstances(id) => write!(f, "conversation_instances_{id}"),
            CacheKey::ImportantTerms(id) => write!(f, "important_terms_{id}"),
            CacheKey::CompetencyQuestions(id) => write!(f, "competency_questions_{id}"),
            CacheKey::ClassDataProperties(id) => write!(f, "class_data_properties_{id}"),
            CacheKey::ClassObjectProperties(id) => write!(f, "class_object_properties_{id}"),
            CacheKey::ClassInstances(id) => write!(f, "class_instances_{id}"),
            CacheKey::ObjectPropertyDomains(id) => write!(f, "object_property_domains_{id}"),
            CacheKey::ObjectPropertyRanges(id) => write!(f, "object_property_ranges_{id}"),
        }
    }
}

/// Keys owned by this scope alone.
pub fn scope_keys(scope: &Scope) -> Vec<CacheKey> {
    match *scope {
        Scope::Conversation { conversation_id: c } => vec![
            CacheKey::Conversation(c),
            CacheKey::ConversationGraph(c),
            CacheKey::ConversationInstances(c),
            CacheKey::ImportantTerms(c),
            CacheKey::CompetencyQuestions(c),
        ],
        Scope::Class { class_id: x, .. } => vec![
            CacheKey::ClassDataProperties(x),
            CacheKey::ClassObjectProperties(x),
            CacheKey::ClassInstances(x),
        ],
        Scope::ObjectProperty {
            object_property_id: p,
            ..
        } => vec![
            CacheKey::ObjectPropertyDomains(p),
            CacheKey::ObjectPropertyRanges(p),
        ],
        Scope::DataProperty { .. } | Scope::Instance { .. } => Vec::new(),
    }
}

/// Keys of the scope and of every ancestor up to the conversation.
pub fn invalidation_keys(scope: Scope) -> Vec<CacheKey> {
    scope.chain().flat_map(|s| scope_keys(&s)).collect()
}
