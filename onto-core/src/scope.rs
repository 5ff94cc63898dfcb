//! Ownership scopes of the ontology graph.
//!
//! Every mutation resolves to the scope it touched; the cache layer derives the
//! keys to invalidate from the scope and its ancestors.

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Scope {
    Conversation {
        conversation_id: Uuid,
    },
    Class {
        conversation_id: Uuid,
        class_id: Uuid,
    },
    /// Also the scope of the property's domains, ranges and pairs.
    ObjectProperty {
        conversation_id: Uuid,
        class_id: Uuid,
        object_property_id: Uuid,
    },
    DataProperty {
        conversation_id: Uuid,
        class_id: Uuid,
        data_property_id: Uuid,
    },
    Instance {
        conversation_id: Uuid,
        class_id: Uuid,
        instance_id: Uuid,
    },
}

impl Scope {
    pub fn conversation(conversation_id: Uuid) -> Self {
        Scope::Conversation { conversation_id }
    }

    pub fn class(conversation_id: Uuid, class_id: Uuid) -> Self {
        Scope::Class {
            conversation_id,
            class_id,
        }
    }

    pub fn conversation_id(&self) -> Uuid {
        match *self {
            Scope::Conversation { conversation_id }
            | Scope::Class {
                conversation_id, ..
            }
            | Scope::ObjectProperty {
                conversation_id, ..
            }
            | Scope::DataProperty {
                conversation_id, ..
            }
            | Scope::Instance {
                conversation_id, ..
            } => conversation_id,
        }
    }

    /// The owning scope, `None` at the conversation.
    pub fn parent(&self) -> Option<Scope> {
        match *self {
            Scope::Conversation { .. } => None,
            Scope::Class {
                conversation_id, ..
            } => Some(Scope::conversation(conversation_id)),
            Scope::ObjectProperty {
                conversation_id,
                class_id,
                ..
            }
            | Scope::DataProperty {
                conversation_id,
                class_id,
                ..
            }
            | Scope::Instance {
                conversation_id,
                class_id,
                ..
            } => Some(Scope::class(conversation_id, class_id)),
        }
    }

    /// This scope followed by each ancestor up to the conversation.
    pub fn chain(self) -> impl Iterator<Item = Scope> {
        std::iter::successors(Some(self), Scope::parent)
    }
}
