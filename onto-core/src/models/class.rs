use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OntologyClass {
    #[sqlx(rename = "class_id")]
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Junction row tying a class to one of its members (instance, data
/// property or object property).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLink {
    pub class_id: Uuid,
    pub member_id: Uuid,
}

impl ClassLink {
    pub fn new(class_id: Uuid, member_id: Uuid) -> Self {
        Self {
            class_id,
            member_id,
        }
    }
}
