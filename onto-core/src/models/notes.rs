//! Per-conversation working notes kept next to the graph: the extracted
//! important terms and the competency questions the ontology must answer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImportantTerms {
    #[sqlx(rename = "important_terms_id")]
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub terms: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CompetencyQuestions {
    #[sqlx(rename = "cq_id")]
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub questions: Vec<String>,
    pub is_valid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub validated_at: Option<DateTime<Utc>>,
}
