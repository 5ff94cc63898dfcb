use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DataProperty {
    #[sqlx(rename = "data_property_id")]
    pub id: Uuid,
    pub class_id: Uuid,
    pub name: String,
    pub data_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ObjectProperty {
    #[sqlx(rename = "object_property_id")]
    pub id: Uuid,
    pub class_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Domain {
    #[sqlx(rename = "domain_id")]
    pub id: Uuid,
    pub object_property_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Range {
    #[sqlx(rename = "range_id")]
    pub id: Uuid,
    pub object_property_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// One row of the domain–range junction. Carries its own id so a single
/// (domain, range) combination of an object property can be addressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DomainRangePair {
    #[sqlx(rename = "pair_id")]
    pub id: Uuid,
    pub object_property_id: Uuid,
    pub domain_id: Uuid,
    pub range_id: Uuid,
    pub created_at: DateTime<Utc>,
}
