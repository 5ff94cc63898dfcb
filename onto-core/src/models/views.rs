//! Aggregate response shapes assembled in-process from flat rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DataProperty, Instance};

/// A class with every property it is linked to, as served by the
/// conversation-level read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassWithProperties {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub data_properties: Vec<DataProperty>,
    pub object_properties: Vec<ObjectPropertyView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectPropertyView {
    pub id: Uuid,
    pub class_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub domains: Vec<DomainView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainView {
    pub id: Uuid,
    pub name: String,
    pub ranges: Vec<RangeView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeView {
    pub id: Uuid,
    pub name: String,
    pub pair_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInstances {
    pub class_id: Uuid,
    pub class_name: String,
    pub instances: Vec<Instance>,
}
