//! Ontology Exporter: conversation graph → portable ontology document
//!
//! Reads go through the [`CachedGraph`] like any other consumer. The document
//! is a plain serde value (JSON export) and renders to OWL 2 Turtle.

pub mod sanitize;
pub mod turtle;

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::CachedGraph;
use crate::config::ExportConfig;
use crate::error::OntoResult;
use crate::models::{ClassInstances, ClassWithProperties};

pub use sanitize::sanitize_name;

/// XSD datatypes a data property can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XsdType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
}

impl XsdType {
    /// Recognized data type tags, case-insensitive.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "string" | "str" | "text" => Some(XsdType::String),
            "integer" | "int" | "long" => Some(XsdType::Integer),
            "float" | "double" | "decimal" | "number" => Some(XsdType::Float),
            "boolean" | "bool" => Some(XsdType::Boolean),
            "date" | "datetime" => Some(XsdType::Date),
            _ => None,
        }
    }

    pub fn curie(&self) -> &'static str {
        match self {
            XsdType::String => "xsd:string",
            XsdType::Integer => "xsd:integer",
            XsdType::Float => "xsd:float",
            XsdType::Boolean => "xsd:boolean",
            XsdType::Date => "xsd:date",
        }
    }
}

/// Map a free-form type tag; unknown tags fall back to string.
pub fn map_data_type(tag: &str) -> XsdType {
    XsdType::from_tag(tag).unwrap_or_else(|| {
        warn!(data_type = tag, "Unknown data type, exporting as xsd:string");
        XsdType::String
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedClass {
    pub name: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedDataProperty {
    pub name: String,
    pub label: String,
    pub domain: String,
    pub range: XsdType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedObjectProperty {
    pub name: String,
    pub label: String,
    pub domains: Vec<String>,
    pub ranges: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedIndividual {
    pub name: String,
    pub label: String,
    pub class: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OntologyDocument {
    pub conversation_id: Uuid,
    pub base_iri: String,
    pub classes: Vec<ExportedClass>,
    pub data_properties: Vec<ExportedDataProperty>,
    pub object_properties: Vec<ExportedObjectProperty>,
    pub individuals: Vec<ExportedIndividual>,
}

impl OntologyDocument {
    pub fn to_turtle(&self) -> String {
        turtle::render(self)
    }
}

/// Assemble the document from the class graph and the grouped instances.
///
/// Class declarations keep graph order; sanitized-name collisions are declared
/// once (first label wins). Domain and range names that are not classes are
/// declared afterwards in sorted order.
pub fn build_document(
    conversation_id: Uuid,
    base_iri: &str,
    classes: &[ClassWithProperties],
    instances: &[ClassInstances],
) -> OntologyDocument {
    let mut declared = HashSet::new();
    let mut exported_classes = Vec::new();
    for class in classes {
        let name = sanitize_name(&class.name);
        if declared.insert(name.clone()) {
            exported_classes.push(ExportedClass {
                name,
                label: class.name.clone(),
            });
        }
    }

    let mut data_properties = Vec::new();
    let mut object_properties = Vec::new();
    let mut slot_types: BTreeSet<(String, String)> = BTreeSet::new();

    for class in classes {
        let owner = sanitize_name(&class.name);

        for dp in &class.data_properties {
            data_properties.push(ExportedDataProperty {
                name: sanitize_name(&dp.name),
                label: dp.name.clone(),
                domain: owner.clone(),
                range: map_data_type(&dp.data_type),
            });
        }

        for op in &class.object_properties {
            let mut domains = BTreeSet::new();
            let mut ranges = BTreeSet::new();
            for domain in &op.domains {
                let name = sanitize_name(&domain.name);
                slot_types.insert((name.clone(), domain.name.clone()));
                domains.insert(name);
                for range in &domain.ranges {
                    let name = sanitize_name(&range.name);
                    slot_types.insert((name.clone(), range.name.clone()));
                    ranges.insert(name);
                }
            }
            if domains.is_empty() {
                domains.insert(owner.clone());
            }

            object_properties.push(ExportedObjectProperty {
                name: sanitize_name(&op.name),
                label: op.name.clone(),
                domains: domains.into_iter().collect(),
                ranges: ranges.into_iter().collect(),
            });
        }
    }

    for (name, label) in slot_types {
        if declared.insert(name.clone()) {
            exported_classes.push(ExportedClass { name, label });
        }
    }

    let individuals = instances
        .iter()
        .flat_map(|group| {
            let class = sanitize_name(&group.class_name);
            group.instances.iter().map(move |i| ExportedIndividual {
                name: sanitize_name(&i.name),
                label: i.name.clone(),
                class: class.clone(),
            })
        })
        .collect();

    OntologyDocument {
        conversation_id,
        base_iri: base_iri.to_string(),
        classes: exported_classes,
        data_properties,
        object_properties,
        individuals,
    }
}

#[derive(Clone)]
pub struct Exporter {
    graph: CachedGraph,
    base_iri: String,
}

impl Exporter {
    pub fn new(graph: CachedGraph, base_iri: impl Into<String>) -> Self {
        Self {
            graph,
            base_iri: base_iri.into(),
        }
    }

    pub fn from_config(graph: CachedGraph, config: &ExportConfig) -> Self {
        Self::new(graph, config.base_iri.clone())
    }

    /// Read-only walk of the conversation's classes, properties and instances.
    pub async fn export(&self, conversation_id: Uuid) -> OntoResult<OntologyDocument> {
        let classes = self.graph.classes(conversation_id).await?;
        let instances = self.graph.conversation_instances(conversation_id).await?;

        let document = build_document(conversation_id, &self.base_iri, &classes, &instances);
        info!(
            %conversation_id,
            classes = document.classes.len(),
            individuals = document.individuals.len(),
            "Exported ontology"
        );
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataProperty, DomainView, Instance, ObjectPropertyView, RangeView};
    use chrono::Utc;

    fn vehicle_graph() -> (Vec<ClassWithProperties>, Vec<ClassInstances>) {
        let class_id = Uuid::new_v4();
        let class = ClassWithProperties {
            id: class_id,
            conversation_id: Uuid::new_v4(),
            name: "Vehicle".into(),
            description: None,
            created_at: Utc::now(),
            data_properties: vec![DataProperty {
                id: Uuid::new_v4(),
                class_id,
                name: "max speed".into(),
                data_type: "int".into(),
                created_at: Utc::now(),
                updated_at: None,
            }],
            object_properties: vec![ObjectPropertyView {
                id: Uuid::new_v4(),
                class_id,
                name: "drives on".into(),
                created_at: Utc::now(),
                domains: vec![DomainView {
                    id: Uuid::new_v4(),
                    name: "Vehicle".into(),
                    ranges: vec![RangeView {
                        id: Uuid::new_v4(),
                        name: "Road Surface".into(),
                        pair_id: Uuid::new_v4(),
                    }],
                }],
            }],
        };
        let instances = vec![ClassInstances {
            class_id,
            class_name: "Vehicle".into(),
            instances: vec![Instance {
                id: Uuid::new_v4(),
                class_id,
                name: "Car 1".into(),
                created_at: Utc::now(),
                updated_at: None,
            }],
        }];
        (vec![class], instances)
    }

    // ========================================================================
    // TEST 1: type tags and their aliases
    // ========================================================================
    #[test]
    fn test_data_type_mapping() {
        assert_eq!(map_data_type("int"), XsdType::Integer);
        assert_eq!(map_data_type("Double"), XsdType::Float);
        assert_eq!(map_data_type("bool"), XsdType::Boolean);
        assert_eq!(map_data_type("datetime"), XsdType::Date);
        assert_eq!(map_data_type("geo-point"), XsdType::String);
    }

    // ========================================================================
    // TEST 2: range names become declared types, domains already declared stay single
    // ========================================================================
    #[test]
    fn test_slot_names_are_declared_once() {
        let (classes, instances) = vehicle_graph();
        let doc = build_document(Uuid::new_v4(), "http://example.org/onto", &classes, &instances);

        let names: Vec<&str> = doc.classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Vehicle", "Road_Surface"]);
        assert_eq!(doc.object_properties[0].name, "drives_on");
        assert_eq!(doc.object_properties[0].domains, vec!["Vehicle"]);
        assert_eq!(doc.object_properties[0].ranges, vec!["Road_Surface"]);
    }

    // ========================================================================
    // TEST 3: data properties and individuals are typed by their class
    // ========================================================================
    #[test]
    fn test_properties_and_individuals() {
        let (classes, instances) = vehicle_graph();
        let doc = build_document(Uuid::new_v4(), "http://example.org/onto", &classes, &instances);

        assert_eq!(doc.data_properties[0].name, "max_speed");
        assert_eq!(doc.data_properties[0].domain, "Vehicle");
        assert_eq!(doc.data_properties[0].range, XsdType::Integer);
        assert_eq!(doc.individuals[0].name, "Car_1");
        assert_eq!(doc.individuals[0].label, "Car 1");
        assert_eq!(doc.individuals[0].class, "Vehicle");
    }

    // ========================================================================
    // TEST 4: same input, same output
    // ========================================================================
    #[test]
    fn test_export_is_deterministic() {
        let (classes, instances) = vehicle_graph();
        let id = Uuid::new_v4();
        let a = build_document(id, "http://example.org/onto", &classes, &instances);
        let b = build_document(id, "http://example.org/onto", &classes, &instances);
        assert_eq!(a.to_turtle(), b.to_turtle());
    }
}
