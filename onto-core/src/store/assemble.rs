//! In-process graph assembly
//!
//! Backends return flat, live rows; this module nests them into the aggregate
//! response shapes. Input order is preserved (backends return insertion order).

use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{
    ClassInstances, ClassWithProperties, DataProperty, Domain, DomainRangePair, DomainView,
    Instance, ObjectProperty, ObjectPropertyView, OntologyClass, Range, RangeView,
};

/// Nest domains → ranges under each object property.
///
/// A range shows up under a domain once per live pair joining them. Pairs whose
/// domain or range is not in the given live rows are ignored.
pub fn object_property_views(
    properties: Vec<ObjectProperty>,
    domains: &[Domain],
    ranges: &[Range],
    pairs: &[DomainRangePair],
) -> Vec<ObjectPropertyView> {
    let ranges_by_id: HashMap<Uuid, &Range> = ranges.iter().map(|r| (r.id, r)).collect();

    let mut pairs_by_domain: HashMap<Uuid, Vec<&DomainRangePair>> = HashMap::new();
    for pair in pairs {
        pairs_by_domain.entry(pair.domain_id).or_default().push(pair);
    }

    let mut domains_by_property: HashMap<Uuid, Vec<DomainView>> = HashMap::new();
    for domain in domains {
        let ranges = pairs_by_domain
            .get(&domain.id)
            .map(|pairs| {
                pairs
                    .iter()
                    .filter(|p| p.object_property_id == domain.object_property_id)
                    .filter_map(|p| {
                        ranges_by_id.get(&p.range_id).map(|r| RangeView {
                            id: r.id,
                            name: r.name.clone(),
                            pair_id: p.id,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        domains_by_property
            .entry(domain.object_property_id)
            .or_default()
            .push(DomainView {
                id: domain.id,
                name: domain.name.clone(),
                ranges,
            });
    }

    properties
        .into_iter()
        .map(|op| ObjectPropertyView {
            domains: domains_by_property.remove(&op.id).unwrap_or_default(),
            id: op.id,
            class_id: op.class_id,
            name: op.name,
            created_at: op.created_at,
        })
        .collect()
}

/// Attach linked data properties and object property views to their classes.
pub fn class_graph(
    classes: Vec<OntologyClass>,
    data_properties: Vec<(Uuid, DataProperty)>,
    object_properties: Vec<(Uuid, ObjectPropertyView)>,
) -> Vec<ClassWithProperties> {
    let mut data_by_class: HashMap<Uuid, Vec<DataProperty>> = HashMap::new();
    for (class_id, dp) in data_properties {
        data_by_class.entry(class_id).or_default().push(dp);
    }

    let mut objects_by_class: HashMap<Uuid, Vec<ObjectPropertyView>> = HashMap::new();
    for (class_id, op) in object_properties {
        objects_by_class.entry(class_id).or_default().push(op);
    }

    classes
        .into_iter()
        .map(|class| ClassWithProperties {
            data_properties: data_by_class.remove(&class.id).unwrap_or_default(),
            object_properties: objects_by_class.remove(&class.id).unwrap_or_default(),
            id: class.id,
            conversation_id: class.conversation_id,
            name: class.name,
            description: class.description,
            created_at: class.created_at,
        })
        .collect()
}

/// Group linked instances by class. Classes without instances are kept with an
/// empty list.
pub fn class_instances(
    classes: Vec<OntologyClass>,
    instances: Vec<(Uuid, Instance)>,
) -> Vec<ClassInstances> {
    let mut by_class: HashMap<Uuid, Vec<Instance>> = HashMap::new();
    for (class_id, instance) in instances {
        by_class.entry(class_id).or_default().push(instance);
    }

    classes
        .into_iter()
        .map(|class| ClassInstances {
            instances: by_class.remove(&class.id).unwrap_or_default(),
            class_id: class.id,
            class_name: class.name,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn object_property(class_id: Uuid, name: &str) -> ObjectProperty {
        ObjectProperty {
            id: Uuid::new_v4(),
            class_id,
            name: name.to_string(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn domain(op: &ObjectProperty, name: &str) -> Domain {
        Domain {
            id: Uuid::new_v4(),
            object_property_id: op.id,
            name: name.to_string(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn range(op: &ObjectProperty, name: &str) -> Range {
        Range {
            id: Uuid::new_v4(),
            object_property_id: op.id,
            name: name.to_string(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn pair(op: &ObjectProperty, d: &Domain, r: &Range) -> DomainRangePair {
        DomainRangePair {
            id: Uuid::new_v4(),
            object_property_id: op.id,
            domain_id: d.id,
            range_id: r.id,
            created_at: Utc::now(),
        }
    }

    fn class(name: &str) -> OntologyClass {
        OntologyClass {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    // ========================================================================
    // TEST 1: ranges nest under the domain of their pair
    // ========================================================================
    #[test]
    fn test_ranges_nest_under_their_domain() {
        let op = object_property(Uuid::new_v4(), "drives");
        let vehicle = domain(&op, "Vehicle");
        let road = range(&op, "Road");
        let p = pair(&op, &vehicle, &road);

        let views = object_property_views(vec![op.clone()], &[vehicle.clone()], &[road.clone()], &[p.clone()]);

        assert_eq!(views.len(), 1);
        assert_eq!(views[0].domains.len(), 1);
        assert_eq!(views[0].domains[0].name, "Vehicle");
        assert_eq!(views[0].domains[0].ranges, vec![RangeView { id: road.id, name: "Road".into(), pair_id: p.id }]);
    }

    // ========================================================================
    // TEST 2: pairs pointing at a missing (tombstoned) range are dropped
    // ========================================================================
    #[test]
    fn test_pair_with_missing_range_is_dropped() {
        let op = object_property(Uuid::new_v4(), "drives");
        let vehicle = domain(&op, "Vehicle");
        let road = range(&op, "Road");
        let p = pair(&op, &vehicle, &road);

        let views = object_property_views(vec![op], &[vehicle], &[], &[p]);

        assert_eq!(views[0].domains.len(), 1);
        assert!(views[0].domains[0].ranges.is_empty());
    }

    // ========================================================================
    // TEST 3: property without domains gets an empty list
    // ========================================================================
    #[test]
    fn test_property_without_domains() {
        let op = object_property(Uuid::new_v4(), "owns");
        let views = object_property_views(vec![op], &[], &[], &[]);
        assert!(views[0].domains.is_empty());
    }

    // ========================================================================
    // TEST 4: class graph keeps class order and attaches children
    // ========================================================================
    #[test]
    fn test_class_graph_attaches_children_by_link() {
        let vehicle = class("Vehicle");
        let road = class("Road");
        let speed = DataProperty {
            id: Uuid::new_v4(),
            class_id: vehicle.id,
            name: "speed".into(),
            data_type: "integer".into(),
            created_at: Utc::now(),
            updated_at: None,
        };
        let drives = object_property(vehicle.id, "drives");
        let drives_view = object_property_views(vec![drives], &[], &[], &[]).remove(0);

        let graph = class_graph(
            vec![vehicle.clone(), road.clone()],
            vec![(vehicle.id, speed)],
            vec![(vehicle.id, drives_view)],
        );

        assert_eq!(graph.len(), 2);
        assert_eq!(graph[0].name, "Vehicle");
        assert_eq!(graph[0].data_properties.len(), 1);
        assert_eq!(graph[0].object_properties.len(), 1);
        assert!(graph[1].data_properties.is_empty());
        assert!(graph[1].object_properties.is_empty());
    }

    // ========================================================================
    // TEST 5: classes without instances are still listed
    // ========================================================================
    #[test]
    fn test_class_instances_keeps_empty_classes() {
        let vehicle = class("Vehicle");
        let road = class("Road");
        let car = Instance {
            id: Uuid::new_v4(),
            class_id: vehicle.id,
            name: "Car1".into(),
            created_at: Utc::now(),
            updated_at: None,
        };

        let grouped = class_instances(vec![vehicle.clone(), road], vec![(vehicle.id, car)]);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].instances.len(), 1);
        assert_eq!(grouped[0].class_name, "Vehicle");
        assert!(grouped[1].instances.is_empty());
    }
}
