pub mod class;
pub mod conversation;
pub mod instance;
pub mod notes;
pub mod property;
pub mod views;

pub use class::{ClassLink, OntologyClass};
pub use conversation::Conversation;
pub use instance::Instance;
pub use notes::{CompetencyQuestions, ImportantTerms};
pub use property::{DataProperty, Domain, DomainRangePair, ObjectProperty, Range};
pub use views::{ClassInstances, ClassWithProperties, DomainView, ObjectPropertyView, RangeView};

/// Comparison key for class names: whitespace removed, case-folded.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
