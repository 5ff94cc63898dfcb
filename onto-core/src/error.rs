use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Entity kinds addressable by id, used to tag `NotFound` errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Conversation,
    Class,
    DataProperty,
    ObjectProperty,
    Instance,
    Domain,
    Range,
    DomainRangePair,
    ImportantTerms,
    CompetencyQuestions,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Conversation => "conversation",
            EntityKind::Class => "class",
            EntityKind::DataProperty => "data property",
            EntityKind::ObjectProperty => "object property",
            EntityKind::Instance => "instance",
            EntityKind::Domain => "domain",
            EntityKind::Range => "range",
            EntityKind::DomainRangePair => "domain-range pair",
            EntityKind::ImportantTerms => "important terms",
            EntityKind::CompetencyQuestions => "competency questions",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum OntoError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: Uuid },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse error tag so callers can branch without matching on messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Store,
    Cache,
    Validation,
    Other,
}

impl OntoError {
    pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
        OntoError::NotFound { kind, id }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OntoError::NotFound { .. } => ErrorKind::NotFound,
            OntoError::Conflict(_) => ErrorKind::Conflict,
            OntoError::Database(_) | OntoError::Store(_) => ErrorKind::Store,
            OntoError::Cache(_) => ErrorKind::Cache,
            OntoError::Validation(_) => ErrorKind::Validation,
            OntoError::Config(_) | OntoError::Io(_) | OntoError::Serialization(_) => {
                ErrorKind::Other
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

pub type OntoResult<T> = Result<T, OntoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_errors_are_store_kind() {
        let err = OntoError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.kind(), ErrorKind::Store);
    }

    #[test]
    fn test_not_found_message_names_the_kind() {
        let id = Uuid::nil();
        let err = OntoError::not_found(EntityKind::ObjectProperty, id);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), format!("object property not found: {id}"));
    }
}
