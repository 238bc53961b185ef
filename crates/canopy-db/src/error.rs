//! Database-specific error types and conversions.

use canopy_core::error::CanopyError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Duplicate {entity}")]
    Duplicate { entity: String },
}

impl DbError {
    /// Classify a failed write. Unique-index violations become
    /// [`DbError::Duplicate`].
    pub(crate) fn from_write(entity: &str, err: surrealdb::Error) -> Self {
        let message = err.to_string();
        if message.contains("already contains") || message.contains("already exists") {
            Self::Duplicate {
                entity: entity.into(),
            }
        } else {
            Self::Query(message)
        }
    }

    pub(crate) fn invalid_id(what: &str, err: uuid::Error) -> Self {
        Self::InvalidData(format!("invalid {what} UUID: {err}"))
    }
}

impl From<DbError> for CanopyError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => CanopyError::NotFound { entity, id },
            DbError::Duplicate { entity } => CanopyError::AlreadyExists { entity },
            other => CanopyError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_maps_to_already_exists() {
        let err: CanopyError = DbError::Duplicate {
            entity: "tenant".into(),
        }
        .into();
        assert!(matches!(err, CanopyError::AlreadyExists { entity } if entity == "tenant"));
    }

    #[test]
    fn not_found_keeps_entity_and_id() {
        let err: CanopyError = DbError::NotFound {
            entity: "role".into(),
            id: "abc".into(),
        }
        .into();
        assert!(matches!(err, CanopyError::NotFound { entity, id } if entity == "role" && id == "abc"));
    }

    #[test]
    fn migration_is_a_database_error() {
        let err: CanopyError = DbError::Migration("boom".into()).into();
        assert!(matches!(err, CanopyError::Database(_)));
    }

    #[test]
    fn runtime_failures_do_not_mention_migrations() {
        let err = DbError::Query("index busy".into());
        assert_eq!(err.to_string(), "Query failed: index busy");

        let err = DbError::invalid_id("role", uuid::Uuid::parse_str("nope").unwrap_err());
        assert!(matches!(err, DbError::InvalidData(_)));
        assert!(!err.to_string().contains("Migration"));

        let err: CanopyError = DbError::InvalidData("unknown role scope: X".into()).into();
        assert!(matches!(err, CanopyError::Database(ref m) if m.contains("unknown role scope")));
    }
}
