//! Database-specific error types and conversions.

use stagehand_core::error::StagehandError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },
}

/// Failures the database reports for conditions that are safe to
/// retry: the connection dropped, the request timed out, or the engine
/// reported itself unavailable.
fn is_transient(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    ["connection", "timed out", "timeout", "unavailable", "websocket"]
        .iter()
        .any(|needle| message.contains(needle))
}

impl From<DbError> for StagehandError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => StagehandError::NotFound { entity, id },
            DbError::Surreal(e) => {
                let message = e.to_string();
                if is_transient(&message) {
                    StagehandError::StorageUnavailable { reason: message }
                } else {
                    StagehandError::Database(message)
                }
            }
            other => StagehandError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_not_found() {
        let err = DbError::NotFound {
            entity: "tenant".into(),
            id: "t-1".into(),
        };
        assert!(matches!(
            StagehandError::from(err),
            StagehandError::NotFound { .. }
        ));
    }

    #[test]
    fn migration_failures_are_not_transient() {
        let err = DbError::Migration("bad DDL".into());
        let converted = StagehandError::from(err);
        assert!(matches!(converted, StagehandError::Database(_)));
        assert!(!converted.is_transient());
    }

    #[test]
    fn transient_messages_are_recognized() {
        for message in [
            "WebSocket connection closed",
            "request timed out",
            "server unavailable",
        ] {
            assert!(is_transient(message), "{message}");
        }
        for message in ["parse error at line 3", "record already exists"] {
            assert!(!is_transient(message), "{message}");
        }
    }
}
