//! Error types for sylva-db.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(String),

    #[error("{entity} row not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("unknown column {column:?} for entity {entity}")]
    UnknownColumn {
        entity: &'static str,
        column: String,
    },

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("store channel closed: {0}")]
    Channel(String),

    #[error("integrity check failed: {0}")]
    Corrupt(String),
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        let message = value.to_string();
        tracing::trace!("sqlite error: {message}");
        DbError::Sqlite(message)
    }
}

impl From<DbError> for sylva_error::Error {
    fn from(value: DbError) -> Self {
        use sylva_error::{ClientError, OperationalError};
        match value {
            DbError::Sqlite(message) | DbError::Corrupt(message) => {
                OperationalError::Db { message }.into()
            }
            DbError::NotFound { entity, id } => ClientError::NotFound {
                what: entity,
                key: id,
            }
            .into(),
            DbError::UnknownEntity(name) => ClientError::InvalidRequest {
                message: format!("unknown entity: {name}"),
            }
            .into(),
            DbError::UnknownColumn { entity, column } => ClientError::InvalidRequest {
                message: format!("unknown column {column:?} for entity {entity}"),
            }
            .into(),
            DbError::Transaction(message) => OperationalError::Transaction { message }.into(),
            DbError::Schema(message) => OperationalError::Schema { message }.into(),
            DbError::Channel(message) => OperationalError::Connection { message }.into(),
        }
    }
}
