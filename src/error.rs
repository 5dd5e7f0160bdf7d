use thiserror::Error;

/// Failure raised while talking to an engine.
///
/// Executors never build failure payloads themselves; every variant travels up
/// to the dispatcher, which turns it into a `QueryResult` with `success = false`.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0}")]
    Sql(#[from] sqlx::Error),

    #[error("{0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("{0}")]
    Redis(#[from] redis::RedisError),

    #[error("invalid JSON query: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("collection name required")]
    CollectionRequired,

    #[error("unsupported key-value command: {0}")]
    UnsupportedCommand(String),

    #[error("{command} requires {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("{0}")]
    Message(String),
}

/// Request-shape failure, detected before any engine is contacted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("missing required parameters")]
    MissingParameters,

    #[error("unsupported database type")]
    UnsupportedType,

    #[error("invalid connection: {0}")]
    InvalidConnection(String),

    #[error("malformed request body: {0}")]
    MalformedBody(String),
}
