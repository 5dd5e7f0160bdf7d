//! Single entry point for query execution.
//!
//! Validates the request, picks the driver registered for the connection's
//! engine, measures the elapsed time and turns every engine failure into a
//! `QueryResult` with `success = false`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::db::mongo::MongoEngine;
use crate::db::mysql::MySqlEngine;
use crate::db::postgres::PostgresEngine;
use crate::db::redis::RedisEngine;
use crate::db::DatabaseDriver;
use crate::error::{DbError, RequestError};
use crate::models::{Connection, DatabaseType, ExecuteRequest, QueryResult};

const UNKNOWN_ERROR: &str = "unknown error";

pub struct Dispatcher {
    drivers: HashMap<DatabaseType, Arc<dyn DatabaseDriver>>,
}

impl Dispatcher {
    /// A dispatcher with no drivers; every type is unsupported until registered.
    pub fn new() -> Self {
        Self {
            drivers: HashMap::new(),
        }
    }

    /// All four built-in engines.
    pub fn with_defaults(engines: &EngineConfig) -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register(DatabaseType::PostgreSql, Arc::new(PostgresEngine::new()));
        dispatcher.register(DatabaseType::MySql, Arc::new(MySqlEngine::new()));
        dispatcher.register(DatabaseType::MongoDb, Arc::new(MongoEngine::new(engines)));
        dispatcher.register(DatabaseType::Redis, Arc::new(RedisEngine::new()));
        dispatcher
    }

    pub fn register(&mut self, db_type: DatabaseType, driver: Arc<dyn DatabaseDriver>) {
        self.drivers.insert(db_type, driver);
    }

    fn driver(&self, db_type: DatabaseType) -> Result<&Arc<dyn DatabaseDriver>, RequestError> {
        self.drivers
            .get(&db_type)
            .ok_or(RequestError::UnsupportedType)
    }

    /// Request-shape problems come back as `Err`; anything that happens once an
    /// engine is involved is an `Ok` result with `success = false`.
    pub async fn execute(&self, request: ExecuteRequest) -> Result<QueryResult, RequestError> {
        let started = Instant::now();
        let (connection, query) = request.validate()?;
        self.dispatch(started, &connection, &query).await
    }

    async fn dispatch(
        &self,
        started: Instant,
        connection: &Connection,
        query: &str,
    ) -> Result<QueryResult, RequestError> {
        let driver = self.driver(connection.db_type)?;
        debug!(
            engine = driver.name(),
            connection = %connection.id,
            host = %connection.host,
            port = connection.port,
            "executing query"
        );

        let outcome = driver.execute(connection, query).await;
        let elapsed = elapsed_ms(started);

        Ok(match outcome {
            Ok(output) => {
                debug!(rows = output.row_count, elapsed_ms = elapsed, "query completed");
                QueryResult::completed(output, elapsed)
            }
            Err(e) => {
                warn!(engine = driver.name(), error = %e, elapsed_ms = elapsed, "query failed");
                QueryResult::failed(error_message(&e), elapsed)
            }
        })
    }

    /// Opens and closes a session without running anything. Returns the
    /// confirmation message on success.
    pub async fn check_connection(&self, connection: &Connection) -> Result<String, CheckError> {
        let driver = self.driver(connection.db_type)?;
        driver.ping(connection).await?;
        Ok(format!("Connected to {}", driver.name()))
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::with_defaults(&EngineConfig::default())
    }
}

/// Why a connect-check failed.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("{0}")]
    Engine(#[from] DbError),
}

fn error_message(e: &DbError) -> String {
    let message = e.to_string();
    if message.trim().is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        message
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
