use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};

use crate::db::keyvalue::{self, KeyValueStore};
use crate::db::Engine;
use crate::error::DbError;
use crate::models::{Connection, QueryOutput};

/// Key-value engine speaking the Redis protocol.
#[derive(Debug, Default, Clone)]
pub struct RedisEngine;

impl RedisEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn connection_url(connection: &Connection) -> String {
        match connection.password() {
            Some(password) => format!(
                "redis://:{}@{}:{}/",
                urlencoding::encode(password),
                connection.host,
                connection.port
            ),
            None => format!("redis://{}:{}/", connection.host, connection.port),
        }
    }
}

#[async_trait]
impl Engine for RedisEngine {
    type Session = MultiplexedConnection;
    const NAME: &'static str = "Redis";

    async fn open(&self, connection: &Connection) -> Result<MultiplexedConnection, DbError> {
        let client = Client::open(Self::connection_url(connection))?;
        Ok(client.get_multiplexed_async_connection().await?)
    }

    async fn probe(&self, session: &mut MultiplexedConnection) -> Result<(), DbError> {
        redis::cmd("PING").query_async::<String>(session).await?;
        Ok(())
    }

    async fn run(
        &self,
        session: &mut MultiplexedConnection,
        query: &str,
    ) -> Result<QueryOutput, DbError> {
        keyvalue::execute(session, query).await
    }

    /// Polite disconnect: ask the server to end the session, then drop it.
    async fn close(&self, mut session: MultiplexedConnection) -> Result<(), DbError> {
        redis::cmd("QUIT").query_async::<()>(&mut session).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MultiplexedConnection {
    async fn get(&mut self, key: &str) -> Result<Option<String>, DbError> {
        Ok(AsyncCommands::get(self, key).await?)
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<String, DbError> {
        Ok(AsyncCommands::set(self, key, value).await?)
    }

    async fn del(&mut self, keys: &[String]) -> Result<i64, DbError> {
        Ok(AsyncCommands::del(self, keys.to_vec()).await?)
    }

    async fn keys(&mut self, pattern: &str) -> Result<Vec<String>, DbError> {
        Ok(AsyncCommands::keys(self, pattern).await?)
    }

    async fn hgetall(&mut self, key: &str) -> Result<Vec<(String, String)>, DbError> {
        Ok(AsyncCommands::hgetall(self, key).await?)
    }

    async fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>, DbError> {
        Ok(AsyncCommands::hget(self, key, field).await?)
    }

    async fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<i64, DbError> {
        Ok(AsyncCommands::hset(self, key, field, value).await?)
    }
}
