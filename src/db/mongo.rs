use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, UpdateModifications};
use mongodb::{Client, Database};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::EngineConfig;
use crate::db::document::{self, DocumentStore, UpdateSpec};
use crate::db::Engine;
use crate::error::DbError;
use crate::models::{Connection, QueryOutput, Record};

/// Document engine. Authenticates against a fixed administrative namespace
/// and works inside `connection.database`.
#[derive(Debug, Clone)]
pub struct MongoEngine {
    auth_source: String,
    default_database: String,
    server_selection_timeout: Duration,
    connect_timeout: Duration,
}

pub struct MongoSession {
    client: Client,
    auth_database: Database,
    database: Database,
}

impl MongoEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            auth_source: config.document_auth_source.clone(),
            default_database: config.document_default_database.clone(),
            server_selection_timeout: Duration::from_millis(
                config.document_server_selection_timeout_ms,
            ),
            connect_timeout: Duration::from_millis(config.document_connect_timeout_ms),
        }
    }

    /// Builds the `mongodb://` URI with credentials embedded.
    pub fn connection_uri(&self, connection: &Connection) -> String {
        if let Some(uri) = &connection.uri {
            return uri.clone();
        }
        match connection.username() {
            Some(user) => format!(
                "mongodb://{}:{}@{}:{}/?authSource={}",
                urlencoding::encode(user),
                urlencoding::encode(connection.password().unwrap_or_default()),
                connection.host,
                connection.port,
                self.auth_source
            ),
            None => format!("mongodb://{}:{}/", connection.host, connection.port),
        }
    }

    fn target_database<'a>(&'a self, connection: &'a Connection) -> &'a str {
        connection
            .database_name()
            .unwrap_or(self.default_database.as_str())
    }
}

/// Replaces the password in the URI's userinfo with `****`.
fn masked(uri: &str) -> String {
    let Some(scheme_end) = uri.find("://").map(|i| i + 3) else {
        return uri.to_string();
    };
    let rest = &uri[scheme_end..];
    let authority_end = rest.find(|c| c == '/' || c == '?').unwrap_or(rest.len());
    let at = match rest[..authority_end].rfind('@') {
        Some(at) => at,
        None => match rest.rfind('@') {
            Some(at) => at,
            None => return uri.to_string(),
        },
    };
    match rest[..at].find(':') {
        Some(colon) => format!(
            "{}{}:****{}",
            &uri[..scheme_end],
            &rest[..colon],
            &rest[at..]
        ),
        None => uri.to_string(),
    }
}

#[async_trait]
impl Engine for MongoEngine {
    type Session = MongoSession;
    const NAME: &'static str = "MongoDB";

    async fn open(&self, connection: &Connection) -> Result<MongoSession, DbError> {
        let uri = self.connection_uri(connection);
        debug!(uri = %masked(&uri), "opening document session");

        let mut options = ClientOptions::parse(&uri).await?;
        options.server_selection_timeout = Some(self.server_selection_timeout);
        options.connect_timeout = Some(self.connect_timeout);
        let client = Client::with_options(options)?;

        Ok(MongoSession {
            auth_database: client.database(&self.auth_source),
            database: client.database(self.target_database(connection)),
            client,
        })
    }

    // The driver connects lazily, so a reachability check needs a round trip.
    async fn probe(&self, session: &mut MongoSession) -> Result<(), DbError> {
        session.auth_database.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    async fn run(&self, session: &mut MongoSession, query: &str) -> Result<QueryOutput, DbError> {
        document::execute(&mut session.database, query).await
    }

    async fn close(&self, session: MongoSession) -> Result<(), DbError> {
        session.client.shutdown().await;
        Ok(())
    }
}

fn to_document(record: Record) -> Result<Document, DbError> {
    Document::try_from(record).map_err(|e| DbError::InvalidDocument(e.to_string()))
}

fn to_record(document: Document) -> Record {
    document
        .into_iter()
        .map(|(key, value)| (key, bson_to_json(value)))
        .collect()
}

/// Relaxed extended JSON, except ids and dates, which the grid shows as plain
/// strings.
pub fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        Bson::DateTime(dt) => match dt.try_to_rfc3339_string() {
            Ok(s) => Value::String(s),
            Err(_) => Value::from(dt.timestamp_millis()),
        },
        Bson::Document(doc) => Value::Object(to_record(doc)),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::Int32(i) => Value::from(i),
        Bson::Int64(i) => Value::from(i),
        Bson::Null | Bson::Undefined => Value::Null,
        other => other.into_relaxed_extjson(),
    }
}

/// Descriptors from `listCollections`, as the server reports them.
async fn collection_descriptors(database: &Database) -> Result<Vec<Record>, DbError> {
    let reply = database
        .run_command(doc! { "listCollections": 1, "cursor": {} })
        .await?;
    let batch = reply
        .get_document("cursor")
        .and_then(|cursor| cursor.get_array("firstBatch"))
        .map_err(|e| DbError::Message(e.to_string()))?;

    Ok(batch
        .iter()
        .filter_map(|entry| match entry {
            Bson::Document(doc) => Some(to_record(doc.clone())),
            _ => None,
        })
        .collect())
}

#[async_trait]
impl DocumentStore for Database {
    async fn create_collection(&mut self, name: &str) -> Result<(), DbError> {
        Database::create_collection(self, name).await?;
        Ok(())
    }

    async fn list_collections(&mut self) -> Result<Vec<Record>, DbError> {
        collection_descriptors(self).await
    }

    async fn find(
        &mut self,
        collection: &str,
        filter: Record,
        limit: i64,
    ) -> Result<Vec<Record>, DbError> {
        let cursor = self
            .collection::<Document>(collection)
            .find(to_document(filter)?)
            .limit(limit)
            .await?;
        let documents: Vec<Document> = cursor.try_collect().await?;
        Ok(documents.into_iter().map(to_record).collect())
    }

    async fn insert_one(&mut self, collection: &str, document: Record) -> Result<Value, DbError> {
        let result = self
            .collection::<Document>(collection)
            .insert_one(to_document(document)?)
            .await?;
        Ok(bson_to_json(result.inserted_id))
    }

    async fn update_many(
        &mut self,
        collection: &str,
        filter: Record,
        update: UpdateSpec,
    ) -> Result<(u64, u64), DbError> {
        let update = match update {
            UpdateSpec::Modifiers(modifiers) => {
                UpdateModifications::Document(to_document(modifiers)?)
            }
            UpdateSpec::Pipeline(stages) => UpdateModifications::Pipeline(
                stages
                    .into_iter()
                    .map(to_document)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        };
        let result = self
            .collection::<Document>(collection)
            .update_many(to_document(filter)?, update)
            .await?;
        Ok((result.matched_count, result.modified_count))
    }

    async fn delete_many(&mut self, collection: &str, filter: Record) -> Result<u64, DbError> {
        let result = self
            .collection::<Document>(collection)
            .delete_many(to_document(filter)?)
            .await?;
        Ok(result.deleted_count)
    }
}
