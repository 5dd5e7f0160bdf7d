//! JSON document-query grammar.
//!
//! A query is a JSON object decoded into one [`DocumentCommand`] with this
//! precedence, first match wins:
//!
//! 1. `createCollection`
//! 2. `listCollections`
//! 3. `collection` is then mandatory, and
//!    a. `delete` flag, b. `document`, c. `update`, d. find.
//!
//! A `query` filter on its own never deletes: without the `delete` flag it is
//! a find. Field presence uses JavaScript truthiness (`null`, `false`, `0` and
//! `""` count as absent).

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::DbError;
use crate::models::{QueryOutput, Record};

/// Maximum number of documents a find returns.
pub const FIND_LIMIT: i64 = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum DocumentCommand {
    CreateCollection {
        name: String,
    },
    ListCollections,
    Delete {
        collection: String,
        filter: Record,
    },
    Insert {
        collection: String,
        document: Record,
    },
    Update {
        collection: String,
        filter: Record,
        update: UpdateSpec,
    },
    Find {
        collection: String,
        filter: Record,
    },
}

/// The `update` field: an operator document, or an aggregation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateSpec {
    Modifiers(Record),
    Pipeline(Vec<Record>),
}

/// The native calls a document engine must offer.
#[async_trait]
pub trait DocumentStore: Send {
    async fn create_collection(&mut self, name: &str) -> Result<(), DbError>;

    async fn list_collections(&mut self) -> Result<Vec<Record>, DbError>;

    async fn find(&mut self, collection: &str, filter: Record, limit: i64)
        -> Result<Vec<Record>, DbError>;

    /// Returns the id of the inserted document.
    async fn insert_one(&mut self, collection: &str, document: Record) -> Result<Value, DbError>;

    /// Returns `(matched, modified)`.
    async fn update_many(
        &mut self,
        collection: &str,
        filter: Record,
        update: UpdateSpec,
    ) -> Result<(u64, u64), DbError>;

    /// Returns the number of deleted documents.
    async fn delete_many(&mut self, collection: &str, filter: Record) -> Result<u64, DbError>;
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Reads an object-valued field; absent or falsy fields yield `None`.
fn object_field(root: &Record, field: &str) -> Result<Option<Record>, DbError> {
    let value = root.get(field);
    if !truthy(value) {
        return Ok(None);
    }
    match value {
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        _ => Err(DbError::InvalidDocument(format!("`{field}` must be a JSON object"))),
    }
}

fn update_field(root: &Record) -> Result<Option<UpdateSpec>, DbError> {
    let value = root.get("update");
    if !truthy(value) {
        return Ok(None);
    }
    match value {
        Some(Value::Object(map)) => Ok(Some(UpdateSpec::Modifiers(map.clone()))),
        Some(Value::Array(stages)) => stages
            .iter()
            .map(|stage| match stage {
                Value::Object(map) => Ok(map.clone()),
                _ => Err(DbError::InvalidDocument(
                    "pipeline stages in `update` must be JSON objects".into(),
                )),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(|stages| Some(UpdateSpec::Pipeline(stages))),
        _ => Err(DbError::InvalidDocument(
            "`update` must be a JSON object or an array of stages".into(),
        )),
    }
}

fn name_field(root: &Record, field: &str) -> Result<Option<String>, DbError> {
    let value = root.get(field);
    if !truthy(value) {
        return Ok(None);
    }
    match value {
        Some(Value::String(name)) => Ok(Some(name.clone())),
        _ => Err(DbError::InvalidDocument(format!("`{field}` must be a string"))),
    }
}

impl DocumentCommand {
    pub fn parse(raw: &str) -> Result<Self, DbError> {
        let root = match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => map,
            _ => return Err(DbError::InvalidDocument("query must be a JSON object".into())),
        };
        Self::from_object(&root)
    }

    pub fn from_object(root: &Record) -> Result<Self, DbError> {
        if let Some(name) = name_field(root, "createCollection")? {
            return Ok(DocumentCommand::CreateCollection { name });
        }
        if truthy(root.get("listCollections")) {
            return Ok(DocumentCommand::ListCollections);
        }

        let collection = name_field(root, "collection")?.ok_or(DbError::CollectionRequired)?;
        let filter = object_field(root, "query")?.unwrap_or_default();

        if truthy(root.get("delete")) {
            return Ok(DocumentCommand::Delete { collection, filter });
        }
        if let Some(document) = object_field(root, "document")? {
            return Ok(DocumentCommand::Insert {
                collection,
                document,
            });
        }
        if let Some(update) = update_field(root)? {
            return Ok(DocumentCommand::Update {
                collection,
                filter,
                update,
            });
        }
        Ok(DocumentCommand::Find { collection, filter })
    }

    pub async fn apply<S>(self, store: &mut S) -> Result<QueryOutput, DbError>
    where
        S: DocumentStore + ?Sized,
    {
        match self {
            DocumentCommand::CreateCollection { name } => {
                store.create_collection(&name).await?;
                Ok(single(json!({ "message": format!("{name} created") })))
            }
            DocumentCommand::ListCollections => {
                let collections = store.list_collections().await?;
                let columns = match collections.first() {
                    Some(first) => first.keys().cloned().collect(),
                    None => vec!["name".to_string()],
                };
                Ok(QueryOutput::from_records(collections, columns))
            }
            DocumentCommand::Delete { collection, filter } => {
                let deleted = store.delete_many(&collection, filter).await?;
                Ok(single(json!({ "deletedCount": deleted })))
            }
            DocumentCommand::Insert {
                collection,
                document,
            } => {
                let id = store.insert_one(&collection, document).await?;
                Ok(single(json!({ "insertedId": id })))
            }
            DocumentCommand::Update {
                collection,
                filter,
                update,
            } => {
                let (matched, modified) = store.update_many(&collection, filter, update).await?;
                Ok(single(json!({
                    "matchedCount": matched,
                    "modifiedCount": modified,
                })))
            }
            DocumentCommand::Find { collection, filter } => {
                let documents = store.find(&collection, filter, FIND_LIMIT).await?;
                let columns = documents
                    .first()
                    .map(|d| d.keys().cloned().collect())
                    .unwrap_or_default();
                Ok(QueryOutput::from_records(documents, columns))
            }
        }
    }
}

fn single(value: Value) -> QueryOutput {
    match value {
        Value::Object(record) => QueryOutput::single(record),
        _ => QueryOutput::default(),
    }
}

/// Parses `raw` and runs it against `store`.
pub async fn execute<S>(store: &mut S, raw: &str) -> Result<QueryOutput, DbError>
where
    S: DocumentStore + ?Sized,
{
    DocumentCommand::parse(raw)?.apply(store).await
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;

    fn users(n: usize) -> MemoryStore {
        MemoryStore::with(
            "users",
            (0..n).map(|i| json!({"_id": i, "name": format!("user{i}")})).collect(),
        )
    }

    #[test]
    fn precedence_create_before_list_before_collection() {
        let cmd = DocumentCommand::parse(
            r#"{"createCollection": "logs", "listCollections": true, "collection": "users"}"#,
        )
        .unwrap();
        assert_eq!(cmd, DocumentCommand::CreateCollection { name: "logs".into() });

        let cmd = DocumentCommand::parse(r#"{"listCollections": true, "collection": "users"}"#)
            .unwrap();
        assert_eq!(cmd, DocumentCommand::ListCollections);
    }

    #[test]
    fn delete_flag_beats_document_and_update() {
        let cmd = DocumentCommand::parse(
            r#"{"collection": "users", "delete": true, "document": {"a": 1}, "update": {"$set": {"a": 2}}}"#,
        )
        .unwrap();
        assert!(matches!(cmd, DocumentCommand::Delete { .. }));
    }

    #[test]
    fn document_beats_update() {
        let cmd = DocumentCommand::parse(
            r#"{"collection": "users", "document": {"a": 1}, "update": {"$set": {"a": 2}}}"#,
        )
        .unwrap();
        assert!(matches!(cmd, DocumentCommand::Insert { .. }));
    }

    // A bare filter reads like a delete template but only the explicit flag
    // deletes. Kept as-is because callers may rely on either reading.
    #[test]
    fn filter_without_delete_flag_is_a_find() {
        let cmd = DocumentCommand::parse(r#"{"collection": "users", "query": {"name": "A"}}"#)
            .unwrap();
        let mut filter = Record::new();
        filter.insert("name".into(), json!("A"));
        assert_eq!(
            cmd,
            DocumentCommand::Find {
                collection: "users".into(),
                filter
            }
        );
    }

    #[test]
    fn falsy_flags_fall_through() {
        let cmd = DocumentCommand::parse(
            r#"{"createCollection": "", "listCollections": false, "collection": "users", "delete": 0}"#,
        )
        .unwrap();
        assert!(matches!(cmd, DocumentCommand::Find { .. }));
    }

    #[test]
    fn collection_is_required() {
        let err = DocumentCommand::parse(r#"{"query": {}}"#).unwrap_err();
        assert!(matches!(err, DbError::CollectionRequired));
        assert_eq!(err.to_string(), "collection name required");
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = DocumentCommand::parse("{collection: users}").unwrap_err();
        assert!(matches!(err, DbError::Json(_)));

        let err = DocumentCommand::parse(r#"["users"]"#).unwrap_err();
        assert!(matches!(err, DbError::InvalidDocument(_)));
    }

    #[test]
    fn non_object_filter_is_rejected() {
        let err = DocumentCommand::parse(r#"{"collection": "users", "query": "name=A"}"#)
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn find_all_is_capped() {
        let mut store = users(150);
        let output = execute(&mut store, r#"{"collection": "users", "query": {}}"#)
            .await
            .unwrap();
        assert_eq!(output.row_count, 100);
        assert_eq!(output.data.len(), 100);
        assert_eq!(output.columns, vec!["_id", "name"]);
    }

    #[tokio::test]
    async fn find_with_no_match_has_no_columns() {
        let mut store = users(3);
        let output = execute(&mut store, r#"{"collection": "users", "query": {"name": "nobody"}}"#)
            .await
            .unwrap();
        assert_eq!(output.row_count, 0);
        assert!(output.columns.is_empty());
    }

    #[tokio::test]
    async fn filter_without_flag_leaves_documents_in_place() {
        let mut store = users(3);
        let output = execute(&mut store, r#"{"collection": "users", "query": {"name": "user1"}}"#)
            .await
            .unwrap();
        assert_eq!(output.row_count, 1);
        assert_eq!(store.collections["users"].len(), 3);
    }

    #[tokio::test]
    async fn insert_returns_one_synthetic_row() {
        let mut store = MemoryStore::default();
        let output = execute(&mut store, r#"{"collection": "users", "document": {"name": "A"}}"#)
            .await
            .unwrap();
        assert_eq!(output.row_count, 1);
        assert_eq!(output.columns, vec!["insertedId"]);
        assert!(output.data[0].contains_key("insertedId"));
        assert_eq!(store.collections["users"].len(), 1);
    }

    #[tokio::test]
    async fn update_reports_matched_and_modified() {
        let mut store = users(3);
        let output = execute(
            &mut store,
            r#"{"collection": "users", "update": {"$set": {"active": true}}}"#,
        )
        .await
        .unwrap();
        assert_eq!(output.columns, vec!["matchedCount", "modifiedCount"]);
        assert_eq!(output.data[0]["matchedCount"], json!(3));
        assert_eq!(output.data[0]["modifiedCount"], json!(3));
    }

    #[tokio::test]
    async fn pipeline_update_is_accepted() {
        let mut store = users(2);
        let raw = r#"{"collection": "users", "query": {"name": "user1"},
                      "update": [{"$set": {"tier": "gold"}}, {"$addFields": {"seen": 1}}]}"#;
        match DocumentCommand::parse(raw).unwrap() {
            DocumentCommand::Update { update, .. } => {
                assert!(matches!(update, UpdateSpec::Pipeline(ref stages) if stages.len() == 2))
            }
            other => panic!("expected update, got {other:?}"),
        }

        let output = execute(&mut store, raw).await.unwrap();
        assert_eq!(output.data[0]["matchedCount"], json!(1));
        assert_eq!(output.data[0]["modifiedCount"], json!(1));
        let updated = &store.collections["users"][1];
        assert_eq!(updated["tier"], json!("gold"));
        assert_eq!(updated["seen"], json!(1));
    }

    #[test]
    fn update_must_be_object_or_stage_list() {
        assert!(matches!(
            DocumentCommand::parse(r#"{"collection": "users", "update": "x"}"#),
            Err(DbError::InvalidDocument(_))
        ));
        assert!(matches!(
            DocumentCommand::parse(r#"{"collection": "users", "update": [1]}"#),
            Err(DbError::InvalidDocument(_))
        ));
    }

    #[tokio::test]
    async fn delete_with_flag_removes_matches() {
        let mut store = users(3);
        let output = execute(
            &mut store,
            r#"{"collection": "users", "query": {"name": "user0"}, "delete": true}"#,
        )
        .await
        .unwrap();
        assert_eq!(output.data[0]["deletedCount"], json!(1));
        assert_eq!(store.collections["users"].len(), 2);
    }

    #[tokio::test]
    async fn list_collections_on_empty_namespace() {
        let mut store = MemoryStore::default();
        let output = execute(&mut store, r#"{"listCollections": true}"#).await.unwrap();
        assert_eq!(output.columns, vec!["name"]);
        assert_eq!(output.row_count, 0);
    }

    #[tokio::test]
    async fn create_collection_message() {
        let mut store = MemoryStore::default();
        let output = execute(&mut store, r#"{"createCollection": "orders"}"#)
            .await
            .unwrap();
        assert_eq!(output.data[0]["message"], json!("orders created"));
        assert_eq!(output.columns, vec!["message"]);
        assert!(store.collections.contains_key("orders"));
    }
}
