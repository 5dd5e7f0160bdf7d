//! Starter queries offered by the editor for each engine family.

use serde::Serialize;

use crate::models::DatabaseType;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct QueryTemplate {
    pub name: &'static str,
    pub query: &'static str,
}

const fn template(name: &'static str, query: &'static str) -> QueryTemplate {
    QueryTemplate { name, query }
}

const SQL_TEMPLATES: &[QueryTemplate] = &[
    template("select", "SELECT * FROM table_name LIMIT 10;"),
    template(
        "insert",
        "INSERT INTO table_name (column1, column2) VALUES (value1, value2);",
    ),
    template("update", "UPDATE table_name SET column1 = value1 WHERE condition;"),
    template("delete", "DELETE FROM table_name WHERE condition;"),
    template(
        "create",
        "CREATE TABLE table_name (\n  id SERIAL PRIMARY KEY,\n  name VARCHAR(255) NOT NULL\n);",
    ),
];

const DOCUMENT_TEMPLATES: &[QueryTemplate] = &[
    template("find", r#"{"collection": "users", "query": {}}"#),
    template("findOne", r#"{"collection": "users", "query": {"_id": "..."}}"#),
    template(
        "insert",
        r#"{"collection": "users", "document": {"name": "John", "email": "john@example.com"}}"#,
    ),
    template(
        "update",
        r#"{"collection": "users", "query": {"_id": "..."}, "update": {"$set": {"name": "Jane"}}}"#,
    ),
    template("delete", r#"{"collection": "users", "query": {"_id": "..."}, "delete": true}"#),
    template("createCollection", r#"{"createCollection": "new_collection_name"}"#),
    template("listCollections", r#"{"listCollections": true}"#),
];

const KEY_VALUE_TEMPLATES: &[QueryTemplate] = &[
    template("get", "GET key"),
    template("set", "SET key value"),
    template("del", "DEL key"),
    template("keys", "KEYS pattern"),
    template("hgetall", "HGETALL key"),
];

pub fn templates_for(db_type: DatabaseType) -> &'static [QueryTemplate] {
    match db_type {
        DatabaseType::PostgreSql | DatabaseType::MySql => SQL_TEMPLATES,
        DatabaseType::MongoDb => DOCUMENT_TEMPLATES,
        DatabaseType::Redis => KEY_VALUE_TEMPLATES,
    }
}
