use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::RequestError;

/// One result row: column name to scalar, null or nested value.
pub type Record = Map<String, Value>;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseType {
    #[serde(rename = "postgresql", alias = "postgres")]
    PostgreSql,
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "mongodb")]
    MongoDb,
    #[serde(rename = "redis")]
    Redis,
}

impl DatabaseType {
    pub const ALL: [DatabaseType; 4] = [
        DatabaseType::PostgreSql,
        DatabaseType::MySql,
        DatabaseType::MongoDb,
        DatabaseType::Redis,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseType::PostgreSql => "postgresql",
            DatabaseType::MySql => "mysql",
            DatabaseType::MongoDb => "mongodb",
            DatabaseType::Redis => "redis",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            DatabaseType::PostgreSql => 5432,
            DatabaseType::MySql => 3306,
            DatabaseType::MongoDb => 27017,
            DatabaseType::Redis => 6379,
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseType {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgresql" | "postgres" => Ok(DatabaseType::PostgreSql),
            "mysql" => Ok(DatabaseType::MySql),
            "mongodb" => Ok(DatabaseType::MongoDb),
            "redis" => Ok(DatabaseType::Redis),
            _ => Err(RequestError::UnsupportedType),
        }
    }
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// How to reach one database instance. Read-only once handed to the dispatcher.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Connection {
    #[serde(default = "generate_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub db_type: DatabaseType,
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Full connection string; overrides host, port and credentials for document engines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

impl Connection {
    /// Decodes a connection descriptor, telling an unknown engine apart from a
    /// badly shaped record.
    pub fn from_value(value: Value) -> Result<Self, RequestError> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(RequestError::UnsupportedType)?;
        kind.parse::<DatabaseType>()?;

        let connection: Connection = serde_json::from_value(value)
            .map_err(|e| RequestError::InvalidConnection(e.to_string()))?;
        connection.validate()?;
        Ok(connection)
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        if self.host.trim().is_empty() {
            return Err(RequestError::InvalidConnection("host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(RequestError::InvalidConnection("port must be positive".into()));
        }
        Ok(())
    }

    /// `database` with blank values treated as unset.
    pub fn database_name(&self) -> Option<&str> {
        non_blank(self.database.as_deref())
    }

    pub fn username(&self) -> Option<&str> {
        non_blank(self.username.as_deref())
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// What an executor hands back on success.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutput {
    pub data: Vec<Record>,
    pub columns: Vec<String>,
    pub row_count: u64,
}

impl QueryOutput {
    /// Records with `rowCount` equal to their number.
    pub fn from_records(data: Vec<Record>, columns: Vec<String>) -> Self {
        let row_count = data.len() as u64;
        Self {
            data,
            columns,
            row_count,
        }
    }

    /// A single synthetic row whose columns are its own keys, in order.
    pub fn single(record: Record) -> Self {
        let columns = record.keys().cloned().collect();
        Self::from_records(vec![record], columns)
    }
}

/// The uniform outcome returned to the UI for every execute request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time: u64,
}

impl QueryResult {
    pub fn completed(output: QueryOutput, execution_time: u64) -> Self {
        Self {
            success: true,
            data: Some(output.data),
            columns: Some(output.columns),
            row_count: Some(output.row_count),
            error: None,
            execution_time,
        }
    }

    pub fn failed(error: impl Into<String>, execution_time: u64) -> Self {
        Self {
            success: false,
            data: None,
            columns: None,
            row_count: None,
            error: Some(error.into()),
            execution_time,
        }
    }
}

/// Body of `POST /api/execute`. Both fields stay loose so that a missing
/// parameter is reported before the connection shape is inspected.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub connection: Option<Value>,
    #[serde(default)]
    pub query: Option<String>,
}

impl ExecuteRequest {
    pub fn new(connection: &Connection, query: impl Into<String>) -> Self {
        Self {
            connection: serde_json::to_value(connection).ok(),
            query: Some(query.into()),
        }
    }

    pub fn validate(self) -> Result<(Connection, String), RequestError> {
        let connection = match self.connection {
            Some(Value::Null) | None => return Err(RequestError::MissingParameters),
            Some(value) => value,
        };
        let query = match self.query {
            Some(q) if !q.trim().is_empty() => q,
            _ => return Err(RequestError::MissingParameters),
        };
        Ok((Connection::from_value(connection)?, query))
    }
}

/// Body of `POST /api/connect`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ConnectRequest {
    #[serde(rename = "type", default)]
    pub db_type: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default, alias = "user")]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

impl ConnectRequest {
    pub fn into_connection(self) -> Result<Connection, RequestError> {
        let db_type = self
            .db_type
            .as_deref()
            .ok_or(RequestError::UnsupportedType)?
            .parse::<DatabaseType>()?;

        let connection = Connection {
            id: generate_id(),
            name: String::new(),
            db_type,
            host: self.host.unwrap_or_else(|| "localhost".to_string()),
            port: self.port.unwrap_or_else(|| db_type.default_port()),
            database: self.database,
            username: self.username,
            password: self.password,
            uri: self.uri.filter(|u| !u.trim().is_empty()),
        };
        connection.validate()?;
        Ok(connection)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum ConnectResponse {
    Connected { success: bool, message: String },
    Failed { error: String },
}

impl ConnectResponse {
    pub fn connected(message: impl Into<String>) -> Self {
        ConnectResponse::Connected {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        ConnectResponse::Failed {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn connection_accepts_ui_shape() {
        let conn = Connection::from_value(json!({
            "id": "1700000000000",
            "name": "local pg",
            "type": "postgresql",
            "host": "localhost",
            "port": 5432,
            "database": "app",
            "username": "postgres",
            "password": "secret"
        }))
        .unwrap();

        assert_eq!(conn.db_type, DatabaseType::PostgreSql);
        assert_eq!(conn.database_name(), Some("app"));
        assert_eq!(conn.password(), Some("secret"));
    }

    #[test]
    fn unknown_type_is_unsupported_not_invalid() {
        let err = Connection::from_value(json!({
            "type": "cassandra",
            "host": "localhost",
            "port": 9042
        }))
        .unwrap_err();
        assert_eq!(err, RequestError::UnsupportedType);
    }

    #[test]
    fn zero_port_and_blank_host_are_rejected() {
        let err = Connection::from_value(json!({"type": "redis", "host": "db", "port": 0}))
            .unwrap_err();
        assert!(matches!(err, RequestError::InvalidConnection(_)));

        let err = Connection::from_value(json!({"type": "redis", "host": "  ", "port": 6379}))
            .unwrap_err();
        assert!(matches!(err, RequestError::InvalidConnection(_)));
    }

    #[test]
    fn blank_optional_fields_read_as_unset() {
        let conn = Connection::from_value(json!({
            "type": "mongodb",
            "host": "localhost",
            "port": 27017,
            "database": "",
            "username": " ",
            "password": ""
        }))
        .unwrap();
        assert_eq!(conn.database_name(), None);
        assert_eq!(conn.username(), None);
        assert_eq!(conn.password(), None);
    }

    #[test]
    fn missing_query_wins_over_bad_connection() {
        let request = ExecuteRequest {
            connection: Some(json!({"type": "oracle"})),
            query: Some("   ".into()),
        };
        assert_eq!(request.validate().unwrap_err(), RequestError::MissingParameters);

        let request = ExecuteRequest {
            connection: None,
            query: Some("SELECT 1".into()),
        };
        assert_eq!(request.validate().unwrap_err(), RequestError::MissingParameters);
    }

    #[test]
    fn query_result_serializes_camel_case_and_skips_absent_fields() {
        let failed = serde_json::to_value(QueryResult::failed("boom", 12)).unwrap();
        assert_eq!(
            failed,
            json!({"success": false, "error": "boom", "executionTime": 12})
        );

        let mut record = Record::new();
        record.insert("value".into(), json!(1));
        let ok = serde_json::to_value(QueryResult::completed(QueryOutput::single(record), 3))
            .unwrap();
        assert_eq!(ok["rowCount"], json!(1));
        assert_eq!(ok["columns"], json!(["value"]));
        assert!(ok.get("error").is_none());
    }

    #[test]
    fn connect_request_fills_defaults() {
        let request: ConnectRequest = serde_json::from_value(json!({
            "type": "postgres",
            "user": "admin",
            "password": "pw"
        }))
        .unwrap();
        let conn = request.into_connection().unwrap();
        assert_eq!(conn.db_type, DatabaseType::PostgreSql);
        assert_eq!(conn.host, "localhost");
        assert_eq!(conn.port, 5432);
        assert_eq!(conn.username(), Some("admin"));
    }

    #[test]
    fn connect_response_shapes() {
        assert_eq!(
            serde_json::to_value(ConnectResponse::connected("Connected to Redis")).unwrap(),
            json!({"success": true, "message": "Connected to Redis"})
        );
        assert_eq!(
            serde_json::to_value(ConnectResponse::failed("refused")).unwrap(),
            json!({"error": "refused"})
        );
    }
}
