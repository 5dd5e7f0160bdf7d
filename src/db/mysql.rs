use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlQueryResult, MySqlRow};
use sqlx::{Column, Connection, Decode, Executor, MySql, Row, Statement, Type, TypeInfo};

use crate::db::{sql, Engine};
use crate::error::DbError;
use crate::models::{Connection as ConnectionProfile, QueryOutput};

/// Relational engine backed by a single, unpooled MySQL connection.
#[derive(Debug, Default, Clone)]
pub struct MySqlEngine;

impl MySqlEngine {
    pub fn new() -> Self {
        Self
    }

    fn options(profile: &ConnectionProfile) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&profile.host)
            .port(profile.port);
        if let Some(user) = profile.username() {
            options = options.username(user);
        }
        if let Some(password) = profile.password() {
            options = options.password(password);
        }
        if let Some(database) = profile.database_name() {
            options = options.database(database);
        }
        options
    }
}

#[async_trait]
impl Engine for MySqlEngine {
    type Session = MySqlConnection;
    const NAME: &'static str = "MySQL";

    async fn open(&self, profile: &ConnectionProfile) -> Result<MySqlConnection, DbError> {
        Ok(MySqlConnection::connect_with(&Self::options(profile)).await?)
    }

    async fn probe(&self, session: &mut MySqlConnection) -> Result<(), DbError> {
        Ok(session.ping().await?)
    }

    async fn run(&self, session: &mut MySqlConnection, query: &str) -> Result<QueryOutput, DbError> {
        let statement = (&mut *session).prepare(query).await?;
        let columns = sql::column_names(statement.columns());
        let stream = session.fetch_many(statement.query());
        sql::collect::<MySql, _>(stream, columns, MySqlQueryResult::rows_affected, map_mysql_value).await
    }

    async fn close(&self, session: MySqlConnection) -> Result<(), DbError> {
        Ok(session.close().await?)
    }
}

fn try_decode<'r, T>(row: &'r MySqlRow, index: usize) -> Option<Option<T>>
where
    T: Decode<'r, MySql> + Type<MySql>,
{
    row.try_get::<Option<T>, _>(index).ok()
}

fn render<T: Serialize>(value: Option<T>) -> Value {
    value
        .and_then(|v| serde_json::to_value(v).ok())
        .unwrap_or(Value::Null)
}

fn bytes_value(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(s) => Value::String(s),
        Err(e) => Value::String(format!("<{} bytes>", e.as_bytes().len())),
    }
}

fn map_mysql_value(row: &MySqlRow, index: usize) -> Value {
    let type_info = row.column(index).type_info();
    let type_name = type_info.name();

    let decoded = match type_name {
        "BOOLEAN" => try_decode::<bool>(row, index).map(render),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            try_decode::<i64>(row, index).map(render)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" | "YEAR" => try_decode::<u64>(row, index).map(render),
        "FLOAT" | "DOUBLE" => try_decode::<f64>(row, index)
            .map(render)
            .or_else(|| try_decode::<f32>(row, index).map(render)),
        "DECIMAL" => try_decode::<BigDecimal>(row, index).map(|d| render(d.map(|d| d.to_string()))),
        "DATETIME" => {
            try_decode::<NaiveDateTime>(row, index).map(|t| render(t.map(|t| t.to_string())))
        }
        "TIMESTAMP" => {
            try_decode::<DateTime<Utc>>(row, index).map(|t| render(t.map(|t| t.to_rfc3339())))
        }
        "DATE" => try_decode::<NaiveDate>(row, index).map(|d| render(d.map(|d| d.to_string()))),
        "TIME" => try_decode::<NaiveTime>(row, index).map(|t| render(t.map(|t| t.to_string()))),
        "JSON" => try_decode::<Value>(row, index).map(|v| v.unwrap_or(Value::Null)),
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" => {
            try_decode::<Vec<u8>>(row, index).map(|b| b.map(bytes_value).unwrap_or(Value::Null))
        }
        _ => None,
    };

    decoded.unwrap_or_else(|| fallback_value(row, index, type_name))
}

/// Text first, then raw bytes, then a `<TYPE>` placeholder.
fn fallback_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    if let Some(s) = try_decode::<String>(row, index) {
        return render(s);
    }
    match try_decode::<Vec<u8>>(row, index) {
        Some(Some(bytes)) => bytes_value(bytes),
        Some(None) => Value::Null,
        None => Value::String(format!("<{type_name}>")),
    }
}
