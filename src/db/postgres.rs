use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use ipnetwork::IpNetwork;
use mac_address::MacAddress;
use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::types::PgMoney;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgQueryResult, PgRow};
use sqlx::{Column, Connection, Decode, Executor, Postgres, Row, Statement, Type, TypeInfo};
use uuid::Uuid;

use crate::db::{sql, Engine};
use crate::error::DbError;
use crate::models::{Connection as ConnectionProfile, QueryOutput};

/// Relational engine backed by a single, unpooled PostgreSQL connection.
#[derive(Debug, Default, Clone)]
pub struct PostgresEngine;

impl PostgresEngine {
    pub fn new() -> Self {
        Self
    }

    fn options(profile: &ConnectionProfile) -> PgConnectOptions {
        let mut options = PgConnectOptions::new()
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
impl Engine for PostgresEngine {
    type Session = PgConnection;
    const NAME: &'static str = "PostgreSQL";

    async fn open(&self, profile: &ConnectionProfile) -> Result<PgConnection, DbError> {
        Ok(PgConnection::connect_with(&Self::options(profile)).await?)
    }

    async fn probe(&self, session: &mut PgConnection) -> Result<(), DbError> {
        Ok(session.ping().await?)
    }

    // The statement text is trusted and sent verbatim: this is a developer tool,
    // not a multi-tenant service.
    async fn run(&self, session: &mut PgConnection, query: &str) -> Result<QueryOutput, DbError> {
        let statement = (&mut *session).prepare(query).await?;
        let columns = sql::column_names(statement.columns());
        let stream = session.fetch_many(statement.query());
        sql::collect::<Postgres, _>(stream, columns, PgQueryResult::rows_affected, map_postgres_value).await
    }

    async fn close(&self, session: PgConnection) -> Result<(), DbError> {
        Ok(session.close().await?)
    }
}

fn decode_as<'r, T>(row: &'r PgRow, index: usize, render: impl FnOnce(T) -> Value) -> Value
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    match row.try_get::<Option<T>, _>(index) {
        Ok(Some(v)) => render(v),
        _ => Value::Null,
    }
}

fn plain<T: Serialize>(v: T) -> Value {
    serde_json::to_value(v).unwrap_or(Value::Null)
}

fn text<T: ToString>(v: T) -> Value {
    Value::String(v.to_string())
}

fn hex(bytes: Vec<u8>) -> Value {
    let digits: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    Value::String(format!("\\x{digits}"))
}

fn map_postgres_value(row: &PgRow, index: usize) -> Value {
    let type_info = row.column(index).type_info();
    let type_name = type_info.name();

    match type_name {
        "BOOL" => decode_as::<bool>(row, index, plain),
        "INT2" => decode_as::<i16>(row, index, plain),
        "INT4" => decode_as::<i32>(row, index, plain),
        "INT8" => decode_as::<i64>(row, index, plain),
        "OID" => decode_as::<sqlx::postgres::types::Oid>(row, index, |oid| plain(oid.0)),
        "FLOAT4" => decode_as::<f32>(row, index, plain),
        "FLOAT8" => decode_as::<f64>(row, index, plain),
        // Exact decimals travel as strings so no precision is lost in JSON.
        "NUMERIC" => decode_as::<BigDecimal>(row, index, text),
        "MONEY" => decode_as::<PgMoney>(row, index, |m| {
            Value::String(format!("${:.2}", m.0 as f64 / 100.0))
        }),
        "TEXT" | "VARCHAR" | "CHAR" | "NAME" | "BPCHAR" | "CITEXT" => {
            decode_as::<String>(row, index, Value::String)
        }
        "UUID" => decode_as::<Uuid>(row, index, text),
        "TIMESTAMPTZ" => decode_as::<DateTime<Utc>>(row, index, |t| Value::String(t.to_rfc3339())),
        "TIMESTAMP" => decode_as::<NaiveDateTime>(row, index, text),
        "DATE" => decode_as::<NaiveDate>(row, index, text),
        "TIME" => decode_as::<NaiveTime>(row, index, text),
        "JSON" | "JSONB" => decode_as::<Value>(row, index, |v| v),
        "INET" | "CIDR" => decode_as::<IpNetwork>(row, index, text),
        "MACADDR" => decode_as::<MacAddress>(row, index, text),
        "BYTEA" => decode_as::<Vec<u8>>(row, index, hex),
        "BOOL[]" | "_bool" => decode_as::<Vec<bool>>(row, index, plain),
        "INT2[]" | "_int2" => decode_as::<Vec<i16>>(row, index, plain),
        "INT4[]" | "_int4" => decode_as::<Vec<i32>>(row, index, plain),
        "INT8[]" | "_int8" => decode_as::<Vec<i64>>(row, index, plain),
        "FLOAT4[]" | "_float4" => decode_as::<Vec<f32>>(row, index, plain),
        "FLOAT8[]" | "_float8" => decode_as::<Vec<f64>>(row, index, plain),
        "TEXT[]" | "VARCHAR[]" | "CHAR[]" | "NAME[]" | "BPCHAR[]" | "_text" | "_varchar"
        | "_char" | "_name" | "_bpchar" => decode_as::<Vec<String>>(row, index, plain),
        "UUID[]" | "_uuid" => decode_as::<Vec<Uuid>>(row, index, |ids| {
            Value::Array(ids.into_iter().map(text).collect())
        }),
        "JSON[]" | "JSONB[]" | "_json" | "_jsonb" => decode_as::<Vec<Value>>(row, index, Value::Array),
        _ => fallback_value(row, index, type_name),
    }
}

/// Enums, domains and anything else without a dedicated decoder: try text,
/// then the raw wire bytes, then a `<TYPE>` placeholder.
fn fallback_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    use sqlx::ValueRef;

    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(index) {
        return Value::String(s);
    }
    let Ok(raw) = row.try_get_raw(index) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }
    match raw.as_bytes().map(std::str::from_utf8) {
        Ok(Ok(s)) => Value::String(s.to_string()),
        _ => Value::String(format!("<{type_name}>")),
    }
}
