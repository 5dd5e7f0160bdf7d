//! Command-line grammar for the key-value engine: whitespace separated
//! tokens, the first one a case-insensitive command name.

use async_trait::async_trait;
use serde_json::Value;
use std::str::FromStr;

use crate::error::DbError;
use crate::models::{QueryOutput, Record};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvCommand {
    Get { key: String },
    Set { key: String, value: String },
    Del { keys: Vec<String> },
    Keys { pattern: String },
    HGetAll { key: String },
    HGet { key: String, field: String },
    HSet { key: String, field: String, value: String },
}

fn arg(
    args: &[&str],
    index: usize,
    command: &'static str,
    argument: &'static str,
) -> Result<String, DbError> {
    args.get(index)
        .map(|s| s.to_string())
        .ok_or(DbError::MissingArgument { command, argument })
}

impl FromStr for KvCommand {
    type Err = DbError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_whitespace();
        let name = tokens.next().unwrap_or_default().to_uppercase();
        let args: Vec<&str> = tokens.collect();

        let command = match name.as_str() {
            "GET" => KvCommand::Get {
                key: arg(&args, 0, "GET", "a key")?,
            },
            "SET" => {
                let key = arg(&args, 0, "SET", "a key")?;
                if args.len() < 2 {
                    return Err(DbError::MissingArgument {
                        command: "SET",
                        argument: "a value",
                    });
                }
                KvCommand::Set {
                    key,
                    value: args[1..].join(" "),
                }
            }
            "DEL" => {
                if args.is_empty() {
                    return Err(DbError::MissingArgument {
                        command: "DEL",
                        argument: "at least one key",
                    });
                }
                KvCommand::Del {
                    keys: args.iter().map(|s| s.to_string()).collect(),
                }
            }
            "KEYS" => KvCommand::Keys {
                pattern: args.first().copied().unwrap_or("*").to_string(),
            },
            "HGETALL" => KvCommand::HGetAll {
                key: arg(&args, 0, "HGETALL", "a key")?,
            },
            "HGET" => KvCommand::HGet {
                key: arg(&args, 0, "HGET", "a key")?,
                field: arg(&args, 1, "HGET", "a field")?,
            },
            "HSET" => KvCommand::HSet {
                key: arg(&args, 0, "HSET", "a key")?,
                field: arg(&args, 1, "HSET", "a field")?,
                value: arg(&args, 2, "HSET", "a value")?,
            },
            _ => return Err(DbError::UnsupportedCommand(name)),
        };
        Ok(command)
    }
}

/// Native calls a key-value engine must offer.
#[async_trait]
pub trait KeyValueStore: Send {
    async fn get(&mut self, key: &str) -> Result<Option<String>, DbError>;

    /// Returns the engine's status reply, `OK` on success.
    async fn set(&mut self, key: &str, value: &str) -> Result<String, DbError>;

    async fn del(&mut self, keys: &[String]) -> Result<i64, DbError>;

    async fn keys(&mut self, pattern: &str) -> Result<Vec<String>, DbError>;

    /// Field/value pairs in the order the server sent them.
    async fn hgetall(&mut self, key: &str) -> Result<Vec<(String, String)>, DbError>;

    async fn hget(&mut self, key: &str, field: &str) -> Result<Option<String>, DbError>;

    /// Returns the number of fields that were added.
    async fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<i64, DbError>;
}

/// Shape of a native reply before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum KvReply {
    Scalar(Value),
    List(Vec<Value>),
    Map(Record),
}

impl KvReply {
    /// Sequences become one `{value}` row per element, mappings a single row
    /// keyed by their own fields, scalars (null included) a single `{value}` row.
    pub fn into_output(self) -> QueryOutput {
        match self {
            KvReply::List(items) => {
                let data = items.into_iter().map(value_record).collect();
                QueryOutput::from_records(data, vec!["value".to_string()])
            }
            KvReply::Map(record) => QueryOutput::single(record),
            KvReply::Scalar(value) => QueryOutput::single(value_record(value)),
        }
    }
}

fn value_record(value: Value) -> Record {
    let mut record = Record::new();
    record.insert("value".to_string(), value);
    record
}

fn optional(value: Option<String>) -> Value {
    value.map(Value::String).unwrap_or(Value::Null)
}

impl KvCommand {
    pub async fn apply<S>(self, store: &mut S) -> Result<KvReply, DbError>
    where
        S: KeyValueStore + ?Sized,
    {
        let reply = match self {
            KvCommand::Get { key } => KvReply::Scalar(optional(store.get(&key).await?)),
            KvCommand::Set { key, value } => {
                KvReply::Scalar(Value::String(store.set(&key, &value).await?))
            }
            KvCommand::Del { keys } => KvReply::Scalar(Value::from(store.del(&keys).await?)),
            KvCommand::Keys { pattern } => KvReply::List(
                store
                    .keys(&pattern)
                    .await?
                    .into_iter()
                    .map(Value::String)
                    .collect(),
            ),
            KvCommand::HGetAll { key } => KvReply::Map(
                store
                    .hgetall(&key)
                    .await?
                    .into_iter()
                    .map(|(field, value)| (field, Value::String(value)))
                    .collect(),
            ),
            KvCommand::HGet { key, field } => {
                KvReply::Scalar(optional(store.hget(&key, &field).await?))
            }
            KvCommand::HSet { key, field, value } => {
                KvReply::Scalar(Value::from(store.hset(&key, &field, &value).await?))
            }
        };
        Ok(reply)
    }
}

/// Parses `line` and runs it against `store`.
pub async fn execute<S>(store: &mut S, line: &str) -> Result<QueryOutput, DbError>
where
    S: KeyValueStore + ?Sized,
{
    let command: KvCommand = line.parse()?;
    Ok(command.apply(store).await?.into_output())
}


#[cfg(test)]
mod tests {
    use super::memory::{Entry, MemoryKv};
    use super::*;
    use serde_json::json;

    #[test]
    fn command_name_is_case_insensitive() {
        assert_eq!(
            "get  user:1".parse::<KvCommand>().unwrap(),
            KvCommand::Get { key: "user:1".into() }
        );
    }

    #[test]
    fn set_rejoins_value_tokens_with_single_spaces() {
        assert_eq!(
            "SET k   v1\tv2".parse::<KvCommand>().unwrap(),
            KvCommand::Set {
                key: "k".into(),
                value: "v1 v2".into()
            }
        );
    }

    #[test]
    fn keys_pattern_defaults_to_star() {
        assert_eq!(
            "KEYS".parse::<KvCommand>().unwrap(),
            KvCommand::Keys { pattern: "*".into() }
        );
    }

    #[test]
    fn unsupported_command_is_named() {
        let err = "FOO bar".parse::<KvCommand>().unwrap_err();
        assert!(err.to_string().contains("FOO"));
    }

    #[test]
    fn missing_arguments_are_errors() {
        assert!(matches!(
            "HGET user".parse::<KvCommand>().unwrap_err(),
            DbError::MissingArgument { command: "HGET", .. }
        ));
        assert!("DEL".parse::<KvCommand>().is_err());
        assert!("SET k".parse::<KvCommand>().is_err());
    }

    #[tokio::test]
    async fn set_stores_multi_token_value() {
        let mut kv = MemoryKv::default();
        let output = execute(&mut kv, "SET k v1 v2").await.unwrap();
        assert_eq!(output.data[0]["value"], json!("OK"));
        assert!(matches!(kv.entries.get("k"), Some(Entry::Str(s)) if s == "v1 v2"));

        let output = execute(&mut kv, "get k").await.unwrap();
        assert_eq!(output.data[0]["value"], json!("v1 v2"));
    }

    #[tokio::test]
    async fn get_missing_key_is_a_null_row() {
        let mut kv = MemoryKv::default();
        let output = execute(&mut kv, "GET missing").await.unwrap();
        assert_eq!(output.row_count, 1);
        assert_eq!(output.columns, vec!["value"]);
        assert_eq!(output.data[0]["value"], Value::Null);
    }

    #[tokio::test]
    async fn keys_become_one_row_each() {
        let mut kv = MemoryKv::default();
        execute(&mut kv, "SET user:1 a").await.unwrap();
        execute(&mut kv, "SET user:2 b").await.unwrap();
        execute(&mut kv, "SET order:1 c").await.unwrap();

        let output = execute(&mut kv, "KEYS user:*").await.unwrap();
        assert_eq!(output.columns, vec!["value"]);
        assert_eq!(output.row_count, 2);
        assert_eq!(output.data[1]["value"], json!("user:2"));
    }

    #[tokio::test]
    async fn hash_reply_is_one_row_keyed_by_field() {
        let mut kv = MemoryKv::default();
        let output = execute(&mut kv, "HSET user:1 name Ada").await.unwrap();
        assert_eq!(output.data[0]["value"], json!(1));
        execute(&mut kv, "HSET user:1 email ada@example.com").await.unwrap();

        let output = execute(&mut kv, "HGETALL user:1").await.unwrap();
        assert_eq!(output.row_count, 1);
        assert_eq!(output.columns, vec!["name", "email"]);
        assert_eq!(output.data[0]["name"], json!("Ada"));

        let output = execute(&mut kv, "HGET user:1 name").await.unwrap();
        assert_eq!(output.data[0]["value"], json!("Ada"));
    }

    #[tokio::test]
    async fn empty_hash_is_a_single_empty_row() {
        let mut kv = MemoryKv::default();
        let output = execute(&mut kv, "HGETALL nothing").await.unwrap();
        assert_eq!(output.row_count, 1);
        assert!(output.columns.is_empty());
    }

    #[tokio::test]
    async fn del_counts_removed_keys() {
        let mut kv = MemoryKv::default();
        execute(&mut kv, "SET a 1").await.unwrap();
        execute(&mut kv, "SET b 2").await.unwrap();
        let output = execute(&mut kv, "DEL a b c").await.unwrap();
        assert_eq!(output.data[0]["value"], json!(2));
    }

    #[tokio::test]
    async fn hash_fields_keep_reply_order() {
        let mut kv = MemoryKv::default();
        kv.entries.insert(
            "user:2".into(),
            Entry::Hash(vec![
                ("zip".into(), "10115".into()),
                ("city".into(), "Berlin".into()),
                ("age".into(), "36".into()),
            ]),
        );
        let output = execute(&mut kv, "HGETALL user:2").await.unwrap();
        assert_eq!(output.columns, vec!["zip", "city", "age"]);
        assert_eq!(
            output.data[0].keys().collect::<Vec<_>>(),
            vec!["zip", "city", "age"]
        );
    }
}
