//! Argv-style command surface
//!
//! Parses `["SCACHE.GETVALUE", "orders", "SELECT ..."]` style argument
//! vectors into typed commands and runs them against the engine. Command
//! names are case-insensitive.

use serde::Serialize;

use crate::backend::ConnectionParams;
use crate::engine::{CacheEngine, CacheInfo, NewCacheDefinition};
use crate::error::{CacheError, Result};
use crate::models::{
    DeleteResponse, FlushResponse, ListResponse, MetaResponse, TestResponse, ValueResponse,
};

// == Command ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create(NewCacheDefinition),
    List,
    Info(String),
    Test(String),
    Flush(String),
    Delete(String),
    GetValue { name: String, query: String },
    GetMeta { name: String, query: String },
}

impl Command {
    /// Parses an argument vector whose first element is the command name.
    pub fn parse(args: &[String]) -> Result<Self> {
        let (name, rest) = args
            .split_first()
            .ok_or_else(|| CacheError::InvalidRequest("empty command".to_string()))?;
        let command = name.to_ascii_lowercase();

        let arity = |expected: usize| -> Result<()> {
            if rest.len() == expected {
                Ok(())
            } else {
                Err(CacheError::WrongArity(command.clone()))
            }
        };

        match command.as_str() {
            "scache.create" => {
                arity(7)?;
                Ok(Command::Create(NewCacheDefinition {
                    name: rest[0].clone(),
                    ttl: parse_ttl(&rest[1])?,
                    params: ConnectionParams {
                        host: rest[2].clone(),
                        port: parse_port(&rest[3])?,
                        database: rest[4].clone(),
                        user: rest[5].clone(),
                        password: rest[6].clone(),
                    },
                }))
            }
            "scache.list" => {
                arity(0)?;
                Ok(Command::List)
            }
            "scache.info" => {
                arity(1)?;
                Ok(Command::Info(rest[0].clone()))
            }
            "scache.test" => {
                arity(1)?;
                Ok(Command::Test(rest[0].clone()))
            }
            "scache.flush" => {
                arity(1)?;
                Ok(Command::Flush(rest[0].clone()))
            }
            "scache.delete" => {
                arity(1)?;
                Ok(Command::Delete(rest[0].clone()))
            }
            "scache.getvalue" | "scache.get" => {
                arity(2)?;
                Ok(Command::GetValue {
                    name: rest[0].clone(),
                    query: rest[1].clone(),
                })
            }
            "scache.getmeta" => {
                arity(2)?;
                Ok(Command::GetMeta {
                    name: rest[0].clone(),
                    query: rest[1].clone(),
                })
            }
            _ => Err(CacheError::InvalidRequest(format!(
                "unknown command '{}'",
                name
            ))),
        }
    }
}

fn parse_ttl(raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(ttl) if ttl > 0 => Ok(ttl),
        _ => Err(CacheError::InvalidConfig("invalid default TTL".to_string())),
    }
}

fn parse_port(raw: &str) -> Result<u16> {
    match raw.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(CacheError::InvalidConfig("invalid dbport number".to_string())),
    }
}

// == Reply ==
/// Reply body for a command. Each variant serializes as its REST counterpart.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CommandReply {
    Info(CacheInfo),
    List(ListResponse),
    Test(TestResponse),
    Flush(FlushResponse),
    Delete(DeleteResponse),
    Value(ValueResponse),
    Meta(MetaResponse),
}

/// Runs a parsed command against the engine.
pub async fn execute(engine: &CacheEngine, command: Command) -> Result<CommandReply> {
    let reply = match command {
        Command::Create(new_definition) => CommandReply::Info(engine.create(new_definition).await?),
        Command::List => CommandReply::List(ListResponse {
            caches: engine.list(),
        }),
        Command::Info(name) => CommandReply::Info(engine.info(&name)?),
        Command::Test(name) => {
            let alive = engine.test(&name).await?;
            CommandReply::Test(TestResponse { name, alive })
        }
        Command::Flush(name) => {
            let removed = engine.flush(&name).await?;
            CommandReply::Flush(FlushResponse { name, removed })
        }
        Command::Delete(name) => {
            let removed = engine.delete(&name).await?;
            CommandReply::Delete(DeleteResponse::new(name, removed))
        }
        Command::GetValue { name, query } => {
            let rows = engine.get_value(&name, &query).await?;
            CommandReply::Value(ValueResponse { name, query, rows })
        }
        Command::GetMeta { name, query } => {
            let columns = engine.get_meta(&name, &query).await?;
            CommandReply::Meta(MetaResponse {
                name,
                query,
                columns,
            })
        }
    };
    Ok(reply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tokio::sync::RwLock;

    use crate::backend::{Column, MemoryBackend};
    use crate::config::Config;
    use crate::kv::KvStore;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn create_argv(name: &str) -> Vec<String> {
        argv(&[
            "SCACHE.CREATE",
            name,
            "60",
            "db.local",
            "3306",
            "shop",
            "ro",
            "pw",
        ])
    }

    #[test]
    fn test_parse_create() {
        let command = tokio_test::assert_ok!(Command::parse(&create_argv("orders")));
        match command {
            Command::Create(new_definition) => {
                assert_eq!(new_definition.name, "orders");
                assert_eq!(new_definition.ttl, 60);
                assert_eq!(new_definition.params.host, "db.local");
                assert_eq!(new_definition.params.port, 3306);
                assert_eq!(new_definition.params.database, "shop");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(Command::parse(&argv(&["scache.list"])).unwrap(), Command::List);
        assert_eq!(
            Command::parse(&argv(&["Scache.Get", "orders", "SELECT 1"])).unwrap(),
            Command::GetValue {
                name: "orders".to_string(),
                query: "SELECT 1".to_string()
            }
        );
    }

    #[test]
    fn test_parse_wrong_arity() {
        let err = Command::parse(&argv(&["SCACHE.GETVALUE", "orders"])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "ERR wrong number of arguments for 'scache.getvalue' command"
        );

        let err = tokio_test::assert_err!(Command::parse(&argv(&["SCACHE.LIST", "extra"])));
        assert!(matches!(err, CacheError::WrongArity(_)));

        let err = Command::parse(&argv(&["SCACHE.CREATE", "orders", "60"])).unwrap_err();
        assert!(matches!(err, CacheError::WrongArity(_)));
    }

    #[test]
    fn test_parse_bad_numbers() {
        let mut args = create_argv("orders");
        args[2] = "soon".to_string();
        assert_eq!(
            Command::parse(&args),
            Err(CacheError::InvalidConfig("invalid default TTL".to_string()))
        );

        let mut args = create_argv("orders");
        args[4] = "70000".to_string();
        assert_eq!(
            Command::parse(&args),
            Err(CacheError::InvalidConfig("invalid dbport number".to_string()))
        );
    }

    #[test]
    fn test_parse_unknown_and_empty() {
        assert!(matches!(
            Command::parse(&argv(&["SCACHE.NOPE"])),
            Err(CacheError::InvalidRequest(_))
        ));
        assert!(matches!(
            Command::parse(&[]),
            Err(CacheError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_roundtrip() {
        let backend = MemoryBackend::new();
        backend.set_result(
            "SELECT id FROM orders",
            vec![Column::new("id", 3)],
            vec![vec![Some("1".to_string())], vec![Some("2".to_string())]],
        );
        let kv = Arc::new(RwLock::new(KvStore::new()));
        let engine = CacheEngine::new(Arc::new(backend.clone()), kv, &Config::default());

        let command = Command::parse(&create_argv("orders")).unwrap();
        execute(&engine, command).await.unwrap();

        let command = Command::parse(&argv(&["SCACHE.GET", "orders", "SELECT id FROM orders"]))
            .unwrap();
        let reply = execute(&engine, command).await.unwrap();
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["rows"], serde_json::json!(["1", "2"]));

        let command = Command::parse(&argv(&["SCACHE.FLUSH", "orders"])).unwrap();
        let json = serde_json::to_value(execute(&engine, command).await.unwrap()).unwrap();
        assert_eq!(json["removed"], 2);

        let command = Command::parse(&argv(&["SCACHE.INFO", "orders"])).unwrap();
        let json = serde_json::to_value(execute(&engine, command).await.unwrap()).unwrap();
        assert_eq!(json["password"], crate::backend::REDACTED);
    }
}
