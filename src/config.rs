use clap::Parser;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::logging::LogFormat;

/// unidb: one query endpoint for PostgreSQL, MySQL, MongoDB and Redis
#[derive(Parser, Debug, Default)]
#[command(name = "unidb")]
#[command(about = "Universal database IDE backend", long_about = None)]
pub struct CliArgs {
    /// Config file (defaults to ./unidb.toml or /etc/unidb/unidb.toml)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Address to bind
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Port to bind
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Log level or filter directive, e.g. `debug` or `unidb_lib=trace`
    #[arg(long)]
    pub log_level: Option<String>,

    /// `compact` or `json`
    #[arg(long)]
    pub log_format: Option<String>,
}

/// Engine level knobs. Only the document engine carries its own timeouts;
/// the others rely on driver defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_server_selection_timeout_ms")]
    pub document_server_selection_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub document_connect_timeout_ms: u64,
    #[serde(default = "default_document_database")]
    pub document_default_database: String,
    #[serde(default = "default_auth_source")]
    pub document_auth_source: String,
}

fn default_server_selection_timeout_ms() -> u64 {
    5_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_document_database() -> String {
    "testdb".to_string()
}

fn default_auth_source() -> String {
    "admin".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            document_server_selection_timeout_ms: default_server_selection_timeout_ms(),
            document_connect_timeout_ms: default_connect_timeout_ms(),
            document_default_database: default_document_database(),
            document_auth_source: default_auth_source(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default)]
    pub engines: EngineConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            engines: EngineConfig::default(),
        }
    }
}

const CONFIG_PATHS: [&str; 2] = ["./unidb.toml", "/etc/unidb/unidb.toml"];

impl ServerConfig {
    /// Priority: CLI args > `UNIDB_*` env > config file > defaults.
    pub fn load(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        match &args.config {
            Some(path) => builder = builder.add_source(File::from(path.as_path())),
            None => {
                if let Some(path) = CONFIG_PATHS.iter().find(|p| Path::new(p).exists()) {
                    builder = builder.add_source(File::with_name(path));
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("UNIDB")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let base: ServerConfig = builder.build()?.try_deserialize()?;
        Ok(base.with_overrides(args))
    }

    fn with_overrides(self, args: &CliArgs) -> Self {
        ServerConfig {
            host: args.host.clone().unwrap_or(self.host),
            port: args.port.unwrap_or(self.port),
            log_level: args.log_level.clone().unwrap_or(self.log_level),
            log_format: args.log_format.clone().unwrap_or(self.log_format),
            engines: self.engines,
        }
    }

    pub fn log_format(&self) -> LogFormat {
        LogFormat::from_str(&self.log_format)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
