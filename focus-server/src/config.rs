//! Server configuration: CLI flags, then `FOCUS_*` environment variables,
//! then `~/.config/focus-server/config.toml`, then compiled defaults.

use std::path::PathBuf;

use focus::config::{ConfigError, read_config_file};
use focus_proto::task::MAX_TASK_TEXT_LENGTH;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_SESSION_LIST_LIMIT: usize = 100;

/// On-disk shape of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFile {
    server: ServerSection,
}

/// `[server]` table.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerSection {
    bind_addr: Option<String>,
    session_list_limit: Option<usize>,
    max_text_length: Option<usize>,
}

/// Command-line flags of `focus-server`.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Focus sync server")]
pub struct ServerCliArgs {
    /// Listen address, e.g. `127.0.0.1:8080`.
    #[arg(short, long, env = "FOCUS_BIND")]
    pub bind: Option<String>,

    /// Config file to read instead of the default location.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Sessions returned per listing, newest first.
    #[arg(long, env = "FOCUS_SESSION_LIST_LIMIT")]
    pub session_list_limit: Option<usize>,

    /// Longest accepted task text, in characters (at most 256).
    #[arg(long)]
    pub max_text_length: Option<usize>,

    /// Tracing filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info", env = "FOCUS_SERVER_LOG")]
    pub log_level: String,
}

/// Resolved settings the server runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub session_list_limit: usize,
    /// Never above [`MAX_TASK_TEXT_LENGTH`].
    pub max_text_length: usize,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            session_list_limit: DEFAULT_SESSION_LIST_LIMIT,
            max_text_length: MAX_TASK_TEXT_LENGTH,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Reads the config file named by `cli` (or the default one) and layers
    /// `cli` over it.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] if an explicit `--config` file is missing, or any
    /// config file cannot be read or parsed.
    pub fn load(cli: &ServerCliArgs) -> Result<Self, ConfigError> {
        let file: ServerFile = read_config_file(cli.config.as_deref(), "focus-server")?;
        Ok(Self::merge(cli, file.server))
    }

    fn merge(cli: &ServerCliArgs, file: ServerSection) -> Self {
        Self {
            bind_addr: cli
                .bind
                .clone()
                .or(file.bind_addr)
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            session_list_limit: cli
                .session_list_limit
                .or(file.session_list_limit)
                .unwrap_or(DEFAULT_SESSION_LIST_LIMIT),
            max_text_length: cli
                .max_text_length
                .or(file.max_text_length)
                .map_or(MAX_TASK_TEXT_LENGTH, |n| n.min(MAX_TASK_TEXT_LENGTH)),
            log_level: cli.log_level.clone(),
        }
    }
}
