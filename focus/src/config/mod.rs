//! Configuration for the `focus` client.
//!
//! Layered with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/focus/config.toml`)
//! 4. Compiled defaults
//!
//! A missing default config file is not an error. An explicit `--config`
//! path that doesn't exist is.

use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::tasks::DEFAULT_STORE_TIMEOUT;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// The server URL is not a usable http(s) URL.
    #[error("invalid server url {url}: {reason}")]
    InvalidServerUrl {
        /// The configured value.
        url: String,
        /// What is wrong with it.
        reason: String,
    },
}

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    sync: SyncFileConfig,
    storage: StorageFileConfig,
}

/// `[sync]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SyncFileConfig {
    server_url: Option<String>,
    owner: Option<String>,
    store_timeout_secs: Option<u64>,
    channel_capacity: Option<usize>,
}

/// `[storage]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct StorageFileConfig {
    data_file: Option<PathBuf>,
    session_list_limit: Option<usize>,
}

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the synced-mode server (`http://host:port`).
    pub server_url: Option<String>,
    /// Owner identity sent to the server.
    pub owner: Option<String>,
    /// Bound on each store call.
    pub store_timeout: Duration,
    /// Capacity of the incoming event queue.
    pub channel_capacity: usize,
    /// JSON file backing local mode. `None` keeps local data in memory.
    pub data_file: Option<PathBuf>,
    /// Maximum number of sessions listed.
    pub session_list_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            owner: None,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            channel_capacity: 256,
            data_file: default_data_file(),
            session_list_limit: 100,
        }
    }
}

/// Where to reach the server in synced mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    /// REST base URL.
    pub server_url: String,
    /// WebSocket URL of the event channel.
    pub events_url: String,
    /// Owner identity.
    pub owner: String,
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicit config file cannot be read or
    /// any config file cannot be parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Configuration from CLI arguments and env vars alone, used when the
    /// config file is unusable so `--server-url`/`--owner` still apply.
    #[must_use]
    pub fn from_cli(cli: &CliArgs) -> Self {
        Self::resolve(cli, &ConfigFile::default())
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            server_url: cli
                .server_url
                .clone()
                .or_else(|| file.sync.server_url.clone()),
            owner: cli.owner.clone().or_else(|| file.sync.owner.clone()),
            store_timeout: cli
                .timeout_secs
                .or(file.sync.store_timeout_secs)
                .map_or(defaults.store_timeout, Duration::from_secs),
            channel_capacity: file
                .sync
                .channel_capacity
                .unwrap_or(defaults.channel_capacity),
            data_file: cli
                .data_file
                .clone()
                .or_else(|| file.storage.data_file.clone())
                .or(defaults.data_file),
            session_list_limit: file
                .storage
                .session_list_limit
                .unwrap_or(defaults.session_list_limit),
        }
    }

    /// Returns the synced-mode target if both a server and a non-blank
    /// owner are configured, or `None` for local mode.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidServerUrl`] if the server URL cannot be
    /// turned into an event-channel URL.
    pub fn sync_target(&self) -> Result<Option<SyncTarget>, ConfigError> {
        let (Some(server_url), Some(owner)) = (&self.server_url, &self.owner) else {
            return Ok(None);
        };
        if owner.trim().is_empty() || server_url.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(SyncTarget {
            events_url: events_url(server_url)?,
            server_url: server_url.trim_end_matches('/').to_string(),
            owner: owner.trim().to_string(),
        }))
    }
}

/// Derives the WebSocket URL (`ws[s]://host:port/ws`) from a server URL.
fn events_url(server_url: &str) -> Result<String, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidServerUrl {
        url: server_url.to_string(),
        reason,
    };
    let mut url = Url::parse(server_url).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => return Err(invalid(format!("unsupported scheme {other}"))),
    };
    url.set_scheme(scheme)
        .map_err(|()| invalid("cannot switch scheme".to_string()))?;
    url.set_path("/ws");
    url.set_query(None);
    Ok(url.to_string())
}

fn default_data_file() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("focus").join("data.json"))
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Task list and focus-session tracker")]
pub struct CliArgs {
    /// Base URL of the sync server (enables synced mode with --owner).
    #[arg(long, env = "FOCUS_SERVER_URL")]
    pub server_url: Option<String>,

    /// Owner identity for synced mode.
    #[arg(long, env = "FOCUS_OWNER")]
    pub owner: Option<String>,

    /// Path to config file (default: `~/.config/focus/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Local-mode data file (default: `<data dir>/focus/data.json`).
    #[arg(long, env = "FOCUS_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Store call timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "FOCUS_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/focus.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Client subcommands.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add a task.
    Add {
        /// Task text.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Toggle a task's done flag.
    Done {
        /// Task id.
        id: String,
    },
    /// Replace a task's text.
    Edit {
        /// Task id.
        id: String,
        /// New text.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Delete a task.
    Rm {
        /// Task id.
        id: String,
    },
    /// List tasks, newest first.
    List,
    /// Record a completed focus session.
    Log {
        /// Duration in minutes.
        minutes: u32,
        /// Optional task label.
        #[arg(long)]
        task: Option<String>,
    },
    /// List recent focus sessions.
    Sessions {
        /// Maximum number of sessions to show.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show focus statistics.
    Stats,
    /// Show or change settings.
    Settings {
        /// Focus length in minutes.
        #[arg(long)]
        pomodoro: Option<u32>,
        /// Short break in minutes.
        #[arg(long)]
        short_break: Option<u32>,
        /// Long break in minutes.
        #[arg(long)]
        long_break: Option<u32>,
        /// Enable or disable the end-of-timer sound.
        #[arg(long)]
        sound: Option<bool>,
        /// Enable or disable notifications.
        #[arg(long)]
        notify: Option<bool>,
    },
    /// Follow task events from other devices (synced mode only).
    Watch,
}

fn load_config_file(explicit_path: Option<&Path>) -> Result<ConfigFile, ConfigError> {
    read_config_file(explicit_path, "focus")
}

/// Reads `T` from `explicit_path`, or from `<config dir>/<app>/config.toml`
/// when no path is given.
///
/// An explicit path must exist. A missing default file, or a platform with
/// no config directory, yields `T::default()`.
///
/// # Errors
///
/// [`ConfigError::ReadFile`] if a file exists but cannot be read, or the
/// explicit path is missing; [`ConfigError::ParseToml`] for invalid TOML.
pub fn read_config_file<T>(explicit_path: Option<&Path>, app: &str) -> Result<T, ConfigError>
where
    T: serde::de::DeserializeOwned + Default,
{
    let (path, required) = match explicit_path {
        Some(p) => (p.to_path_buf(), true),
        None => match dirs::config_dir() {
            Some(dir) => (dir.join(app).join("config.toml"), false),
            None => return Ok(T::default()),
        },
    };

    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(T::default());
        }
        Err(source) => return Err(ConfigError::ReadFile { path, source }),
    };
    tracing::debug!(path = %path.display(), "config file loaded");
    Ok(toml::from_str(&contents)?)
}
