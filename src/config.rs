//! Configuration for both sides of a transfer.
//!
//! Clients read their endpoints from the boot command line, with `SRC` and
//! `DST` in the environment taking priority when non-empty. The server is
//! configured through figment: defaults, `booty.toml`, `BOOTY_*` environment
//! variables, then command line arguments.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::core::IMAGE_FIELD_NAME;

/// Where the boot command line lives unless `CMDLINEPATH` says otherwise.
pub const DEFAULT_CMDLINE_PATH: &str = "/proc/cmdline";

/// Server config file, relative to the working directory unless `BOOTY_CONFIG` is set.
pub const DEFAULT_CONFIG_FILE: &str = "booty.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read boot command line from {}", .path.display())]
    ReadCmdline {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Invalid(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Invalid(Box::new(err))
    }
}

/// Source and destination of a push or pull.
///
/// Which one is local and which is remote depends on the direction: a push
/// reads `src` from disk and POSTs to `dst`, a pull GETs `src` into `dst`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Endpoints {
    pub src: String,
    pub dst: String,
}

#[derive(Debug, Default, Serialize)]
struct PartialEndpoints {
    #[serde(skip_serializing_if = "Option::is_none")]
    src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dst: Option<String>,
}

impl PartialEndpoints {
    fn from_cmdline(args: &HashMap<String, String>) -> Self {
        let get = |key: &str| args.get(key).filter(|v| !v.is_empty()).cloned();
        Self {
            src: get("src"),
            dst: get("dst"),
        }
    }

    fn from_env() -> Self {
        Self {
            src: non_empty_var("SRC"),
            dst: non_empty_var("DST"),
        }
    }
}

impl Endpoints {
    /// Resolve endpoints from the command line file at `cmdline_path`, letting
    /// non-empty `SRC`/`DST` environment variables override it.
    ///
    /// The file must be readable even when both overrides are set.
    pub fn resolve(cmdline_path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(cmdline_path).map_err(|source| ConfigError::ReadCmdline {
                path: cmdline_path.to_path_buf(),
                source,
            })?;

        let from_file = PartialEndpoints::from_cmdline(&parse_cmdline(&contents));
        let endpoints = Figment::from(Serialized::defaults(from_file))
            .merge(Serialized::defaults(PartialEndpoints::from_env()))
            .extract()?;

        Ok(endpoints)
    }
}

/// Location of the boot command line: `CMDLINEPATH` if set and non-empty.
pub fn cmdline_path() -> PathBuf {
    non_empty_var("CMDLINEPATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CMDLINE_PATH))
}

/// Split a kernel-style command line into its `key=value` pairs.
///
/// Tokens are whitespace separated; double quotes group spaces into a value
/// and are dropped. Bare flags are ignored. A repeated key keeps its last value.
pub fn parse_cmdline(contents: &str) -> HashMap<String, String> {
    let mut args = HashMap::new();
    let mut token = String::new();
    let mut in_quotes = false;

    for c in contents.chars().chain(std::iter::once(' ')) {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if let Some((key, value)) = token.split_once('=') {
                    args.insert(key.to_string(), value.to_string());
                }
                token.clear();
            }
            c => token.push(c),
        }
    }

    args
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Served read-only under `/images/`
    pub images_directory: PathBuf,
    /// Where `POST /image` stores `<peer>.img`
    pub upload_directory: PathBuf,
    pub field_name: String,
    /// Request body cap for uploads; unbounded when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_upload_bytes: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            images_directory: PathBuf::from("./images"),
            upload_directory: PathBuf::from("."),
            field_name: IMAGE_FIELD_NAME.to_string(),
            max_upload_bytes: None,
        }
    }
}

impl ServerConfig {
    /// Layer defaults, the config file, `BOOTY_*` env vars and `cli_args`
    /// (lowest to highest priority). `cli_args` should skip unset fields.
    pub fn new<T: Serialize>(cli_args: Option<&T>) -> Result<Self, ConfigError> {
        let config_file =
            non_empty_var("BOOTY_CONFIG").unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let mut figment = Figment::from(Serialized::defaults(ServerConfig::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed("BOOTY_").ignore(&["config"]));

        if let Some(args) = cli_args {
            figment = figment.merge(Serialized::defaults(args));
        }

        Ok(figment.extract()?)
    }
}
