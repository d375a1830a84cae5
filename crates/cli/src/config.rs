#![forbid(unsafe_code)]

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::Duration;
use uc_storage::{MessageInput, MessageRef, MessageUpdate, PoolConfig};

pub(crate) const STORAGE_DIR_ENV: &str = "ULTRACONTEXT_STORAGE_DIR";
pub(crate) const PROJECT_ENV: &str = "ULTRACONTEXT_PROJECT";
pub(crate) const POOL_SIZE_ENV: &str = "ULTRACONTEXT_POOL_SIZE";
pub(crate) const BUSY_TIMEOUT_ENV: &str = "ULTRACONTEXT_BUSY_TIMEOUT_MS";
pub(crate) const LOG_ENV: &str = "ULTRACONTEXT_LOG";

const DEFAULT_STORAGE_DIR: &str = ".ultracontext";
const DEFAULT_PROJECT: &str = "default";
const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Config {
    pub(crate) storage_dir: PathBuf,
    pub(crate) project: String,
    pub(crate) pool: PoolConfig,
    pub(crate) command: Command,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Command {
    Help,
    Version,
    Create {
        metadata: Map<String, Value>,
        messages: Vec<MessageInput>,
    },
    List {
        limit: usize,
        offset: usize,
    },
    Get {
        context_id: String,
        version: Option<usize>,
        history: bool,
    },
    Append {
        context_id: String,
        messages: Vec<MessageInput>,
    },
    Update {
        context_id: String,
        updates: Vec<MessageUpdate>,
    },
    Delete {
        context_id: String,
        targets: Vec<MessageRef>,
    },
    Fork {
        context_id: String,
        version: usize,
    },
}

#[derive(Debug)]
pub(crate) enum ConfigError {
    MissingCommand,
    UnknownCommand(String),
    MissingValue(&'static str),
    UnexpectedArgument(String),
    InvalidNumber { flag: &'static str, value: String },
    InvalidJson { what: &'static str, source: serde_json::Error },
}

impl ConfigError {
    pub(crate) fn code(&self) -> &'static str {
        match self {
            Self::InvalidJson { .. } => "INVALID_JSON",
            _ => "INVALID_ARGS",
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCommand => write!(f, "missing command (try --help)"),
            Self::UnknownCommand(name) => write!(f, "unknown command: {name}"),
            Self::MissingValue(what) => write!(f, "missing value for {what}"),
            Self::UnexpectedArgument(arg) => write!(f, "unexpected argument: {arg}"),
            Self::InvalidNumber { flag, value } => {
                write!(f, "{flag} expects a number, got {value:?}")
            }
            Self::InvalidJson { what, source } => write!(f, "{what} is not valid JSON: {source}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidJson { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Parses `args` (without the program name). Global flags may appear anywhere;
/// `env` supplies fallbacks for the ones that are absent.
pub(crate) fn parse<I, E>(args: I, env: E) -> Result<Config, ConfigError>
where
    I: IntoIterator<Item = String>,
    E: Fn(&str) -> Option<String>,
{
    let mut storage_dir: Option<String> = None;
    let mut project: Option<String> = None;
    let mut pool_size: Option<String> = None;
    let mut busy_timeout_ms: Option<String> = None;
    let mut rest = Vec::new();

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(bare(Command::Help)),
            "-V" => return Ok(bare(Command::Version)),
            "--storage-dir" => storage_dir = Some(flag(&mut args, "--storage-dir")?),
            "--project" => project = Some(flag(&mut args, "--project")?),
            "--pool-size" => pool_size = Some(flag(&mut args, "--pool-size")?),
            "--busy-timeout-ms" => busy_timeout_ms = Some(flag(&mut args, "--busy-timeout-ms")?),
            _ => rest.push(arg),
        }
    }

    let defaults = PoolConfig::default();
    let pool = PoolConfig {
        max_size: pool_size
            .or_else(|| env(POOL_SIZE_ENV))
            .and_then(|value| value.trim().parse::<u32>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(defaults.max_size),
        busy_timeout: busy_timeout_ms
            .or_else(|| env(BUSY_TIMEOUT_ENV))
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.busy_timeout),
    };

    Ok(Config {
        storage_dir: PathBuf::from(
            storage_dir
                .or_else(|| env(STORAGE_DIR_ENV))
                .unwrap_or_else(|| DEFAULT_STORAGE_DIR.to_string()),
        ),
        project: project
            .or_else(|| env(PROJECT_ENV))
            .unwrap_or_else(|| DEFAULT_PROJECT.to_string()),
        pool,
        command: parse_command(rest)?,
    })
}

fn bare(command: Command) -> Config {
    Config {
        storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
        project: DEFAULT_PROJECT.to_string(),
        pool: PoolConfig::default(),
        command,
    }
}

fn parse_command(args: Vec<String>) -> Result<Command, ConfigError> {
    let mut args = args.into_iter();
    let Some(name) = args.next() else {
        return Err(ConfigError::MissingCommand);
    };

    match name.as_str() {
        "help" => Ok(Command::Help),
        "version" => Ok(Command::Version),
        "create" => {
            let mut metadata = Map::new();
            let mut messages = Vec::new();
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--metadata" => {
                        metadata = parse_json(&flag(&mut args, "--metadata")?, "--metadata")?
                    }
                    "--messages" => {
                        messages = parse_json_list(&flag(&mut args, "--messages")?, "--messages")?
                    }
                    _ => return Err(ConfigError::UnexpectedArgument(arg)),
                }
            }
            Ok(Command::Create { metadata, messages })
        }
        "list" => {
            let mut limit = DEFAULT_LIST_LIMIT;
            let mut offset = 0;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--limit" => limit = number_flag(&mut args, "--limit")?,
                    "--offset" => offset = number_flag(&mut args, "--offset")?,
                    _ => return Err(ConfigError::UnexpectedArgument(arg)),
                }
            }
            Ok(Command::List { limit, offset })
        }
        "get" => {
            let context_id = args.next().ok_or(ConfigError::MissingValue("context id"))?;
            let mut version = None;
            let mut history = false;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--version" => version = Some(number_flag(&mut args, "--version")?),
                    "--history" => history = true,
                    _ => return Err(ConfigError::UnexpectedArgument(arg)),
                }
            }
            Ok(Command::Get {
                context_id,
                version,
                history,
            })
        }
        "append" => {
            let context_id = args.next().ok_or(ConfigError::MissingValue("context id"))?;
            let payload = args.next().ok_or(ConfigError::MissingValue("messages"))?;
            reject_extra(args)?;
            Ok(Command::Append {
                context_id,
                messages: parse_json_list(&payload, "messages")?,
            })
        }
        "update" => {
            let context_id = args.next().ok_or(ConfigError::MissingValue("context id"))?;
            let payload = args.next().ok_or(ConfigError::MissingValue("updates"))?;
            reject_extra(args)?;
            Ok(Command::Update {
                context_id,
                updates: parse_json_list(&payload, "updates")?,
            })
        }
        "delete" => {
            let context_id = args.next().ok_or(ConfigError::MissingValue("context id"))?;
            let targets: Vec<MessageRef> = args.map(|arg| MessageRef::parse(&arg)).collect();
            if targets.is_empty() {
                return Err(ConfigError::MissingValue("message refs"));
            }
            Ok(Command::Delete {
                context_id,
                targets,
            })
        }
        "fork" => {
            let context_id = args.next().ok_or(ConfigError::MissingValue("context id"))?;
            let mut version = None;
            while let Some(arg) = args.next() {
                match arg.as_str() {
                    "--version" => version = Some(number_flag(&mut args, "--version")?),
                    _ => return Err(ConfigError::UnexpectedArgument(arg)),
                }
            }
            Ok(Command::Fork {
                context_id,
                version: version.ok_or(ConfigError::MissingValue("--version"))?,
            })
        }
        _ => Err(ConfigError::UnknownCommand(name)),
    }
}

fn flag(
    args: &mut impl Iterator<Item = String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    args.next().ok_or(ConfigError::MissingValue(name))
}

fn number_flag(
    args: &mut impl Iterator<Item = String>,
    name: &'static str,
) -> Result<usize, ConfigError> {
    parse_number(&flag(args, name)?, name)
}

fn reject_extra(mut args: impl Iterator<Item = String>) -> Result<(), ConfigError> {
    match args.next() {
        Some(arg) => Err(ConfigError::UnexpectedArgument(arg)),
        None => Ok(()),
    }
}

fn parse_number(value: &str, flag: &'static str) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber {
            flag,
            value: value.to_string(),
        })
}

fn parse_json<T: DeserializeOwned>(raw: &str, what: &'static str) -> Result<T, ConfigError> {
    serde_json::from_str(raw).map_err(|source| ConfigError::InvalidJson { what, source })
}

/// Accepts a JSON array or a single object.
fn parse_json_list<T: DeserializeOwned>(
    raw: &str,
    what: &'static str,
) -> Result<Vec<T>, ConfigError> {
    let value: Value = parse_json(raw, what)?;
    let items = match value {
        Value::Array(items) => items,
        single => vec![single],
    };
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|source| ConfigError::InvalidJson { what, source })
        })
        .collect()
}

#[cfg(test)]
mod tests;
