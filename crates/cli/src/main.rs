#![forbid(unsafe_code)]

mod clock;
mod config;
mod render;

use config::{Command, Config, ConfigError};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use uc_storage::{
    AppendRequest, CreateContextRequest, DeleteRequest, ForkRequest, GetContextRequest,
    ListContextsRequest, SqliteStore, StoreError, UpdateRequest, open_pool,
};

const BIN_NAME: &str = "ultracontext";
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn usage() -> &'static str {
    "ultracontext: versioned context store (SQLite)\n\n\
USAGE:\n\
  ultracontext [--storage-dir DIR] [--project ID] [--pool-size N] [--busy-timeout-ms N] <COMMAND>\n\
\n\
COMMANDS:\n\
  create [--metadata JSON] [--messages JSON]\n\
  list [--limit N] [--offset N]\n\
  get ID [--version N] [--history]\n\
  append ID JSON\n\
  update ID JSON\n\
  delete ID REF...       REF is a message id or a position\n\
  fork ID --version N\n\
\n\
FLAGS:\n\
  -h, --help       Print this help and exit\n\
  -V               Print version and exit\n\
\n\
ENV:\n\
  ULTRACONTEXT_STORAGE_DIR, ULTRACONTEXT_PROJECT, ULTRACONTEXT_POOL_SIZE,\n\
  ULTRACONTEXT_BUSY_TIMEOUT_MS, ULTRACONTEXT_LOG (default: warn)\n"
}

#[derive(Debug)]
enum CliError {
    Config(ConfigError),
    Store(StoreError),
    Json(serde_json::Error),
}

impl CliError {
    fn code(&self) -> &'static str {
        match self {
            Self::Config(err) => err.code(),
            Self::Store(err) => err.code(),
            Self::Json(_) => "INVALID_JSON",
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "json: {err}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<StoreError> for CliError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(config::LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = match config::parse(std::env::args().skip(1), |key| std::env::var(key).ok()) {
        Ok(config) => config,
        Err(err) => fail(&CliError::from(err)),
    };

    match config.command {
        Command::Help => {
            print!("{}", usage());
            return Ok(());
        }
        Command::Version => {
            println!("{BIN_NAME} {VERSION}");
            return Ok(());
        }
        _ => {}
    }

    match run(config) {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(err) => fail(&err),
    }
}

fn fail(err: &CliError) -> ! {
    tracing::debug!(code = err.code(), "command failed");
    let body = render::error_body(err.code(), &err.to_string());
    eprintln!("{body}");
    std::process::exit(1)
}

fn run(config: Config) -> Result<Value, CliError> {
    // One pool per process, handed to the store by value.
    let pool = open_pool(&config.storage_dir, &config.pool)?;
    let store = SqliteStore::new(pool)?;
    let project_id = config.project;
    let created_at_ms = clock::now_ms_i64();

    let output = match config.command {
        Command::Create { metadata, messages } => render::render(&store.create_context(
            CreateContextRequest {
                project_id,
                metadata,
                messages,
                created_at_ms,
            },
        )?)?,
        Command::List { limit, offset } => {
            render::render(&store.list_contexts(ListContextsRequest {
                project_id,
                limit,
                offset,
            })?)?
        }
        Command::Get {
            context_id,
            version,
            history,
        } => render::render(&store.get_context(GetContextRequest {
            project_id,
            context_id,
            version,
            history,
        })?)?,
        Command::Append {
            context_id,
            messages,
        } => render::render(&store.append_messages(AppendRequest {
            project_id,
            context_id,
            messages,
            created_at_ms,
        })?)?,
        Command::Update {
            context_id,
            updates,
        } => render::render(&store.update_messages(UpdateRequest {
            project_id,
            context_id,
            updates,
            created_at_ms,
        })?)?,
        Command::Delete {
            context_id,
            targets,
        } => render::render(&store.delete_messages(DeleteRequest {
            project_id,
            context_id,
            targets,
            created_at_ms,
        })?)?,
        Command::Fork {
            context_id,
            version,
        } => render::render(&store.fork_context(ForkRequest {
            project_id,
            context_id,
            version,
            created_at_ms,
        })?)?,
        Command::Help | Command::Version => Value::Null,
    };
    Ok(output)
}
