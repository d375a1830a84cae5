#![forbid(unsafe_code)]

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    Pool(r2d2::Error),
    Json(serde_json::Error),
    InvalidInput(&'static str),
    UnknownContext,
    UnknownVersion { requested: usize, available: usize },
    UnknownMessage(String),
    LockPoisoned,
}

impl StoreError {
    /// Stable machine-readable code for front ends.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "IO",
            Self::Sql(_) => "SQLITE",
            Self::Pool(_) => "POOL",
            Self::Json(_) => "INVALID_JSON",
            Self::InvalidInput(message) if message.starts_with("RESET_REQUIRED") => {
                "RESET_REQUIRED"
            }
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::UnknownContext => "UNKNOWN_CONTEXT",
            Self::UnknownVersion { .. } => "UNKNOWN_VERSION",
            Self::UnknownMessage(_) => "UNKNOWN_MESSAGE",
            Self::LockPoisoned => "LOCK_POISONED",
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::Pool(err) => write!(f, "connection pool: {err}"),
            Self::Json(err) => write!(f, "json: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::UnknownContext => write!(f, "unknown context"),
            Self::UnknownVersion {
                requested,
                available,
            } => write!(
                f,
                "unknown version (requested={requested}, available={available})"
            ),
            Self::UnknownMessage(reference) => write!(f, "unknown message: {reference}"),
            Self::LockPoisoned => write!(f, "context write lock poisoned"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Sql(err) => Some(err),
            Self::Pool(err) => Some(err),
            Self::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(value: r2d2::Error) -> Self {
        Self::Pool(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}
