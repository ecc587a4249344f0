#![forbid(unsafe_code)]

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    Hash(bcrypt::BcryptError),
    InvalidInput(&'static str),
    UnknownId,
    RevisionMismatch {
        expected: i64,
        actual: i64,
    },
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
    Conflict(&'static str),
    InvalidCredentials,
    Locked {
        until_ms: i64,
    },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::Hash(err) => write!(f, "hash: {err}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::UnknownId => write!(f, "unknown id"),
            Self::RevisionMismatch { expected, actual } => {
                write!(
                    f,
                    "revision mismatch (expected={expected}, actual={actual})"
                )
            }
            Self::InvalidTransition { from, to } => {
                write!(f, "invalid transition (from={from}, to={to})")
            }
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::InvalidCredentials => write!(f, "invalid credentials"),
            Self::Locked { until_ms } => write!(f, "locked (until_ms={until_ms})"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Sql(err) => Some(err),
            Self::Hash(err) => Some(err),
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

impl From<bcrypt::BcryptError> for StoreError {
    fn from(value: bcrypt::BcryptError) -> Self {
        Self::Hash(value)
    }
}
