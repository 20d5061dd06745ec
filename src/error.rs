use thiserror::Error;

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::StorageFailure(format!("Stored data could not be decoded: {}", err))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        Self::StorageFailure(format!("Database error: {}", err))
    }
}

impl From<sqlx::migrate::MigrateError> for LedgerError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::StorageFailure(format!("Migration error: {}", err))
    }
}

impl From<config::ConfigError> for LedgerError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Diagnosis {0} not found")]
    NotFound(u64),

    #[error("Signing unavailable: {0}")]
    SigningUnavailable(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl LedgerError {
    pub fn invalid_confidence(field: &str, value: f32) -> Self {
        Self::InvalidInput(format!(
            "{} must be a finite value in [0.0, 1.0], got {}",
            field, value
        ))
    }

    pub fn empty_field(field: &str) -> Self {
        Self::InvalidInput(format!("{} must not be empty", field))
    }

    /// Short machine-readable tag used by the HTTP layer.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::SigningUnavailable(_) => "signing_unavailable",
            Self::StorageFailure(_) => "storage_failure",
            Self::InvalidInput(_) => "invalid_input",
            Self::ConfigError(_) => "config_error",
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
