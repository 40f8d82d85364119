//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Could not reach the source or target at job setup.
    #[error("Connection to {system} failed: {message}")]
    Connect { system: String, message: String },

    /// Bulk export failed for a table range.
    #[error("Export failed for table {table}: {message}")]
    Extract { table: String, message: String },

    /// Bulk load failed for a table range (transaction rolled back).
    #[error("Load failed for table {table}: {message}")]
    Load { table: String, message: String },

    /// Target database error.
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// IO error (staging files, config file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Connect error.
    pub fn connect(system: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Connect {
            system: system.into(),
            message: message.into(),
        }
    }

    /// Create an Extract error.
    pub fn extract(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Extract {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Load error.
    pub fn load(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Load {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error class.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Json(_) => 1,
            MigrateError::Connect { .. } => 2,
            MigrateError::Extract { .. } => 3,
            MigrateError::Load { .. } | MigrateError::Target(_) => 4,
            MigrateError::Io(_) => 7,
            MigrateError::Cancelled => 130,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
