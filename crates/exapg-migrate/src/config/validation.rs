//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.dsn.is_empty() {
        return Err(MigrateError::Config("source.dsn is required".into()));
    }
    if config.source.exaplus_bin.is_empty() {
        return Err(MigrateError::Config(
            "source.exaplus_bin must not be empty".into(),
        ));
    }
    if config.source.r#type != "exasol" {
        return Err(MigrateError::Config(format!(
            "source.type must be 'exasol', got '{}'",
            config.source.r#type
        )));
    }

    // Target validation
    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }
    if config.target.r#type != "postgres" {
        return Err(MigrateError::Config(format!(
            "target.type must be 'postgres', got '{}'",
            config.target.r#type
        )));
    }

    // Migration config validation - only check if explicitly set
    if let Some(0) = config.migration.workers {
        return Err(MigrateError::Config(
            "migration.workers must be at least 1".into(),
        ));
    }

    Ok(())
}
