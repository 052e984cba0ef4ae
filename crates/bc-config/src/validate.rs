//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::models::ModelFamilies;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::SemanticError(_) => 63,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

/// Validate a model table semantically.
pub fn validate_families(table: &ModelFamilies) -> ValidationResult<()> {
    if table.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: table.schema_version.clone(),
        });
    }

    for (name, spec) in &table.families {
        if name.trim().is_empty() {
            return Err(ValidationError::SemanticError(
                "family names must not be empty".to_string(),
            ));
        }
        if let Some(bad) = spec
            .models
            .iter()
            .chain(spec.prefixes.iter())
            .find(|m| m.trim().is_empty())
        {
            return Err(ValidationError::InvalidValue {
                field: format!("families.{}", name),
                message: format!("empty model or prefix entry {:?}", bad),
            });
        }
    }

    for (model, parts) in &table.kexec {
        if parts.kernel.is_empty() || parts.rootfs.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: format!("kexec.{}", model),
                message: "kernel and rootfs partitions are required".to_string(),
            });
        }
    }

    Ok(())
}
