//! boxcaps configuration loading and validation.
//!
//! This crate provides:
//! - Resolution of the probe root and device file paths (CLI → env → defaults)
//! - The model-family table that gates model-specific capabilities
//! - Semantic validation of model-table overrides

pub mod models;
pub mod resolve;
pub mod validate;

pub use models::{family, FamilySpec, ModelFamilies};
pub use resolve::{resolve_paths, CliPaths, PathSource, PlatformPaths};
pub use validate::{ValidationError, ValidationResult};

/// Schema version for model-table files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Load the model table: built-ins, with the resolved override file merged on top.
pub fn load_model_families(paths: &PlatformPaths) -> ValidationResult<ModelFamilies> {
    let mut families = ModelFamilies::builtin();
    if let Some(path) = &paths.models {
        let overrides = ModelFamilies::from_file(path)?;
        validate::validate_families(&overrides)?;
        families.merge(overrides);
    }
    Ok(families)
}
