//! boxcaps common types and errors.
//!
//! This crate provides the foundational pieces shared by the other crates:
//! - The dynamic [`Value`] stored in the boot-info store and the capability registry
//! - A safe literal parser used to coerce boot-info values
//! - The unified error type with stable codes

pub mod error;
pub mod literal;
pub mod value;

pub use error::{Error, ErrorCategory, Result};
pub use literal::{coerce_value, parse_literal, LiteralError};
pub use value::Value;
