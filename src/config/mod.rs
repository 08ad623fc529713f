//! Configuration module
//!
//! Loads and validates YAML surface definitions and converts them into
//! engine [`SurfaceSpec`](crate::surface::SurfaceSpec)s.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning, LoaderOptions};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
