//! Pattern templates for Weft.
//!
//! Loads named prompt templates, resolves each to a closed category once,
//! and detects explicit pattern requests in raw user input.

pub mod builtin;
pub mod catalog;
pub mod error;
pub mod request;
pub mod types;

pub use catalog::PatternCatalog;
pub use error::CatalogError;
pub use request::{ExplicitRequest, RequestDetector, RequestTrigger};
pub use types::{family_of, CombineStrategy, Pattern, PatternCategory};
