//! Shared data model for Fable story content.

pub mod defs;
pub mod lenient;
pub mod validate;

pub use defs::*;
pub use lenient::Lenient;
pub use validate::{ValidationError, validate_story};
