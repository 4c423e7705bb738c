//! # mnemos-core
//!
//! Core types, traits, and abstractions for the mnemos knowledge layer.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other mnemos crates depend on.

pub mod context;
pub mod defaults;
pub mod domain;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use context::{CancelToken, OperationContext};
pub use domain::*;
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
