//! tc-core: shared types, IDs, errors, and configuration.
//!
//! This crate is the foundational dependency for all other tc-* crates,
//! providing type-safe identifiers, a unified error type, the media-domain
//! types shared between the prober and the planner, and application
//! configuration.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use media::*;
