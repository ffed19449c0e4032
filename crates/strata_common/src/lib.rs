//! Shared foundational types used across the Strata layered build system.
//!
//! This crate provides content hashing for generated artifacts, typed layer
//! identifiers, fully-qualified type names, and the internal-error result type.

#![warn(missing_docs)]

pub mod hash;
pub mod ids;
pub mod result;
pub mod type_name;

pub use hash::ContentHash;
pub use ids::LayerId;
pub use result::{InternalError, StrataResult};
pub use type_name::TypeName;
