//! Host document abstraction for the storefront bootstrap loader.
//!
//! This crate provides:
//! - `Document` - The seam between the loader and whatever hosts the page
//! - `ElementSpec` - Builder for elements the loader inserts
//! - `Mutation` - Records delivered to mutation subscribers
//! - `MemoryDocument` - In-memory host for tests and simulation

mod document;
mod error;
mod memory;
mod node;

pub use document::*;
pub use error::*;
pub use memory::*;
pub use node::*;
