//! Core types for the storefront bootstrap loader.
//!
//! This crate holds everything that does not touch a document:
//! - `PageClassifier` - Storefront vs. native commerce pages
//! - `LoaderConfig` / `Settings` - Branding, timing policy and presets
//! - `BootstrapState` - Forward-only page-load lifecycle
//! - `AssetUrls` / `HeadMarkup` - Bundle URLs and critical CSS

mod assets;
mod classify;
mod config;
mod error;
pub mod ids;
mod lifecycle;
mod markup;

pub use assets::*;
pub use classify::*;
pub use config::*;
pub use error::*;
pub use ids::{CacheBust, PageLoadId};
pub use lifecycle::*;
pub use markup::*;
