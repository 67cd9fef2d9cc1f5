//! Single-threaded bootstrap runtime for the storefront loader.
//!
//! Everything here runs on a Tokio current-thread runtime inside a
//! `tokio::task::LocalSet`, mirroring the browser event loop:
//! - `Bootstrap` - The page-load state machine
//! - `Watcher` - Mutation-first, polling-fallback wait primitive
//! - `TaskRegistry` - Owner of every spawned timer/observer task
//! - `RedactionSweeper` - Hides operator names in host chrome
//! - `AssetLoader` - Injects the bundle stylesheet and module script

mod assets;
mod bootstrap;
mod style;
mod sweeper;
mod tasks;
mod watch;

pub use assets::*;
pub use bootstrap::*;
pub use style::*;
pub use sweeper::*;
pub use tasks::*;
pub use watch::*;
