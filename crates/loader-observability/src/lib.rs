//! Observability for the storefront bootstrap loader.
//!
//! This crate provides:
//! - `init` / `LogFormat` - `tracing` subscriber setup
//! - `MetricsCollector` - Per-load timing metrics
//! - `TimelineRecorder` / `Timeline` - Ordered lifecycle events for offline inspection

mod logging;
mod metrics;
mod timeline;

pub use logging::*;
pub use metrics::*;
pub use timeline::*;

// Re-exported so observers can be wired without a direct dependency.
pub use loader_core::{LifecycleObserver, PageLoadId};
