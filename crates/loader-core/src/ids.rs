//! Artifact ids, page-load ids and the cache-busting token.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Critical style element.
pub const CRITICAL_STYLE_ID: &str = "sf-critical-style";
/// Preloader overlay.
pub const PRELOADER_ID: &str = "sf-preloader";
/// Application mount node.
pub const MOUNT_ID: &str = "sf-app";
/// Bundle stylesheet link.
pub const STYLESHEET_ID: &str = "sf-app-stylesheet";
/// Bundle module script.
pub const SCRIPT_ID: &str = "sf-app-script";

/// Class added to the preloader to start its fade-out.
pub const PRELOADER_DONE_CLASS: &str = "sf-preloader--done";

/// Every id the loader may create.
pub const ARTIFACT_IDS: [&str; 5] = [CRITICAL_STYLE_ID, PRELOADER_ID, MOUNT_ID, STYLESHEET_ID, SCRIPT_ID];

macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(PageLoadId);
define_id!(CacheBust);

impl PageLoadId {
    /// Generate an id unique within this process.
    pub fn generate() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};

        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or(0) as u64;
        let counter = COUNTER.fetch_add(1, Ordering::SeqCst);
        Self(format!("{:x}-{:x}", nanos, counter))
    }
}

impl CacheBust {
    /// Token from the current time in milliseconds.
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis().to_string())
    }
}
