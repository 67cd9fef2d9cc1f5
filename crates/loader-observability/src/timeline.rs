//! Lifecycle timelines for offline inspection.

use std::cell::RefCell;
use std::time::Duration;

use chrono::Utc;
use loader_core::{
    BootstrapState, LifecycleObserver, PageClass, PageLoadId, SweepReport, TeardownReason,
};
use serde::{Deserialize, Serialize};

use crate::metrics::LoadMetrics;

/// One thing that happened during a page load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TimelineEvent {
    Classified { class: PageClass, path: String },
    Transition { from: BootstrapState, to: BootstrapState },
    /// Only passes that hid something are recorded.
    Sweep { scanned: usize, hidden: usize },
    Teardown { reason: TeardownReason },
}

/// A timestamped event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Microseconds since start.
    pub at_us: u64,
    #[serde(flatten)]
    pub event: TimelineEvent,
}

impl TimelineEntry {
    /// One-line rendering, e.g. `   3000.00ms  ready`.
    pub fn render(&self) -> String {
        let what = match &self.event {
            TimelineEvent::Classified { class, path } => format!("classified {} as {}", path, class),
            TimelineEvent::Transition { to, .. } => to.to_string(),
            TimelineEvent::Sweep { scanned, hidden } => {
                format!("sweep hid {} (scanned {})", hidden, scanned)
            }
            TimelineEvent::Teardown { reason } => format!("teardown: {}", reason),
        };
        format!("{:>10.2}ms  {}", self.at_us as f64 / 1000.0, what)
    }
}

/// A complete recording of one page load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    /// Timeline format version.
    pub version: u32,
    /// RFC 3339 timestamp of when the timeline was finalized.
    pub recorded_at: String,
    pub load_id: String,
    pub entries: Vec<TimelineEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<LoadMetrics>,
}

impl Timeline {
    /// Current timeline format version.
    pub const VERSION: u32 = 1;

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// States entered, in order.
    pub fn states(&self) -> Vec<BootstrapState> {
        self.entries
            .iter()
            .filter_map(|entry| match entry.event {
                TimelineEvent::Transition { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }

    /// Human-readable rendering, one event per line.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(TimelineEntry::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Records a [`Timeline`] as a lifecycle observer.
#[derive(Debug)]
pub struct TimelineRecorder {
    load_id: PageLoadId,
    entries: RefCell<Vec<TimelineEntry>>,
}

impl TimelineRecorder {
    pub fn new(load_id: &PageLoadId) -> Self {
        Self {
            load_id: load_id.clone(),
            entries: RefCell::new(Vec::new()),
        }
    }

    fn push(&self, elapsed: Duration, event: TimelineEvent) {
        self.entries.borrow_mut().push(TimelineEntry {
            at_us: elapsed.as_micros() as u64,
            event,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Snapshot the entries recorded so far.
    pub fn finalize(&self, metrics: Option<LoadMetrics>) -> Timeline {
        Timeline {
            version: Timeline::VERSION,
            recorded_at: Utc::now().to_rfc3339(),
            load_id: self.load_id.to_string(),
            entries: self.entries.borrow().clone(),
            metrics,
        }
    }
}

impl LifecycleObserver for TimelineRecorder {
    fn on_classified(&self, class: PageClass, path: &str) {
        self.push(
            Duration::ZERO,
            TimelineEvent::Classified {
                class,
                path: path.to_string(),
            },
        );
    }

    fn on_transition(&self, from: BootstrapState, to: BootstrapState, elapsed: Duration) {
        self.push(elapsed, TimelineEvent::Transition { from, to });
    }

    fn on_sweep(&self, report: &SweepReport, elapsed: Duration) {
        if report.is_noop() {
            return;
        }
        self.push(
            elapsed,
            TimelineEvent::Sweep {
                scanned: report.scanned,
                hidden: report.hidden,
            },
        );
    }

    fn on_teardown(&self, reason: TeardownReason, elapsed: Duration) {
        self.push(elapsed, TimelineEvent::Teardown { reason });
    }
}
