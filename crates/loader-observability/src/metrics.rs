//! Per-load timing metrics.

use std::cell::RefCell;
use std::time::Duration;

use loader_core::{
    BootstrapState, LifecycleObserver, PageClass, PageLoadId, SweepReport, TeardownReason,
};
use serde::{Deserialize, Serialize};

/// Metrics for a single page load. Times are microseconds since start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadMetrics {
    /// Page load ID for correlation.
    pub load_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_class: Option<PageClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_styles_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_assets_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_ready_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_teardown_us: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub teardown_reason: Option<TeardownReason>,
    /// Redaction passes run.
    pub sweeps: u64,
    /// Elements hidden across all passes.
    pub hidden_elements: u64,
    /// Text nodes skipped because they could not be read.
    pub skipped_nodes: u64,
}

impl LoadMetrics {
    /// Format as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Format as human-readable summary.
    pub fn to_summary(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Page load: {}", self.load_id));

        if let Some(ref path) = self.path {
            let class = self.page_class.map(|c| c.as_str()).unwrap_or("unclassified");
            lines.push(format!("  Path: {} ({})", path, class));
        }

        let phases = [
            ("Time to styles", self.time_to_styles_us),
            ("Time to assets", self.time_to_assets_us),
            ("Time to ready", self.time_to_ready_us),
            ("Time to teardown", self.time_to_teardown_us),
        ];
        for (label, value) in phases {
            if let Some(us) = value {
                lines.push(format!("  {}: {}us ({:.2}ms)", label, us, us as f64 / 1000.0));
            }
        }

        if let Some(reason) = self.teardown_reason {
            lines.push(format!("  Teardown reason: {}", reason));
        }

        lines.push(format!(
            "  Redaction: {} sweeps, {} hidden, {} skipped",
            self.sweeps, self.hidden_elements, self.skipped_nodes
        ));

        lines.join("\n")
    }
}

/// Collects [`LoadMetrics`] as a lifecycle observer.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: RefCell<LoadMetrics>,
}

impl MetricsCollector {
    pub fn new(load_id: &PageLoadId) -> Self {
        Self {
            metrics: RefCell::new(LoadMetrics {
                load_id: load_id.to_string(),
                ..Default::default()
            }),
        }
    }

    /// Metrics so far.
    pub fn snapshot(&self) -> LoadMetrics {
        self.metrics.borrow().clone()
    }
}

impl LifecycleObserver for MetricsCollector {
    fn on_classified(&self, class: PageClass, path: &str) {
        let mut m = self.metrics.borrow_mut();
        m.page_class = Some(class);
        m.path = Some(path.to_string());
    }

    fn on_transition(&self, _from: BootstrapState, to: BootstrapState, elapsed: Duration) {
        let us = Some(elapsed.as_micros() as u64);
        let mut m = self.metrics.borrow_mut();
        match to {
            BootstrapState::StylesInjected => m.time_to_styles_us = us,
            BootstrapState::AssetsRequested => m.time_to_assets_us = us,
            BootstrapState::Ready => m.time_to_ready_us = us,
            BootstrapState::TornDown => m.time_to_teardown_us = us,
            _ => {}
        }
    }

    fn on_sweep(&self, report: &SweepReport, _elapsed: Duration) {
        let mut m = self.metrics.borrow_mut();
        m.sweeps += 1;
        m.hidden_elements += report.hidden as u64;
        m.skipped_nodes += report.skipped as u64;
    }

    fn on_teardown(&self, reason: TeardownReason, _elapsed: Duration) {
        self.metrics.borrow_mut().teardown_reason = Some(reason);
    }
}
