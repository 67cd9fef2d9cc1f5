//! Bootstrap lifecycle states and observers.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::PageClass;

/// States of a single page load, in the only order they may occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapState {
    /// Nothing has happened yet.
    Idle,
    /// Critical style is in the document.
    StylesInjected,
    /// Storefront page, body not parsed yet.
    WaitingForBody,
    /// Preloader, mount node and bundle tags are in the document.
    AssetsRequested,
    /// Watching for the application's readiness marker.
    WaitingForReadySignal,
    /// Readiness observed or safety timeout elapsed.
    Ready,
    /// Terminal.
    TornDown,
}

impl BootstrapState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BootstrapState::Idle => "idle",
            BootstrapState::StylesInjected => "styles_injected",
            BootstrapState::WaitingForBody => "waiting_for_body",
            BootstrapState::AssetsRequested => "assets_requested",
            BootstrapState::WaitingForReadySignal => "waiting_for_ready_signal",
            BootstrapState::Ready => "ready",
            BootstrapState::TornDown => "torn_down",
        }
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// `StylesInjected -> TornDown` is the native-page shortcut; every other
    /// transition is to the immediate successor.
    pub fn can_advance_to(&self, next: BootstrapState) -> bool {
        use BootstrapState::*;
        matches!(
            (self, next),
            (Idle, StylesInjected)
                | (StylesInjected, WaitingForBody)
                | (StylesInjected, TornDown)
                | (WaitingForBody, AssetsRequested)
                | (AssetsRequested, WaitingForReadySignal)
                | (WaitingForReadySignal, Ready)
                | (Ready, TornDown)
        )
    }

    pub fn is_terminal(&self) -> bool {
        *self == BootstrapState::TornDown
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a page load reached `TornDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownReason {
    /// Native commerce page; nothing to bootstrap.
    NativePage,
    /// The application signalled readiness.
    ReadySignal,
    /// The safety timeout elapsed first.
    SafetyTimeout,
}

impl TeardownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeardownReason::NativePage => "native_page",
            TeardownReason::ReadySignal => "ready_signal",
            TeardownReason::SafetyTimeout => "safety_timeout",
        }
    }
}

impl fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one redaction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Text nodes inspected.
    pub scanned: usize,
    /// Elements newly hidden by this pass.
    pub hidden: usize,
    /// Nodes skipped because reading them failed.
    pub skipped: usize,
}

impl SweepReport {
    pub fn is_noop(&self) -> bool {
        self.hidden == 0
    }
}

/// Observer for lifecycle events.
///
/// Everything runs on one thread, so observers need not be `Send`.
pub trait LifecycleObserver {
    /// The page was classified, before any transition.
    fn on_classified(&self, _class: PageClass, _path: &str) {}

    /// A state transition happened `elapsed` after start.
    fn on_transition(&self, _from: BootstrapState, _to: BootstrapState, _elapsed: Duration) {}

    /// A redaction pass finished.
    fn on_sweep(&self, _report: &SweepReport, _elapsed: Duration) {}

    /// The page load was torn down. Called at most once per load.
    fn on_teardown(&self, _reason: TeardownReason, _elapsed: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_are_ordered() {
        assert!(BootstrapState::Idle < BootstrapState::StylesInjected);
        assert!(BootstrapState::WaitingForReadySignal < BootstrapState::Ready);
        assert!(BootstrapState::Ready < BootstrapState::TornDown);
    }

    #[test]
    fn test_forward_only() {
        use BootstrapState::*;
        assert!(Idle.can_advance_to(StylesInjected));
        assert!(StylesInjected.can_advance_to(TornDown));
        assert!(Ready.can_advance_to(TornDown));

        assert!(!Ready.can_advance_to(WaitingForReadySignal));
        assert!(!TornDown.can_advance_to(Idle));
        assert!(!Idle.can_advance_to(AssetsRequested));
        assert!(!WaitingForBody.can_advance_to(TornDown));
    }

    #[test]
    fn test_terminal() {
        assert!(BootstrapState::TornDown.is_terminal());
        assert!(!BootstrapState::Ready.is_terminal());
    }
}
