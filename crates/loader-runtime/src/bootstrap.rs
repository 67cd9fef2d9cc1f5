//! The page-load state machine.
//!
//! `Bootstrap::start` runs the synchronous part of a page load (classify,
//! inject the critical style, first redaction pass) and spawns the rest
//! onto the current `LocalSet`:
//!
//! ```text
//! Idle -> StylesInjected -+-> TornDown                         (native page)
//!                         +-> WaitingForBody -> AssetsRequested
//!                               -> WaitingForReadySignal -> Ready -> TornDown
//! ```

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use loader_core::ids::{MOUNT_ID, PRELOADER_DONE_CLASS, PRELOADER_ID};
use loader_core::{
    AssetUrls, BootstrapState, CacheBust, LifecycleObserver, PageClass, PageLoadId, ReadyMarker,
    Settings, SweepReport, TeardownReason,
};
use loader_dom::{Document, ElementSpec, NodeId};
use tokio::sync::watch;
use tokio::time::{self, Instant};
use tracing::{field, Instrument, Span};

use crate::assets::AssetLoader;
use crate::style::{inject_critical_style, remove_critical_style};
use crate::sweeper::RedactionSweeper;
use crate::tasks::TaskRegistry;
use crate::watch::Watcher;

/// State shared between the orchestrator and its tasks.
struct Shared {
    doc: Rc<dyn Document>,
    settings: Settings,
    observers: Vec<Rc<dyn LifecycleObserver>>,
    urls: AssetUrls,
    assets: AssetLoader,
    state: watch::Sender<BootstrapState>,
    class: Cell<Option<PageClass>>,
    reason: Cell<Option<TeardownReason>>,
    started_at: Cell<Option<Instant>>,
    disposed: Cell<bool>,
}

impl Shared {
    fn state(&self) -> BootstrapState {
        *self.state.borrow()
    }

    fn elapsed(&self) -> Duration {
        self.started_at
            .get()
            .map(|at| at.elapsed())
            .unwrap_or_default()
    }

    /// Move to `next` if that is a legal transition.
    fn advance(&self, next: BootstrapState) -> bool {
        let current = self.state();
        if !current.can_advance_to(next) {
            tracing::debug!(from = %current, to = %next, "transition rejected");
            return false;
        }

        self.state.send_replace(next);
        let elapsed = self.elapsed();
        tracing::info!(
            from = %current,
            to = %next,
            elapsed_ms = elapsed.as_millis() as u64,
            "transition"
        );
        for observer in &self.observers {
            observer.on_transition(current, next, elapsed);
        }
        true
    }

    /// Reach `TornDown`. Only the first call has any effect.
    fn tear_down(&self, reason: TeardownReason) -> bool {
        if !self.state().can_advance_to(BootstrapState::TornDown) {
            return false;
        }

        self.reason.set(Some(reason));
        self.advance(BootstrapState::TornDown);

        let elapsed = self.elapsed();
        tracing::info!(%reason, elapsed_ms = elapsed.as_millis() as u64, "torn down");
        for observer in &self.observers {
            observer.on_teardown(reason, elapsed);
        }
        true
    }

    fn record_sweep(&self, report: &SweepReport) {
        let elapsed = self.elapsed();
        for observer in &self.observers {
            observer.on_sweep(report, elapsed);
        }
    }

    /// Readiness as the application announces it.
    fn is_ready(&self) -> bool {
        let doc = self.doc.as_ref();
        let policy = &self.settings.policy;
        let root = doc.root();

        let marked = match &policy.ready_marker {
            ReadyMarker::Class(name) => doc.has_class(root, name),
            ReadyMarker::Attribute(name) => doc
                .attribute(root, name)
                .map(|value| value != "false")
                .unwrap_or(false),
        };
        if marked {
            return true;
        }

        policy.accept_mount_content
            && doc
                .element_by_id(MOUNT_ID)
                .map(|mount| !doc.children(mount).is_empty())
                .unwrap_or(false)
    }

    fn insert_preloader(&self, body: NodeId) {
        let doc = self.doc.as_ref();
        if doc.contains_id(PRELOADER_ID) {
            tracing::debug!("preloader already present");
            return;
        }

        let spec = ElementSpec::new("div")
            .with_id(PRELOADER_ID)
            .with_attr("role", "status")
            .with_attr("aria-busy", "true")
            .with_child(
                ElementSpec::new("img")
                    .with_attr("src", self.urls.logo.as_str())
                    .with_attr("alt", ""),
            )
            .with_child(ElementSpec::new("div").with_class("sf-spinner"));

        let node = doc.create_element(&spec);
        if let Err(err) = doc.prepend_child(body, node) {
            tracing::debug!(error = %err, "preloader insert failed");
        }
    }

    fn insert_mount(&self, body: NodeId) {
        let doc = self.doc.as_ref();
        if doc.contains_id(MOUNT_ID) {
            tracing::debug!("mount node already present");
            return;
        }

        let node = doc.create_element(&ElementSpec::new("div").with_id(MOUNT_ID));
        if let Err(err) = doc.append_child(body, node) {
            tracing::debug!(error = %err, "mount insert failed");
        }
    }

    /// Fade the preloader, wait out the grace delay, then remove it.
    async fn fade_out(&self, reason: TeardownReason) {
        let doc = self.doc.as_ref();
        let policy = &self.settings.policy;

        if let Some(preloader) = doc.element_by_id(PRELOADER_ID) {
            if let Err(err) = doc.add_class(preloader, PRELOADER_DONE_CLASS) {
                tracing::debug!(error = %err, "cannot mark preloader done");
            }
        }

        time::sleep(policy.grace_delay()).await;

        if doc.remove_by_id(PRELOADER_ID) {
            tracing::debug!("preloader removed");
        }
        if policy.remove_critical_style && remove_critical_style(doc) {
            tracing::debug!("critical style removed");
        }

        self.tear_down(reason);
    }
}

/// Everything after the body appears on a storefront page.
async fn run_storefront(shared: Rc<Shared>) {
    let doc = Rc::clone(&shared.doc);
    let policy = shared.settings.policy.clone();
    let deadline = shared.started_at.get().unwrap_or_else(Instant::now) + policy.safety_timeout();

    let body = {
        let mut watcher = Watcher::new(doc.as_ref(), policy.body_poll(), policy.observe_mutations);
        loop {
            if let Some(body) = doc.body() {
                break body;
            }
            watcher.next().await;
        }
    };

    shared.insert_preloader(body);
    shared.insert_mount(body);
    shared.assets.request(doc.as_ref(), &shared.urls);
    shared.advance(BootstrapState::AssetsRequested);
    shared.advance(BootstrapState::WaitingForReadySignal);

    // One watcher owns the readiness wait; it is dropped, and unsubscribed,
    // before teardown starts.
    let reason = {
        let mut watcher = Watcher::new(doc.as_ref(), policy.ready_poll(), policy.observe_mutations);
        tokio::select! {
            biased;
            _ = watcher.until(|| shared.is_ready()) => TeardownReason::ReadySignal,
            _ = time::sleep_until(deadline) => TeardownReason::SafetyTimeout,
        }
    };

    if reason == TeardownReason::SafetyTimeout {
        tracing::warn!(
            timeout_ms = policy.safety_timeout_ms,
            "no readiness signal, forcing preloader away"
        );
    }

    shared.advance(BootstrapState::Ready);
    shared.fade_out(reason).await;
}

/// Orchestrates one page load against a document.
///
/// Owns every task it spawns. `dispose` (or dropping the orchestrator)
/// aborts them; artifacts already in the document stay where they are.
pub struct Bootstrap {
    shared: Rc<Shared>,
    tasks: TaskRegistry,
    load_id: PageLoadId,
    span: Span,
}

impl Bootstrap {
    /// Orchestrator with default behavior for `settings`.
    pub fn new(doc: Rc<dyn Document>, settings: Settings) -> Self {
        Self::builder(doc).settings(settings).build()
    }

    pub fn builder(doc: Rc<dyn Document>) -> BootstrapBuilder {
        BootstrapBuilder::new(doc)
    }

    /// Run the page load for `path`.
    ///
    /// Injects the critical style and runs the first redaction pass before
    /// returning; waiting happens in spawned tasks. A second call returns
    /// the first classification and does nothing else.
    ///
    /// # Panics
    ///
    /// Panics when called outside a `tokio::task::LocalSet`.
    pub fn start(&self, path: &str) -> PageClass {
        let shared = &self.shared;
        if let Some(class) = shared.class.get() {
            tracing::debug!(load_id = %self.load_id, "already started");
            return class;
        }

        let class = shared.settings.classifier.classify(path);
        self.span.record("path", path);
        self.span.record("class", class.as_str());
        let _entered = self.span.enter();

        shared.started_at.set(Some(Instant::now()));
        shared.class.set(Some(class));
        for observer in &shared.observers {
            observer.on_classified(class, path);
        }

        inject_critical_style(shared.doc.as_ref(), &shared.settings.branding, class);
        shared.advance(BootstrapState::StylesInjected);

        self.start_sweeper();

        match class {
            PageClass::NativeCommercePage => {
                let doc = shared.doc.as_ref();
                if doc.remove_by_id(MOUNT_ID) {
                    tracing::debug!("removed pre-existing mount node");
                }
                doc.remove_by_id(PRELOADER_ID);
                shared.tear_down(TeardownReason::NativePage);
            }
            PageClass::StorefrontPage => {
                shared.advance(BootstrapState::WaitingForBody);
                self.tasks.spawn(
                    "bootstrap",
                    run_storefront(Rc::clone(shared)).instrument(self.span.clone()),
                );
            }
        }

        class
    }

    fn start_sweeper(&self) {
        let shared = Rc::clone(&self.shared);
        let sweeper = RedactionSweeper::from_settings(&shared.settings);

        let report = sweeper.sweep(shared.doc.as_ref());
        shared.record_sweep(&report);

        let task = async move {
            let doc = Rc::clone(&shared.doc);
            let policy = &shared.settings.policy;
            sweeper
                .watch(doc, policy.sweep_interval(), policy.observe_mutations, |report| {
                    shared.record_sweep(report)
                })
                .await;
        };
        self.tasks.spawn("sweeper", task.instrument(self.span.clone()));
    }

    pub fn state(&self) -> BootstrapState {
        self.shared.state()
    }

    /// Classification, once started.
    pub fn page_class(&self) -> Option<PageClass> {
        self.shared.class.get()
    }

    /// Why the load was torn down, once it has been.
    pub fn teardown_reason(&self) -> Option<TeardownReason> {
        self.shared.reason.get()
    }

    /// Wait until the load is torn down or the orchestrator is disposed.
    ///
    /// Returns the teardown reason, or `None` if disposed first.
    pub async fn finished(&self) -> Option<TeardownReason> {
        let shared = &self.shared;
        let mut rx = shared.state.subscribe();
        // The sender lives in `shared`, so the channel cannot close here.
        let _ = rx
            .wait_for(|state| state.is_terminal() || shared.disposed.get())
            .await;
        shared.reason.get()
    }

    /// Abort every task. Returns how many were still running.
    pub fn dispose(&self) -> usize {
        let aborted = self.tasks.dispose();
        if !self.shared.disposed.replace(true) {
            tracing::debug!(load_id = %self.load_id, aborted, "disposed");
            self.shared.state.send_modify(|_| {});
        }
        aborted
    }

    pub fn active_tasks(&self) -> usize {
        self.tasks.active()
    }

    pub fn load_id(&self) -> &PageLoadId {
        &self.load_id
    }

    pub fn asset_urls(&self) -> &AssetUrls {
        &self.shared.urls
    }

    pub fn settings(&self) -> &Settings {
        &self.shared.settings
    }
}

impl fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bootstrap")
            .field("load_id", &self.load_id)
            .field("state", &self.state())
            .field("page_class", &self.page_class())
            .field("active_tasks", &self.active_tasks())
            .finish()
    }
}

/// Builder for [`Bootstrap`].
pub struct BootstrapBuilder {
    doc: Rc<dyn Document>,
    settings: Settings,
    observers: Vec<Rc<dyn LifecycleObserver>>,
    cache_bust: Option<CacheBust>,
    load_id: Option<PageLoadId>,
}

impl BootstrapBuilder {
    pub fn new(doc: Rc<dyn Document>) -> Self {
        Self {
            doc,
            settings: Settings::default(),
            observers: Vec::new(),
            cache_bust: None,
            load_id: None,
        }
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Add a lifecycle observer. May be called more than once.
    pub fn observer(mut self, observer: Rc<dyn LifecycleObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Fix the cache-busting token instead of using the current time.
    pub fn cache_bust(mut self, token: CacheBust) -> Self {
        self.cache_bust = Some(token);
        self
    }

    pub fn load_id(mut self, id: PageLoadId) -> Self {
        self.load_id = Some(id);
        self
    }

    pub fn build(self) -> Bootstrap {
        let token = self.cache_bust.unwrap_or_else(CacheBust::now);
        let load_id = self.load_id.unwrap_or_else(PageLoadId::generate);
        let urls = AssetUrls::build(&self.settings.branding, &token);
        let (state, _) = watch::channel(BootstrapState::Idle);

        if let Err(err) = self.settings.policy.validate() {
            tracing::warn!(load_id = %load_id, error = %err, "running with an invalid policy");
        }

        let span = tracing::info_span!(
            "page_load",
            load_id = %load_id,
            path = field::Empty,
            class = field::Empty
        );

        Bootstrap {
            shared: Rc::new(Shared {
                doc: self.doc,
                settings: self.settings,
                observers: self.observers,
                urls,
                assets: AssetLoader::new(),
                state,
                class: Cell::new(None),
                reason: Cell::new(None),
                started_at: Cell::new(None),
                disposed: Cell::new(false),
            }),
            tasks: TaskRegistry::new(),
            load_id,
            span,
        }
    }
}
