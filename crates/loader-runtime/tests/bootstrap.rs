//! End-to-end page loads against the in-memory document.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use loader_core::ids::{ARTIFACT_IDS, CRITICAL_STYLE_ID, MOUNT_ID, PRELOADER_ID, SCRIPT_ID, STYLESHEET_ID};
use loader_core::{
    classify, BootstrapState, CacheBust, LoaderPolicy, PageClass, Settings, TeardownReason,
};
use loader_dom::{Document, ElementSpec, MemoryDocument, Mutation};
use loader_runtime::{inject_critical_style, Bootstrap};
use tokio::task::LocalSet;
use tokio::time::{self, Instant};

fn bootstrap(doc: &Rc<MemoryDocument>) -> Bootstrap {
    Bootstrap::builder(doc.clone())
        .settings(Settings::default())
        .cache_bust(CacheBust::new("1700000000000"))
        .build()
}

/// Virtual time lands on millisecond ticks; allow for rounding.
fn assert_near(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual <= expected + Duration::from_millis(2),
        "expected about {:?}, got {:?}",
        expected,
        actual
    );
}

fn artifact_counts(doc: &MemoryDocument) -> Vec<(&'static str, usize)> {
    ARTIFACT_IDS
        .iter()
        .map(|id| (*id, doc.count_by_id(id)))
        .collect()
}

/// Counts how often the preloader goes from present to absent.
fn count_preloader_removals(
    doc: &Rc<MemoryDocument>,
) -> (Rc<Cell<usize>>, tokio::task::JoinHandle<()>) {
    let removals = Rc::new(Cell::new(0));
    let mut rx = doc.subscribe().unwrap();
    let body = doc.body().unwrap();
    let task = {
        let doc = doc.clone();
        let removals = removals.clone();
        tokio::task::spawn_local(async move {
            let mut present = doc.contains_id(PRELOADER_ID);
            while let Ok(mutation) = rx.recv().await {
                if mutation != (Mutation::ChildList { target: body }) {
                    continue;
                }
                let now = doc.contains_id(PRELOADER_ID);
                if present && !now {
                    removals.set(removals.get() + 1);
                }
                present = now;
            }
        })
    };
    (removals, task)
}

#[test]
fn native_paths_are_classified_case_insensitively() {
    for path in ["/checkout", "/CART/items", "/store/Payment/confirm", "/x/checkout?step=2"] {
        assert_eq!(classify(path), PageClass::NativeCommercePage, "{}", path);
    }
    for path in ["/", "/products/42", "/account/orders", "/pay"] {
        assert_eq!(classify(path), PageClass::StorefrontPage, "{}", path);
    }
}

#[test]
fn critical_style_is_injected_once() {
    let doc = MemoryDocument::new();
    let settings = Settings::default();

    inject_critical_style(&doc, &settings.branding, PageClass::StorefrontPage);
    inject_critical_style(&doc, &settings.branding, PageClass::StorefrontPage);

    assert_eq!(doc.count_by_id(CRITICAL_STYLE_ID), 1);
}

#[tokio::test(start_paused = true)]
async fn storefront_has_one_mount_and_one_preloader() {
    LocalSet::new()
        .run_until(async {
            let doc = Rc::new(MemoryDocument::with_body());
            let loader = bootstrap(&doc);
            loader.start("/products/42");

            time::sleep(Duration::from_millis(1)).await;
            assert_eq!(loader.state(), BootstrapState::WaitingForReadySignal);
            assert_eq!(doc.count_by_id(MOUNT_ID), 1);
            assert_eq!(doc.count_by_id(PRELOADER_ID), 1);
            assert_eq!(doc.count_by_id(STYLESHEET_ID), 1);
            assert_eq!(doc.count_by_id(SCRIPT_ID), 1);

            let script = doc.element_by_id(SCRIPT_ID).unwrap();
            assert_eq!(
                doc.attribute(script, "src").as_deref(),
                Some("https://storefront.example.com/assets/index.js?v=1700000000000")
            );
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn native_page_never_gets_bootstrap_artifacts() {
    LocalSet::new()
        .run_until(async {
            let doc = Rc::new(MemoryDocument::with_body());
            let body = doc.body().unwrap();
            doc.append_element(body, &ElementSpec::new("div").with_id(MOUNT_ID))
                .unwrap();

            let loader = bootstrap(&doc);
            assert_eq!(loader.start("/Checkout/step-1"), PageClass::NativeCommercePage);

            time::sleep(Duration::from_secs(10)).await;
            assert_eq!(loader.state(), BootstrapState::TornDown);
            assert_eq!(loader.teardown_reason(), Some(TeardownReason::NativePage));
            assert_eq!(doc.count_by_id(MOUNT_ID), 0);
            assert_eq!(doc.count_by_id(PRELOADER_ID), 0);
            assert_eq!(doc.count_by_tag("link"), 0);
            assert_eq!(doc.count_by_tag("script"), 0);
            assert_eq!(doc.count_by_id(CRITICAL_STYLE_ID), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn ready_signal_tears_down_after_grace_delay() {
    LocalSet::new()
        .run_until(async {
            let doc = Rc::new(MemoryDocument::with_body());
            let loader = bootstrap(&doc);
            let policy = LoaderPolicy::default();
            let start = Instant::now();
            loader.start("/");

            time::sleep(Duration::from_millis(500)).await;
            doc.add_class(doc.root(), "app-ready").unwrap();

            assert_eq!(loader.finished().await, Some(TeardownReason::ReadySignal));
            let elapsed = start.elapsed();
            assert_near(elapsed, Duration::from_millis(500) + policy.grace_delay());
            assert!(elapsed < policy.safety_timeout());
            assert_eq!(doc.count_by_id(PRELOADER_ID), 0);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn ready_signal_is_seen_by_polling_alone() {
    LocalSet::new()
        .run_until(async {
            let doc = Rc::new(MemoryDocument::unobservable());
            doc.ensure_body();
            let loader = bootstrap(&doc);
            let policy = LoaderPolicy::default();
            let start = Instant::now();
            loader.start("/");

            time::sleep(Duration::from_millis(250)).await;
            doc.add_class(doc.root(), "app-ready").unwrap();

            loader.finished().await;
            let elapsed = start.elapsed();
            assert!(elapsed >= Duration::from_millis(250) + policy.grace_delay());
            assert!(
                elapsed
                    <= Duration::from_millis(252) + policy.ready_poll() + policy.grace_delay()
            );
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn missing_ready_signal_hits_safety_timeout() {
    LocalSet::new()
        .run_until(async {
            let doc = Rc::new(MemoryDocument::with_body());
            let (removals, counter) = count_preloader_removals(&doc);
            let loader = bootstrap(&doc);
            let policy = LoaderPolicy::default();
            let start = Instant::now();
            loader.start("/");

            time::sleep(policy.safety_timeout() - Duration::from_millis(1)).await;
            assert_eq!(loader.state(), BootstrapState::WaitingForReadySignal);
            assert_eq!(doc.count_by_id(PRELOADER_ID), 1);

            time::sleep(Duration::from_millis(5)).await;
            assert_eq!(loader.state(), BootstrapState::Ready);

            assert_eq!(loader.finished().await, Some(TeardownReason::SafetyTimeout));
            assert_near(start.elapsed(), policy.safety_timeout() + policy.grace_delay());
            assert_eq!(doc.count_by_id(PRELOADER_ID), 0);

            // A late signal changes nothing.
            doc.add_class(doc.root(), "app-ready").unwrap();
            time::sleep(Duration::from_secs(5)).await;
            assert_eq!(loader.teardown_reason(), Some(TeardownReason::SafetyTimeout));
            assert_eq!(loader.state(), BootstrapState::TornDown);
            assert_eq!(removals.get(), 1);
            counter.abort();
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn late_operator_name_is_hidden() {
    LocalSet::new()
        .run_until(async {
            let doc = Rc::new(MemoryDocument::with_body());
            let body = doc.body().unwrap();
            let early = doc
                .append_element(body, &ElementSpec::new("span").with_text("Powered by Salla"))
                .unwrap();

            let loader = bootstrap(&doc);
            loader.start("/checkout");
            assert!(doc.is_hidden(early));

            time::sleep(Duration::from_secs(2)).await;
            let late = doc
                .append_element(body, &ElementSpec::new("footer").with_text("متجر سلة"))
                .unwrap();
            time::sleep(Duration::from_millis(1)).await;
            assert!(doc.is_hidden(late));
            assert!(doc.is_connected(late));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn late_operator_name_is_hidden_within_one_sweep_interval() {
    LocalSet::new()
        .run_until(async {
            let doc = Rc::new(MemoryDocument::unobservable());
            let body = doc.ensure_body();
            let loader = bootstrap(&doc);
            let policy = LoaderPolicy::default();
            loader.start("/");

            let late = doc
                .append_element(body, &ElementSpec::new("p").with_text("SALLA"))
                .unwrap();
            assert!(!doc.is_hidden(late));

            time::sleep(policy.sweep_interval() + Duration::from_millis(5)).await;
            assert!(doc.is_hidden(late));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn bootstrapping_twice_matches_once() {
    LocalSet::new()
        .run_until(async {
            let once = Rc::new(MemoryDocument::with_body());
            let single = bootstrap(&once);
            single.start("/");
            time::sleep(Duration::from_millis(1)).await;

            let twice = Rc::new(MemoryDocument::with_body());
            let first = bootstrap(&twice);
            let second = bootstrap(&twice);
            first.start("/");
            first.start("/");
            second.start("/");
            time::sleep(Duration::from_millis(1)).await;

            assert_eq!(artifact_counts(&once), artifact_counts(&twice));
            assert!(artifact_counts(&twice).iter().all(|(_, n)| *n == 1));

            twice.add_class(twice.root(), "app-ready").unwrap();
            first.finished().await;
            second.finished().await;
            assert_eq!(twice.count_by_id(PRELOADER_ID), 0);
            assert_eq!(twice.count_by_id(MOUNT_ID), 1);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn dispose_clears_every_task() {
    LocalSet::new()
        .run_until(async {
            let doc = Rc::new(MemoryDocument::with_body());
            let loader = bootstrap(&doc);
            loader.start("/");
            doc.add_class(doc.root(), "app-ready").unwrap();
            loader.finished().await;

            // The sweeper outlives teardown until disposed.
            assert_eq!(loader.active_tasks(), 1);
            assert_eq!(loader.dispose(), 1);
            assert_eq!(loader.active_tasks(), 0);

            let body = doc.body().unwrap();
            let late = doc
                .append_element(body, &ElementSpec::new("span").with_text("Salla"))
                .unwrap();
            time::sleep(Duration::from_secs(5)).await;
            assert!(!doc.is_hidden(late));
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn zero_polling_periods_still_reach_teardown() {
    LocalSet::new()
        .run_until(async {
            let doc = Rc::new(MemoryDocument::unobservable());
            let policy = LoaderPolicy {
                body_poll_ms: 0,
                ready_poll_ms: 0,
                sweep_interval_ms: 0,
                ..LoaderPolicy::default()
            };
            let loader = Bootstrap::builder(doc.clone())
                .settings(Settings::default().with_policy(policy))
                .build();
            loader.start("/");

            time::sleep(Duration::from_millis(10)).await;
            let body = doc.ensure_body();
            let late = doc
                .append_element(body, &ElementSpec::new("span").with_text("Salla"))
                .unwrap();

            let reason = time::timeout(Duration::from_secs(60), loader.finished()).await;
            assert_eq!(reason, Ok(Some(TeardownReason::SafetyTimeout)));
            assert_eq!(doc.count_by_id(PRELOADER_ID), 0);
            assert!(doc.is_hidden(late));
            loader.dispose();
        })
        .await;
}
