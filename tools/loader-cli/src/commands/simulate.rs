//! Page-load simulation against an in-memory document.
//!
//! The host side of the page (body parsing, late chrome, the application's
//! ready signal) is scripted from the command line and runs as local tasks
//! next to the loader.

use std::fs;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use loader_core::{LoaderPolicy, PageLoadId, ReadyMarker, Settings};
use loader_dom::{Document, DomResult, ElementSpec, MemoryDocument};
use loader_observability::{MetricsCollector, TimelineRecorder};
use loader_runtime::Bootstrap;
use serde_json::json;
use tokio::task::{JoinHandle, LocalSet};
use tokio::time::{self, Instant};

use super::SimulateArgs;
use crate::context::Context;
use crate::output::{class_badge, format_ms, reason_badge};

/// Extra time after the last scripted event before the run is closed.
const SETTLE: Duration = Duration::from_millis(50);

/// Run the simulate command.
pub async fn run(args: SimulateArgs, ctx: &Context) -> Result<()> {
    let mut settings = ctx.settings()?;
    if let Some(ref preset) = args.preset {
        let policy = LoaderPolicy::preset(preset)
            .with_context(|| format!("Invalid --preset '{}'", preset))?;
        settings = settings.with_policy(policy);
    }

    LocalSet::new().run_until(simulate(args, settings, ctx)).await
}

async fn simulate(args: SimulateArgs, settings: Settings, ctx: &Context) -> Result<()> {
    let operator = settings
        .branding
        .redacted_names
        .first()
        .cloned()
        .unwrap_or_else(|| "Operator".to_string());

    let doc = Rc::new(match args.body_after_ms {
        Some(_) => MemoryDocument::new(),
        None => MemoryDocument::with_body(),
    });
    if args.body_after_ms.is_none() {
        add_host_chrome(&doc, &operator)?;
    }

    let load_id = PageLoadId::generate();
    let metrics = Rc::new(MetricsCollector::new(&load_id));
    let recorder = Rc::new(TimelineRecorder::new(&load_id));

    let bootstrap = Bootstrap::builder(doc.clone())
        .settings(settings.clone())
        .observer(metrics.clone())
        .observer(recorder.clone())
        .load_id(load_id)
        .build();

    ctx.output.header(&format!("Simulating {}", args.path));
    ctx.output.kv("Load ID", bootstrap.load_id().as_str());
    ctx.output
        .kv("Safety timeout", &format_ms(settings.policy.safety_timeout_ms));
    ctx.output.kv("Grace delay", &format_ms(settings.policy.grace_delay_ms));

    let host = script_host(&args, &settings, &doc, &operator);

    let spinner = ctx.output.spinner("Waiting for teardown...");
    let started = Instant::now();
    let class = bootstrap.start(&args.path);
    let reason = bootstrap.finished().await;

    // Let late host events land and get swept before closing the run.
    if let Some(leak) = args.leak_after_ms {
        let deadline = started + Duration::from_millis(leak) + settings.policy.sweep_interval() + SETTLE;
        time::sleep_until(deadline).await;
    }
    spinner.finish_and_clear();

    let aborted = bootstrap.dispose();
    for task in &host {
        task.abort();
    }
    ctx.output.debug(&format!("Disposed {} loader task(s)", aborted));

    let load_metrics = metrics.snapshot();
    let timeline = recorder.finalize(Some(load_metrics.clone()));
    ctx.output.debug(&format!("Metrics: {}", load_metrics.to_json()));

    if let Some(ref record) = args.record {
        let path = ctx.resolve_path(record);
        let content = timeline.to_json()?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write timeline: {}", path.display()))?;
        ctx.output.debug(&format!("Timeline saved to {}", path.display()));
    }

    if ctx.output.is_json() {
        let mut value = json!({
            "path": args.path,
            "class": class.as_str(),
            "teardown_reason": reason.map(|r| r.as_str()),
            "timeline": timeline,
        });
        if args.html {
            value["html"] = json!(doc.to_html());
        }
        ctx.output.json(&value);
        return Ok(());
    }

    ctx.output.kv("Page class", &class_badge(class));
    ctx.output.kv("Teardown", &reason_badge(reason));

    ctx.output.header("Timeline");
    ctx.output.raw(&timeline.render());

    ctx.output.header("Metrics");
    ctx.output.raw(&load_metrics.to_summary());

    if args.html {
        ctx.output.header("Document");
        ctx.output.raw(&doc.to_html());
    }

    if let Some(ref record) = args.record {
        ctx.output.success(&format!("Timeline recorded: {}", record));
    }

    Ok(())
}

/// Spawn the scripted host events. Offsets are from now.
fn script_host(
    args: &SimulateArgs,
    settings: &Settings,
    doc: &Rc<MemoryDocument>,
    operator: &str,
) -> Vec<JoinHandle<()>> {
    let mut tasks = Vec::new();

    if let Some(ms) = args.body_after_ms {
        let doc = doc.clone();
        let operator = operator.to_string();
        tasks.push(after(ms, move || {
            doc.ensure_body();
            add_host_chrome(&doc, &operator)
        }));
    }

    if let Some(ms) = args.leak_after_ms {
        let doc = doc.clone();
        let operator = operator.to_string();
        tasks.push(after(ms, move || leak_operator_name(&doc, &operator)));
    }

    if !args.never_ready {
        let doc = doc.clone();
        let marker = settings.policy.ready_marker.clone();
        tasks.push(after(args.ready_after_ms, move || signal_ready(&doc, &marker)));
    }

    tasks
}

fn after<F>(ms: u64, event: F) -> JoinHandle<()>
where
    F: FnOnce() -> DomResult<()> + 'static,
{
    tokio::task::spawn_local(async move {
        time::sleep(Duration::from_millis(ms)).await;
        if let Err(e) = event() {
            tracing::warn!(error = %e, "host event failed");
        }
    })
}

/// Header chrome as the host theme renders it.
fn add_host_chrome(doc: &MemoryDocument, operator: &str) -> DomResult<()> {
    let body = doc.ensure_body();
    let header = ElementSpec::new("header")
        .with_class("store-header")
        .with_child(
            ElementSpec::new("div")
                .with_class("store-name")
                .with_text(format!("{} Store", operator)),
        );
    doc.append_element(body, &header)?;
    Ok(())
}

/// Chrome injected after load, e.g. by a host widget.
fn leak_operator_name(doc: &MemoryDocument, operator: &str) -> DomResult<()> {
    let body = doc.ensure_body();
    let banner = ElementSpec::new("div")
        .with_class("promo-banner")
        .with_child(ElementSpec::new("p").with_text(format!("Powered by {}", operator)));
    doc.append_element(body, &banner)?;
    Ok(())
}

fn signal_ready(doc: &MemoryDocument, marker: &ReadyMarker) -> DomResult<()> {
    let root = doc.root();
    match marker {
        ReadyMarker::Class(name) => doc.add_class(root, name),
        ReadyMarker::Attribute(name) => doc.set_attribute(root, name, "true"),
    }
}
