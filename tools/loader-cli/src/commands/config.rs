//! Configuration management commands.

use std::fs;

use anyhow::{bail, Context as _, Result};
use dialoguer::Confirm;
use loader_core::{LoaderPolicy, ReadyMarker, PRESET_NAMES};

use super::{ConfigArgs, ConfigCommand};
use crate::config::generate_default_config;
use crate::context::Context;
use crate::output::format_ms;

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => show_config(ctx).await,
        ConfigCommand::Init { force, origin } => init_config(force, &origin, ctx).await,
        ConfigCommand::Validate => validate_config(ctx).await,
        ConfigCommand::Presets => list_presets(ctx).await,
    }
}

async fn show_config(ctx: &Context) -> Result<()> {
    let config = ctx.effective_config();

    if ctx.output.is_json() {
        ctx.output.json(&config);
        return Ok(());
    }

    ctx.output.header("Current Configuration");
    match ctx.config_path {
        Some(ref path) => ctx.output.kv("file", &path.display().to_string()),
        None => ctx.output.kv("file", "(built-in defaults)"),
    }
    if let Some(ref env) = ctx.env {
        ctx.output.kv("environment", env);
    }

    // Branding
    let branding = &config.branding;
    ctx.output.info("");
    ctx.output.info("[branding]");
    ctx.output.kv("asset_origin", &branding.asset_origin);
    ctx.output.kv("asset_path", &branding.asset_path);
    ctx.output.kv("stylesheet_file", &branding.stylesheet_file);
    ctx.output.kv("script_file", &branding.script_file);
    ctx.output.kv("logo_path", &branding.logo_path);
    ctx.output.kv("background_color", &branding.background_color);
    ctx.output.kv("accent_color", &branding.accent_color);
    ctx.output
        .kv("chrome_selectors", &branding.chrome_selectors.join(", "));
    ctx.output.kv("redacted_names", &branding.redacted_names.join(", "));

    // Policy, as resolved
    ctx.output.info("");
    ctx.output.info("[policy]");
    match config.policy.resolve() {
        Ok(policy) => print_policy(&policy, ctx),
        Err(e) => ctx.output.warn(&format!("Policy does not resolve: {}", e)),
    }

    ctx.output.info("");
    ctx.output.info("[classifier]");
    ctx.output
        .kv("native_markers", &config.classifier.native_markers.join(", "));

    if !ctx.config.environments.is_empty() {
        ctx.output.info("");
        ctx.output.info("Environments:");
        let mut names: Vec<&String> = ctx.config.environments.keys().collect();
        names.sort();
        for env in names {
            ctx.output.list_item(env);
        }
    }

    Ok(())
}

fn print_policy(policy: &LoaderPolicy, ctx: &Context) {
    ctx.output
        .kv("safety_timeout", &format_ms(policy.safety_timeout_ms));
    ctx.output.kv("grace_delay", &format_ms(policy.grace_delay_ms));
    ctx.output.kv("body_poll", &format_ms(policy.body_poll_ms));
    ctx.output.kv("ready_poll", &format_ms(policy.ready_poll_ms));
    ctx.output
        .kv("sweep_interval", &format_ms(policy.sweep_interval_ms));
    let marker = match policy.ready_marker {
        ReadyMarker::Class(ref name) => format!("class '{}'", name),
        ReadyMarker::Attribute(ref name) => format!("attribute '{}'", name),
    };
    ctx.output.kv("ready_marker", &marker);
    ctx.output.kv(
        "accept_mount_content",
        &policy.accept_mount_content.to_string(),
    );
    ctx.output
        .kv("observe_mutations", &policy.observe_mutations.to_string());
    ctx.output.kv(
        "remove_critical_style",
        &policy.remove_critical_style.to_string(),
    );
    ctx.output.kv(
        "hide_header_ancestors",
        &policy.hide_header_ancestors.to_string(),
    );
}

async fn init_config(force: bool, origin: &str, ctx: &Context) -> Result<()> {
    let config_path = ctx.cwd.join("loader.toml");

    if config_path.exists() && !force {
        if ctx.output.is_json() {
            bail!(
                "Config file already exists: {}. Use --force to overwrite.",
                config_path.display()
            );
        }

        let confirmed = Confirm::new()
            .with_prompt(format!("{} exists. Overwrite?", config_path.display()))
            .default(false)
            .interact()?;

        if !confirmed {
            ctx.output.warn("Init cancelled");
            return Ok(());
        }
    }

    let content = generate_default_config(origin);
    fs::write(&config_path, content)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    ctx.output.success(&format!("Created: {}", config_path.display()));

    Ok(())
}

async fn validate_config(ctx: &Context) -> Result<()> {
    ctx.output.header("Validating configuration");

    ctx.config
        .validate()
        .context("Configuration is invalid")?;

    let mut warnings: Vec<String> = Vec::new();
    let config = ctx.effective_config();

    if config.branding.redacted_names.iter().all(|n| n.trim().is_empty()) {
        warnings.push("branding.redacted_names is empty; nothing will be redacted".to_string());
    }
    if config.branding.chrome_selectors.is_empty() {
        warnings.push("branding.chrome_selectors is empty; host chrome stays visible".to_string());
    }
    if config.classifier.native_markers.is_empty() {
        warnings.push("classifier.native_markers is empty; every page gets the storefront".to_string());
    }

    for warning in &warnings {
        ctx.output.warn(&format!("Warning: {}", warning));
    }

    if ctx.output.is_json() {
        ctx.output.json(&serde_json::json!({
            "valid": true,
            "warnings": warnings,
            "policy": config.settings()?.policy,
        }));
        return Ok(());
    }

    let settings = ctx.settings()?;
    ctx.output.info("Resolved policy:");
    print_policy(&settings.policy, ctx);

    if warnings.is_empty() {
        ctx.output.success("Configuration is valid");
    } else {
        ctx.output.success("Configuration is valid (with warnings)");
    }

    Ok(())
}

async fn list_presets(ctx: &Context) -> Result<()> {
    let presets = PRESET_NAMES
        .iter()
        .map(|name| LoaderPolicy::preset(name).map(|policy| (*name, policy)))
        .collect::<Result<Vec<_>, _>>()?;

    if ctx.output.is_json() {
        let table: serde_json::Map<String, serde_json::Value> = presets
            .iter()
            .map(|(name, policy)| serde_json::to_value(policy).map(|value| (name.to_string(), value)))
            .collect::<Result<_, _>>()?;
        ctx.output.json(&table);
        return Ok(());
    }

    ctx.output.header("Policy presets");
    let widths = [14, 8, 8, 8, 8, 8];
    ctx.output
        .table_row(&["NAME", "TIMEOUT", "GRACE", "BODY", "READY", "SWEEP"], &widths);
    for (name, policy) in &presets {
        ctx.output.table_row(
            &[
                *name,
                &format_ms(policy.safety_timeout_ms),
                &format_ms(policy.grace_delay_ms),
                &format_ms(policy.body_poll_ms),
                &format_ms(policy.ready_poll_ms),
                &format_ms(policy.sweep_interval_ms),
            ],
            &widths,
        );
    }

    Ok(())
}
