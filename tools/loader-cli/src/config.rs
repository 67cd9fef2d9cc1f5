//! Config file loading and generation.

use std::path::Path;

use anyhow::{Context, Result};
use loader_core::LoaderConfig;

/// File names searched for, in order, in each directory.
pub const CONFIG_NAMES: [&str; 3] = ["loader.toml", ".loader.toml", "loader.json"];

/// Load config from a file, TOML or JSON by extension.
pub fn load(path: &Path) -> Result<LoaderConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    if is_json(path) {
        LoaderConfig::from_json_str(&content)
            .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
    } else {
        LoaderConfig::from_toml_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }
}

/// Save config to a file, TOML or JSON by extension.
pub fn save(config: &LoaderConfig, path: &Path) -> Result<()> {
    let content = if is_json(path) {
        serde_json::to_string_pretty(config)?
    } else {
        toml::to_string_pretty(config)?
    };

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}

/// Generate a default loader.toml.
pub fn generate_default_config(asset_origin: &str) -> String {
    format!(
        r##"# Storefront bootstrap loader configuration

[branding]
asset_origin = "{origin}"
asset_path = "/assets"
stylesheet_file = "index.css"
script_file = "index.js"
logo_path = "/logo.svg"
background_color = "#0b0b0f"
accent_color = "#c9a45c"
chrome_selectors = ["header", "footer", "nav", ".store-header", ".store-footer"]
redacted_names = ["Salla", "سلة"]

[policy]
# One of: swift, standard, patient, conservative
preset = "standard"
# safety_timeout_ms = 3000
# ready_marker = {{ type = "class", name = "app-ready" }}
remove_critical_style = false

[classifier]
native_markers = ["/payment", "/checkout", "/cart"]

[environments.staging.policy]
preset = "patient"

[environments.production.policy]
preset = "standard"
"##,
        origin = asset_origin
    )
}
