//! Branding constants, timing policy and the preset table.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::PageClassifier;
use crate::error::{LoaderError, LoaderResult};

/// Static branding for the injected storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandingConfig {
    /// Absolute origin the bundle is served from (no trailing slash needed).
    #[serde(default = "default_asset_origin")]
    pub asset_origin: String,

    /// Path under the origin holding the bundle files.
    #[serde(default = "default_asset_path")]
    pub asset_path: String,

    /// Stylesheet file name inside `asset_path`.
    #[serde(default = "default_stylesheet_file")]
    pub stylesheet_file: String,

    /// Module script file name inside `asset_path`.
    #[serde(default = "default_script_file")]
    pub script_file: String,

    /// Logo path under the origin, shown in the preloader.
    #[serde(default = "default_logo_path")]
    pub logo_path: String,

    /// Page and preloader background.
    #[serde(default = "default_background_color")]
    pub background_color: String,

    /// Spinner color.
    #[serde(default = "default_accent_color")]
    pub accent_color: String,

    /// Host chrome hidden on storefront pages.
    #[serde(default = "default_chrome_selectors")]
    pub chrome_selectors: Vec<String>,

    /// Operator names that must never be visible.
    #[serde(default = "default_redacted_names")]
    pub redacted_names: Vec<String>,
}

fn default_asset_origin() -> String {
    "https://storefront.example.com".to_string()
}

fn default_asset_path() -> String {
    "/assets".to_string()
}

fn default_stylesheet_file() -> String {
    "index.css".to_string()
}

fn default_script_file() -> String {
    "index.js".to_string()
}

fn default_logo_path() -> String {
    "/logo.svg".to_string()
}

fn default_background_color() -> String {
    "#0b0b0f".to_string()
}

fn default_accent_color() -> String {
    "#c9a45c".to_string()
}

fn default_chrome_selectors() -> Vec<String> {
    [
        "header",
        "footer",
        "nav",
        ".store-header",
        ".store-footer",
        ".main-nav-container",
        ".top-navbar",
        ".store-name",
        "#app-install-banner",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_redacted_names() -> Vec<String> {
    vec!["Salla".to_string(), "سلة".to_string()]
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            asset_origin: default_asset_origin(),
            asset_path: default_asset_path(),
            stylesheet_file: default_stylesheet_file(),
            script_file: default_script_file(),
            logo_path: default_logo_path(),
            background_color: default_background_color(),
            accent_color: default_accent_color(),
            chrome_selectors: default_chrome_selectors(),
            redacted_names: default_redacted_names(),
        }
    }
}

impl BrandingConfig {
    /// Check the origin and colors.
    pub fn validate(&self) -> LoaderResult<()> {
        validate_origin(&self.asset_origin)?;
        if self.background_color.trim().is_empty() {
            return Err(LoaderError::Config("background_color is empty".to_string()));
        }
        if self.accent_color.trim().is_empty() {
            return Err(LoaderError::Config("accent_color is empty".to_string()));
        }
        Ok(())
    }
}

fn validate_origin(origin: &str) -> LoaderResult<()> {
    let (scheme, rest) = origin
        .split_once("://")
        .ok_or_else(|| LoaderError::InvalidAssetOrigin(format!("{} (missing scheme)", origin)))?;

    if !matches!(scheme.to_lowercase().as_str(), "http" | "https") {
        return Err(LoaderError::InvalidAssetOrigin(format!(
            "{} (scheme must be http or https)",
            origin
        )));
    }

    let host = rest.split('/').next().unwrap_or(rest);
    if host.is_empty() {
        return Err(LoaderError::InvalidAssetOrigin(format!("{} (missing host)", origin)));
    }

    Ok(())
}

/// How the application announces its first render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "name", rename_all = "lowercase")]
pub enum ReadyMarker {
    /// A class added to the root element.
    Class(String),
    /// An attribute set on the root element.
    Attribute(String),
}

impl Default for ReadyMarker {
    fn default() -> Self {
        Self::Class("app-ready".to_string())
    }
}

/// Resolved timing and behavior policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderPolicy {
    /// Upper bound from start until the preloader is forced away.
    pub safety_timeout_ms: u64,
    /// Delay between readiness and preloader removal, covers the fade.
    pub grace_delay_ms: u64,
    /// Polling cadence while waiting for the body.
    pub body_poll_ms: u64,
    /// Polling cadence while waiting for readiness.
    pub ready_poll_ms: u64,
    /// Polling cadence of the redaction sweeper.
    pub sweep_interval_ms: u64,
    pub ready_marker: ReadyMarker,
    /// Treat any child of the mount node as readiness.
    pub accept_mount_content: bool,
    /// Wake watchers on document mutations, not only on the poll.
    pub observe_mutations: bool,
    /// Drop the critical style element at teardown.
    pub remove_critical_style: bool,
    /// Also hide the nearest header-like ancestor of a redacted element.
    pub hide_header_ancestors: bool,
}

/// Names of the built-in presets, in table order.
pub const PRESET_NAMES: [&str; 4] = ["swift", "standard", "patient", "conservative"];

impl LoaderPolicy {
    /// Look up a named preset.
    pub fn preset(name: &str) -> LoaderResult<Self> {
        let (safety, grace, body, ready, sweep) = match name.to_lowercase().as_str() {
            "swift" => (2500, 300, 10, 50, 500),
            "standard" => (3000, 400, 20, 100, 1000),
            "patient" => (5000, 500, 50, 100, 1000),
            "conservative" => (8000, 600, 50, 200, 2000),
            _ => return Err(LoaderError::UnknownPreset(name.to_string())),
        };

        Ok(Self {
            safety_timeout_ms: safety,
            grace_delay_ms: grace,
            body_poll_ms: body,
            ready_poll_ms: ready,
            sweep_interval_ms: sweep,
            ..Self::base()
        })
    }

    fn base() -> Self {
        Self {
            safety_timeout_ms: 3000,
            grace_delay_ms: 400,
            body_poll_ms: 20,
            ready_poll_ms: 100,
            sweep_interval_ms: 1000,
            ready_marker: ReadyMarker::default(),
            accept_mount_content: true,
            observe_mutations: true,
            remove_critical_style: false,
            hide_header_ancestors: true,
        }
    }

    pub fn safety_timeout(&self) -> Duration {
        Duration::from_millis(self.safety_timeout_ms)
    }

    pub fn grace_delay(&self) -> Duration {
        Duration::from_millis(self.grace_delay_ms)
    }

    pub fn body_poll(&self) -> Duration {
        Duration::from_millis(self.body_poll_ms)
    }

    pub fn ready_poll(&self) -> Duration {
        Duration::from_millis(self.ready_poll_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    /// Reject zero intervals and a grace delay that outlasts the timeout.
    pub fn validate(&self) -> LoaderResult<()> {
        let intervals = [
            ("safety_timeout_ms", self.safety_timeout_ms),
            ("grace_delay_ms", self.grace_delay_ms),
            ("body_poll_ms", self.body_poll_ms),
            ("ready_poll_ms", self.ready_poll_ms),
            ("sweep_interval_ms", self.sweep_interval_ms),
        ];
        for (field, value) in intervals {
            if value == 0 {
                return Err(LoaderError::InvalidTiming {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }

        if self.grace_delay_ms >= self.safety_timeout_ms {
            return Err(LoaderError::InvalidTiming {
                field: "grace_delay_ms",
                reason: format!(
                    "{}ms must be shorter than safety_timeout_ms ({}ms)",
                    self.grace_delay_ms, self.safety_timeout_ms
                ),
            });
        }

        Ok(())
    }
}

impl Default for LoaderPolicy {
    fn default() -> Self {
        Self::base()
    }
}

/// Policy as written in a config file: a preset plus optional overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grace_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_poll_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_poll_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep_interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_marker: Option<ReadyMarker>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept_mount_content: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observe_mutations: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_critical_style: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide_header_ancestors: Option<bool>,
}

impl PolicySettings {
    /// Start from a preset by name.
    pub fn from_preset(name: impl Into<String>) -> Self {
        Self {
            preset: Some(name.into()),
            ..Default::default()
        }
    }

    /// Layer `other` on top of `self`; set fields in `other` win.
    pub fn merged_with(&self, other: &PolicySettings) -> PolicySettings {
        PolicySettings {
            preset: other.preset.clone().or_else(|| self.preset.clone()),
            safety_timeout_ms: other.safety_timeout_ms.or(self.safety_timeout_ms),
            grace_delay_ms: other.grace_delay_ms.or(self.grace_delay_ms),
            body_poll_ms: other.body_poll_ms.or(self.body_poll_ms),
            ready_poll_ms: other.ready_poll_ms.or(self.ready_poll_ms),
            sweep_interval_ms: other.sweep_interval_ms.or(self.sweep_interval_ms),
            ready_marker: other.ready_marker.clone().or_else(|| self.ready_marker.clone()),
            accept_mount_content: other.accept_mount_content.or(self.accept_mount_content),
            observe_mutations: other.observe_mutations.or(self.observe_mutations),
            remove_critical_style: other.remove_critical_style.or(self.remove_critical_style),
            hide_header_ancestors: other.hide_header_ancestors.or(self.hide_header_ancestors),
        }
    }

    /// Resolve to a concrete, validated policy.
    pub fn resolve(&self) -> LoaderResult<LoaderPolicy> {
        let mut policy = match &self.preset {
            Some(name) => LoaderPolicy::preset(name)?,
            None => LoaderPolicy::default(),
        };

        if let Some(v) = self.safety_timeout_ms {
            policy.safety_timeout_ms = v;
        }
        if let Some(v) = self.grace_delay_ms {
            policy.grace_delay_ms = v;
        }
        if let Some(v) = self.body_poll_ms {
            policy.body_poll_ms = v;
        }
        if let Some(v) = self.ready_poll_ms {
            policy.ready_poll_ms = v;
        }
        if let Some(v) = self.sweep_interval_ms {
            policy.sweep_interval_ms = v;
        }
        if let Some(ref marker) = self.ready_marker {
            policy.ready_marker = marker.clone();
        }
        if let Some(v) = self.accept_mount_content {
            policy.accept_mount_content = v;
        }
        if let Some(v) = self.observe_mutations {
            policy.observe_mutations = v;
        }
        if let Some(v) = self.remove_critical_style {
            policy.remove_critical_style = v;
        }
        if let Some(v) = self.hide_header_ancestors {
            policy.hide_header_ancestors = v;
        }

        policy.validate()?;
        Ok(policy)
    }
}

/// Per-environment overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branding: Option<BrandingConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicySettings>,
}

/// Loader configuration file (`loader.toml` / `loader.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default)]
    pub branding: BrandingConfig,

    #[serde(default)]
    pub policy: PolicySettings,

    #[serde(default)]
    pub classifier: PageClassifier,

    #[serde(default)]
    pub environments: HashMap<String, EnvironmentConfig>,
}

impl LoaderConfig {
    /// Parse from TOML text.
    pub fn from_toml_str(content: &str) -> LoaderResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Parse from JSON text.
    pub fn from_json_str(content: &str) -> LoaderResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Apply the overrides of a named environment, if it exists.
    pub fn for_environment(&self, env: &str) -> LoaderConfig {
        let mut config = self.clone();

        if let Some(env_config) = self.environments.get(env) {
            if let Some(ref branding) = env_config.branding {
                config.branding = branding.clone();
            }
            if let Some(ref policy) = env_config.policy {
                config.policy = self.policy.merged_with(policy);
            }
        }

        config
    }

    /// Validate and resolve into runtime settings.
    pub fn settings(&self) -> LoaderResult<Settings> {
        self.branding.validate()?;
        let policy = self.policy.resolve()?;

        Ok(Settings {
            branding: self.branding.clone(),
            policy,
            classifier: self.classifier.clone(),
        })
    }

    /// Check branding and policy, including every environment override.
    pub fn validate(&self) -> LoaderResult<()> {
        self.settings()?;
        for name in self.environments.keys() {
            self.for_environment(name).settings()?;
        }
        Ok(())
    }
}

/// Everything the runtime needs.
///
/// Built by [`LoaderConfig::settings`], which validates. Fields set by hand
/// are not checked; the runtime clamps zero polling periods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub branding: BrandingConfig,
    pub policy: LoaderPolicy,
    pub classifier: PageClassifier,
}

impl Settings {
    /// Replace the policy.
    pub fn with_policy(mut self, policy: LoaderPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        for name in PRESET_NAMES {
            let policy = LoaderPolicy::preset(name).unwrap();
            assert!(policy.validate().is_ok(), "{}", name);
        }
        assert_eq!(LoaderPolicy::preset("patient").unwrap().safety_timeout_ms, 5000);
        assert_eq!(LoaderPolicy::preset("Swift").unwrap().safety_timeout_ms, 2500);
    }

    #[test]
    fn test_unknown_preset() {
        assert!(matches!(
            LoaderPolicy::preset("turbo"),
            Err(LoaderError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_overrides_win_over_preset() {
        let settings = PolicySettings {
            preset: Some("conservative".to_string()),
            safety_timeout_ms: Some(4000),
            observe_mutations: Some(false),
            ..Default::default()
        };
        let policy = settings.resolve().unwrap();
        assert_eq!(policy.safety_timeout_ms, 4000);
        assert_eq!(policy.grace_delay_ms, 600);
        assert!(!policy.observe_mutations);
    }

    #[test]
    fn test_grace_must_be_shorter_than_timeout() {
        let settings = PolicySettings {
            safety_timeout_ms: Some(300),
            grace_delay_ms: Some(300),
            ..Default::default()
        };
        assert!(matches!(
            settings.resolve(),
            Err(LoaderError::InvalidTiming { field: "grace_delay_ms", .. })
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let settings = PolicySettings {
            sweep_interval_ms: Some(0),
            ..Default::default()
        };
        assert!(settings.resolve().is_err());
    }

    #[test]
    fn test_origin_validation() {
        let mut branding = BrandingConfig::default();
        assert!(branding.validate().is_ok());

        branding.asset_origin = "storefront.example.com".to_string();
        assert!(matches!(branding.validate(), Err(LoaderError::InvalidAssetOrigin(_))));

        branding.asset_origin = "ftp://storefront.example.com".to_string();
        assert!(branding.validate().is_err());

        branding.asset_origin = "https://".to_string();
        assert!(branding.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let config = LoaderConfig::from_toml_str(
            r##"
[branding]
asset_origin = "https://cdn.shop.test"
background_color = "#101010"
redacted_names = ["Acme"]

[policy]
preset = "patient"
ready_marker = { type = "attribute", name = "data-ready" }

[environments.staging.policy]
safety_timeout_ms = 8000
"##,
        )
        .unwrap();

        assert_eq!(config.branding.asset_origin, "https://cdn.shop.test");
        assert_eq!(config.branding.redacted_names, vec!["Acme".to_string()]);
        assert_eq!(config.branding.script_file, "index.js");

        let settings = config.settings().unwrap();
        assert_eq!(settings.policy.safety_timeout_ms, 5000);
        assert_eq!(
            settings.policy.ready_marker,
            ReadyMarker::Attribute("data-ready".to_string())
        );

        let staging = config.for_environment("staging").settings().unwrap();
        assert_eq!(staging.policy.safety_timeout_ms, 8000);
        assert_eq!(staging.policy.grace_delay_ms, 500);
    }

    #[test]
    fn test_parse_json() {
        let config =
            LoaderConfig::from_json_str(r#"{"policy": {"preset": "swift"}}"#).unwrap();
        assert_eq!(config.settings().unwrap().policy.safety_timeout_ms, 2500);
        assert_eq!(config.branding, BrandingConfig::default());
    }

    #[test]
    fn test_unknown_environment_is_identity() {
        let config = LoaderConfig::default();
        assert_eq!(config.for_environment("nowhere"), config);
    }

    #[test]
    fn test_validate_checks_environments() {
        let config = LoaderConfig::from_toml_str(
            r#"
[environments.broken.policy]
preset = "turbo"
"#,
        )
        .unwrap();
        assert!(config.settings().is_ok());
        assert!(matches!(config.validate(), Err(LoaderError::UnknownPreset(_))));
    }
}
