//! Absolute URLs for the externally hosted bundle.

use serde::Serialize;

use crate::config::BrandingConfig;
use crate::ids::CacheBust;

/// Stylesheet, script and logo URLs for one page load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetUrls {
    pub stylesheet: String,
    pub script: String,
    pub logo: String,
}

impl AssetUrls {
    /// Build `<origin><path>/<file>?v=<token>` for each asset.
    pub fn build(branding: &BrandingConfig, token: &CacheBust) -> Self {
        let origin = branding.asset_origin.trim_end_matches('/');
        let dir = join_path(origin, &branding.asset_path);

        Self {
            stylesheet: with_version(&join_path(&dir, &branding.stylesheet_file), token),
            script: with_version(&join_path(&dir, &branding.script_file), token),
            logo: with_version(&join_path(origin, &branding.logo_path), token),
        }
    }
}

fn join_path(base: &str, segment: &str) -> String {
    let segment = segment.trim_matches('/');
    if segment.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base.trim_end_matches('/'), segment)
    }
}

fn with_version(url: &str, token: &CacheBust) -> String {
    let sep = if url.contains('?') { '&' } else { '?' };
    format!("{}{}v={}", url, sep, token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_urls() {
        let branding = BrandingConfig {
            asset_origin: "https://cdn.shop.test/".to_string(),
            ..Default::default()
        };
        let urls = AssetUrls::build(&branding, &CacheBust::new("1700000000000"));

        assert_eq!(urls.stylesheet, "https://cdn.shop.test/assets/index.css?v=1700000000000");
        assert_eq!(urls.script, "https://cdn.shop.test/assets/index.js?v=1700000000000");
        assert_eq!(urls.logo, "https://cdn.shop.test/logo.svg?v=1700000000000");
    }

    #[test]
    fn test_empty_asset_path() {
        let branding = BrandingConfig {
            asset_origin: "https://cdn.shop.test".to_string(),
            asset_path: "/".to_string(),
            ..Default::default()
        };
        let urls = AssetUrls::build(&branding, &CacheBust::new("7"));
        assert_eq!(urls.script, "https://cdn.shop.test/index.js?v=7");
    }

    #[test]
    fn test_existing_query_kept() {
        let branding = BrandingConfig {
            script_file: "index.js?build=3".to_string(),
            ..Default::default()
        };
        let urls = AssetUrls::build(&branding, &CacheBust::new("9"));
        assert!(urls.script.ends_with("index.js?build=3&v=9"));
    }
}
