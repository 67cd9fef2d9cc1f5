//! Critical CSS and head markup for the loader artifacts.

use crate::assets::AssetUrls;
use crate::classify::PageClass;
use crate::config::BrandingConfig;
use crate::ids::{CRITICAL_STYLE_ID, PRELOADER_DONE_CLASS, PRELOADER_ID, SCRIPT_ID, STYLESHEET_ID};

/// Build the critical style block for a page class.
///
/// Every page gets the background pin and the preloader rules; only
/// storefront pages hide the host chrome.
pub fn critical_css(branding: &BrandingConfig, class: PageClass) -> String {
    let bg = &branding.background_color;
    let accent = &branding.accent_color;

    let mut css = String::new();
    css.push_str(&format!("html,body{{background:{} !important;}}\n", bg));
    css.push_str(&format!(
        "#{id}{{position:fixed;inset:0;z-index:2147483647;display:flex;\
         flex-direction:column;align-items:center;justify-content:center;gap:24px;\
         background:{bg};opacity:1;transition:opacity .35s ease;}}\n",
        id = PRELOADER_ID,
        bg = bg
    ));
    css.push_str(&format!(
        "#{id}.{done}{{opacity:0;pointer-events:none;}}\n",
        id = PRELOADER_ID,
        done = PRELOADER_DONE_CLASS
    ));
    css.push_str(&format!(
        "#{id} img{{max-width:160px;max-height:80px;}}\n",
        id = PRELOADER_ID
    ));
    css.push_str(&format!(
        "#{id} .sf-spinner{{width:36px;height:36px;border-radius:50%;\
         border:3px solid rgba(255,255,255,.15);border-top-color:{accent};\
         animation:sf-spin .8s linear infinite;}}\n",
        id = PRELOADER_ID,
        accent = accent
    ));
    css.push_str("@keyframes sf-spin{to{transform:rotate(360deg);}}\n");

    if class.hosts_application() && !branding.chrome_selectors.is_empty() {
        css.push_str(&branding.chrome_selectors.join(","));
        css.push_str("{display:none !important;}\n");
    }

    css
}

/// Loader artifacts rendered as HTML for server-side embedding.
#[derive(Debug, Clone)]
pub struct HeadMarkup {
    /// Critical CSS body.
    pub css: String,
    /// Bundle URLs; `None` on native pages.
    pub assets: Option<AssetUrls>,
}

impl HeadMarkup {
    /// Build the markup for a page class.
    pub fn new(branding: &BrandingConfig, class: PageClass, urls: AssetUrls) -> Self {
        Self {
            css: critical_css(branding, class),
            assets: class.hosts_application().then_some(urls),
        }
    }

    /// The `<style>` element.
    pub fn style_tag(&self) -> String {
        format!(r#"<style id="{}">{}</style>"#, CRITICAL_STYLE_ID, self.css)
    }

    /// The stylesheet `<link>`, storefront pages only.
    pub fn stylesheet_tag(&self) -> Option<String> {
        self.assets.as_ref().map(|a| {
            format!(
                r#"<link id="{}" rel="stylesheet" href="{}">"#,
                STYLESHEET_ID,
                escape_attr(&a.stylesheet)
            )
        })
    }

    /// The module `<script>`, storefront pages only.
    pub fn script_tag(&self) -> Option<String> {
        self.assets.as_ref().map(|a| {
            format!(
                r#"<script id="{}" type="module" crossorigin="anonymous" src="{}"></script>"#,
                SCRIPT_ID,
                escape_attr(&a.script)
            )
        })
    }

    /// Render all tags, one per line.
    pub fn render(&self) -> String {
        let mut html = String::new();
        html.push_str(&self.style_tag());
        html.push('\n');

        if let Some(link) = self.stylesheet_tag() {
            html.push_str(&link);
            html.push('\n');
        }
        if let Some(script) = self.script_tag() {
            html.push_str(&script);
            html.push('\n');
        }

        html
    }
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::CacheBust;

    #[test]
    fn test_css_pins_background() {
        let branding = BrandingConfig::default();
        let css = critical_css(&branding, PageClass::NativeCommercePage);
        assert!(css.contains(&format!("background:{} !important", branding.background_color)));
        assert!(css.contains("#sf-preloader"));
    }

    #[test]
    fn test_chrome_hidden_only_on_storefront() {
        let branding = BrandingConfig {
            chrome_selectors: vec!["header".to_string(), ".store-name".to_string()],
            ..Default::default()
        };
        let storefront = critical_css(&branding, PageClass::StorefrontPage);
        let native = critical_css(&branding, PageClass::NativeCommercePage);

        assert!(storefront.contains("header,.store-name{display:none !important;}"));
        assert!(!native.contains(".store-name"));
    }

    #[test]
    fn test_render_storefront() {
        let branding = BrandingConfig::default();
        let urls = AssetUrls::build(&branding, &CacheBust::new("5"));
        let html = HeadMarkup::new(&branding, PageClass::StorefrontPage, urls).render();

        assert!(html.starts_with(r#"<style id="sf-critical-style">"#));
        assert!(html.contains(r#"<link id="sf-app-stylesheet" rel="stylesheet" href="https://storefront.example.com/assets/index.css?v=5">"#));
        assert!(html.contains(r#"type="module" crossorigin="anonymous""#));
    }

    #[test]
    fn test_render_native_has_no_assets() {
        let branding = BrandingConfig::default();
        let urls = AssetUrls::build(&branding, &CacheBust::new("5"));
        let markup = HeadMarkup::new(&branding, PageClass::NativeCommercePage, urls);

        assert!(markup.stylesheet_tag().is_none());
        assert!(markup.script_tag().is_none());
        assert!(!markup.render().contains("<script"));
    }
}
