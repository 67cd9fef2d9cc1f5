//! Bundle stylesheet and module script injection.

use std::cell::Cell;

use loader_core::ids::{SCRIPT_ID, STYLESHEET_ID};
use loader_core::AssetUrls;
use loader_dom::{Document, ElementSpec, NodeId};

/// Appends the bundle tags, at most once per loader.
#[derive(Debug, Default)]
pub struct AssetLoader {
    requested: Cell<bool>,
}

impl AssetLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `request` has already run.
    pub fn is_requested(&self) -> bool {
        self.requested.get()
    }

    /// Append the stylesheet link and module script.
    ///
    /// Returns `false` without touching the document when this loader has
    /// already run. Tags already present by id are left alone, so another
    /// loader on the same page does not duplicate them.
    pub fn request(&self, doc: &dyn Document, urls: &AssetUrls) -> bool {
        if self.requested.replace(true) {
            tracing::debug!("assets already requested");
            return false;
        }

        let parent = doc
            .head()
            .or_else(|| doc.body())
            .unwrap_or_else(|| doc.root());

        let stylesheet = ElementSpec::new("link")
            .with_id(STYLESHEET_ID)
            .with_attr("rel", "stylesheet")
            .with_attr("href", urls.stylesheet.as_str());
        let script = ElementSpec::new("script")
            .with_id(SCRIPT_ID)
            .with_attr("type", "module")
            .with_attr("crossorigin", "anonymous")
            .with_attr("src", urls.script.as_str());

        append_once(doc, parent, STYLESHEET_ID, &stylesheet);
        append_once(doc, parent, SCRIPT_ID, &script);

        tracing::debug!(stylesheet = %urls.stylesheet, script = %urls.script, "assets requested");
        true
    }
}

fn append_once(doc: &dyn Document, parent: NodeId, id: &str, spec: &ElementSpec) {
    if doc.contains_id(id) {
        tracing::debug!(id, "asset tag already present");
        return;
    }

    let node = doc.create_element(spec);
    if let Err(err) = doc.append_child(parent, node) {
        tracing::debug!(id, error = %err, "asset tag insert failed");
    }
}
