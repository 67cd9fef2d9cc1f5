//! Critical style injection.

use loader_core::ids::CRITICAL_STYLE_ID;
use loader_core::{critical_css, BrandingConfig, PageClass};
use loader_dom::{Document, ElementSpec, NodeId};

/// Insert the critical style element unless one already exists.
///
/// Goes into the head, or the root element when the head has not been
/// parsed yet. Returns the style element, or `None` if the host refused
/// the insert.
pub fn inject_critical_style(
    doc: &dyn Document,
    branding: &BrandingConfig,
    class: PageClass,
) -> Option<NodeId> {
    if let Some(existing) = doc.element_by_id(CRITICAL_STYLE_ID) {
        tracing::debug!("critical style already present");
        return Some(existing);
    }

    let parent = doc.head().unwrap_or_else(|| doc.root());
    let style = doc.create_element(
        &ElementSpec::new("style")
            .with_id(CRITICAL_STYLE_ID)
            .with_text(critical_css(branding, class)),
    );

    match doc.append_child(parent, style) {
        Ok(()) => Some(style),
        Err(err) => {
            tracing::debug!(error = %err, "critical style insert failed");
            None
        }
    }
}

/// Remove the critical style element. Returns whether one was removed.
pub fn remove_critical_style(doc: &dyn Document) -> bool {
    doc.remove_by_id(CRITICAL_STYLE_ID)
}
