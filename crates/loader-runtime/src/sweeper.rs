//! Redaction of operator names in host-rendered chrome.

use std::rc::Rc;
use std::time::Duration;

use loader_core::{Settings, SweepReport};
use loader_dom::{Document, NodeId};

use crate::watch::Watcher;

/// Declarations forced onto every redacted element.
const HIDE_DECLARATIONS: [(&str, &str); 3] = [
    ("display", "none"),
    ("visibility", "hidden"),
    ("opacity", "0"),
];

/// Elements that are never hidden themselves.
const STRUCTURAL_TAGS: [&str; 3] = ["html", "head", "body"];

/// Elements whose text is code, not rendered copy.
const NON_RENDERED_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Scans text nodes and visually suppresses any that mention an operator
/// name. Content is never removed.
#[derive(Debug, Clone)]
pub struct RedactionSweeper {
    /// Lower-cased denylist.
    names: Vec<String>,
    hide_header_ancestors: bool,
}

impl RedactionSweeper {
    pub fn new(names: &[String], hide_header_ancestors: bool) -> Self {
        Self {
            names: names
                .iter()
                .map(|n| n.trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
            hide_header_ancestors,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            &settings.branding.redacted_names,
            settings.policy.hide_header_ancestors,
        )
    }

    /// Whether `text` mentions any denylisted name.
    pub fn matches(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.names.iter().any(|name| text.contains(name.as_str()))
    }

    /// One pass over every connected text node, then over elements for
    /// names that only appear in their combined text.
    pub fn sweep(&self, doc: &dyn Document) -> SweepReport {
        let mut report = SweepReport::default();
        if self.names.is_empty() {
            return report;
        }

        for text_node in doc.text_nodes() {
            report.scanned += 1;

            let text = match doc.text(text_node) {
                Ok(text) => text,
                Err(err) => {
                    tracing::trace!(error = %err, "skipping unreadable text node");
                    report.skipped += 1;
                    continue;
                }
            };
            if !self.matches(&text) {
                continue;
            }

            let Some(element) = doc.parent(text_node) else {
                continue;
            };
            let tag = doc.tag_name(element).unwrap_or_default();
            if NON_RENDERED_TAGS.contains(&tag.as_str()) || STRUCTURAL_TAGS.contains(&tag.as_str()) {
                continue;
            }
            self.hide_with_header(doc, element, &mut report);
        }

        // Names split across inline elements, e.g. `<b>Sal</b><i>la</i>`.
        self.hide_split_names(doc, doc.root(), &mut report);

        if report.hidden > 0 {
            tracing::debug!(hidden = report.hidden, scanned = report.scanned, "redacted");
        }
        report
    }

    /// Rendered text of `element`, hiding the deepest elements whose
    /// combined text mentions a name. Returns the text and whether it
    /// matched.
    fn hide_split_names(
        &self,
        doc: &dyn Document,
        element: NodeId,
        report: &mut SweepReport,
    ) -> (String, bool) {
        let mut text = String::new();
        let mut child_matched = false;

        for child in doc.children(element) {
            match doc.tag_name(child) {
                None => {
                    // Unreadable nodes were already counted by the first pass.
                    if let Ok(data) = doc.text(child) {
                        text.push_str(&data);
                    }
                }
                Some(tag) if NON_RENDERED_TAGS.contains(&tag.as_str()) => {}
                Some(_) => {
                    let (data, matched) = self.hide_split_names(doc, child, report);
                    text.push_str(&data);
                    child_matched |= matched;
                }
            }
        }

        let matched = self.matches(&text);
        if matched && !child_matched {
            let tag = doc.tag_name(element).unwrap_or_default();
            if !STRUCTURAL_TAGS.contains(&tag.as_str()) {
                self.hide_with_header(doc, element, report);
            }
        }

        (text, matched)
    }

    fn hide_with_header(&self, doc: &dyn Document, element: NodeId, report: &mut SweepReport) {
        if hide(doc, element) {
            report.hidden += 1;
        }
        if self.hide_header_ancestors {
            if let Some(header) = header_ancestor(doc, element) {
                if hide(doc, header) {
                    report.hidden += 1;
                }
            }
        }
    }

    /// Sweep on every mutation and every `interval`, forever.
    ///
    /// The first pass is expected to have happened synchronously before
    /// this is spawned; this loop waits first, then sweeps.
    pub async fn watch<F>(
        &self,
        doc: Rc<dyn Document>,
        interval: Duration,
        observe: bool,
        mut on_sweep: F,
    ) where
        F: FnMut(&SweepReport),
    {
        let mut watcher = Watcher::new(doc.as_ref(), interval, observe);
        loop {
            watcher.next().await;
            let report = self.sweep(doc.as_ref());
            on_sweep(&report);
        }
    }
}

/// Force-hide an element. Returns whether anything changed.
fn hide(doc: &dyn Document, node: NodeId) -> bool {
    let mut changed = false;
    for (property, value) in HIDE_DECLARATIONS {
        match doc.set_style(node, property, value, true) {
            Ok(c) => changed |= c,
            Err(err) => {
                tracing::trace!(error = %err, "cannot hide node");
                return changed;
            }
        }
    }
    changed
}

/// Nearest ancestor that looks like a header bar, below `body`.
fn header_ancestor(doc: &dyn Document, node: NodeId) -> Option<NodeId> {
    let mut current = doc.parent(node);

    while let Some(candidate) = current {
        let tag = doc.tag_name(candidate)?;
        if STRUCTURAL_TAGS.contains(&tag.as_str()) {
            return None;
        }
        if is_header_like(doc, candidate, &tag) {
            return Some(candidate);
        }
        current = doc.parent(candidate);
    }

    None
}

fn is_header_like(doc: &dyn Document, node: NodeId, tag: &str) -> bool {
    if matches!(tag, "header" | "nav") {
        return true;
    }

    ["id", "class"].iter().any(|attr| {
        doc.attribute(node, attr)
            .map(|v| {
                let v = v.to_lowercase();
                v.contains("header") || v.contains("navbar")
            })
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use loader_dom::{ElementSpec, MemoryDocument};

    fn sweeper() -> RedactionSweeper {
        RedactionSweeper::new(&["Salla".to_string(), "سلة".to_string()], true)
    }

    #[test]
    fn test_matches_case_insensitive() {
        let s = sweeper();
        assert!(s.matches("Powered by SALLA"));
        assert!(s.matches("متجر سلة"));
        assert!(!s.matches("Sale"));
    }

    #[test]
    fn test_hides_containing_element() {
        let doc = MemoryDocument::with_body();
        let body = doc.body().unwrap();
        let span = doc
            .append_element(body, &ElementSpec::new("span").with_text("Powered by Salla"))
            .unwrap();
        let other = doc
            .append_element(body, &ElementSpec::new("span").with_text("Hello"))
            .unwrap();

        let report = sweeper().sweep(&doc);

        assert_eq!(report.hidden, 1);
        assert_eq!(report.scanned, 2);
        assert!(doc.is_hidden(span));
        assert_eq!(doc.style(span, "visibility").as_deref(), Some("hidden"));
        assert_eq!(doc.style(span, "opacity").as_deref(), Some("0"));
        assert!(!doc.is_hidden(other));
        assert!(doc.is_connected(span));
    }

    #[test]
    fn test_second_pass_is_noop() {
        let doc = MemoryDocument::with_body();
        let body = doc.body().unwrap();
        doc.append_element(body, &ElementSpec::new("p").with_text("salla"))
            .unwrap();

        let s = sweeper();
        assert_eq!(s.sweep(&doc).hidden, 1);
        assert!(s.sweep(&doc).is_noop());
    }

    #[test]
    fn test_hides_header_ancestor() {
        let doc = MemoryDocument::with_body();
        let body = doc.body().unwrap();
        let bar = doc
            .append_element(body, &ElementSpec::new("div").with_class("site-Header-bar"))
            .unwrap();
        let wrap = doc.append_element(bar, &ElementSpec::new("div")).unwrap();
        let name = doc
            .append_element(wrap, &ElementSpec::new("a").with_text("Salla Store"))
            .unwrap();

        let report = sweeper().sweep(&doc);

        assert_eq!(report.hidden, 2);
        assert!(doc.is_hidden(name));
        assert!(doc.is_hidden(bar));
        assert!(!doc.is_hidden(wrap));
    }

    #[test]
    fn test_ancestor_hiding_can_be_disabled() {
        let doc = MemoryDocument::with_body();
        let body = doc.body().unwrap();
        let header = doc.append_element(body, &ElementSpec::new("header")).unwrap();
        doc.append_element(header, &ElementSpec::new("span").with_text("Salla"))
            .unwrap();

        RedactionSweeper::new(&["Salla".to_string()], false).sweep(&doc);
        assert!(!doc.is_hidden(header));
    }

    #[test]
    fn test_never_hides_body_or_scripts() {
        let doc = MemoryDocument::with_body();
        let body = doc.body().unwrap();
        doc.append_element(body, &ElementSpec::new("script").with_text("var host = 'salla';"))
            .unwrap();
        let text = doc.create_element(&ElementSpec::new("b").with_text("x"));
        doc.append_child(body, text).unwrap();
        // Bare text directly under body.
        let bare = doc.children(text)[0];
        doc.append_child(body, bare).unwrap();
        doc.set_text(bare, "Salla").unwrap();

        let report = sweeper().sweep(&doc);
        assert_eq!(report.hidden, 0);
        assert!(!doc.is_hidden(body));
    }

    #[test]
    fn test_unreadable_node_is_skipped() {
        let doc = MemoryDocument::with_body();
        let body = doc.body().unwrap();
        let first = doc
            .append_element(body, &ElementSpec::new("span").with_text("Salla"))
            .unwrap();
        let second = doc
            .append_element(body, &ElementSpec::new("span").with_text("Salla"))
            .unwrap();
        doc.fail_text_reads(doc.children(first)[0]);

        let report = sweeper().sweep(&doc);

        assert_eq!(report.skipped, 1);
        assert!(!doc.is_hidden(first));
        assert!(doc.is_hidden(second));
    }

    #[test]
    fn test_hides_name_split_across_inline_elements() {
        let doc = MemoryDocument::with_body();
        let body = doc.body().unwrap();
        let footer = doc.append_element(body, &ElementSpec::new("footer")).unwrap();
        let line = doc
            .append_element(
                footer,
                &ElementSpec::new("p")
                    .with_text("Powered by ")
                    .with_child(ElementSpec::new("b").with_text("Sal"))
                    .with_child(ElementSpec::new("i").with_text("la")),
            )
            .unwrap();
        let children = doc.children(line);
        assert_eq!(children.len(), 3);
        let (bold, italic) = (children[1], children[2]);

        let report = sweeper().sweep(&doc);

        assert_eq!(report.hidden, 1);
        assert!(doc.is_hidden(line));
        assert!(!doc.is_hidden(footer));
        assert!(!doc.is_hidden(bold));
        assert!(!doc.is_hidden(italic));
        assert!(!doc.is_hidden(body));
        assert!(sweeper().sweep(&doc).is_noop());
    }

    #[test]
    fn test_split_name_ignores_script_text() {
        let doc = MemoryDocument::with_body();
        let body = doc.body().unwrap();
        let div = doc
            .append_element(
                body,
                &ElementSpec::new("div")
                    .with_text("Sal")
                    .with_child(ElementSpec::new("script").with_text("la")),
            )
            .unwrap();

        let report = sweeper().sweep(&doc);

        assert_eq!(report.hidden, 0);
        assert!(!doc.is_hidden(div));
    }

    #[test]
    fn test_empty_denylist() {
        let doc = MemoryDocument::with_body();
        let report = RedactionSweeper::new(&[" ".to_string()], true).sweep(&doc);
        assert_eq!(report, SweepReport::default());
    }
}
