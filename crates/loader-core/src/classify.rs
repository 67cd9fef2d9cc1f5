//! Page classification from the request path.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Path fragments owned by the host platform's own checkout flow.
pub const NATIVE_PATH_MARKERS: [&str; 3] = ["/payment", "/checkout", "/cart"];

/// What kind of page the loader is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageClass {
    /// The injected application renders the whole storefront.
    StorefrontPage,
    /// Checkout, payment and cart pages rendered by the host platform.
    NativeCommercePage,
}

impl PageClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageClass::StorefrontPage => "storefront",
            PageClass::NativeCommercePage => "native",
        }
    }

    /// Whether the application bundle and mount node belong on this page.
    pub fn hosts_application(&self) -> bool {
        matches!(self, PageClass::StorefrontPage)
    }
}

impl fmt::Display for PageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classifies paths against a list of native-page markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageClassifier {
    /// Lower-cased substrings that mark a native commerce page.
    #[serde(default = "default_markers")]
    pub native_markers: Vec<String>,
}

fn default_markers() -> Vec<String> {
    NATIVE_PATH_MARKERS.iter().map(|m| m.to_string()).collect()
}

impl Default for PageClassifier {
    fn default() -> Self {
        Self {
            native_markers: default_markers(),
        }
    }
}

impl PageClassifier {
    /// Create a classifier with custom markers.
    pub fn new(markers: &[&str]) -> Self {
        Self {
            native_markers: markers.iter().map(|m| m.to_lowercase()).collect(),
        }
    }

    /// Classify a path. Anything that matches no marker is a storefront page.
    pub fn classify(&self, path: &str) -> PageClass {
        let path = path.to_lowercase();
        if self
            .native_markers
            .iter()
            .any(|marker| path.contains(&marker.to_lowercase()))
        {
            PageClass::NativeCommercePage
        } else {
            PageClass::StorefrontPage
        }
    }
}

/// Classify a path with the default markers.
pub fn classify(path: &str) -> PageClass {
    PageClassifier::default().classify(path)
}
