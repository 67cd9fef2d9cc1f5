//! Terminal output for the CLI.
//!
//! In `--json` mode only [`Output::json`] and errors print; everything
//! else is for people.

use std::time::Duration;

use console::{style, StyledObject};
use indicatif::{ProgressBar, ProgressStyle};
use loader_core::{PageClass, TeardownReason};

#[derive(Clone, Copy)]
enum Level {
    Info,
    Success,
    Warn,
}

impl Level {
    fn marker(self) -> StyledObject<&'static str> {
        match self {
            Level::Info => style("ℹ").blue(),
            Level::Success => style("✓").green(),
            Level::Warn => style("⚠").yellow(),
        }
    }
}

/// Output handler for CLI messages.
#[derive(Clone)]
pub struct Output {
    verbose: bool,
    json: bool,
}

impl Output {
    pub fn new(verbose: bool, json: bool) -> Self {
        Self { verbose, json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    fn say(&self, level: Level, msg: &str) {
        if self.json {
            return;
        }
        match level {
            Level::Warn => eprintln!("{} {}", level.marker(), msg),
            _ => println!("{} {}", level.marker(), msg),
        }
    }

    pub fn info(&self, msg: &str) {
        self.say(Level::Info, msg);
    }

    pub fn success(&self, msg: &str) {
        self.say(Level::Success, msg);
    }

    /// Warnings go to stderr.
    pub fn warn(&self, msg: &str) {
        self.say(Level::Warn, msg);
    }

    /// Errors print in both modes; JSON mode emits `{"error": ...}` on stderr.
    pub fn error(&self, msg: &str) {
        if self.json {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        } else {
            eprintln!("{} {}", style("✗").red(), style(msg).red());
        }
    }

    /// Only with `--verbose`.
    pub fn debug(&self, msg: &str) {
        if self.verbose && !self.json {
            eprintln!("{} {}", style("→").dim(), style(msg).dim());
        }
    }

    pub fn header(&self, title: &str) {
        if !self.json {
            println!("\n{}", style(title).bold().underlined());
        }
    }

    /// Unstyled text, e.g. markup meant to be piped.
    pub fn raw(&self, text: &str) {
        if !self.json {
            println!("{}", text);
        }
    }

    pub fn kv(&self, key: &str, value: &str) {
        if !self.json {
            println!("  {}: {}", style(key).dim(), value);
        }
    }

    pub fn list_item(&self, item: &str) {
        if !self.json {
            println!("  {} {}", style("•").dim(), item);
        }
    }

    /// Columns padded to `widths`; a width of 0 leaves the column as is.
    pub fn table_row(&self, cols: &[&str], widths: &[usize]) {
        if self.json {
            return;
        }
        let row = cols
            .iter()
            .zip(widths)
            .map(|(col, width)| format!("{:width$}", col, width = width))
            .collect::<Vec<_>>()
            .join("  ");
        println!("  {}", row.trim_end());
    }

    /// Pretty-printed JSON on stdout.
    pub fn json<T: serde::Serialize>(&self, value: &T) {
        if let Ok(json) = serde_json::to_string_pretty(value) {
            println!("{}", json);
        }
    }

    /// Spinner for a wait of unknown length; hidden in JSON mode.
    pub fn spinner(&self, msg: &str) -> ProgressBar {
        if self.json {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(spinner) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(spinner);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }
}

/// Colored badge for a page class.
pub fn class_badge(class: PageClass) -> String {
    let label = style(class.as_str());
    match class {
        PageClass::StorefrontPage => label.cyan().to_string(),
        PageClass::NativeCommercePage => label.magenta().to_string(),
    }
}

/// Colored badge for how a load ended.
pub fn reason_badge(reason: Option<TeardownReason>) -> String {
    match reason {
        Some(reason @ TeardownReason::ReadySignal) => style(reason.as_str()).green().to_string(),
        Some(reason @ TeardownReason::NativePage) => style(reason.as_str()).dim().to_string(),
        Some(reason @ TeardownReason::SafetyTimeout) => style(reason.as_str()).yellow().to_string(),
        None => style("not torn down").red().to_string(),
    }
}

/// `20ms`, `3s`, `2.5s`.
pub fn format_ms(ms: u64) -> String {
    match ms {
        0..=999 => format!("{}ms", ms),
        _ if ms % 1000 == 0 => format!("{}s", ms / 1000),
        _ => format!("{:.1}s", ms as f64 / 1000.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_ms() {
        assert_eq!(format_ms(20), "20ms");
        assert_eq!(format_ms(999), "999ms");
        assert_eq!(format_ms(3000), "3s");
        assert_eq!(format_ms(2500), "2.5s");
    }

    #[test]
    fn test_reason_badge_names_reason() {
        console::set_colors_enabled(false);
        assert_eq!(reason_badge(Some(TeardownReason::SafetyTimeout)), "safety_timeout");
        assert_eq!(reason_badge(None), "not torn down");
    }
}
