//! CLI execution context.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use loader_core::{LoaderConfig, Settings};

use crate::config::{self, CONFIG_NAMES};
use crate::output::Output;

/// Execution context for CLI commands.
pub struct Context {
    /// Loader configuration, before environment overrides.
    pub config: LoaderConfig,
    /// Where `config` came from; `None` means built-in defaults.
    pub config_path: Option<PathBuf>,
    /// Environment whose overrides apply.
    pub env: Option<String>,
    /// Output handler.
    pub output: Output,
    /// Working directory.
    pub cwd: PathBuf,
}

impl Context {
    /// Load context from an explicit config file or by discovery.
    pub fn load(config_path: Option<&str>, env: Option<String>, output: Output) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;

        let (config, config_path) = match config_path {
            Some(path) => {
                let path = resolve(&cwd, path);
                (config::load(&path)?, Some(path))
            }
            None => match Self::find_config(&cwd) {
                Some(path) => (config::load(&path)?, Some(path)),
                None => (LoaderConfig::default(), None),
            },
        };

        if let Some(ref path) = config_path {
            output.debug(&format!("Using config: {}", path.display()));
        }

        Ok(Self {
            config,
            config_path,
            env,
            output,
            cwd,
        })
    }

    /// Find a config file in the directory tree.
    fn find_config(start: &Path) -> Option<PathBuf> {
        let mut current = start.to_path_buf();
        loop {
            for name in CONFIG_NAMES {
                let candidate = current.join(name);
                if candidate.exists() {
                    return Some(candidate);
                }
            }

            if !current.pop() {
                return None;
            }
        }
    }

    /// Config with the selected environment applied.
    pub fn effective_config(&self) -> LoaderConfig {
        match self.env {
            Some(ref env) => {
                if !self.config.environments.contains_key(env) {
                    self.output
                        .warn(&format!("Environment '{}' not found in config", env));
                }
                self.config.for_environment(env)
            }
            None => self.config.clone(),
        }
    }

    /// Validated runtime settings.
    pub fn settings(&self) -> Result<Settings> {
        self.effective_config()
            .settings()
            .context("Invalid loader configuration")
    }

    /// Resolve a path relative to the working directory.
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        resolve(&self.cwd, path)
    }
}

fn resolve(cwd: &Path, path: &str) -> PathBuf {
    let path = PathBuf::from(path);
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}
