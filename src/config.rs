//! Application configuration management.
//!
//! Settings are layered with `figment`, later layers overriding earlier ones:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. TOML file: `--config <FILE>`, else `config.toml` in the platform
//!    config directory (`~/.config/dupefox/` on Linux)
//! 3. Environment variables prefixed `DUPEFOX_` (e.g. `DUPEFOX_HASH_THREADS=8`)
//! 4. CLI flags, applied by the command handlers
//!
//! ```toml
//! index_path = "/srv/dupefox/index.db"
//! hash_threads = 8
//! ignore_patterns = ["*.tmp", ".git/"]
//! default_rule = "keep-shortest-path"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::duplicates::DEFAULT_HASH_THREADS;
use crate::rules::Rule;

/// Prefix of environment variables read into the configuration.
pub const ENV_PREFIX: &str = "DUPEFOX_";

/// File name of the index inside the data directory.
const INDEX_FILE_NAME: &str = "index.db";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Location of the index database.
    pub index_path: Option<PathBuf>,
    /// Threads used to hash files.
    pub hash_threads: usize,
    /// Gitignore-style patterns excluded from every scan.
    pub ignore_patterns: Vec<String>,
    /// Rule applied by `dupefox rule` when none is named.
    pub default_rule: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_path: None,
            hash_threads: DEFAULT_HASH_THREADS,
            ignore_patterns: Vec::new(),
            default_rule: None,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "dupefox", "dupefox")
}

impl Config {
    /// Load the layered configuration.
    ///
    /// `explicit` is the `--config` flag; when it is given the file must
    /// exist. Without it, the platform config file is used if present.
    ///
    /// # Errors
    ///
    /// Fails on a missing explicit file, unparsable TOML, a bad environment
    /// value, or a value that does not validate.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.is_file() {
                    bail!("Config file not found: {}", path.display());
                }
                Some(path.to_path_buf())
            }
            None => Self::config_path(),
        };
        Self::load_from_path(path.as_deref())
    }

    /// Load defaults, then `path` (if it exists), then the environment.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn load_from_path(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            log::debug!("Reading config from {}", path.display());
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX));

        let config: Self = figment
            .extract()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later.
    ///
    /// # Errors
    ///
    /// Fails for `hash_threads = 0` or an unknown `default_rule`.
    pub fn validate(&self) -> Result<()> {
        if self.hash_threads == 0 {
            bail!("hash_threads must be at least 1");
        }
        if let Some(ref name) = self.default_rule {
            name.parse::<Rule>()
                .context("Invalid default_rule in configuration")?;
        }
        Ok(())
    }

    /// Platform config file location, `None` if no home directory is known.
    #[must_use]
    pub fn config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Index location: the CLI flag, else `index_path`, else the platform data
    /// directory.
    ///
    /// # Errors
    ///
    /// Fails if no location is configured and the platform has no data
    /// directory.
    pub fn resolve_index_path(&self, flag: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = flag.or(self.index_path.as_deref()) {
            return Ok(path.to_path_buf());
        }
        let dirs = project_dirs().context(
            "Cannot determine a data directory; pass --index or set index_path",
        )?;
        Ok(dirs.data_dir().join(INDEX_FILE_NAME))
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Fails only if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}
