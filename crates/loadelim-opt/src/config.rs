use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::StateLimits;

/// Name of the configuration file searched for in the current directory and its parents.
pub const CONFIG_FILE_NAME: &str = "loadelim.toml";

/// Upper bound for [`LoadEliminationConfig::max_tracked_fields`]. Every state reserves one entry
/// per tracked slot.
pub const MAX_TRACKED_FIELDS: usize = 1024;

/// Errors that can happen while loading a [`LoadEliminationConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration of the load elimination pass.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LoadEliminationConfig {
    /// Number of pointer-sized field slots tracked per object, starting at offset 0.
    #[serde(default = "default_max_tracked_fields")]
    pub max_tracked_fields: usize,

    /// Maximum number of element values remembered along one effect path.
    #[serde(default = "default_max_tracked_elements")]
    pub max_tracked_elements: usize,

    /// Whether effectful nodes flagged as not writing memory let knowledge pass through. When
    /// disabled, every effectful node the pass doesn't model forgets everything.
    #[serde(default = "default_true")]
    pub trust_no_write: bool,

    /// Whether a known value with a wider type than the load replaces the load behind a type
    /// guard. When disabled, such loads are kept.
    #[serde(default = "default_true")]
    pub guard_type_mismatch: bool,
}

fn default_max_tracked_fields() -> usize {
    32
}

fn default_max_tracked_elements() -> usize {
    8
}

fn default_true() -> bool {
    true
}

impl Default for LoadEliminationConfig {
    fn default() -> Self {
        Self {
            max_tracked_fields: default_max_tracked_fields(),
            max_tracked_elements: default_max_tracked_elements(),
            trust_no_write: true,
            guard_type_mismatch: true,
        }
    }
}

impl LoadEliminationConfig {
    /// Load the configuration from `loadelim.toml` in the current directory or its parents, then
    /// apply overrides from the environment.
    pub fn load() -> Self {
        Self::from_current_dir().override_from_env()
    }

    /// The state limits for this configuration, with the field count clamped to
    /// [`MAX_TRACKED_FIELDS`].
    pub fn limits(&self) -> StateLimits {
        let max_fields = self.max_tracked_fields.min(MAX_TRACKED_FIELDS);
        if max_fields < self.max_tracked_fields {
            log::warn!(
                "Tracking {max_fields} fields instead of the configured {}",
                self.max_tracked_fields
            );
        }
        StateLimits::new(max_fields, self.max_tracked_elements)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    // Traverses up the directory tree until a config file is found or the root is reached.
    // A file that exists but can't be parsed is reported and replaced by the defaults.
    fn from_current_dir() -> Self {
        let Ok(mut dir) = std::env::current_dir() else {
            return Self::default();
        };

        loop {
            let path = dir.join(CONFIG_FILE_NAME);
            if path.is_file() {
                return match Self::from_file_path(&path) {
                    Ok(config) => config,
                    Err(err) => {
                        log::warn!("{err}, falling back to the default configuration");
                        Self::default()
                    }
                };
            }

            if !dir.pop() {
                break;
            }
        }

        Self::default()
    }

    /// Overrides configuration fields based on environment variables.
    pub fn override_from_env(self) -> Self {
        self.override_from(|key| std::env::var(key).ok())
    }

    /// Overrides configuration fields with the values returned by `lookup` for
    /// `LOADELIM_MAX_TRACKED_FIELDS`, `LOADELIM_MAX_TRACKED_ELEMENTS` and
    /// `LOADELIM_TRUST_NO_WRITE`. Values that can't be parsed are ignored.
    pub fn override_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = parse_var(&lookup, "LOADELIM_MAX_TRACKED_FIELDS") {
            self.max_tracked_fields = val;
        }
        if let Some(val) = parse_var(&lookup, "LOADELIM_MAX_TRACKED_ELEMENTS") {
            self.max_tracked_elements = val;
        }
        if let Some(val) = lookup("LOADELIM_TRUST_NO_WRITE") {
            match val.as_str() {
                "1" | "true" => self.trust_no_write = true,
                "0" | "false" => self.trust_no_write = false,
                other => log::warn!("Ignoring LOADELIM_TRUST_NO_WRITE={other}"),
            }
        }
        self
    }
}

fn parse_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<usize> {
    let val = lookup(key)?;
    match val.parse() {
        Ok(val) => Some(val),
        Err(_) => {
            log::warn!("Ignoring {key}={val}, expected an unsigned integer");
            None
        }
    }
}
