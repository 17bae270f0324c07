//! Telemetry client configuration.
//!
//! Layered the usual way: built-in defaults, then an optional YAML file,
//! then environment overrides. Every field has a default, so an empty file
//! (or no file at all) yields a working production setup.
//!
//! The opt-out and debug *environment* flags are not folded in
//! here. They are read live by [`TrackingGate`](crate::TrackingGate) on
//! every call; the `do_not_track` and `debug` fields below only act as the
//! config-file baseline for that gate.
//!
//! ```yaml
//! app_name: myevals
//! env_prefix: MYEVALS
//! endpoint: https://collector.example.com/v1/events
//! timeout_ms: 1000
//! do_not_track: false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::gate::{TrackingFlags, TrackingGate};
use crate::store::{IDENTITY_FILE_NAME, user_data_dir};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Complete telemetry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TelemetryConfig {
    /// Directory name under the platform user-data directory.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Prefix for every environment variable the client reads.
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,

    /// Production collector URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Collector URL used in debug mode. When unset, debug mode logs
    /// payloads locally instead of sending them anywhere.
    #[serde(default)]
    pub debug_endpoint: Option<String>,

    /// HTTP timeout for a single submission, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Overrides the directory holding the identity file.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Config-file opt-out. The environment flag can only add to it.
    #[serde(default)]
    pub do_not_track: bool,

    /// Config-file debug switch. The environment flag can only add to it.
    #[serde(default)]
    pub debug: bool,

    /// Host library version stamped on events that leave it empty.
    #[serde(default)]
    pub library_version: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            env_prefix: default_env_prefix(),
            endpoint: default_endpoint(),
            debug_endpoint: None,
            timeout_ms: default_timeout_ms(),
            data_dir: None,
            do_not_track: false,
            debug: false,
            library_version: String::new(),
        }
    }
}

impl TelemetryConfig {
    /// Defaults for a host library called `app_name`.
    ///
    /// The environment prefix is the upper-cased app name with `-` mapped
    /// to `_`, so `my-evals` reads `MY_EVALS_DO_NOT_TRACK`.
    pub fn for_app(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_owned(),
            env_prefix: app_name.to_uppercase().replace('-', "_"),
            ..Self::default()
        }
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration from a YAML file, then apply environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment overrides.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to a mapping.
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override values from the process environment.
    ///
    /// - `<PREFIX>_TRACKING_URL` overrides `endpoint`
    /// - `<PREFIX>_DEBUG_TRACKING_URL` overrides `debug_endpoint`
    /// - `<PREFIX>_DATA_DIR` overrides `data_dir`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) against an
    /// arbitrary variable lookup. Empty values are ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let read = |suffix: &str| {
            lookup(&self.env_var(suffix)).filter(|value| !value.trim().is_empty())
        };
        let endpoint = read("TRACKING_URL");
        let debug_endpoint = read("DEBUG_TRACKING_URL");
        let data_dir = read("DATA_DIR");

        if let Some(url) = endpoint {
            self.endpoint = url;
        }
        if let Some(url) = debug_endpoint {
            self.debug_endpoint = Some(url);
        }
        if let Some(dir) = data_dir {
            self.data_dir = Some(PathBuf::from(dir));
        }
    }

    /// Name of the environment variable `<PREFIX>_<suffix>`.
    pub fn env_var(&self, suffix: &str) -> String {
        format!("{}_{suffix}", self.env_prefix)
    }

    /// Environment variable that disables tracking when `"true"`.
    pub fn opt_out_var(&self) -> String {
        self.env_var("DO_NOT_TRACK")
    }

    /// Environment variable that enables debug routing when `"true"`.
    pub fn debug_var(&self) -> String {
        self.env_var("DEBUG_TRACKING")
    }

    /// Submission timeout as a [`Duration`].
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Where the identity file lives.
    ///
    /// `data_dir` when configured, otherwise
    /// `<platform user-data dir>/<app_name>`. Returns `None` when no home
    /// directory can be resolved.
    pub fn identity_path(&self) -> Option<PathBuf> {
        let dir = match &self.data_dir {
            Some(dir) => dir.clone(),
            None => user_data_dir(&self.app_name)?,
        };
        Some(dir.join(IDENTITY_FILE_NAME))
    }

    /// A gate that reads this config's environment flags live, on top of
    /// the file-level `do_not_track` / `debug` baseline.
    pub fn gate(&self) -> TrackingGate {
        TrackingGate::Env {
            opt_out_var: self.opt_out_var(),
            debug_var: self.debug_var(),
            baseline: TrackingFlags {
                opt_out: self.do_not_track,
                debug: self.debug,
            },
        }
    }
}

fn default_app_name() -> String {
    "tally".to_owned()
}

fn default_env_prefix() -> String {
    "TALLY".to_owned()
}

fn default_endpoint() -> String {
    "https://t.tally.dev/v1/events".to_owned()
}

const fn default_timeout_ms() -> u64 {
    1000
}
