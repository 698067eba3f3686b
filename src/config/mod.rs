//! Start-up configuration for the server and the dispatcher.
//!
//! Settings are read from TOML into serde structs and then checked and
//! normalized into [`DispatcherSettings`], which is what the dispatcher uses
//! at request time.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [dispatcher]
//! context_path = "/app"
//! mount_path = "/admin/*"
//! ignore_paths = "static, /assets"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("mount path must be a plain path or start with \"/\" and end with \"/*\", got {0:?}")]
    InvalidMountPath(String),
}

/// Root of the configuration file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub dispatcher: DispatcherConfig,
}

impl Config {
    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, [`ConfigError::Parse`]
    /// if it is not valid TOML for this schema.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] if the text does not fit the schema.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Where the TCP listener binds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// `host:port`, ready for [`Server::bind`](crate::Server::bind).
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8338,
        }
    }
}

/// Ignore prefixes, written either as a TOML array or as one comma-separated string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum IgnorePaths {
    List(Vec<String>),
    Csv(String),
}

impl IgnorePaths {
    fn entries(&self) -> Vec<&str> {
        match self {
            IgnorePaths::List(list) => list.iter().map(String::as_str).collect(),
            IgnorePaths::Csv(csv) => csv.split(',').collect(),
        }
    }
}

impl Default for IgnorePaths {
    fn default() -> Self {
        IgnorePaths::List(Vec::new())
    }
}

/// Raw dispatcher settings as written in the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Deployment prefix in front of everything, e.g. `/app`.
    pub context_path: String,
    /// Where the dispatcher is attached below the context path: a plain path
    /// (`admin`) or a mapping (`/admin/*`, `/*`).
    pub mount_path: String,
    /// Prefixes (relative to the mount path) that bypass routing entirely.
    pub ignore_paths: IgnorePaths,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            context_path: "/".to_string(),
            mount_path: String::new(),
            ignore_paths: IgnorePaths::default(),
        }
    }
}

impl DispatcherConfig {
    /// Validates and normalizes into [`DispatcherSettings`].
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidMountPath`] for a malformed mount mapping.
    pub fn settings(&self) -> Result<DispatcherSettings, ConfigError> {
        let mut settings = DispatcherSettings::new()
            .with_context_path(&self.context_path)
            .with_mount_path(&self.mount_path)?;
        for prefix in self.ignore_paths.entries() {
            settings = settings.with_ignore_path(prefix);
        }
        Ok(settings)
    }
}

/// Normalized path settings used by the [`Dispatcher`](crate::Dispatcher).
///
/// - `context_path` is empty or starts with `/` and has no trailing `/`.
/// - `mount_path` has neither leading nor trailing `/`; empty means the root.
/// - ignore prefixes have no leading `/` and are never empty.
///
/// # Examples
///
/// ```
/// use pathway::config::DispatcherSettings;
///
/// let settings = DispatcherSettings::new()
///     .with_context_path("/app/")
///     .with_mount_path("/admin/*")
///     .unwrap()
///     .with_ignore_path("/static");
///
/// assert_eq!(settings.context_path(), "/app");
/// assert_eq!(settings.mount_path(), "admin");
/// assert_eq!(settings.ignore_paths(), ["static"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatcherSettings {
    context_path: String,
    mount_path: String,
    ignore_paths: Vec<String>,
}

impl DispatcherSettings {
    /// Root context, root mount, nothing ignored.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_context_path(mut self, context_path: &str) -> Self {
        let trimmed = context_path.trim().trim_end_matches('/');
        self.context_path = if trimmed.is_empty() || trimmed.starts_with('/') {
            trimmed.to_owned()
        } else {
            format!("/{trimmed}")
        };
        self
    }

    /// Sets the mount path from a plain path or a `/prefix/*` mapping.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidMountPath`] if the value contains `*` anywhere
    /// other than a single trailing `/*`.
    pub fn with_mount_path(mut self, mount_path: &str) -> Result<Self, ConfigError> {
        self.mount_path = normalize_mount_path(mount_path)?;
        Ok(self)
    }

    #[must_use]
    pub fn with_ignore_path(mut self, prefix: &str) -> Self {
        let prefix = prefix.trim().trim_start_matches('/');
        if !prefix.is_empty() && !self.ignore_paths.iter().any(|p| p == prefix) {
            self.ignore_paths.push(prefix.to_owned());
        }
        self
    }

    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    pub fn ignore_paths(&self) -> &[String] {
        &self.ignore_paths
    }
}

fn normalize_mount_path(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let path = if trimmed.contains('*') {
        let inner = trimmed
            .strip_prefix('/')
            .and_then(|rest| rest.strip_suffix('*'))
            .filter(|inner| inner.is_empty() || inner.ends_with('/'))
            .filter(|inner| !inner.contains('*'))
            .ok_or_else(|| ConfigError::InvalidMountPath(raw.to_owned()))?;
        inner
    } else {
        trimmed
    };
    Ok(path.trim_matches('/').to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_root_deployment() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.server.address(), "localhost:8338");

        let settings = config.dispatcher.settings().unwrap();
        assert_eq!(settings, DispatcherSettings::new());
        assert_eq!(settings.context_path(), "");
        assert_eq!(settings.mount_path(), "");
    }

    #[test]
    fn full_file_parses() {
        let config = Config::from_toml_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [dispatcher]
            context_path = "/app"
            mount_path = "/admin/*"
            ignore_paths = ["/static", "assets"]
            "#,
        )
        .unwrap();

        assert_eq!(config.server.address(), "0.0.0.0:9000");
        let settings = config.dispatcher.settings().unwrap();
        assert_eq!(settings.context_path(), "/app");
        assert_eq!(settings.mount_path(), "admin");
        assert_eq!(settings.ignore_paths(), ["static", "assets"]);
    }

    #[test]
    fn ignore_paths_accept_comma_separated_string() {
        let config = Config::from_toml_str(
            r#"
            [dispatcher]
            ignore_paths = " static , /webjars,, "
            "#,
        )
        .unwrap();
        let settings = config.dispatcher.settings().unwrap();
        assert_eq!(settings.ignore_paths(), ["static", "webjars"]);
    }

    #[test]
    fn mount_path_forms() {
        for (raw, expected) in [
            ("", ""),
            ("/*", ""),
            ("admin", "admin"),
            ("/admin/", "admin"),
            ("/admin/*", "admin"),
            ("/api/v1/*", "api/v1"),
        ] {
            let settings = DispatcherSettings::new().with_mount_path(raw).unwrap();
            assert_eq!(settings.mount_path(), expected, "mount path {raw:?}");
        }
    }

    #[test]
    fn malformed_mount_mappings_are_rejected() {
        for raw in ["admin/*", "/admin*", "/a/*/b/*", "*"] {
            assert!(
                matches!(
                    DispatcherSettings::new().with_mount_path(raw),
                    Err(ConfigError::InvalidMountPath(_))
                ),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn context_path_is_normalized() {
        assert_eq!(DispatcherSettings::new().with_context_path("/").context_path(), "");
        assert_eq!(
            DispatcherSettings::new().with_context_path("app/").context_path(),
            "/app"
        );
    }

    #[test]
    fn unknown_file_is_an_io_error() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
