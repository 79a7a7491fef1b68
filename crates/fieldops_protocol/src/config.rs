//! Configuration for Field Ops clients.
//!
//! Read from `~/.fieldops/config.toml`. Every field has a default so a
//! missing file or a partial file still yields a usable config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_URL: &str = "FIELDOPS_URL";
pub const ENV_ANON_KEY: &str = "FIELDOPS_ANON_KEY";
pub const ENV_ACCESS_TOKEN: &str = "FIELDOPS_ACCESS_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("failed to serialize config: {0}")]
    Serialize(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub findings: FindingPolicy,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

/// Where the backing service lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    #[serde(default)]
    pub url: String,

    /// Public anon key sent as `apikey`.
    #[serde(default)]
    pub anon_key: String,

    /// Session token. Normally supplied by `login` or the environment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default = "default_photos_bucket")]
    pub photos_bucket: String,

    #[serde(default = "default_reports_bucket")]
    pub reports_bucket: String,

    /// Logo drawn in the report header. Skipped when unset or unreachable.
    #[serde(default)]
    pub logo_url: Option<String>,

    #[serde(default = "default_report_function")]
    pub report_function: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_photos_bucket() -> String {
    "field-ops-photos".to_string()
}

fn default_reports_bucket() -> String {
    "field-ops-reports".to_string()
}

fn default_report_function() -> String {
    "send-audit-report".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            access_token: None,
            photos_bucket: default_photos_bucket(),
            reports_bucket: default_reports_bucket(),
            logo_url: None,
            report_function: default_report_function(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl BackendConfig {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty() && !self.anon_key.trim().is_empty()
    }
}

/// Photo compression and video limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaConfig {
    #[serde(default = "default_max_dimension")]
    pub max_width: u32,
    #[serde(default = "default_max_dimension")]
    pub max_height: u32,
    /// JPEG quality, 1..=100.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default = "default_max_video_bytes")]
    pub max_video_bytes: u64,
}

fn default_max_dimension() -> u32 {
    1280
}

fn default_jpeg_quality() -> u8 {
    80
}

fn default_max_video_bytes() -> u64 {
    50 * 1024 * 1024
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_width: default_max_dimension(),
            max_height: default_max_dimension(),
            jpeg_quality: default_jpeg_quality(),
            max_video_bytes: default_max_video_bytes(),
        }
    }
}

/// How findings are dated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingPolicy {
    #[serde(default = "default_red_flag_days")]
    pub red_flag_due_days: u32,
    #[serde(default = "default_no_days")]
    pub no_due_days: u32,
    /// Recompute the due date when an existing finding changes severity.
    #[serde(default)]
    pub recompute_due_on_severity_change: bool,
}

fn default_red_flag_days() -> u32 {
    3
}

fn default_no_days() -> u32 {
    7
}

impl Default for FindingPolicy {
    fn default() -> Self {
        Self {
            red_flag_due_days: default_red_flag_days(),
            no_due_days: default_no_days(),
            recompute_due_on_severity_change: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Overrides `~/.fieldops/session`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Largest value the key store accepts before snapshots degrade.
    #[serde(default = "default_max_value_bytes")]
    pub max_value_bytes: usize,
}

fn default_max_value_bytes() -> usize {
    5 * 1024 * 1024
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_value_bytes: default_max_value_bytes(),
        }
    }
}

impl SessionConfig {
    pub fn resolved_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(crate::paths::session_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_auth_grace_ms")]
    pub auth_grace_ms: u64,
}

fn default_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_auth_grace_ms() -> u64 {
    5000
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            base_delay_ms: default_base_delay_ms(),
            auth_grace_ms: default_auth_grace_ms(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `FIELDOPS_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Blank values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get(ENV_URL) {
            self.backend.url = url;
        }
        if let Some(key) = get(ENV_ANON_KEY) {
            self.backend.anon_key = key;
        }
        if let Some(token) = get(ENV_ACCESS_TOKEN) {
            self.backend.access_token = Some(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.backend.photos_bucket, "field-ops-photos");
        assert_eq!(config.backend.reports_bucket, "field-ops-reports");
        assert_eq!(config.media.max_width, 1280);
        assert_eq!(config.media.jpeg_quality, 80);
        assert_eq!(config.media.max_video_bytes, 50 * 1024 * 1024);
        assert_eq!(config.findings.red_flag_due_days, 3);
        assert_eq!(config.findings.no_due_days, 7);
        assert_eq!(config.bootstrap.attempts, 3);
        assert_eq!(config.bootstrap.auth_grace_ms, 5000);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [backend]
            url = "https://demo.supabase.co"

            [findings]
            no_due_days = 14
            "#,
        )
        .unwrap();
        assert_eq!(config.backend.url, "https://demo.supabase.co");
        assert_eq!(config.backend.photos_bucket, "field-ops-photos");
        assert_eq!(config.findings.no_due_days, 14);
        assert_eq!(config.findings.red_flag_due_days, 3);
        assert_eq!(config.session.max_value_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_env_overrides_skip_blank_values() {
        let env: HashMap<&str, &str> = [
            (ENV_URL, "https://env.example"),
            (ENV_ANON_KEY, "   "),
            (ENV_ACCESS_TOKEN, "tok"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.backend.anon_key = "file-key".into();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.backend.url, "https://env.example");
        assert_eq!(config.backend.anon_key, "file-key");
        assert_eq!(config.backend.access_token.as_deref(), Some("tok"));
    }
}
