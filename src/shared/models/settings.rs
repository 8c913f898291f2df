use std::{env, fs, io, path::{Path, PathBuf}, time::Duration};

use serde::Deserialize;

const SETTINGS_FILENAME: &str = "settings.json";
const SETTINGS_PATH_VAR: &str = "TASKDESK_SETTINGS";
const API_URL_VAR: &str = "TASKDESK_API_URL";

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("cannot read settings file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot parse settings file {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Origin of the REST backend; endpoints live under `/api`.
    pub api_base_url: String,
    /// redb file holding the access/refresh token pair.
    pub credentials_path: PathBuf,
    /// Age after which a cached read is served and refreshed in the background.
    pub stale_after_secs: u64,
    pub list_retry_attempts: u32,
    pub list_retry_delay_ms: u64,
    /// Unset means the transport default.
    pub request_timeout_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            credentials_path: PathBuf::from("credentials.redb"),
            stale_after_secs: 30,
            list_retry_attempts: 2,
            list_retry_delay_ms: 1000,
            request_timeout_secs: None,
        }
    }
}

impl Settings {
    /// Load from `$TASKDESK_SETTINGS` or `./settings.json`. A missing file
    /// yields defaults; `$TASKDESK_API_URL` overrides the backend origin.
    pub fn load() -> Result<Settings, SettingsError> {
        let path = env::var_os(SETTINGS_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(SETTINGS_FILENAME));

        let mut settings = if path.exists() {
            Settings::from_file(&path)?
        } else {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            Settings::default()
        };

        if let Ok(url) = env::var(API_URL_VAR) {
            settings.api_base_url = url;
        }
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Settings, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn list_retry_delay(&self) -> Duration {
        Duration::from_millis(self.list_retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
