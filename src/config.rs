use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::SeqRemoteError;

pub const DEFAULT_BASE_URL: &str = "https://app.onecodex.com/api/v0";
pub const API_KEY_ENV: &str = "ONE_CODEX_API_KEY";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 3600;
const DEFAULT_REGISTRATION_WAIT_SECS: u64 = 10;

/// On-disk config file, every field optional.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub upload_timeout_secs: Option<u64>,
    #[serde(default)]
    pub registration_wait_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub request_timeout: Duration,
    pub upload_timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Result<Self, SeqRemoteError> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(SeqRemoteError::MissingApiKey);
        }
        Ok(Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            upload_timeout: Duration::from_secs(DEFAULT_UPLOAD_TIMEOUT_SECS),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub client: ClientConfig,
    pub registration_wait: Duration,
}

/// Values that outrank the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_key: Option<String>,
    pub env_api_key: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, SeqRemoteError> {
        let config = match path {
            Some(path) => Self::read(PathBuf::from(path))?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::read(path)?,
                _ => Config::default(),
            },
        };

        Self::resolve_config(config, overrides)
    }

    fn read(path: PathBuf) -> Result<Config, SeqRemoteError> {
        let content =
            fs::read_to_string(&path).map_err(|_| SeqRemoteError::ConfigRead(path.clone()))?;
        serde_json::from_str(&content).map_err(|err| SeqRemoteError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(
        config: Config,
        overrides: ConfigOverrides,
    ) -> Result<ResolvedConfig, SeqRemoteError> {
        let api_key = [overrides.api_key, overrides.env_api_key, config.api_key]
            .into_iter()
            .flatten()
            .find(|key| !key.trim().is_empty())
            .ok_or(SeqRemoteError::MissingApiKey)?;

        let mut client = ClientConfig::new(api_key)?;
        if let Some(base_url) = config.base_url {
            client.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = config.request_timeout_secs {
            client.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = config.upload_timeout_secs {
            client.upload_timeout = Duration::from_secs(secs);
        }

        Ok(ResolvedConfig {
            client,
            registration_wait: Duration::from_secs(
                config
                    .registration_wait_secs
                    .unwrap_or(DEFAULT_REGISTRATION_WAIT_SECS),
            ),
        })
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "seqremote").map(|dirs| dirs.config_dir().join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_beats_env_and_file() {
        let config = Config {
            api_key: Some("from-file".to_string()),
            ..Config::default()
        };
        let overrides = ConfigOverrides {
            api_key: Some("from-flag".to_string()),
            env_api_key: Some("from-env".to_string()),
        };
        let resolved = ConfigLoader::resolve_config(config, overrides).unwrap();
        assert_eq!(resolved.client.api_key, "from-flag");
        assert_eq!(resolved.client.base_url, DEFAULT_BASE_URL);
        assert_eq!(resolved.registration_wait, Duration::from_secs(10));
    }

    #[test]
    fn blank_key_is_rejected() {
        assert!(matches!(
            ClientConfig::new("   "),
            Err(SeqRemoteError::MissingApiKey)
        ));
    }
}
