//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default number of photo transfers in flight at once.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 3;

/// Service configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct OnboardingConfig {
    /// Base URL of the property resource API (no trailing slash).
    pub api_base_url: String,
    /// Bearer token forwarded to the resource API.
    pub api_token: Option<SecretString>,
    /// Timeout applied to every resource API request.
    pub request_timeout: Duration,
    /// Directory holding draft snapshots.
    pub data_dir: PathBuf,
    /// Port for the onboarding HTTP surface.
    pub http_port: u16,
    /// Finalization pipeline settings.
    pub finalize: FinalizeConfig,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:4000/api".to_string(),
            api_token: None,
            request_timeout: Duration::from_secs(30),
            data_dir: PathBuf::from("./data"),
            http_port: 8080,
            finalize: FinalizeConfig::default(),
        }
    }
}

impl OnboardingConfig {
    /// Build config from environment variables, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_base_url = std::env::var("ONBOARDING_API_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);

        let api_token = std::env::var("ONBOARDING_API_TOKEN")
            .ok()
            .filter(|s| !s.is_empty())
            .map(SecretString::from);

        let request_timeout = match env_parse::<u64>("ONBOARDING_REQUEST_TIMEOUT_SECS")? {
            Some(secs) => Duration::from_secs(secs),
            None => defaults.request_timeout,
        };

        let data_dir = std::env::var("ONBOARDING_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let http_port = env_parse::<u16>("ONBOARDING_HTTP_PORT")?.unwrap_or(defaults.http_port);

        let upload_concurrency = env_parse::<usize>("ONBOARDING_UPLOAD_CONCURRENCY")?
            .unwrap_or(DEFAULT_UPLOAD_CONCURRENCY);
        if upload_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ONBOARDING_UPLOAD_CONCURRENCY".to_string(),
                message: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            api_base_url,
            api_token,
            request_timeout,
            data_dir,
            http_port,
            finalize: FinalizeConfig {
                upload_concurrency,
                ..defaults.finalize
            },
        })
    }
}

/// Settings for the finalization pipeline.
#[derive(Debug, Clone)]
pub struct FinalizeConfig {
    /// Maximum concurrent byte transfers in the photo stage.
    pub upload_concurrency: usize,
    /// Capacity of the progress event broadcast channel.
    pub event_capacity: usize,
}

impl Default for FinalizeConfig {
    fn default() -> Self {
        Self {
            upload_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            event_capacity: 256,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_three_concurrent_uploads() {
        let config = OnboardingConfig::default();
        assert_eq!(config.finalize.upload_concurrency, 3);
        assert!(config.api_token.is_none());
        assert_eq!(config.http_port, 8080);
    }

    #[test]
    fn env_parse_reports_key_on_bad_value() {
        // SAFETY: test-only env mutation on a key no other test reads.
        unsafe { std::env::set_var("ONBOARDING_TEST_BAD_NUMBER", "three") };
        let err = env_parse::<usize>("ONBOARDING_TEST_BAD_NUMBER").unwrap_err();
        assert!(err.to_string().contains("ONBOARDING_TEST_BAD_NUMBER"));
        unsafe { std::env::remove_var("ONBOARDING_TEST_BAD_NUMBER") };
    }

    #[test]
    fn env_parse_missing_key_is_none() {
        let value = env_parse::<u16>("ONBOARDING_TEST_DEFINITELY_UNSET").unwrap();
        assert!(value.is_none());
    }
}
