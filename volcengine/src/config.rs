//! Provider block settings with environment fallbacks

use std::collections::HashMap;
use tfdispatch::Dynamic;

use crate::api::{Credentials, DEFAULT_ENDPOINT};

pub const ENV_ACCESS_KEY: &str = "VOLCENGINE_ACCESS_KEY";
pub const ENV_SECRET_KEY: &str = "VOLCENGINE_SECRET_KEY";
pub const ENV_SESSION_TOKEN: &str = "VOLCENGINE_SESSION_TOKEN";
pub const ENV_REGION: &str = "VOLCENGINE_REGION";
pub const ENV_ENDPOINT: &str = "VOLCENGINE_ENDPOINT";
pub const ENV_DISABLE_SSL: &str = "VOLCENGINE_DISABLE_SSL";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("access_key is required (set in provider config or {ENV_ACCESS_KEY} env var)")]
    MissingAccessKey,
    #[error("secret_key is required (set in provider config or {ENV_SECRET_KEY} env var)")]
    MissingSecretKey,
    #[error("region is required (set in provider config or {ENV_REGION} env var)")]
    MissingRegion,
    #[error("{0} must be true or false")]
    InvalidBool(&'static str),
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub credentials: Credentials,
    pub region: String,
    pub endpoint: String,
    pub disable_ssl: bool,
}

impl ProviderConfig {
    /// Resolves every setting; all problems are reported, not just the first
    pub fn resolve(values: &HashMap<String, Dynamic>) -> Result<Self, Vec<ConfigError>> {
        let mut errors = Vec::new();

        let access_key = setting(values, "access_key", ENV_ACCESS_KEY);
        let secret_key = setting(values, "secret_key", ENV_SECRET_KEY);
        let region = setting(values, "region", ENV_REGION);
        let session_token = setting(values, "session_token", ENV_SESSION_TOKEN);
        let endpoint =
            setting(values, "endpoint", ENV_ENDPOINT).unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let disable_ssl = match values.get("disable_ssl").and_then(Dynamic::as_bool) {
            Some(flag) => flag,
            None => match std::env::var(ENV_DISABLE_SSL) {
                Ok(raw) if raw.is_empty() => false,
                Ok(raw) => raw.parse::<bool>().unwrap_or_else(|_| {
                    errors.push(ConfigError::InvalidBool(ENV_DISABLE_SSL));
                    false
                }),
                Err(_) => false,
            },
        };

        if access_key.is_none() {
            errors.push(ConfigError::MissingAccessKey);
        }
        if secret_key.is_none() {
            errors.push(ConfigError::MissingSecretKey);
        }
        if region.is_none() {
            errors.push(ConfigError::MissingRegion);
        }

        match (access_key, secret_key, region) {
            (Some(access_key), Some(secret_key), Some(region)) if errors.is_empty() => {
                let mut credentials = Credentials::new(access_key, secret_key);
                if let Some(token) = session_token {
                    credentials = credentials.with_session_token(token);
                }
                Ok(Self {
                    credentials,
                    region,
                    endpoint,
                    disable_ssl,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Provider block value first, then the environment; empty strings count as unset
fn setting(values: &HashMap<String, Dynamic>, key: &str, env: &str) -> Option<String> {
    values
        .get(key)
        .and_then(Dynamic::as_string)
        .map(str::to_string)
        .or_else(|| std::env::var(env).ok())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            ENV_ACCESS_KEY,
            ENV_SECRET_KEY,
            ENV_SESSION_TOKEN,
            ENV_REGION,
            ENV_ENDPOINT,
            ENV_DISABLE_SSL,
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn block_values_win_over_environment() {
        clear_env();
        std::env::set_var(ENV_REGION, "cn-shanghai");

        let mut values = HashMap::new();
        values.insert("access_key".to_string(), Dynamic::string("AK"));
        values.insert("secret_key".to_string(), Dynamic::string("SK"));
        values.insert("region".to_string(), Dynamic::string("cn-beijing"));
        values.insert("disable_ssl".to_string(), Dynamic::Bool(true));

        let config = tokio_test::assert_ok!(ProviderConfig::resolve(&values));
        assert_eq!(config.region, "cn-beijing");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(config.disable_ssl);
        assert!(config.credentials.session_token.is_none());

        clear_env();
    }

    #[test]
    #[serial]
    fn environment_fills_missing_values() {
        clear_env();
        std::env::set_var(ENV_ACCESS_KEY, "AK");
        std::env::set_var(ENV_SECRET_KEY, "SK");
        std::env::set_var(ENV_SESSION_TOKEN, "sts");
        std::env::set_var(ENV_REGION, "cn-guangzhou");
        std::env::set_var(ENV_ENDPOINT, "http://127.0.0.1:9000");

        let config = tokio_test::assert_ok!(ProviderConfig::resolve(&HashMap::new()));
        assert_eq!(config.credentials.access_key, "AK");
        assert_eq!(config.credentials.session_token.as_deref(), Some("sts"));
        assert_eq!(config.endpoint, "http://127.0.0.1:9000");
        assert!(!config.disable_ssl);

        clear_env();
    }

    #[test]
    #[serial]
    fn every_missing_setting_is_reported() {
        clear_env();
        std::env::set_var(ENV_DISABLE_SSL, "maybe");

        let errors = ProviderConfig::resolve(&HashMap::new()).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ConfigError::InvalidBool(ENV_DISABLE_SSL),
                ConfigError::MissingAccessKey,
                ConfigError::MissingSecretKey,
                ConfigError::MissingRegion,
            ]
        );
        assert!(errors[1].to_string().contains(ENV_ACCESS_KEY));

        clear_env();
    }
}
