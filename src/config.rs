pub const ENV_API_KEY: &str = "FINWISE_API_KEY";
pub const ENV_AUTH_DOMAIN: &str = "FINWISE_AUTH_DOMAIN";
pub const ENV_PROJECT_ID: &str = "FINWISE_PROJECT_ID";
pub const ENV_STORAGE_BUCKET: &str = "FINWISE_STORAGE_BUCKET";
pub const ENV_MESSAGING_SENDER_ID: &str = "FINWISE_MESSAGING_SENDER_ID";
pub const ENV_APP_ID: &str = "FINWISE_APP_ID";
pub const ENV_EXTRACTOR_URL: &str = "FINWISE_EXTRACTOR_URL";
pub const ENV_LOG: &str = "FINWISE_LOG";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendConfig {
    pub api_key: Option<String>,
    pub auth_domain: Option<String>,
    pub project_id: Option<String>,
    pub storage_bucket: Option<String>,
    pub messaging_sender_id: Option<String>,
    pub app_id: Option<String>,
    pub extractor_url: Option<String>,
}

impl BackendConfig {
    /// Load `.env` (if any) and read the process environment.
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                log::warn!("Ignoring unreadable .env file: {e}");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. Blank values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            api_key: get(ENV_API_KEY),
            auth_domain: get(ENV_AUTH_DOMAIN),
            project_id: get(ENV_PROJECT_ID),
            storage_bucket: get(ENV_STORAGE_BUCKET),
            messaging_sender_id: get(ENV_MESSAGING_SENDER_ID),
            app_id: get(ENV_APP_ID),
            extractor_url: get(ENV_EXTRACTOR_URL),
        }
    }

    /// API key and project id are the two values the backend cannot start without.
    pub fn is_complete(&self) -> bool {
        self.api_key.is_some() && self.project_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_complete_config() {
        let config = BackendConfig::from_lookup(lookup_from(&[
            (ENV_API_KEY, "key-123"),
            (ENV_PROJECT_ID, "finwise-dev"),
            (ENV_AUTH_DOMAIN, "finwise-dev.example.com"),
        ]));
        assert!(config.is_complete());
        assert_eq!(config.project_id.as_deref(), Some("finwise-dev"));
        assert!(config.storage_bucket.is_none());
    }

    #[test]
    fn test_missing_api_key_is_incomplete() {
        let config = BackendConfig::from_lookup(lookup_from(&[(ENV_PROJECT_ID, "p")]));
        assert!(!config.is_complete());
    }

    #[test]
    fn test_missing_project_id_is_incomplete() {
        let config = BackendConfig::from_lookup(lookup_from(&[(ENV_API_KEY, "k")]));
        assert!(!config.is_complete());
    }

    #[test]
    fn test_blank_values_count_as_absent() {
        let config = BackendConfig::from_lookup(lookup_from(&[
            (ENV_API_KEY, "   "),
            (ENV_PROJECT_ID, "p"),
        ]));
        assert!(config.api_key.is_none());
        assert!(!config.is_complete());
    }
}
