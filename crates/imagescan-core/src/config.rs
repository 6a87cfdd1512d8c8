use crate::error::{Result, ServiceError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_REGION: &str = "us-east-2";

/// Static AWS credentials used to sign registry requests.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// How findings are fetched after a scan has been started.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FindingsPolicy {
    /// Extra fetches while the scan is still running. Zero means a single fetch.
    #[serde(default)]
    pub poll_attempts: u32,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    5
}

impl Default for FindingsPolicy {
    fn default() -> Self {
        Self {
            poll_attempts: 0,
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl FindingsPolicy {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Registry connection settings, resolved once at startup and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    pub region: String,
    /// Registry (account) id. `None` targets the caller's default registry.
    pub registry_id: Option<String>,
    /// Endpoint override, e.g. a VPC endpoint or a local test server.
    pub endpoint: Option<String>,
    pub credentials: Option<Credentials>,
    pub findings: FindingsPolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            registry_id: None,
            endpoint: None,
            credentials: None,
            findings: FindingsPolicy::default(),
        }
    }
}

/// On-disk form of the configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    registry: RegistrySection,
    #[serde(default)]
    credentials: Option<Credentials>,
    #[serde(default)]
    findings: Option<FindingsPolicy>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistrySection {
    region: Option<String>,
    registry_id: Option<String>,
    endpoint: Option<String>,
}

impl RegistryConfig {
    /// Parse a TOML configuration document on top of the defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| ServiceError::Config(format!("invalid config file: {}", e)))?;

        let mut config = Self::default();
        if let Some(region) = file.registry.region {
            config.region = region;
        }
        config.registry_id = file.registry.registry_id;
        config.endpoint = file.registry.endpoint;
        config.credentials = file.credentials;
        if let Some(findings) = file.findings {
            config.findings = findings;
        }
        Ok(config)
    }

    /// Read a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ServiceError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Overlay the standard AWS environment variables.
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay environment values taken from `lookup`.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(region) = get("AWS_REGION").or_else(|| get("AWS_DEFAULT_REGION")) {
            self.region = region;
        }

        if let (Some(access_key_id), Some(secret_access_key)) =
            (get("AWS_ACCESS_KEY_ID"), get("AWS_SECRET_ACCESS_KEY"))
        {
            self.credentials = Some(Credentials {
                access_key_id,
                secret_access_key,
                session_token: get("AWS_SESSION_TOKEN"),
            });
        }

        self
    }

    /// Registry API endpoint for the configured region.
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://api.ecr.{}.amazonaws.com", self.region),
        }
    }

    /// Reject configurations that cannot produce a working client.
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(ServiceError::Config("region must not be empty".to_string()));
        }
        if let Some(id) = &self.registry_id {
            if id.len() != 12 || !id.chars().all(|c| c.is_ascii_digit()) {
                return Err(ServiceError::Config(format!(
                    "registry id '{}' must be a 12-digit account id",
                    id
                )));
            }
        }
        Ok(())
    }

    pub fn require_credentials(&self) -> Result<&Credentials> {
        self.credentials.as_ref().ok_or_else(|| {
            ServiceError::Credentials(
                "set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY or add a [credentials] section"
                    .to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.region, "us-east-2");
        assert!(config.registry_id.is_none());
        assert_eq!(config.findings.poll_attempts, 0);
        assert_eq!(config.endpoint_url(), "https://api.ecr.us-east-2.amazonaws.com");
    }

    #[test]
    fn test_parse_toml() {
        let config = RegistryConfig::from_toml_str(
            r#"
            [registry]
            region = "eu-west-1"
            registry_id = "123456789012"

            [findings]
            poll_attempts = 12
            "#,
        )
        .unwrap();

        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.registry_id.as_deref(), Some("123456789012"));
        assert_eq!(config.findings.poll_attempts, 12);
        assert_eq!(config.findings.poll_interval(), Duration::from_secs(5));
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_parse_toml_rejects_unknown_keys() {
        let err = RegistryConfig::from_toml_str("[registry]\nzone = \"x\"\n").unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[registry]\nendpoint = \"http://localhost:4566/\"\n\n[credentials]\naccess_key_id = \"AKID\"\nsecret_access_key = \"SECRET\""
        )
        .unwrap();

        let config = RegistryConfig::from_file(file.path()).unwrap();
        assert_eq!(config.endpoint_url(), "http://localhost:4566");
        assert_eq!(config.require_credentials().unwrap().access_key_id, "AKID");
    }

    #[test]
    fn test_env_overrides_file() {
        let config = RegistryConfig::from_toml_str("[registry]\nregion = \"eu-west-1\"\n")
            .unwrap()
            .apply_env_from(env(&[
                ("AWS_REGION", "ap-south-1"),
                ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
                ("AWS_SECRET_ACCESS_KEY", "secret"),
                ("AWS_SESSION_TOKEN", "token"),
            ]));

        assert_eq!(config.region, "ap-south-1");
        let creds = config.credentials.unwrap();
        assert_eq!(creds.access_key_id, "AKIDEXAMPLE");
        assert_eq!(creds.session_token.as_deref(), Some("token"));
    }

    #[test]
    fn test_env_requires_both_keys() {
        let config = RegistryConfig::default()
            .apply_env_from(env(&[("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE")]));

        assert!(config.credentials.is_none());
        assert!(matches!(
            config.require_credentials(),
            Err(ServiceError::Credentials(_))
        ));
    }

    #[test]
    fn test_default_region_fallback() {
        let config =
            RegistryConfig::default().apply_env_from(env(&[("AWS_DEFAULT_REGION", "us-west-2")]));
        assert_eq!(config.region, "us-west-2");
    }

    #[test]
    fn test_validate_registry_id() {
        let mut config = RegistryConfig::default();
        config.registry_id = Some("12345".to_string());
        assert!(config.validate().is_err());

        config.registry_id = Some("123456789012".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_debug_hides_secret() {
        let creds = Credentials {
            access_key_id: "AKID".to_string(),
            secret_access_key: "super-secret".to_string(),
            session_token: None,
        };
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("AKID"));
        assert!(!rendered.contains("super-secret"));
    }
}
