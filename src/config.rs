use std::{collections::HashMap, path::PathBuf, time::Duration};

use config::{Config as ConfigLib, ConfigError, Environment as EnvSource, File};
use secrecy::SecretString;
use serde::Deserialize;

const TEST_URL: &str = "https://appapi2.test.bankid.com/rp/v5.1";
const PRODUCTION_URL: &str = "https://appapi2.bankid.com/rp/v5.1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bankid: BankIdConfig,
}

/// The BankID environment an endpoint belongs to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Test,
    Production,
}

impl Environment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Test => TEST_URL,
            Environment::Production => PRODUCTION_URL,
        }
    }
}

/// Settings of a single client instance. Read-only once the client is built.
#[derive(Debug, Clone, Deserialize)]
pub struct BankIdConfig {
    #[serde(default)]
    pub environment: Environment,
    /// Overrides the base address derived from `environment`.
    #[serde(default)]
    pub url: Option<String>,
    /// Deadline applied to every call.
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
    pub credentials: CredentialsConfig,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl BankIdConfig {
    pub fn new(environment: Environment, credentials: CredentialsConfig) -> Self {
        Self {
            environment,
            url: None,
            timeout: DEFAULT_TIMEOUT,
            credentials,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base address the operation paths are appended to.
    pub fn endpoint(&self) -> &str {
        self.url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
    }
}

/// References to the credential material of the relying party.
///
/// The client identity is either a PKCS#12 bundle (`pkcs12` + `passphrase`) or
/// a PEM certificate chain with its PEM private key. The bundle wins when both
/// are set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub pkcs12: Option<PathBuf>,
    #[serde(default)]
    pub passphrase: Option<SecretString>,
    #[serde(default)]
    pub certificate: Option<PathBuf>,
    #[serde(default)]
    pub private_key: Option<PathBuf>,
    /// PEM trust anchor used to verify the endpoint.
    pub ca_certificate: PathBuf,
}

impl CredentialsConfig {
    pub fn pkcs12(
        path: impl Into<PathBuf>,
        passphrase: impl Into<String>,
        ca_certificate: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pkcs12: Some(path.into()),
            passphrase: Some(SecretString::from(passphrase.into())),
            ca_certificate: ca_certificate.into(),
            ..Default::default()
        }
    }

    pub fn pem(
        certificate: impl Into<PathBuf>,
        private_key: impl Into<PathBuf>,
        ca_certificate: impl Into<PathBuf>,
    ) -> Self {
        Self {
            certificate: Some(certificate.into()),
            private_key: Some(private_key.into()),
            ca_certificate: ca_certificate.into(),
            ..Default::default()
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("bankid.environment", "test")?
            .set_default("bankid.timeout", "5s")?
            .add_source(File::with_name("config/settings").required(false));

        // Explicit overrides keep tests independent of the process environment
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // e.g. APP_BANKID__TIMEOUT or APP_BANKID__CREDENTIALS__CA_CERTIFICATE
            builder = builder.add_source(
                EnvSource::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([(
            "bankid.credentials.ca_certificate".to_string(),
            "certs/ca.pem".to_string(),
        )])
    }

    #[test]
    fn test_default_config() {
        let config = Config::load_with_sources(Some(base_vars())).expect("Failed to load config");

        assert_eq!(config.bankid.environment, Environment::Test);
        assert_eq!(config.bankid.timeout, Duration::from_secs(5));
        assert_eq!(config.bankid.endpoint(), TEST_URL);
        assert!(config.bankid.credentials.pkcs12.is_none());
        assert_eq!(
            config.bankid.credentials.ca_certificate,
            PathBuf::from("certs/ca.pem")
        );
    }

    #[test]
    fn test_env_config() {
        let mut env_vars = base_vars();
        env_vars.insert("bankid.environment".into(), "production".into());
        env_vars.insert("bankid.timeout".into(), "750ms".into());
        env_vars.insert("bankid.credentials.pkcs12".into(), "certs/rp.p12".into());
        env_vars.insert("bankid.credentials.passphrase".into(), "qwerty123".into());

        let config = Config::load_with_sources(Some(env_vars)).expect("Failed to load config");

        assert_eq!(config.bankid.environment, Environment::Production);
        assert_eq!(config.bankid.endpoint(), PRODUCTION_URL);
        assert_eq!(config.bankid.timeout, Duration::from_millis(750));
        assert_eq!(
            config.bankid.credentials.pkcs12,
            Some(PathBuf::from("certs/rp.p12"))
        );
        assert_eq!(
            config
                .bankid
                .credentials
                .passphrase
                .as_ref()
                .map(|p| p.expose_secret().to_string()),
            Some("qwerty123".to_string())
        );
    }

    #[test]
    fn test_url_override() {
        let mut env_vars = base_vars();
        env_vars.insert("bankid.url".into(), "https://localhost:8443/rp/v5.1".into());

        let config = Config::load_with_sources(Some(env_vars)).expect("Failed to load config");

        assert_eq!(config.bankid.endpoint(), "https://localhost:8443/rp/v5.1");
    }

    #[test]
    fn test_missing_trust_anchor_is_rejected() {
        assert!(Config::load_with_sources(Some(HashMap::new())).is_err());
    }

    #[test]
    fn test_builder_methods() {
        let config = BankIdConfig::new(
            Environment::Test,
            CredentialsConfig::pem("rp.crt", "rp.key", "ca.pem"),
        )
        .with_timeout(Duration::from_millis(1))
        .with_url("https://127.0.0.1:1/rp");

        assert_eq!(config.timeout, Duration::from_millis(1));
        assert_eq!(config.endpoint(), "https://127.0.0.1:1/rp");
        assert_eq!(
            config.credentials.private_key,
            Some(PathBuf::from("rp.key"))
        );
    }
}
