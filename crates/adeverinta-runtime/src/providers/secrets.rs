//! Secure credential handling for model providers.
//!
//! Every provider stores its API key as an [`ApiCredential`]:
//!
//! - **No accidental logging**: credentials never appear in Debug/Display output
//! - **Memory safety**: credentials are zeroed on drop
//! - **Explicit exposure**: the raw value is only reachable through `.expose()`
//!
//! ## Usage
//!
//! ```ignore
//! use crate::providers::secrets::ApiCredential;
//!
//! // Configured value with env fallback
//! let cred = ApiCredential::from_config_or_env(config.api_key.as_deref(), "OPENAI_API_KEY", "OpenAI API key")?;
//!
//! // Use in HTTP header (explicit exposure)
//! request.bearer_auth(cred.expose());
//! ```

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use super::ProviderError;

/// Where a credential was loaded from.
///
/// Useful for debugging configuration without exposing the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from the configuration file
    Config,
    /// Loaded from environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely stored API credential.
///
/// Debug and Display show `[REDACTED]`; the value is only reachable
/// through [`expose`](Self::expose).
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    /// Wrap a credential value. It cannot be logged after this point.
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load credential from an environment variable.
    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, ProviderError> {
        std::env::var(env_var)
            .map(|v| Self::new(v, CredentialSource::Environment, name))
            .map_err(|_| {
                ProviderError::NotConfigured(format!(
                    "{} not set: configure '{}' environment variable",
                    name, env_var
                ))
            })
    }

    /// Use the configured value when present, else the environment variable.
    pub fn from_config_or_env(
        configured: Option<&str>,
        env_var: &str,
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        if let Some(value) = configured.filter(|v| !v.is_empty()) {
            return Ok(Self::new(value, CredentialSource::Config, name));
        }

        if let Ok(value) = std::env::var(env_var) {
            return Ok(Self::new(value, CredentialSource::Environment, name));
        }

        Err(ProviderError::NotConfigured(format!(
            "{} required: set 'api_key' in config or {} environment variable",
            name, env_var
        )))
    }

    /// Check if a credential is available (without loading it).
    pub fn is_available(configured: Option<&str>, env_var: &str) -> bool {
        configured.is_some_and(|v| !v.is_empty()) || std::env::var(env_var).is_ok()
    }

    /// Expose the credential value for use in API calls.
    ///
    /// Only call this where the credential is sent (e.g. an HTTP header).
    /// Never store the exposed value.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    /// Check if the credential is empty.
    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    /// Get the source of this credential.
    pub fn source(&self) -> CredentialSource {
        self.source
    }

    /// Get the human-readable name of this credential.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_redact() {
        let cred = ApiCredential::new("sk-secret-123", CredentialSource::Programmatic, "Test key");
        let debug = format!("{:?}", cred);
        let display = format!("{}", cred);
        assert!(!debug.contains("sk-secret-123"));
        assert!(!display.contains("sk-secret-123"));
        assert!(debug.contains("[REDACTED]"));
        assert!(display.contains("Test key from programmatic"));
    }

    #[test]
    fn test_expose_returns_value() {
        let cred = ApiCredential::new("value", CredentialSource::Config, "Test key");
        assert_eq!(cred.expose(), "value");
        assert!(!cred.is_empty());
        assert_eq!(cred.name(), "Test key");
    }

    #[test]
    fn test_config_takes_precedence() {
        std::env::set_var("ADEVERINTA_TEST_KEY_PRIORITY", "env-key");
        let cred = ApiCredential::from_config_or_env(
            Some("config-key"),
            "ADEVERINTA_TEST_KEY_PRIORITY",
            "Test key",
        )
        .unwrap();
        assert_eq!(cred.expose(), "config-key");
        assert_eq!(cred.source(), CredentialSource::Config);
        std::env::remove_var("ADEVERINTA_TEST_KEY_PRIORITY");
    }

    #[test]
    fn test_falls_back_to_env() {
        std::env::set_var("ADEVERINTA_TEST_KEY_FALLBACK", "env-key");
        let cred =
            ApiCredential::from_config_or_env(Some(""), "ADEVERINTA_TEST_KEY_FALLBACK", "Test key")
                .unwrap();
        assert_eq!(cred.expose(), "env-key");
        assert_eq!(cred.source(), CredentialSource::Environment);
        std::env::remove_var("ADEVERINTA_TEST_KEY_FALLBACK");
    }

    #[test]
    fn test_error_names_both_sources() {
        let err = ApiCredential::from_config_or_env(None, "ADEVERINTA_MISSING_12345", "Test key")
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Test key"));
        assert!(msg.contains("ADEVERINTA_MISSING_12345"));
        assert!(!ApiCredential::is_available(None, "ADEVERINTA_MISSING_12345"));
        assert!(ApiCredential::is_available(Some("k"), "ADEVERINTA_MISSING_12345"));
    }
}
