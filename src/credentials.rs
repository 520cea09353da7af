use std::fmt;

use reqwest::header::{HeaderValue, InvalidHeaderValue};
use secrecy::{ExposeSecret, SecretString};

use crate::error::SyncError;

/// Preferred credential source: an opaque bearer token.
pub const TOKEN_ENV: &str = "BULKSYNC_TOKEN";
/// Legacy portal API key, sent raw as the Authorization value.
pub const LEGACY_KEY_ENV: &str = "CKAN_API_KEY";

/// Operator instructions printed when no credential is present.
pub const CREDENTIAL_HELP: &str = "\
Please set the BULKSYNC_TOKEN environment variable (or the legacy
CKAN_API_KEY variable) before running bulksync.

You can find your token on your portal user page. It has the format:
    xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx

On Linux/MacOS/Unix:
    export BULKSYNC_TOKEN=xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx

On Microsoft Windows, within PowerShell:
    $env:BULKSYNC_TOKEN=\"xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx\"

On Microsoft Windows, within a Command shell:
    set BULKSYNC_TOKEN=xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
";

/// A single static credential for the whole run. No refresh or rotation.
#[derive(Clone)]
pub enum Credential {
    Bearer(SecretString),
    LegacyKey(SecretString),
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        // no need for constant time comparisons, not a sensitive context
        match (self, other) {
            (Credential::Bearer(a), Credential::Bearer(b)) => {
                a.expose_secret() == b.expose_secret()
            }
            (Credential::LegacyKey(a), Credential::LegacyKey(b)) => {
                a.expose_secret() == b.expose_secret()
            }
            _ => false,
        }
    }
}

impl Eq for Credential {}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Bearer(_) => f.debug_tuple("Bearer").field(&"***").finish(),
            Credential::LegacyKey(_) => f.debug_tuple("LegacyKey").field(&"***").finish(),
        }
    }
}

impl Credential {
    pub fn bearer(token: &str) -> Self {
        Credential::Bearer(SecretString::from(token))
    }

    pub fn legacy_key(key: &str) -> Self {
        Credential::LegacyKey(SecretString::from(key))
    }

    /// Reads the credential from the environment. Absence is fatal and is
    /// detected before any network activity.
    pub fn from_env() -> Result<Self, SyncError> {
        Self::from_values(
            std::env::var(TOKEN_ENV).ok(),
            std::env::var(LEGACY_KEY_ENV).ok(),
        )
    }

    pub fn from_values(
        token: Option<String>,
        legacy_key: Option<String>,
    ) -> Result<Self, SyncError> {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            return Ok(Credential::bearer(token.trim()));
        }
        if let Some(key) = legacy_key.filter(|k| !k.trim().is_empty()) {
            return Ok(Credential::legacy_key(key.trim()));
        }
        Err(SyncError::MissingCredential)
    }

    /// Authorization header value attached to every request, marked sensitive
    /// so it is never logged.
    pub fn authorization_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        let mut value = match self {
            Credential::Bearer(token) => {
                HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))?
            }
            Credential::LegacyKey(key) => HeaderValue::from_str(key.expose_secret())?,
        };
        value.set_sensitive(true);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_is_preferred_over_legacy_key() {
        let cred = Credential::from_values(
            Some("token-123".to_string()),
            Some("legacy-456".to_string()),
        )
        .unwrap();
        assert_eq!(cred, Credential::bearer("token-123"));
    }

    #[test]
    fn legacy_key_is_used_when_no_token() {
        let cred = Credential::from_values(None, Some("legacy-456".to_string())).unwrap();
        assert_eq!(cred, Credential::legacy_key("legacy-456"));
    }

    #[test]
    fn blank_values_count_as_missing() {
        let err = Credential::from_values(Some("   ".to_string()), Some("".to_string()))
            .unwrap_err();
        assert!(matches!(err, SyncError::MissingCredential));
    }

    #[test]
    fn missing_credential_is_fatal() {
        let err = Credential::from_values(None, None).unwrap_err();
        assert!(matches!(err, SyncError::MissingCredential));
    }

    #[test]
    fn bearer_header_has_scheme_prefix() {
        let cred = Credential::bearer("token-123");
        let value = cred.authorization_value().unwrap();
        assert_eq!(value.to_str().unwrap(), "Bearer token-123");
        assert!(value.is_sensitive());
    }

    #[test]
    fn legacy_header_is_sent_raw() {
        let cred = Credential::legacy_key("legacy-456");
        let value = cred.authorization_value().unwrap();
        assert_eq!(value.to_str().unwrap(), "legacy-456");
        assert!(value.is_sensitive());
    }

    #[test]
    fn debug_never_prints_the_secret() {
        let cred = Credential::bearer("super-secret");
        let printed = format!("{:?}", cred);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("***"));
    }
}
