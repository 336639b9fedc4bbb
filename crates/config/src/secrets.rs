// Credentials
//
// Secrets are looked up in:
// 1. System keychain (preferred)
// 2. Environment variables (fallback for servers/CI, .env included)
//
// Secrets are NEVER stored in autoreply.toml

use std::env;
use std::fmt;

/// Service name for keychain storage
const KEYCHAIN_SERVICE: &str = "autoreply";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Secret {
    /// SMTP password (Gmail app password)
    MailPassword,
    /// OAuth bearer token for the Sheets API
    SheetsToken,
}

impl Secret {
    pub const ALL: [Secret; 2] = [Secret::MailPassword, Secret::SheetsToken];

    /// CLI name, also the keychain account suffix
    pub fn as_str(&self) -> &'static str {
        match self {
            Secret::MailPassword => "mail-password",
            Secret::SheetsToken => "sheets-token",
        }
    }

    /// Environment variables checked in order
    pub fn env_vars(&self) -> &'static [&'static str] {
        match self {
            Secret::MailPassword => &["AUTOREPLY_MAIL_PASSWORD", "EMAIL_PASS"],
            Secret::SheetsToken => &["AUTOREPLY_SHEETS_TOKEN", "GOOGLE_ACCESS_TOKEN"],
        }
    }

    fn keychain_account(&self) -> String {
        format!("credentials/{}", self.as_str())
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a secret came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSource {
    Keychain,
    Environment,
    None,
}

impl SecretSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretSource::Keychain => "keychain",
            SecretSource::Environment => "environment",
            SecretSource::None => "none",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SecretLookup {
    pub value: Option<String>,
    pub source: SecretSource,
}

impl SecretLookup {
    fn none() -> Self {
        Self {
            value: None,
            source: SecretSource::None,
        }
    }
}

/// Get a secret: keychain first, then environment.
pub fn get_secret(secret: Secret) -> SecretLookup {
    #[cfg(feature = "keychain")]
    {
        if let Ok(entry) = keyring::Entry::new(KEYCHAIN_SERVICE, &secret.keychain_account()) {
            if let Ok(value) = entry.get_password() {
                return SecretLookup {
                    value: Some(value),
                    source: SecretSource::Keychain,
                };
            }
        }
    }

    lookup_env(secret, |name| env::var(name).ok())
}

/// Environment half of [`get_secret`]. Empty values count as unset.
pub fn lookup_env(secret: Secret, get: impl Fn(&str) -> Option<String>) -> SecretLookup {
    for name in secret.env_vars() {
        if let Some(value) = get(name).filter(|v| !v.is_empty()) {
            log::debug!("{} taken from ${}", secret, name);
            return SecretLookup {
                value: Some(value),
                source: SecretSource::Environment,
            };
        }
    }
    SecretLookup::none()
}

/// Store a secret in the system keychain
#[cfg(feature = "keychain")]
pub fn set_secret(secret: Secret, value: &str) -> Result<(), String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, &secret.keychain_account())
        .map_err(|e| format!("Failed to create keychain entry: {}", e))?;

    entry
        .set_password(value)
        .map_err(|e| format!("Failed to store {} in keychain: {}", secret, e))
}

#[cfg(not(feature = "keychain"))]
pub fn set_secret(secret: Secret, _value: &str) -> Result<(), String> {
    Err(format!(
        "Keychain support not enabled. Set {} instead.",
        secret.env_vars()[0]
    ))
}

/// Delete a secret from the system keychain
#[cfg(feature = "keychain")]
pub fn delete_secret(secret: Secret) -> Result<(), String> {
    let entry = keyring::Entry::new(KEYCHAIN_SERVICE, &secret.keychain_account())
        .map_err(|e| format!("Failed to access keychain entry: {}", e))?;

    entry
        .delete_credential()
        .map_err(|e| format!("Failed to delete {} from keychain: {}", secret, e))
}

#[cfg(not(feature = "keychain"))]
pub fn delete_secret(_secret: Secret) -> Result<(), String> {
    Err("Keychain support not enabled.".to_string())
}

pub fn keychain_available() -> bool {
    #[cfg(feature = "keychain")]
    {
        keyring::Entry::new(KEYCHAIN_SERVICE, "probe").is_ok()
    }
    #[cfg(not(feature = "keychain"))]
    {
        false
    }
}
