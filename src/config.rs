// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, default values, and the settings structs
//! loaded from them at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `3000` |
//! | `JWT_ACCESS_SECRET` | HMAC secret for access tokens | Required (dev fallback with `dev` feature) |
//! | `JWT_REFRESH_SECRET` | HMAC secret for refresh tokens, must differ from the access secret | Required (dev fallback with `dev` feature) |
//! | `ACCESS_TOKEN_TTL_SECS` | Access token lifetime | `900` |
//! | `REFRESH_TOKEN_TTL_SECS` | Refresh token lifetime | `604800` |
//! | `GOOGLE_CLIENT_ID` | Expected `aud` of Google ID tokens | Optional (Google login disabled) |
//! | `GOOGLE_TOKENINFO_URL` | Google token verification endpoint | `https://oauth2.googleapis.com/tokeninfo` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files enabling HTTPS | Optional (plain HTTP) |
//! | `SEED_ADMIN_EMAIL` / `SEED_ADMIN_PASSWORD` | Admin account created at startup | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const ACCESS_SECRET_ENV: &str = "JWT_ACCESS_SECRET";
pub const REFRESH_SECRET_ENV: &str = "JWT_REFRESH_SECRET";
pub const ACCESS_TTL_ENV: &str = "ACCESS_TOKEN_TTL_SECS";
pub const REFRESH_TTL_ENV: &str = "REFRESH_TOKEN_TTL_SECS";
pub const GOOGLE_CLIENT_ID_ENV: &str = "GOOGLE_CLIENT_ID";
pub const GOOGLE_TOKENINFO_URL_ENV: &str = "GOOGLE_TOKENINFO_URL";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const SEED_ADMIN_EMAIL_ENV: &str = "SEED_ADMIN_EMAIL";
pub const SEED_ADMIN_PASSWORD_ENV: &str = "SEED_ADMIN_PASSWORD";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Access token lifetime (15 minutes).
pub const DEFAULT_ACCESS_TTL_SECS: u64 = 15 * 60;

/// Refresh token lifetime (7 days).
pub const DEFAULT_REFRESH_TTL_SECS: u64 = 7 * 24 * 60 * 60;

pub const DEFAULT_GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[cfg(feature = "dev")]
const DEV_ACCESS_SECRET: &str = "dev-access-token-secret";
#[cfg(feature = "dev")]
const DEV_REFRESH_SECRET: &str = "dev-refresh-token-secret";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("access and refresh tokens must be signed with different secrets")]
    SharedSecret,
}

/// Token signing and federated login settings.
#[derive(Clone)]
pub struct AuthSettings {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
    /// Registered Google OAuth client id. `None` disables federated login.
    pub google_client_id: Option<String>,
    pub google_tokeninfo_url: String,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("google_client_id", &self.google_client_id)
            .field("google_tokeninfo_url", &self.google_tokeninfo_url)
            .finish()
    }
}

impl AuthSettings {
    /// Settings with the default lifetimes and no federated login.
    pub fn new(
        access_secret: impl Into<String>,
        refresh_secret: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let settings = Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
            access_ttl_secs: DEFAULT_ACCESS_TTL_SECS,
            refresh_ttl_secs: DEFAULT_REFRESH_TTL_SECS,
            google_client_id: None,
            google_tokeninfo_url: DEFAULT_GOOGLE_TOKENINFO_URL.to_string(),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn with_google_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.google_client_id = Some(client_id.into());
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = Self {
            access_secret: secret_from_env(ACCESS_SECRET_ENV)?,
            refresh_secret: secret_from_env(REFRESH_SECRET_ENV)?,
            access_ttl_secs: ttl_from_env(ACCESS_TTL_ENV, DEFAULT_ACCESS_TTL_SECS)?,
            refresh_ttl_secs: ttl_from_env(REFRESH_TTL_ENV, DEFAULT_REFRESH_TTL_SECS)?,
            google_client_id: env_optional(GOOGLE_CLIENT_ID_ENV),
            google_tokeninfo_url: env_or_default(
                GOOGLE_TOKENINFO_URL_ENV,
                DEFAULT_GOOGLE_TOKENINFO_URL,
            ),
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.access_secret.is_empty() {
            return Err(ConfigError::Missing(ACCESS_SECRET_ENV));
        }
        if self.refresh_secret.is_empty() {
            return Err(ConfigError::Missing(REFRESH_SECRET_ENV));
        }
        if self.access_secret == self.refresh_secret {
            return Err(ConfigError::SharedSecret);
        }
        if self.access_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                name: ACCESS_TTL_ENV,
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.refresh_ttl_secs <= self.access_ttl_secs {
            return Err(ConfigError::Invalid {
                name: REFRESH_TTL_ENV,
                reason: "must outlive the access token".to_string(),
            });
        }
        Ok(())
    }
}

/// Listener, TLS and bootstrap-account settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub bind_addr: SocketAddr,
    pub tls: Option<TlsPaths>,
    pub seed_admin: Option<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

impl ServerSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env_or_default(HOST_ENV, "0.0.0.0");
        let port: u16 = env_or_default(PORT_ENV, "3000")
            .parse()
            .map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                name: PORT_ENV,
                reason: e.to_string(),
            })?;

        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    name: HOST_ENV,
                    reason: e.to_string(),
                })?;

        let tls = match (env_optional(TLS_CERT_PATH_ENV), env_optional(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(TLS_KEY_PATH_ENV)),
            (None, Some(_)) => return Err(ConfigError::Missing(TLS_CERT_PATH_ENV)),
        };

        let seed_admin = env_optional(SEED_ADMIN_EMAIL_ENV).zip(env_optional(SEED_ADMIN_PASSWORD_ENV));

        Ok(Self {
            bind_addr,
            tls,
            seed_admin,
        })
    }
}

#[cfg(not(feature = "dev"))]
fn secret_from_env(name: &'static str) -> Result<String, ConfigError> {
    env_optional(name).ok_or(ConfigError::Missing(name))
}

#[cfg(feature = "dev")]
fn secret_from_env(name: &'static str) -> Result<String, ConfigError> {
    let fallback = if name == ACCESS_SECRET_ENV {
        DEV_ACCESS_SECRET
    } else {
        DEV_REFRESH_SECRET
    };
    Ok(env_or_default(name, fallback))
}

fn ttl_from_env(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env_optional(name) {
        Some(raw) => raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn env_optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_default_lifetimes() {
        let settings = AuthSettings::new("access", "refresh").unwrap();
        assert_eq!(settings.access_ttl_secs, 900);
        assert_eq!(settings.refresh_ttl_secs, 604_800);
        assert!(settings.google_client_id.is_none());
    }

    #[test]
    fn rejects_shared_secret() {
        let result = AuthSettings::new("same", "same");
        assert_eq!(result.unwrap_err(), ConfigError::SharedSecret);
    }

    #[test]
    fn rejects_empty_secret() {
        let result = AuthSettings::new("", "refresh");
        assert_eq!(result.unwrap_err(), ConfigError::Missing(ACCESS_SECRET_ENV));
    }

    #[test]
    fn refresh_must_outlive_access() {
        let mut settings = AuthSettings::new("access", "refresh").unwrap();
        settings.refresh_ttl_secs = settings.access_ttl_secs;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { name: REFRESH_TTL_ENV, .. })
        ));
    }

    #[test]
    fn debug_redacts_secrets() {
        let settings = AuthSettings::new("top-secret-a", "top-secret-r").unwrap();
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("top-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
