// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Configuration management

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::{RefresherSettings, ResolverSettings};
use crate::core::errors::IdentityError;
use crate::core::identifier::is_valid_id;
use crate::state::CacheSettings;

pub const DEFAULT_WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

/// Service configuration loaded from environment variables
///
/// All values are validated on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Service identity (also the id of its bootstrap account)
    pub service_name: String,

    // Storage
    pub database_url: String,
    pub redis_url: Option<String>,

    // Cache
    pub cache_ttl_secs: u64,
    pub cache_max_value_bytes: usize,
    pub cache_max_capacity: u64,

    // Trust material refresh (disabled without an identity domain)
    pub identity_domain: Option<String>,
    pub oidc_well_known_path: String,
    pub jwks_refresh_interval_secs: u64,
    pub jwks_fetch_timeout_secs: u64,
    pub jwks_max_idle_connections: usize,

    // Token validation
    pub token_audience: Vec<String>,
    pub token_issuer: Option<String>,
    pub token_leeway_secs: u64,
    pub ec_public_key_path: Option<PathBuf>,
    pub rsa_public_key_path: Option<PathBuf>,

    // Logging configuration
    pub log_level: String,
    pub log_format: String, // "json" or "text"
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Supports `.env` file loading in development (via dotenv crate).
    pub fn from_env() -> Result<Self, IdentityError> {
        // Skip in test builds to avoid interfering with test environment variables
        #[cfg(not(test))]
        {
            dotenv::dotenv().ok();
        }

        let config = Self {
            service_name: Self::get_required_env("SERVICE_NAME")?,
            database_url: Self::get_required_env("DATABASE_URL")?,
            redis_url: Self::get_optional_env("REDIS_URL"),
            cache_ttl_secs: Self::parse_or_default("CACHE_TTL_SECS", 300)?,
            cache_max_value_bytes: Self::parse_or_default("CACHE_MAX_VALUE_BYTES", 64 * 1024)?,
            cache_max_capacity: Self::parse_or_default("CACHE_MAX_CAPACITY", 10_000)?,
            identity_domain: Self::get_optional_env("IDENTITY_DOMAIN"),
            oidc_well_known_path: Self::get_env_or_default("OIDC_WELL_KNOWN_PATH", DEFAULT_WELL_KNOWN_PATH),
            jwks_refresh_interval_secs: Self::parse_or_default("JWKS_REFRESH_INTERVAL_SECS", 3600)?,
            jwks_fetch_timeout_secs: Self::parse_or_default("JWKS_FETCH_TIMEOUT_SECS", 10)?,
            jwks_max_idle_connections: Self::parse_or_default("JWKS_MAX_IDLE_CONNECTIONS", 2)?,
            token_audience: Self::get_list("TOKEN_AUDIENCE"),
            token_issuer: Self::get_optional_env("TOKEN_ISSUER"),
            token_leeway_secs: Self::parse_u64_allow_zero("TOKEN_LEEWAY_SECS", 60)?,
            ec_public_key_path: Self::get_optional_env("EC_PUBLIC_KEY_PATH").map(PathBuf::from),
            rsa_public_key_path: Self::get_optional_env("RSA_PUBLIC_KEY_PATH").map(PathBuf::from),
            log_level: Self::get_env_or_default("LOG_LEVEL", "info"),
            log_format: Self::get_env_or_default("LOG_FORMAT", "json"),
        };

        config.validate()?;
        Ok(config)
    }

    fn get_env_or_default(key: &str, default: &str) -> String {
        env::var(key).unwrap_or_else(|_| default.to_string())
    }

    fn get_optional_env(key: &str) -> Option<String> {
        match env::var(key) {
            Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
            _ => None,
        }
    }

    fn get_required_env(key: &str) -> Result<String, IdentityError> {
        Self::get_optional_env(key)
            .ok_or_else(|| IdentityError::Configuration(format!("{} not set", key)))
    }

    /// Comma separated, blanks dropped
    fn get_list(key: &str) -> Vec<String> {
        Self::get_optional_env(key)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Parse a positive number or return default
    fn parse_or_default<T>(key: &str, default: T) -> Result<T, IdentityError>
    where
        T: std::str::FromStr + PartialEq + Default,
        T::Err: std::fmt::Display,
    {
        match env::var(key) {
            Ok(value) => {
                let parsed = value.trim().parse::<T>().map_err(|e| {
                    IdentityError::Configuration(format!("Invalid {} value '{}': {}", key, value, e))
                })?;
                if parsed == T::default() {
                    return Err(IdentityError::Configuration(format!(
                        "{} must be greater than 0",
                        key
                    )));
                }
                Ok(parsed)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_u64_allow_zero(key: &str, default: u64) -> Result<u64, IdentityError> {
        match env::var(key) {
            Ok(value) => value.trim().parse::<u64>().map_err(|e| {
                IdentityError::Configuration(format!("Invalid {} value '{}': {}", key, value, e))
            }),
            Err(_) => Ok(default),
        }
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), IdentityError> {
        if !is_valid_id(&self.service_name) {
            return Err(IdentityError::Configuration(format!(
                "Invalid SERVICE_NAME '{}': must be a valid identifier",
                self.service_name
            )));
        }

        Self::validate_url(&self.database_url, "DATABASE_URL")?;
        if let Some(ref url) = self.redis_url {
            Self::validate_url(url, "REDIS_URL")?;
        }

        if !self.oidc_well_known_path.starts_with('/') {
            return Err(IdentityError::Configuration(format!(
                "Invalid OIDC_WELL_KNOWN_PATH '{}': must start with '/'",
                self.oidc_well_known_path
            )));
        }

        if let Some(ref path) = self.ec_public_key_path {
            Self::validate_file_path(path, "EC public key")?;
        }
        if let Some(ref path) = self.rsa_public_key_path {
            Self::validate_file_path(path, "RSA public key")?;
        }

        Self::validate_log_level(&self.log_level)?;
        Self::validate_log_format(&self.log_format)?;
        Ok(())
    }

    fn validate_file_path(path: &PathBuf, description: &str) -> Result<(), IdentityError> {
        if !path.is_file() {
            return Err(IdentityError::Configuration(format!(
                "{} not found at {:?}",
                description, path
            )));
        }
        Ok(())
    }

    fn validate_url(url: &str, description: &str) -> Result<(), IdentityError> {
        url::Url::parse(url).map_err(|e| {
            IdentityError::Configuration(format!("Invalid {} '{}': {}", description, url, e))
        })?;
        Ok(())
    }

    fn validate_log_level(level: &str) -> Result<(), IdentityError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&level.to_lowercase().as_str()) {
            return Err(IdentityError::Configuration(format!(
                "Invalid LOG_LEVEL '{}': must be one of {}",
                level,
                valid_levels.join(", ")
            )));
        }
        Ok(())
    }

    fn validate_log_format(format: &str) -> Result<(), IdentityError> {
        if format != "json" && format != "text" {
            return Err(IdentityError::Configuration(format!(
                "Invalid LOG_FORMAT '{}': must be 'json' or 'text'",
                format
            )));
        }
        Ok(())
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: Duration::from_secs(self.cache_ttl_secs),
            max_value_bytes: self.cache_max_value_bytes,
        }
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            service_name: self.service_name.clone(),
            audience: self.token_audience.clone(),
            issuer: self.token_issuer.clone(),
            leeway_secs: self.token_leeway_secs,
        }
    }

    /// `None` when no identity domain is configured.
    pub fn refresher_settings(&self) -> Option<RefresherSettings> {
        self.identity_domain.as_ref().map(|domain| RefresherSettings {
            identity_domain: domain.clone(),
            well_known_path: self.oidc_well_known_path.clone(),
            interval: Duration::from_secs(self.jwks_refresh_interval_secs),
            fetch_timeout: Duration::from_secs(self.jwks_fetch_timeout_secs),
            max_idle_connections: self.jwks_max_idle_connections,
        })
    }
}

impl Config {
    /// Create a test configuration
    ///
    /// Bypasses environment loading and file validation.
    pub fn test_config() -> Self {
        Self {
            service_name: "identity-test".to_string(),
            database_url: "postgresql://localhost/test".to_string(),
            redis_url: None,
            cache_ttl_secs: 300,
            cache_max_value_bytes: 64 * 1024,
            cache_max_capacity: 10_000,
            identity_domain: None,
            oidc_well_known_path: DEFAULT_WELL_KNOWN_PATH.to_string(),
            jwks_refresh_interval_secs: 3600,
            jwks_fetch_timeout_secs: 10,
            jwks_max_idle_connections: 2,
            token_audience: Vec::new(),
            token_issuer: None,
            token_leeway_secs: 60,
            ec_public_key_path: None,
            rsa_public_key_path: None,
            log_level: "info".to_string(),
            log_format: "json".to_string(),
        }
    }
}
