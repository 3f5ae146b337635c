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

//! Domain error types - secure error handling with no information disclosure.

use thiserror::Error;

/// Opaque message returned for every authentication failure.
pub const INVALID_TOKEN_MESSAGE: &str = "invalid authentication token";

/// Main error type for identity resolution and entity persistence
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Malformed input shape (HTTP 400)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Bad identifier or unparsable value (HTTP 400)
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Any authentication or verification failure (HTTP 401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authorization denial, translated to Unauthorized at the resolver boundary (HTTP 403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Entity absent (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint violation (HTTP 409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage fault (HTTP 500)
    #[error("Database error: {0}")]
    Database(String),

    /// Cache transport fault, never surfaced by the cache-aside accessor (HTTP 500)
    #[error("Cache error: {0}")]
    Cache(String),

    /// Any other server-side fault (HTTP 500)
    #[error("Server error: {0}")]
    Server(String),

    /// Configuration error (HTTP 500)
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Trust material refresh errors
#[derive(Error, Debug)]
pub enum JwksError {
    /// Discovery URL could not be built
    #[error("Invalid discovery URL: {0}")]
    InvalidUrl(String),

    /// Outbound request failed or returned a non-success status
    #[error("Fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Discovery document has no usable JWKS endpoint
    #[error("Discovery document missing jwks_uri")]
    MissingJwksUri,

    /// Key material could not be decoded
    #[error("Failed to decode key: {0}")]
    Decode(String),

    /// Iteration exceeded its deadline
    #[error("Refresh timed out after {0}s")]
    Timeout(u64),
}

impl IdentityError {
    /// Opaque authentication failure
    pub fn unauthorized() -> Self {
        IdentityError::Unauthorized(INVALID_TOKEN_MESSAGE.to_string())
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            IdentityError::InvalidRequest(_) => 400,
            IdentityError::InvalidParameter(_) => 400,
            IdentityError::Unauthorized(_) => 401,
            IdentityError::Forbidden(_) => 403,
            IdentityError::NotFound(_) => 404,
            IdentityError::Conflict(_) => 409,
            IdentityError::Database(_) => 500,
            IdentityError::Cache(_) => 500,
            IdentityError::Server(_) => 500,
            IdentityError::Configuration(_) => 500,
        }
    }

    /// Get user-friendly error message (no sensitive information)
    pub fn user_message(&self) -> String {
        match self {
            IdentityError::InvalidRequest(reason) => format!("Invalid request: {}", reason),
            IdentityError::InvalidParameter(reason) => format!("Invalid parameter: {}", reason),
            IdentityError::Unauthorized(_) => INVALID_TOKEN_MESSAGE.to_string(),
            IdentityError::Forbidden(_) => "Forbidden".to_string(),
            IdentityError::NotFound(_) => "Not found".to_string(),
            IdentityError::Conflict(_) => "Conflict".to_string(),
            IdentityError::Database(_) => "Internal error".to_string(),
            IdentityError::Cache(_) => "Internal error".to_string(),
            IdentityError::Server(_) => "Internal error".to_string(),
            IdentityError::Configuration(_) => "Internal error".to_string(),
        }
    }

    /// Storage and server faults unrelated to the token's own validity.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            IdentityError::Database(_)
                | IdentityError::Cache(_)
                | IdentityError::Server(_)
                | IdentityError::Configuration(_)
        )
    }
}

impl From<sqlx::Error> for IdentityError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => IdentityError::NotFound("no rows in result set".to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                let constraint = db.constraint().unwrap_or("unique").to_string();
                IdentityError::Conflict(format!("constraint {} violated", constraint))
            }
            other => IdentityError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for IdentityError {
    fn from(err: serde_json::Error) -> Self {
        IdentityError::Server(format!("serialization failed: {}", err))
    }
}
