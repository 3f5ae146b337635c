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

//! Signature schemes and the claim set carried by bearer tokens.

use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::path::Path;

use crate::core::context::roles;
use crate::core::errors::IdentityError;

/// Closed set of verification strategies, chosen once per token from `alg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningScheme {
    /// Per-tenant shared secret, looked up by `kid`
    Hmac,
    /// Statically configured EC public key
    Ecdsa,
    /// Static RSA key, else the refreshed JWKS entry for `kid`
    Rsa,
}

impl SigningScheme {
    pub fn from_algorithm(alg: Algorithm) -> Result<Self, IdentityError> {
        match alg {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(SigningScheme::Hmac),
            Algorithm::ES256 | Algorithm::ES384 => Ok(SigningScheme::Ecdsa),
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => Ok(SigningScheme::Rsa),
            other => Err(IdentityError::Unauthorized(format!(
                "unsupported signing algorithm {:?}",
                other
            ))),
        }
    }
}

/// `role` may be a single string or a list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RoleClaim {
    One(String),
    Many(Vec<String>),
}

/// Registered and profile claims read from verified tokens
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: String,
    pub exp: u64,
    #[serde(default)]
    pub iat: Option<u64>,
    #[serde(default)]
    pub nbf: Option<u64>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub jti: Option<String>,
    #[serde(default)]
    pub role: Option<RoleClaim>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "first_name")]
    pub given_name: Option<String>,
    #[serde(default, alias = "last_name")]
    pub family_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl TokenClaims {
    /// Roles in claim order, `user` when the claim is absent or empty.
    pub fn roles(&self) -> Vec<String> {
        let roles: Vec<String> = match &self.role {
            Some(RoleClaim::One(role)) => vec![role.clone()],
            Some(RoleClaim::Many(list)) => list.clone(),
            None => Vec::new(),
        }
        .into_iter()
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .collect();

        if roles.is_empty() {
            vec![roles::USER.to_string()]
        } else {
            roles
        }
    }
}

/// Statically configured public keys
#[derive(Clone, Default)]
pub struct StaticKeys {
    pub ec: Option<DecodingKey>,
    pub rsa: Option<DecodingKey>,
}

impl StaticKeys {
    pub fn from_pem_files(ec: Option<&Path>, rsa: Option<&Path>) -> Result<Self, IdentityError> {
        let ec = ec
            .map(|path| {
                let pem = read_pem(path)?;
                DecodingKey::from_ec_pem(&pem).map_err(|e| {
                    IdentityError::Configuration(format!("invalid EC public key {}: {}", path.display(), e))
                })
            })
            .transpose()?;
        let rsa = rsa
            .map(|path| {
                let pem = read_pem(path)?;
                DecodingKey::from_rsa_pem(&pem).map_err(|e| {
                    IdentityError::Configuration(format!("invalid RSA public key {}: {}", path.display(), e))
                })
            })
            .transpose()?;
        Ok(Self { ec, rsa })
    }
}

fn read_pem(path: &Path) -> Result<Vec<u8>, IdentityError> {
    std::fs::read(path)
        .map_err(|e| IdentityError::Configuration(format!("cannot read {}: {}", path.display(), e)))
}
