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

//! Claims resolver: bearer token in, tenant-scoped principal out.
//!
//! Steps run in a fixed order and hand an identity record to each other by value:
//!
//! 1. tenant hint lookup (before any signature work)
//! 2. signature verification, one [`SigningScheme`] per token
//! 3. service account bootstrap, which sets the baseline tenant
//! 4. role extraction (`sysadmin` adopts the caller's tenant, `refresh` needs a live token row)
//! 5. cross-tenant switch to the hinted tenant, sysadmin only
//! 6. subject provisioning
//!
//! Callers only ever see [`INVALID_TOKEN_MESSAGE`](crate::core::errors::INVALID_TOKEN_MESSAGE)
//! for rejections. Storage and server faults keep their kind.

use chrono::Utc;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use std::sync::Arc;

use crate::auth::jwks::TrustStore;
use crate::auth::signing::{SigningScheme, StaticKeys, TokenClaims};
use crate::core::context::{roles, RequestContext};
use crate::core::errors::IdentityError;
use crate::core::identifier::is_valid_id;
use crate::core::models::{Account, Claims, User};
use crate::core::secret::AccountSecret;
use crate::query::FieldOptions;
use crate::repository::{AccountRepository, RefreshTokenStore, UserRepository};

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Name and id of the service's own account
    pub service_name: String,
    /// Accepted `aud` values; empty disables the audience check
    pub audience: Vec<String>,
    pub issuer: Option<String>,
    pub leeway_secs: u64,
}

/// Request-scoped identity threaded through the resolution steps
#[derive(Debug, Clone)]
struct Identity {
    tenant_id: String,
    tenant_name: String,
    user_id: String,
    token_id: Option<String>,
    roles: Vec<String>,
}

impl Identity {
    fn baseline(service_name: &str) -> Self {
        Self {
            tenant_id: service_name.to_string(),
            tenant_name: service_name.to_string(),
            user_id: String::new(),
            token_id: None,
            roles: vec![roles::USER.to_string()],
        }
    }

    fn with_tenant(self, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tenant_id: id.into(),
            tenant_name: name.into(),
            ..self
        }
    }

    fn with_account(self, account: &Account) -> Self {
        self.with_tenant(account.id.clone(), account.name.clone())
    }

    fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    fn into_claims(self) -> Claims {
        Claims {
            tenant_id: self.tenant_id,
            tenant_name: self.tenant_name,
            user_id: self.user_id,
            token_id: self.token_id,
            roles: self.roles,
        }
    }

    fn context(&self, parent: &RequestContext) -> RequestContext {
        RequestContext::from_claims(&self.clone().into_claims(), parent)
    }
}

/// Outcome of signature verification
struct Verified {
    claims: TokenClaims,
    /// HMAC tokens are signed by a tenant account
    signing_account: Option<Account>,
}

pub struct ClaimsResolver {
    settings: ResolverSettings,
    accounts: Arc<AccountRepository>,
    users: Arc<UserRepository>,
    tokens: Arc<dyn RefreshTokenStore>,
    keys: StaticKeys,
    trust: TrustStore,
}

impl ClaimsResolver {
    pub fn new(
        settings: ResolverSettings,
        accounts: Arc<AccountRepository>,
        users: Arc<UserRepository>,
        tokens: Arc<dyn RefreshTokenStore>,
        keys: StaticKeys,
        trust: TrustStore,
    ) -> Self {
        Self {
            settings,
            accounts,
            users,
            tokens,
            keys,
            trust,
        }
    }

    /// Verify `token` and resolve the principal it names.
    ///
    /// `tenant_hint` is a tenant name; an unknown name is rejected before the
    /// signature is looked at.
    pub async fn verify(
        &self,
        ctx: &RequestContext,
        token: &str,
        tenant_hint: Option<&str>,
    ) -> Result<Claims, IdentityError> {
        let trace_id = ctx.trace_id.as_deref().unwrap_or_default();

        let outcome = match ctx.remaining() {
            Some(remaining) => tokio::time::timeout(remaining, self.resolve(ctx, token, tenant_hint))
                .await
                .unwrap_or_else(|_| {
                    Err(IdentityError::Server("verification deadline exceeded".to_string()))
                }),
            None => self.resolve(ctx, token, tenant_hint).await,
        };

        match outcome {
            Ok(claims) => {
                tracing::debug!(
                    trace_id = %trace_id,
                    tenant_id = %claims.tenant_id,
                    user_id = %claims.user_id,
                    "Token verified"
                );
                Ok(claims)
            }
            Err(e) if e.is_infrastructure() => {
                tracing::error!(trace_id = %trace_id, error = %e, "Token verification aborted");
                Err(e)
            }
            Err(e) => {
                tracing::debug!(trace_id = %trace_id, reason = %e, "Token rejected");
                Err(IdentityError::unauthorized())
            }
        }
    }

    async fn resolve(
        &self,
        ctx: &RequestContext,
        token: &str,
        tenant_hint: Option<&str>,
    ) -> Result<Claims, IdentityError> {
        let system = RequestContext::system(ctx);

        let hinted = self.resolve_hint(&system, tenant_hint).await?;
        let verified = self.verify_signature(&system, token).await?;
        let identity = self.bootstrap(ctx, &system, &verified).await?;
        let identity = self.apply_roles(ctx, identity, &verified.claims).await?;
        let identity = Self::apply_hint(identity, hinted.as_ref());
        let identity = self.resolve_subject(ctx, identity, &verified.claims).await?;

        Ok(identity.into_claims())
    }

    async fn resolve_hint(
        &self,
        system: &RequestContext,
        tenant_hint: Option<&str>,
    ) -> Result<Option<Account>, IdentityError> {
        let Some(hint) = tenant_hint.map(str::trim).filter(|h| !h.is_empty()) else {
            return Ok(None);
        };
        match self.accounts.get_by_name(system, hint).await {
            Ok(account) => Ok(Some(account)),
            Err(IdentityError::NotFound(_)) => {
                Err(IdentityError::Unauthorized(format!("invalid tenant '{}'", hint)))
            }
            Err(e) => Err(e),
        }
    }

    async fn verify_signature(
        &self,
        system: &RequestContext,
        token: &str,
    ) -> Result<Verified, IdentityError> {
        let header = decode_header(token)
            .map_err(|e| IdentityError::Unauthorized(format!("malformed token header: {}", e)))?;
        let scheme = SigningScheme::from_algorithm(header.alg)?;
        let kid = header.kid.as_deref().filter(|k| !k.is_empty());

        let (key, signing_account) = match scheme {
            SigningScheme::Hmac => {
                let kid = kid.ok_or_else(|| {
                    IdentityError::Unauthorized("HMAC token without kid".to_string())
                })?;
                let secret = self.accounts.secret(kid).await?.ok_or_else(|| {
                    IdentityError::Unauthorized(format!("no signing secret for kid '{}'", kid))
                })?;
                let account = self.accounts.get(system, kid).await?;
                (hmac_key(&secret), Some(account))
            }
            SigningScheme::Ecdsa => {
                let key = self.keys.ec.clone().ok_or_else(|| {
                    IdentityError::Unauthorized("no EC public key configured".to_string())
                })?;
                (key, None)
            }
            SigningScheme::Rsa => {
                let key = match &self.keys.rsa {
                    Some(key) => key.clone(),
                    None => {
                        let kid = kid.ok_or_else(|| {
                            IdentityError::Unauthorized("RSA token without kid".to_string())
                        })?;
                        self.trust.snapshot().get(kid).cloned().ok_or_else(|| {
                            IdentityError::Unauthorized(format!("kid '{}' not present in key set", kid))
                        })?
                    }
                };
                (key, None)
            }
        };

        let data = decode::<TokenClaims>(token, &key, &self.validation(header.alg))
            .map_err(|e| IdentityError::Unauthorized(format!("verification failed: {}", e)))?;

        Ok(Verified {
            claims: data.claims,
            signing_account,
        })
    }

    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        validation.leeway = self.settings.leeway_secs;
        validation.validate_nbf = true;
        if self.settings.audience.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(self.settings.audience.as_slice());
        }
        if let Some(issuer) = &self.settings.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation
    }

    /// Baseline tenant is always the service's own account.
    async fn bootstrap(
        &self,
        ctx: &RequestContext,
        system: &RequestContext,
        verified: &Verified,
    ) -> Result<Identity, IdentityError> {
        let service = self.settings.service_name.as_str();
        let mut identity = Identity::baseline(service);

        if !ctx.is_system_user() {
            let account = match self.accounts.get(system, service).await {
                Ok(account) => account,
                Err(IdentityError::NotFound(_)) => {
                    tracing::info!(account_id = %service, "Provisioning service account");
                    let account = Account::new(service, service).with_secret(AccountSecret::generate());
                    self.accounts
                        .create(system, account)
                        .await
                        .map_err(forbidden_as_unauthorized)?
                }
                Err(e) => return Err(e),
            };
            identity = identity.with_account(&account);
        }

        if let Some(account) = &verified.signing_account {
            identity = identity.with_account(account);
        }
        Ok(identity)
    }

    async fn apply_roles(
        &self,
        ctx: &RequestContext,
        identity: Identity,
        claims: &TokenClaims,
    ) -> Result<Identity, IdentityError> {
        let mut identity = Identity {
            roles: claims.roles(),
            ..identity
        };

        if identity.has_role(roles::SYSTEM_ADMIN) {
            if let Some(tenant_id) = ctx.tenant_id.as_deref().filter(|t| !t.is_empty()) {
                let name = ctx.tenant_name.clone().unwrap_or_else(|| tenant_id.to_string());
                identity = identity.with_tenant(tenant_id, name);
            }
        }

        if identity.has_role(roles::REFRESH) {
            let jti = claims
                .jti
                .as_deref()
                .filter(|j| !j.is_empty())
                .ok_or_else(|| IdentityError::Unauthorized("refresh token without jti".to_string()))?;
            let record = self
                .tokens
                .fetch(&identity.tenant_id, jti)
                .await?
                .ok_or_else(|| IdentityError::Unauthorized(format!("unknown refresh token '{}'", jti)))?;
            if !record.is_usable_at(Utc::now()) {
                return Err(IdentityError::Unauthorized(format!(
                    "refresh token '{}' expired or revoked",
                    jti
                )));
            }
            if record.user_id != claims.sub {
                return Err(IdentityError::Unauthorized(format!(
                    "refresh token '{}' belongs to another subject",
                    jti
                )));
            }
            identity.token_id = Some(jti.to_string());
        }

        Ok(identity)
    }

    /// Only system administrators cross into the hinted tenant.
    fn apply_hint(identity: Identity, hinted: Option<&Account>) -> Identity {
        match hinted {
            Some(account)
                if account.id != identity.tenant_id && identity.has_role(roles::SYSTEM_ADMIN) =>
            {
                identity.with_account(account)
            }
            _ => identity,
        }
    }

    async fn resolve_subject(
        &self,
        ctx: &RequestContext,
        identity: Identity,
        claims: &TokenClaims,
    ) -> Result<Identity, IdentityError> {
        if !is_valid_id(&claims.sub) {
            return Err(IdentityError::Unauthorized("invalid subject".to_string()));
        }
        let identity = Identity {
            user_id: claims.sub.clone(),
            ..identity
        };
        if ctx.is_system_user() {
            return Ok(identity);
        }

        let user_ctx = identity.context(ctx);
        let existing = match self
            .users
            .get(&user_ctx, &identity.user_id, &FieldOptions::none())
            .await
        {
            Ok(user) => Some(user),
            Err(IdentityError::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        let incoming = user_from_claims(claims, existing.as_ref())?;
        let stale = existing
            .as_ref()
            .map_or(true, |stored| incoming.diverges_from(stored));
        if stale {
            tracing::debug!(user_id = %identity.user_id, "Provisioning user from claims");
            self.users
                .create(&user_ctx, incoming)
                .await
                .map_err(forbidden_as_unauthorized)?;
        }

        Ok(identity)
    }
}

fn hmac_key(secret: &AccountSecret) -> DecodingKey {
    DecodingKey::from_secret(secret.expose_secret().as_bytes())
}

fn forbidden_as_unauthorized(err: IdentityError) -> IdentityError {
    match err {
        IdentityError::Forbidden(reason) => IdentityError::Unauthorized(reason),
        other => other,
    }
}

/// Claims-derived user record. Absent profile claims keep the stored value.
fn user_from_claims(claims: &TokenClaims, existing: Option<&User>) -> Result<User, IdentityError> {
    let mut user = existing
        .cloned()
        .unwrap_or_else(|| User::new(claims.sub.clone()));
    user.creator = None;
    user.updater = None;

    if let Some(email) = &claims.email {
        user.email = email.trim().to_string();
    }
    if let Some(first) = &claims.given_name {
        user.first_name = first.trim().to_string();
    }
    if let Some(last) = &claims.family_name {
        user.last_name = last.trim().to_string();
    }
    if let Some(status) = &claims.status {
        user.status = status.parse()?;
    }
    Ok(user)
}
