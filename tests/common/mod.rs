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

// Common test utilities and helpers for all test modules

#![allow(dead_code)]

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sentinel_identity::auth::{ClaimsResolver, ResolverSettings, StaticKeys, TrustStore};
use sentinel_identity::core::errors::IdentityError;
use sentinel_identity::core::models::{Account, RefreshToken, User, UserSummary};
use sentinel_identity::core::secret::AccountSecret;
use sentinel_identity::query::{FieldOption, FieldOptions};
use sentinel_identity::repository::{
    AccountRepository, AccountStore, RefreshTokenStore, UserRepository, UserStore,
};
use sentinel_identity::state::{CacheAccessor, CacheBackend, CacheSettings, EntityKind, MemoryCache};

pub const SERVICE_NAME: &str = "identity-test";

pub const RSA_SIGNING_PEM: &[u8] = include_bytes!("../fixtures/rsa_signing.pem");
pub const RSA_PUBLIC_PEM: &[u8] = include_bytes!("../fixtures/rsa_public.pem");
pub const RSA_ROGUE_PEM: &[u8] = include_bytes!("../fixtures/rsa_rogue.pem");
pub const RSA_MODULUS: &str = include_str!("../fixtures/rsa_signing.modulus");
pub const EC_SIGNING_PEM: &[u8] = include_bytes!("../fixtures/ec_signing.pem");
pub const EC_PUBLIC_PEM: &[u8] = include_bytes!("../fixtures/ec_public.pem");

fn db_down() -> IdentityError {
    IdentityError::Database("connection refused".to_string())
}

/// In-memory user store with a fetch counter
#[derive(Default)]
pub struct MemoryUserStore {
    pub users: Mutex<HashMap<String, User>>,
    pub fetches: AtomicUsize,
    pub upserts: AtomicUsize,
    pub fail: AtomicBool,
}

impl MemoryUserStore {
    pub fn insert(&self, user: User) {
        self.users.lock().unwrap().insert(user.id.clone(), user);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), IdentityError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(db_down())
        } else {
            Ok(())
        }
    }

    fn summary_of(&self, id: Option<&String>) -> Option<UserSummary> {
        let users = self.users.lock().unwrap();
        id.and_then(|id| users.get(id)).map(|user| UserSummary {
            id: user.id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        })
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn fetch(&self, id: &str, options: &FieldOptions) -> Result<Option<User>, IdentityError> {
        self.check()?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let Some(mut user) = self.users.lock().unwrap().get(id).cloned() else {
            return Ok(None);
        };
        if options.contains(FieldOption::Detail) {
            user.creator = self.summary_of(user.created_by.as_ref());
            user.updater = self.summary_of(user.updated_by.as_ref());
        }
        Ok(Some(user))
    }

    async fn upsert(&self, user: &User) -> Result<User, IdentityError> {
        self.check()?;
        self.upserts.fetch_add(1, Ordering::SeqCst);
        let mut users = self.users.lock().unwrap();
        let stored = match users.get(&user.id) {
            Some(existing) => User {
                created_at: existing.created_at,
                created_by: existing.created_by.clone(),
                ..user.clone()
            },
            None => user.clone(),
        };
        users.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update(&self, user: &User) -> Result<Option<User>, IdentityError> {
        self.check()?;
        let mut users = self.users.lock().unwrap();
        let Some(existing) = users.get(&user.id).cloned() else {
            return Ok(None);
        };
        let stored = User {
            created_at: existing.created_at,
            created_by: existing.created_by,
            ..user.clone()
        };
        users.insert(stored.id.clone(), stored.clone());
        Ok(Some(stored))
    }

    async fn delete(&self, id: &str) -> Result<u64, IdentityError> {
        self.check()?;
        Ok(self.users.lock().unwrap().remove(id).map_or(0, |_| 1))
    }

    async fn summarize(&self, fields: &[String]) -> Result<Vec<Map<String, Value>>, IdentityError> {
        self.check()?;
        let users = self.users.lock().unwrap();
        let mut groups: Vec<(Map<String, Value>, u64)> = Vec::new();
        for user in users.values() {
            let value = serde_json::to_value(user).map_err(|e| IdentityError::Server(e.to_string()))?;
            let mut key = Map::new();
            for field in fields {
                key.insert(field.clone(), value.get(field).cloned().unwrap_or(Value::Null));
            }
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, count)) => *count += 1,
                None => groups.push((key, 1)),
            }
        }
        Ok(groups
            .into_iter()
            .map(|(mut key, count)| {
                key.insert("count".to_string(), Value::from(count));
                key
            })
            .collect())
    }

    async fn find_id_by_email(&self, email: &str) -> Result<Option<String>, IdentityError> {
        self.check()?;
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .map(|u| u.id.clone()))
    }
}

/// In-memory account store. Secrets live beside the records.
#[derive(Default)]
pub struct MemoryAccountStore {
    pub accounts: Mutex<HashMap<String, Account>>,
    pub fetches: AtomicUsize,
    pub secret_reads: AtomicUsize,
    pub fail: AtomicBool,
    pub delay: Mutex<Option<Duration>>,
}

impl MemoryAccountStore {
    pub fn insert(&self, account: Account) {
        self.accounts.lock().unwrap().insert(account.id.clone(), account);
    }

    pub fn get(&self, id: &str) -> Option<Account> {
        self.accounts.lock().unwrap().get(id).cloned()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn secret_read_count(&self) -> usize {
        self.secret_reads.load(Ordering::SeqCst)
    }

    async fn check(&self) -> Result<(), IdentityError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            Err(db_down())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn fetch(&self, id: &str) -> Result<Option<Account>, IdentityError> {
        self.check().await?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.get(id))
    }

    async fn fetch_by_name(&self, name: &str) -> Result<Option<Account>, IdentityError> {
        self.check().await?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .values()
            .find(|a| a.name == name)
            .cloned())
    }

    async fn upsert(&self, account: &Account) -> Result<Account, IdentityError> {
        self.check().await?;
        let mut accounts = self.accounts.lock().unwrap();
        let mut stored = account.clone();
        if let Some(existing) = accounts.get(&account.id) {
            stored.secret = existing.secret.clone().or(stored.secret);
            stored.created_at = existing.created_at;
            stored.created_by = existing.created_by.clone();
        }
        accounts.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update(&self, account: &Account) -> Result<Option<Account>, IdentityError> {
        self.check().await?;
        let mut accounts = self.accounts.lock().unwrap();
        let Some(existing) = accounts.get(&account.id).cloned() else {
            return Ok(None);
        };
        let stored = Account {
            secret: existing.secret,
            created_at: existing.created_at,
            created_by: existing.created_by,
            ..account.clone()
        };
        accounts.insert(stored.id.clone(), stored.clone());
        Ok(Some(stored))
    }

    async fn delete(&self, id: &str) -> Result<u64, IdentityError> {
        self.check().await?;
        Ok(self.accounts.lock().unwrap().remove(id).map_or(0, |_| 1))
    }

    async fn secret(&self, id: &str) -> Result<Option<AccountSecret>, IdentityError> {
        self.check().await?;
        self.secret_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .get(id)
            .filter(|a| a.status == sentinel_identity::core::models::Status::Active)
            .and_then(|a| a.secret))
    }
}

/// Refresh tokens keyed by `(tenant_id, id)`
#[derive(Default)]
pub struct MemoryTokenStore {
    pub tokens: Mutex<HashMap<(String, String), RefreshToken>>,
    pub fetches: AtomicUsize,
}

impl MemoryTokenStore {
    pub fn insert(&self, token: RefreshToken) {
        self.tokens
            .lock()
            .unwrap()
            .insert((token.tenant_id.clone(), token.id.clone()), token);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryTokenStore {
    async fn fetch(&self, tenant_id: &str, id: &str) -> Result<Option<RefreshToken>, IdentityError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .get(&(tenant_id.to_string(), id.to_string()))
            .cloned())
    }
}

/// Cache backend that always fails
pub struct BrokenCache;

#[async_trait]
impl CacheBackend for BrokenCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, IdentityError> {
        Err(IdentityError::Cache("connection reset".to_string()))
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), IdentityError> {
        Err(IdentityError::Cache("connection reset".to_string()))
    }

    async fn delete(&self, _key: &str) -> Result<bool, IdentityError> {
        Err(IdentityError::Cache("connection reset".to_string()))
    }
}

pub fn memory_cache() -> Arc<dyn CacheBackend> {
    Arc::new(MemoryCache::new(1_000))
}

/// Fully wired resolver over in-memory stores
pub struct Harness {
    pub users: Arc<MemoryUserStore>,
    pub accounts: Arc<MemoryAccountStore>,
    pub tokens: Arc<MemoryTokenStore>,
    pub user_repo: Arc<UserRepository>,
    pub account_repo: Arc<AccountRepository>,
    pub trust: TrustStore,
    pub resolver: ClaimsResolver,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_keys(StaticKeys::default())
    }

    pub fn with_keys(keys: StaticKeys) -> Self {
        Self::build(keys, memory_cache())
    }

    pub fn build(keys: StaticKeys, cache: Arc<dyn CacheBackend>) -> Self {
        let users = Arc::new(MemoryUserStore::default());
        let accounts = Arc::new(MemoryAccountStore::default());
        let tokens = Arc::new(MemoryTokenStore::default());
        let settings = CacheSettings::default();

        let user_repo = Arc::new(UserRepository::new(
            users.clone(),
            CacheAccessor::new(Arc::clone(&cache), EntityKind::User, settings),
        ));
        let account_repo = Arc::new(AccountRepository::new(
            accounts.clone(),
            CacheAccessor::new(cache, EntityKind::Account, settings),
        ));
        let trust = TrustStore::new();
        let resolver = ClaimsResolver::new(
            ResolverSettings {
                service_name: SERVICE_NAME.to_string(),
                audience: Vec::new(),
                issuer: None,
                leeway_secs: 0,
            },
            Arc::clone(&account_repo),
            Arc::clone(&user_repo),
            tokens.clone(),
            keys,
            trust.clone(),
        );

        Self {
            users,
            accounts,
            tokens,
            user_repo,
            account_repo,
            trust,
            resolver,
        }
    }
}

pub fn now_secs() -> u64 {
    chrono::Utc::now().timestamp() as u64
}

/// Claims valid for one hour
pub fn claims(sub: &str) -> Value {
    serde_json::json!({
        "sub": sub,
        "iat": now_secs(),
        "exp": now_secs() + 3600,
    })
}

pub fn sign(alg: Algorithm, kid: Option<&str>, claims: &Value, key: &EncodingKey) -> String {
    let mut header = Header::new(alg);
    header.kid = kid.map(str::to_string);
    encode(&header, claims, key).unwrap()
}

pub fn sign_rs256(kid: Option<&str>, claims: &Value) -> String {
    sign(
        Algorithm::RS256,
        kid,
        claims,
        &EncodingKey::from_rsa_pem(RSA_SIGNING_PEM).unwrap(),
    )
}

pub fn sign_hs256(kid: &str, secret: &str, claims: &Value) -> String {
    sign(
        Algorithm::HS256,
        Some(kid),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// JWKS body advertising the signing key under `kid`
pub fn jwks_body(kid: &str) -> String {
    serde_json::json!({
        "keys": [{
            "kid": kid,
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "n": RSA_MODULUS.trim(),
            "e": "AQAB",
        }]
    })
    .to_string()
}
