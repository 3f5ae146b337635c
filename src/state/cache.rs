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

//! Cache-aside contract.
//!
//! The cache is derived state. Every accessor method swallows transport and
//! decode failures after logging them, so a broken cache degrades to a miss
//! and never fails the surrounding operation.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::core::errors::IdentityError;

/// Key/value transport consumed by the accessor
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, IdentityError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), IdentityError>;

    /// Returns `false` when there was nothing to delete.
    async fn delete(&self, key: &str) -> Result<bool, IdentityError>;
}

/// Entity families sharing the cache keyspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Account,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Account => "account",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic cache key: `{entity}:{id}`
pub fn cache_key(kind: EntityKind, id: &str) -> String {
    format!("{}:{}", kind, id)
}

#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    pub ttl: Duration,
    /// Serialized values at or above this size are not cached
    pub max_value_bytes: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_value_bytes: 64 * 1024,
        }
    }
}

/// Typed read-through / invalidate-on-write helper for one entity kind
pub struct CacheAccessor<T> {
    backend: Arc<dyn CacheBackend>,
    kind: EntityKind,
    settings: CacheSettings,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for CacheAccessor<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            kind: self.kind,
            settings: self.settings,
            _entity: PhantomData,
        }
    }
}

impl<T> CacheAccessor<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    pub fn new(backend: Arc<dyn CacheBackend>, kind: EntityKind, settings: CacheSettings) -> Self {
        Self {
            backend,
            kind,
            settings,
            _entity: PhantomData,
        }
    }

    pub fn key(&self, id: &str) -> String {
        cache_key(self.kind, id)
    }

    /// Cached value for `id`, `None` on miss or any failure.
    pub async fn lookup(&self, id: &str) -> Option<T> {
        let key = self.key(id);
        let bytes = match self.backend.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache lookup failed, falling through to store");
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                None
            }
        }
    }

    /// Populate the cache. Oversized values are skipped.
    pub async fn store(&self, id: &str, value: &T) {
        let key = self.key(id);
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };

        if bytes.len() >= self.settings.max_value_bytes {
            tracing::debug!(
                key = %key,
                size = bytes.len(),
                limit = self.settings.max_value_bytes,
                "Value exceeds cache ceiling, not cached"
            );
            return;
        }

        if let Err(e) = self.backend.set(&key, bytes, self.settings.ttl).await {
            tracing::warn!(key = %key, error = %e, "Cache store failed");
        }
    }

    /// Best-effort removal; a missing entry is not an error.
    pub async fn invalidate(&self, id: &str) {
        let key = self.key(id);
        match self.backend.delete(&key).await {
            Ok(true) => tracing::debug!(key = %key, "Cache entry invalidated"),
            Ok(false) => {}
            Err(e) => tracing::warn!(key = %key, error = %e, "Cache invalidation failed"),
        }
    }
}
