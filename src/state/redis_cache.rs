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

// Redis cache backend shared between service instances

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tokio::time::Duration;

use crate::core::errors::IdentityError;
use crate::state::cache::CacheBackend;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Redis-backed cache transport
pub struct RedisCache {
    connection_manager: ConnectionManager,
}

impl RedisCache {
    /// Connect and verify the server answers PING
    pub async fn connect(redis_url: &str) -> Result<Self, IdentityError> {
        let client = Client::open(redis_url)
            .map_err(|e| IdentityError::Configuration(format!("Invalid Redis URL format: {}", e)))?;

        let connection_manager = tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| {
                IdentityError::Cache(format!(
                    "Redis connection timed out after {} seconds",
                    CONNECT_TIMEOUT.as_secs()
                ))
            })?
            .map_err(|e| IdentityError::Cache(format!("Failed to create Redis ConnectionManager: {}", e)))?;

        let store = Self { connection_manager };
        store.ping().await?;
        tracing::info!("Redis cache connected");
        Ok(store)
    }

    pub async fn ping(&self) -> Result<(), IdentityError> {
        let mut conn = self.connection_manager.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| IdentityError::Cache(format!("Redis PING failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, IdentityError> {
        let mut conn = self.connection_manager.clone();
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| IdentityError::Cache(format!("GET failed: {}", e)))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), IdentityError> {
        let mut conn = self.connection_manager.clone();
        // SET EX rejects zero
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(|e| IdentityError::Cache(format!("SET failed: {}", e)))
    }

    async fn delete(&self, key: &str) -> Result<bool, IdentityError> {
        let mut conn = self.connection_manager.clone();
        let removed: u64 = conn
            .del(key)
            .await
            .map_err(|e| IdentityError::Cache(format!("DEL failed: {}", e)))?;
        Ok(removed > 0)
    }
}
