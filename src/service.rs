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

//! Component wiring shared by the binary and embedding services.

use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::auth::{ClaimsResolver, JwksRefresher, RefreshHandle, StaticKeys, TrustStore};
use crate::config::Config;
use crate::core::errors::IdentityError;
use crate::repository::{
    AccountRepository, PgAccountStore, PgRefreshTokenStore, PgUserStore, UserRepository,
};
use crate::state::{CacheAccessor, CacheBackend, EntityKind, MemoryCache, RedisCache};

pub struct IdentityService {
    pub resolver: Arc<ClaimsResolver>,
    pub users: Arc<UserRepository>,
    pub accounts: Arc<AccountRepository>,
    pub trust: TrustStore,
    config: Config,
}

impl IdentityService {
    /// Connect storage and cache, then assemble the resolver.
    pub async fn connect(config: Config) -> Result<Self, IdentityError> {
        let pool = PgPoolOptions::new().connect(&config.database_url).await?;
        tracing::info!("Database pool connected");

        let cache: Arc<dyn CacheBackend> = match &config.redis_url {
            Some(url) => Arc::new(RedisCache::connect(url).await?),
            None => {
                tracing::info!(
                    capacity = config.cache_max_capacity,
                    "REDIS_URL not set, using in-process cache"
                );
                Arc::new(MemoryCache::new(config.cache_max_capacity))
            }
        };

        let keys = StaticKeys::from_pem_files(
            config.ec_public_key_path.as_deref(),
            config.rsa_public_key_path.as_deref(),
        )?;

        let settings = config.cache_settings();
        let users = Arc::new(UserRepository::new(
            Arc::new(PgUserStore::new(pool.clone())),
            CacheAccessor::new(Arc::clone(&cache), EntityKind::User, settings),
        ));
        let accounts = Arc::new(AccountRepository::new(
            Arc::new(PgAccountStore::new(pool.clone())),
            CacheAccessor::new(cache, EntityKind::Account, settings),
        ));

        let trust = TrustStore::new();
        let resolver = Arc::new(ClaimsResolver::new(
            config.resolver_settings(),
            Arc::clone(&accounts),
            Arc::clone(&users),
            Arc::new(PgRefreshTokenStore::new(pool)),
            keys,
            trust.clone(),
        ));

        Ok(Self {
            resolver,
            users,
            accounts,
            trust,
            config,
        })
    }

    /// Start the JWKS refresher, `None` when no identity domain is configured.
    pub fn start_refresher(&self, shutdown: &CancellationToken) -> Result<Option<RefreshHandle>, IdentityError> {
        let Some(settings) = self.config.refresher_settings() else {
            tracing::info!("IDENTITY_DOMAIN not set, JWKS refresher disabled");
            return Ok(None);
        };
        let refresher = JwksRefresher::new(settings, self.trust.clone())
            .map_err(|e| IdentityError::Configuration(e.to_string()))?;
        Ok(Some(refresher.spawn(shutdown)))
    }
}
