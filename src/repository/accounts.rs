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

// Account (tenant) repository

use chrono::Utc;
use std::sync::Arc;

use crate::core::context::RequestContext;
use crate::core::errors::IdentityError;
use crate::core::identifier::validate_id;
use crate::core::models::Account;
use crate::core::secret::AccountSecret;
use crate::repository::AccountStore;
use crate::state::CacheAccessor;

pub struct AccountRepository {
    store: Arc<dyn AccountStore>,
    cache: CacheAccessor<Account>,
}

impl AccountRepository {
    pub fn new(store: Arc<dyn AccountStore>, cache: CacheAccessor<Account>) -> Self {
        Self { store, cache }
    }

    fn require_sysadmin(ctx: &RequestContext, action: &str) -> Result<(), IdentityError> {
        if ctx.is_system_admin() {
            Ok(())
        } else {
            Err(IdentityError::Forbidden(format!("account {} requires sysadmin", action)))
        }
    }

    /// Own tenant, or any tenant for system administrators.
    pub async fn get(&self, ctx: &RequestContext, id: &str) -> Result<Account, IdentityError> {
        validate_id(id)?;
        if ctx.tenant_id.as_deref() != Some(id) && !ctx.is_system_admin() {
            return Err(IdentityError::NotFound(format!("account {}", id)));
        }

        if let Some(account) = self.cache.lookup(id).await {
            return Ok(account);
        }

        let account = self
            .store
            .fetch(id)
            .await?
            .ok_or_else(|| IdentityError::NotFound(format!("account {}", id)))?;
        self.cache.store(id, &account).await;
        Ok(account)
    }

    /// Name lookups always hit the store.
    pub async fn get_by_name(&self, ctx: &RequestContext, name: &str) -> Result<Account, IdentityError> {
        Self::require_sysadmin(ctx, "lookup by name")?;
        if name.trim().is_empty() {
            return Err(IdentityError::InvalidParameter("account name is required".to_string()));
        }
        self.store
            .fetch_by_name(name.trim())
            .await?
            .ok_or_else(|| IdentityError::NotFound(format!("account named {}", name)))
    }

    pub async fn create(&self, ctx: &RequestContext, mut account: Account) -> Result<Account, IdentityError> {
        Self::require_sysadmin(ctx, "creation")?;
        if account.id.is_empty() {
            return Err(IdentityError::InvalidRequest("account id is required".to_string()));
        }
        account.validate()?;
        if account.secret.is_none() {
            account.secret = Some(AccountSecret::generate());
        }

        let now = Utc::now();
        account.created_at.get_or_insert(now);
        if account.created_by.is_none() {
            account.created_by = ctx.user_id.clone();
        }
        account.updated_at = Some(now);
        account.updated_by = ctx.user_id.clone();

        let stored = self.store.upsert(&account).await?;
        self.cache.invalidate(&stored.id).await;
        tracing::info!(account_id = %stored.id, "Account upserted");
        Ok(stored)
    }

    pub async fn update(&self, ctx: &RequestContext, mut account: Account) -> Result<Account, IdentityError> {
        Self::require_sysadmin(ctx, "update")?;
        account.validate()?;
        account.updated_at = Some(Utc::now());
        account.updated_by = ctx.user_id.clone();

        let stored = self
            .store
            .update(&account)
            .await?
            .ok_or_else(|| IdentityError::NotFound(format!("account {}", account.id)))?;
        self.cache.invalidate(&stored.id).await;
        Ok(stored)
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &str) -> Result<(), IdentityError> {
        Self::require_sysadmin(ctx, "deletion")?;
        validate_id(id)?;

        let result = self.store.delete(id).await;
        self.cache.invalidate(id).await;

        match result? {
            0 => Err(IdentityError::NotFound(format!("account {}", id))),
            _ => Ok(()),
        }
    }

    /// Signing secret, straight from the store. Secrets are never cached.
    pub async fn secret(&self, id: &str) -> Result<Option<AccountSecret>, IdentityError> {
        validate_id(id)?;
        self.store.secret(id).await
    }
}
