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

//! User repository: authorization and cache-aside over a [`UserStore`].

use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::core::context::RequestContext;
use crate::core::errors::IdentityError;
use crate::core::identifier::{is_current, validate_id};
use crate::core::models::User;
use crate::query::{FieldOption, FieldOptions};
use crate::repository::UserStore;
use crate::state::CacheAccessor;

pub struct UserRepository {
    store: Arc<dyn UserStore>,
    cache: CacheAccessor<User>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn UserStore>, cache: CacheAccessor<User>) -> Self {
        Self { store, cache }
    }

    /// Resolve `""`/`"current"` to the caller. Anyone else's id needs the
    /// system administrator role; otherwise the user simply does not exist.
    fn resolve_readable(ctx: &RequestContext, id: &str) -> Result<String, IdentityError> {
        let own = ctx.user_id.as_deref();
        if is_current(id) {
            return own
                .map(str::to_string)
                .ok_or_else(|| IdentityError::InvalidRequest("no authenticated user".to_string()));
        }
        if own != Some(id) && !ctx.is_system_admin() {
            return Err(IdentityError::NotFound(format!("user {}", id)));
        }
        Ok(id.to_string())
    }

    pub async fn get(
        &self,
        ctx: &RequestContext,
        id: &str,
        options: &FieldOptions,
    ) -> Result<User, IdentityError> {
        let id = Self::resolve_readable(ctx, id)?;
        validate_id(&id)?;

        // Cached entries never carry nested details
        let detail = options.contains(FieldOption::Detail);
        if !detail {
            if let Some(user) = self.cache.lookup(&id).await {
                return Ok(user);
            }
        }

        let mut user = self
            .store
            .fetch(&id, options)
            .await?
            .ok_or_else(|| IdentityError::NotFound(format!("user {}", id)))?;

        let details = user.take_details();
        self.cache.store(&id, &user).await;
        user.restore_details(details);
        Ok(user)
    }

    pub async fn create(&self, ctx: &RequestContext, mut user: User) -> Result<User, IdentityError> {
        if user.id.is_empty() {
            return Err(IdentityError::InvalidRequest("user id is required".to_string()));
        }
        user.validate()?;
        if ctx.user_id.as_deref() != Some(user.id.as_str()) && !ctx.is_system_admin() {
            return Err(IdentityError::Forbidden(format!(
                "caller may not provision user {}",
                user.id
            )));
        }

        let now = Utc::now();
        let actor = ctx.user_id.clone();
        user.created_at.get_or_insert(now);
        if user.created_by.is_none() {
            user.created_by = actor.clone();
        }
        user.updated_at = Some(now);
        user.updated_by = actor;

        let stored = self.store.upsert(&user).await?;
        self.cache.invalidate(&stored.id).await;
        tracing::debug!(user_id = %stored.id, "User upserted");
        Ok(stored)
    }

    pub async fn update(&self, ctx: &RequestContext, mut user: User) -> Result<User, IdentityError> {
        if is_current(&user.id) {
            user.id = ctx
                .user_id
                .clone()
                .ok_or_else(|| IdentityError::InvalidRequest("no authenticated user".to_string()))?;
        } else if ctx.user_id.as_deref() != Some(user.id.as_str()) && !ctx.is_system_admin() {
            return Err(IdentityError::Forbidden(format!("caller may not update user {}", user.id)));
        }
        user.validate()?;
        user.updated_at = Some(Utc::now());
        user.updated_by = ctx.user_id.clone();

        let stored = self
            .store
            .update(&user)
            .await?
            .ok_or_else(|| IdentityError::NotFound(format!("user {}", user.id)))?;
        self.cache.invalidate(&stored.id).await;
        Ok(stored)
    }

    pub async fn delete(&self, ctx: &RequestContext, id: &str) -> Result<(), IdentityError> {
        if !ctx.is_system_admin() {
            return Err(IdentityError::Forbidden("user deletion requires sysadmin".to_string()));
        }
        validate_id(id)?;

        let result = self.store.delete(id).await;
        // Invalidated whatever the outcome
        self.cache.invalidate(id).await;

        match result? {
            0 => Err(IdentityError::NotFound(format!("user {}", id))),
            _ => Ok(()),
        }
    }

    pub async fn summarize(
        &self,
        ctx: &RequestContext,
        fields: &[String],
    ) -> Result<Vec<Map<String, Value>>, IdentityError> {
        if !ctx.is_system_admin() {
            return Err(IdentityError::Forbidden("user summary requires sysadmin".to_string()));
        }
        if fields.is_empty() {
            return Err(IdentityError::InvalidRequest("summary needs at least one field".to_string()));
        }
        self.store.summarize(fields).await
    }

    pub async fn find_id_by_email(
        &self,
        ctx: &RequestContext,
        email: &str,
    ) -> Result<Option<String>, IdentityError> {
        if !ctx.is_system_admin() {
            return Err(IdentityError::Forbidden("user lookup requires sysadmin".to_string()));
        }
        if email.trim().is_empty() {
            return Err(IdentityError::InvalidParameter("email is required".to_string()));
        }
        self.store.find_id_by_email(email.trim()).await
    }
}
