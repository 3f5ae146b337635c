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

// Postgres refresh token lookups

use async_trait::async_trait;
use sqlx::PgPool;

use crate::core::errors::IdentityError;
use crate::core::models::RefreshToken;
use crate::query::{compile_filter, compile_projection, FieldOptions};
use crate::repository::schema::{from_epoch, REFRESH_TOKENS, TOKEN_FIELDS};
use crate::repository::{bind_filter, epoch, text, RefreshTokenStore};

pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn fetch(&self, tenant_id: &str, id: &str) -> Result<Option<RefreshToken>, IdentityError> {
        let projection =
            compile_projection(TOKEN_FIELDS, REFRESH_TOKENS, None, &FieldOptions::none());
        let filter = compile_filter(
            TOKEN_FIELDS,
            REFRESH_TOKENS,
            [("tenant_id", tenant_id), ("jti", id)],
            1,
        )?;
        let sql = format!(
            "{} {} LIMIT 1",
            projection.select_from(REFRESH_TOKENS),
            filter.where_clause()
        );

        let Some(row) = bind_filter(sqlx::query(&sql), &filter.values)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        // A token without an expiry never validates
        let Some(expires_at) = from_epoch(epoch(&row, "refresh_tokens_expires_at")?) else {
            tracing::warn!(token_id = %id, "Refresh token row has no expiry");
            return Ok(None);
        };

        Ok(Some(RefreshToken {
            id: text(&row, "refresh_tokens_id")?,
            tenant_id: text(&row, "refresh_tokens_tenant_id")?,
            user_id: text(&row, "refresh_tokens_user_id")?,
            status: text(&row, "refresh_tokens_status")?.parse()?,
            expires_at,
        }))
    }
}
