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

//! Entity persistence.
//!
//! The `*Store` traits are the authoritative storage seam: they know SQL but
//! nothing about callers. `UserRepository` and `AccountRepository` wrap a
//! store with authorization, identifier resolution and cache-aside.

pub mod accounts;
pub mod pg_account;
pub mod pg_token;
pub mod pg_user;
pub mod schema;
pub mod users;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{Postgres, Row};

use crate::core::errors::IdentityError;
use crate::core::models::{Account, RefreshToken, User};
use crate::core::secret::AccountSecret;
use crate::query::{FieldOptions, FilterValue};

pub use accounts::AccountRepository;
pub use pg_account::PgAccountStore;
pub use pg_token::PgRefreshTokenStore;
pub use pg_user::PgUserStore;
pub use users::UserRepository;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn fetch(&self, id: &str, options: &FieldOptions) -> Result<Option<User>, IdentityError>;

    /// Insert or update by id, returning the stored row.
    async fn upsert(&self, user: &User) -> Result<User, IdentityError>;

    /// `None` when no row has the user's id.
    async fn update(&self, user: &User) -> Result<Option<User>, IdentityError>;

    /// Number of rows removed.
    async fn delete(&self, id: &str) -> Result<u64, IdentityError>;

    /// Grouped counts over the named fields.
    async fn summarize(&self, fields: &[String]) -> Result<Vec<Map<String, Value>>, IdentityError>;

    async fn find_id_by_email(&self, email: &str) -> Result<Option<String>, IdentityError>;
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<Option<Account>, IdentityError>;

    async fn fetch_by_name(&self, name: &str) -> Result<Option<Account>, IdentityError>;

    /// Insert or update by id. An existing secret is never replaced.
    async fn upsert(&self, account: &Account) -> Result<Account, IdentityError>;

    async fn update(&self, account: &Account) -> Result<Option<Account>, IdentityError>;

    async fn delete(&self, id: &str) -> Result<u64, IdentityError>;

    async fn secret(&self, id: &str) -> Result<Option<AccountSecret>, IdentityError>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn fetch(&self, tenant_id: &str, id: &str) -> Result<Option<RefreshToken>, IdentityError>;
}

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Bind compiled filter values in placeholder order.
pub(crate) fn bind_filter<'q>(mut query: PgQuery<'q>, values: &'q [FilterValue]) -> PgQuery<'q> {
    for value in values {
        query = match value {
            FilterValue::Text(v) => query.bind(v.as_str()),
            FilterValue::Int(v) => query.bind(*v),
            FilterValue::Float(v) => query.bind(*v),
            FilterValue::Bool(v) => query.bind(*v),
            FilterValue::Time(v) => query.bind(*v as f64),
        };
    }
    query
}

/// Optional text column; absent aliases read as empty.
pub(crate) fn text(row: &PgRow, alias: &str) -> Result<String, IdentityError> {
    Ok(row.try_get::<Option<String>, _>(alias)?.unwrap_or_default())
}

pub(crate) fn epoch(row: &PgRow, alias: &str) -> Result<Option<i64>, IdentityError> {
    Ok(row.try_get::<Option<i64>, _>(alias)?)
}
