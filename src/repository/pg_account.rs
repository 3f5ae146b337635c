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

// Postgres account store

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::core::errors::IdentityError;
use crate::core::models::Account;
use crate::core::secret::AccountSecret;
use crate::query::{compile_filter, compile_projection, compile_returning, FieldOptions};
use crate::repository::schema::{from_epoch, ACCOUNTS, ACCOUNT_FIELDS};
use crate::repository::{bind_filter, epoch, text, AccountStore};

pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_where(&self, key: &str, value: &str) -> Result<Option<Account>, IdentityError> {
        let projection = compile_projection(ACCOUNT_FIELDS, ACCOUNTS, None, &FieldOptions::none());
        let filter = compile_filter(ACCOUNT_FIELDS, ACCOUNTS, [(key, value)], 1)?;
        let sql = format!(
            "{} {} LIMIT 1",
            projection.select_from(ACCOUNTS),
            filter.where_clause()
        );

        let row = bind_filter(sqlx::query(&sql), &filter.values)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| account_from_row(&row)).transpose()
    }
}

fn upsert_sql() -> String {
    format!(
        "INSERT INTO {t} (id, name, status, secret, payload, created_at, created_by, updated_at, updated_by) \
         VALUES ($1, $2, $3, $4, $5, COALESCE($6, now()), $7, COALESCE($8, now()), $9) \
         ON CONFLICT (id) DO UPDATE SET \
         name = EXCLUDED.name, status = EXCLUDED.status, \
         secret = COALESCE({t}.secret, EXCLUDED.secret), payload = EXCLUDED.payload, \
         updated_at = EXCLUDED.updated_at, updated_by = EXCLUDED.updated_by {returning}",
        t = ACCOUNTS,
        returning = compile_returning(ACCOUNT_FIELDS, ACCOUNTS, &FieldOptions::none()),
    )
}

fn update_sql() -> String {
    format!(
        "UPDATE {t} SET name = $2, status = $3, payload = $4, \
         updated_at = COALESCE($5, now()), updated_by = $6 WHERE {t}.id = $1 {returning}",
        t = ACCOUNTS,
        returning = compile_returning(ACCOUNT_FIELDS, ACCOUNTS, &FieldOptions::none()),
    )
}

fn account_from_row(row: &PgRow) -> Result<Account, IdentityError> {
    let mut account = Account::new(text(row, "accounts_id")?, text(row, "accounts_name")?);
    account.status = text(row, "accounts_status")?.parse()?;
    account.payload = row
        .try_get::<Option<Value>, _>("accounts_payload")?
        .unwrap_or(Value::Null);
    account.created_at = from_epoch(epoch(row, "accounts_created_at")?);
    account.created_by = row.try_get("accounts_created_by")?;
    account.updated_at = from_epoch(epoch(row, "accounts_updated_at")?);
    account.updated_by = row.try_get("accounts_updated_by")?;
    Ok(account)
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn fetch(&self, id: &str) -> Result<Option<Account>, IdentityError> {
        self.fetch_where("id", id).await
    }

    async fn fetch_by_name(&self, name: &str) -> Result<Option<Account>, IdentityError> {
        self.fetch_where("name", name).await
    }

    async fn upsert(&self, account: &Account) -> Result<Account, IdentityError> {
        let sql = upsert_sql();
        let row = sqlx::query(&sql)
            .bind(&account.id)
            .bind(&account.name)
            .bind(account.status.as_str())
            .bind(account.secret.as_ref().map(AccountSecret::expose_secret))
            .bind(&account.payload)
            .bind(account.created_at)
            .bind(&account.created_by)
            .bind(account.updated_at)
            .bind(&account.updated_by)
            .fetch_one(&self.pool)
            .await?;

        account_from_row(&row)
    }

    async fn update(&self, account: &Account) -> Result<Option<Account>, IdentityError> {
        let sql = update_sql();
        let row = sqlx::query(&sql)
            .bind(&account.id)
            .bind(&account.name)
            .bind(account.status.as_str())
            .bind(&account.payload)
            .bind(account.updated_at)
            .bind(&account.updated_by)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| account_from_row(&row)).transpose()
    }

    async fn delete(&self, id: &str) -> Result<u64, IdentityError> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn secret(&self, id: &str) -> Result<Option<AccountSecret>, IdentityError> {
        let secret: Option<Option<String>> =
            sqlx::query_scalar("SELECT secret FROM accounts WHERE id = $1 AND status = 'active'")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(secret.flatten().filter(|s| !s.is_empty()).map(AccountSecret::new))
    }
}
