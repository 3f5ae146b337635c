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

// Postgres user store built on the field compiler

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::core::errors::IdentityError;
use crate::core::models::{User, UserSummary};
use crate::query::{
    compile_filter, compile_projection, compile_returning, compile_search, FieldOption,
    FieldOptions, SummaryDecoder,
};
use crate::repository::schema::{from_epoch, CREATOR, UPDATER, USERS, USER_FIELDS};
use crate::repository::{bind_filter, epoch, text, UserStore};

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn upsert_sql() -> String {
    format!(
        "INSERT INTO {t} (id, email, first_name, last_name, status, payload, \
         created_at, created_by, updated_at, updated_by) \
         VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, now()), $8, COALESCE($9, now()), $10) \
         ON CONFLICT (id) DO UPDATE SET \
         email = EXCLUDED.email, first_name = EXCLUDED.first_name, \
         last_name = EXCLUDED.last_name, status = EXCLUDED.status, \
         payload = EXCLUDED.payload, updated_at = EXCLUDED.updated_at, \
         updated_by = EXCLUDED.updated_by {returning}",
        t = USERS,
        returning = compile_returning(USER_FIELDS, USERS, &FieldOptions::none()),
    )
}

fn update_sql() -> String {
    format!(
        "UPDATE {t} SET email = $2, first_name = $3, last_name = $4, status = $5, \
         payload = $6, updated_at = COALESCE($7, now()), updated_by = $8 \
         WHERE {t}.id = $1 {returning}",
        t = USERS,
        returning = compile_returning(USER_FIELDS, USERS, &FieldOptions::none()),
    )
}

fn summary_from_row(row: &PgRow, alias: &str) -> Result<Option<UserSummary>, IdentityError> {
    let Some(id) = row.try_get::<Option<String>, _>(format!("{}_id", alias).as_str())? else {
        return Ok(None);
    };
    Ok(Some(UserSummary {
        id,
        email: text(row, &format!("{}_email", alias))?,
        first_name: text(row, &format!("{}_first_name", alias))?,
        last_name: text(row, &format!("{}_last_name", alias))?,
    }))
}

fn user_from_row(row: &PgRow, detail: bool) -> Result<User, IdentityError> {
    let mut user = User::new(text(row, "users_id")?);
    user.email = text(row, "users_email")?;
    user.first_name = text(row, "users_first_name")?;
    user.last_name = text(row, "users_last_name")?;
    user.status = text(row, "users_status")?.parse()?;
    user.payload = row
        .try_get::<Option<Value>, _>("users_payload")?
        .unwrap_or(Value::Null);
    user.created_at = from_epoch(epoch(row, "users_created_at")?);
    user.created_by = row.try_get("users_created_by")?;
    user.updated_at = from_epoch(epoch(row, "users_updated_at")?);
    user.updated_by = row.try_get("users_updated_by")?;
    user.tags = row
        .try_get::<Option<Vec<String>>, _>("users_tags")?
        .unwrap_or_default();

    if detail {
        user.creator = summary_from_row(row, CREATOR)?;
        user.updater = summary_from_row(row, UPDATER)?;
    }
    Ok(user)
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn fetch(&self, id: &str, options: &FieldOptions) -> Result<Option<User>, IdentityError> {
        let projection = compile_projection(USER_FIELDS, USERS, None, options);
        let filter = compile_filter(USER_FIELDS, USERS, [("id", id)], 1)?;
        let sql = format!("{} {}", projection.select_from(USERS), filter.where_clause());

        let row = bind_filter(sqlx::query(&sql), &filter.values)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| user_from_row(&row, options.contains(FieldOption::Detail)))
            .transpose()
    }

    async fn upsert(&self, user: &User) -> Result<User, IdentityError> {
        let sql = upsert_sql();
        let row = sqlx::query(&sql)
            .bind(&user.id)
            .bind(&user.email)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.status.as_str())
            .bind(&user.payload)
            .bind(user.created_at)
            .bind(&user.created_by)
            .bind(user.updated_at)
            .bind(&user.updated_by)
            .fetch_one(&self.pool)
            .await?;

        user_from_row(&row, false)
    }

    async fn update(&self, user: &User) -> Result<Option<User>, IdentityError> {
        let sql = update_sql();
        let row = sqlx::query(&sql)
            .bind(&user.id)
            .bind(&user.email)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.status.as_str())
            .bind(&user.payload)
            .bind(user.updated_at)
            .bind(&user.updated_by)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| user_from_row(&row, false)).transpose()
    }

    async fn delete(&self, id: &str) -> Result<u64, IdentityError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn summarize(&self, fields: &[String]) -> Result<Vec<Map<String, Value>>, IdentityError> {
        let projection = compile_projection(USER_FIELDS, USERS, Some(fields), &FieldOptions::none());
        let decoder = SummaryDecoder::new(USER_FIELDS, USERS, fields);
        let sql = format!("{} {}", projection.select_from(USERS), projection.group_by_clause());

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(|row| decoder.decode(row)).collect()
    }

    async fn find_id_by_email(&self, email: &str) -> Result<Option<String>, IdentityError> {
        let projection = compile_search(USER_FIELDS, USERS, false);
        let filter = compile_filter(USER_FIELDS, USERS, [("email", email)], 1)?;
        let sql = format!(
            "{} {} LIMIT 1",
            projection.select_from(USERS),
            filter.where_clause()
        );

        let row = bind_filter(sqlx::query(&sql), &filter.values)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.try_get::<Option<String>, _>("users_id")?),
            None => Ok(None),
        }
    }
}
