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

//! Column metadata of every persisted entity.

use chrono::{DateTime, Utc};

use crate::query::{FieldOption, FieldSpec, FieldType};

pub const USERS: &str = "users";
pub const ACCOUNTS: &str = "accounts";
pub const REFRESH_TOKENS: &str = "refresh_tokens";

/// Join aliases over `users` for the nested detail summaries
pub const CREATOR: &str = "creator";
pub const UPDATER: &str = "updater";

pub static USER_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("key", FieldType::Int, USERS).hidden().primary(),
    FieldSpec::new("id", FieldType::String, USERS),
    FieldSpec::new("email", FieldType::String, USERS).search(&["mail"]),
    FieldSpec::new("first_name", FieldType::String, USERS).search(&["given_name"]),
    FieldSpec::new("last_name", FieldType::String, USERS).search(&["family_name"]),
    FieldSpec::new("status", FieldType::String, USERS),
    FieldSpec::new("payload", FieldType::Json, USERS),
    FieldSpec::new("created_at", FieldType::Time, USERS),
    FieldSpec::new("created_by", FieldType::String, USERS),
    FieldSpec::new("updated_at", FieldType::Time, USERS),
    FieldSpec::new("updated_by", FieldType::String, USERS),
    FieldSpec::new("tags", FieldType::Array, USERS).tags(),
    FieldSpec::new("id", FieldType::String, CREATOR)
        .source(USERS)
        .join("id", "created_by")
        .option(FieldOption::Detail),
    FieldSpec::new("email", FieldType::String, CREATOR)
        .source(USERS)
        .join("id", "created_by")
        .option(FieldOption::Detail),
    FieldSpec::new("first_name", FieldType::String, CREATOR)
        .source(USERS)
        .join("id", "created_by")
        .option(FieldOption::Detail),
    FieldSpec::new("last_name", FieldType::String, CREATOR)
        .source(USERS)
        .join("id", "created_by")
        .option(FieldOption::Detail),
    FieldSpec::new("id", FieldType::String, UPDATER)
        .source(USERS)
        .join("id", "updated_by")
        .option(FieldOption::Detail),
    FieldSpec::new("email", FieldType::String, UPDATER)
        .source(USERS)
        .join("id", "updated_by")
        .option(FieldOption::Detail),
    FieldSpec::new("first_name", FieldType::String, UPDATER)
        .source(USERS)
        .join("id", "updated_by")
        .option(FieldOption::Detail),
    FieldSpec::new("last_name", FieldType::String, UPDATER)
        .source(USERS)
        .join("id", "updated_by")
        .option(FieldOption::Detail),
];

/// The signing secret is deliberately absent; it is only ever read by id.
pub static ACCOUNT_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("key", FieldType::Int, ACCOUNTS).hidden().primary(),
    FieldSpec::new("id", FieldType::String, ACCOUNTS),
    FieldSpec::new("name", FieldType::String, ACCOUNTS).search(&["tenant"]),
    FieldSpec::new("status", FieldType::String, ACCOUNTS),
    FieldSpec::new("payload", FieldType::Json, ACCOUNTS),
    FieldSpec::new("created_at", FieldType::Time, ACCOUNTS),
    FieldSpec::new("created_by", FieldType::String, ACCOUNTS),
    FieldSpec::new("updated_at", FieldType::Time, ACCOUNTS),
    FieldSpec::new("updated_by", FieldType::String, ACCOUNTS),
];

pub static TOKEN_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("key", FieldType::Int, REFRESH_TOKENS).hidden().primary(),
    FieldSpec::new("id", FieldType::String, REFRESH_TOKENS).search(&["jti"]),
    FieldSpec::new("tenant_id", FieldType::String, REFRESH_TOKENS),
    FieldSpec::new("user_id", FieldType::String, REFRESH_TOKENS),
    FieldSpec::new("status", FieldType::String, REFRESH_TOKENS),
    FieldSpec::new("expires_at", FieldType::Time, REFRESH_TOKENS),
    // Tokens of a removed tenant must not resolve
    FieldSpec::new("id", FieldType::String, ACCOUNTS)
        .join("id", "tenant_id")
        .required()
        .hidden(),
];

/// Epoch seconds from a projected time column.
pub fn from_epoch(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| DateTime::from_timestamp(s, 0))
}
