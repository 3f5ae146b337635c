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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::core::errors::IdentityError;
use crate::core::identifier::validate_id;
use crate::core::secret::AccountSecret;

const MAX_NAME_LEN: usize = 256;

/// Resolved output of token verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub tenant_id: String,
    pub tenant_name: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_id: Option<String>,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Active,
    Inactive,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Inactive => "inactive",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Status::Active),
            "inactive" => Ok(Status::Inactive),
            other => Err(IdentityError::InvalidParameter(format!(
                "unknown status '{}'",
                other
            ))),
        }
    }
}

/// Tenant record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Status,
    #[serde(skip)]
    pub secret: Option<AccountSecret>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_by: Option<String>,
}

impl Account {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: Status::Active,
            secret: None,
            payload: Value::Null,
            created_at: None,
            created_by: None,
            updated_at: None,
            updated_by: None,
        }
    }

    pub fn with_secret(mut self, secret: AccountSecret) -> Self {
        self.secret = Some(secret);
        self
    }

    pub fn validate(&self) -> Result<(), IdentityError> {
        validate_id(&self.id)?;
        validate_name("name", &self.name)?;
        if self.name.is_empty() {
            return Err(IdentityError::InvalidRequest("account name is required".to_string()));
        }
        Ok(())
    }
}

/// Nested creator/updater details attached to detail-expanded user reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

/// Principal record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_by: Option<String>,
    /// Active `key:value` tags, read-only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updater: Option<UserSummary>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            status: Status::Active,
            payload: Value::Null,
            created_at: None,
            created_by: None,
            updated_at: None,
            updated_by: None,
            tags: Vec::new(),
            creator: None,
            updater: None,
        }
    }

    pub fn validate(&self) -> Result<(), IdentityError> {
        validate_id(&self.id)?;
        if !self.email.is_empty()
            && (!self.email.contains('@') || self.email.chars().any(char::is_whitespace))
        {
            return Err(IdentityError::InvalidParameter(format!(
                "invalid email for user {}",
                self.id
            )));
        }
        validate_name("email", &self.email)?;
        validate_name("first_name", &self.first_name)?;
        validate_name("last_name", &self.last_name)?;
        Ok(())
    }

    /// Detach nested creator/updater details.
    pub fn take_details(&mut self) -> (Option<UserSummary>, Option<UserSummary>) {
        (self.creator.take(), self.updater.take())
    }

    pub fn restore_details(&mut self, details: (Option<UserSummary>, Option<UserSummary>)) {
        self.creator = details.0;
        self.updater = details.1;
    }

    /// True when the identity-bearing fields differ from `other`.
    pub fn diverges_from(&self, other: &User) -> bool {
        self.email != other.email
            || self.first_name != other.first_name
            || self.last_name != other.last_name
            || self.status != other.status
    }
}

/// Refresh token record consulted for refresh-role tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub status: Status,
    pub expires_at: DateTime<Utc>,
}

impl RefreshToken {
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == Status::Active && self.expires_at > now
    }
}

fn validate_name(field: &str, value: &str) -> Result<(), IdentityError> {
    if value.len() > MAX_NAME_LEN || value.chars().any(char::is_control) {
        return Err(IdentityError::InvalidParameter(format!("invalid {}", field)));
    }
    Ok(())
}
