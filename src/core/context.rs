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

//! Request-scoped identity carrier.
//!
//! A `RequestContext` is passed by value through the call chain. Builders
//! consume the context and return a rebound copy; nothing mutates a shared
//! context in place.

use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::core::models::Claims;

/// Identifier of the trusted internal principal.
pub const SYSTEM_USER_ID: &str = "system";

/// Role names understood by the resolver and repositories.
pub mod roles {
    pub const USER: &str = "user";
    pub const ADMIN: &str = "admin";
    pub const SYSTEM_ADMIN: &str = "sysadmin";
    pub const REFRESH: &str = "refresh";
}

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub tenant_id: Option<String>,
    pub tenant_name: Option<String>,
    pub user_id: Option<String>,
    pub roles: Vec<String>,
    pub trace_id: Option<String>,
    pub deadline: Option<Instant>,
}

impl RequestContext {
    /// Empty context with a fresh trace id.
    pub fn new() -> Self {
        Self {
            trace_id: Some(Uuid::new_v4().to_string()),
            ..Self::default()
        }
    }

    /// Trusted internal context used for lookups the caller may not perform itself.
    ///
    /// Carries the trace id and deadline of `parent` so internal calls stay correlated.
    pub fn system(parent: &RequestContext) -> Self {
        Self {
            tenant_id: parent.tenant_id.clone(),
            tenant_name: parent.tenant_name.clone(),
            user_id: Some(SYSTEM_USER_ID.to_string()),
            roles: vec![roles::SYSTEM_ADMIN.to_string()],
            trace_id: parent.trace_id.clone(),
            deadline: parent.deadline,
        }
    }

    /// Context bound to a verified principal.
    pub fn from_claims(claims: &Claims, parent: &RequestContext) -> Self {
        Self {
            tenant_id: Some(claims.tenant_id.clone()),
            tenant_name: Some(claims.tenant_name.clone()),
            user_id: Some(claims.user_id.clone()),
            roles: claims.roles.clone(),
            trace_id: parent.trace_id.clone(),
            deadline: parent.deadline,
        }
    }

    pub fn with_tenant(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.tenant_id = Some(id.into());
        self.tenant_name = Some(name.into());
        self
    }

    pub fn with_user(mut self, id: impl Into<String>) -> Self {
        self.user_id = Some(id.into());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_system_admin(&self) -> bool {
        self.has_role(roles::SYSTEM_ADMIN)
    }

    pub fn is_system_user(&self) -> bool {
        self.user_id.as_deref() == Some(SYSTEM_USER_ID)
    }

    /// Time left before the deadline, `None` when unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn user_id_or_empty(&self) -> &str {
        self.user_id.as_deref().unwrap_or_default()
    }
}
