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

//! Structural validity of entity identifiers.
//!
//! Identifiers arrive from token subjects (`auth0|5f1c…`, `user-42`,
//! `svc:billing`) and from request paths, so the accepted alphabet covers the
//! separators identity providers commonly emit and nothing that needs quoting.

use crate::core::errors::IdentityError;

pub const MAX_ID_LEN: usize = 256;

/// Sentinel that resolves to the caller's own identifier.
pub const CURRENT: &str = "current";

pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@' | '|' | ':' | '+'))
}

pub fn validate_id(id: &str) -> Result<(), IdentityError> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(IdentityError::InvalidParameter(format!(
            "invalid identifier '{}'",
            id.chars().take(32).collect::<String>()
        )))
    }
}

/// True when `id` names the caller rather than a specific entity.
pub fn is_current(id: &str) -> bool {
    id.is_empty() || id == CURRENT
}
