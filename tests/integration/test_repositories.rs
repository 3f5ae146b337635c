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

// Integration tests for cache-aside repositories

use std::sync::Arc;

use sentinel_identity::auth::StaticKeys;
use sentinel_identity::core::context::{roles, RequestContext};
use sentinel_identity::core::errors::IdentityError;
use sentinel_identity::core::models::{Account, Status, User};
use sentinel_identity::core::secret::AccountSecret;
use sentinel_identity::query::{FieldOption, FieldOptions};

use crate::common::{BrokenCache, Harness};

fn admin() -> RequestContext {
    RequestContext::new()
        .with_user("admin")
        .with_roles([roles::SYSTEM_ADMIN])
}

fn caller(id: &str) -> RequestContext {
    RequestContext::new().with_user(id).with_roles([roles::USER])
}

fn user(id: &str, email: &str) -> User {
    let mut user = User::new(id);
    user.email = email.to_string();
    user
}

#[tokio::test]
async fn test_get_is_served_from_cache_after_first_read() {
    let h = Harness::new();
    h.users.insert(user("user-1", "one@example.com"));

    let first = h.user_repo.get(&admin(), "user-1", &FieldOptions::none()).await.unwrap();
    let second = h.user_repo.get(&admin(), "user-1", &FieldOptions::none()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.users.fetch_count(), 1);
}

#[tokio::test]
async fn test_update_invalidates_cached_user() {
    let h = Harness::new();
    h.users.insert(user("user-1", "one@example.com"));
    h.user_repo.get(&admin(), "user-1", &FieldOptions::none()).await.unwrap();

    let mut changed = user("user-1", "renamed@example.com");
    changed.first_name = "Renamed".to_string();
    h.user_repo.update(&admin(), changed).await.unwrap();

    let fresh = h.user_repo.get(&admin(), "user-1", &FieldOptions::none()).await.unwrap();
    assert_eq!(fresh.email, "renamed@example.com");
    assert_eq!(fresh.updated_by.as_deref(), Some("admin"));
    assert_eq!(h.users.fetch_count(), 2);
}

#[tokio::test]
async fn test_create_invalidates_cached_user() {
    let h = Harness::new();
    h.users.insert(user("user-1", "one@example.com"));
    h.user_repo.get(&admin(), "user-1", &FieldOptions::none()).await.unwrap();

    h.user_repo
        .create(&admin(), user("user-1", "two@example.com"))
        .await
        .unwrap();

    let fresh = h.user_repo.get(&admin(), "user-1", &FieldOptions::none()).await.unwrap();
    assert_eq!(fresh.email, "two@example.com");
    assert_eq!(h.users.fetch_count(), 2);
}

#[tokio::test]
async fn test_delete_invalidates_and_reports_missing() {
    let h = Harness::new();
    h.users.insert(user("user-1", "one@example.com"));
    h.user_repo.get(&admin(), "user-1", &FieldOptions::none()).await.unwrap();

    h.user_repo.delete(&admin(), "user-1").await.unwrap();

    let gone = h.user_repo.get(&admin(), "user-1", &FieldOptions::none()).await;
    assert!(matches!(gone, Err(IdentityError::NotFound(_))));
    let again = h.user_repo.delete(&admin(), "user-1").await;
    assert!(matches!(again, Err(IdentityError::NotFound(_))));
}

#[tokio::test]
async fn test_upsert_is_idempotent() {
    let h = Harness::new();
    let ctx = caller("user-1");

    let first = h.user_repo.create(&ctx, user("user-1", "one@example.com")).await.unwrap();
    let second = h.user_repo.create(&ctx, user("user-1", "one@example.com")).await.unwrap();

    assert_eq!(h.users.users.lock().unwrap().len(), 1);
    assert_eq!(first.id, second.id);
    assert_eq!(first.email, second.email);
    assert_eq!(first.created_at, second.created_at);
    assert_eq!(second.created_by.as_deref(), Some("user-1"));
}

#[tokio::test]
async fn test_detail_reads_bypass_cache_and_cache_stays_plain() {
    let h = Harness::new();
    h.users.insert(user("admin", "admin@example.com"));
    let mut member = user("user-1", "one@example.com");
    member.created_by = Some("admin".to_string());
    h.users.insert(member);

    let detailed = h
        .user_repo
        .get(&admin(), "user-1", &FieldOptions::none().with(FieldOption::Detail))
        .await
        .unwrap();
    assert_eq!(
        detailed.creator.as_ref().map(|c| c.email.as_str()),
        Some("admin@example.com")
    );

    let plain = h.user_repo.get(&admin(), "user-1", &FieldOptions::none()).await.unwrap();
    assert!(plain.creator.is_none());
    assert_eq!(h.users.fetch_count(), 1);

    h.user_repo
        .get(&admin(), "user-1", &FieldOptions::none().with(FieldOption::Detail))
        .await
        .unwrap();
    assert_eq!(h.users.fetch_count(), 2);
}

#[tokio::test]
async fn test_user_visibility() {
    let h = Harness::new();
    h.users.insert(user("user-1", "one@example.com"));
    h.users.insert(user("user-2", "two@example.com"));

    let own = h.user_repo.get(&caller("user-1"), "current", &FieldOptions::none()).await.unwrap();
    assert_eq!(own.id, "user-1");

    let other = h.user_repo.get(&caller("user-1"), "user-2", &FieldOptions::none()).await;
    assert!(matches!(other, Err(IdentityError::NotFound(_))));

    let anonymous = h.user_repo.get(&RequestContext::new(), "", &FieldOptions::none()).await;
    assert!(matches!(anonymous, Err(IdentityError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_write_authorization() {
    let h = Harness::new();
    h.users.insert(user("user-2", "two@example.com"));

    let create = h.user_repo.create(&caller("user-1"), user("user-2", "x@example.com")).await;
    assert!(matches!(create, Err(IdentityError::Forbidden(_))));

    let update = h.user_repo.update(&caller("user-1"), user("user-2", "x@example.com")).await;
    assert!(matches!(update, Err(IdentityError::Forbidden(_))));

    let delete = h.user_repo.delete(&caller("user-2"), "user-2").await;
    assert!(matches!(delete, Err(IdentityError::Forbidden(_))));

    let missing = h.user_repo.update(&admin(), user("user-9", "nine@example.com")).await;
    assert!(matches!(missing, Err(IdentityError::NotFound(_))));
}

#[tokio::test]
async fn test_update_current_resolves_to_caller() {
    let h = Harness::new();
    h.users.insert(user("user-1", "one@example.com"));

    let stored = h
        .user_repo
        .update(&caller("user-1"), user("current", "new@example.com"))
        .await
        .unwrap();
    assert_eq!(stored.id, "user-1");
    assert_eq!(stored.email, "new@example.com");
}

#[tokio::test]
async fn test_broken_cache_degrades_to_store_reads() {
    let h = Harness::build(StaticKeys::default(), Arc::new(BrokenCache));
    h.users.insert(user("user-1", "one@example.com"));

    for _ in 0..3 {
        h.user_repo.get(&admin(), "user-1", &FieldOptions::none()).await.unwrap();
    }
    assert_eq!(h.users.fetch_count(), 3);

    h.user_repo.update(&admin(), user("user-1", "two@example.com")).await.unwrap();
}

#[tokio::test]
async fn test_store_faults_propagate() {
    let h = Harness::new();
    h.users.fail.store(true, std::sync::atomic::Ordering::SeqCst);

    let result = h.user_repo.get(&admin(), "user-1", &FieldOptions::none()).await;
    assert!(matches!(result, Err(IdentityError::Database(_))));
}

#[tokio::test]
async fn test_summarize_and_lookup_require_sysadmin() {
    let h = Harness::new();
    h.users.insert(user("user-1", "one@example.com"));
    let mut inactive = user("user-2", "two@example.com");
    inactive.status = Status::Inactive;
    h.users.insert(inactive);

    let denied = h.user_repo.summarize(&caller("user-1"), &["status".to_string()]).await;
    assert!(matches!(denied, Err(IdentityError::Forbidden(_))));

    let empty = h.user_repo.summarize(&admin(), &[]).await;
    assert!(matches!(empty, Err(IdentityError::InvalidRequest(_))));

    let rows = h.user_repo.summarize(&admin(), &["status".to_string()]).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.get("count") == Some(&serde_json::json!(1))));

    let found = h.user_repo.find_id_by_email(&admin(), " two@example.com ").await.unwrap();
    assert_eq!(found.as_deref(), Some("user-2"));
    let denied = h.user_repo.find_id_by_email(&caller("user-1"), "two@example.com").await;
    assert!(matches!(denied, Err(IdentityError::Forbidden(_))));
}

#[tokio::test]
async fn test_account_create_generates_and_keeps_secret() {
    let h = Harness::new();

    let created = h.account_repo.create(&admin(), Account::new("tenant-a", "Tenant A")).await.unwrap();
    let original = created.secret.clone().expect("secret generated");

    let again = h
        .account_repo
        .create(
            &admin(),
            Account::new("tenant-a", "Tenant A").with_secret(AccountSecret::new("replacement")),
        )
        .await
        .unwrap();
    assert_eq!(again.secret, Some(original.clone()));
    assert_eq!(h.account_repo.secret("tenant-a").await.unwrap(), Some(original));
}

#[tokio::test]
async fn test_account_visibility_and_cache() {
    let h = Harness::new();
    h.accounts.insert(Account::new("tenant-a", "Tenant A"));
    let member = RequestContext::new()
        .with_user("user-1")
        .with_tenant("tenant-a", "Tenant A");

    h.account_repo.get(&member, "tenant-a").await.unwrap();
    h.account_repo.get(&member, "tenant-a").await.unwrap();
    assert_eq!(h.accounts.fetch_count(), 1);

    let outsider = RequestContext::new()
        .with_user("user-2")
        .with_tenant("tenant-b", "Tenant B");
    let hidden = h.account_repo.get(&outsider, "tenant-a").await;
    assert!(matches!(hidden, Err(IdentityError::NotFound(_))));

    let by_name = h.account_repo.get_by_name(&member, "Tenant A").await;
    assert!(matches!(by_name, Err(IdentityError::Forbidden(_))));
    let by_name = h.account_repo.get_by_name(&admin(), "Tenant A").await.unwrap();
    assert_eq!(by_name.id, "tenant-a");
}

#[tokio::test]
async fn test_account_update_and_delete_invalidate() {
    let h = Harness::new();
    h.accounts.insert(Account::new("tenant-a", "Tenant A"));
    h.account_repo.get(&admin(), "tenant-a").await.unwrap();

    h.account_repo
        .update(&admin(), Account::new("tenant-a", "Tenant Renamed"))
        .await
        .unwrap();
    let renamed = h.account_repo.get(&admin(), "tenant-a").await.unwrap();
    assert_eq!(renamed.name, "Tenant Renamed");
    assert_eq!(h.accounts.fetch_count(), 2);

    h.account_repo.delete(&admin(), "tenant-a").await.unwrap();
    let gone = h.account_repo.get(&admin(), "tenant-a").await;
    assert!(matches!(gone, Err(IdentityError::NotFound(_))));
}
