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

// Property tests for the SQL fragment compilers over the real schemas

use proptest::prelude::*;

use sentinel_identity::query::{
    compile_filter, compile_projection, compile_returning, FieldOption, FieldOptions,
};
use sentinel_identity::repository::schema::{ACCOUNTS, ACCOUNT_FIELDS, USERS, USER_FIELDS};

const SUMMARY_NAMES: &[&str] = &[
    "status",
    "email",
    "mail",
    "first_name",
    "given_name",
    "created_by",
    "creator.email",
    "users.last_name",
    "no_such_field",
];

const FILTER_KEYS: &[&str] = &["id", "mail", "status", "created_by", "family_name"];

fn options(detail: bool) -> FieldOptions {
    if detail {
        FieldOptions::none().with(FieldOption::Detail)
    } else {
        FieldOptions::none()
    }
}

fn summary_names() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(prop::sample::select(SUMMARY_NAMES), 1..6)
        .prop_map(|names| names.into_iter().map(str::to_string).collect())
}

proptest! {
    #[test]
    fn projection_hides_hidden_and_gates_details(detail in any::<bool>()) {
        let projection = compile_projection(USER_FIELDS, USERS, None, &options(detail));

        prop_assert!(projection.columns.iter().all(|c| !c.ends_with(" AS users_key")));
        let has_creator = projection.columns.iter().any(|c| c.ends_with(" AS creator_email"));
        prop_assert_eq!(has_creator, detail);
        prop_assert_eq!(projection.joins.is_empty(), !detail);
        prop_assert!(projection.group_by.is_empty());
        prop_assert!(!projection.is_summary());
    }

    #[test]
    fn returning_follows_projection_gating(detail in any::<bool>()) {
        let returning = compile_returning(USER_FIELDS, USERS, &options(detail));

        prop_assert!(returning.starts_with("RETURNING "));
        prop_assert!(!returning.contains("users_key"));
        prop_assert_eq!(returning.contains(" AS creator_id"), detail);
    }

    #[test]
    fn summary_is_order_and_duplicate_insensitive(names in summary_names()) {
        let projection = compile_projection(USER_FIELDS, USERS, Some(names.as_slice()), &FieldOptions::none());

        let mut shuffled = names.clone();
        shuffled.reverse();
        shuffled.extend(names.iter().cloned());
        let again = compile_projection(USER_FIELDS, USERS, Some(shuffled.as_slice()), &FieldOptions::none());

        prop_assert_eq!(&projection, &again);
        prop_assert!(projection.is_summary());
        prop_assert_eq!(projection.columns.last().map(String::as_str), Some("COUNT(*) AS count"));
        prop_assert_eq!(projection.group_by.len(), projection.columns.len() - 1);
    }

    #[test]
    fn summary_ignores_options(names in summary_names(), detail in any::<bool>()) {
        let plain = compile_projection(USER_FIELDS, USERS, Some(names.as_slice()), &FieldOptions::none());
        let widened = compile_projection(USER_FIELDS, USERS, Some(names.as_slice()), &options(detail));
        prop_assert_eq!(plain, widened);
    }

    #[test]
    fn filter_placeholders_are_sequential(
        keys in prop::collection::vec(prop::sample::select(FILTER_KEYS), 0..6),
        value in "'[a-z]{1,8}",
        first in 1usize..10,
    ) {
        let pairs: Vec<(&str, &str)> = keys.iter().map(|k| (*k, value.as_str())).collect();
        let filter = compile_filter(USER_FIELDS, USERS, pairs, first).unwrap();

        prop_assert_eq!(filter.values.len(), keys.len());
        prop_assert_eq!(filter.next_placeholder(first), first + keys.len());
        for (offset, condition) in filter.conditions.iter().enumerate() {
            let placeholder = format!("${}", first + offset);
            prop_assert!(condition.ends_with(&placeholder));
            prop_assert!(!condition.contains('\''));
        }
    }
}

#[test]
fn tags_come_from_own_namespace() {
    let projection = compile_projection(USER_FIELDS, USERS, None, &FieldOptions::none());
    let tags = projection
        .columns
        .iter()
        .find(|c| c.ends_with(" AS users_tags"))
        .expect("tags column");

    assert!(tags.contains("tags.namespace = 'users'"));
    assert!(tags.contains("tags.resource_id = users.id"));
    assert!(tags.contains("tags.status = 'active'"));
}

#[test]
fn summary_on_unknown_field_is_count_only() {
    let names = vec!["no_such_field".to_string()];
    let projection = compile_projection(USER_FIELDS, USERS, Some(names.as_slice()), &FieldOptions::none());
    assert_eq!(projection.columns, vec!["COUNT(*) AS count".to_string()]);
    assert_eq!(projection.group_by_clause(), "");
}

#[test]
fn account_projection_never_exposes_secret() {
    let projection = compile_projection(ACCOUNT_FIELDS, ACCOUNTS, None, &FieldOptions::none());
    assert!(projection.columns.iter().all(|c| !c.contains("secret")));
    assert!(!compile_returning(ACCOUNT_FIELDS, ACCOUNTS, &FieldOptions::none()).contains("secret"));
}
