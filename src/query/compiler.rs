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

//! Projection, search and RETURNING compilers.

use crate::query::field::{strip_quotes, FieldOptions, FieldSpec, FieldType};

/// Table holding `key`/`value` tags for every entity kind.
pub const TAGS_TABLE: &str = "tags";

/// Alias of the trailing aggregate in summary projections.
pub const COUNT_ALIAS: &str = "count";

/// Compiled SELECT fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub columns: Vec<String>,
    pub joins: Vec<String>,
    pub group_by: Vec<String>,
}

impl Projection {
    /// Comma separated select list.
    pub fn select_list(&self) -> String {
        self.columns.join(", ")
    }

    /// Space separated JOIN clauses, empty when nothing is joined.
    pub fn join_clause(&self) -> String {
        self.joins.join(" ")
    }

    /// `GROUP BY …` for summary projections, empty otherwise.
    pub fn group_by_clause(&self) -> String {
        if self.group_by.is_empty() {
            String::new()
        } else {
            format!("GROUP BY {}", self.group_by.join(", "))
        }
    }

    pub fn is_summary(&self) -> bool {
        self.columns
            .last()
            .is_some_and(|c| c.ends_with(&format!(" AS {}", COUNT_ALIAS)))
    }

    /// `SELECT … FROM table joins`, without filter.
    pub fn select_from(&self, table: &str) -> String {
        let mut sql = format!("SELECT {} FROM {}", self.select_list(), table);
        if !self.joins.is_empty() {
            sql.push(' ');
            sql.push_str(&self.join_clause());
        }
        sql
    }
}

/// Compile the projection for `fields` read through `table`.
///
/// A non-empty `summary` restricts the output to the matching fields plus a
/// trailing `COUNT(*)`; otherwise option-gated fields are dropped unless
/// enabled by `options`. Hidden fields never appear in the select list.
pub fn compile_projection(
    fields: &[FieldSpec],
    table: &str,
    summary: Option<&[String]>,
    options: &FieldOptions,
) -> Projection {
    let summary = summary.filter(|names| !names.is_empty());
    let mut projection = Projection::default();
    let mut joins = JoinSet::default();

    for field in fields {
        let selected = match summary {
            Some(names) => names.iter().any(|name| field.matches(table, name)),
            None => field.enabled(options),
        };

        if field.is_joined(table) && (selected || (field.hidden && field.enabled(options))) {
            joins.add(field, table);
        }

        if !selected || field.hidden {
            continue;
        }

        let expr = column_expr(field);
        projection
            .columns
            .push(format!("{} AS {}", expr, field.alias()));
        if summary.is_some() {
            projection.group_by.push(expr);
        }
    }

    if summary.is_some() {
        projection
            .columns
            .push(format!("COUNT(*) AS {}", COUNT_ALIAS));
    }
    projection.joins = joins.into_clauses();
    projection
}

/// Narrow projection for existence checks: the first numeric `key` column,
/// and for non-token entities the first `id` column.
pub fn compile_search(fields: &[FieldSpec], table: &str, token_entity: bool) -> Projection {
    let mut projection = Projection::default();
    let mut joins = JoinSet::default();

    if let Some(key) = fields
        .iter()
        .find(|f| f.name == "key" && f.kind == FieldType::Int)
    {
        projection
            .columns
            .push(format!("{} AS {}", key.qualified(), key.alias()));
    }
    if !token_entity {
        if let Some(id) = fields.iter().find(|f| f.name == "id") {
            projection
                .columns
                .push(format!("{} AS {}", id.qualified(), id.alias()));
        }
    }

    for field in fields {
        if field.is_joined(table) && field.option.is_none() {
            joins.add(field, table);
        }
    }
    projection.joins = joins.into_clauses();
    projection
}

/// Compile a `RETURNING …` clause.
///
/// `RETURNING` cannot see joined tables, so cross-table fields become
/// correlated single-row subqueries. Returns an empty string when no field is
/// projected.
pub fn compile_returning(fields: &[FieldSpec], table: &str, options: &FieldOptions) -> String {
    if fields.is_empty() {
        return String::new();
    }

    let columns: Vec<String> = fields
        .iter()
        .filter(|f| !f.hidden && f.enabled(options))
        .map(|field| {
            if field.is_joined(table) {
                format!("({}) AS {}", correlated_subquery(field, table), field.alias())
            } else {
                format!("{} AS {}", column_expr(field), field.alias())
            }
        })
        .collect();

    if columns.is_empty() {
        return String::new();
    }
    format!("RETURNING {}", columns.join(", "))
}

/// Value expression of a field, without alias.
pub(crate) fn column_expr(field: &FieldSpec) -> String {
    let base = if field.tags {
        tag_expr(field)
    } else if let Some(expr) = field.expression {
        expr.to_string()
    } else {
        field.qualified()
    };

    match field.kind {
        FieldType::Time => format!("EXTRACT(EPOCH FROM {})::BIGINT", base),
        _ => base,
    }
}

/// Active `key:value` tags owned by the field's own table.
fn tag_expr(field: &FieldSpec) -> String {
    let owner_column = field.join_column.unwrap_or("id");
    format!(
        "ARRAY(SELECT {t}.key || ':' || {t}.value FROM {t} WHERE {t}.namespace = '{ns}' \
         AND {t}.resource_id = {owner}.{col} AND {t}.status = 'active' ORDER BY {t}.key)",
        t = TAGS_TABLE,
        ns = strip_quotes(field.table),
        owner = field.table,
        col = owner_column,
    )
}

fn correlated_subquery(field: &FieldSpec, primary: &str) -> String {
    format!(
        "SELECT {} FROM {} WHERE {}.{} = {}.{} LIMIT 1",
        column_expr(field),
        from_target(field),
        field.table,
        field.join_key.unwrap_or("id"),
        primary,
        field.join_column.unwrap_or("id"),
    )
}

/// `source alias` when the field reads through an alias, else the table itself.
fn from_target(field: &FieldSpec) -> String {
    match field.source {
        Some(source) if source != field.table => format!("{} {}", source, field.table),
        _ => field.table.to_string(),
    }
}

/// Ordered, deduplicated join clauses; required joins precede optional ones.
#[derive(Default)]
struct JoinSet {
    required: Vec<String>,
    optional: Vec<String>,
}

impl JoinSet {
    fn add(&mut self, field: &FieldSpec, primary: &str) {
        let on = format!(
            "{} ON {}.{} = {}.{}",
            from_target(field),
            field.table,
            field.join_key.unwrap_or("id"),
            primary,
            field.join_column.unwrap_or("id"),
        );
        let (bucket, clause) = if field.required {
            (&mut self.required, format!("INNER JOIN {}", on))
        } else {
            (&mut self.optional, format!("LEFT JOIN {}", on))
        };
        if !bucket.contains(&clause) {
            bucket.push(clause);
        }
    }

    fn into_clauses(self) -> Vec<String> {
        let mut clauses = self.required;
        for clause in self.optional {
            // A field required elsewhere already joined this table.
            let inner = clause.replacen("LEFT JOIN", "INNER JOIN", 1);
            if !clauses.contains(&inner) {
                clauses.push(clause);
            }
        }
        clauses
    }
}
