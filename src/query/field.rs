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

//! Declarative column metadata.
//!
//! Every persisted entity describes its columns once as a `static` slice of
//! [`FieldSpec`]. The compilers in this module turn that description into SQL
//! fragments; nothing here ever sees a caller-supplied value.

use std::collections::HashSet;

/// Semantic type of a column, drives projection and decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    Time,
    Array,
    Json,
}

/// Caller-requested toggle that widens the projected columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldOption {
    /// Include nested creator/updater details
    Detail,
}

impl FieldOption {
    pub const ALL: [FieldOption; 1] = [FieldOption::Detail];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldOption::Detail => "detail",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL
            .into_iter()
            .find(|opt| opt.as_str().eq_ignore_ascii_case(value))
    }
}

/// Set of options requested by a caller. Membership is all that matters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldOptions(HashSet<FieldOption>);

impl FieldOptions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with(mut self, option: FieldOption) -> Self {
        self.0.insert(option);
        self
    }

    pub fn contains(&self, option: FieldOption) -> bool {
        self.0.contains(&option)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse request key/value pairs.
    ///
    /// Accepts `options=detail,other` lists as well as `detail=true` flags.
    /// Unknown keys and option names are ignored.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut options = Self::none();
        for (key, value) in pairs {
            if key.eq_ignore_ascii_case("options") || key.eq_ignore_ascii_case("option") {
                options
                    .0
                    .extend(value.split(',').filter_map(FieldOption::parse));
            } else if let Some(option) = FieldOption::parse(key) {
                if is_truthy(value) {
                    options.0.insert(option);
                }
            }
        }
        options
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "" | "1" | "true" | "yes" | "on"
    )
}

/// Metadata for one persisted column.
///
/// `table` is the table (or join alias) the value is read from. When it
/// differs from the query's primary table and `join_key` is set, the field
/// pulls in a join: `table.join_key = primary.join_column`, reading from
/// `source` when the alias names a different physical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldType,
    pub table: &'static str,
    pub source: Option<&'static str>,
    pub join_key: Option<&'static str>,
    pub join_column: Option<&'static str>,
    pub required: bool,
    pub expression: Option<&'static str>,
    pub option: Option<FieldOption>,
    pub search: &'static [&'static str],
    pub hidden: bool,
    pub primary: bool,
    pub tags: bool,
}

impl FieldSpec {
    pub const fn new(name: &'static str, kind: FieldType, table: &'static str) -> Self {
        Self {
            name,
            kind,
            table,
            source: None,
            join_key: None,
            join_column: None,
            required: false,
            expression: None,
            option: None,
            search: &[],
            hidden: false,
            primary: false,
            tags: false,
        }
    }

    pub const fn source(self, table: &'static str) -> Self {
        Self {
            source: Some(table),
            ..self
        }
    }

    pub const fn join(self, key: &'static str, column: &'static str) -> Self {
        Self {
            join_key: Some(key),
            join_column: Some(column),
            ..self
        }
    }

    pub const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    pub const fn expression(self, expression: &'static str) -> Self {
        Self {
            expression: Some(expression),
            ..self
        }
    }

    pub const fn option(self, option: FieldOption) -> Self {
        Self {
            option: Some(option),
            ..self
        }
    }

    pub const fn search(self, names: &'static [&'static str]) -> Self {
        Self {
            search: names,
            ..self
        }
    }

    pub const fn hidden(self) -> Self {
        Self {
            hidden: true,
            ..self
        }
    }

    pub const fn primary(self) -> Self {
        Self {
            primary: true,
            ..self
        }
    }

    pub const fn tags(self) -> Self {
        Self {
            tags: true,
            kind: FieldType::Array,
            ..self
        }
    }

    /// `table.name`
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.table, self.name)
    }

    /// Output column label, always a valid unquoted identifier.
    pub fn alias(&self) -> String {
        format!("{}_{}", strip_quotes(self.table), self.name)
    }

    /// Cross-table field that contributes a join against `primary`.
    pub fn is_joined(&self, primary: &str) -> bool {
        self.table != primary && self.join_key.is_some()
    }

    /// Whether the caller's options allow this field.
    pub fn enabled(&self, options: &FieldOptions) -> bool {
        self.option.map_or(true, |opt| options.contains(opt))
    }

    /// Match a requested name: bare name on the primary table, `table.name`,
    /// or one of the alternate search names.
    pub fn matches(&self, primary: &str, wanted: &str) -> bool {
        let wanted = wanted.trim();
        if wanted == self.name && self.table == primary {
            return true;
        }
        if let Some((table, name)) = wanted.split_once('.') {
            if name == self.name
                && (table == self.table || strip_quotes(table) == strip_quotes(self.table))
            {
                return true;
            }
        }
        self.search.iter().any(|alt| *alt == wanted)
    }

    /// Label used for this field in generic result maps.
    pub fn label(&self, primary: &str) -> String {
        if self.table == primary {
            self.name.to_string()
        } else {
            format!("{}.{}", strip_quotes(self.table), self.name)
        }
    }
}

/// Remove identifier quoting characters.
pub fn strip_quotes(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| !matches!(c, '"' | '`' | '[' | ']'))
        .collect()
}
