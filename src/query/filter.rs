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

// WHERE-clause compiler: placeholders in SQL, values returned for binding

use crate::core::errors::IdentityError;
use crate::query::field::{FieldSpec, FieldType};

/// Typed value to bind against a `$n` placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Seconds since the Unix epoch
    Time(i64),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    pub conditions: Vec<String>,
    pub values: Vec<FilterValue>,
}

impl Filter {
    /// `WHERE a AND b`, empty when there are no conditions.
    pub fn where_clause(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Append a caller-built condition whose placeholders start at `next_placeholder`.
    pub fn and(mut self, condition: impl Into<String>, values: Vec<FilterValue>) -> Self {
        self.conditions.push(condition.into());
        self.values.extend(values);
        self
    }

    pub fn next_placeholder(&self, first_placeholder: usize) -> usize {
        first_placeholder + self.values.len()
    }
}

/// Compile request key/value pairs into equality conditions.
///
/// Keys match a field by name, `table.name`, or alternate search name.
/// Unknown keys are ignored so option flags can share the same pairs.
/// Placeholders are numbered from `first_placeholder`.
pub fn compile_filter<'a, I>(
    fields: &[FieldSpec],
    table: &str,
    pairs: I,
    first_placeholder: usize,
) -> Result<Filter, IdentityError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut filter = Filter::default();

    for (key, raw) in pairs {
        let Some(field) = fields.iter().find(|f| f.matches(table, key)) else {
            continue;
        };
        if field.tags || matches!(field.kind, FieldType::Array | FieldType::Json) {
            return Err(IdentityError::InvalidParameter(format!(
                "field '{}' cannot be filtered",
                key
            )));
        }

        let placeholder = filter.next_placeholder(first_placeholder);
        let column = field
            .expression
            .map(str::to_string)
            .unwrap_or_else(|| field.qualified());
        let value = parse_value(field, key, raw)?;

        let condition = match field.kind {
            FieldType::Time => format!("{} = to_timestamp(${}::float8)", column, placeholder),
            _ => format!("{} = ${}", column, placeholder),
        };
        filter.conditions.push(condition);
        filter.values.push(value);
    }

    Ok(filter)
}

fn parse_value(field: &FieldSpec, key: &str, raw: &str) -> Result<FilterValue, IdentityError> {
    let invalid = || IdentityError::InvalidParameter(format!("invalid value for '{}'", key));
    let raw = raw.trim();

    Ok(match field.kind {
        FieldType::String => FilterValue::Text(raw.to_string()),
        FieldType::Int => FilterValue::Int(raw.parse().map_err(|_| invalid())?),
        FieldType::Float => FilterValue::Float(raw.parse().map_err(|_| invalid())?),
        FieldType::Bool => FilterValue::Bool(raw.parse().map_err(|_| invalid())?),
        FieldType::Time => FilterValue::Time(raw.parse().map_err(|_| invalid())?),
        FieldType::Array | FieldType::Json => return Err(invalid()),
    })
}
