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

//! Decoder for rows produced by a summary projection.

use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::core::errors::IdentityError;
use crate::query::compiler::COUNT_ALIAS;
use crate::query::field::{FieldSpec, FieldType};

/// Typed slot a summary column is scanned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Text,
    Array,
    Bool,
    Float,
    Int,
    /// Time columns arrive as epoch seconds
    TimeAsInt,
    Json,
    Count,
}

impl From<FieldType> for Destination {
    fn from(kind: FieldType) -> Self {
        match kind {
            FieldType::String => Destination::Text,
            FieldType::Array => Destination::Array,
            FieldType::Bool => Destination::Bool,
            FieldType::Float => Destination::Float,
            FieldType::Int => Destination::Int,
            FieldType::Time => Destination::TimeAsInt,
            FieldType::Json => Destination::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryColumn {
    pub label: String,
    pub destination: Destination,
}

/// Scans summary rows into generic maps keyed by field label.
///
/// Column order matches `compile_projection` for the same inputs: matched
/// visible fields in declaration order, then the count.
#[derive(Debug, Clone)]
pub struct SummaryDecoder {
    columns: Vec<SummaryColumn>,
}

impl SummaryDecoder {
    pub fn new(fields: &[FieldSpec], table: &str, summary: &[String]) -> Self {
        let mut columns: Vec<SummaryColumn> = fields
            .iter()
            .filter(|f| !f.hidden && summary.iter().any(|name| f.matches(table, name)))
            .map(|f| SummaryColumn {
                label: f.label(table),
                destination: f.kind.into(),
            })
            .collect();
        columns.push(SummaryColumn {
            label: COUNT_ALIAS.to_string(),
            destination: Destination::Count,
        });
        Self { columns }
    }

    pub fn columns(&self) -> &[SummaryColumn] {
        &self.columns
    }

    pub fn decode(&self, row: &PgRow) -> Result<Map<String, Value>, IdentityError> {
        let mut out = Map::with_capacity(self.columns.len());
        for (idx, column) in self.columns.iter().enumerate() {
            let value = match column.destination {
                Destination::Text => row
                    .try_get::<Option<String>, _>(idx)?
                    .map_or(Value::Null, Value::String),
                Destination::Array => row
                    .try_get::<Option<Vec<String>>, _>(idx)?
                    .map_or(Value::Null, |items| {
                        Value::Array(items.into_iter().map(Value::String).collect())
                    }),
                Destination::Bool => row
                    .try_get::<Option<bool>, _>(idx)?
                    .map_or(Value::Null, Value::Bool),
                Destination::Float => row
                    .try_get::<Option<f64>, _>(idx)?
                    .map_or(Value::Null, Value::from),
                Destination::Int | Destination::TimeAsInt | Destination::Count => row
                    .try_get::<Option<i64>, _>(idx)?
                    .map_or(Value::Null, Value::from),
                Destination::Json => row
                    .try_get::<Option<Value>, _>(idx)?
                    .unwrap_or(Value::Null),
            };
            out.insert(column.label.clone(), value);
        }
        Ok(out)
    }
}
