// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! How each column a reader returns is produced.

use std::collections::HashMap;
use std::sync::Arc;

use arrow_array::{ArrayRef, Int64Array, RecordBatch, RecordBatchOptions};
use arrow_schema::SchemaRef;

use super::conform::{conform_array, extract_column, missing_column};
use super::reconcile::{FileField, FileFields};
use super::schema::{columns_to_arrow_schema, type_to_arrow_type};
use super::value::create_constant_array;
use crate::scan::{ColumnHandle, ColumnRole};
use crate::spec::Datum;
use crate::{Error, ErrorKind, Result};

/// How a column returned by a reader is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnAdaptation {
    /// The same value on every row.
    Constant(Datum),
    /// Nulls, or the initial default of a field missing from the file.
    Null,
    /// The position of each row in the data file.
    RowPosition,
    /// A column decoded from the data file.
    Source(SourceColumn),
}

/// A column decoded from the data file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceColumn {
    names: Vec<String>,
    file_field: FileField,
}

impl SourceColumn {
    /// Names from the decoded top level column down to this column.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The column in the file.
    pub fn file_field(&self) -> &FileField {
        &self.file_field
    }
}

/// Per split values the constant columns are built from.
#[derive(Debug, Clone, Default)]
pub(crate) struct SplitConstants {
    pub path: String,
    pub partition_keys: HashMap<i32, Option<String>>,
    pub partition_data_serialized: Option<String>,
    /// Modification time of the data file in microseconds, when fetched.
    pub file_modified_time: Option<i64>,
}

/// Builds reader batches from decoded file columns, one adaptation per column.
#[derive(Debug, Clone)]
pub(crate) struct ColumnAdapter {
    columns: Vec<ColumnHandle>,
    adaptations: Vec<ColumnAdaptation>,
    // Top level file columns to decode, in first use order.
    decoded_roots: Vec<FileField>,
    schema: SchemaRef,
}

impl ColumnAdapter {
    pub(crate) fn try_new(
        columns: &[ColumnHandle],
        fields: &FileFields,
        constants: &SplitConstants,
    ) -> Result<Self> {
        let mut decoded_roots: Vec<FileField> = Vec::new();
        let adaptations = columns
            .iter()
            .map(|column| adaptation(column, fields, constants, &mut decoded_roots))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            columns: columns.to_vec(),
            adaptations,
            decoded_roots,
            schema: columns_to_arrow_schema(columns)?,
        })
    }

    #[cfg(test)]
    pub(crate) fn adaptations(&self) -> &[ColumnAdaptation] {
        &self.adaptations
    }

    /// Top level file columns to decode, in first use order.
    pub(crate) fn decoded_roots(&self) -> &[FileField] {
        &self.decoded_roots
    }

    /// Parquet leaves holding the decoded columns.
    pub(crate) fn parquet_leaves(&self) -> Vec<usize> {
        let mut leaves: Vec<usize> = self
            .adaptations
            .iter()
            .filter_map(|a| match a {
                ColumnAdaptation::Source(source) => Some(source.file_field.leaves().iter().copied()),
                _ => None,
            })
            .flatten()
            .collect();
        leaves.sort_unstable();
        leaves.dedup();
        leaves
    }

    /// Builds a reader batch from decoded columns whose first row is at
    /// `start_position` in the data file.
    pub(crate) fn adapt(&self, decoded: &RecordBatch, start_position: u64) -> Result<RecordBatch> {
        let num_rows = decoded.num_rows();
        let arrays = self
            .columns
            .iter()
            .zip(&self.adaptations)
            .map(|(column, adaptation)| -> Result<ArrayRef> {
                match adaptation {
                    ColumnAdaptation::Constant(datum) => create_constant_array(
                        Some(datum),
                        &type_to_arrow_type(column.field_type())?,
                        num_rows,
                    ),
                    ColumnAdaptation::Null => missing_column(column.field(), num_rows),
                    ColumnAdaptation::RowPosition => {
                        let start = i64::try_from(start_position)?;
                        let end = start + i64::try_from(num_rows)?;
                        Ok(Arc::new(Int64Array::from_iter_values(start..end)))
                    }
                    ColumnAdaptation::Source(source) => {
                        let names: Vec<&str> = source.names.iter().map(String::as_str).collect();
                        let array = extract_column(decoded, &names)?;
                        conform_array(&array, &source.file_field, column.field_type())
                    }
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RecordBatch::try_new_with_options(
            self.schema.clone(),
            arrays,
            &RecordBatchOptions::new().with_row_count(Some(num_rows)),
        )?)
    }
}

fn adaptation(
    column: &ColumnHandle,
    fields: &FileFields,
    constants: &SplitConstants,
    decoded_roots: &mut Vec<FileField>,
) -> Result<ColumnAdaptation> {
    match column.role() {
        ColumnRole::IsDeleted => return Ok(ColumnAdaptation::Constant(Datum::bool(false))),
        ColumnRole::FilePath => return Ok(ColumnAdaptation::Constant(Datum::string(&constants.path))),
        ColumnRole::FileModifiedTime => {
            return Ok(constants
                .file_modified_time
                .map(|t| ColumnAdaptation::Constant(Datum::timestamptz_micros(t)))
                .unwrap_or(ColumnAdaptation::Null))
        }
        ColumnRole::Partition => {
            return Ok(constants
                .partition_data_serialized
                .as_ref()
                .map(|p| ColumnAdaptation::Constant(Datum::string(p)))
                .unwrap_or(ColumnAdaptation::Null))
        }
        ColumnRole::UpdateRowId | ColumnRole::MergeRowId => return Ok(ColumnAdaptation::Null),
        ColumnRole::RowPosition => return Ok(ColumnAdaptation::RowPosition),
        ColumnRole::Regular => {}
    }

    if column.is_base_column() {
        if let Some(value) = constants.partition_keys.get(&column.id()) {
            let Some(value) = value else {
                return Ok(ColumnAdaptation::Null);
            };
            let primitive = column.field_type().as_primitive_type().ok_or_else(|| {
                Error::new(
                    ErrorKind::DataInvalid,
                    format!("Partition column {column} is not of a primitive type"),
                )
            })?;
            return Ok(ColumnAdaptation::Constant(Datum::from_partition_value(
                primitive, value,
            )?));
        }
    }

    let Some(resolved) = fields.resolve(column) else {
        return Ok(ColumnAdaptation::Null);
    };
    if !decoded_roots.iter().any(|r| r.name() == resolved.root.name()) {
        decoded_roots.push(resolved.root.clone());
    }
    Ok(ColumnAdaptation::Source(SourceColumn {
        names: resolved.names.iter().map(|n| n.to_string()).collect(),
        file_field: resolved.field.clone(),
    }))
}
