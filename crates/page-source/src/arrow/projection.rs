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

//! Projection of requested columns onto the columns a reader decodes.

use std::collections::HashMap;

use arrow_array::{ArrayRef, RecordBatch, RecordBatchOptions};
use arrow_schema::SchemaRef;

use super::conform::dereference;
use crate::scan::ColumnHandle;
use crate::spec::Type;
use crate::{Error, ErrorKind, Result};

/// Columns a reader decodes, and the decoded column each requested column
/// is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderColumns {
    reader_columns: Vec<ColumnHandle>,
    output_column_mapping: Vec<usize>,
}

impl ReaderColumns {
    /// Distinct columns to decode, in order of first use.
    pub fn reader_columns(&self) -> &[ColumnHandle] {
        &self.reader_columns
    }

    /// For every requested column, the index of the decoded column it comes from.
    pub fn output_column_mapping(&self) -> &[usize] {
        &self.output_column_mapping
    }

    fn build<'a>(
        columns: &'a [ColumnHandle],
        read_column: impl Fn(&'a ColumnHandle) -> ColumnHandle,
    ) -> Self {
        let mut reader_columns = Vec::new();
        let mut index_of = HashMap::new();
        let output_column_mapping = columns
            .iter()
            .map(|column| {
                let read = read_column(column);
                *index_of.entry(read.clone()).or_insert_with(|| {
                    reader_columns.push(read);
                    reader_columns.len() - 1
                })
            })
            .collect();
        Self {
            reader_columns,
            output_column_mapping,
        }
    }
}

/// Projects `columns` onto their base columns.
///
/// Returns `None` when every column is already a base column.
pub fn project_base_columns(columns: &[ColumnHandle]) -> Option<ReaderColumns> {
    if columns.iter().all(ColumnHandle::is_base_column) {
        return None;
    }
    Some(ReaderColumns::build(columns, ColumnHandle::base_column))
}

/// Projects `columns` onto the fewest columns sufficient to derive them all.
///
/// A nested column is read through the shortest requested column whose
/// dereference path is a prefix of its own, so `a.b` and `a.b.c` are read
/// once as `a.b`. Returns `None` when every column is already a base column.
pub fn project_sufficient_columns(columns: &[ColumnHandle]) -> Option<ReaderColumns> {
    if columns.iter().all(ColumnHandle::is_base_column) {
        return None;
    }
    Some(ReaderColumns::build(columns, |column| {
        columns
            .iter()
            .filter(|c| c.base_id() == column.base_id() && column.path().starts_with(c.path()))
            .min_by_key(|c| c.path().len())
            .unwrap_or(column)
            .clone()
    }))
}

/// Rebuilds batches of reader columns into batches of requested columns.
#[derive(Debug, Clone)]
pub struct Reprojector {
    // Decoded column index and struct field names below it, per output column.
    sources: Vec<(usize, Vec<String>)>,
    schema: SchemaRef,
}

impl Reprojector {
    /// Creates a reprojector producing `columns` laid out as `schema` from
    /// batches of `reader.reader_columns()`.
    pub fn try_new(reader: &ReaderColumns, columns: &[ColumnHandle], schema: SchemaRef) -> Result<Self> {
        let sources = columns
            .iter()
            .zip(reader.output_column_mapping())
            .map(|(column, index)| {
                let read = &reader.reader_columns()[*index];
                let suffix = column.path().strip_prefix(read.path()).ok_or_else(|| {
                    Error::new(
                        ErrorKind::Unexpected,
                        format!("Column {column} can't be derived from {read}"),
                    )
                })?;
                Ok((*index, suffix_names(read.field_type(), suffix)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { sources, schema })
    }

    /// Projects a batch of decoded reader columns.
    pub fn project(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let columns = self
            .sources
            .iter()
            .map(|(index, names)| dereference(batch.column(*index), names))
            .collect::<Result<Vec<ArrayRef>>>()?;
        Ok(RecordBatch::try_new_with_options(
            self.schema.clone(),
            columns,
            &RecordBatchOptions::new().with_row_count(Some(batch.num_rows())),
        )?)
    }
}

fn suffix_names(mut field_type: &Type, ids: &[i32]) -> Result<Vec<String>> {
    let mut names = Vec::with_capacity(ids.len());
    for id in ids {
        let field = field_type
            .as_struct_type()
            .and_then(|s| s.field_by_id(*id))
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::Unexpected,
                    format!("Field {id} is not a struct field of {field_type}"),
                )
            })?;
        names.push(field.name.clone());
        field_type = &field.field_type;
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow_array::cast::AsArray;
    use arrow_array::types::Int32Type;
    use arrow_array::{Int32Array, StringArray, StructArray};
    use arrow_schema::{DataType, Field, Schema as ArrowSchema};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::arrow::{columns_to_arrow_schema, type_to_arrow_type};
    use crate::spec::{NestedField, NestedFieldRef, PrimitiveType, StructType};

    fn a() -> NestedFieldRef {
        Arc::new(NestedField::optional(
            1,
            "a",
            Type::Struct(StructType::new(vec![
                Arc::new(NestedField::optional(
                    2,
                    "b",
                    Type::Struct(StructType::new(vec![Arc::new(NestedField::optional(
                        3,
                        "c",
                        PrimitiveType::Int.into(),
                    ))])),
                )),
                Arc::new(NestedField::optional(4, "d", PrimitiveType::String.into())),
            ])),
        ))
    }

    fn x() -> ColumnHandle {
        ColumnHandle::from_field(Arc::new(NestedField::required(
            5,
            "x",
            PrimitiveType::Long.into(),
        )))
    }

    #[test]
    fn test_base_columns_need_no_projection() {
        let columns = vec![ColumnHandle::from_field(a()), x(), ColumnHandle::from_field(a())];
        assert_eq!(project_base_columns(&columns), None);
        assert_eq!(project_sufficient_columns(&columns), None);
        assert_eq!(project_base_columns(&[]), None);
    }

    #[test]
    fn test_project_base_columns() {
        let ab = ColumnHandle::nested(a(), vec![2]).unwrap();
        let ad = ColumnHandle::nested(a(), vec![4]).unwrap();
        let projection = project_base_columns(&[ab, x(), ad]).unwrap();
        assert_eq!(projection.reader_columns(), &[
            ColumnHandle::from_field(a()),
            x()
        ]);
        assert_eq!(projection.output_column_mapping(), &[0, 1, 0]);
    }

    #[test]
    fn test_sufficient_columns_share_prefix() {
        let ab = ColumnHandle::nested(a(), vec![2]).unwrap();
        let abc = ColumnHandle::nested(a(), vec![2, 3]).unwrap();
        let ad = ColumnHandle::nested(a(), vec![4]).unwrap();
        let projection = project_sufficient_columns(&[ab.clone(), abc, ad.clone()]).unwrap();
        assert_eq!(projection.reader_columns(), &[ab, ad]);
        assert_eq!(projection.output_column_mapping(), &[0, 0, 1]);
    }

    #[test]
    fn test_sufficient_columns_prefer_base_column() {
        let abc = ColumnHandle::nested(a(), vec![2, 3]).unwrap();
        let base = ColumnHandle::from_field(a());
        let projection = project_sufficient_columns(&[abc, base.clone()]).unwrap();
        assert_eq!(projection.reader_columns(), &[base]);
        assert_eq!(projection.output_column_mapping(), &[0, 0]);
    }

    #[test]
    fn test_reproject_nested_columns() {
        let ab = ColumnHandle::nested(a(), vec![2]).unwrap();
        let abc = ColumnHandle::nested(a(), vec![2, 3]).unwrap();
        let ad = ColumnHandle::nested(a(), vec![4]).unwrap();
        let requested = vec![ab.clone(), abc, ad.clone()];
        let projection = project_sufficient_columns(&requested).unwrap();

        let DataType::Struct(c_fields) = type_to_arrow_type(ab.field_type()).unwrap() else {
            unreachable!()
        };
        let b: ArrayRef = Arc::new(StructArray::new(
            c_fields,
            vec![Arc::new(Int32Array::from(vec![10, 20]))],
            None,
        ));
        let d: ArrayRef = Arc::new(StringArray::from(vec!["p", "q"]));
        let decoded = RecordBatch::try_new(
            Arc::new(ArrowSchema::new(vec![
                Field::new("a.b", b.data_type().clone(), true),
                Field::new("a.d", DataType::Utf8, true),
            ])),
            vec![b, d],
        )
        .unwrap();

        let schema = columns_to_arrow_schema(&requested).unwrap();
        let reprojector = Reprojector::try_new(&projection, &requested, schema).unwrap();
        let batch = reprojector.project(&decoded).unwrap();
        assert_eq!(batch.num_columns(), 3);
        assert_eq!(
            batch.column(1).as_primitive::<Int32Type>(),
            &Int32Array::from(vec![10, 20])
        );
        assert_eq!(batch.column(2).as_string::<i32>(), &StringArray::from(vec!["p", "q"]));
    }
}
