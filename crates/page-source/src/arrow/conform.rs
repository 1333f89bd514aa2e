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

//! Conforms decoded file columns to the Iceberg types requested by the table.

use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::{
    make_array, Array, ArrayRef, FixedSizeBinaryArray, ListArray, MapArray, RecordBatch,
    StructArray,
};
use arrow_buffer::NullBuffer;
use arrow_cast::cast;
use arrow_schema::{DataType, TimeUnit};

use super::reconcile::FileField;
use super::schema::type_to_arrow_type;
use super::value::create_constant_array;
use crate::spec::{NestedFieldRef, Type};
use crate::{Error, ErrorKind, Result};

/// Extracts a possibly nested column from a decoded batch by names.
pub(crate) fn extract_column(batch: &RecordBatch, names: &[&str]) -> Result<ArrayRef> {
    let (root, nested) = names.split_first().ok_or_else(|| {
        Error::new(ErrorKind::Unexpected, "Can't extract a column without a name")
    })?;
    let array = batch.column_by_name(root).ok_or_else(|| {
        Error::new(
            ErrorKind::Unexpected,
            format!("Column {root} was not decoded from the data file"),
        )
    })?;
    dereference(array, nested)
}

/// Walks struct children by name.
///
/// Nulls of every enclosing struct are folded into the returned column.
pub(crate) fn dereference<S: AsRef<str>>(array: &ArrayRef, names: &[S]) -> Result<ArrayRef> {
    if names.is_empty() {
        return Ok(array.clone());
    }

    let mut array = array.clone();
    let mut null_buffer = array.logical_nulls();
    for name in names {
        let name = name.as_ref();
        array = array
            .as_struct_opt()
            .and_then(|s| s.column_by_name(name))
            .cloned()
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::Unexpected,
                    format!("Struct field {name} is missing from the decoded column"),
                )
            })?;
        null_buffer = NullBuffer::union(null_buffer.as_ref(), array.logical_nulls().as_ref());
    }
    Ok(make_array(
        array.to_data().into_builder().nulls(null_buffer).build()?,
    ))
}

/// The column read for a field the file doesn't have: its initial default,
/// or nulls.
pub(crate) fn missing_column(field: &NestedFieldRef, num_rows: usize) -> Result<ArrayRef> {
    let data_type = type_to_arrow_type(&field.field_type)?;
    match (&field.initial_default, field.field_type.is_primitive()) {
        (Some(default), true) => create_constant_array(Some(default), &data_type, num_rows),
        _ => create_constant_array(None, &data_type, num_rows),
    }
}

/// Conforms a decoded column to `target`.
///
/// Struct children are matched by field id, absent children read as
/// missing. Primitive columns may only change type along Iceberg's
/// promotions. Binary columns read as fixed or uuid must hold values of the
/// exact width.
pub(crate) fn conform_array(array: &ArrayRef, file_field: &FileField, target: &Type) -> Result<ArrayRef> {
    match target {
        Type::Primitive(_) => conform_primitive(array, file_field, &type_to_arrow_type(target)?),
        Type::Struct(struct_type) => {
            let struct_array = array.as_struct_opt().ok_or_else(|| type_mismatch(array, file_field, target))?;
            let DataType::Struct(target_fields) = type_to_arrow_type(target)? else {
                return Err(Error::new(ErrorKind::Unexpected, "Struct type converted to a non-struct"));
            };

            let columns = struct_type
                .fields()
                .iter()
                .map(|field| {
                    let child = file_field
                        .children()
                        .iter()
                        .find(|c| c.id() == Some(field.id))
                        .and_then(|c| struct_array.column_by_name(c.name()).map(|a| (c, a)));
                    match child {
                        Some((child_field, child_array)) => {
                            conform_array(child_array, child_field, &field.field_type)
                        }
                        None => missing_column(field, struct_array.len()),
                    }
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(Arc::new(StructArray::try_new(
                target_fields,
                columns,
                struct_array.nulls().cloned(),
            )?))
        }
        Type::List(list_type) => {
            let array = match array.data_type() {
                DataType::LargeList(element) => {
                    cast(array, &DataType::List(element.clone()))?
                }
                _ => array.clone(),
            };
            let list = array.as_list_opt::<i32>().ok_or_else(|| type_mismatch(&array, file_field, target))?;
            let element = file_field.children().first().ok_or_else(|| type_mismatch(&array, file_field, target))?;
            let values = conform_array(list.values(), element, &list_type.element_field.field_type)?;
            let DataType::List(target_element) = type_to_arrow_type(target)? else {
                return Err(Error::new(ErrorKind::Unexpected, "List type converted to a non-list"));
            };
            Ok(Arc::new(ListArray::try_new(
                target_element,
                list.offsets().clone(),
                values,
                list.nulls().cloned(),
            )?))
        }
        Type::Map(map_type) => {
            let map = array.as_map_opt().ok_or_else(|| type_mismatch(array, file_field, target))?;
            let (Some(key_field), Some(value_field)) =
                (file_field.children().first(), file_field.children().get(1))
            else {
                return Err(type_mismatch(array, file_field, target));
            };
            let keys = conform_array(map.keys(), key_field, &map_type.key_field.field_type)?;
            let values = conform_array(map.values(), value_field, &map_type.value_field.field_type)?;

            let DataType::Map(entries_field, sorted) = type_to_arrow_type(target)? else {
                return Err(Error::new(ErrorKind::Unexpected, "Map type converted to a non-map"));
            };
            let DataType::Struct(kv_fields) = entries_field.data_type() else {
                return Err(Error::new(ErrorKind::Unexpected, "Map entries are not a struct"));
            };
            let entries = StructArray::try_new(kv_fields.clone(), vec![keys, values], None)?;
            Ok(Arc::new(MapArray::try_new(
                entries_field.clone(),
                map.offsets().clone(),
                entries,
                map.nulls().cloned(),
                sorted,
            )?))
        }
    }
}

fn type_mismatch(array: &ArrayRef, file_field: &FileField, target: &Type) -> Error {
    Error::new(
        ErrorKind::DataInvalid,
        format!(
            "Column {} of type {} can't be read as {target}",
            file_field.name(),
            array.data_type()
        ),
    )
}

fn promotable(from: &DataType, to: &DataType) -> bool {
    match (from, to) {
        (DataType::Int8 | DataType::Int16, DataType::Int32 | DataType::Int64) => true,
        (DataType::Int32, DataType::Int64) => true,
        (DataType::Float32, DataType::Float64) => true,
        (DataType::Decimal128(p1, s1), DataType::Decimal128(p2, s2)) => s1 == s2 && p1 <= p2,
        (DataType::LargeUtf8, DataType::Utf8) => true,
        (DataType::Binary, DataType::LargeBinary) => true,
        (DataType::Time32(_) | DataType::Time64(_), DataType::Time64(TimeUnit::Microsecond)) => {
            true
        }
        // Avro timestamps carry no zone; their values are already UTC.
        (DataType::Timestamp(_, from_tz), DataType::Timestamp(TimeUnit::Microsecond, to_tz)) => {
            from_tz.is_none() || to_tz.is_some()
        }
        _ => false,
    }
}

fn conform_primitive(array: &ArrayRef, file_field: &FileField, target: &DataType) -> Result<ArrayRef> {
    let from = array.data_type();
    if from == target {
        return Ok(array.clone());
    }
    match (from, target) {
        (DataType::Binary | DataType::LargeBinary, DataType::FixedSizeBinary(width)) => {
            binary_to_fixed(array, file_field, *width)
        }
        (from, to) if promotable(from, to) => Ok(cast(array, to)?),
        (from, to) => Err(Error::new(
            ErrorKind::DataInvalid,
            format!(
                "Column {} of type {from} can't be read as {to}",
                file_field.name()
            ),
        )),
    }
}

// Fixed width values (and uuids) stored as plain binary must all have the exact width.
fn binary_to_fixed(array: &ArrayRef, file_field: &FileField, width: i32) -> Result<ArrayRef> {
    let values: Vec<Option<&[u8]>> = match array.data_type() {
        DataType::Binary => array.as_binary::<i32>().iter().collect(),
        _ => array.as_binary::<i64>().iter().collect(),
    };
    let expected = usize::try_from(width)?;
    if let Some(bad) = values.iter().flatten().find(|v| v.len() != expected) {
        return Err(Error::new(
            ErrorKind::DataInvalid,
            format!(
                "Column {} holds a {} byte value where {width} bytes are expected",
                file_field.name(),
                bad.len()
            ),
        ));
    }
    Ok(Arc::new(FixedSizeBinaryArray::try_from_sparse_iter_with_size(
        values.into_iter(),
        width,
    )?))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use arrow_array::{BinaryArray, Int32Array, Int64Array, StringArray};
    use arrow_schema::{Field, Fields, Schema as ArrowSchema};
    use parquet::arrow::PARQUET_FIELD_ID_META_KEY;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::arrow::reconcile::FileFields;
    use crate::spec::{NestedField, PrimitiveType, StructType};

    fn with_id(field: Field, id: i32) -> Field {
        field.with_metadata(HashMap::from([(
            PARQUET_FIELD_ID_META_KEY.to_string(),
            id.to_string(),
        )]))
    }

    fn file_field(field: Field) -> FileField {
        FileFields::from_parquet_schema(&ArrowSchema::new(vec![field]))
            .unwrap()
            .fields()[0]
            .clone()
    }

    #[test]
    fn test_int_promoted_to_long() {
        let field = file_field(with_id(Field::new("a", DataType::Int32, true), 1));
        let array: ArrayRef = Arc::new(Int32Array::from(vec![Some(1), None, Some(3)]));
        let conformed = conform_array(&array, &field, &PrimitiveType::Long.into()).unwrap();
        assert_eq!(
            conformed.as_primitive::<arrow_array::types::Int64Type>(),
            &Int64Array::from(vec![Some(1), None, Some(3)])
        );
    }

    #[test]
    fn test_narrowing_is_rejected() {
        let field = file_field(with_id(Field::new("a", DataType::Int64, true), 1));
        let array: ArrayRef = Arc::new(Int64Array::from(vec![1]));
        let err = conform_array(&array, &field, &PrimitiveType::Int.into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);
    }

    #[test]
    fn test_binary_as_uuid_requires_exact_width() {
        let field = file_field(with_id(Field::new("u", DataType::Binary, true), 1));
        let good: ArrayRef = Arc::new(BinaryArray::from(vec![Some(&[7u8; 16][..]), None]));
        let conformed = conform_array(&good, &field, &PrimitiveType::Uuid.into()).unwrap();
        assert_eq!(conformed.data_type(), &DataType::FixedSizeBinary(16));
        assert_eq!(conformed.null_count(), 1);

        let bad: ArrayRef = Arc::new(BinaryArray::from(vec![&[1u8, 2][..]]));
        let err = conform_array(&bad, &field, &PrimitiveType::Uuid.into()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);
    }

    #[test]
    fn test_struct_children_matched_by_id() {
        let file_struct = with_id(
            Field::new(
                "s",
                DataType::Struct(Fields::from(vec![with_id(
                    Field::new("renamed", DataType::Utf8, true),
                    3,
                )])),
                true,
            ),
            1,
        );
        let field = file_field(file_struct.clone());
        let DataType::Struct(fields) = file_struct.data_type() else {
            unreachable!()
        };
        let array: ArrayRef = Arc::new(StructArray::new(
            fields.clone(),
            vec![Arc::new(StringArray::from(vec!["x", "y"]))],
            None,
        ));

        let target: Type = StructType::new(vec![
            Arc::new(NestedField::optional(2, "added", PrimitiveType::Int.into())),
            Arc::new(NestedField::optional(3, "name", PrimitiveType::String.into())),
        ])
        .into();
        let conformed = conform_array(&array, &field, &target).unwrap();
        let conformed = conformed.as_struct();
        assert_eq!(conformed.column(0).null_count(), 2);
        assert_eq!(
            conformed.column(1).as_string::<i32>(),
            &StringArray::from(vec!["x", "y"])
        );
    }

    #[test]
    fn test_dereference_folds_parent_nulls() {
        let inner = Fields::from(vec![Field::new("c", DataType::Int32, true)]);
        let array: ArrayRef = Arc::new(StructArray::new(
            inner,
            vec![Arc::new(Int32Array::from(vec![1, 2, 3]))],
            Some(NullBuffer::from(vec![true, false, true])),
        ));
        let child = dereference(&array, &["c"]).unwrap();
        assert_eq!(
            child.as_primitive::<arrow_array::types::Int32Type>(),
            &Int32Array::from(vec![Some(1), None, Some(3)])
        );
    }
}
