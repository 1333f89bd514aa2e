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

//! Conversion from Iceberg types to Arrow types.
//!
//! Output columns are always nullable: a column missing from a data file
//! reads as nulls whatever its declared nullability. Map keys are the only
//! non-nullable fields.

use std::collections::HashMap;
use std::sync::Arc;

use arrow_array::types::{validate_decimal_precision_and_scale, Decimal128Type};
use arrow_schema::{DataType, Field, Fields, Schema as ArrowSchema, SchemaRef, TimeUnit};
use parquet::arrow::PARQUET_FIELD_ID_META_KEY;

use crate::scan::ColumnHandle;
use crate::spec::{NestedField, PrimitiveType, Type};
use crate::{Error, ErrorKind, Result};

/// When iceberg map type convert to Arrow map type, the default map field name is "key_value".
pub const DEFAULT_MAP_FIELD_NAME: &str = "key_value";
/// UTC time zone for Arrow timestamp type.
pub const UTC_TIME_ZONE: &str = "+00:00";

/// Reads the Iceberg field id an Arrow field carries in its metadata.
pub(crate) fn get_field_id(field: &Field) -> Result<Option<i32>> {
    let Some(value) = field.metadata().get(PARQUET_FIELD_ID_META_KEY) else {
        return Ok(None);
    };
    value.parse::<i32>().map(Some).map_err(|e| {
        Error::new(ErrorKind::DataInvalid, "Failed to parse field id")
            .with_context("value", value)
            .with_source(e)
    })
}

fn with_field_id(field: Field, id: i32) -> Field {
    field.with_metadata(HashMap::from([(
        PARQUET_FIELD_ID_META_KEY.to_string(),
        id.to_string(),
    )]))
}

/// Converts an Iceberg field into a nullable Arrow field tagged with its id.
pub fn field_to_arrow_field(field: &NestedField) -> Result<Field> {
    let data_type = type_to_arrow_type(&field.field_type)?;
    Ok(with_field_id(
        Field::new(field.name.clone(), data_type, true),
        field.id,
    ))
}

fn primitive_to_arrow_type(p: &PrimitiveType) -> Result<DataType> {
    Ok(match p {
        PrimitiveType::Boolean => DataType::Boolean,
        PrimitiveType::Int => DataType::Int32,
        PrimitiveType::Long => DataType::Int64,
        PrimitiveType::Float => DataType::Float32,
        PrimitiveType::Double => DataType::Float64,
        PrimitiveType::Decimal { precision, scale } => {
            let precision: u8 = (*precision).try_into().map_err(|err| {
                Error::new(
                    ErrorKind::DataInvalid,
                    "incompatible precision for decimal type convert",
                )
                .with_source(err)
            })?;
            let scale: i8 = (*scale).try_into().map_err(|err| {
                Error::new(
                    ErrorKind::DataInvalid,
                    "incompatible scale for decimal type convert",
                )
                .with_source(err)
            })?;
            validate_decimal_precision_and_scale::<Decimal128Type>(precision, scale).map_err(
                |err| {
                    Error::new(
                        ErrorKind::DataInvalid,
                        "incompatible precision and scale for decimal type convert",
                    )
                    .with_source(err)
                },
            )?;
            DataType::Decimal128(precision, scale)
        }
        PrimitiveType::Date => DataType::Date32,
        PrimitiveType::Time => DataType::Time64(TimeUnit::Microsecond),
        PrimitiveType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
        // Timestamptz is always stored as UTC
        PrimitiveType::Timestamptz => {
            DataType::Timestamp(TimeUnit::Microsecond, Some(UTC_TIME_ZONE.into()))
        }
        PrimitiveType::String => DataType::Utf8,
        PrimitiveType::Uuid => DataType::FixedSizeBinary(16),
        PrimitiveType::Fixed(len) => DataType::FixedSizeBinary(i32::try_from(*len)?),
        PrimitiveType::Binary => DataType::LargeBinary,
    })
}

/// Convert iceberg type to an arrow type.
pub fn type_to_arrow_type(ty: &Type) -> Result<DataType> {
    match ty {
        Type::Primitive(p) => primitive_to_arrow_type(p),
        Type::Struct(s) => Ok(DataType::Struct(
            s.fields()
                .iter()
                .map(|f| field_to_arrow_field(f))
                .collect::<Result<Fields>>()?,
        )),
        Type::List(list) => Ok(DataType::List(Arc::new(field_to_arrow_field(
            &list.element_field,
        )?))),
        Type::Map(map) => {
            let key = with_field_id(
                Field::new(
                    map.key_field.name.clone(),
                    type_to_arrow_type(&map.key_field.field_type)?,
                    false,
                ),
                map.key_field.id,
            );
            let value = field_to_arrow_field(&map.value_field)?;
            let entries = Field::new(
                DEFAULT_MAP_FIELD_NAME,
                DataType::Struct(vec![key, value].into()),
                // Map field is always not nullable
                false,
            );
            Ok(DataType::Map(Arc::new(entries), false))
        }
    }
}

/// The Arrow schema of batches holding `columns`, in order.
pub fn columns_to_arrow_schema(columns: &[ColumnHandle]) -> Result<SchemaRef> {
    let fields = columns
        .iter()
        .map(|c| {
            let data_type = type_to_arrow_type(c.field_type())?;
            Ok(with_field_id(
                Field::new(c.qualified_name(), data_type, true),
                c.id(),
            ))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Arc::new(ArrowSchema::new(fields)))
}
