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

//! Avro split reader.
//!
//! Avro object container files are decoded whole by the split starting at
//! offset zero. Values are converted to Arrow following the writer schema,
//! then conformed to the table types like any other format.

use std::io::Cursor;
use std::sync::Arc;

use apache_avro::types::Value;
use apache_avro::{Reader, Schema as AvroSchema};
use arrow_array::{
    ArrayRef, BinaryArray, BooleanArray, Date32Array, Decimal128Array, FixedSizeBinaryArray,
    Float32Array, Float64Array, Int32Array, Int64Array, ListArray, MapArray, RecordBatch,
    RecordBatchOptions, StringArray, StructArray, Time64MicrosecondArray,
    TimestampMicrosecondArray,
};
use arrow_buffer::{NullBuffer, OffsetBuffer};
use arrow_schema::{DataType, Field, Fields, Schema as ArrowSchema};
use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;

use super::{ReaderBatch, ReaderInput, ReaderPageSource};
use crate::arrow::adaptation::ColumnAdapter;
use crate::arrow::reconcile::{avro_non_null, FileFields};
use crate::scan::ColumnHandle;
use crate::spec::{LIST_FIELD_NAME, MAP_KEY_FIELD_NAME, MAP_VALUE_FIELD_NAME};
use crate::{Error, ErrorKind, Result};

/// Reads the rows of an Avro file.
///
/// Only the split starting at offset zero yields rows. No row position range
/// is reported: batch positions are the ordinals of the decoded rows.
///
/// # Panics
///
/// Avro columns are read whole: every column must be a base column.
pub(crate) async fn read_avro(input: ReaderInput) -> Result<ReaderPageSource> {
    assert!(
        input.columns.iter().all(ColumnHandle::is_base_column),
        "Avro files are read by base columns only"
    );

    let file = input.input.read().await.map_err(|e| input.open_error(e))?;
    let reader = Reader::new(Cursor::new(file))?;
    let writer_schema = reader.writer_schema().clone();

    let fields = input.reconcile(FileFields::from_avro(&writer_schema)?);
    let adapter = ColumnAdapter::try_new(&input.columns, &fields, &input.constants)?;
    if input.start != 0 {
        debug!(start = input.start, "Avro split doesn't start the file");
        return Ok(ReaderPageSource::empty());
    }

    let AvroSchema::Record(record) = &writer_schema else {
        return Err(Error::new(
            ErrorKind::DataInvalid,
            "Avro data file schema must be a record",
        ));
    };
    let roots: Vec<(String, AvroSchema)> = adapter
        .decoded_roots()
        .iter()
        .filter_map(|root| {
            record
                .fields
                .iter()
                .find(|f| f.name == root.name())
                .map(|f| (f.name.clone(), f.schema.clone()))
        })
        .collect();
    let batch_size = input.properties.batch_size.max(1);

    let stream: BoxStream<'static, Result<ReaderBatch>> = try_stream! {
        let mut position = 0u64;
        let mut rows = Vec::with_capacity(batch_size);
        for value in reader {
            rows.push(value?);
            if rows.len() == batch_size {
                let decoded = decode_rows(&rows, &roots)?;
                yield ReaderBatch {
                    batch: adapter.adapt(&decoded, position)?,
                    start_position: position,
                };
                position += rows.len() as u64;
                rows.clear();
            }
        }
        if !rows.is_empty() {
            let decoded = decode_rows(&rows, &roots)?;
            yield ReaderBatch {
                batch: adapter.adapt(&decoded, position)?,
                start_position: position,
            };
        }
    }
    .boxed();

    Ok(ReaderPageSource {
        stream,
        row_range: None,
    })
}

fn decode_rows(rows: &[Value], roots: &[(String, AvroSchema)]) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(roots.len());
    let mut columns = Vec::with_capacity(roots.len());
    for (name, schema) in roots {
        let values = rows
            .iter()
            .map(|row| record_field(row, name))
            .collect::<Vec<_>>();
        let array = to_array(&values, schema)?;
        fields.push(Field::new(name, array.data_type().clone(), true));
        columns.push(array);
    }
    Ok(RecordBatch::try_new_with_options(
        Arc::new(ArrowSchema::new(fields)),
        columns,
        &RecordBatchOptions::new().with_row_count(Some(rows.len())),
    )?)
}

fn non_null(value: &Value) -> Option<&Value> {
    match value {
        Value::Null => None,
        Value::Union(_, inner) => non_null(inner),
        value => Some(value),
    }
}

fn record_field<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    match non_null(value)? {
        Value::Record(fields) => fields
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| non_null(v)),
        _ => None,
    }
}

fn unexpected_value(value: &Value, schema: &AvroSchema) -> Error {
    Error::new(
        ErrorKind::DataInvalid,
        format!("Avro value {value:?} doesn't match schema {schema:?}"),
    )
}

macro_rules! primitive_array {
    ($values:expr, $schema:expr, $array:ty, $($pattern:pat => $value:expr),+ $(,)?) => {{
        let array = $values
            .iter()
            .map(|v| {
                v.map(|v| match v {
                    $($pattern => Ok($value),)+
                    other => Err(unexpected_value(other, $schema)),
                })
                .transpose()
            })
            .collect::<Result<$array>>()?;
        Arc::new(array) as ArrayRef
    }};
}

fn to_array(values: &[Option<&Value>], schema: &AvroSchema) -> Result<ArrayRef> {
    let schema = avro_non_null(schema);
    let values: Vec<Option<&Value>> = values.iter().map(|v| v.and_then(non_null)).collect();
    let nulls = || NullBuffer::from(values.iter().map(Option::is_some).collect::<Vec<_>>());

    Ok(match schema {
        AvroSchema::Boolean => primitive_array!(values, schema, BooleanArray, Value::Boolean(b) => *b),
        AvroSchema::Int => primitive_array!(values, schema, Int32Array, Value::Int(i) => *i),
        AvroSchema::Long => primitive_array!(values, schema, Int64Array, Value::Long(l) => *l),
        AvroSchema::Float => primitive_array!(values, schema, Float32Array, Value::Float(f) => *f),
        AvroSchema::Double => primitive_array!(values, schema, Float64Array, Value::Double(d) => *d),
        AvroSchema::String | AvroSchema::Enum(_) => primitive_array!(
            values, schema, StringArray,
            Value::String(s) => s.as_str(),
            Value::Enum(_, s) => s.as_str(),
        ),
        AvroSchema::Bytes => {
            primitive_array!(values, schema, BinaryArray, Value::Bytes(b) => b.as_slice())
        }
        AvroSchema::Date => primitive_array!(values, schema, Date32Array, Value::Date(d) => *d),
        AvroSchema::TimeMillis | AvroSchema::TimeMicros => primitive_array!(
            values, schema, Time64MicrosecondArray,
            Value::TimeMillis(t) => i64::from(*t) * 1000,
            Value::TimeMicros(t) => *t,
        ),
        AvroSchema::TimestampMillis | AvroSchema::TimestampMicros => primitive_array!(
            values, schema, TimestampMicrosecondArray,
            Value::TimestampMillis(t) => *t * 1000,
            Value::TimestampMicros(t) => *t,
        ),
        AvroSchema::Uuid => {
            let bytes = values
                .iter()
                .map(|v| {
                    v.map(|v| match v {
                        Value::Uuid(u) => Ok(u.into_bytes()),
                        other => Err(unexpected_value(other, schema)),
                    })
                    .transpose()
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(FixedSizeBinaryArray::try_from_sparse_iter_with_size(
                bytes.iter().map(|b| b.as_ref().map(|b| b.as_slice())),
                16,
            )?)
        }
        AvroSchema::Fixed(fixed) => {
            let bytes = values
                .iter()
                .map(|v| {
                    v.map(|v| match v {
                        Value::Fixed(_, b) => Ok(b.as_slice()),
                        other => Err(unexpected_value(other, schema)),
                    })
                    .transpose()
                })
                .collect::<Result<Vec<_>>>()?;
            Arc::new(FixedSizeBinaryArray::try_from_sparse_iter_with_size(
                bytes.into_iter(),
                i32::try_from(fixed.size)?,
            )?)
        }
        AvroSchema::Decimal(decimal) => {
            let array = values
                .iter()
                .map(|v| {
                    v.map(|v| match v {
                        Value::Decimal(d) => decimal_to_i128(d),
                        other => Err(unexpected_value(other, schema)),
                    })
                    .transpose()
                })
                .collect::<Result<Decimal128Array>>()?
                .with_precision_and_scale(u8::try_from(decimal.precision)?, i8::try_from(decimal.scale)?)?;
            Arc::new(array)
        }
        AvroSchema::Record(record) => {
            let mut fields = Vec::with_capacity(record.fields.len());
            let mut children = Vec::with_capacity(record.fields.len());
            for field in &record.fields {
                let child_values: Vec<Option<&Value>> = values
                    .iter()
                    .map(|v| v.and_then(|v| record_field(v, &field.name)))
                    .collect();
                let child = to_array(&child_values, &field.schema)?;
                fields.push(Field::new(&field.name, child.data_type().clone(), true));
                children.push(child);
            }
            if children.is_empty() {
                Arc::new(StructArray::new_empty_fields(values.len(), Some(nulls())))
            } else {
                Arc::new(StructArray::try_new(Fields::from(fields), children, Some(nulls()))?)
            }
        }
        AvroSchema::Array(items) => {
            let mut lengths = Vec::with_capacity(values.len());
            let mut elements = Vec::new();
            for value in &values {
                match value {
                    Some(Value::Array(array)) => {
                        lengths.push(array.len());
                        elements.extend(array.iter().map(non_null));
                    }
                    None => lengths.push(0),
                    Some(other) => return Err(unexpected_value(other, schema)),
                }
            }
            let child = to_array(&elements, items)?;
            Arc::new(ListArray::try_new(
                Arc::new(Field::new(LIST_FIELD_NAME, child.data_type().clone(), true)),
                OffsetBuffer::from_lengths(lengths),
                child,
                Some(nulls()),
            )?)
        }
        AvroSchema::Map(value_schema) => {
            let mut lengths = Vec::with_capacity(values.len());
            let mut keys = Vec::new();
            let mut entries = Vec::new();
            for value in &values {
                match value {
                    Some(Value::Map(map)) => {
                        lengths.push(map.len());
                        for (k, v) in map {
                            keys.push(k.as_str());
                            entries.push(non_null(v));
                        }
                    }
                    None => lengths.push(0),
                    Some(other) => return Err(unexpected_value(other, schema)),
                }
            }
            let keys: ArrayRef = Arc::new(StringArray::from(keys));
            let map_values = to_array(&entries, value_schema)?;
            let entry_fields = Fields::from(vec![
                Field::new(MAP_KEY_FIELD_NAME, DataType::Utf8, false),
                Field::new(MAP_VALUE_FIELD_NAME, map_values.data_type().clone(), true),
            ]);
            let entries = StructArray::try_new(entry_fields.clone(), vec![keys, map_values], None)?;
            Arc::new(MapArray::try_new(
                Arc::new(Field::new("key_value", DataType::Struct(entry_fields), false)),
                OffsetBuffer::from_lengths(lengths),
                entries,
                Some(nulls()),
                false,
            )?)
        }
        other => {
            return Err(Error::new(
                ErrorKind::FeatureUnsupported,
                format!("Reading Avro type {other:?} is not supported"),
            ))
        }
    })
}

// Avro decimals are big endian two's complement.
fn decimal_to_i128(decimal: &apache_avro::Decimal) -> Result<i128> {
    let bytes = Vec::<u8>::try_from(decimal)?;
    if bytes.len() > 16 {
        return Err(Error::new(
            ErrorKind::DataInvalid,
            format!("Avro decimal of {} bytes doesn't fit 128 bits", bytes.len()),
        ));
    }
    let negative = bytes.first().is_some_and(|b| b & 0x80 != 0);
    let mut buf = if negative { [0xff; 16] } else { [0; 16] };
    buf[16 - bytes.len()..].copy_from_slice(&bytes);
    Ok(i128::from_be_bytes(buf))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_decimal_sign_extension() {
        let negative = apache_avro::Decimal::from(vec![0xff, 0x38]);
        assert_eq!(decimal_to_i128(&negative).unwrap(), -200);
        let positive = apache_avro::Decimal::from(vec![0x01, 0x00]);
        assert_eq!(decimal_to_i128(&positive).unwrap(), 256);
    }

    #[test]
    fn test_optional_values_become_nulls() {
        let schema = AvroSchema::parse_str(r#"["null", "long"]"#).unwrap();
        let rows = [
            Value::Union(1, Box::new(Value::Long(4))),
            Value::Union(0, Box::new(Value::Null)),
        ];
        let values: Vec<Option<&Value>> = rows.iter().map(Some).collect();
        let array = to_array(&values, &schema).unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array.null_count(), 1);
    }
}
