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

//! Arrow arrays built from Iceberg values.

use std::iter::repeat;
use std::sync::Arc;

use arrow_array::{
    new_null_array, ArrayRef, BooleanArray, Date32Array, Decimal128Array, FixedSizeBinaryArray,
    Float32Array, Float64Array, Int32Array, Int64Array, LargeBinaryArray, StringArray,
    Time64MicrosecondArray, TimestampMicrosecondArray,
};
use arrow_schema::{DataType, TimeUnit};

use crate::spec::{Datum, PrimitiveLiteral};
use crate::{Error, ErrorKind, Result};

/// Creates an array repeating `value` `num_rows` times, or an all-null array
/// when there is no value.
pub(crate) fn create_constant_array(
    value: Option<&Datum>,
    target_type: &DataType,
    num_rows: usize,
) -> Result<ArrayRef> {
    let Some(value) = value else {
        return Ok(new_null_array(target_type, num_rows));
    };

    Ok(match (target_type, value.literal()) {
        (DataType::Boolean, PrimitiveLiteral::Boolean(v)) => {
            Arc::new(BooleanArray::from(vec![*v; num_rows]))
        }
        (DataType::Int32, PrimitiveLiteral::Int(v)) => Arc::new(Int32Array::from(vec![*v; num_rows])),
        (DataType::Date32, PrimitiveLiteral::Int(v)) => {
            Arc::new(Date32Array::from(vec![*v; num_rows]))
        }
        (DataType::Int64, PrimitiveLiteral::Long(v)) => Arc::new(Int64Array::from(vec![*v; num_rows])),
        (DataType::Time64(TimeUnit::Microsecond), PrimitiveLiteral::Long(v)) => {
            Arc::new(Time64MicrosecondArray::from(vec![*v; num_rows]))
        }
        (DataType::Timestamp(TimeUnit::Microsecond, tz), PrimitiveLiteral::Long(v)) => Arc::new(
            TimestampMicrosecondArray::from(vec![*v; num_rows]).with_timezone_opt(tz.clone()),
        ),
        (DataType::Float32, PrimitiveLiteral::Float(v)) => {
            Arc::new(Float32Array::from(vec![v.0; num_rows]))
        }
        (DataType::Float64, PrimitiveLiteral::Double(v)) => {
            Arc::new(Float64Array::from(vec![v.0; num_rows]))
        }
        (DataType::Utf8, PrimitiveLiteral::String(v)) => {
            Arc::new(StringArray::from(vec![v.as_str(); num_rows]))
        }
        (DataType::LargeBinary, PrimitiveLiteral::Binary(v)) => {
            Arc::new(LargeBinaryArray::from_vec(vec![v.as_slice(); num_rows]))
        }
        (DataType::FixedSizeBinary(size), PrimitiveLiteral::Binary(v)) => {
            Arc::new(FixedSizeBinaryArray::try_from_sparse_iter_with_size(
                repeat(Some(v.as_slice())).take(num_rows),
                *size,
            )?)
        }
        (DataType::FixedSizeBinary(16), PrimitiveLiteral::UInt128(v)) => {
            let bytes = v.to_be_bytes();
            Arc::new(FixedSizeBinaryArray::try_from_sparse_iter_with_size(
                repeat(Some(bytes.as_slice())).take(num_rows),
                16,
            )?)
        }
        (DataType::Decimal128(precision, scale), PrimitiveLiteral::Int128(v)) => Arc::new(
            Decimal128Array::from(vec![*v; num_rows])
                .with_precision_and_scale(*precision, *scale)?,
        ),
        (dt, _) => {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!("Can't build a {dt} column from value {value}"),
            ));
        }
    })
}

#[cfg(test)]
mod tests {
    use arrow_array::cast::AsArray;
    use arrow_array::types::Int64Type;
    use arrow_array::Array;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    use super::*;
    use crate::arrow::type_to_arrow_type;
    use crate::spec::PrimitiveType;

    #[test]
    fn test_constant_arrays() {
        let array = create_constant_array(Some(&Datum::long(7)), &DataType::Int64, 3).unwrap();
        assert_eq!(array.as_primitive::<Int64Type>().values().to_vec(), vec![7, 7, 7]);

        let array = create_constant_array(Some(&Datum::string("x")), &DataType::Utf8, 2).unwrap();
        assert_eq!(array.as_string::<i32>().value(1), "x");

        let uuid = Uuid::from_u128(42);
        let ty = type_to_arrow_type(&PrimitiveType::Uuid.into()).unwrap();
        let array = create_constant_array(Some(&Datum::uuid(uuid)), &ty, 2).unwrap();
        assert_eq!(array.as_fixed_size_binary().value(0), uuid.as_bytes());

        let ty = type_to_arrow_type(&PrimitiveType::Timestamptz.into()).unwrap();
        let array = create_constant_array(Some(&Datum::timestamptz_micros(5)), &ty, 1).unwrap();
        assert_eq!(array.data_type(), &ty);
    }

    #[test]
    fn test_null_and_empty_arrays() {
        let array = create_constant_array(None, &DataType::Utf8, 4).unwrap();
        assert_eq!(array.null_count(), 4);

        let array = create_constant_array(Some(&Datum::fixed(vec![1, 2])), &DataType::FixedSizeBinary(2), 0)
            .unwrap();
        assert_eq!(array.len(), 0);
    }

    #[test]
    fn test_mismatched_constant_fails() {
        let err = create_constant_array(Some(&Datum::string("x")), &DataType::Int64, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);
    }
}
