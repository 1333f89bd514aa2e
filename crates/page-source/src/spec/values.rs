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

/*!
 * Value in iceberg
 */

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ordered_float::OrderedFloat;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::spec::PrimitiveType;
use crate::{ensure_data_valid, Error, ErrorKind, Result};

/// Values present in iceberg type
#[derive(Clone, Debug, PartialEq, Hash, Eq, PartialOrd, Ord)]
pub enum PrimitiveLiteral {
    /// 0x00 for false, non-zero byte for true
    Boolean(bool),
    /// Stored as 4-byte little-endian
    Int(i32),
    /// Stored as 8-byte little-endian
    Long(i64),
    /// Stored as 4-byte little-endian
    Float(OrderedFloat<f32>),
    /// Stored as 8-byte little-endian
    Double(OrderedFloat<f64>),
    /// UTF-8 bytes (without length)
    String(String),
    /// Binary value (without length)
    Binary(Vec<u8>),
    /// Stored as 16-byte little-endian
    Int128(i128),
    /// Stored as 16-byte little-endian
    UInt128(u128),
}

/// Literal associated with its type.
///
/// Two datums only compare when their types are equal; the order is the
/// natural order of the type (unsigned byte-wise for binary, unsigned for
/// uuid, by unscaled value for decimals of the same scale).
#[derive(Clone, Debug, PartialEq, Hash, Eq)]
pub struct Datum {
    r#type: PrimitiveType,
    literal: PrimitiveLiteral,
}

impl PartialOrd for Datum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.r#type != other.r#type {
            return None;
        }
        Some(self.literal.cmp(&other.literal))
    }
}

impl Display for Datum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match (&self.r#type, &self.literal) {
            (_, PrimitiveLiteral::Boolean(val)) => write!(f, "{val}"),
            (_, PrimitiveLiteral::Int(val)) => write!(f, "{val}"),
            (_, PrimitiveLiteral::Long(val)) => write!(f, "{val}"),
            (_, PrimitiveLiteral::Float(val)) => write!(f, "{val}"),
            (_, PrimitiveLiteral::Double(val)) => write!(f, "{val}"),
            (_, PrimitiveLiteral::String(val)) => write!(f, r#""{val}""#),
            (_, PrimitiveLiteral::Binary(val)) => write!(f, "{}", BASE64.encode(val)),
            (PrimitiveType::Decimal { scale, .. }, PrimitiveLiteral::Int128(val)) => {
                match Decimal::try_from_i128_with_scale(*val, *scale) {
                    Ok(decimal) => write!(f, "{decimal}"),
                    Err(_) => write!(f, "{val}E-{scale}"),
                }
            }
            (_, PrimitiveLiteral::Int128(val)) => write!(f, "{val}"),
            (_, PrimitiveLiteral::UInt128(val)) => write!(f, "{}", Uuid::from_u128(*val)),
        }
    }
}

impl Datum {
    /// Creates a datum from a type and a literal, checking the literal fits the type.
    pub fn new(r#type: PrimitiveType, literal: PrimitiveLiteral) -> Result<Self> {
        let valid = matches!(
            (&r#type, &literal),
            (PrimitiveType::Boolean, PrimitiveLiteral::Boolean(_))
                | (PrimitiveType::Int, PrimitiveLiteral::Int(_))
                | (PrimitiveType::Date, PrimitiveLiteral::Int(_))
                | (PrimitiveType::Long, PrimitiveLiteral::Long(_))
                | (PrimitiveType::Time, PrimitiveLiteral::Long(_))
                | (PrimitiveType::Timestamp, PrimitiveLiteral::Long(_))
                | (PrimitiveType::Timestamptz, PrimitiveLiteral::Long(_))
                | (PrimitiveType::Float, PrimitiveLiteral::Float(_))
                | (PrimitiveType::Double, PrimitiveLiteral::Double(_))
                | (PrimitiveType::String, PrimitiveLiteral::String(_))
                | (PrimitiveType::Binary, PrimitiveLiteral::Binary(_))
                | (PrimitiveType::Fixed(_), PrimitiveLiteral::Binary(_))
                | (PrimitiveType::Decimal { .. }, PrimitiveLiteral::Int128(_))
                | (PrimitiveType::Uuid, PrimitiveLiteral::UInt128(_))
        );
        ensure_data_valid!(
            valid,
            "literal {:?} is not a valid {} value",
            literal,
            r#type
        );
        Ok(Self { r#type, literal })
    }

    /// Creates a boolean value.
    pub fn bool(t: bool) -> Self {
        Self {
            r#type: PrimitiveType::Boolean,
            literal: PrimitiveLiteral::Boolean(t),
        }
    }

    /// Creates an 32bit integer.
    pub fn int<T: Into<i32>>(t: T) -> Self {
        Self {
            r#type: PrimitiveType::Int,
            literal: PrimitiveLiteral::Int(t.into()),
        }
    }

    /// Creates an 64bit integer.
    pub fn long<T: Into<i64>>(t: T) -> Self {
        Self {
            r#type: PrimitiveType::Long,
            literal: PrimitiveLiteral::Long(t.into()),
        }
    }

    /// Creates an 32bit floating point number.
    pub fn float<T: Into<f32>>(t: T) -> Self {
        Self {
            r#type: PrimitiveType::Float,
            literal: PrimitiveLiteral::Float(OrderedFloat(t.into())),
        }
    }

    /// Creates an 64bit floating point number.
    pub fn double<T: Into<f64>>(t: T) -> Self {
        Self {
            r#type: PrimitiveType::Double,
            literal: PrimitiveLiteral::Double(OrderedFloat(t.into())),
        }
    }

    /// Creates date literal from number of days from unix epoch directly.
    pub fn date(days: i32) -> Self {
        Self {
            r#type: PrimitiveType::Date,
            literal: PrimitiveLiteral::Int(days),
        }
    }

    /// Creates time literal in microseconds since midnight.
    pub fn time_micros(value: i64) -> Self {
        Self {
            r#type: PrimitiveType::Time,
            literal: PrimitiveLiteral::Long(value),
        }
    }

    /// Creates a timestamp from unix epoch in microseconds.
    pub fn timestamp_micros(value: i64) -> Self {
        Self {
            r#type: PrimitiveType::Timestamp,
            literal: PrimitiveLiteral::Long(value),
        }
    }

    /// Creates a timestamp with timezone from unix epoch in microseconds.
    pub fn timestamptz_micros(value: i64) -> Self {
        Self {
            r#type: PrimitiveType::Timestamptz,
            literal: PrimitiveLiteral::Long(value),
        }
    }

    /// Creates a string literal.
    pub fn string<S: ToString>(s: S) -> Self {
        Self {
            r#type: PrimitiveType::String,
            literal: PrimitiveLiteral::String(s.to_string()),
        }
    }

    /// Creates uuid literal.
    pub fn uuid(uuid: Uuid) -> Self {
        Self {
            r#type: PrimitiveType::Uuid,
            literal: PrimitiveLiteral::UInt128(uuid.as_u128()),
        }
    }

    /// Creates a fixed literal from bytes.
    pub fn fixed<I: IntoIterator<Item = u8>>(input: I) -> Self {
        let value: Vec<u8> = input.into_iter().collect();
        Self {
            r#type: PrimitiveType::Fixed(value.len() as u64),
            literal: PrimitiveLiteral::Binary(value),
        }
    }

    /// Creates a binary literal from bytes.
    pub fn binary<I: IntoIterator<Item = u8>>(input: I) -> Self {
        Self {
            r#type: PrimitiveType::Binary,
            literal: PrimitiveLiteral::Binary(input.into_iter().collect()),
        }
    }

    /// Creates a decimal literal from its unscaled value.
    pub fn decimal(unscaled: i128, precision: u32, scale: u32) -> Self {
        Self {
            r#type: PrimitiveType::Decimal { precision, scale },
            literal: PrimitiveLiteral::Int128(unscaled),
        }
    }

    /// Deserializes a partition value string into a datum of the given type.
    ///
    /// Partition values travel as the string form of the transformed value:
    /// dates are days since epoch, times and timestamps are microseconds,
    /// decimals are plain decimal text and binary values are base64.
    pub fn from_partition_value(r#type: &PrimitiveType, value: &str) -> Result<Self> {
        let datum = match r#type {
            PrimitiveType::Boolean => Datum::bool(bool::from_str(value)?),
            PrimitiveType::Int => Datum::int(i32::from_str(value)?),
            PrimitiveType::Long => Datum::long(i64::from_str(value)?),
            PrimitiveType::Float => Datum::float(f32::from_str(value)?),
            PrimitiveType::Double => Datum::double(f64::from_str(value)?),
            PrimitiveType::Date => Datum::date(i32::from_str(value)?),
            PrimitiveType::Time => Datum::time_micros(i64::from_str(value)?),
            PrimitiveType::Timestamp => Datum::timestamp_micros(i64::from_str(value)?),
            PrimitiveType::Timestamptz => Datum::timestamptz_micros(i64::from_str(value)?),
            PrimitiveType::String => Datum::string(value),
            PrimitiveType::Uuid => Datum::uuid(Uuid::parse_str(value)?),
            PrimitiveType::Binary => Datum::binary(BASE64.decode(value)?),
            PrimitiveType::Fixed(len) => {
                let bytes = BASE64.decode(value)?;
                ensure_data_valid!(
                    bytes.len() as u64 == *len,
                    "partition value has {} bytes, expected fixed({})",
                    bytes.len(),
                    len
                );
                Datum::fixed(bytes)
            }
            PrimitiveType::Decimal { precision, scale } => {
                let mut decimal = Decimal::from_str(value)?;
                ensure_data_valid!(
                    decimal.scale() <= *scale,
                    "partition value {} has a larger scale than decimal({},{})",
                    value,
                    precision,
                    scale
                );
                decimal.rescale(*scale);
                Datum::decimal(decimal.mantissa(), *precision, *scale)
            }
        };
        Ok(datum)
    }

    /// Returns the type of this datum.
    pub fn data_type(&self) -> &PrimitiveType {
        &self.r#type
    }

    /// Returns the literal of this datum.
    pub fn literal(&self) -> &PrimitiveLiteral {
        &self.literal
    }

    /// Converts this datum to another primitive type, for the promotions Iceberg allows.
    pub fn to(self, target: &PrimitiveType) -> Result<Datum> {
        if &self.r#type == target {
            return Ok(self);
        }
        match (&self.literal, target) {
            (PrimitiveLiteral::Int(v), PrimitiveType::Long) => Ok(Datum::long(*v)),
            (PrimitiveLiteral::Float(v), PrimitiveType::Double) => Ok(Datum::double(v.0)),
            (PrimitiveLiteral::Int128(v), PrimitiveType::Decimal { precision, scale })
                if matches!(self.r#type, PrimitiveType::Decimal { scale: s, .. } if s == *scale) =>
            {
                Ok(Datum::decimal(*v, *precision, *scale))
            }
            _ => Err(Error::new(
                ErrorKind::DataInvalid,
                format!("Can't convert datum from {} type to {target} type", self.r#type),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_partition_value_parsing() {
        assert_eq!(
            Datum::from_partition_value(&PrimitiveType::Long, "42").unwrap(),
            Datum::long(42)
        );
        assert_eq!(
            Datum::from_partition_value(&PrimitiveType::Date, "19000").unwrap(),
            Datum::date(19000)
        );
        assert_eq!(
            Datum::from_partition_value(&PrimitiveType::Boolean, "true").unwrap(),
            Datum::bool(true)
        );
        assert_eq!(
            Datum::from_partition_value(&PrimitiveType::Binary, "AQID").unwrap(),
            Datum::binary(vec![1, 2, 3])
        );
        assert_eq!(
            Datum::from_partition_value(
                &PrimitiveType::Decimal {
                    precision: 9,
                    scale: 2
                },
                "12.5"
            )
            .unwrap(),
            Datum::decimal(1250, 9, 2)
        );
    }

    #[test]
    fn test_partition_value_parsing_rejects_garbage() {
        let err = Datum::from_partition_value(&PrimitiveType::Int, "abc").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);

        let err = Datum::from_partition_value(&PrimitiveType::Fixed(4), "AQID").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);
    }

    #[test]
    fn test_datum_ordering_requires_same_type() {
        assert!(Datum::long(1) < Datum::long(2));
        assert!(Datum::string("a") < Datum::string("b"));
        assert_eq!(Datum::int(1).partial_cmp(&Datum::long(1)), None);
    }

    #[test]
    fn test_datum_promotion() {
        assert_eq!(Datum::int(7).to(&PrimitiveType::Long).unwrap(), Datum::long(7));
        assert!(Datum::string("x").to(&PrimitiveType::Long).is_err());
    }

    #[test]
    fn test_datum_display() {
        assert_eq!(Datum::decimal(1250, 9, 2).to_string(), "12.50");
        assert_eq!(Datum::string("a").to_string(), "\"a\"");
    }
}
