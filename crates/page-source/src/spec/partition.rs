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
 * Partitioning
 */
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::{Error, ErrorKind, Result};

/// Reference to [`PartitionSpec`].
pub type PartitionSpecRef = Arc<PartitionSpec>;

/// Transform is used to transform predicates to partition predicates,
/// in addition to transforming data values.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Transform {
    /// Source value, unmodified
    Identity,
    /// Hash of value, mod `N`.
    Bucket(u32),
    /// Value truncated to width `W`
    Truncate(u32),
    /// Extract a date or timestamp year, as years from 1970
    Year,
    /// Extract a date or timestamp month, as months from 1970-01-01
    Month,
    /// Extract a date or timestamp day, as days from 1970-01-01
    Day,
    /// Extract a timestamp hour, as hours from 1970-01-01 00:00:00
    Hour,
    /// Always produces `null`
    Void,
}

impl Display for Transform {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Transform::Identity => write!(f, "identity"),
            Transform::Bucket(n) => write!(f, "bucket[{n}]"),
            Transform::Truncate(w) => write!(f, "truncate[{w}]"),
            Transform::Year => write!(f, "year"),
            Transform::Month => write!(f, "month"),
            Transform::Day => write!(f, "day"),
            Transform::Hour => write!(f, "hour"),
            Transform::Void => write!(f, "void"),
        }
    }
}

impl FromStr for Transform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parse_arg = |prefix: &str| -> Option<Result<u32>> {
            s.strip_prefix(prefix)
                .and_then(|rest| rest.strip_prefix('['))
                .and_then(|rest| rest.strip_suffix(']'))
                .map(|arg| arg.parse::<u32>().map_err(Error::from))
        };

        let t = match s {
            "identity" => Transform::Identity,
            "year" => Transform::Year,
            "month" => Transform::Month,
            "day" => Transform::Day,
            "hour" => Transform::Hour,
            "void" => Transform::Void,
            v if v.starts_with("bucket") => match parse_arg("bucket") {
                Some(n) => Transform::Bucket(n?),
                None => {
                    return Err(Error::new(
                        ErrorKind::DataInvalid,
                        format!("transform {v} is malformed"),
                    ))
                }
            },
            v if v.starts_with("truncate") => match parse_arg("truncate") {
                Some(w) => Transform::Truncate(w?),
                None => {
                    return Err(Error::new(
                        ErrorKind::DataInvalid,
                        format!("transform {v} is malformed"),
                    ))
                }
            },
            v => {
                return Err(Error::new(
                    ErrorKind::FeatureUnsupported,
                    format!("transform {v} is not supported"),
                ))
            }
        };
        Ok(t)
    }
}

/// Partition fields capture the transform from table data to partition values.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PartitionField {
    /// A source column id from the table’s schema
    pub source_id: i32,
    /// A partition field id that is used to identify a partition field and is unique within a partition spec.
    pub field_id: i32,
    /// A partition name.
    pub name: String,
    /// A transform that is applied to the source column to produce a partition value.
    pub transform: Transform,
}

impl PartitionField {
    /// Create a new partition field.
    pub fn new(source_id: i32, field_id: i32, name: impl ToString, transform: Transform) -> Self {
        Self {
            source_id,
            field_id,
            name: name.to_string(),
            transform,
        }
    }
}

/// Partition spec that defines how to produce a tuple of partition values from a record.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct PartitionSpec {
    spec_id: i32,
    fields: Vec<PartitionField>,
}

impl PartitionSpec {
    /// Create a partition spec.
    pub fn new(spec_id: i32, fields: Vec<PartitionField>) -> Self {
        Self { spec_id, fields }
    }

    /// Spec of an unpartitioned table.
    pub fn unpartitioned() -> Self {
        Self::default()
    }

    /// Spec id of the partition spec
    pub fn spec_id(&self) -> i32 {
        self.spec_id
    }

    /// Fields of the partition spec
    pub fn fields(&self) -> &[PartitionField] {
        &self.fields
    }

    /// Maps the source column id of every identity partition field to its value in `data`.
    ///
    /// Only identity partitions yield a value that equals the source column
    /// for every row of the file, so only those become constant columns.
    pub fn identity_partition_keys(
        &self,
        data: &PartitionData,
    ) -> Result<HashMap<i32, Option<String>>> {
        if data.values().len() != self.fields.len() {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!(
                    "Partition data has {} values, but partition spec {} has {} fields",
                    data.values().len(),
                    self.spec_id,
                    self.fields.len()
                ),
            ));
        }

        Ok(self
            .fields
            .iter()
            .zip(data.values())
            .filter(|(field, _)| field.transform == Transform::Identity)
            .map(|(field, value)| (field.source_id, value.clone()))
            .collect())
    }
}

/// Partition tuple of one data file, with each value in its string form.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct PartitionData {
    values: Vec<Option<String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerdePartitionData {
    partition_values: Vec<JsonValue>,
}

impl PartitionData {
    /// Create partition data from string values.
    pub fn new(values: Vec<Option<String>>) -> Self {
        Self { values }
    }

    /// Parses partition data from its JSON form, `{"partitionValues": [...]}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let serde: SerdePartitionData = serde_json::from_str(json)?;
        let values = serde
            .partition_values
            .into_iter()
            .map(|value| match value {
                JsonValue::Null => Ok(None),
                JsonValue::String(s) => Ok(Some(s)),
                JsonValue::Bool(b) => Ok(Some(b.to_string())),
                JsonValue::Number(n) => Ok(Some(n.to_string())),
                other => Err(Error::new(
                    ErrorKind::DataInvalid,
                    format!("Unsupported partition value {other}"),
                )),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { values })
    }

    /// The partition values, in partition spec order.
    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }
}
