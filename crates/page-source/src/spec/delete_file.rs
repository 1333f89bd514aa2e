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

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use typed_builder::TypedBuilder;

use crate::{Error, ErrorKind, Result};

/// Type of content stored by the data file: data, equality deletes, or
/// position deletes (all v1 files are data files)
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum DataContentType {
    /// value: 0
    Data = 0,
    /// value: 1
    PositionDeletes = 1,
    /// value: 2
    EqualityDeletes = 2,
}

impl TryFrom<i32> for DataContentType {
    type Error = Error;

    fn try_from(v: i32) -> Result<DataContentType> {
        match v {
            0 => Ok(DataContentType::Data),
            1 => Ok(DataContentType::PositionDeletes),
            2 => Ok(DataContentType::EqualityDeletes),
            _ => Err(Error::new(
                ErrorKind::DataInvalid,
                format!("data content type {v} is invalid"),
            )),
        }
    }
}

/// Format of this data.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum DataFileFormat {
    /// Avro file format: <https://avro.apache.org/>
    Avro,
    /// Orc file format: <https://orc.apache.org/>
    Orc,
    /// Parquet file format: <https://parquet.apache.org/>
    Parquet,
    /// Puffin file format: <https://iceberg.apache.org/puffin-spec/>
    Puffin,
}

impl FromStr for DataFileFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "avro" => Ok(Self::Avro),
            "orc" => Ok(Self::Orc),
            "parquet" => Ok(Self::Parquet),
            "puffin" => Ok(Self::Puffin),
            _ => Err(Error::new(
                ErrorKind::FeatureUnsupported,
                format!("Unsupported data file format: {s}"),
            )),
        }
    }
}

impl Display for DataFileFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DataFileFormat::Avro => write!(f, "avro"),
            DataFileFormat::Orc => write!(f, "orc"),
            DataFileFormat::Parquet => write!(f, "parquet"),
            DataFileFormat::Puffin => write!(f, "puffin"),
        }
    }
}

/// A delete file that applies to the data file being read.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct DeleteFile {
    /// The delete file path
    #[builder(setter(into))]
    pub file_path: String,
    /// Whether the file holds position or equality deletes
    pub content: DataContentType,
    /// The format of the delete file
    pub file_format: DataFileFormat,
    /// Size of the delete file in bytes
    pub file_size_in_bytes: u64,
    /// Number of delete records in the file
    #[builder(default)]
    pub record_count: u64,
    /// Field ids forming the delete key of an equality delete file
    #[builder(default)]
    pub equality_ids: Vec<i32>,
    /// Lower bounds per field id, in Iceberg's single-value binary encoding
    #[builder(default)]
    pub lower_bounds: HashMap<i32, Vec<u8>>,
    /// Upper bounds per field id, in Iceberg's single-value binary encoding
    #[builder(default)]
    pub upper_bounds: HashMap<i32, Vec<u8>>,
}
