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
use std::fmt::Display;
use std::str::FromStr;

use crate::error::{Error, ErrorKind, Result};

// Helper function to parse a property from a HashMap
// If the property is not found, use the default value
fn parse_property<T: FromStr>(
    properties: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T>
where
    <T as FromStr>::Err: Display,
{
    properties.get(key).map_or(Ok(default), |value| {
        value.parse::<T>().map_err(|e| {
            Error::new(
                ErrorKind::DataInvalid,
                format!("Invalid value for {key}: {e}"),
            )
        })
    })
}

/// Session level options that control how a page source reads a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderProperties {
    /// Number of rows decoded per record batch
    pub batch_size: usize,
    /// Number of ranges a column domain may hold before it is collapsed to its span
    pub domain_compaction_threshold: usize,
    /// Whether Parquet bloom filters are consulted when pruning row groups
    pub parquet_bloom_filter_enabled: bool,
    /// Whether row group statistics are used to prune Parquet row groups
    pub parquet_row_group_pruning_enabled: bool,
    /// Whether stripe statistics are used to prune ORC stripes
    pub orc_stripe_pruning_enabled: bool,
}

impl ReaderProperties {
    /// Number of rows per record batch.
    pub const PROPERTY_BATCH_SIZE: &'static str = "read.batch-size";
    /// Default number of rows per record batch.
    pub const PROPERTY_BATCH_SIZE_DEFAULT: usize = 1024;

    /// Ranges kept per domain when simplifying the effective predicate.
    pub const PROPERTY_DOMAIN_COMPACTION_THRESHOLD: &'static str = "read.domain-compaction-threshold";
    /// Default domain compaction threshold.
    pub const PROPERTY_DOMAIN_COMPACTION_THRESHOLD_DEFAULT: usize = 256;

    /// Toggle for Parquet bloom filter pruning.
    pub const PROPERTY_PARQUET_BLOOM_FILTER_ENABLED: &'static str = "read.parquet.bloom-filter-enabled";
    /// Parquet bloom filters are used by default.
    pub const PROPERTY_PARQUET_BLOOM_FILTER_ENABLED_DEFAULT: bool = true;

    /// Toggle for Parquet row group statistics pruning.
    pub const PROPERTY_PARQUET_ROW_GROUP_PRUNING_ENABLED: &'static str =
        "read.parquet.row-group-pruning-enabled";
    /// Parquet row group statistics are used by default.
    pub const PROPERTY_PARQUET_ROW_GROUP_PRUNING_ENABLED_DEFAULT: bool = true;

    /// Toggle for ORC stripe statistics pruning.
    pub const PROPERTY_ORC_STRIPE_PRUNING_ENABLED: &'static str = "read.orc.stripe-pruning-enabled";
    /// ORC stripe statistics are used by default.
    pub const PROPERTY_ORC_STRIPE_PRUNING_ENABLED_DEFAULT: bool = true;
}

impl Default for ReaderProperties {
    fn default() -> Self {
        Self {
            batch_size: Self::PROPERTY_BATCH_SIZE_DEFAULT,
            domain_compaction_threshold: Self::PROPERTY_DOMAIN_COMPACTION_THRESHOLD_DEFAULT,
            parquet_bloom_filter_enabled: Self::PROPERTY_PARQUET_BLOOM_FILTER_ENABLED_DEFAULT,
            parquet_row_group_pruning_enabled:
                Self::PROPERTY_PARQUET_ROW_GROUP_PRUNING_ENABLED_DEFAULT,
            orc_stripe_pruning_enabled: Self::PROPERTY_ORC_STRIPE_PRUNING_ENABLED_DEFAULT,
        }
    }
}

impl TryFrom<&HashMap<String, String>> for ReaderProperties {
    // parse by entry key or use default value
    type Error = Error;

    fn try_from(props: &HashMap<String, String>) -> Result<Self> {
        let properties = ReaderProperties {
            batch_size: parse_property(
                props,
                ReaderProperties::PROPERTY_BATCH_SIZE,
                ReaderProperties::PROPERTY_BATCH_SIZE_DEFAULT,
            )?,
            domain_compaction_threshold: parse_property(
                props,
                ReaderProperties::PROPERTY_DOMAIN_COMPACTION_THRESHOLD,
                ReaderProperties::PROPERTY_DOMAIN_COMPACTION_THRESHOLD_DEFAULT,
            )?,
            parquet_bloom_filter_enabled: parse_property(
                props,
                ReaderProperties::PROPERTY_PARQUET_BLOOM_FILTER_ENABLED,
                ReaderProperties::PROPERTY_PARQUET_BLOOM_FILTER_ENABLED_DEFAULT,
            )?,
            parquet_row_group_pruning_enabled: parse_property(
                props,
                ReaderProperties::PROPERTY_PARQUET_ROW_GROUP_PRUNING_ENABLED,
                ReaderProperties::PROPERTY_PARQUET_ROW_GROUP_PRUNING_ENABLED_DEFAULT,
            )?,
            orc_stripe_pruning_enabled: parse_property(
                props,
                ReaderProperties::PROPERTY_ORC_STRIPE_PRUNING_ENABLED,
                ReaderProperties::PROPERTY_ORC_STRIPE_PRUNING_ENABLED_DEFAULT,
            )?,
        };

        if properties.batch_size == 0 {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!(
                    "Invalid value for {}: must be positive",
                    ReaderProperties::PROPERTY_BATCH_SIZE
                ),
            ));
        }
        Ok(properties)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_reader_properties_default() {
        let props = HashMap::new();
        let reader_properties = ReaderProperties::try_from(&props).unwrap();
        assert_eq!(reader_properties, ReaderProperties::default());
        assert_eq!(reader_properties.batch_size, 1024);
        assert_eq!(reader_properties.domain_compaction_threshold, 256);
    }

    #[test]
    fn test_reader_properties_valid() {
        let props = HashMap::from([
            (ReaderProperties::PROPERTY_BATCH_SIZE.to_string(), "16".to_string()),
            (
                ReaderProperties::PROPERTY_PARQUET_BLOOM_FILTER_ENABLED.to_string(),
                "false".to_string(),
            ),
        ]);
        let reader_properties = ReaderProperties::try_from(&props).unwrap();
        assert_eq!(reader_properties.batch_size, 16);
        assert!(!reader_properties.parquet_bloom_filter_enabled);
        assert!(reader_properties.orc_stripe_pruning_enabled);
    }

    #[test]
    fn test_reader_properties_invalid() {
        let invalid = vec![
            (ReaderProperties::PROPERTY_BATCH_SIZE, "abc"),
            (ReaderProperties::PROPERTY_BATCH_SIZE, "0"),
            (ReaderProperties::PROPERTY_ORC_STRIPE_PRUNING_ENABLED, "yes"),
        ];
        for (key, value) in invalid {
            let props = HashMap::from([(key.to_string(), value.to_string())]);
            let err = ReaderProperties::try_from(&props).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DataInvalid);
            assert!(err.message().contains(key));
        }
    }
}
