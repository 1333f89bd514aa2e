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

//! Translation of tuple domains into pruning predicates over ORC stripe and
//! Parquet row group statistics.
//!
//! Pruning is conservative: a group is only skipped when its statistics, or
//! its bloom filters, prove no row can satisfy the predicate. Missing
//! statistics and NaN bounds always keep the group.

use orc_rust::statistics::TypeStatistics;
use orc_rust::stripe::StripeMetadata;
use parquet::basic::Type as PhysicalType;
use parquet::bloom_filter::Sbbf;
use parquet::file::metadata::RowGroupMetaData;
use parquet::file::statistics::Statistics;

use super::reconcile::{FileField, FileFieldKind, FileFields};
use crate::expr::{Domain, TupleDomain};
use crate::scan::ColumnHandle;
use crate::spec::{Datum, PrimitiveLiteral, PrimitiveType};

// Bloom filters are only checked for domains of at most this many values.
const MAX_BLOOM_FILTER_VALUES: usize = 64;

#[derive(Debug, Clone)]
struct ColumnDomain {
    // ORC column id, or Parquet leaf index.
    index: usize,
    field_type: PrimitiveType,
    domain: Domain,
}

/// A predicate evaluated against ORC stripe statistics.
#[derive(Debug, Clone, Default)]
pub struct OrcPredicate {
    columns: Vec<ColumnDomain>,
}

/// Translates `predicate` for an ORC file.
///
/// Only domains on primitive columns resolved in the file are kept. Columns
/// missing from the file are left to row level filtering.
pub fn build_orc_predicate(predicate: &TupleDomain<ColumnHandle>, fields: &FileFields) -> OrcPredicate {
    let columns = column_domains(predicate, fields, false, |field| field.orc_column());
    OrcPredicate { columns }
}

impl OrcPredicate {
    /// Whether the predicate constrains nothing.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Whether the stripe may hold rows matching the predicate.
    pub fn matches_stripe(&self, stripe: &StripeMetadata) -> bool {
        let rows = stripe.number_of_rows();
        self.columns.iter().all(|c| {
            let Some(stats) = stripe.column_statistics().get(c.index) else {
                return true;
            };
            let null_count = if !stats.has_null() {
                Some(0)
            } else if stats.number_of_values() == 0 {
                Some(rows)
            } else {
                None
            };
            let bounds = stats
                .type_statistics()
                .and_then(|s| orc_bounds(&c.field_type, s));
            let (min, max) = match &bounds {
                Some((min, max)) => (Some(min), Some(max)),
                None => (None, None),
            };
            c.domain.overlaps_stats(min, max, null_count, rows)
        })
    }
}

fn orc_bounds(field_type: &PrimitiveType, stats: &TypeStatistics) -> Option<(Datum, Datum)> {
    Some(match (field_type, stats) {
        (PrimitiveType::Int, TypeStatistics::Integer { min, max, .. }) => (
            Datum::int(i32::try_from(*min).ok()?),
            Datum::int(i32::try_from(*max).ok()?),
        ),
        (PrimitiveType::Long, TypeStatistics::Integer { min, max, .. }) => {
            (Datum::long(*min), Datum::long(*max))
        }
        (PrimitiveType::Float, TypeStatistics::Double { min, max, .. }) => {
            (Datum::float(*min as f32), Datum::float(*max as f32))
        }
        (PrimitiveType::Double, TypeStatistics::Double { min, max, .. }) => {
            (Datum::double(*min), Datum::double(*max))
        }
        (PrimitiveType::String, TypeStatistics::String { min, max, .. }) => {
            (Datum::string(min), Datum::string(max))
        }
        (PrimitiveType::Date, TypeStatistics::Date { min, max, .. }) => {
            (Datum::date(*min), Datum::date(*max))
        }
        _ => return None,
    })
}

/// A predicate evaluated against Parquet row group statistics and bloom filters.
#[derive(Debug, Clone, Default)]
pub struct ParquetPredicate {
    columns: Vec<ColumnDomain>,
}

/// Translates `predicate` for a Parquet file.
///
/// Only base columns of primitive types are kept: nested and complex
/// columns carry no usable statistics.
pub fn build_parquet_predicate(
    predicate: &TupleDomain<ColumnHandle>,
    fields: &FileFields,
) -> ParquetPredicate {
    let columns = column_domains(predicate, fields, true, |field| field.leaves().first().copied());
    ParquetPredicate { columns }
}

impl ParquetPredicate {
    /// Whether the predicate constrains nothing.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Whether the row group may hold rows matching the predicate.
    pub fn matches_row_group(&self, row_group: &RowGroupMetaData) -> bool {
        let rows = u64::try_from(row_group.num_rows()).unwrap_or_default();
        self.columns.iter().all(|c| {
            let Some(stats) = row_group.column(c.index).statistics() else {
                return true;
            };
            let bounds = parquet_bounds(&c.field_type, stats);
            let (min, max) = match &bounds {
                Some((min, max)) => (Some(min), Some(max)),
                None => (None, None),
            };
            c.domain
                .overlaps_stats(min, max, stats.null_count_opt(), rows)
        })
    }

    /// Leaves whose bloom filters may exclude a row group: those constrained
    /// to a few discrete values, nulls excluded.
    pub(crate) fn bloom_filter_leaves(&self) -> Vec<usize> {
        self.columns
            .iter()
            .filter(|c| !c.domain.includes_null())
            .filter(|c| {
                c.domain
                    .discrete_values()
                    .is_some_and(|v| v.len() <= MAX_BLOOM_FILTER_VALUES)
            })
            .map(|c| c.index)
            .collect()
    }

    /// Whether the bloom filter of `leaf` proves no allowed value is in the
    /// row group.
    ///
    /// Filters hash values in their physical encoding, so literals are first
    /// converted to `physical_type`. Literals with no such conversion keep
    /// the group.
    pub(crate) fn excluded_by_bloom_filter(
        &self,
        leaf: usize,
        physical_type: PhysicalType,
        filter: &Sbbf,
    ) -> bool {
        self.columns
            .iter()
            .filter(|c| c.index == leaf && !c.domain.includes_null())
            .any(|c| {
                let Some(values) = c.domain.discrete_values() else {
                    return false;
                };
                !values
                    .iter()
                    .any(|v| bloom_filter_may_contain(filter, physical_type, v.literal()))
            })
    }
}

fn bloom_filter_may_contain(
    filter: &Sbbf,
    physical_type: PhysicalType,
    literal: &PrimitiveLiteral,
) -> bool {
    match (physical_type, literal) {
        (PhysicalType::INT32, PrimitiveLiteral::Int(v)) => filter.check(v),
        // A long outside the i32 range cannot be stored in an int column.
        (PhysicalType::INT32, PrimitiveLiteral::Long(v)) => {
            i32::try_from(*v).is_ok_and(|v| filter.check(&v))
        }
        (PhysicalType::INT64, PrimitiveLiteral::Int(v)) => filter.check(&i64::from(*v)),
        (PhysicalType::INT64, PrimitiveLiteral::Long(v)) => filter.check(v),
        (PhysicalType::BYTE_ARRAY, PrimitiveLiteral::String(v)) => filter.check(&v.as_str()),
        (PhysicalType::BYTE_ARRAY, PrimitiveLiteral::Binary(v)) => filter.check(v),
        _ => true,
    }
}

fn parquet_bounds(field_type: &PrimitiveType, stats: &Statistics) -> Option<(Datum, Datum)> {
    Some(match (field_type, stats) {
        (PrimitiveType::Boolean, Statistics::Boolean(s)) => {
            (Datum::bool(*s.min_opt()?), Datum::bool(*s.max_opt()?))
        }
        (PrimitiveType::Int, Statistics::Int32(s)) => {
            (Datum::int(*s.min_opt()?), Datum::int(*s.max_opt()?))
        }
        (PrimitiveType::Date, Statistics::Int32(s)) => {
            (Datum::date(*s.min_opt()?), Datum::date(*s.max_opt()?))
        }
        (PrimitiveType::Long, Statistics::Int32(s)) => (
            Datum::long(i64::from(*s.min_opt()?)),
            Datum::long(i64::from(*s.max_opt()?)),
        ),
        (PrimitiveType::Long, Statistics::Int64(s)) => {
            (Datum::long(*s.min_opt()?), Datum::long(*s.max_opt()?))
        }
        (PrimitiveType::Time, Statistics::Int64(s)) => {
            (Datum::time_micros(*s.min_opt()?), Datum::time_micros(*s.max_opt()?))
        }
        (PrimitiveType::Timestamp, Statistics::Int64(s)) => (
            Datum::timestamp_micros(*s.min_opt()?),
            Datum::timestamp_micros(*s.max_opt()?),
        ),
        (PrimitiveType::Timestamptz, Statistics::Int64(s)) => (
            Datum::timestamptz_micros(*s.min_opt()?),
            Datum::timestamptz_micros(*s.max_opt()?),
        ),
        (PrimitiveType::Float, Statistics::Float(s)) => {
            (Datum::float(*s.min_opt()?), Datum::float(*s.max_opt()?))
        }
        (PrimitiveType::Double, Statistics::Double(s)) => {
            (Datum::double(*s.min_opt()?), Datum::double(*s.max_opt()?))
        }
        (PrimitiveType::String, Statistics::ByteArray(s)) => (
            Datum::string(s.min_opt()?.as_utf8().ok()?),
            Datum::string(s.max_opt()?.as_utf8().ok()?),
        ),
        (PrimitiveType::Decimal { precision, scale }, Statistics::Int32(s)) => (
            Datum::decimal(i128::from(*s.min_opt()?), *precision, *scale),
            Datum::decimal(i128::from(*s.max_opt()?), *precision, *scale),
        ),
        (PrimitiveType::Decimal { precision, scale }, Statistics::Int64(s)) => (
            Datum::decimal(i128::from(*s.min_opt()?), *precision, *scale),
            Datum::decimal(i128::from(*s.max_opt()?), *precision, *scale),
        ),
        _ => return None,
    })
}

fn column_domains(
    predicate: &TupleDomain<ColumnHandle>,
    fields: &FileFields,
    base_columns_only: bool,
    index: impl Fn(&FileField) -> Option<usize>,
) -> Vec<ColumnDomain> {
    let Some(domains) = predicate.domains() else {
        return vec![];
    };
    domains
        .iter()
        .filter(|(column, _)| !base_columns_only || column.is_base_column())
        .filter_map(|(column, domain)| {
            let field_type = column.field_type().as_primitive_type()?.clone();
            let resolved = fields.resolve(column)?;
            if resolved.field.kind() != FileFieldKind::Primitive {
                return None;
            }
            Some(ColumnDomain {
                index: index(resolved.field)?,
                field_type,
                domain: domain.clone(),
            })
        })
        .collect()
}
