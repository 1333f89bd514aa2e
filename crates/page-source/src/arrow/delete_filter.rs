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

//! Position and equality delete filtering.
//!
//! Position deletes of a data file are collected in one bitmap. Equality
//! deletes are grouped by the set of their equality field ids and each
//! group is loaded into one set of rows. A row is kept when its position is
//! not deleted and it is in none of the equality delete sets.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::types::Int64Type;
use arrow_array::{ArrayRef, BooleanArray, RecordBatch};
use arrow_row::{OwnedRow, RowConverter, SortField};
use futures::TryStreamExt;
use tracing::debug;

use super::delete_file_loader::DeleteFileLoader;
use super::reader::{name_mapping_for, RowPositionRange};
use crate::delete_vector::DeleteVector;
use crate::expr::{Domain, Range, TupleDomain};
use crate::metadata_columns::{
    delete_file_path_field, delete_file_pos_field, RESERVED_FIELD_ID_DELETE_FILE_PATH,
    RESERVED_FIELD_ID_DELETE_FILE_POS,
};
use crate::scan::ColumnHandle;
use crate::spec::{DataContentType, Datum, DeleteFile, NameMapping, Schema, SchemaRef};
use crate::{Error, ErrorKind, Result};

/// Deleted positions of one data file, restricted to a row position range.
#[derive(Debug, Clone)]
pub struct PositionDeleteSet {
    data_file_path: String,
    range: Option<RowPositionRange>,
    deleted: DeleteVector,
}

impl PositionDeleteSet {
    /// Creates an empty set for the rows of `data_file_path` in `range`.
    ///
    /// # Panics
    ///
    /// The range bounds must be both present or both absent.
    pub fn new(data_file_path: impl ToString, start: Option<u64>, end: Option<u64>) -> Self {
        let range = match (start, end) {
            (Some(start), Some(end)) => Some(RowPositionRange { start, end }),
            (None, None) => None,
            _ => panic!("Row position bounds must be both present or both absent, got {start:?} and {end:?}"),
        };
        Self {
            data_file_path: data_file_path.to_string(),
            range,
            deleted: DeleteVector::default(),
        }
    }

    /// Whether the delete file bounds prove it has no position for this set.
    pub(crate) fn can_skip(&self, delete_file: &DeleteFile) -> bool {
        let path_bound = |bounds: &std::collections::HashMap<i32, Vec<u8>>| {
            bounds.get(&RESERVED_FIELD_ID_DELETE_FILE_PATH).cloned()
        };
        if let (Some(lower), Some(upper)) = (
            path_bound(&delete_file.lower_bounds),
            path_bound(&delete_file.upper_bounds),
        ) {
            if lower == upper && lower != self.data_file_path.as_bytes() {
                return true;
            }
        }

        let Some(range) = self.range else {
            return false;
        };
        let pos_bound = |bounds: &std::collections::HashMap<i32, Vec<u8>>| {
            bounds
                .get(&RESERVED_FIELD_ID_DELETE_FILE_POS)
                .and_then(|b| <[u8; 8]>::try_from(b.as_slice()).ok())
                .map(i64::from_le_bytes)
        };
        let lower = pos_bound(&delete_file.lower_bounds);
        let upper = pos_bound(&delete_file.upper_bounds);
        let before = upper.is_some_and(|upper| upper < 0 || (upper as u64) < range.start);
        let after = lower.is_some_and(|lower| lower >= 0 && (lower as u64) > range.end);
        before || after
    }

    /// The predicate pruning row groups of delete files that can't hold positions for this set.
    fn predicate(&self) -> TupleDomain<ColumnHandle> {
        let mut domains = vec![(
            ColumnHandle::from_field(delete_file_path_field().clone()),
            Domain::single_value(Datum::string(&self.data_file_path)),
        )];
        if let Some(range) = self.range {
            if let (Ok(start), Ok(end)) = (i64::try_from(range.start), i64::try_from(range.end)) {
                if let Some(range) = Range::new(
                    std::ops::Bound::Included(Datum::long(start)),
                    std::ops::Bound::Included(Datum::long(end)),
                ) {
                    domains.push((
                        ColumnHandle::from_field(delete_file_pos_field().clone()),
                        Domain::from_ranges(vec![range], false),
                    ));
                }
            }
        }
        TupleDomain::with_column_domains(domains)
    }

    /// Adds the positions of a batch of `file_path` and `pos` rows that
    /// target this data file and range.
    pub(crate) fn add_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        let (Some(paths), Some(positions)) = (
            batch.column(0).as_string_opt::<i32>(),
            batch.column(1).as_primitive_opt::<Int64Type>(),
        ) else {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                "Position delete rows must hold a file path and a position",
            ));
        };
        for (path, pos) in paths.iter().zip(positions.iter()) {
            let (Some(path), Some(pos)) = (path, pos) else {
                continue;
            };
            let Ok(pos) = u64::try_from(pos) else {
                continue;
            };
            if path == self.data_file_path && self.range.map_or(true, |r| r.contains(pos)) {
                self.deleted.insert(pos);
            }
        }
        Ok(())
    }

    /// Whether the row at `position` is deleted.
    pub fn is_deleted(&self, position: u64) -> bool {
        self.deleted.contains(position)
    }

    /// Number of deleted positions.
    pub fn len(&self) -> u64 {
        self.deleted.len()
    }

    /// Whether no position is deleted.
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty()
    }
}

/// Rows deleted by equality delete files sharing the same equality field ids.
#[derive(Debug)]
pub struct EqualityDeleteSet {
    columns: Vec<ColumnHandle>,
    converter: RowConverter,
    rows: HashSet<OwnedRow>,
}

impl EqualityDeleteSet {
    /// Creates an empty set keyed by `columns`.
    pub fn try_new(columns: Vec<ColumnHandle>) -> Result<Self> {
        let fields = columns
            .iter()
            .map(|c| Ok(SortField::new(super::type_to_arrow_type(c.field_type())?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            columns,
            converter: RowConverter::new(fields)?,
            rows: HashSet::new(),
        })
    }

    /// The key columns, in key order.
    pub fn columns(&self) -> &[ColumnHandle] {
        &self.columns
    }

    /// Adds delete rows whose columns are the key columns in key order.
    pub(crate) fn add_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        let rows = self.converter.convert_columns(batch.columns())?;
        self.rows.extend(rows.iter().map(|r| r.owned()));
        Ok(())
    }

    /// For each row of the key `columns`, whether it is deleted.
    pub fn contains(&self, columns: &[ArrayRef]) -> Result<Vec<bool>> {
        let rows = self.converter.convert_columns(columns)?;
        Ok(rows.iter().map(|r| self.rows.contains(&r.owned())).collect())
    }

    /// Number of distinct deleted keys.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no key is deleted.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The deletes applying to one split of a data file.
#[derive(Debug)]
pub struct DeleteFilter {
    positions: Option<PositionDeleteSet>,
    // Channels of the key columns in the filtered batches, and their set.
    equality: Vec<(Vec<usize>, EqualityDeleteSet)>,
}

/// Everything needed to load the deletes of a split.
#[derive(Debug, Clone)]
pub(crate) struct DeleteFilterContext {
    pub loader: DeleteFileLoader,
    pub data_file_path: String,
    pub delete_files: Vec<DeleteFile>,
    pub table_schema: SchemaRef,
    /// Columns of the batches the filter is applied to.
    pub columns: Vec<ColumnHandle>,
    /// The mapping given with the split, if any.
    pub name_mapping: Option<Arc<NameMapping>>,
    pub start_position: Option<u64>,
    pub end_position: Option<u64>,
}

impl DeleteFilter {
    /// A filter deleting nothing.
    pub fn empty() -> Self {
        Self {
            positions: None,
            equality: vec![],
        }
    }

    /// Reads the delete files of a split.
    ///
    /// Position delete files whose bounds exclude the data file or the row
    /// position range are never opened. Equality delete files with the same
    /// set of equality field ids share one set.
    pub(crate) async fn load(ctx: DeleteFilterContext) -> Result<Self> {
        let mut positions = PositionDeleteSet::new(&ctx.data_file_path, ctx.start_position, ctx.end_position);
        let mut equality_groups: BTreeMap<BTreeSet<i32>, Vec<&DeleteFile>> = BTreeMap::new();

        let position_schema = Schema::builder()
            .with_fields(vec![delete_file_path_field().clone(), delete_file_pos_field().clone()])
            .build()?;
        let position_mapping = Arc::new(NameMapping::new(&position_schema));
        let position_columns = vec![
            ColumnHandle::from_field(delete_file_path_field().clone()),
            ColumnHandle::from_field(delete_file_pos_field().clone()),
        ];

        for delete_file in &ctx.delete_files {
            match delete_file.content {
                DataContentType::PositionDeletes => {
                    if positions.can_skip(delete_file) {
                        debug!(delete_file = %delete_file.file_path, "Position delete file pruned by bounds");
                        continue;
                    }
                    let mut batches = ctx
                        .loader
                        .read_delete_file(
                            delete_file,
                            position_columns.clone(),
                            positions.predicate(),
                            Some(position_mapping.clone()),
                        )
                        .await?;
                    while let Some(batch) = batches.try_next().await? {
                        positions.add_batch(&batch)?;
                    }
                }
                DataContentType::EqualityDeletes => {
                    equality_groups
                        .entry(delete_file.equality_ids.iter().copied().collect())
                        .or_default()
                        .push(delete_file);
                }
                DataContentType::Data => {
                    return Err(Error::new(
                        ErrorKind::DataInvalid,
                        format!("{} is a data file, not a delete file", delete_file.file_path),
                    ))
                }
            }
        }

        let mut equality = Vec::with_capacity(equality_groups.len());
        for (field_ids, delete_files) in equality_groups {
            let columns = field_ids
                .iter()
                .map(|id| ColumnHandle::for_field_id(&ctx.table_schema, *id))
                .collect::<Result<Vec<_>>>()?;
            let channels = columns
                .iter()
                .map(|c| {
                    ctx.columns.iter().position(|r| r == c).ok_or_else(|| {
                        Error::new(
                            ErrorKind::Unexpected,
                            format!("Equality delete column {c} is not read"),
                        )
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let mut set = EqualityDeleteSet::try_new(columns)?;
            for delete_file in delete_files {
                let mut batches = ctx
                    .loader
                    .read_delete_file(
                        delete_file,
                        set.columns().to_vec(),
                        TupleDomain::all(),
                        name_mapping_for(
                            delete_file.file_format,
                            ctx.name_mapping.as_ref(),
                            &ctx.table_schema,
                        ),
                    )
                    .await?;
                while let Some(batch) = batches.try_next().await? {
                    set.add_batch(&batch)?;
                }
            }
            equality.push((channels, set));
        }

        Ok(Self {
            positions: (!positions.is_empty()).then_some(positions),
            equality,
        })
    }

    /// Whether the filter deletes nothing.
    pub fn is_empty(&self) -> bool {
        self.positions.is_none() && self.equality.is_empty()
    }

    /// For each row of a batch whose first row is at `start_position`,
    /// whether it survives the deletes.
    pub fn keep_mask(&self, batch: &RecordBatch, start_position: u64) -> Result<BooleanArray> {
        let mut keep = vec![true; batch.num_rows()];
        if let Some(positions) = &self.positions {
            for (offset, keep) in keep.iter_mut().enumerate() {
                if positions.is_deleted(start_position + offset as u64) {
                    *keep = false;
                }
            }
        }
        for (channels, set) in &self.equality {
            let columns: Vec<ArrayRef> = channels.iter().map(|c| batch.column(*c).clone()).collect();
            for (keep, deleted) in keep.iter_mut().zip(set.contains(&columns)?) {
                if deleted {
                    *keep = false;
                }
            }
        }
        Ok(BooleanArray::from(keep))
    }
}

/// A delete filter loaded on first use, then kept for the life of the page source.
#[derive(Debug)]
pub(crate) enum LazyDeleteFilter {
    Unresolved(Box<DeleteFilterContext>, Arc<AtomicBool>),
    Resolved(Arc<DeleteFilter>),
}

impl LazyDeleteFilter {
    /// `loaded` is set once the delete files are read.
    pub(crate) fn new(ctx: DeleteFilterContext, loaded: Arc<AtomicBool>) -> Self {
        if ctx.delete_files.is_empty() {
            loaded.store(true, Ordering::Release);
            return Self::Resolved(Arc::new(DeleteFilter::empty()));
        }
        Self::Unresolved(Box::new(ctx), loaded)
    }

    pub(crate) async fn get(&mut self) -> Result<Arc<DeleteFilter>> {
        if let Self::Unresolved(ctx, loaded) = self {
            let filter = Arc::new(DeleteFilter::load((**ctx).clone()).await?);
            loaded.store(true, Ordering::Release);
            *self = Self::Resolved(filter);
        }
        match self {
            Self::Resolved(filter) => Ok(filter.clone()),
            Self::Unresolved(..) => Err(Error::new(
                ErrorKind::Unexpected,
                "Delete filter is still unresolved after loading",
            )),
        }
    }
}
