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

//! Format readers decoding one split of a data file.
//!
//! Each reader resolves the table columns against the file schema, prunes
//! row groups or stripes outside the split or excluded by the predicate,
//! and returns a lazy stream of batches laid out as the requested reader
//! columns, with the row position of every batch.

use std::sync::Arc;

use arrow_array::RecordBatch;
use futures::stream::BoxStream;

use self::avro::read_avro;
use self::orc::read_orc;
use self::parquet::read_parquet;
use super::adaptation::SplitConstants;
use super::reconcile::FileFields;
use crate::expr::TupleDomain;
use crate::io::InputFile;
use crate::scan::ColumnHandle;
use crate::spec::{DataFileFormat, NameMapping, ReaderProperties, Schema};
use crate::{Error, ErrorKind, Result};

mod avro;
mod orc;
mod parquet;

/// Inclusive range of row positions in the data file covered by a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPositionRange {
    /// Position of the first row read.
    pub start: u64,
    /// Position of the last row read.
    pub end: u64,
}

impl RowPositionRange {
    /// Whether `position` is in the range.
    pub fn contains(&self, position: u64) -> bool {
        self.start <= position && position <= self.end
    }
}

/// A batch of reader columns, with the position of its first row.
#[derive(Debug, Clone)]
pub struct ReaderBatch {
    /// The decoded and adapted rows.
    pub batch: RecordBatch,
    /// Position of the first row of the batch in the data file.
    pub start_position: u64,
}

/// The result of opening a split with a format reader.
pub struct ReaderPageSource {
    /// Batches in row position order. Positions are contiguous within a batch.
    pub stream: BoxStream<'static, Result<ReaderBatch>>,
    /// Positions covered by the read, `None` when the format can't tell or
    /// nothing is read.
    pub row_range: Option<RowPositionRange>,
}

impl ReaderPageSource {
    pub(crate) fn empty() -> Self {
        Self {
            stream: Box::pin(futures::stream::empty()),
            row_range: None,
        }
    }
}

/// Everything a format reader needs to read one split.
#[derive(Debug, Clone)]
pub(crate) struct ReaderInput {
    pub input: InputFile,
    pub columns: Vec<ColumnHandle>,
    pub predicate: TupleDomain<ColumnHandle>,
    pub constants: SplitConstants,
    /// Applied to files written without field ids.
    pub name_mapping: Option<Arc<NameMapping>>,
    pub start: u64,
    pub length: u64,
    pub properties: ReaderProperties,
}

impl ReaderInput {
    pub(crate) fn reconcile(&self, mut fields: FileFields) -> FileFields {
        if let Some(name_mapping) = &self.name_mapping {
            if !fields.has_field_ids() {
                fields.apply_name_mapping(name_mapping);
            }
        }
        fields
    }

    pub(crate) fn in_split(&self, offset: u64) -> bool {
        offset >= self.start && offset < self.start.saturating_add(self.length)
    }

    /// Turns a failure to reach the file into an error naming the split.
    pub(crate) fn open_error(&self, source: Error) -> Error {
        Error::cannot_open_split(self.input.location(), self.start, self.length).with_source(source)
    }
}

/// The name mapping applied to a `format` file written without field ids.
///
/// An explicit mapping always wins. ORC ids are only reachable by name, so
/// ORC files otherwise map names against the current table schema; a column
/// dropped and re-added under the same name then binds old files to the new
/// field. Parquet and Avro files without ids and without an explicit mapping
/// resolve no columns.
pub(crate) fn name_mapping_for(
    format: DataFileFormat,
    explicit: Option<&Arc<NameMapping>>,
    table_schema: &Schema,
) -> Option<Arc<NameMapping>> {
    match (explicit, format) {
        (Some(name_mapping), _) => Some(name_mapping.clone()),
        (None, DataFileFormat::Orc) => Some(Arc::new(NameMapping::new(table_schema))),
        (None, _) => None,
    }
}

/// Reads a split with the reader of `format`.
pub(crate) async fn read_file(format: DataFileFormat, input: ReaderInput) -> Result<ReaderPageSource> {
    match format {
        DataFileFormat::Orc => read_orc(input).await,
        DataFileFormat::Parquet => read_parquet(input).await,
        DataFileFormat::Avro => read_avro(input).await,
        DataFileFormat::Puffin => Err(Error::new(
            ErrorKind::FeatureUnsupported,
            format!("Can't read rows from a {format} file"),
        )),
    }
}

/// A row group or stripe.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FileGroup {
    /// Offset of the first byte of the group.
    pub offset: u64,
    pub rows: u64,
    pub selected: bool,
}

/// A run of consecutive selected groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GroupRun {
    pub first: usize,
    pub last: usize,
    pub start_position: u64,
}

/// Splits the selected groups into runs of consecutive groups, and computes
/// the row positions they cover.
pub(crate) fn group_runs(groups: &[FileGroup]) -> (Vec<GroupRun>, Option<RowPositionRange>) {
    let mut runs: Vec<GroupRun> = vec![];
    let mut position = 0;
    let mut range: Option<RowPositionRange> = None;
    for (index, group) in groups.iter().enumerate() {
        if group.selected && group.rows > 0 {
            match runs.last_mut() {
                Some(run) if run.last + 1 == index => run.last = index,
                _ => runs.push(GroupRun {
                    first: index,
                    last: index,
                    start_position: position,
                }),
            }
            let end = position + group.rows - 1;
            range = Some(match range {
                Some(r) => RowPositionRange { start: r.start, end },
                None => RowPositionRange { start: position, end },
            });
        }
        position += group.rows;
    }
    (runs, range)
}
