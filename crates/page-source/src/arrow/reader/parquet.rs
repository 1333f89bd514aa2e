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

//! Parquet split reader.

use std::ops::Range;
use std::sync::Arc;

use async_stream::try_stream;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{StreamExt, TryFutureExt};
use parquet::arrow::arrow_reader::{ArrowReaderMetadata, ArrowReaderOptions};
use parquet::arrow::async_reader::{AsyncFileReader, MetadataLoader};
use parquet::arrow::{ParquetRecordBatchStreamBuilder, ProjectionMask};
use parquet::file::metadata::{ParquetMetaData, RowGroupMetaData};
use tracing::debug;

use super::{group_runs, FileGroup, ReaderBatch, ReaderInput, ReaderPageSource};
use crate::arrow::adaptation::ColumnAdapter;
use crate::arrow::predicate::build_parquet_predicate;
use crate::arrow::reconcile::FileFields;
use crate::io::FileRead;
use crate::Result;

/// Reads the row groups of a Parquet file starting in the split.
///
/// Row groups are pruned by statistics and bloom filters, then consecutive
/// row groups are decoded together. The row position range covers the
/// selected row groups.
pub(crate) async fn read_parquet(input: ReaderInput) -> Result<ReaderPageSource> {
    let file_size = input.input.length().await.map_err(|e| input.open_error(e))?;
    let reader = input.input.reader().await.map_err(|e| input.open_error(e))?;
    let mut file_reader = ArrowFileReader::new(file_size, reader);
    let metadata = ArrowReaderMetadata::load_async(&mut file_reader, ArrowReaderOptions::new()).await?;

    let fields = input.reconcile(FileFields::from_parquet_schema(metadata.schema())?);
    let adapter = ColumnAdapter::try_new(&input.columns, &fields, &input.constants)?;
    let predicate = build_parquet_predicate(&input.predicate, &fields);
    let properties = &input.properties;

    let bloom_filter_leaves = if properties.parquet_bloom_filter_enabled {
        predicate.bloom_filter_leaves()
    } else {
        vec![]
    };
    let mut builder =
        ParquetRecordBatchStreamBuilder::new_with_metadata(file_reader, metadata.clone());

    let mut groups = Vec::with_capacity(metadata.metadata().num_row_groups());
    for (index, row_group) in metadata.metadata().row_groups().iter().enumerate() {
        let offset = row_group_offset(row_group);
        let mut selected = input.in_split(offset);
        if selected
            && properties.parquet_row_group_pruning_enabled
            && !predicate.matches_row_group(row_group)
        {
            debug!(row_group = index, "Row group pruned by column statistics");
            selected = false;
        }
        if selected {
            for leaf in &bloom_filter_leaves {
                let Some(filter) = builder.get_row_group_column_bloom_filter(index, *leaf).await?
                else {
                    continue;
                };
                let physical_type = row_group.column(*leaf).column_type();
                if predicate.excluded_by_bloom_filter(*leaf, physical_type, &filter) {
                    debug!(row_group = index, leaf, "Row group pruned by bloom filter");
                    selected = false;
                    break;
                }
            }
        }
        groups.push(FileGroup {
            offset,
            rows: u64::try_from(row_group.num_rows())?,
            selected,
        });
    }
    drop(builder);

    let (runs, row_range) = group_runs(&groups);
    if runs.is_empty() {
        return Ok(ReaderPageSource::empty());
    }

    let schema_descr = metadata.metadata().file_metadata().schema_descr_ptr();
    let mut leaves = adapter.parquet_leaves();
    if leaves.is_empty() && schema_descr.num_columns() > 0 {
        // Row counts come from decoding some column.
        leaves.push(0);
    }
    let projection = ProjectionMask::leaves(&schema_descr, leaves);
    let batch_size = properties.batch_size;

    let stream: BoxStream<'static, Result<ReaderBatch>> = try_stream! {
        for run in runs {
            let reader = input.input.reader().await.map_err(|e| input.open_error(e))?;
            let mut batches = ParquetRecordBatchStreamBuilder::new_with_metadata(
                ArrowFileReader::new(file_size, reader),
                metadata.clone(),
            )
            .with_row_groups((run.first..=run.last).collect())
            .with_projection(projection.clone())
            .with_batch_size(batch_size)
            .build()?;

            let mut position = run.start_position;
            while let Some(batch) = batches.next().await {
                let batch = batch?;
                let rows = batch.num_rows() as u64;
                yield ReaderBatch {
                    batch: adapter.adapt(&batch, position)?,
                    start_position: position,
                };
                position += rows;
            }
        }
    }
    .boxed();

    Ok(ReaderPageSource {
        stream,
        row_range,
    })
}

// A row group starts at its dictionary page, or its first data page.
fn row_group_offset(row_group: &RowGroupMetaData) -> u64 {
    if row_group.num_columns() == 0 {
        return 0;
    }
    let column = row_group.column(0);
    let offset = column
        .dictionary_page_offset()
        .unwrap_or_else(|| column.data_page_offset());
    u64::try_from(offset).unwrap_or_default()
}

/// ArrowFileReader is a wrapper around a FileRead that impls parquets AsyncFileReader.
struct ArrowFileReader {
    file_size: u64,
    r: Box<dyn FileRead>,
}

impl ArrowFileReader {
    fn new(file_size: u64, r: Box<dyn FileRead>) -> Self {
        Self { file_size, r }
    }
}

impl AsyncFileReader for ArrowFileReader {
    fn get_bytes(&mut self, range: Range<usize>) -> BoxFuture<'_, parquet::errors::Result<Bytes>> {
        Box::pin(
            self.r
                .read(range.start as _..range.end as _)
                .map_err(|err| parquet::errors::ParquetError::External(Box::new(err))),
        )
    }

    fn get_metadata(&mut self) -> BoxFuture<'_, parquet::errors::Result<Arc<ParquetMetaData>>> {
        Box::pin(async move {
            let file_size = self.file_size;
            let mut loader = MetadataLoader::load(self, file_size as usize, None).await?;
            loader.load_page_index(false, false).await?;
            Ok(Arc::new(loader.finish()))
        })
    }
}
