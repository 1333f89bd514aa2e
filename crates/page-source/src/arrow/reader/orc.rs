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

//! ORC split reader.

use std::ops::Range;

use arrow_array::RecordBatch;
use async_stream::try_stream;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use orc_rust::projection::ProjectionMask;
use orc_rust::ArrowReaderBuilder;
use tracing::debug;

use super::{group_runs, FileGroup, ReaderBatch, ReaderInput, ReaderPageSource};
use crate::arrow::adaptation::ColumnAdapter;
use crate::arrow::predicate::build_orc_predicate;
use crate::arrow::reconcile::{FileField, FileFields};
use crate::Result;

/// Reads the stripes of an ORC file starting in the split.
///
/// ORC files carry no field ids the reader can see, so columns are always
/// resolved through the name mapping. Stripes are pruned by their column
/// statistics. Only top level columns are projected: nested siblings of a
/// requested field are decoded with it.
pub(crate) async fn read_orc(input: ReaderInput) -> Result<ReaderPageSource> {
    let file = input.input.read().await.map_err(|e| input.open_error(e))?;
    let builder = ArrowReaderBuilder::try_new(file.clone())?;
    let metadata = builder.file_metadata();

    let fields = input.reconcile(FileFields::from_orc(metadata.root_data_type()));
    let adapter = ColumnAdapter::try_new(&input.columns, &fields, &input.constants)?;
    let predicate = build_orc_predicate(&input.predicate, &fields);
    let properties = &input.properties;

    let groups: Vec<FileGroup> = metadata
        .stripe_metadatas()
        .iter()
        .enumerate()
        .map(|(index, stripe)| {
            let offset = stripe.offset();
            let mut selected = input.in_split(offset);
            if selected && properties.orc_stripe_pruning_enabled && !predicate.matches_stripe(stripe) {
                debug!(stripe = index, "Stripe pruned by column statistics");
                selected = false;
            }
            FileGroup {
                offset,
                rows: stripe.number_of_rows(),
                selected,
            }
        })
        .collect();

    let (runs, row_range) = group_runs(&groups);
    if runs.is_empty() {
        return Ok(ReaderPageSource::empty());
    }

    let mut roots: Vec<usize> = adapter
        .decoded_roots()
        .iter()
        .filter_map(FileField::orc_column)
        .collect();
    if roots.is_empty() {
        // Row counts come from decoding some column.
        roots.extend(fields.fields().first().and_then(FileField::orc_column));
    }
    let byte_ranges = runs
        .iter()
        .map(|run| {
            let start = usize::try_from(groups[run.first].offset)?;
            let end = usize::try_from(groups[run.last].offset)? + 1;
            Ok((start..end, run.start_position))
        })
        .collect::<Result<Vec<_>>>()?;
    let batch_size = properties.batch_size;

    let stream: BoxStream<'static, Result<ReaderBatch>> = try_stream! {
        for (byte_range, start_position) in byte_ranges {
            let batches = decode_stripes(file.clone(), byte_range, &roots, batch_size)?;
            let mut position = start_position;
            for batch in batches {
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

    Ok(ReaderPageSource { stream, row_range })
}

// Decodes the stripes whose offset lies in `byte_range`.
fn decode_stripes(
    file: Bytes,
    byte_range: Range<usize>,
    roots: &[usize],
    batch_size: usize,
) -> Result<Vec<RecordBatch>> {
    let builder = ArrowReaderBuilder::try_new(file)?;
    let projection = ProjectionMask::roots(
        builder.file_metadata().root_data_type(),
        roots.iter().copied(),
    );
    let reader = builder
        .with_file_byte_range(byte_range)
        .with_projection(projection)
        .with_batch_size(batch_size)
        .build();
    Ok(reader.collect::<std::result::Result<Vec<_>, _>>()?)
}
