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

use std::sync::Arc;

use arrow_array::RecordBatch;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};

use super::adaptation::SplitConstants;
use super::reader::{read_file, ReaderInput};
use super::{columns_to_arrow_schema, project_base_columns, Reprojector};
use crate::expr::TupleDomain;
use crate::io::FileIO;
use crate::scan::ColumnHandle;
use crate::spec::{DataFileFormat, DeleteFile, NameMapping, ReaderProperties};
use crate::Result;

/// Reads delete files with the readers used for data files.
#[derive(Clone, Debug)]
pub(crate) struct DeleteFileLoader {
    file_io: FileIO,
    properties: ReaderProperties,
}

impl DeleteFileLoader {
    pub(crate) fn new(file_io: FileIO, properties: ReaderProperties) -> Self {
        DeleteFileLoader {
            file_io,
            properties,
        }
    }

    /// Reads `columns` of the whole delete file.
    ///
    /// Row groups and stripes `predicate` excludes are skipped, rows of the
    /// kept ones are returned unfiltered. Nested key columns of Avro delete
    /// files are read through their base column.
    pub(crate) async fn read_delete_file(
        &self,
        delete_file: &DeleteFile,
        columns: Vec<ColumnHandle>,
        predicate: TupleDomain<ColumnHandle>,
        name_mapping: Option<Arc<NameMapping>>,
    ) -> Result<BoxStream<'static, Result<RecordBatch>>> {
        let projection = match delete_file.file_format {
            DataFileFormat::Avro => project_base_columns(&columns),
            _ => None,
        };
        let reprojector = projection
            .as_ref()
            .map(|p| Reprojector::try_new(p, &columns, columns_to_arrow_schema(&columns)?))
            .transpose()?;
        let columns = projection.map_or(columns, |p| p.reader_columns().to_vec());

        let input = self
            .file_io
            .open_for_read(&delete_file.file_path, Some(delete_file.file_size_in_bytes))?;
        let reader_input = ReaderInput {
            input,
            columns,
            predicate,
            constants: SplitConstants {
                path: delete_file.file_path.clone(),
                ..Default::default()
            },
            name_mapping,
            start: 0,
            length: delete_file.file_size_in_bytes,
            properties: self.properties.clone(),
        };
        let source = read_file(delete_file.file_format, reader_input).await?;
        Ok(source
            .stream
            .and_then(move |b| {
                let batch = match &reprojector {
                    Some(reprojector) => reprojector.project(&b.batch),
                    None => Ok(b.batch),
                };
                futures::future::ready(batch)
            })
            .boxed())
    }
}
