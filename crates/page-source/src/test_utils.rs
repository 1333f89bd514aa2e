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

//! Fixtures shared by the tests of this crate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use apache_avro::types::Value as AvroValue;
use arrow_array::{ArrayRef, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema as ArrowSchema};
use async_trait::async_trait;
use bytes::Bytes;
use parquet::arrow::{ArrowWriter, PARQUET_FIELD_ID_META_KEY};
use parquet::file::properties::WriterProperties;

use crate::io::{FileIO, FileMetadata, FileRead, MemoryStorage, Storage};
use crate::metadata_columns::{
    RESERVED_COL_NAME_DELETE_FILE_PATH, RESERVED_COL_NAME_DELETE_FILE_POS,
    RESERVED_FIELD_ID_DELETE_FILE_PATH, RESERVED_FIELD_ID_DELETE_FILE_POS,
};
use crate::spec::{DataContentType, DataFileFormat, DeleteFile};
use crate::Result;

/// An Arrow field carrying a Parquet field id.
pub(crate) fn id_field(name: &str, data_type: DataType, nullable: bool, id: i32) -> Field {
    Field::new(name, data_type, nullable).with_metadata(HashMap::from([(
        PARQUET_FIELD_ID_META_KEY.to_string(),
        id.to_string(),
    )]))
}

/// A batch of `id: long` (field 1) and `name: string` (field 2).
pub(crate) fn id_name_batch(ids: &[i64], names: &[&str]) -> RecordBatch {
    let schema = Arc::new(ArrowSchema::new(vec![
        id_field("id", DataType::Int64, false, 1),
        id_field("name", DataType::Utf8, true, 2),
    ]));
    RecordBatch::try_new(schema, vec![
        Arc::new(Int64Array::from(ids.to_vec())) as ArrayRef,
        Arc::new(StringArray::from(names.to_vec())) as ArrayRef,
    ])
    .unwrap()
}

/// Drops the field ids of a batch, as writers unaware of Iceberg do.
pub(crate) fn without_field_ids(batch: &RecordBatch) -> RecordBatch {
    let fields: Vec<Field> = batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.as_ref().clone().with_metadata(HashMap::new()))
        .collect();
    RecordBatch::try_new(Arc::new(ArrowSchema::new(fields)), batch.columns().to_vec()).unwrap()
}

/// Writes `batches` as one Parquet file and returns its size.
pub(crate) async fn write_parquet(
    file_io: &FileIO,
    path: &str,
    batches: &[RecordBatch],
    properties: Option<WriterProperties>,
) -> u64 {
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batches[0].schema(), properties).unwrap();
    for batch in batches {
        writer.write(batch).unwrap();
    }
    writer.close().unwrap();
    write_bytes(file_io, path, buffer).await
}

/// Writes `batch` as one ORC file and returns its size.
pub(crate) async fn write_orc(file_io: &FileIO, path: &str, batch: &RecordBatch) -> u64 {
    let mut buffer = Vec::new();
    let mut writer = orc_rust::ArrowWriterBuilder::new(&mut buffer, batch.schema())
        .try_build()
        .unwrap();
    writer.write(batch).unwrap();
    writer.close().unwrap();
    write_bytes(file_io, path, buffer).await
}

/// Writes Avro `records` with the writer schema `schema` and returns the file size.
pub(crate) async fn write_avro(
    file_io: &FileIO,
    path: &str,
    schema: &str,
    records: Vec<Vec<(&str, AvroValue)>>,
) -> u64 {
    let schema = apache_avro::Schema::parse_str(schema).unwrap();
    let mut writer = apache_avro::Writer::new(&schema, Vec::new());
    for record in records {
        writer
            .append(AvroValue::Record(
                record
                    .into_iter()
                    .map(|(name, value)| (name.to_string(), value))
                    .collect(),
            ))
            .unwrap();
    }
    write_bytes(file_io, path, writer.into_inner().unwrap()).await
}

async fn write_bytes(file_io: &FileIO, path: &str, buffer: Vec<u8>) -> u64 {
    let size = buffer.len() as u64;
    file_io
        .new_output(path)
        .unwrap()
        .write(Bytes::from(buffer))
        .await
        .unwrap();
    size
}

/// Writes a Parquet position delete file deleting `positions` of each data file.
pub(crate) async fn write_position_deletes(
    file_io: &FileIO,
    path: &str,
    deletes: &[(&str, i64)],
) -> DeleteFile {
    let schema = Arc::new(ArrowSchema::new(vec![
        id_field(
            RESERVED_COL_NAME_DELETE_FILE_PATH,
            DataType::Utf8,
            false,
            RESERVED_FIELD_ID_DELETE_FILE_PATH,
        ),
        id_field(
            RESERVED_COL_NAME_DELETE_FILE_POS,
            DataType::Int64,
            false,
            RESERVED_FIELD_ID_DELETE_FILE_POS,
        ),
    ]));
    let batch = RecordBatch::try_new(schema, vec![
        Arc::new(StringArray::from_iter_values(deletes.iter().map(|(p, _)| *p))) as ArrayRef,
        Arc::new(Int64Array::from_iter_values(deletes.iter().map(|(_, pos)| *pos))) as ArrayRef,
    ])
    .unwrap();
    let size = write_parquet(file_io, path, &[batch], None).await;
    DeleteFile::builder()
        .file_path(path.to_string())
        .content(DataContentType::PositionDeletes)
        .file_format(DataFileFormat::Parquet)
        .file_size_in_bytes(size)
        .record_count(deletes.len() as u64)
        .build()
}

/// Writes a Parquet equality delete file on `equality_ids` holding the rows of `batch`.
pub(crate) async fn write_equality_deletes(
    file_io: &FileIO,
    path: &str,
    batch: &RecordBatch,
    equality_ids: Vec<i32>,
) -> DeleteFile {
    let size = write_parquet(file_io, path, &[batch.clone()], None).await;
    DeleteFile::builder()
        .file_path(path.to_string())
        .content(DataContentType::EqualityDeletes)
        .file_format(DataFileFormat::Parquet)
        .file_size_in_bytes(size)
        .record_count(batch.num_rows() as u64)
        .equality_ids(equality_ids)
        .build()
}

/// In-memory storage counting how often each object is opened for reading.
#[derive(Debug, Clone, Default)]
pub(crate) struct CountingStorage {
    inner: MemoryStorage,
    opens: Arc<Mutex<HashMap<String, usize>>>,
}

impl CountingStorage {
    pub(crate) fn file_io(&self) -> FileIO {
        FileIO::from_storage(Arc::new(self.clone()))
    }

    /// Number of reads and readers created for `path`.
    pub(crate) fn opens(&self, path: &str) -> usize {
        let opens = self.opens.lock().unwrap();
        opens
            .get(&MemoryStorage::normalize_path(path))
            .copied()
            .unwrap_or(0)
    }

    /// Reads and readers created for any object.
    pub(crate) fn total_opens(&self) -> usize {
        self.opens.lock().unwrap().values().sum()
    }

    fn record(&self, path: &str) {
        let mut opens = self.opens.lock().unwrap();
        *opens.entry(MemoryStorage::normalize_path(path)).or_default() += 1;
    }
}

#[async_trait]
impl Storage for CountingStorage {
    async fn exists(&self, path: &str) -> Result<bool> {
        self.inner.exists(path).await
    }

    async fn metadata(&self, path: &str) -> Result<FileMetadata> {
        self.inner.metadata(path).await
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        self.record(path);
        self.inner.read(path).await
    }

    async fn reader(&self, path: &str) -> Result<Box<dyn FileRead>> {
        self.record(path);
        self.inner.reader(path).await
    }

    async fn write(&self, path: &str, bs: Bytes) -> Result<()> {
        self.inner.write(path, bs).await
    }
}
