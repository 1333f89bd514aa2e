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
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use arrow_select::filter::filter_record_batch;
use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use tracing::{debug, field, info_span, Instrument};

use crate::arrow::adaptation::SplitConstants;
use crate::arrow::delete_file_loader::DeleteFileLoader;
use crate::arrow::reader::{name_mapping_for, read_file, ReaderInput};
use crate::arrow::{
    columns_to_arrow_schema, project_base_columns, project_sufficient_columns, DeleteFilterContext,
    LazyDeleteFilter, ReaderBatch, Reprojector,
};
use crate::expr::TupleDomain;
use crate::io::FileIO;
use crate::page_source::PageSource;
use crate::scan::{ColumnHandle, ColumnRole, PageSourceRequest};
use crate::spec::{DataContentType, DataFileFormat, Datum, ReaderProperties};
use crate::{Error, ErrorKind, Result};

/// Creates page sources for splits of Iceberg data files.
#[derive(Debug, Clone)]
pub struct PageSourceProvider {
    file_io: FileIO,
}

impl PageSourceProvider {
    /// Creates a provider reading files through `file_io`.
    pub fn new(file_io: FileIO) -> Self {
        Self { file_io }
    }

    /// Creates the page source of one split.
    ///
    /// Splits the predicate proves empty, by partition values, file path or
    /// modification time, get an empty page source without the data file
    /// ever being opened. Otherwise the file is opened and its metadata read
    /// here, while row groups, stripes and delete files are only read as
    /// batches are pulled.
    pub async fn create_page_source(
        &self,
        properties: &ReaderProperties,
        request: PageSourceRequest,
    ) -> Result<PageSource> {
        let predicate = request
            .unenforced_predicate
            .intersect(&request.dynamic_filter.current_predicate())
            .simplify(properties.domain_compaction_threshold);
        if predicate.is_none() {
            debug!(path = %request.path, "Predicate matches no rows, skipping split");
            return Ok(PageSource::empty());
        }
        if request.file_format == DataFileFormat::Puffin {
            return Err(Error::new(
                ErrorKind::FeatureUnsupported,
                format!("Can't read rows from a {} file", request.file_format),
            )
            .with_context("path", &request.path));
        }

        let partition_keys = request
            .partition_spec
            .identity_partition_keys(&request.partition_data)?;
        if !matches_constants(&predicate, &request, &partition_keys)? {
            debug!(path = %request.path, "Partition values or file path exclude the split");
            return Ok(PageSource::empty());
        }

        let file_modified_time = if needs_file_modified_time(&request.columns, &predicate) {
            let time = self.file_modified_time(&request).await?;
            let column = ColumnHandle::file_modified_time();
            if predicate
                .domain(&column)
                .is_some_and(|d| !d.includes(Some(&Datum::timestamptz_micros(time))))
            {
                debug!(path = %request.path, "File modification time excludes the split");
                return Ok(PageSource::empty());
            }
            Some(time)
        } else {
            None
        };

        let required = required_columns(&request)?;
        let reader_columns = match request.file_format {
            DataFileFormat::Avro => project_base_columns(&required),
            _ => project_sufficient_columns(&required),
        };
        let read_columns = reader_columns
            .as_ref()
            .map_or_else(|| required.clone(), |r| r.reader_columns().to_vec());
        let reprojector = reader_columns
            .as_ref()
            .map(|r| Reprojector::try_new(r, &required, columns_to_arrow_schema(&required)?))
            .transpose()?;


        let span = info_span!(
            "iceberg.page_source",
            file.path = %request.path,
            file.format = %request.file_format,
            batches = field::Empty,
            rows = field::Empty,
        );

        let source = read_file(request.file_format, ReaderInput {
            input: self
                .file_io
                .open_for_read(&request.path, Some(request.file_size))?,
            columns: read_columns,
            predicate,
            constants: SplitConstants {
                path: request.path.clone(),
                partition_keys,
                partition_data_serialized: request.partition_data_serialized.clone(),
                file_modified_time,
            },
            name_mapping: name_mapping_for(
                request.file_format,
                request.name_mapping.as_ref(),
                &request.table_schema,
            ),
            start: request.start,
            length: request.length,
            properties: properties.clone(),
        })
        .instrument(span.clone())
        .await?;

        let delete_filter_loaded = Arc::new(AtomicBool::new(false));
        let deletes = LazyDeleteFilter::new(
            DeleteFilterContext {
                loader: DeleteFileLoader::new(self.file_io.clone(), properties.clone()),
                data_file_path: request.path.clone(),
                delete_files: request.delete_files.clone(),
                table_schema: request.table_schema.clone(),
                columns: required,
                name_mapping: request.name_mapping.clone(),
                start_position: source.row_range.map(|r| r.start),
                end_position: source.row_range.map(|r| r.end),
            },
            delete_filter_loaded.clone(),
        );

        let stream = filtered_batches(
            source.stream,
            reprojector,
            deletes,
            request.columns.len(),
        );
        Ok(PageSource::new(stream, span, delete_filter_loaded))
    }

    async fn file_modified_time(&self, request: &PageSourceRequest) -> Result<i64> {
        let input = self
            .file_io
            .open_for_read(&request.path, Some(request.file_size))?;
        let time = input.last_modified().await.map_err(|e| {
            Error::cannot_open_split(&request.path, request.start, request.length).with_source(e)
        })?;
        Ok(time.timestamp_micros())
    }
}

/// Whether the partition constants and path of the split can satisfy `predicate`.
fn matches_constants(
    predicate: &TupleDomain<ColumnHandle>,
    request: &PageSourceRequest,
    partition_keys: &HashMap<i32, Option<String>>,
) -> Result<bool> {
    let Some(domains) = predicate.domains() else {
        return Ok(true);
    };
    for (column, domain) in domains {
        let value = match column.role() {
            ColumnRole::FilePath => Some(Datum::string(&request.path)),
            ColumnRole::Regular if column.is_base_column() => {
                let (Some(value), Some(field_type)) = (
                    partition_keys.get(&column.id()),
                    column.field_type().as_primitive_type(),
                ) else {
                    continue;
                };
                value
                    .as_deref()
                    .map(|v| Datum::from_partition_value(field_type, v))
                    .transpose()?
            }
            _ => continue,
        };
        if !domain.includes(value.as_ref()) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn needs_file_modified_time(
    columns: &[ColumnHandle],
    predicate: &TupleDomain<ColumnHandle>,
) -> bool {
    columns
        .iter()
        .any(|c| c.role() == ColumnRole::FileModifiedTime)
        || predicate.domain(&ColumnHandle::file_modified_time()).is_some()
}

/// The requested columns followed by the equality delete keys not requested.
fn required_columns(request: &PageSourceRequest) -> Result<Vec<ColumnHandle>> {
    let mut required = request.columns.clone();
    for delete_file in &request.delete_files {
        if delete_file.content != DataContentType::EqualityDeletes {
            continue;
        }
        for id in &delete_file.equality_ids {
            let column = ColumnHandle::for_field_id(&request.table_schema, *id)?;
            if !required.contains(&column) {
                required.push(column);
            }
        }
    }
    Ok(required)
}

fn filtered_batches(
    mut reader: BoxStream<'static, Result<ReaderBatch>>,
    reprojector: Option<Reprojector>,
    mut deletes: LazyDeleteFilter,
    output_columns: usize,
) -> BoxStream<'static, Result<arrow_array::RecordBatch>> {
    let output: Vec<usize> = (0..output_columns).collect();
    let stream = try_stream! {
        while let Some(ReaderBatch { batch, start_position }) = reader.try_next().await? {
            let batch = match &reprojector {
                Some(reprojector) => reprojector.project(&batch)?,
                None => batch,
            };
            let filter = deletes.get().await?;
            let batch = if filter.is_empty() {
                batch
            } else {
                let keep = filter.keep_mask(&batch, start_position)?;
                filter_record_batch(&batch, &keep)?
            };
            let batch = if batch.num_columns() > output_columns {
                batch.project(&output)?
            } else {
                batch
            };
            if batch.num_rows() > 0 {
                yield batch;
            }
        }
    };
    stream.boxed()
}

#[cfg(test)]
mod tests {
    use std::ops::Bound;

    use apache_avro::types::Value as AvroValue;
    use arrow_array::cast::AsArray;
    use arrow_array::types::Int64Type;
    use arrow_array::{ArrayRef, Int32Array, Int64Array, RecordBatch, StringArray, StructArray};
    use arrow_schema::{DataType, Fields, Schema as ArrowSchema};
    use parquet::file::properties::WriterProperties;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::expr::{Domain, Range};
    use crate::metadata_columns::RESERVED_FIELD_ID_DELETE_FILE_POS;
    use crate::spec::{
        DeleteFile, NameMapping, NestedField, PartitionData, PartitionField, PartitionSpec,
        PrimitiveType, Schema, SchemaRef, StructType, Transform, Type,
    };
    use crate::test_utils::{
        id_field, id_name_batch, without_field_ids, write_avro, write_equality_deletes,
        write_orc, write_parquet, write_position_deletes, CountingStorage,
    };

    fn table_schema() -> SchemaRef {
        Arc::new(
            Schema::builder()
                .with_fields(vec![
                    Arc::new(NestedField::required(1, "id", Type::Primitive(PrimitiveType::Long))),
                    Arc::new(NestedField::optional(
                        2,
                        "name",
                        Type::Primitive(PrimitiveType::String),
                    )),
                    Arc::new(NestedField::optional(
                        3,
                        "score",
                        Type::Primitive(PrimitiveType::Double),
                    )),
                ])
                .build()
                .unwrap(),
        )
    }

    fn column(schema: &SchemaRef, id: i32) -> ColumnHandle {
        ColumnHandle::for_field_id(schema, id).unwrap()
    }

    fn id_greater_than(schema: &SchemaRef, value: i64) -> TupleDomain<ColumnHandle> {
        TupleDomain::with_column_domains(vec![(
            column(schema, 1),
            Domain::from_ranges(vec![Range::greater_than(Datum::long(value))], false),
        )])
    }

    fn request(
        schema: &SchemaRef,
        path: &str,
        size: u64,
        format: DataFileFormat,
        columns: Vec<ColumnHandle>,
    ) -> PageSourceRequest {
        PageSourceRequest::builder()
            .columns(columns)
            .table_schema(schema.clone())
            .path(path)
            .start(0)
            .length(size)
            .file_size(size)
            .file_format(format)
            .build()
    }

    async fn collect(source: PageSource) -> RecordBatch {
        let batches: Vec<RecordBatch> = source.try_collect().await.unwrap();
        arrow_select::concat::concat_batches(&batches[0].schema(), &batches).unwrap()
    }

    fn ids(batch: &RecordBatch, index: usize) -> Vec<i64> {
        batch
            .column(index)
            .as_primitive::<Int64Type>()
            .values()
            .to_vec()
    }

    fn names(batch: &RecordBatch, index: usize) -> Vec<Option<String>> {
        batch
            .column(index)
            .as_string::<i32>()
            .iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn test_none_predicate_opens_nothing() {
        let storage = CountingStorage::default();
        let schema = table_schema();
        let mut request = request(
            &schema,
            "memory://warehouse/data/missing.parquet",
            100,
            DataFileFormat::Parquet,
            vec![column(&schema, 1)],
        );
        request.unenforced_predicate = TupleDomain::none();

        let source = PageSourceProvider::new(storage.file_io())
            .create_page_source(&ReaderProperties::default(), request)
            .await
            .unwrap();
        assert!(source.is_finished());
        assert_eq!(storage.total_opens(), 0);
    }

    #[tokio::test]
    async fn test_partition_value_excludes_split() {
        let storage = CountingStorage::default();
        let schema = table_schema();
        let mut request = request(
            &schema,
            "memory://warehouse/data/id=7/1.parquet",
            100,
            DataFileFormat::Parquet,
            vec![column(&schema, 1)],
        );
        request.partition_spec = Arc::new(PartitionSpec::new(1, vec![PartitionField::new(
            1,
            1000,
            "id",
            Transform::Identity,
        )]));
        request.partition_data = PartitionData::new(vec![Some("7".to_string())]);
        request.unenforced_predicate = TupleDomain::with_column_domains(vec![(
            column(&schema, 1),
            Domain::single_value(Datum::long(8)),
        )]);

        let source = PageSourceProvider::new(storage.file_io())
            .create_page_source(&ReaderProperties::default(), request)
            .await
            .unwrap();
        assert!(source.is_finished());
        assert_eq!(storage.total_opens(), 0);
    }

    #[tokio::test]
    async fn test_puffin_unsupported_before_open() {
        let storage = CountingStorage::default();
        let schema = table_schema();
        let request = request(
            &schema,
            "memory://warehouse/stats.puffin",
            100,
            DataFileFormat::Puffin,
            vec![column(&schema, 1)],
        );
        let err = PageSourceProvider::new(storage.file_io())
            .create_page_source(&ReaderProperties::default(), request)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FeatureUnsupported);
        assert_eq!(storage.total_opens(), 0);
    }

    #[tokio::test]
    async fn test_missing_file_cannot_open_split() {
        let storage = CountingStorage::default();
        let schema = table_schema();
        let request = request(
            &schema,
            "memory://warehouse/data/missing.parquet",
            100,
            DataFileFormat::Parquet,
            vec![column(&schema, 1)],
        );
        let err = PageSourceProvider::new(storage.file_io())
            .create_page_source(&ReaderProperties::default(), request)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CannotOpenSplit);
    }

    #[tokio::test]
    async fn test_missing_column_reads_as_nulls() {
        let storage = CountingStorage::default();
        let file_io = storage.file_io();
        let schema = table_schema();
        let path = "memory://warehouse/data/1.parquet";
        let size = write_parquet(&file_io, path, &[id_name_batch(&[1, 2], &["a", "b"])], None).await;

        let source = PageSourceProvider::new(file_io)
            .create_page_source(
                &ReaderProperties::default(),
                request(&schema, path, size, DataFileFormat::Parquet, vec![
                    column(&schema, 3),
                    column(&schema, 1),
                ]),
            )
            .await
            .unwrap();
        let batch = collect(source).await;
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.column(0).data_type(), &DataType::Float64);
        assert_eq!(batch.column(0).null_count(), 2);
        assert_eq!(ids(&batch, 1), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_close_twice() {
        let storage = CountingStorage::default();
        let file_io = storage.file_io();
        let schema = table_schema();
        let path = "memory://warehouse/data/1.parquet";
        let size = write_parquet(&file_io, path, &[id_name_batch(&[1], &["a"])], None).await;

        let mut source = PageSourceProvider::new(file_io)
            .create_page_source(
                &ReaderProperties::default(),
                request(&schema, path, size, DataFileFormat::Parquet, vec![column(&schema, 1)]),
            )
            .await
            .unwrap();
        source.close();
        source.close();
        assert!(source.is_finished());
        assert!(source.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_parquet_predicate_and_position_deletes() {
        let storage = CountingStorage::default();
        let file_io = storage.file_io();
        let schema = table_schema();
        let path = "memory://warehouse/data/1.parquet";
        let properties = WriterProperties::builder()
            .set_max_row_group_size(3)
            .build();
        let size = write_parquet(
            &file_io,
            path,
            &[id_name_batch(&[1, 2, 3, 4, 5, 6], &["a", "b", "c", "d", "e", "f"])],
            Some(properties),
        )
        .await;
        let deletes = write_position_deletes(
            &file_io,
            "memory://warehouse/deletes/pos.parquet",
            &[(path, 1), (path, 4)],
        )
        .await;

        let mut request = request(&schema, path, size, DataFileFormat::Parquet, vec![
            column(&schema, 1),
            ColumnHandle::row_position(),
        ]);
        request.unenforced_predicate = id_greater_than(&schema, 3);
        request.delete_files = vec![deletes];

        let source = PageSourceProvider::new(file_io)
            .create_page_source(&ReaderProperties::default(), request)
            .await
            .unwrap();
        assert!(!source.delete_filter_loaded());
        let batch = collect(source).await;
        assert_eq!(ids(&batch, 0), vec![4, 6]);
        assert_eq!(ids(&batch, 1), vec![3, 5]);
    }

    #[tokio::test]
    async fn test_parquet_bloom_filter_on_promoted_column() {
        let storage = CountingStorage::default();
        let file_io = storage.file_io();
        let schema = table_schema();
        let path = "memory://warehouse/data/int.parquet";
        // The file predates the int to long promotion of `id`.
        let file_schema = Arc::new(ArrowSchema::new(vec![id_field(
            "id",
            DataType::Int32,
            false,
            1,
        )]));
        let batch = RecordBatch::try_new(file_schema, vec![Arc::new(Int32Array::from(vec![
            1, 2, 3, 4, 5, 6,
        ])) as ArrayRef])
        .unwrap();
        let properties = WriterProperties::builder()
            .set_max_row_group_size(3)
            .set_bloom_filter_enabled(true)
            .build();
        let size = write_parquet(&file_io, path, &[batch], Some(properties)).await;

        let mut request = request(&schema, path, size, DataFileFormat::Parquet, vec![
            column(&schema, 1),
        ]);
        request.unenforced_predicate = TupleDomain::with_column_domains(vec![(
            column(&schema, 1),
            Domain::single_value(Datum::long(2)),
        )]);

        let source = PageSourceProvider::new(file_io)
            .create_page_source(&ReaderProperties::default(), request)
            .await
            .unwrap();
        let batch = collect(source).await;
        assert_eq!(ids(&batch, 0), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_orc_predicate_and_position_deletes() {
        let storage = CountingStorage::default();
        let file_io = storage.file_io();
        let schema = table_schema();
        let path = "memory://warehouse/data/1.orc";
        let size = write_orc(
            &file_io,
            path,
            &without_field_ids(&id_name_batch(&[1, 2, 3], &["a", "b", "c"])),
        )
        .await;
        let deletes =
            write_position_deletes(&file_io, "memory://warehouse/deletes/pos.parquet", &[(path, 2)])
                .await;
        let columns = vec![column(&schema, 1), column(&schema, 2)];

        // The stripe holds ids 1 to 3, so it can't be skipped for id > 1;
        // rows are only filtered by deletes.
        let mut request = request(&schema, path, size, DataFileFormat::Orc, columns);
        request.unenforced_predicate = id_greater_than(&schema, 1);
        request.delete_files = vec![deletes];
        let batch = collect(
            PageSourceProvider::new(file_io)
                .create_page_source(&ReaderProperties::default(), request)
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(ids(&batch, 0), vec![1, 2]);
        assert_eq!(names(&batch, 1), vec![Some("a".to_string()), Some("b".to_string())]);
    }

    #[tokio::test]
    async fn test_equality_delete_key_not_requested() {
        let storage = CountingStorage::default();
        let file_io = storage.file_io();
        let schema = table_schema();
        let path = "memory://warehouse/data/1.parquet";
        let size =
            write_parquet(&file_io, path, &[id_name_batch(&[1, 2, 3], &["a", "b", "c"])], None).await;
        let deletes: DeleteFile = write_equality_deletes(
            &file_io,
            "memory://warehouse/deletes/eq.parquet",
            &id_name_batch(&[2], &["ignored"]).project(&[0]).unwrap(),
            vec![1],
        )
        .await;

        let mut request = request(&schema, path, size, DataFileFormat::Parquet, vec![column(
            &schema, 2,
        )]);
        request.delete_files = vec![deletes];
        let batch = collect(
            PageSourceProvider::new(file_io)
                .create_page_source(&ReaderProperties::default(), request)
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(batch.num_columns(), 1);
        assert_eq!(names(&batch, 0), vec![Some("a".to_string()), Some("c".to_string())]);
    }

    #[tokio::test]
    async fn test_nested_columns_share_base_read() {
        let storage = CountingStorage::default();
        let file_io = storage.file_io();
        let schema: SchemaRef = Arc::new(
            Schema::builder()
                .with_fields(vec![Arc::new(NestedField::optional(
                    1,
                    "a",
                    Type::Struct(StructType::new(vec![
                        Arc::new(NestedField::optional(2, "b", PrimitiveType::Long.into())),
                        Arc::new(NestedField::optional(3, "d", PrimitiveType::String.into())),
                    ])),
                ))])
                .build()
                .unwrap(),
        );
        let children = Fields::from(vec![
            id_field("b", DataType::Int64, true, 2),
            id_field("d", DataType::Utf8, true, 3),
        ]);
        let struct_array = StructArray::new(
            children.clone(),
            vec![
                Arc::new(Int64Array::from(vec![10, 20])) as ArrayRef,
                Arc::new(StringArray::from(vec!["x", "y"])) as ArrayRef,
            ],
            None,
        );
        let batch = RecordBatch::try_new(
            Arc::new(arrow_schema::Schema::new(vec![id_field(
                "a",
                DataType::Struct(children),
                true,
                1,
            )])),
            vec![Arc::new(struct_array) as ArrayRef],
        )
        .unwrap();
        let path = "memory://warehouse/data/nested.parquet";
        let size = write_parquet(&file_io, path, &[batch], None).await;

        let columns = vec![column(&schema, 3), column(&schema, 2)];
        let batch = collect(
            PageSourceProvider::new(file_io)
                .create_page_source(
                    &ReaderProperties::default(),
                    request(&schema, path, size, DataFileFormat::Parquet, columns),
                )
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(names(&batch, 0), vec![Some("x".to_string()), Some("y".to_string())]);
        assert_eq!(ids(&batch, 1), vec![10, 20]);
    }

    #[tokio::test]
    async fn test_metadata_columns() {
        let storage = CountingStorage::default();
        let file_io = storage.file_io();
        let schema = table_schema();
        let path = "memory://warehouse/data/1.parquet";
        let size = write_parquet(&file_io, path, &[id_name_batch(&[1, 2], &["a", "b"])], None).await;

        let mut request = request(&schema, path, size, DataFileFormat::Parquet, vec![
            ColumnHandle::file_path(),
            ColumnHandle::is_deleted(),
            ColumnHandle::file_modified_time(),
            ColumnHandle::partition(),
        ]);
        request.partition_data_serialized = Some("{\"partitionValues\":[]}".to_string());
        let batch = collect(
            PageSourceProvider::new(file_io)
                .create_page_source(&ReaderProperties::default(), request)
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(names(&batch, 0), vec![Some(path.to_string()); 2]);
        assert_eq!(batch.column(1).as_boolean().true_count(), 0);
        assert_eq!(batch.column(2).null_count(), 0);
        assert_eq!(names(&batch, 3), vec![
            Some("{\"partitionValues\":[]}".to_string());
            2
        ]);
    }

    #[tokio::test]
    async fn test_file_modified_time_excludes_split() {
        let storage = CountingStorage::default();
        let file_io = storage.file_io();
        let schema = table_schema();
        let path = "memory://warehouse/data/1.parquet";
        let size = write_parquet(&file_io, path, &[id_name_batch(&[1], &["a"])], None).await;

        let mut request = request(&schema, path, size, DataFileFormat::Parquet, vec![column(
            &schema, 1,
        )]);
        request.unenforced_predicate = TupleDomain::with_column_domains(vec![(
            ColumnHandle::file_modified_time(),
            Domain::from_ranges(
                vec![Range::new(Bound::Unbounded, Bound::Excluded(Datum::timestamptz_micros(0))).unwrap()],
                false,
            ),
        )]);
        let source = PageSourceProvider::new(file_io)
            .create_page_source(&ReaderProperties::default(), request)
            .await
            .unwrap();
        assert!(source.is_finished());
        assert_eq!(storage.opens(path), 0);
    }

    #[tokio::test]
    async fn test_avro_with_name_mapping() {
        let storage = CountingStorage::default();
        let file_io = storage.file_io();
        let schema = table_schema();
        let path = "memory://warehouse/data/1.avro";
        let avro_schema = r#"{
            "type": "record",
            "name": "row",
            "fields": [
                {"name": "id", "type": "long"},
                {"name": "name", "type": ["null", "string"]}
            ]
        }"#;
        let size = write_avro(&file_io, path, avro_schema, vec![
            vec![
                ("id", AvroValue::Long(1)),
                ("name", AvroValue::Union(1, Box::new(AvroValue::String("a".to_string())))),
            ],
            vec![
                ("id", AvroValue::Long(2)),
                ("name", AvroValue::Union(0, Box::new(AvroValue::Null))),
            ],
        ])
        .await;
        let provider = PageSourceProvider::new(file_io);
        let name_mapping = Arc::new(NameMapping::new(&schema));
        let columns = vec![column(&schema, 2), column(&schema, 1), column(&schema, 3)];

        // Without a mapping no column of the file has an id.
        let unmapped = collect(
            provider
                .create_page_source(
                    &ReaderProperties::default(),
                    request(&schema, path, size, DataFileFormat::Avro, vec![column(&schema, 2)]),
                )
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(unmapped.column(0).null_count(), 2);

        let mut mapped = request(&schema, path, size, DataFileFormat::Avro, columns.clone());
        mapped.name_mapping = Some(name_mapping.clone());
        let batch = collect(
            provider
                .create_page_source(&ReaderProperties::default(), mapped)
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(names(&batch, 0), vec![Some("a".to_string()), None]);
        assert_eq!(ids(&batch, 1), vec![1, 2]);
        assert_eq!(batch.column(2).null_count(), 2);

        let mut later = request(&schema, path, size, DataFileFormat::Avro, columns);
        later.name_mapping = Some(name_mapping);
        later.start = 4;
        let mut source = provider
            .create_page_source(&ReaderProperties::default(), later)
            .await
            .unwrap();
        assert!(source.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_avro_position_deletes_without_row_range() {
        let storage = CountingStorage::default();
        let file_io = storage.file_io();
        let schema = table_schema();
        let path = "memory://warehouse/data/1.avro";
        let avro_schema = r#"{
            "type": "record",
            "name": "row",
            "fields": [{"name": "id", "type": "long", "field-id": 1}]
        }"#;
        let size = write_avro(
            &file_io,
            path,
            avro_schema,
            (1..=3).map(|id| vec![("id", AvroValue::Long(id))]).collect(),
        )
        .await;
        let delete_path = "memory://warehouse/deletes/pos.parquet";
        let mut deletes = write_position_deletes(&file_io, delete_path, &[(path, 1)]).await;
        // Bounds that would prune the file for a split covering other rows;
        // Avro reads have no row range, so they can't be used.
        deletes
            .lower_bounds
            .insert(RESERVED_FIELD_ID_DELETE_FILE_POS, 1i64.to_le_bytes().to_vec());
        deletes
            .upper_bounds
            .insert(RESERVED_FIELD_ID_DELETE_FILE_POS, 1i64.to_le_bytes().to_vec());

        let mut request = request(&schema, path, size, DataFileFormat::Avro, vec![column(&schema, 1)]);
        request.delete_files = vec![deletes];
        let batch = collect(
            PageSourceProvider::new(file_io)
                .create_page_source(&ReaderProperties::default(), request)
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(ids(&batch, 0), vec![1, 3]);
        assert!(storage.opens(delete_path) > 0);
    }

    #[tokio::test]
    async fn test_local_file_system() {
        let tmp_dir = tempfile::TempDir::new().unwrap();
        let file_io = FileIO::new_with_fs();
        let schema = table_schema();
        let path = format!("{}/data/1.parquet", tmp_dir.path().to_str().unwrap());
        let size = write_parquet(&file_io, &path, &[id_name_batch(&[1, 2], &["a", "b"])], None).await;

        let batch = collect(
            PageSourceProvider::new(file_io)
                .create_page_source(
                    &ReaderProperties::default(),
                    request(&schema, &path, size, DataFileFormat::Parquet, vec![
                        column(&schema, 2),
                        ColumnHandle::row_position(),
                    ]),
                )
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(names(&batch, 0), vec![Some("a".to_string()), Some("b".to_string())]);
        assert_eq!(ids(&batch, 1), vec![0, 1]);
    }

    #[test]
    fn test_required_columns_add_equality_keys() {
        let schema = table_schema();
        let mut request = request(&schema, "/data.parquet", 1, DataFileFormat::Parquet, vec![
            column(&schema, 2),
        ]);
        request.delete_files = vec![
            DeleteFile::builder()
                .file_path("/eq-1.parquet")
                .content(DataContentType::EqualityDeletes)
                .file_format(DataFileFormat::Parquet)
                .file_size_in_bytes(1)
                .equality_ids(vec![3, 2])
                .build(),
            DeleteFile::builder()
                .file_path("/eq-2.parquet")
                .content(DataContentType::EqualityDeletes)
                .file_format(DataFileFormat::Parquet)
                .file_size_in_bytes(1)
                .equality_ids(vec![1, 3])
                .build(),
        ];
        let required = required_columns(&request).unwrap();
        assert_eq!(required, vec![column(&schema, 2), column(&schema, 3), column(&schema, 1)]);
    }
}
