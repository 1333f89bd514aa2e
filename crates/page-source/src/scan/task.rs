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

use typed_builder::TypedBuilder;

use super::ColumnHandle;
use crate::expr::{DynamicFilter, EmptyDynamicFilter, TupleDomain};
use crate::spec::{
    DataFileFormat, DeleteFile, NameMapping, PartitionData, PartitionSpec, PartitionSpecRef,
    SchemaRef,
};

/// Everything needed to build the page source of one split of a data file.
#[derive(Debug, Clone, TypedBuilder)]
pub struct PageSourceRequest {
    /// Requested columns, in output order.
    pub columns: Vec<ColumnHandle>,
    /// Current table schema.
    pub table_schema: SchemaRef,
    /// Partition spec the data file was written with.
    #[builder(default = Arc::new(PartitionSpec::unpartitioned()))]
    pub partition_spec: PartitionSpecRef,
    /// Partition tuple of the data file.
    #[builder(default)]
    pub partition_data: PartitionData,
    /// Serialized partition tuple, the value of the `$partition` column.
    #[builder(default, setter(strip_option, into))]
    pub partition_data_serialized: Option<String>,
    /// Delete files that apply to the data file.
    #[builder(default)]
    pub delete_files: Vec<DeleteFile>,
    /// Predicate that may tighten during the scan.
    #[builder(default = Arc::new(EmptyDynamicFilter))]
    pub dynamic_filter: Arc<dyn DynamicFilter>,
    /// Predicate not enforced by the engine, used to prune the split.
    #[builder(default)]
    pub unenforced_predicate: TupleDomain<ColumnHandle>,
    /// Path of the data file.
    #[builder(setter(into))]
    pub path: String,
    /// Start of the split, in bytes.
    pub start: u64,
    /// Length of the split, in bytes.
    pub length: u64,
    /// Size of the whole data file, in bytes.
    pub file_size: u64,
    /// Format of the data file.
    pub file_format: DataFileFormat,
    /// Name mapping for files written without field ids. When absent, ORC
    /// files are mapped by the names of the table schema.
    #[builder(default, setter(strip_option))]
    pub name_mapping: Option<Arc<NameMapping>>,
}
