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

//! Page sources for Apache Iceberg data files.
//!
//! This crate turns a logical scan of one file split (requested columns,
//! a byte range, a predicate, partition constants and delete files) into a
//! lazy stream of Arrow record batches decoded from ORC, Parquet or Avro.
//!
//! # Examples
//!
//! ```rust, no_run
//! use std::sync::Arc;
//!
//! use futures::TryStreamExt;
//! use iceberg_page_source::expr::{EmptyDynamicFilter, TupleDomain};
//! use iceberg_page_source::io::FileIO;
//! use iceberg_page_source::scan::{ColumnHandle, PageSourceRequest};
//! use iceberg_page_source::spec::{
//!     DataFileFormat, NestedField, PrimitiveType, ReaderProperties, Schema, Type,
//! };
//! use iceberg_page_source::{PageSourceProvider, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let schema = Arc::new(
//!         Schema::builder()
//!             .with_fields(vec![Arc::new(NestedField::required(
//!                 1,
//!                 "id",
//!                 Type::Primitive(PrimitiveType::Long),
//!             ))])
//!             .build()?,
//!     );
//!     let id = ColumnHandle::from_field(schema.field_by_id(1).unwrap().clone());
//!
//!     let provider = PageSourceProvider::new(FileIO::new_with_fs());
//!     let request = PageSourceRequest::builder()
//!         .columns(vec![id])
//!         .table_schema(schema)
//!         .path("/tmp/data.parquet".to_string())
//!         .start(0)
//!         .length(1024)
//!         .file_size(1024)
//!         .file_format(DataFileFormat::Parquet)
//!         .dynamic_filter(Arc::new(EmptyDynamicFilter))
//!         .unenforced_predicate(TupleDomain::all())
//!         .build();
//!
//!     let batches: Vec<_> = provider
//!         .create_page_source(&ReaderProperties::default(), request)
//!         .await?
//!         .try_collect()
//!         .await?;
//!     println!("{batches:?}");
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]

#[macro_use]
extern crate serde_derive;

mod error;
pub use error::{Error, ErrorKind, Result};

pub mod arrow;
mod delete_vector;
pub mod expr;
pub mod io;
pub mod metadata_columns;
mod page_source;
pub use page_source::PageSource;
mod provider;
pub use provider::PageSourceProvider;
pub mod scan;
pub mod spec;

#[cfg(test)]
mod test_utils;
