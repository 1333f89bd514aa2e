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

//! Storage trait used by [`FileIO`](super::FileIO).

use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;

use super::{FileMetadata, FileRead};
use crate::Result;

/// Trait for storage operations in Iceberg.
///
/// Implementations must be safe to share between page sources of
/// concurrently processed splits.
#[async_trait]
pub trait Storage: Debug + Send + Sync {
    /// Check if a file exists at the given path.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Get metadata from an input path.
    async fn metadata(&self, path: &str) -> Result<FileMetadata>;

    /// Read bytes from a path.
    async fn read(&self, path: &str) -> Result<Bytes>;

    /// Get a FileRead instance for reading byte ranges of a path.
    async fn reader(&self, path: &str) -> Result<Box<dyn FileRead>>;

    /// Write bytes to an output path.
    async fn write(&self, path: &str, bs: Bytes) -> Result<()>;
}
