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

//! In-memory storage, mostly useful for tests.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::{FileMetadata, FileRead, Storage};
use crate::{Error, ErrorKind, Result};

#[derive(Debug, Clone)]
struct MemoryObject {
    content: Bytes,
    last_modified: DateTime<Utc>,
}

/// In-memory storage implementation backed by a thread-safe `HashMap`.
///
/// `memory://path/to/file`, `memory:/path/to/file` and `/path/to/file` all
/// address the object `path/to/file`.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    data: Arc<RwLock<HashMap<String, MemoryObject>>>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage` instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn normalize_path(path: &str) -> String {
        let path = path.strip_prefix("memory://").unwrap_or(path);
        let path = path.strip_prefix("memory:/").unwrap_or(path);
        path.trim_start_matches('/').to_string()
    }

    fn get(&self, path: &str) -> Result<MemoryObject> {
        let normalized = Self::normalize_path(path);
        let data = self.data.read().map_err(|e| {
            Error::new(
                ErrorKind::Unexpected,
                format!("Failed to acquire read lock: {e}"),
            )
        })?;
        data.get(&normalized).cloned().ok_or_else(|| {
            Error::new(ErrorKind::Unexpected, format!("File not found: {path}"))
        })
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.get(path).is_ok())
    }

    async fn metadata(&self, path: &str) -> Result<FileMetadata> {
        let object = self.get(path)?;
        Ok(FileMetadata {
            size: object.content.len() as u64,
            last_modified: Some(object.last_modified),
        })
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        Ok(self.get(path)?.content)
    }

    async fn reader(&self, path: &str) -> Result<Box<dyn FileRead>> {
        Ok(Box::new(MemoryFileRead {
            content: self.get(path)?.content,
        }))
    }

    async fn write(&self, path: &str, bs: Bytes) -> Result<()> {
        let normalized = Self::normalize_path(path);
        let mut data = self.data.write().map_err(|e| {
            Error::new(
                ErrorKind::Unexpected,
                format!("Failed to acquire write lock: {e}"),
            )
        })?;
        data.insert(normalized, MemoryObject {
            content: bs,
            last_modified: Utc::now(),
        });
        Ok(())
    }
}

/// File reader for in-memory storage.
#[derive(Debug)]
pub struct MemoryFileRead {
    content: Bytes,
}

#[async_trait]
impl FileRead for MemoryFileRead {
    async fn read(&self, range: Range<u64>) -> Result<Bytes> {
        let start = usize::try_from(range.start)?;
        let end = usize::try_from(range.end)?;
        if start > end || end > self.content.len() {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!(
                    "Range {start}..{end} is out of bounds for an object of {} bytes",
                    self.content.len()
                ),
            ));
        }
        Ok(self.content.slice(start..end))
    }
}
