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

//! Local filesystem storage.

use std::io::{ErrorKind as IoErrorKind, SeekFrom};
use std::ops::Range;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

use super::{FileMetadata, FileRead, Storage};
use crate::{Error, ErrorKind, Result};

/// Local filesystem storage implementation.
///
/// # Path Normalization
///
/// - `file:///path/to/file` -> `/path/to/file`
/// - `file:/path/to/file` -> `/path/to/file`
/// - `/path/to/file` -> `/path/to/file`
#[derive(Debug, Clone, Default)]
pub struct LocalFsStorage;

impl LocalFsStorage {
    /// Create a new `LocalFsStorage` instance.
    pub fn new() -> Self {
        Self
    }

    pub(crate) fn normalize_path(path: &str) -> PathBuf {
        let path = match path
            .strip_prefix("file://")
            .or_else(|| path.strip_prefix("file:"))
        {
            Some(stripped) if stripped.starts_with('/') => stripped.to_string(),
            Some(stripped) => format!("/{stripped}"),
            None => path.to_string(),
        };
        PathBuf::from(path)
    }
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> Error {
    // Interrupted and timed out reads are worth another attempt by the caller.
    let retryable = matches!(e.kind(), IoErrorKind::Interrupted | IoErrorKind::TimedOut);
    Error::new(
        ErrorKind::Unexpected,
        format!("Failed to {action} {}", path.display()),
    )
    .with_retryable(retryable)
    .with_source(e)
}

#[async_trait]
impl Storage for LocalFsStorage {
    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(Self::normalize_path(path).exists())
    }

    async fn metadata(&self, path: &str) -> Result<FileMetadata> {
        let path = Self::normalize_path(path);
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| io_error("stat", &path, e))?;
        Ok(FileMetadata {
            size: metadata.len(),
            last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        let path = Self::normalize_path(path);
        let content = fs::read(&path)
            .await
            .map_err(|e| io_error("read", &path, e))?;
        Ok(Bytes::from(content))
    }

    async fn reader(&self, path: &str) -> Result<Box<dyn FileRead>> {
        let path = Self::normalize_path(path);
        let file = fs::File::open(&path)
            .await
            .map_err(|e| io_error("open", &path, e))?;
        Ok(Box::new(LocalFsFileRead {
            file: Mutex::new(file),
            path,
        }))
    }

    async fn write(&self, path: &str, bs: Bytes) -> Result<()> {
        let path = Self::normalize_path(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error("create directory", parent, e))?;
        }
        fs::write(&path, &bs)
            .await
            .map_err(|e| io_error("write", &path, e))
    }
}

/// File reader for local filesystem storage.
#[derive(Debug)]
pub struct LocalFsFileRead {
    file: Mutex<fs::File>,
    path: PathBuf,
}

#[async_trait]
impl FileRead for LocalFsFileRead {
    async fn read(&self, range: Range<u64>) -> Result<Bytes> {
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(range.start))
            .await
            .map_err(|e| io_error("seek", &self.path, e))?;

        let len = usize::try_from(range.end.saturating_sub(range.start))?;
        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)
            .await
            .map_err(|e| io_error("read", &self.path, e))?;
        Ok(Bytes::from(buffer))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            LocalFsStorage::normalize_path("file:///tmp/a"),
            PathBuf::from("/tmp/a")
        );
        assert_eq!(
            LocalFsStorage::normalize_path("file:/tmp/a"),
            PathBuf::from("/tmp/a")
        );
        assert_eq!(
            LocalFsStorage::normalize_path("/tmp/a"),
            PathBuf::from("/tmp/a")
        );
    }

    #[tokio::test]
    async fn test_missing_file() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("missing.orc");
        let err = LocalFsStorage::new()
            .reader(path.to_str().unwrap())
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert!(!err.retryable());
    }

    #[tokio::test]
    async fn test_read_past_end_fails() {
        let tmp_dir = TempDir::new().unwrap();
        let path = tmp_dir.path().join("short.bin");
        let storage = LocalFsStorage::new();
        storage
            .write(path.to_str().unwrap(), Bytes::from_static(b"abc"))
            .await
            .unwrap();

        let reader = storage.reader(path.to_str().unwrap()).await.unwrap();
        assert!(reader.read(0..10).await.is_err());
    }
}
