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

use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use super::{LocalFsStorage, MemoryStorage, Storage};
use crate::{Error, ErrorKind, Result};

/// FileIO implementation, used to manipulate files in underlying storage.
///
/// All paths passed to `FileIO` must be absolute paths starting with a scheme
/// the backing storage understands, or plain local paths.
#[derive(Clone, Debug)]
pub struct FileIO {
    storage: Arc<dyn Storage>,
}

impl FileIO {
    /// Create a new FileIO backed by in-memory storage.
    pub fn new_with_memory() -> Self {
        Self::from_storage(Arc::new(MemoryStorage::new()))
    }

    /// Create a new FileIO backed by local filesystem storage.
    pub fn new_with_fs() -> Self {
        Self::from_storage(Arc::new(LocalFsStorage::new()))
    }

    /// Create a new FileIO on top of an existing storage backend.
    pub fn from_storage(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Check file exists.
    pub async fn exists(&self, path: impl AsRef<str>) -> Result<bool> {
        self.storage.exists(path.as_ref()).await
    }

    /// Creates input file.
    pub fn new_input(&self, path: impl AsRef<str>) -> Result<InputFile> {
        self.open_for_read(path, None)
    }

    /// Creates an input file whose length is already known to the caller.
    ///
    /// When `size` is given, [`InputFile::length`] and [`InputFile::read`]
    /// don't need a metadata request against the storage.
    pub fn open_for_read(&self, path: impl AsRef<str>, size: Option<u64>) -> Result<InputFile> {
        let path = path.as_ref();
        if path.is_empty() {
            return Err(Error::new(
                ErrorKind::PreconditionFailed,
                "Input file path is empty",
            ));
        }
        Ok(InputFile {
            storage: self.storage.clone(),
            path: path.to_string(),
            known_size: size,
        })
    }

    /// Creates output file.
    pub fn new_output(&self, path: impl AsRef<str>) -> Result<OutputFile> {
        Ok(OutputFile {
            storage: self.storage.clone(),
            path: path.as_ref().to_string(),
        })
    }
}

/// The struct the represents the metadata of a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// The size of the file.
    pub size: u64,
    /// Last modification time of the file, when the storage tracks it.
    pub last_modified: Option<DateTime<Utc>>,
}

/// Trait for reading file.
///
/// # TODO
/// It's possible for us to remove the async_trait, but we need to figure
/// out how to handle the object safety.
#[async_trait::async_trait]
pub trait FileRead: Send + Sync + Unpin + 'static {
    /// Read file content with given range.
    async fn read(&self, range: Range<u64>) -> Result<Bytes>;
}

/// Input file is used for reading from files.
#[derive(Debug, Clone)]
pub struct InputFile {
    storage: Arc<dyn Storage>,
    // Absolute path of file.
    path: String,
    known_size: Option<u64>,
}

impl InputFile {
    /// Absolute path to root uri.
    pub fn location(&self) -> &str {
        &self.path
    }

    /// Check if file exists.
    pub async fn exists(&self) -> Result<bool> {
        self.storage.exists(&self.path).await
    }

    /// Fetch and returns metadata of file.
    pub async fn metadata(&self) -> Result<FileMetadata> {
        self.storage.metadata(&self.path).await
    }

    /// Length of the file, from the size supplied at open time when there is one.
    pub async fn length(&self) -> Result<u64> {
        match self.known_size {
            Some(size) => Ok(size),
            None => Ok(self.metadata().await?.size),
        }
    }

    /// Last modification time of the file.
    pub async fn last_modified(&self) -> Result<DateTime<Utc>> {
        self.metadata().await?.last_modified.ok_or_else(|| {
            Error::new(
                ErrorKind::FeatureUnsupported,
                "Storage doesn't track file modification time",
            )
            .with_context("path", &self.path)
        })
    }

    /// Read and returns whole content of file.
    pub async fn read(&self) -> Result<Bytes> {
        match self.known_size {
            Some(size) => self.reader().await?.read(0..size).await,
            None => self.storage.read(&self.path).await,
        }
    }

    /// Creates [`FileRead`] for continuous reading.
    ///
    /// For one-time reading, use [`Self::read`] instead.
    pub async fn reader(&self) -> Result<Box<dyn FileRead>> {
        self.storage.reader(&self.path).await
    }
}

/// Output file is used for writing to files.
#[derive(Debug)]
pub struct OutputFile {
    storage: Arc<dyn Storage>,
    // Absolute path of file.
    path: String,
}

impl OutputFile {
    /// Relative path to root uri.
    pub fn location(&self) -> &str {
        &self.path
    }

    /// Write bytes to file, replacing any previous content.
    pub async fn write(&self, bs: Bytes) -> Result<()> {
        self.storage.write(&self.path, bs).await
    }

    /// Converts an output file into an input file.
    pub fn to_input_file(self) -> InputFile {
        InputFile {
            storage: self.storage,
            path: self.path,
            known_size: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs::{create_dir_all, File};
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_local_input_file() {
        let tmp_dir = TempDir::new().unwrap();
        let file_name = "a.txt";
        let content = "Iceberg loves rust.";
        let full_path = format!("{}/{}", tmp_dir.path().to_str().unwrap(), file_name);

        create_dir_all(tmp_dir.path()).unwrap();
        let mut f = File::create(&full_path).unwrap();
        f.write_all(content.as_bytes()).unwrap();

        let file_io = FileIO::new_with_fs();
        let input_file = file_io.new_input(&full_path).unwrap();

        assert!(input_file.exists().await.unwrap());
        assert_eq!(input_file.length().await.unwrap(), content.len() as u64);
        assert!(input_file.last_modified().await.is_ok());
        assert_eq!(&input_file.read().await.unwrap()[..], content.as_bytes());

        let reader = input_file.reader().await.unwrap();
        assert_eq!(&reader.read(8..13).await.unwrap()[..], b"loves");
    }

    #[tokio::test]
    async fn test_known_size_skips_metadata() {
        let file_io = FileIO::new_with_memory();
        let input_file = file_io.open_for_read("memory://missing", Some(42)).unwrap();

        // The object doesn't exist, but the length comes from the caller.
        assert_eq!(input_file.length().await.unwrap(), 42);
        assert!(input_file.metadata().await.is_err());
    }

    #[tokio::test]
    async fn test_memory_io() {
        let file_io = FileIO::new_with_memory();
        let path = "memory://warehouse/data/file.bin";

        let output = file_io.new_output(path).unwrap();
        output.write(Bytes::from_static(b"0123456789")).await.unwrap();

        let input = output.to_input_file();
        assert_eq!(input.length().await.unwrap(), 10);
        assert_eq!(&input.reader().await.unwrap().read(2..5).await.unwrap()[..], b"234");

        let sized = file_io.open_for_read(path, Some(10)).unwrap();
        assert_eq!(&sized.read().await.unwrap()[..], b"0123456789");
    }

    #[test]
    fn test_empty_path_is_rejected() {
        let err = FileIO::new_with_memory().new_input("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    }
}
