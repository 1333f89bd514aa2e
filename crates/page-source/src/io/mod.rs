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

//! File io implementation.
//!
//! Page sources read every data and delete file through [`FileIO`], which
//! dispatches to a [`Storage`] backend:
//!
//! | Storage            | Path prefix                  |
//! |--------------------|------------------------------|
//! | Local file system  | `file://`, `file:/` or none  |
//! | Memory             | `memory://`                  |
//!
//! ```rust
//! use iceberg_page_source::io::FileIO;
//! use iceberg_page_source::Result;
//!
//! # async fn example() -> Result<()> {
//! let file_io = FileIO::new_with_memory();
//! let input = file_io.open_for_read("memory://warehouse/data.parquet", Some(1024))?;
//! assert_eq!(input.length().await?, 1024);
//! # Ok(())
//! # }
//! ```

mod file_io;
mod local_fs;
mod memory;
mod storage;

pub use file_io::*;
pub use local_fs::*;
pub use memory::*;
pub use storage::*;
