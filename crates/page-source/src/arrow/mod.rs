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

//! Arrow based readers and the column, predicate and delete plumbing around them.

mod schema;
pub use schema::*;
mod value;

mod reconcile;
pub use reconcile::{FileField, FileFieldKind, FileFields, ResolvedColumn};
mod conform;
mod projection;
pub use projection::*;
pub(crate) mod adaptation;
pub use adaptation::{ColumnAdaptation, SourceColumn};
mod predicate;
pub use predicate::*;

pub(crate) mod reader;
pub use reader::{ReaderBatch, ReaderPageSource, RowPositionRange};

pub(crate) mod delete_file_loader;
mod delete_filter;
pub use delete_filter::{DeleteFilter, EqualityDeleteSet, PositionDeleteSet};
pub(crate) use delete_filter::{DeleteFilterContext, LazyDeleteFilter};
