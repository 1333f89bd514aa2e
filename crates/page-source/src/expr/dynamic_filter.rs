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

use std::fmt::Debug;

use super::TupleDomain;
use crate::scan::ColumnHandle;

/// A predicate that may tighten while a scan is running, for example from
/// the build side of a join.
///
/// The page source provider asks for the current predicate once, when the
/// page source is created.
pub trait DynamicFilter: Debug + Send + Sync {
    /// The predicate known right now.
    fn current_predicate(&self) -> TupleDomain<ColumnHandle>;
}

/// A dynamic filter that never constrains anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyDynamicFilter;

impl DynamicFilter for EmptyDynamicFilter {
    fn current_predicate(&self) -> TupleDomain<ColumnHandle> {
        TupleDomain::all()
    }
}
