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

use roaring::RoaringTreemap;

/// A set of deleted row positions in one data file.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct DeleteVector {
    inner: RoaringTreemap,
}

impl DeleteVector {
    pub(crate) fn insert(&mut self, pos: u64) -> bool {
        self.inner.insert(pos)
    }

    pub(crate) fn contains(&self, pos: u64) -> bool {
        self.inner.contains(pos)
    }

    pub(crate) fn len(&self) -> u64 {
        self.inner.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_delete_vector() {
        let mut deletes = DeleteVector::default();
        assert!(deletes.is_empty());
        assert!(deletes.insert(7));
        assert!(deletes.insert(3));
        assert!(!deletes.insert(7));
        assert!(deletes.insert(1 << 40));

        assert_eq!(deletes.len(), 3);
        assert!(deletes.contains(3));
        assert!(!deletes.contains(4));
        assert!(deletes.contains(1 << 40));
    }
}
