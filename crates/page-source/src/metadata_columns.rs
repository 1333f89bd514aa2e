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

//! Metadata columns (virtual/reserved fields) for Iceberg tables.
//!
//! These columns can be requested like any other column but are never read
//! from a data file. Page sources produce them from the split itself: the
//! file path, the row position, the partition tuple and so on.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::spec::{NestedField, NestedFieldRef, PrimitiveType, Type};

/// Reserved field ID for the file path (_file) column
pub const RESERVED_FIELD_ID_FILE: i32 = i32::MAX - 1;

/// Reserved field ID for the position (_pos) column
pub const RESERVED_FIELD_ID_POS: i32 = i32::MAX - 2;

/// Reserved field ID for the deleted (_deleted) column
pub const RESERVED_FIELD_ID_DELETED: i32 = i32::MAX - 3;

/// Reserved field ID for the partition ($partition) column
pub const RESERVED_FIELD_ID_PARTITION: i32 = i32::MAX - 5;

/// Reserved field ID for the file path in position delete files
pub const RESERVED_FIELD_ID_DELETE_FILE_PATH: i32 = i32::MAX - 101;

/// Reserved field ID for the position in position delete files
pub const RESERVED_FIELD_ID_DELETE_FILE_POS: i32 = i32::MAX - 102;

/// Reserved field ID for the file modification time ($file_modified_time) column
pub const RESERVED_FIELD_ID_FILE_MODIFIED_TIME: i32 = i32::MAX - 1001;

/// Reserved field ID for the row id composite used by merge
pub const RESERVED_FIELD_ID_MERGE_ROW_ID: i32 = i32::MIN;

/// Reserved field ID for the row id composite used by update
pub const RESERVED_FIELD_ID_UPDATE_ROW_ID: i32 = i32::MIN + 1;

/// Reserved column name for the file path metadata column
pub const RESERVED_COL_NAME_FILE: &str = "_file";

/// Reserved column name for the position metadata column
pub const RESERVED_COL_NAME_POS: &str = "_pos";

/// Reserved column name for the deleted metadata column
pub const RESERVED_COL_NAME_DELETED: &str = "_deleted";

/// Reserved column name for the partition metadata column
pub const RESERVED_COL_NAME_PARTITION: &str = "$partition";

/// Reserved column name for the file path in position delete files
pub const RESERVED_COL_NAME_DELETE_FILE_PATH: &str = "file_path";

/// Reserved column name for the position in position delete files
pub const RESERVED_COL_NAME_DELETE_FILE_POS: &str = "pos";

/// Reserved column name for the file modification time metadata column
pub const RESERVED_COL_NAME_FILE_MODIFIED_TIME: &str = "$file_modified_time";

/// Reserved column name for the merge row id
pub const RESERVED_COL_NAME_MERGE_ROW_ID: &str = "$merge_row_id";

/// Reserved column name for the update row id
pub const RESERVED_COL_NAME_UPDATE_ROW_ID: &str = "$update_row_id";

static FILE_FIELD: Lazy<NestedFieldRef> = Lazy::new(|| {
    Arc::new(NestedField::required(
        RESERVED_FIELD_ID_FILE,
        RESERVED_COL_NAME_FILE,
        Type::Primitive(PrimitiveType::String),
    ))
});

static POS_FIELD: Lazy<NestedFieldRef> = Lazy::new(|| {
    Arc::new(NestedField::required(
        RESERVED_FIELD_ID_POS,
        RESERVED_COL_NAME_POS,
        Type::Primitive(PrimitiveType::Long),
    ))
});

static DELETED_FIELD: Lazy<NestedFieldRef> = Lazy::new(|| {
    Arc::new(NestedField::required(
        RESERVED_FIELD_ID_DELETED,
        RESERVED_COL_NAME_DELETED,
        Type::Primitive(PrimitiveType::Boolean),
    ))
});

static PARTITION_FIELD: Lazy<NestedFieldRef> = Lazy::new(|| {
    Arc::new(NestedField::optional(
        RESERVED_FIELD_ID_PARTITION,
        RESERVED_COL_NAME_PARTITION,
        Type::Primitive(PrimitiveType::String),
    ))
});

static FILE_MODIFIED_TIME_FIELD: Lazy<NestedFieldRef> = Lazy::new(|| {
    Arc::new(NestedField::required(
        RESERVED_FIELD_ID_FILE_MODIFIED_TIME,
        RESERVED_COL_NAME_FILE_MODIFIED_TIME,
        Type::Primitive(PrimitiveType::Timestamptz),
    ))
});

static DELETE_FILE_PATH_FIELD: Lazy<NestedFieldRef> = Lazy::new(|| {
    Arc::new(NestedField::required(
        RESERVED_FIELD_ID_DELETE_FILE_PATH,
        RESERVED_COL_NAME_DELETE_FILE_PATH,
        Type::Primitive(PrimitiveType::String),
    ))
});

static DELETE_FILE_POS_FIELD: Lazy<NestedFieldRef> = Lazy::new(|| {
    Arc::new(NestedField::required(
        RESERVED_FIELD_ID_DELETE_FILE_POS,
        RESERVED_COL_NAME_DELETE_FILE_POS,
        Type::Primitive(PrimitiveType::Long),
    ))
});

/// Field of the `_file` column.
pub fn file_path_field() -> &'static NestedFieldRef {
    &FILE_FIELD
}

/// Field of the `_pos` column.
pub fn pos_field() -> &'static NestedFieldRef {
    &POS_FIELD
}

/// Field of the `_deleted` column.
pub fn is_deleted_field() -> &'static NestedFieldRef {
    &DELETED_FIELD
}

/// Field of the `$partition` column, holding the serialized partition tuple.
pub fn partition_field() -> &'static NestedFieldRef {
    &PARTITION_FIELD
}

/// Field of the `$file_modified_time` column.
pub fn file_modified_time_field() -> &'static NestedFieldRef {
    &FILE_MODIFIED_TIME_FIELD
}

/// Field of the `file_path` column of position delete files.
pub fn delete_file_path_field() -> &'static NestedFieldRef {
    &DELETE_FILE_PATH_FIELD
}

/// Field of the `pos` column of position delete files.
pub fn delete_file_pos_field() -> &'static NestedFieldRef {
    &DELETE_FILE_POS_FIELD
}

/// Field of a row id composite, for merge or update.
pub fn row_id_field(merge: bool, row_type: Type) -> NestedFieldRef {
    let (id, name) = if merge {
        (RESERVED_FIELD_ID_MERGE_ROW_ID, RESERVED_COL_NAME_MERGE_ROW_ID)
    } else {
        (RESERVED_FIELD_ID_UPDATE_ROW_ID, RESERVED_COL_NAME_UPDATE_ROW_ID)
    };
    Arc::new(NestedField::optional(id, name, row_type))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_metadata_fields() {
        assert_eq!(file_path_field().id, RESERVED_FIELD_ID_FILE);
        assert_eq!(pos_field().name, "_pos");
        assert_eq!(
            *file_modified_time_field().field_type,
            Type::Primitive(PrimitiveType::Timestamptz)
        );
        assert_eq!(
            row_id_field(true, Type::Primitive(PrimitiveType::Long)).id,
            RESERVED_FIELD_ID_MERGE_ROW_ID
        );
    }
}
