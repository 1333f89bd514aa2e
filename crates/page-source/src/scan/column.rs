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

use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};

use crate::metadata_columns::*;
use crate::spec::{NestedFieldRef, Schema, Type};
use crate::{Error, ErrorKind, Result};

/// What a column means to the page source, besides its field id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnRole {
    /// A column stored in the data file.
    Regular,
    /// `_pos`, the position of the row in its data file.
    RowPosition,
    /// `_file`, the path of the data file.
    FilePath,
    /// `$file_modified_time`, the modification time of the data file.
    FileModifiedTime,
    /// `$partition`, the serialized partition tuple of the data file.
    Partition,
    /// `_deleted`, always false for rows that survive delete filtering.
    IsDeleted,
    /// Row id composite of an update, assembled above the page source.
    UpdateRowId,
    /// Row id composite of a merge, assembled above the page source.
    MergeRowId,
}

impl ColumnRole {
    fn from_field_id(id: i32) -> Self {
        match id {
            RESERVED_FIELD_ID_POS => ColumnRole::RowPosition,
            RESERVED_FIELD_ID_FILE => ColumnRole::FilePath,
            RESERVED_FIELD_ID_FILE_MODIFIED_TIME => ColumnRole::FileModifiedTime,
            RESERVED_FIELD_ID_PARTITION => ColumnRole::Partition,
            RESERVED_FIELD_ID_DELETED => ColumnRole::IsDeleted,
            RESERVED_FIELD_ID_UPDATE_ROW_ID => ColumnRole::UpdateRowId,
            RESERVED_FIELD_ID_MERGE_ROW_ID => ColumnRole::MergeRowId,
            _ => ColumnRole::Regular,
        }
    }
}

/// A column requested from a page source.
///
/// A column is either a base column (a top level field of the table) or a
/// dereference of a base column: the path holds the field ids of the struct
/// fields walked from the base column down to the projected field.
///
/// Two handles are equal when they have the same base column id and the
/// same dereference path.
#[derive(Debug, Clone)]
pub struct ColumnHandle {
    base: NestedFieldRef,
    path: Vec<i32>,
    field: NestedFieldRef,
    qualified_name: String,
    role: ColumnRole,
}

impl PartialEq for ColumnHandle {
    fn eq(&self, other: &Self) -> bool {
        self.base.id == other.base.id && self.path == other.path
    }
}

impl Eq for ColumnHandle {}

impl Hash for ColumnHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.base.id.hash(state);
        self.path.hash(state);
    }
}

impl Display for ColumnHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.qualified_name, self.id(), self.field.field_type)
    }
}

impl ColumnHandle {
    /// Creates a base column for a top level field.
    pub fn from_field(field: NestedFieldRef) -> Self {
        Self {
            role: ColumnRole::from_field_id(field.id),
            qualified_name: field.name.clone(),
            path: vec![],
            field: field.clone(),
            base: field,
        }
    }

    /// Creates a column dereferencing `path` from the base field.
    ///
    /// Every step of the path must name a field of the struct reached so far.
    pub fn nested(base: NestedFieldRef, path: Vec<i32>) -> Result<Self> {
        let mut field = base.clone();
        let mut qualified_name = base.name.clone();
        for id in &path {
            let child = match field.field_type.as_ref() {
                Type::Struct(s) => s.field_by_id(*id).cloned(),
                _ => None,
            }
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::PreconditionFailed,
                    format!("Field {id} is not a struct field under {qualified_name}"),
                )
            })?;
            qualified_name.push('.');
            qualified_name.push_str(&child.name);
            field = child;
        }

        Ok(Self {
            role: ColumnRole::Regular,
            base,
            path,
            field,
            qualified_name,
        })
    }

    /// Creates the column reading a field of `schema`, nested or not.
    pub fn for_field_id(schema: &Schema, field_id: i32) -> Result<Self> {
        let ids = schema.field_id_path(field_id).ok_or_else(|| {
            Error::new(
                ErrorKind::PreconditionFailed,
                format!("Field {field_id} is not in the table schema"),
            )
        })?;
        let base = schema
            .as_struct()
            .field_by_id(ids[0])
            .cloned()
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::PreconditionFailed,
                    format!("Field {field_id} is not reachable from a top level field"),
                )
            })?;
        if ids.len() == 1 {
            Ok(Self::from_field(base))
        } else {
            Self::nested(base, ids[1..].to_vec())
        }
    }

    /// The `_pos` column.
    pub fn row_position() -> Self {
        Self::from_field(pos_field().clone())
    }

    /// The `_file` column.
    pub fn file_path() -> Self {
        Self::from_field(file_path_field().clone())
    }

    /// The `$file_modified_time` column.
    pub fn file_modified_time() -> Self {
        Self::from_field(file_modified_time_field().clone())
    }

    /// The `$partition` column.
    pub fn partition() -> Self {
        Self::from_field(partition_field().clone())
    }

    /// The `_deleted` column.
    pub fn is_deleted() -> Self {
        Self::from_field(is_deleted_field().clone())
    }

    /// The merge row id column with the given composite type.
    pub fn merge_row_id(row_type: Type) -> Self {
        Self::from_field(row_id_field(true, row_type))
    }

    /// The update row id column with the given composite type.
    pub fn update_row_id(row_type: Type) -> Self {
        Self::from_field(row_id_field(false, row_type))
    }

    /// Field id of the projected field.
    pub fn id(&self) -> i32 {
        self.field.id
    }

    /// Field id of the base column.
    pub fn base_id(&self) -> i32 {
        self.base.id
    }

    /// The field projected by this column.
    pub fn field(&self) -> &NestedFieldRef {
        &self.field
    }

    /// The top level field this column is read from.
    pub fn base_field(&self) -> &NestedFieldRef {
        &self.base
    }

    /// Type of the projected field.
    pub fn field_type(&self) -> &Type {
        &self.field.field_type
    }

    /// Dot separated names from the base column to the projected field.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Field ids of the dereference chain, empty for base columns.
    pub fn path(&self) -> &[i32] {
        &self.path
    }

    /// The role of this column.
    pub fn role(&self) -> ColumnRole {
        self.role
    }

    /// Whether this is a base column.
    pub fn is_base_column(&self) -> bool {
        self.path.is_empty()
    }

    /// The base column this column dereferences.
    pub fn base_column(&self) -> ColumnHandle {
        if self.is_base_column() {
            self.clone()
        } else {
            Self::from_field(self.base.clone())
        }
    }

    /// Whether this column is the `_pos` column.
    pub fn is_row_position(&self) -> bool {
        self.role == ColumnRole::RowPosition
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::spec::{NestedField, PrimitiveType, StructType};

    fn struct_field() -> NestedFieldRef {
        Arc::new(NestedField::optional(
            1,
            "a",
            Type::Struct(StructType::new(vec![
                Arc::new(NestedField::optional(
                    2,
                    "b",
                    Type::Struct(StructType::new(vec![Arc::new(NestedField::optional(
                        3,
                        "c",
                        PrimitiveType::Int.into(),
                    ))])),
                )),
                Arc::new(NestedField::optional(4, "d", PrimitiveType::String.into())),
            ])),
        ))
    }

    #[test]
    fn test_nested_column() {
        let column = ColumnHandle::nested(struct_field(), vec![2, 3]).unwrap();
        assert_eq!(column.id(), 3);
        assert_eq!(column.base_id(), 1);
        assert_eq!(column.qualified_name(), "a.b.c");
        assert!(!column.is_base_column());
        assert_eq!(column.base_column(), ColumnHandle::from_field(struct_field()));
        assert_eq!(column.role(), ColumnRole::Regular);
    }

    #[test]
    fn test_nested_column_rejects_bad_path() {
        let err = ColumnHandle::nested(struct_field(), vec![4, 9]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    }

    #[test]
    fn test_equality_uses_full_path() {
        let ab = ColumnHandle::nested(struct_field(), vec![2]).unwrap();
        let abc = ColumnHandle::nested(struct_field(), vec![2, 3]).unwrap();
        let set: HashSet<_> = [ab.clone(), abc, ab].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_roles_from_reserved_ids() {
        assert_eq!(ColumnHandle::row_position().role(), ColumnRole::RowPosition);
        assert_eq!(ColumnHandle::file_path().role(), ColumnRole::FilePath);
        assert_eq!(ColumnHandle::is_deleted().role(), ColumnRole::IsDeleted);
        assert_eq!(ColumnHandle::partition().role(), ColumnRole::Partition);
        assert_eq!(
            ColumnHandle::merge_row_id(PrimitiveType::Long.into()).role(),
            ColumnRole::MergeRowId
        );
    }

    #[test]
    fn test_for_field_id() {
        let schema = Schema::builder()
            .with_fields(vec![struct_field()])
            .build()
            .unwrap();
        let column = ColumnHandle::for_field_id(&schema, 3).unwrap();
        assert_eq!(column.path(), &[2, 3]);
        assert!(ColumnHandle::for_field_id(&schema, 1).unwrap().is_base_column());
        assert!(ColumnHandle::for_field_id(&schema, 42).is_err());
    }
}
