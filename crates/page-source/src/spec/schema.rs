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

//! This module defines schema in iceberg.

use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use crate::spec::{NestedFieldRef, StructType, Type};
use crate::{Error, ErrorKind, Result};

/// Type alias for schema id.
pub type SchemaId = i32;
/// Reference to [`Schema`].
pub type SchemaRef = Arc<Schema>;
const DEFAULT_SCHEMA_ID: SchemaId = 0;

/// Defines schema in iceberg.
#[derive(Debug, Clone)]
pub struct Schema {
    r#struct: StructType,
    schema_id: SchemaId,

    id_to_field: HashMap<i32, NestedFieldRef>,
    // Field ids from the top level field down to the indexed field, inclusive.
    id_to_path: HashMap<i32, Vec<i32>>,
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.r#struct == other.r#struct && self.schema_id == other.schema_id
    }
}

impl Eq for Schema {}

/// Schema builder.
#[derive(Debug)]
pub struct SchemaBuilder {
    schema_id: i32,
    fields: Vec<NestedFieldRef>,
}

impl SchemaBuilder {
    /// Add fields to schema builder.
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = NestedFieldRef>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Set schema id.
    pub fn with_schema_id(mut self, schema_id: i32) -> Self {
        self.schema_id = schema_id;
        self
    }

    /// Builds the schema, failing on duplicate field ids.
    pub fn build(self) -> Result<Schema> {
        let r#struct = StructType::new(self.fields);
        let mut id_to_field = HashMap::new();
        let mut id_to_path = HashMap::new();
        for field in r#struct.fields() {
            index_field(field, &[], &mut id_to_field, &mut id_to_path)?;
        }

        Ok(Schema {
            r#struct,
            schema_id: self.schema_id,
            id_to_field,
            id_to_path,
        })
    }
}

fn index_field(
    field: &NestedFieldRef,
    parent_path: &[i32],
    id_to_field: &mut HashMap<i32, NestedFieldRef>,
    id_to_path: &mut HashMap<i32, Vec<i32>>,
) -> Result<()> {
    let mut path = parent_path.to_vec();
    path.push(field.id);

    if id_to_field.insert(field.id, field.clone()).is_some() {
        return Err(Error::new(
            ErrorKind::DataInvalid,
            format!("Invalid schema: multiple fields for id {}", field.id),
        ));
    }

    match field.field_type.as_ref() {
        Type::Primitive(_) => {}
        Type::Struct(s) => {
            for child in s.fields() {
                index_field(child, &path, id_to_field, id_to_path)?;
            }
        }
        Type::List(l) => index_field(&l.element_field, &path, id_to_field, id_to_path)?,
        Type::Map(m) => {
            index_field(&m.key_field, &path, id_to_field, id_to_path)?;
            index_field(&m.value_field, &path, id_to_field, id_to_path)?;
        }
    }

    id_to_path.insert(field.id, path);
    Ok(())
}

impl Schema {
    /// Create a schema builder.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder {
            schema_id: DEFAULT_SCHEMA_ID,
            fields: vec![],
        }
    }

    /// Get field by field id.
    pub fn field_by_id(&self, field_id: i32) -> Option<&NestedFieldRef> {
        self.id_to_field.get(&field_id)
    }

    /// Returns the field ids leading from a top level field to `field_id`, both inclusive.
    pub fn field_id_path(&self, field_id: i32) -> Option<&[i32]> {
        self.id_to_path.get(&field_id).map(Vec::as_slice)
    }

    /// Returns [`schema_id`].
    #[inline]
    pub fn schema_id(&self) -> SchemaId {
        self.schema_id
    }

    /// Returns [`r#struct`].
    #[inline]
    pub fn as_struct(&self) -> &StructType {
        &self.r#struct
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "table {{")?;
        for field in self.as_struct().fields() {
            writeln!(f, "  {}: {} {}", field.id, field.name, field.field_type)?;
        }
        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::spec::{ListType, NestedField, PrimitiveType};

    fn nested_schema() -> Schema {
        Schema::builder()
            .with_fields(vec![
                Arc::new(NestedField::required(1, "id", PrimitiveType::Long.into())),
                Arc::new(NestedField::optional(
                    2,
                    "location",
                    Type::Struct(StructType::new(vec![
                        Arc::new(NestedField::optional(3, "lat", PrimitiveType::Double.into())),
                        Arc::new(NestedField::optional(4, "long", PrimitiveType::Double.into())),
                    ])),
                )),
                Arc::new(NestedField::optional(
                    5,
                    "tags",
                    Type::List(ListType::new(Arc::new(NestedField::list_element(
                        6,
                        PrimitiveType::String.into(),
                        false,
                    )))),
                )),
            ])
            .build()
            .unwrap()
    }

    #[test]
    fn test_field_id_path() {
        let schema = nested_schema();
        assert_eq!(schema.field_id_path(1), Some(&[1][..]));
        assert_eq!(schema.field_id_path(4), Some(&[2, 4][..]));
        assert_eq!(schema.field_id_path(6), Some(&[5, 6][..]));
        assert_eq!(schema.field_id_path(9), None);
        assert_eq!(schema.field_by_id(3).unwrap().name, "lat");
    }

    #[test]
    fn test_duplicate_field_id_is_rejected() {
        let err = Schema::builder()
            .with_fields(vec![
                Arc::new(NestedField::required(1, "a", PrimitiveType::Int.into())),
                Arc::new(NestedField::required(1, "b", PrimitiveType::Int.into())),
            ])
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);
    }
}
