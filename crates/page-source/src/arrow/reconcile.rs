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

//! Field id reconciliation between the table schema and a data file.
//!
//! Every format exposes its physical schema as a tree of [`FileField`]s
//! carrying the Iceberg field id of each node when the file has one. Files
//! written without ids get them from a name mapping. Resolution is done per
//! file and never cached: schemas evolve between files of a table.

use apache_avro::Schema as AvroSchema;
use arrow_schema::{DataType, Field, Schema as ArrowSchema};
use orc_rust::schema::{DataType as OrcDataType, RootDataType};

use crate::arrow::schema::get_field_id;
use crate::scan::ColumnHandle;
use crate::spec::{MappedField, NameMapping, LIST_FIELD_NAME, MAP_KEY_FIELD_NAME, MAP_VALUE_FIELD_NAME};
use crate::{Error, ErrorKind, Result};

const AVRO_FIELD_ID_PROP: &str = "field-id";

/// Shape of a physical column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFieldKind {
    /// A leaf column.
    Primitive,
    /// A struct, children are its fields.
    Struct,
    /// A list, the only child is the element.
    List,
    /// A map, children are the key and the value.
    Map,
}

/// A column of a data file, with its field id when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileField {
    name: String,
    id: Option<i32>,
    kind: FileFieldKind,
    children: Vec<FileField>,
    // ORC column id of this node.
    orc_column: Option<usize>,
    // Parquet leaf column indices under this node, in schema order.
    leaves: Vec<usize>,
}

impl FileField {
    fn new(name: impl ToString, id: Option<i32>, kind: FileFieldKind) -> Self {
        Self {
            name: name.to_string(),
            id,
            kind,
            children: vec![],
            orc_column: None,
            leaves: vec![],
        }
    }

    /// Name of the column in the file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field id, when the file or a name mapping provides one.
    pub fn id(&self) -> Option<i32> {
        self.id
    }

    /// Shape of the column.
    pub fn kind(&self) -> FileFieldKind {
        self.kind
    }

    /// Nested columns.
    pub fn children(&self) -> &[FileField] {
        &self.children
    }

    /// ORC column id, for ORC files.
    pub fn orc_column(&self) -> Option<usize> {
        self.orc_column
    }

    /// Parquet leaf column indices, for Parquet files.
    pub fn leaves(&self) -> &[usize] {
        &self.leaves
    }

    fn child_by_id(&self, id: i32) -> Option<&FileField> {
        self.children.iter().find(|c| c.id == Some(id))
    }

    fn has_field_ids(&self) -> bool {
        self.id.is_some() || self.children.iter().any(FileField::has_field_ids)
    }

    fn apply_mapping(&mut self, mapped: Option<&MappedField>) {
        if self.id.is_none() {
            self.id = mapped.and_then(MappedField::field_id);
        }
        let kind = self.kind;
        for (pos, child) in self.children.iter_mut().enumerate() {
            // List and map children are named by convention in mappings.
            let name = match (kind, pos) {
                (FileFieldKind::List, _) => LIST_FIELD_NAME,
                (FileFieldKind::Map, 0) => MAP_KEY_FIELD_NAME,
                (FileFieldKind::Map, _) => MAP_VALUE_FIELD_NAME,
                _ => child.name.as_str(),
            }
            .to_string();
            let mapped_child = mapped.and_then(|m| m.field(&name, true)).map(|m| m.as_ref());
            child.apply_mapping(mapped_child);
        }
    }
}

/// A column of the table found in a data file.
#[derive(Debug, Clone)]
pub struct ResolvedColumn<'a> {
    /// Names from the top level column down to the field.
    pub names: Vec<&'a str>,
    /// The top level column.
    pub root: &'a FileField,
    /// The column itself.
    pub field: &'a FileField,
}

/// The top level columns of a data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFields {
    fields: Vec<FileField>,
}

impl FileFields {
    /// Top level columns in file order.
    pub fn fields(&self) -> &[FileField] {
        &self.fields
    }

    /// Whether any column carries a field id.
    pub fn has_field_ids(&self) -> bool {
        self.fields.iter().any(FileField::has_field_ids)
    }

    /// Builds the fields of a Parquet file from its Arrow schema.
    ///
    /// Field ids come from the `PARQUET:field_id` metadata the Parquet
    /// reader attaches to every field written with an id.
    pub fn from_parquet_schema(schema: &ArrowSchema) -> Result<Self> {
        let mut next_leaf = 0;
        let fields = schema
            .fields()
            .iter()
            .map(|f| arrow_field(f, &mut next_leaf))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { fields })
    }

    /// Builds the fields of an ORC file from its type tree.
    ///
    /// ORC files carry no ids the reader can see, so they always need a name
    /// mapping. Ids stored in `iceberg.id` type attributes are not read. When
    /// the mapping comes from the current table schema, a column dropped and
    /// re-added under the same name binds old files to the new field id.
    pub fn from_orc(root: &RootDataType) -> Self {
        let fields = root
            .children()
            .iter()
            .map(|c| orc_field(c.name(), c.data_type()))
            .collect();
        Self { fields }
    }

    /// Builds the fields of an Avro file from its writer schema.
    pub fn from_avro(schema: &AvroSchema) -> Result<Self> {
        let AvroSchema::Record(record) = schema else {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!("Avro data file schema must be a record, found {schema:?}"),
            ));
        };
        let fields = record
            .fields
            .iter()
            .map(|f| {
                let id = avro_field_id(&f.custom_attributes)?;
                avro_field(&f.name, id, &f.schema)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { fields })
    }

    /// Assigns ids from `mapping` to every column without one.
    ///
    /// Names are matched case-insensitively. List elements are looked up as
    /// `element`, map keys and values as `key` and `value`.
    pub fn apply_name_mapping(&mut self, mapping: &NameMapping) {
        for field in &mut self.fields {
            let mapped = mapping.field(&field.name, true).map(|m| m.as_ref());
            field.apply_mapping(mapped);
        }
    }

    /// Finds the column read by `column`, walking its dereference path by field id.
    ///
    /// `None` means the column doesn't exist in this file.
    pub fn resolve(&self, column: &ColumnHandle) -> Option<ResolvedColumn<'_>> {
        let root = self.fields.iter().find(|f| f.id == Some(column.base_id()))?;
        let mut names = vec![root.name.as_str()];
        let mut field = root;
        for id in column.path() {
            if field.kind != FileFieldKind::Struct {
                return None;
            }
            field = field.child_by_id(*id)?;
            names.push(field.name.as_str());
        }
        Some(ResolvedColumn { names, root, field })
    }
}

fn arrow_field(field: &Field, next_leaf: &mut usize) -> Result<FileField> {
    let id = get_field_id(field)?;
    let (kind, children) = match field.data_type() {
        DataType::Struct(fields) => (
            FileFieldKind::Struct,
            fields
                .iter()
                .map(|f| arrow_field(f, next_leaf))
                .collect::<Result<Vec<_>>>()?,
        ),
        DataType::List(element) | DataType::LargeList(element) => (
            FileFieldKind::List,
            vec![arrow_field(element, next_leaf)?],
        ),
        DataType::Map(entries, _) => {
            let DataType::Struct(kv) = entries.data_type() else {
                return Err(Error::new(
                    ErrorKind::DataInvalid,
                    format!("Map column {} has no key-value entries", field.name()),
                ));
            };
            (
                FileFieldKind::Map,
                kv.iter()
                    .map(|f| arrow_field(f, next_leaf))
                    .collect::<Result<Vec<_>>>()?,
            )
        }
        _ => {
            let mut leaf = FileField::new(field.name(), id, FileFieldKind::Primitive);
            leaf.leaves.push(*next_leaf);
            *next_leaf += 1;
            return Ok(leaf);
        }
    };

    let mut node = FileField::new(field.name(), id, kind);
    node.leaves = children.iter().flat_map(|c| c.leaves.clone()).collect();
    node.children = children;
    Ok(node)
}

fn orc_field(name: &str, data_type: &OrcDataType) -> FileField {
    let mut node = match data_type {
        OrcDataType::Struct { children, .. } => {
            let mut node = FileField::new(name, None, FileFieldKind::Struct);
            node.children = children
                .iter()
                .map(|c| orc_field(c.name(), c.data_type()))
                .collect();
            node
        }
        OrcDataType::List { child, .. } => {
            let mut node = FileField::new(name, None, FileFieldKind::List);
            node.children = vec![orc_field(LIST_FIELD_NAME, child)];
            node
        }
        OrcDataType::Map { key, value, .. } => {
            let mut node = FileField::new(name, None, FileFieldKind::Map);
            node.children = vec![
                orc_field(MAP_KEY_FIELD_NAME, key),
                orc_field(MAP_VALUE_FIELD_NAME, value),
            ];
            node
        }
        _ => FileField::new(name, None, FileFieldKind::Primitive),
    };
    node.orc_column = Some(data_type.column_index());
    node
}

fn avro_field_id(
    attributes: &std::collections::BTreeMap<String, serde_json::Value>,
) -> Result<Option<i32>> {
    match attributes.get(AVRO_FIELD_ID_PROP) {
        None => Ok(None),
        Some(value) => {
            let id = value.as_i64().ok_or_else(|| {
                Error::new(
                    ErrorKind::DataInvalid,
                    format!("Avro field id {value} is not an integer"),
                )
            })?;
            Ok(Some(i32::try_from(id)?))
        }
    }
}

// Strips the null branch of an optional union.
pub(crate) fn avro_non_null(schema: &AvroSchema) -> &AvroSchema {
    match schema {
        AvroSchema::Union(union) => union
            .variants()
            .iter()
            .find(|s| !matches!(s, AvroSchema::Null))
            .unwrap_or(schema),
        _ => schema,
    }
}

fn avro_field(name: &str, id: Option<i32>, schema: &AvroSchema) -> Result<FileField> {
    Ok(match avro_non_null(schema) {
        AvroSchema::Record(record) => {
            let mut node = FileField::new(name, id, FileFieldKind::Struct);
            node.children = record
                .fields
                .iter()
                .map(|f| avro_field(&f.name, avro_field_id(&f.custom_attributes)?, &f.schema))
                .collect::<Result<Vec<_>>>()?;
            node
        }
        AvroSchema::Array(items) => {
            let mut node = FileField::new(name, id, FileFieldKind::List);
            node.children = vec![avro_field(LIST_FIELD_NAME, None, items)?];
            node
        }
        AvroSchema::Map(values) => {
            let mut node = FileField::new(name, id, FileFieldKind::Map);
            node.children = vec![
                FileField::new(MAP_KEY_FIELD_NAME, None, FileFieldKind::Primitive),
                avro_field(MAP_VALUE_FIELD_NAME, None, values)?,
            ];
            node
        }
        _ => FileField::new(name, id, FileFieldKind::Primitive),
    })
}
