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

//! Iceberg name mapping.

use std::str::FromStr;
use std::sync::Arc;

use serde_with::{serde_as, DefaultOnNull};

use crate::spec::{
    NestedFieldRef, Schema, Type, LIST_FIELD_NAME, MAP_KEY_FIELD_NAME, MAP_VALUE_FIELD_NAME,
};
use crate::{Error, Result};

/// Property name for name mapping.
pub const DEFAULT_SCHEMA_NAME_MAPPING: &str = "schema.name-mapping.default";

/// Iceberg fallback field name to ID mapping.
///
/// Used to assign field ids to files written without them. Lookups walk the
/// mapping one name at a time, so a nested column is resolved by looking up
/// its parent first and then the child among the parent's fields.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(transparent)]
pub struct NameMapping {
    root: Vec<Arc<MappedField>>,
}

impl NameMapping {
    /// Creates a name mapping that maps every field of `schema` by its current name.
    pub fn new(schema: &Schema) -> Self {
        Self {
            root: schema
                .as_struct()
                .fields()
                .iter()
                .map(|field| Arc::new(mapped_field(field)))
                .collect(),
        }
    }

    /// Get a reference to fields which are to be mapped from name to field ID.
    pub fn fields(&self) -> &[Arc<MappedField>] {
        &self.root
    }

    /// Looks up a top level field by name.
    pub fn field(&self, name: &str, case_insensitive: bool) -> Option<&Arc<MappedField>> {
        lookup(&self.root, name, case_insensitive)
    }

    /// Resolves a qualified path of names, one name per nesting level, to a field id.
    pub fn field_id(&self, path: &[&str], case_insensitive: bool) -> Option<i32> {
        let (first, rest) = path.split_first()?;
        let mut current = self.field(first, case_insensitive)?;
        for name in rest {
            current = current.field(name, case_insensitive)?;
        }
        current.field_id()
    }

    /// Parses name_mapping from JSON.
    pub fn parse_name_mapping(name_mapping: &str) -> Result<Self> {
        let parsed_name_mapping: NameMapping = serde_json::from_str(name_mapping)?;
        Ok(parsed_name_mapping)
    }
}

impl FromStr for NameMapping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        NameMapping::parse_name_mapping(s)
    }
}

/// Maps field names to IDs.
#[serde_as]
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
pub struct MappedField {
    #[serde(skip_serializing_if = "Option::is_none")]
    field_id: Option<i32>,
    names: Vec<String>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[serde_as(deserialize_as = "DefaultOnNull")]
    fields: Vec<Arc<MappedField>>,
}

impl MappedField {
    /// Create a new [`MappedField`].
    pub fn new(field_id: Option<i32>, names: Vec<String>, fields: Vec<Arc<MappedField>>) -> Self {
        Self {
            field_id,
            names,
            fields,
        }
    }

    /// Iceberg field ID when a field's name is present within `names`.
    pub fn field_id(&self) -> Option<i32> {
        self.field_id
    }

    /// Get a reference to names for a mapped field.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Get a reference to the nested fields of this field.
    pub fn fields(&self) -> &[Arc<MappedField>] {
        &self.fields
    }

    /// Looks up a nested field by name.
    pub fn field(&self, name: &str, case_insensitive: bool) -> Option<&Arc<MappedField>> {
        lookup(&self.fields, name, case_insensitive)
    }

    fn matches(&self, name: &str, case_insensitive: bool) -> bool {
        self.names.iter().any(|candidate| {
            if case_insensitive {
                candidate.eq_ignore_ascii_case(name)
            } else {
                candidate == name
            }
        })
    }
}

fn lookup<'a>(
    fields: &'a [Arc<MappedField>],
    name: &str,
    case_insensitive: bool,
) -> Option<&'a Arc<MappedField>> {
    // An exact match wins over a case-insensitive one.
    fields
        .iter()
        .find(|field| field.matches(name, false))
        .or_else(|| {
            if case_insensitive {
                fields.iter().find(|field| field.matches(name, true))
            } else {
                None
            }
        })
}

fn mapped_field(field: &NestedFieldRef) -> MappedField {
    let fields = match field.field_type.as_ref() {
        Type::Primitive(_) => vec![],
        Type::Struct(s) => s
            .fields()
            .iter()
            .map(|child| Arc::new(mapped_field(child)))
            .collect(),
        Type::List(l) => vec![Arc::new(MappedField::new(
            Some(l.element_field.id),
            vec![LIST_FIELD_NAME.to_string()],
            mapped_field(&l.element_field).fields,
        ))],
        Type::Map(m) => vec![
            Arc::new(MappedField::new(
                Some(m.key_field.id),
                vec![MAP_KEY_FIELD_NAME.to_string()],
                mapped_field(&m.key_field).fields,
            )),
            Arc::new(MappedField::new(
                Some(m.value_field.id),
                vec![MAP_VALUE_FIELD_NAME.to_string()],
                mapped_field(&m.value_field).fields,
            )),
        ],
    };
    MappedField::new(Some(field.id), vec![field.name.clone()], fields)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::spec::{ListType, NestedField, PrimitiveType, StructType};

    #[test]
    fn test_json_name_mapping_deserialization() {
        let name_mapping = r#"
        [
            {
                "field-id": 1,
                "names": [
                    "id",
                    "record_id"
                ]
            },
            {
                "field-id": 2,
                "names": [
                    "data"
                ]
            },
            {
                "field-id": 3,
                "names": [
                    "location"
                ],
                "fields": [
                    {
                        "field-id": 4,
                        "names": [
                            "latitude",
                            "lat"
                        ]
                    },
                    {
                        "field-id": 5,
                        "names": [
                            "longitude",
                            "long"
                        ]
                    }
                ]
            }
        ]
        "#;

        let name_mapping: NameMapping = name_mapping.parse().unwrap();

        assert_eq!(name_mapping.field_id(&["record_id"], false), Some(1));
        assert_eq!(name_mapping.field_id(&["location", "lat"], false), Some(4));
        assert_eq!(name_mapping.field_id(&["location", "LONG"], false), None);
        assert_eq!(name_mapping.field_id(&["Location", "LONG"], true), Some(5));
        assert_eq!(name_mapping.field_id(&["missing"], true), None);
    }

    #[test]
    fn test_json_name_mapping_null_fields() {
        let name_mapping = r#"[{"field-id": 1, "names": ["id"], "fields": null}]"#;
        let name_mapping = NameMapping::parse_name_mapping(name_mapping).unwrap();
        assert_eq!(
            name_mapping.fields(),
            &[Arc::new(MappedField::new(Some(1), vec!["id".to_string()], vec![]))]
        );
    }

    #[test]
    fn test_name_mapping_from_schema() {
        let schema = Schema::builder()
            .with_fields(vec![
                Arc::new(NestedField::required(1, "id", PrimitiveType::Long.into())),
                Arc::new(NestedField::optional(
                    2,
                    "point",
                    Type::Struct(StructType::new(vec![Arc::new(NestedField::optional(
                        3,
                        "x",
                        PrimitiveType::Double.into(),
                    ))])),
                )),
                Arc::new(NestedField::optional(
                    4,
                    "tags",
                    Type::List(ListType::new(Arc::new(NestedField::list_element(
                        5,
                        PrimitiveType::String.into(),
                        false,
                    )))),
                )),
            ])
            .build()
            .unwrap();

        let mapping = NameMapping::new(&schema);
        assert_eq!(mapping.field_id(&["id"], false), Some(1));
        assert_eq!(mapping.field_id(&["point", "x"], false), Some(3));
        assert_eq!(mapping.field_id(&["tags", "element"], false), Some(5));
    }
}
