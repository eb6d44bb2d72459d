//! Schema module: describes the fields of a dataset and their types.
//!
//! Encoders consult a schema to pick SQL parameter types, numeric query shapes and the
//! primary key column. Records can be checked against a schema when values are set.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::FieldType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Schema {
    name: String,
    fields: HashMap<String, FieldType>,
    field_names: Vec<String>, // declaration order
}

impl Schema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.field_names.iter().map(String::as_str)
    }

    pub fn num_fields(&self) -> usize {
        self.field_names.len()
    }

    /// The first geometry or envelope field, if any.
    pub fn geometry_field(&self) -> Option<&str> {
        self.field_names()
            .find(|n| self.field_type(n).is_some_and(|t| t.is_spatial()))
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SchemaBuilder {
    name: String,
    fields: HashMap<String, FieldType>,
    field_names: Vec<String>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        let name = name.into();
        if self.fields.insert(name.clone(), ty).is_none() {
            self.field_names.push(name);
        }
        self
    }

    pub fn build(self) -> Schema {
        Schema {
            name: self.name,
            fields: self.fields,
            field_names: self.field_names,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::builder("states")
            .field("geom", FieldType::Geometry)
            .field("STATE_NAME", FieldType::String)
            .field("PERSONS", FieldType::Long)
            .build()
    }

    #[test]
    fn test_field_registration_and_retrieval() {
        let schema = schema();
        assert_eq!(schema.name(), "states");
        assert_eq!(schema.field_type("PERSONS"), Some(FieldType::Long));
        assert_eq!(schema.field_type("STATE_NAME"), Some(FieldType::String));
        assert_eq!(schema.field_type("baz"), None);
        assert!(schema.contains("geom"));
    }

    #[test]
    fn test_declaration_order_and_geometry() {
        let schema = schema();
        let names: Vec<_> = schema.field_names().collect();
        assert_eq!(names, vec!["geom", "STATE_NAME", "PERSONS"]);
        assert_eq!(schema.geometry_field(), Some("geom"));
        assert_eq!(schema.num_fields(), 3);
    }

    #[test]
    fn test_schema_builder_overwrite_field() {
        let schema = Schema::builder("t")
            .field("foo", FieldType::Int)
            .field("foo", FieldType::String)
            .build();
        // Last one wins, position kept
        assert_eq!(schema.field_type("foo"), Some(FieldType::String));
        assert_eq!(schema.num_fields(), 1);
    }

    #[test]
    fn test_schema_serialization_deserialization() {
        let schema = schema();
        let json = serde_json::to_string(&schema).unwrap();
        let deserialized: Schema = serde_json::from_str(&json).unwrap();
        assert_eq!(schema, deserialized);
    }
}
