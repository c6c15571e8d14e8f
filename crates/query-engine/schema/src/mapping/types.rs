//! Type definitions of the schema mapping: feature, object and complex types
//! and the scalar types their attributes evaluate to.

use std::collections::BTreeSet;

use enum_iterator::Sequence;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::joins::JoinDef;
use super::properties::Property;

/// The scalar types an attribute column can evaluate to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Sequence, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    String,
    Integer,
    Double,
    Boolean,
    Date,
    Timestamp,
    Clob,
}

impl ScalarType {
    /// Whether a column of this type may carry a join-condition literal.
    /// Boolean, date, timestamp and clob conditions are not supported.
    pub fn supports_join_condition(self) -> bool {
        matches!(
            self,
            ScalarType::String | ScalarType::Integer | ScalarType::Double
        )
    }
}

impl std::fmt::Display for ScalarType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match self {
            ScalarType::String => "string",
            ScalarType::Integer => "integer",
            ScalarType::Double => "double",
            ScalarType::Boolean => "boolean",
            ScalarType::Date => "date",
            ScalarType::Timestamp => "timestamp",
            ScalarType::Clob => "clob",
        };
        write!(f, "{name}")
    }
}

/// The CityGML versions a type may be available in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Sequence, Serialize, Deserialize, JsonSchema,
)]
pub enum CityGmlVersion {
    #[serde(rename = "1.0")]
    V1_0,
    #[serde(rename = "2.0")]
    V2_0,
}

/// The three kinds of types in the conceptual model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    Feature,
    Object,
    Complex,
}

/// A feature, object or complex type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ObjectType {
    /// Qualified name, e.g. `"bldg:Building"`.
    pub name: String,
    pub kind: TypeKind,
    /// Discriminator in a shared table. Abstract types usually carry one as
    /// well, but it never discriminates rows on its own.
    #[serde(default)]
    pub object_class_id: Option<u32>,
    /// The backing table. `None` means the type shares the closest
    /// ancestor's table.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub top_level: bool,
    /// CityGML versions the type exists in. Empty means all versions.
    #[serde(default)]
    pub versions: BTreeSet<CityGmlVersion>,
    /// Link to the base type, walked iteratively.
    #[serde(default)]
    pub extension: Option<Extension>,
    pub properties: Vec<Property>,
}

impl ObjectType {
    /// Whether the type is available in the given target version.
    pub fn available_in(&self, version: CityGmlVersion) -> bool {
        self.versions.is_empty() || self.versions.contains(&version)
    }
}

/// An extension relation to a base type. The join is absent when both types
/// share one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Extension {
    pub base: String,
    #[serde(default)]
    pub join: Option<JoinDef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_type_names_are_distinct() {
        let names: std::collections::BTreeSet<String> = enum_iterator::all::<ScalarType>()
            .map(|scalar_type| scalar_type.to_string())
            .collect();
        assert_eq!(names.len(), enum_iterator::all::<ScalarType>().count());
    }

    #[test]
    fn join_condition_literals_are_limited_to_simple_types() {
        for scalar_type in enum_iterator::all::<ScalarType>() {
            let supported = matches!(
                scalar_type,
                ScalarType::String | ScalarType::Integer | ScalarType::Double
            );
            assert_eq!(scalar_type.supports_join_condition(), supported);
        }
    }

    #[test]
    fn types_without_versions_are_available_everywhere() {
        let object_type = ObjectType {
            name: "core:Address".to_string(),
            kind: TypeKind::Object,
            object_class_id: None,
            table: Some("address".to_string()),
            is_abstract: false,
            top_level: false,
            versions: BTreeSet::new(),
            extension: None,
            properties: vec![],
        };
        for version in enum_iterator::all::<CityGmlVersion>() {
            assert!(object_type.available_in(version));
        }
    }
}
