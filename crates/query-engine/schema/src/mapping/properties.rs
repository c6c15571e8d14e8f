//! Property definitions. A closed set of property kinds, each with a fixed
//! data shape and a join derivation rule.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::joins::JoinDef;
use super::types::ScalarType;

/// A property of a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Property {
    SimpleAttribute(SimpleAttribute),
    ComplexAttribute(ComplexAttribute),
    Geometry(GeometryProperty),
    ImplicitGeometry(ImplicitGeometryProperty),
    Feature(TypeProperty),
    Object(TypeProperty),
    Complex(TypeProperty),
    Injected(InjectedProperty),
}

impl Property {
    /// The property name as addressed by schema paths.
    pub fn name(&self) -> &str {
        match self {
            Property::SimpleAttribute(attribute) => &attribute.name,
            Property::ComplexAttribute(attribute) => &attribute.name,
            Property::Geometry(geometry) => &geometry.name,
            Property::ImplicitGeometry(geometry) => &geometry.name,
            Property::Feature(property) | Property::Object(property) | Property::Complex(property) => {
                &property.name
            }
            Property::Injected(injected) => injected.property.name(),
        }
    }

    /// The join needed to reach the property's own table, if any. For an
    /// injected property this is the join of the wrapped property, not the
    /// base join to the ADE table.
    pub fn join(&self) -> Option<&JoinDef> {
        match self {
            Property::SimpleAttribute(_)
            | Property::Geometry(_)
            | Property::ImplicitGeometry(_) => None,
            Property::ComplexAttribute(attribute) => attribute.join.as_ref(),
            Property::Feature(property) | Property::Object(property) | Property::Complex(property) => {
                property.join.as_ref()
            }
            Property::Injected(injected) => injected.property.join(),
        }
    }
}

/// A scalar attribute mapped to a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SimpleAttribute {
    pub name: String,
    pub r#type: ScalarType,
    pub column: String,
    /// Set when the attribute is LoD-qualified, i.e. the column only carries
    /// a value for features present at that level of detail.
    #[serde(default)]
    pub lod: Option<u8>,
}

/// A nested attribute of a complex type, stored inline (no join) or in a
/// separate table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ComplexAttribute {
    pub name: String,
    /// The complex type whose properties flatten into this attribute.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub join: Option<JoinDef>,
}

/// A geometry property. At least one of `ref_column` (a reference into the
/// surface geometry table) and `inline_column` (an inline geometry column)
/// is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeometryProperty {
    pub name: String,
    #[serde(default)]
    pub ref_column: Option<String>,
    #[serde(default)]
    pub inline_column: Option<String>,
    #[serde(default)]
    pub lod: Option<u8>,
}

/// An implicit (template) geometry property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ImplicitGeometryProperty {
    pub name: String,
    pub ref_column: String,
    #[serde(default)]
    pub lod: Option<u8>,
}

/// A property targeting another feature, object or complex type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TypeProperty {
    pub name: String,
    pub target: String,
    #[serde(default)]
    pub join: Option<JoinDef>,
}

/// A property contributed by an ADE schema. The base join reaches the ADE
/// table before the wrapped property's own join (if any) applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InjectedProperty {
    pub ade: String,
    #[serde(default)]
    pub base_join: Option<JoinDef>,
    pub property: Box<Property>,
}
