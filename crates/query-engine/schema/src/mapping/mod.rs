//! The schema mapping: feature/object/complex type definitions, their
//! properties and the joins that connect their tables.

pub mod joins;
pub mod properties;
pub mod types;

// re-export without modules
pub use joins::*;
pub use properties::*;
pub use types::*;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The complete schema mapping. Loaded once and shared read-only across
/// query builds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct SchemaMapping {
    /// Types keyed by their qualified name, e.g. `"bldg:Building"`.
    pub types: BTreeMap<String, ObjectType>,
    /// ADE schemas that are registered but switched off. Properties injected
    /// by these schemas are ignored during LoD analysis.
    #[serde(default)]
    pub disabled_ades: BTreeSet<String>,
}

/// The outcome of resolving a property against a type's extension chain:
/// the declaring type, the property itself, and the extension joins crossed
/// on the way from the starting type to the declaring type, in walk order.
#[derive(Debug)]
pub struct PropertyResolution<'a> {
    pub declaring_type: &'a ObjectType,
    pub property: &'a Property,
    pub crossed_joins: Vec<&'a JoinDef>,
}

impl SchemaMapping {
    pub fn empty() -> Self {
        SchemaMapping {
            types: BTreeMap::new(),
            disabled_ades: BTreeSet::new(),
        }
    }

    pub fn from_json(input: &str) -> Result<SchemaMapping, serde_json::Error> {
        serde_json::from_str(input)
    }

    /// Lookup a type by its qualified name.
    pub fn lookup_type(&self, name: &str) -> Option<&ObjectType> {
        self.types.get(name)
    }

    /// Is an ADE schema enabled?
    pub fn is_ade_enabled(&self, ade: &str) -> bool {
        !self.disabled_ades.contains(ade)
    }

    /// The extension chain of a type, starting at the type itself and ending
    /// at the root of its hierarchy.
    pub fn extension_chain<'a>(&'a self, object_type: &'a ObjectType) -> Vec<&'a ObjectType> {
        let mut chain = vec![object_type];
        let mut current = object_type;
        while let Some(extension) = &current.extension {
            match self.lookup_type(&extension.base) {
                Some(base) => {
                    chain.push(base);
                    current = base;
                }
                None => break,
            }
        }
        chain
    }

    /// Whether `sub` is `sup` or a transitive subtype of it.
    pub fn is_subtype_of(&self, sub: &str, sup: &str) -> bool {
        match self.lookup_type(sub) {
            None => false,
            Some(object_type) => self
                .extension_chain(object_type)
                .iter()
                .any(|ancestor| ancestor.name == sup),
        }
    }

    /// All transitive subtypes of a type, not including the type itself.
    pub fn subtypes_of(&self, name: &str) -> Vec<&ObjectType> {
        self.types
            .values()
            .filter(|candidate| candidate.name != name && self.is_subtype_of(&candidate.name, name))
            .collect()
    }

    /// The set of object class ids discriminating a type, optionally widened
    /// to all of its concrete subtypes. Abstract types contribute no id of
    /// their own.
    pub fn object_class_ids(&self, name: &str, include_subtypes: bool) -> BTreeSet<u32> {
        let mut ids = BTreeSet::new();
        if let Some(object_type) = self.lookup_type(name) {
            if !object_type.is_abstract {
                ids.extend(object_type.object_class_id);
            }
        }
        if include_subtypes {
            for subtype in self.subtypes_of(name) {
                if !subtype.is_abstract {
                    ids.extend(subtype.object_class_id);
                }
            }
        }
        ids
    }

    /// The closest common supertype of a set of types, if any.
    pub fn common_supertype(&self, names: &[String]) -> Option<&ObjectType> {
        let mut names = names.iter();
        let first = self.lookup_type(names.next()?)?;
        let mut candidates: Vec<&ObjectType> = self.extension_chain(first);
        for name in names {
            let object_type = self.lookup_type(name)?;
            let chain = self.extension_chain(object_type);
            candidates.retain(|candidate| chain.iter().any(|c| c.name == candidate.name));
        }
        candidates.first().copied()
    }

    /// Find the type in `start`'s extension chain that declares the given
    /// property, together with the extension joins crossed to reach it.
    pub fn resolve_property<'a>(
        &'a self,
        start: &'a ObjectType,
        property_name: &str,
    ) -> Option<PropertyResolution<'a>> {
        let mut crossed_joins = vec![];
        let mut current = start;
        loop {
            if let Some(property) = current
                .properties
                .iter()
                .find(|property| property.name() == property_name)
            {
                return Some(PropertyResolution {
                    declaring_type: current,
                    property,
                    crossed_joins,
                });
            }
            let extension = current.extension.as_ref()?;
            if let Some(join) = &extension.join {
                crossed_joins.push(join);
            }
            current = self.lookup_type(&extension.base)?;
        }
    }

    /// The table backing a type. Types without a table of their own share
    /// the closest ancestor's table.
    pub fn table_of<'a>(&'a self, object_type: &'a ObjectType) -> Option<&'a str> {
        self.extension_chain(object_type)
            .iter()
            .find_map(|candidate| candidate.table.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping_with_chain() -> SchemaMapping {
        let mut mapping = SchemaMapping::empty();
        mapping.types.insert(
            "core:AbstractCityObject".to_string(),
            ObjectType {
                name: "core:AbstractCityObject".to_string(),
                kind: TypeKind::Feature,
                object_class_id: Some(3),
                table: Some("cityobject".to_string()),
                is_abstract: true,
                top_level: false,
                versions: BTreeSet::new(),
                extension: None,
                properties: vec![],
            },
        );
        mapping.types.insert(
            "bldg:AbstractBuilding".to_string(),
            ObjectType {
                name: "bldg:AbstractBuilding".to_string(),
                kind: TypeKind::Feature,
                object_class_id: Some(25),
                table: Some("building".to_string()),
                is_abstract: true,
                top_level: false,
                versions: BTreeSet::new(),
                extension: Some(Extension {
                    base: "core:AbstractCityObject".to_string(),
                    join: None,
                }),
                properties: vec![],
            },
        );
        mapping.types.insert(
            "bldg:Building".to_string(),
            ObjectType {
                name: "bldg:Building".to_string(),
                kind: TypeKind::Feature,
                object_class_id: Some(26),
                table: None,
                is_abstract: false,
                top_level: true,
                versions: BTreeSet::new(),
                extension: Some(Extension {
                    base: "bldg:AbstractBuilding".to_string(),
                    join: None,
                }),
                properties: vec![],
            },
        );
        mapping
    }

    #[test]
    fn extension_chain_ends_at_the_root() {
        let mapping = mapping_with_chain();
        let building = mapping.lookup_type("bldg:Building").unwrap();
        let chain: Vec<&str> = mapping
            .extension_chain(building)
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(
            chain,
            vec![
                "bldg:Building",
                "bldg:AbstractBuilding",
                "core:AbstractCityObject"
            ]
        );
    }

    #[test]
    fn object_class_ids_skip_abstract_types() {
        let mapping = mapping_with_chain();
        let ids = mapping.object_class_ids("core:AbstractCityObject", true);
        assert_eq!(ids, BTreeSet::from([26]));
    }

    #[test]
    fn shared_tables_resolve_through_the_chain() {
        let mapping = mapping_with_chain();
        let building = mapping.lookup_type("bldg:Building").unwrap();
        assert_eq!(mapping.table_of(building), Some("building"));
    }

    #[test]
    fn mappings_load_from_json() {
        let input = r#"{
            "types": {
                "core:AbstractCityObject": {
                    "name": "core:AbstractCityObject",
                    "kind": "feature",
                    "object_class_id": 3,
                    "table": "cityobject",
                    "is_abstract": true,
                    "properties": [
                        {
                            "kind": "simpleAttribute",
                            "name": "id",
                            "type": "integer",
                            "column": "id"
                        },
                        {
                            "kind": "geometry",
                            "name": "boundedBy",
                            "inline_column": "envelope"
                        }
                    ]
                }
            }
        }"#;
        let mapping = SchemaMapping::from_json(input).expect("mapping parses");
        let city_object = mapping.lookup_type("core:AbstractCityObject").unwrap();
        assert!(city_object.is_abstract);
        assert_eq!(city_object.properties.len(), 2);
        assert!(mapping.is_ade_enabled("energy"));
    }

    #[test]
    fn common_supertype_of_siblings() {
        let mapping = mapping_with_chain();
        let supertype = mapping
            .common_supertype(&[
                "bldg:Building".to_string(),
                "bldg:AbstractBuilding".to_string(),
            ])
            .unwrap();
        assert_eq!(supertype.name, "bldg:AbstractBuilding");
    }
}
