//! A small city model schema shared by the builder tests.

use std::collections::BTreeSet;
use std::sync::Arc;

use citydb_filter::filter::LengthUnit;
use citydb_query_builder::adapter::{DatabaseSrs, OracleAdapter, PostgisAdapter};
use citydb_query_builder::query::alias::AliasRegistry;
use citydb_schema::mapping::{
    ComplexAttribute, Extension, GeometryProperty, InjectedProperty, Join, JoinDef, JoinTable,
    JoinTarget, ObjectType, Property, ScalarType, SchemaMapping, SimpleAttribute, TypeKind,
    TypeProperty,
};

pub fn database_srs() -> DatabaseSrs {
    DatabaseSrs {
        srid: 25833,
        unit: Some(LengthUnit::Metre),
    }
}

pub fn postgis() -> PostgisAdapter {
    PostgisAdapter::new(database_srs())
}

pub fn oracle() -> OracleAdapter {
    OracleAdapter::new(database_srs())
}

pub fn registry() -> Arc<AliasRegistry> {
    AliasRegistry::new()
}

fn simple(name: &str, r#type: ScalarType, column: &str) -> Property {
    Property::SimpleAttribute(SimpleAttribute {
        name: name.to_string(),
        r#type,
        column: column.to_string(),
        lod: None,
    })
}

fn geometry_ref(name: &str, ref_column: &str) -> Property {
    Property::Geometry(GeometryProperty {
        name: name.to_string(),
        ref_column: Some(ref_column.to_string()),
        inline_column: None,
        lod: None,
    })
}

fn fk_join(table: &str, from_column: &str, to_column: &str) -> JoinDef {
    JoinDef::Join(Join {
        table: JoinTarget::Table(table.to_string()),
        from_column: from_column.to_string(),
        to_column: to_column.to_string(),
        conditions: vec![],
    })
}

fn target_join(from_column: &str, to_column: &str) -> JoinDef {
    JoinDef::Join(Join {
        table: JoinTarget::Target,
        from_column: from_column.to_string(),
        to_column: to_column.to_string(),
        conditions: vec![],
    })
}

pub fn test_schema() -> SchemaMapping {
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
            properties: vec![
                simple("id", ScalarType::Integer, "id"),
                simple("gmlid", ScalarType::String, "gmlid"),
                simple("name", ScalarType::String, "name"),
                simple("creationDate", ScalarType::Timestamp, "creation_date"),
                Property::Geometry(GeometryProperty {
                    name: "boundedBy".to_string(),
                    ref_column: None,
                    inline_column: Some("envelope".to_string()),
                    lod: None,
                }),
            ],
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
                join: Some(fk_join("cityobject", "id", "id")),
            }),
            properties: vec![
                simple("bldg:measuredHeight", ScalarType::Double, "measured_height"),
                simple("bldg:roofType", ScalarType::String, "roof_type"),
                geometry_ref("bldg:lod1Solid", "lod1_solid_id"),
                geometry_ref("bldg:lod2Solid", "lod2_solid_id"),
                Property::Feature(TypeProperty {
                    name: "bldg:boundedBySurface".to_string(),
                    target: "bldg:AbstractBoundarySurface".to_string(),
                    join: Some(target_join("id", "building_id")),
                }),
                Property::Feature(TypeProperty {
                    name: "bldg:address".to_string(),
                    target: "core:Address".to_string(),
                    join: Some(JoinDef::JoinTable(JoinTable {
                        table: "address_to_building".to_string(),
                        source_join: Join {
                            table: JoinTarget::Table("address_to_building".to_string()),
                            from_column: "id".to_string(),
                            to_column: "building_id".to_string(),
                            conditions: vec![],
                        },
                        target_join: Join {
                            table: JoinTarget::Target,
                            from_column: "address_id".to_string(),
                            to_column: "id".to_string(),
                            conditions: vec![],
                        },
                    })),
                }),
                Property::Injected(InjectedProperty {
                    ade: "energy".to_string(),
                    base_join: Some(fk_join("energy_building", "id", "id")),
                    property: Box::new(simple(
                        "energy:heatedVolume",
                        ScalarType::Double,
                        "heated_volume",
                    )),
                }),
                Property::ComplexAttribute(ComplexAttribute {
                    name: "core:externalReference".to_string(),
                    target: Some("core:ExternalReference".to_string()),
                    join: None,
                }),
            ],
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

    mapping.types.insert(
        "bldg:AbstractBoundarySurface".to_string(),
        ObjectType {
            name: "bldg:AbstractBoundarySurface".to_string(),
            kind: TypeKind::Feature,
            object_class_id: Some(29),
            table: Some("thematic_surface".to_string()),
            is_abstract: true,
            top_level: false,
            versions: BTreeSet::new(),
            extension: Some(Extension {
                base: "core:AbstractCityObject".to_string(),
                join: Some(fk_join("cityobject", "id", "id")),
            }),
            properties: vec![
                simple("objectclass", ScalarType::Integer, "objectclass_id"),
                geometry_ref("bldg:lod2MultiSurface", "lod2_multi_surface_id"),
            ],
        },
    );

    mapping.types.insert(
        "bldg:RoofSurface".to_string(),
        ObjectType {
            name: "bldg:RoofSurface".to_string(),
            kind: TypeKind::Feature,
            object_class_id: Some(33),
            table: None,
            is_abstract: false,
            top_level: false,
            versions: BTreeSet::new(),
            extension: Some(Extension {
                base: "bldg:AbstractBoundarySurface".to_string(),
                join: None,
            }),
            properties: vec![],
        },
    );

    mapping.types.insert(
        "core:Address".to_string(),
        ObjectType {
            name: "core:Address".to_string(),
            kind: TypeKind::Object,
            object_class_id: Some(55),
            table: Some("address".to_string()),
            is_abstract: false,
            top_level: false,
            versions: BTreeSet::new(),
            extension: None,
            properties: vec![
                simple("id", ScalarType::Integer, "id"),
                simple("core:street", ScalarType::String, "street"),
            ],
        },
    );

    // an inline-stored complex type
    mapping.types.insert(
        "core:ExternalReference".to_string(),
        ObjectType {
            name: "core:ExternalReference".to_string(),
            kind: TypeKind::Complex,
            object_class_id: None,
            table: None,
            is_abstract: false,
            top_level: false,
            versions: BTreeSet::new(),
            extension: None,
            properties: vec![
                simple("core:infoSys", ScalarType::String, "xal_source"),
                simple("core:uri", ScalarType::String, "xal_uri"),
            ],
        },
    );

    mapping
}
