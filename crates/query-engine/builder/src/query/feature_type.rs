//! Resolve a feature-type filter to a root type and an object-class-id
//! set.

use std::collections::BTreeSet;

use citydb_filter::filter::FeatureTypeFilter;
use citydb_schema::mapping::{CityGmlVersion, ObjectType};

use super::error::Error;
use super::helpers::Env;

/// The outcome of resolving a feature-type filter.
pub struct FeatureTypeSelection<'a> {
    /// The closest common supertype; the statement is built over its table.
    pub root: &'a ObjectType,
    /// The filtered types available in the target version.
    pub types: Vec<&'a ObjectType>,
    /// Discriminator ids of every concrete type covered by the filter. An
    /// empty set means nothing matches the target version.
    pub object_class_ids: BTreeSet<u32>,
}

pub fn resolve<'a>(
    env: Env<'a>,
    filter: &FeatureTypeFilter,
    version: CityGmlVersion,
) -> Result<FeatureTypeSelection<'a>, Error> {
    if filter.type_names.is_empty() {
        return Err(Error::UnsupportedOperand(
            "a query needs at least one feature type".to_string(),
        ));
    }

    let mut types = vec![];
    let mut object_class_ids = BTreeSet::new();
    for name in &filter.type_names {
        let object_type = env.lookup_type(name)?;
        if !object_type.available_in(version) {
            tracing::debug!(
                feature_type = name.as_str(),
                "feature type is not available in the target version"
            );
            continue;
        }
        types.push(object_type);
        object_class_ids.extend(env.schema.object_class_ids(name, true));
    }

    let root = env
        .schema
        .common_supertype(&filter.type_names)
        .ok_or_else(|| Error::NoCommonSupertype(filter.type_names.clone()))?;

    Ok(FeatureTypeSelection {
        root,
        types,
        object_class_ids,
    })
}
