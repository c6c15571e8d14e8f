//! The request-side object model: a `Query` with its filters. Immutable
//! during a build; the query builder only reads it.

pub mod geometry;
pub mod lod;
pub mod path;
pub mod predicate;
pub mod units;

// re-export without modules
pub use geometry::*;
pub use lod::*;
pub use path::*;
pub use predicate::*;
pub use units::*;

use serde::{Deserialize, Serialize};

use citydb_schema::mapping::CityGmlVersion;

/// A query against the 3D city database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub feature_filter: FeatureTypeFilter,
    pub selection: Option<Predicate>,
    pub lod_filter: Option<LodFilter>,
    pub sorting: Option<Sorting>,
    pub counter: Option<CounterFilter>,
    #[serde(default)]
    pub materialized_queries: Vec<MaterializedQuery>,
    pub version: CityGmlVersion,
}

impl Query {
    /// A query selecting all features of the given types, nothing else.
    pub fn for_feature_types(type_names: Vec<String>, version: CityGmlVersion) -> Self {
        Query {
            feature_filter: FeatureTypeFilter { type_names },
            selection: None,
            lod_filter: None,
            sorting: None,
            counter: None,
            materialized_queries: vec![],
            version,
        }
    }
}

/// Restricts a query to a set of feature types (and their concrete
/// subtypes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTypeFilter {
    pub type_names: Vec<String>,
}

/// An ORDER BY specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sorting {
    pub properties: Vec<SortProperty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortProperty {
    pub path: ValueReference,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// A 1-based, inclusive row window for paginated results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterFilter {
    pub lower: u64,
    pub upper: u64,
}

/// A precomputed result set joined into the main statement by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializedQuery {
    pub table: String,
    pub schema: Option<String>,
}
