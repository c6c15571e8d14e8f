//! The test geometry of a spatial predicate. Geometry algorithms are out of
//! scope; the object is an opaque WKT payload tagged with its SRID, and
//! reprojection happens in SQL through the dialect adapter.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryObject {
    pub srid: u32,
    pub wkt: String,
}

impl GeometryObject {
    pub fn new(srid: u32, wkt: impl Into<String>) -> Self {
        GeometryObject {
            srid,
            wkt: wkt.into(),
        }
    }
}
