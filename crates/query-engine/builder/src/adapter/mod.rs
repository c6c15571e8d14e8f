//! Per-vendor dialect hooks consumed by the query builder.

pub mod oracle;
pub mod postgis;

pub use oracle::OracleAdapter;
pub use postgis::PostgisAdapter;

use citydb_filter::filter::{GeometryObject, LengthUnit, SpatialOp};
use citydb_sql::sql::ast::{Expression, Function};

use crate::query::error::Error;

/// The spatial reference system of the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSrs {
    pub srid: u32,
    /// The linear unit of the SRS, when it can be determined. Distance
    /// conversions fall back to metres otherwise.
    pub unit: Option<LengthUnit>,
}

/// Dialect hooks of a database vendor. The builder core is otherwise
/// vendor-agnostic.
pub trait DatabaseAdapter {
    fn name(&self) -> &'static str;

    fn database_srs(&self) -> &DatabaseSrs;

    /// The largest number of items the vendor accepts in one IN list.
    fn max_in_items(&self) -> usize;

    /// Whether the vendor supports native OFFSET/FETCH clauses. Without
    /// them, result windows are emulated via ROW_NUMBER.
    fn supports_fetch_clause(&self) -> bool;

    /// An optimizer hint for the main statement, if the vendor uses hints.
    fn optimizer_hint(&self) -> Option<String>;

    /// The function folding both sides of a case-insensitive comparison.
    fn upper_function(&self) -> Function {
        Function::Upper
    }

    /// Truncate a timestamp expression to its date part.
    fn date_truncation(&self, expression: Expression) -> Expression;

    /// A test geometry as an expression, reprojected to the database SRS
    /// when the SRIDs differ. Reprojection happens in SQL; an unknown SRID
    /// is a build error.
    fn geometry_literal(&self, geometry: &GeometryObject) -> Result<Expression, Error>;

    /// A binary spatial predicate between a geometry column and a test
    /// geometry.
    fn spatial_predicate(
        &self,
        op: SpatialOp,
        operand: Expression,
        geometry: Expression,
        negated: bool,
    ) -> Expression;

    /// A coarse bounding-box test between a geometry column and a test
    /// geometry.
    fn bbox_predicate(&self, operand: Expression, geometry: Expression, negated: bool)
        -> Expression;

    /// A distance-within test. `distance` is already converted to the
    /// database SRS's linear unit.
    fn distance_within(
        &self,
        operand: Expression,
        geometry: Expression,
        distance: f64,
        negated: bool,
    ) -> Expression;
}

/// Wrap a predicate in NOT when requested.
pub(crate) fn negate_if(expression: Expression, negated: bool) -> Expression {
    if negated {
        Expression::Not(Box::new(expression))
    } else {
        expression
    }
}

/// Reject test geometries without a usable SRID.
pub(crate) fn check_srid(geometry: &GeometryObject, target: u32) -> Result<(), Error> {
    if geometry.srid == 0 {
        return Err(Error::CoordinateTransform {
            srid: geometry.srid,
            target,
            reason: "the test geometry does not carry a spatial reference".to_string(),
        });
    }
    Ok(())
}
