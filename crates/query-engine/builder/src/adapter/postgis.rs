//! The PostgreSQL/PostGIS dialect.

use citydb_filter::filter::{GeometryObject, SpatialOp};
use citydb_sql::sql::ast::{BinaryOperator, Expression, Function, Value};

use super::{check_srid, negate_if, DatabaseAdapter, DatabaseSrs};
use crate::query::error::Error;

/// PostGIS: ST_* spatial predicates, `&&` bounding-box tests, native
/// OFFSET/FETCH support, the protocol's 32767-parameter ceiling.
#[derive(Debug, Clone)]
pub struct PostgisAdapter {
    srs: DatabaseSrs,
}

impl PostgisAdapter {
    pub fn new(srs: DatabaseSrs) -> Self {
        PostgisAdapter { srs }
    }

    fn st_function(op: SpatialOp) -> &'static str {
        match op {
            SpatialOp::Equals => "ST_Equals",
            SpatialOp::Disjoint => "ST_Disjoint",
            SpatialOp::Touches => "ST_Touches",
            SpatialOp::Within => "ST_Within",
            SpatialOp::Overlaps => "ST_Overlaps",
            SpatialOp::Intersects | SpatialOp::BBox => "ST_Intersects",
            SpatialOp::Contains => "ST_Contains",
        }
    }
}

impl DatabaseAdapter for PostgisAdapter {
    fn name(&self) -> &'static str {
        "postgis"
    }

    fn database_srs(&self) -> &DatabaseSrs {
        &self.srs
    }

    fn max_in_items(&self) -> usize {
        32767
    }

    fn supports_fetch_clause(&self) -> bool {
        true
    }

    fn optimizer_hint(&self) -> Option<String> {
        None
    }

    fn date_truncation(&self, expression: Expression) -> Expression {
        Expression::FunctionCall {
            function: Function::Unknown("date_trunc".to_string()),
            args: vec![
                Expression::Value(Value::String("day".to_string())),
                expression,
            ],
        }
    }

    fn geometry_literal(&self, geometry: &GeometryObject) -> Result<Expression, Error> {
        check_srid(geometry, self.srs.srid)?;
        let literal = Expression::Value(Value::Geometry {
            srid: geometry.srid,
            wkt: geometry.wkt.clone(),
        });
        if geometry.srid == self.srs.srid {
            Ok(literal)
        } else {
            Ok(Expression::FunctionCall {
                function: Function::Unknown("ST_Transform".to_string()),
                args: vec![
                    literal,
                    Expression::Value(Value::Integer(i64::from(self.srs.srid))),
                ],
            })
        }
    }

    fn spatial_predicate(
        &self,
        op: SpatialOp,
        operand: Expression,
        geometry: Expression,
        negated: bool,
    ) -> Expression {
        if op == SpatialOp::BBox {
            return self.bbox_predicate(operand, geometry, negated);
        }
        negate_if(
            Expression::FunctionCall {
                function: Function::Unknown(Self::st_function(op).to_string()),
                args: vec![operand, geometry],
            },
            negated,
        )
    }

    fn bbox_predicate(
        &self,
        operand: Expression,
        geometry: Expression,
        negated: bool,
    ) -> Expression {
        negate_if(
            Expression::BinaryOperation {
                left: Box::new(operand),
                operator: BinaryOperator::BoundingBoxIntersects,
                right: Box::new(geometry),
            },
            negated,
        )
    }

    fn distance_within(
        &self,
        operand: Expression,
        geometry: Expression,
        distance: f64,
        negated: bool,
    ) -> Expression {
        negate_if(
            Expression::FunctionCall {
                function: Function::Unknown("ST_DWithin".to_string()),
                args: vec![operand, geometry, Expression::Value(Value::Double(distance))],
            },
            negated,
        )
    }
}
