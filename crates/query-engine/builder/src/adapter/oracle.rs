//! The Oracle Spatial dialect.

use citydb_filter::filter::{GeometryObject, SpatialOp};
use citydb_sql::sql::ast::{Expression, Function, Value};
use citydb_sql::sql::helpers;

use super::{check_srid, negate_if, DatabaseAdapter, DatabaseSrs};
use crate::query::error::Error;

/// Oracle: SDO_* spatial predicates, `/*+ ... */` hints, no native fetch
/// clause, a 1000-item IN-list ceiling.
#[derive(Debug, Clone)]
pub struct OracleAdapter {
    srs: DatabaseSrs,
    hint: Option<String>,
}

impl OracleAdapter {
    pub fn new(srs: DatabaseSrs) -> Self {
        OracleAdapter { srs, hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// The SDO_RELATE mask of a binary operator, if one exists.
    fn relate_mask(op: SpatialOp) -> Option<&'static str> {
        match op {
            SpatialOp::Equals => Some("mask=EQUAL"),
            SpatialOp::Touches => Some("mask=TOUCH"),
            SpatialOp::Within => Some("mask=INSIDE+COVEREDBY"),
            SpatialOp::Overlaps => Some("mask=OVERLAPBDYINTERSECT"),
            SpatialOp::Intersects => Some("mask=ANYINTERACT"),
            SpatialOp::Contains => Some("mask=CONTAINS+COVERS"),
            // DISJOINT has no mask; it is the complement of ANYINTERACT.
            SpatialOp::Disjoint | SpatialOp::BBox => None,
        }
    }

    fn sdo_call(name: &str, args: Vec<Expression>) -> Expression {
        helpers::equals(
            Expression::FunctionCall {
                function: Function::Unknown(name.to_string()),
                args,
            },
            Expression::Value(Value::String("TRUE".to_string())),
        )
    }
}

impl DatabaseAdapter for OracleAdapter {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn database_srs(&self) -> &DatabaseSrs {
        &self.srs
    }

    fn max_in_items(&self) -> usize {
        1000
    }

    fn supports_fetch_clause(&self) -> bool {
        false
    }

    fn optimizer_hint(&self) -> Option<String> {
        self.hint.clone()
    }

    fn date_truncation(&self, expression: Expression) -> Expression {
        Expression::FunctionCall {
            function: Function::Unknown("TRUNC".to_string()),
            args: vec![expression],
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
                function: Function::Unknown("SDO_CS.TRANSFORM".to_string()),
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
        match Self::relate_mask(op) {
            Some(mask) => negate_if(
                Self::sdo_call(
                    "SDO_RELATE",
                    vec![
                        operand,
                        geometry,
                        Expression::Value(Value::String(mask.to_string())),
                    ],
                ),
                negated,
            ),
            None => {
                // disjoint and bbox fall back to ANYINTERACT / SDO_FILTER
                let predicate = match op {
                    SpatialOp::BBox => self.bbox_predicate(operand, geometry, false),
                    _ => Self::sdo_call(
                        "SDO_RELATE",
                        vec![
                            operand,
                            geometry,
                            Expression::Value(Value::String("mask=ANYINTERACT".to_string())),
                        ],
                    ),
                };
                let invert = matches!(op, SpatialOp::Disjoint) != negated;
                negate_if(predicate, invert)
            }
        }
    }

    fn bbox_predicate(
        &self,
        operand: Expression,
        geometry: Expression,
        negated: bool,
    ) -> Expression {
        negate_if(
            Self::sdo_call("SDO_FILTER", vec![operand, geometry]),
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
            Self::sdo_call(
                "SDO_WITHIN_DISTANCE",
                vec![
                    operand,
                    geometry,
                    Expression::Value(Value::String(format!("distance={distance}"))),
                ],
            ),
            negated,
        )
    }
}
