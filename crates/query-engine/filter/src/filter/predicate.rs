//! The predicate expression tree of a query's selection filter.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use citydb_schema::mapping::ScalarType;

use super::geometry::GeometryObject;
use super::path::ValueReference;
use super::units::Distance;

/// A selection predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Comparison(ComparisonPredicate),
    Spatial(SpatialPredicate),
    Logical(LogicalPredicate),
    Id(IdPredicate),
    Sql(SelectPredicate),
}

/// Logical combinators. NOT toggles a negate flag propagated to the leaves
/// rather than restructuring the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogicalPredicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

/// Comparison predicates over a property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComparisonPredicate {
    Binary {
        op: ComparisonOp,
        operand: ValueReference,
        literal: Literal,
        match_case: bool,
    },
    Between {
        operand: ValueReference,
        lower: Literal,
        upper: Literal,
    },
    Like {
        operand: ValueReference,
        pattern: String,
        wildcard: char,
        single_char: char,
        escape: char,
        match_case: bool,
    },
    Null {
        operand: ValueReference,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonOp {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
}

/// Spatial predicates against a test geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SpatialPredicate {
    Binary {
        op: SpatialOp,
        /// BBOX may omit the operand; it then defaults to the common
        /// supertype's envelope.
        operand: Option<ValueReference>,
        geometry: GeometryObject,
    },
    Distance {
        op: DistanceOp,
        operand: Option<ValueReference>,
        geometry: GeometryObject,
        distance: Distance,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SpatialOp {
    Equals,
    Disjoint,
    Touches,
    Within,
    Overlaps,
    Intersects,
    Contains,
    BBox,
}

impl SpatialOp {
    /// Operators that must hold for every child geometry when the target
    /// property has no geometry column of its own.
    pub fn applies_to_all_children(self) -> bool {
        matches!(self, SpatialOp::Disjoint | SpatialOp::Within)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DistanceOp {
    DWithin,
    Beyond,
}

/// A resource-id set membership test against the features' gml ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdPredicate {
    pub ids: BTreeSet<String>,
}

/// A caller-supplied SQL fragment selecting candidate ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectPredicate {
    pub sql: String,
}

/// A typed literal operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    String(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp { value: NaiveDateTime, date_only: bool },
}

impl Literal {
    /// Whether the literal type-checks against a schema-declared scalar
    /// type.
    pub fn matches(&self, scalar_type: ScalarType) -> bool {
        match self {
            Literal::String(_) => {
                matches!(scalar_type, ScalarType::String | ScalarType::Clob)
            }
            Literal::Integer(_) => {
                matches!(scalar_type, ScalarType::Integer | ScalarType::Double)
            }
            Literal::Double(_) => matches!(scalar_type, ScalarType::Double),
            Literal::Boolean(_) => matches!(scalar_type, ScalarType::Boolean),
            Literal::Date(_) => {
                matches!(scalar_type, ScalarType::Date | ScalarType::Timestamp)
            }
            Literal::Timestamp { .. } => matches!(scalar_type, ScalarType::Timestamp),
        }
    }

    /// A short description for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::String(_) => "string",
            Literal::Integer(_) => "integer",
            Literal::Double(_) => "double",
            Literal::Boolean(_) => "boolean",
            Literal::Date(_) => "date",
            Literal::Timestamp { .. } => "timestamp",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_literals_match_numeric_columns() {
        assert!(Literal::Integer(42).matches(ScalarType::Integer));
        assert!(Literal::Integer(42).matches(ScalarType::Double));
        assert!(!Literal::Integer(42).matches(ScalarType::String));
    }

    #[test]
    fn date_literals_match_timestamp_columns() {
        let date = NaiveDate::from_ymd_opt(2019, 4, 1).unwrap();
        assert!(Literal::Date(date).matches(ScalarType::Timestamp));
        assert!(!Literal::Boolean(true).matches(ScalarType::Integer));
    }
}
