//! Errors for query building. All failures are synchronous build-time
//! errors; a failed build never returns a partial statement.

use citydb_schema::mapping::ScalarType;
use thiserror::Error;

/// A type for query build errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("type '{0}' is not part of the schema mapping")]
    UnknownType(String),

    #[error("property '{property}' not found on type '{type_name}' or any of its supertypes")]
    PropertyNotFound { type_name: String, property: String },

    #[error("type '{0}' does not declare a mandatory id property")]
    MissingIdProperty(String),

    #[error("feature types {0:?} do not share a common supertype")]
    NoCommonSupertype(Vec<String>),

    #[error("unsupported join: {0}")]
    UnsupportedJoin(String),

    #[error("literal of type {literal} does not match the {expected} property '{property}'")]
    TypeMismatch {
        property: String,
        literal: &'static str,
        expected: ScalarType,
    },

    #[error("unsupported operand: {0}")]
    UnsupportedOperand(String),

    #[error("invalid LIKE configuration: {0}")]
    InvalidLikePattern(String),

    #[error("invalid counter filter: row window {lower}..{upper}")]
    InvalidCounterFilter { lower: u64, upper: u64 },

    #[error("cannot transform geometry with SRID {srid} to database SRS {target}: {reason}")]
    CoordinateTransform {
        srid: u32,
        target: u32,
        reason: String,
    },

    #[error("cannot convert distance to the database SRS unit: {0}")]
    UnitConversion(String),

    /// A schema-mapping inconsistency rather than a bad query. Reported
    /// separately so callers can tell user errors from mapping bugs.
    #[error("internal error: {0}")]
    Internal(String),
}
