//! Type definitions of a SQL AST representation.

use chrono::{NaiveDate, NaiveDateTime};

/// A SELECT clause
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    /// An optimizer hint emitted right after the SELECT keyword.
    pub hint: Option<String>,
    pub distinct: bool,
    pub select_list: SelectList,
    pub from: Option<From>,
    pub joins: Vec<Join>,
    pub where_: Where,
    pub order_by: OrderBy,
    pub limit: Limit,
}

/// A select list
#[derive(Debug, Clone, PartialEq)]
pub enum SelectList {
    SelectList(Vec<(ColumnAlias, Expression)>),
    SelectStar,
    /// `SELECT 1`, used inside EXISTS subqueries.
    Select1,
}

/// A FROM clause
#[derive(Debug, Clone, PartialEq)]
pub enum From {
    /// Select from a table reference
    Table {
        reference: TableReference,
        alias: TableAlias,
    },
    /// Select from a subquery
    Select {
        select: Box<Select>,
        alias: TableAlias,
    },
    /// Select from an opaque SQL fragment written by a caller
    RawSql { sql: String, alias: TableAlias },
}

impl From {
    pub fn alias(&self) -> &TableAlias {
        match self {
            From::Table { alias, .. } | From::Select { alias, .. } | From::RawSql { alias, .. } => {
                alias
            }
        }
    }
}

/// A JOIN clause
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub from: From,
    pub on: Expression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    FullOuter,
}

/// A WHERE clause
#[derive(Debug, Clone, PartialEq)]
pub struct Where(pub Expression);

/// An ORDER BY clause
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub elements: Vec<OrderByElement>,
}

/// A single element in an ORDER BY clause
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByElement {
    pub target: Expression,
    pub direction: OrderByDirection,
}

/// A direction for a single ORDER BY element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderByDirection {
    Asc,
    Desc,
}

/// OFFSET and FETCH clauses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limit {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// A scalar expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// AND clause
    And {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// OR clause
    Or {
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// NOT clause
    Not(Box<Expression>),
    /// A binary operation on two scalar expressions
    BinaryOperation {
        left: Box<Expression>,
        operator: BinaryOperator,
        right: Box<Expression>,
    },
    /// A binary operation on a scalar expression and an array of scalar
    /// expressions
    BinaryArrayOperation {
        left: Box<Expression>,
        operator: BinaryArrayOperator,
        right: Vec<Expression>,
    },
    /// An unary operation on a scalar expression
    UnaryOperation {
        expression: Box<Expression>,
        operator: UnaryOperator,
    },
    /// A BETWEEN clause
    Between {
        expression: Box<Expression>,
        negated: bool,
        lower: Box<Expression>,
        upper: Box<Expression>,
    },
    /// A LIKE clause
    Like {
        expression: Box<Expression>,
        negated: bool,
        pattern: Box<Expression>,
        escape: Option<char>,
    },
    /// A scalar function call
    FunctionCall {
        function: Function,
        args: Vec<Expression>,
    },
    /// An EXISTS clause
    Exists { select: Box<Select> },
    /// A window function call
    WindowFunction {
        function: WindowFunction,
        order_by: OrderBy,
    },
    /// A column reference
    ColumnReference(ColumnReference),
    /// An irreducible value
    Value(Value),
}

/// An unary operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnaryOperator {
    IsNull,
    IsNotNull,
}

/// A binary comparison operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryOperator {
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    /// The bounding boxes of two geometries overlap (`&&`).
    BoundingBoxIntersects,
}

impl BinaryOperator {
    /// The operator testing the complement.
    pub fn negated(&self) -> BinaryOperator {
        match self {
            BinaryOperator::Equals => BinaryOperator::NotEquals,
            BinaryOperator::NotEquals => BinaryOperator::Equals,
            BinaryOperator::LessThan => BinaryOperator::GreaterThanOrEqualTo,
            BinaryOperator::LessThanOrEqualTo => BinaryOperator::GreaterThan,
            BinaryOperator::GreaterThan => BinaryOperator::LessThanOrEqualTo,
            BinaryOperator::GreaterThanOrEqualTo => BinaryOperator::LessThan,
            // no complement operator; callers wrap the test in NOT
            BinaryOperator::BoundingBoxIntersects => BinaryOperator::BoundingBoxIntersects,
        }
    }
}

/// A binary operator when the rhs is an array
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinaryArrayOperator {
    In,
    NotIn,
}

/// A scalar function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Function {
    Upper,
    Lower,
    Unknown(String),
}

/// A window function
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowFunction {
    RowNumber,
}

/// Value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    /// An opaque geometry payload bound as a parameter.
    Geometry { srid: u32, wkt: String },
    Null,
}

/// A database schema name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaName(pub String);

/// A database table name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(pub String);

/// A reference to a table. Used when we want to query it,
/// for example in a FROM clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableReference {
    /// refers to a db table object name
    DBTable {
        schema: Option<SchemaName>,
        table: TableName,
    },
    /// refers to an alias we created
    AliasedTable(TableAlias),
}

/// A database table's column name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnName(pub String);

/// A reference to a column. Used when we want to query it,
/// for example in a SELECT list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnReference {
    /// refers to a db column object name
    TableColumn {
        table: TableReference,
        name: ColumnName,
    },
    /// refers to an alias we created
    AliasedColumn {
        table: TableReference,
        column: ColumnAlias,
    },
}

impl ColumnReference {
    pub fn table(&self) -> &TableReference {
        match self {
            ColumnReference::TableColumn { table, .. }
            | ColumnReference::AliasedColumn { table, .. } => table,
        }
    }
}

/// aliases that we give to relations
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableAlias {
    pub unique_index: u64,
    pub name: String,
}

/// aliases that we give to columns
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnAlias {
    pub name: String,
}
