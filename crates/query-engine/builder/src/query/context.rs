//! The mutable build-time context threaded through the builder call chain,
//! and the caller-facing build knobs.

use citydb_schema::mapping::ScalarType;
use citydb_sql::sql::ast::{Expression, Select, TableAlias};

/// The in-progress statement and everything resolved against it so far.
/// Exactly one live context exists per top-level build; it is passed by
/// reference through the call chain.
#[derive(Debug)]
pub struct QueryContext {
    pub select: Select,
    /// Qualified name of the root type the statement is built over.
    pub root_type: String,
    /// Alias of the statement's FROM table.
    pub root_table: TableAlias,
    /// Result of the most recent schema-path resolution.
    pub target: Option<ResolvedTarget>,
    /// Predicates accumulated by the builders, AND-combined into the WHERE
    /// clause at the end of the build.
    pub predicates: Vec<Expression>,
    /// Joins emitted so far, in emission order. Used by the NULL-predicate
    /// builder to promote an injected join from inner to left.
    pub emitted_joins: Vec<EmittedJoin>,
}

/// Bookkeeping for one emitted join.
#[derive(Debug, Clone)]
pub struct EmittedJoin {
    /// The joined table's name.
    pub table: String,
    /// Index into `select.joins`.
    pub index: usize,
    /// Whether the join reaches an ADE table through an injected property's
    /// base join.
    pub injected: bool,
    /// The alias the join started from, for reverse joins.
    pub from_alias: TableAlias,
    /// The table the join started from, for reverse joins.
    pub from_table: String,
}

/// What a schema path resolved to.
#[derive(Debug, Clone)]
pub enum ResolvedTarget {
    /// A scalar column.
    Column {
        table: TableAlias,
        column: String,
        scalar_type: ScalarType,
        /// Set when the column lives on an ADE table reached through an
        /// injected property's base join.
        injected_table: Option<String>,
    },
    /// A geometry property with a reference and/or inline column.
    Geometry {
        table: TableAlias,
        ref_column: Option<String>,
        inline_column: Option<String>,
        /// Set when the columns live on an ADE table reached through an
        /// injected property's base join.
        injected_table: Option<String>,
    },
    /// A type node; the path ended on a table rather than a column.
    Table {
        table: TableAlias,
        type_name: String,
    },
}

impl ResolvedTarget {
    pub fn table(&self) -> &TableAlias {
        match self {
            ResolvedTarget::Column { table, .. }
            | ResolvedTarget::Geometry { table, .. }
            | ResolvedTarget::Table { table, .. } => table,
        }
    }
}

/// Caller-configurable build knobs.
#[derive(Debug, Clone, Default)]
pub struct BuildProperties {
    pub distinct: bool,
    /// Extra root-table properties projected besides the id column, by
    /// property name.
    pub projections: Vec<String>,
    /// Whether to apply the adapter's optimizer hint.
    pub use_hints: bool,
}

impl BuildProperties {
    pub fn new() -> Self {
        BuildProperties::default()
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn project(mut self, property: impl Into<String>) -> Self {
        self.projections.push(property.into());
        self
    }

    pub fn use_hints(mut self) -> Self {
        self.use_hints = true;
        self
    }
}
