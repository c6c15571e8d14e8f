//! Helpers for processing a query and building SQL: the static environment
//! and the per-build mutable state.

use std::sync::Arc;

use indexmap::IndexMap;

use citydb_filter::filter::Literal;
use citydb_schema::mapping::{ObjectType, Property, PropertyResolution, SchemaMapping};
use citydb_sql::sql::ast;
use citydb_sql::sql::ast::TableAlias;

use super::alias::{AliasGenerator, AliasRegistry};
use super::error::Error;
use crate::adapter::DatabaseAdapter;

/// The discriminator column of tables shared by several types.
pub const OBJECTCLASS_ID_COLUMN: &str = "objectclass_id";
/// The property carrying the database id.
pub const ID_PROPERTY: &str = "id";
/// The property carrying the resource (gml) id.
pub const GMLID_PROPERTY: &str = "gmlid";
/// The property carrying a feature's envelope.
pub const ENVELOPE_PROPERTY: &str = "boundedBy";
/// Where child surfaces of reference-only geometries live.
pub const SURFACE_GEOMETRY_TABLE: &str = "surface_geometry";
pub const SURFACE_GEOMETRY_COLUMN: &str = "geometry";
pub const SURFACE_GEOMETRY_ROOT_COLUMN: &str = "root_id";

/// Static information for one build: the schema mapping and the dialect.
#[derive(Clone, Copy)]
pub struct Env<'a> {
    pub schema: &'a SchemaMapping,
    pub adapter: &'a dyn DatabaseAdapter,
}

impl<'a> Env<'a> {
    pub fn new(schema: &'a SchemaMapping, adapter: &'a dyn DatabaseAdapter) -> Env<'a> {
        Env { schema, adapter }
    }

    /// Lookup a type in the schema mapping.
    pub fn lookup_type(&self, name: &str) -> Result<&'a ObjectType, Error> {
        self.schema
            .lookup_type(name)
            .ok_or_else(|| Error::UnknownType(name.to_string()))
    }

    /// Resolve a property against a type's extension chain.
    pub fn resolve_property(
        &self,
        object_type: &'a ObjectType,
        property: &str,
    ) -> Result<PropertyResolution<'a>, Error> {
        self.schema
            .resolve_property(object_type, property)
            .ok_or_else(|| Error::PropertyNotFound {
                type_name: object_type.name.clone(),
                property: property.to_string(),
            })
    }

    /// The backing table of a type. Every type reachable by a build must
    /// have one; a missing table is a mapping bug, not a user error.
    pub fn table_of(&self, object_type: &'a ObjectType) -> Result<&'a str, Error> {
        self.schema.table_of(object_type).ok_or_else(|| {
            Error::Internal(format!(
                "type '{}' has no backing table anywhere in its extension chain",
                object_type.name
            ))
        })
    }

    /// The id column of a type. Missing ids are a build error.
    pub fn id_column(&self, object_type: &'a ObjectType) -> Result<&'a str, Error> {
        match self.schema.resolve_property(object_type, ID_PROPERTY) {
            Some(PropertyResolution {
                property: Property::SimpleAttribute(attribute),
                ..
            }) => Ok(&attribute.column),
            _ => Err(Error::MissingIdProperty(object_type.name.clone())),
        }
    }
}

/// Mutable state for one build: the alias generator, the table-context
/// stack and the join-mode flag. Builders are freshly constructed per
/// build; none of this state survives a build.
pub struct State {
    pub aliases: AliasGenerator,
    /// One map of already-joined table name to alias per nesting level.
    /// Joins to a table already present in the current level are reused.
    pub table_contexts: Vec<IndexMap<String, TableAlias>>,
    /// Forced when an OR appears anywhere in the selection predicate, so
    /// inner-joined optional properties cannot eliminate rows of sibling
    /// branches.
    pub use_left_joins: bool,
}

impl State {
    pub fn new(registry: Arc<AliasRegistry>) -> State {
        State {
            aliases: AliasGenerator::new(registry),
            table_contexts: vec![IndexMap::new()],
            use_left_joins: false,
        }
    }

    /// The table context of a nesting level, growing the stack on demand.
    pub fn context_mut(&mut self, level: usize) -> &mut IndexMap<String, TableAlias> {
        while self.table_contexts.len() <= level {
            self.table_contexts.push(IndexMap::new());
        }
        &mut self.table_contexts[level]
    }

    /// Merge issued aliases into the shared registry. Performed once at
    /// the end of each top-level build.
    pub fn finish(&mut self) {
        self.aliases.merge();
    }
}

/// Convert a filter literal into a SQL value.
pub fn literal_to_value(literal: &Literal) -> ast::Value {
    match literal {
        Literal::String(s) => ast::Value::String(s.clone()),
        Literal::Integer(i) => ast::Value::Integer(*i),
        Literal::Double(d) => ast::Value::Double(*d),
        Literal::Boolean(b) => ast::Value::Boolean(*b),
        Literal::Date(date) => ast::Value::Date(*date),
        Literal::Timestamp { value, .. } => ast::Value::Timestamp(*value),
    }
}

/// A column expression on an aliased table.
pub fn column_expr(alias: &TableAlias, column: &str) -> ast::Expression {
    ast::Expression::ColumnReference(ast::ColumnReference::TableColumn {
        table: ast::TableReference::AliasedTable(alias.clone()),
        name: ast::ColumnName(column.to_string()),
    })
}
