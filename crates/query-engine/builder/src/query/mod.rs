//! Translate an incoming `Query` into one SQL statement.

pub mod alias;
pub mod context;
pub mod counter;
pub mod error;
pub mod feature_type;
pub mod helpers;
pub mod lod;
pub mod predicate;
pub mod schema_path;
pub mod sorting;

use std::sync::Arc;

use citydb_filter::filter::{Query, SchemaPath};
use citydb_schema::mapping::SchemaMapping;
use citydb_sql::sql::ast::{
    self, From, JoinKind, SchemaName, Select, TableName, TableReference, Where,
};
use citydb_sql::sql::helpers as sql;

use self::alias::AliasRegistry;
use self::context::{BuildProperties, QueryContext, ResolvedTarget};
use self::error::Error;
use self::helpers::{column_expr, Env, State};
use crate::adapter::DatabaseAdapter;

/// Builds one SQL statement per `Query`. The builder itself is stateless;
/// every call constructs fresh build state, and the only cross-build
/// resource is the shared alias registry.
pub struct QueryBuilder<'a> {
    schema: &'a SchemaMapping,
    adapter: &'a dyn DatabaseAdapter,
    registry: Arc<AliasRegistry>,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(
        schema: &'a SchemaMapping,
        adapter: &'a dyn DatabaseAdapter,
        registry: Arc<AliasRegistry>,
    ) -> QueryBuilder<'a> {
        QueryBuilder {
            schema,
            adapter,
            registry,
        }
    }

    /// Translate the query to a SQL statement AST.
    pub fn build_query(
        &self,
        query: &Query,
        properties: &BuildProperties,
    ) -> Result<Select, Error> {
        let env = Env::new(self.schema, self.adapter);
        let mut state = State::new(self.registry.clone());

        let selection = feature_type::resolve(env, &query.feature_filter, query.version)?;

        let path = SchemaPath::new(selection.root.name.clone());
        let mut ctx = schema_path::build(
            env,
            &mut state,
            &path,
            &selection.object_class_ids,
            true,
            true,
        )?;

        if selection.object_class_ids.is_empty() {
            // no type matches the target version; the query stays valid
            // and matches nothing
            let id_column = env.id_column(selection.root)?;
            ctx.predicates
                .push(sql::is_null(column_expr(&ctx.root_table, id_column), false));
        }

        for property_name in &properties.projections {
            project_root_property(
                env,
                &mut state,
                &mut ctx,
                selection.root.name.as_str(),
                property_name,
            )?;
        }

        if let Some(predicate) = &query.selection {
            state.use_left_joins = predicate::requires_left_joins(predicate, false);
            predicate::build(env, &mut state, &mut ctx, predicate, false)?;
        }

        for materialized in &query.materialized_queries {
            add_materialized_query(env, &mut state, &mut ctx, selection.root.name.as_str(), materialized)?;
        }

        if let Some(lod_filter) = &query.lod_filter {
            lod::build(env, &mut state, &mut ctx, lod_filter, &selection.types)?;
        }

        let predicates = std::mem::take(&mut ctx.predicates);
        ctx.select.where_ = Where(sql::and_all(predicates));

        if let Some(sorting) = &query.sorting {
            sorting::build(env, &mut state, &mut ctx, sorting)?;
        }
        // the counter filter rewrites the whole select and must come last
        if let Some(counter) = &query.counter {
            counter::apply(env, &mut state, &mut ctx, counter)?;
        }

        ctx.select.distinct = properties.distinct;
        if properties.use_hints {
            ctx.select.hint = env.adapter.optimizer_hint();
        }

        state.finish();
        tracing::info!(
            root = selection.root.name.as_str(),
            joins = ctx.select.joins.len(),
            "built query statement"
        );
        Ok(ctx.select)
    }
}

/// Project an extra root-type property requested by the caller, joining
/// its table like any other schema path.
fn project_root_property(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    root_name: &str,
    property_name: &str,
) -> Result<(), Error> {
    let path = SchemaPath::new(root_name).child(property_name);
    let (table, column) = match schema_path::extend(env, state, ctx, &path, true)? {
        ResolvedTarget::Column { table, column, .. } => (table, column),
        ResolvedTarget::Geometry {
            table,
            ref_column,
            inline_column,
            ..
        } => {
            let column = inline_column.or(ref_column).ok_or_else(|| {
                Error::Internal("geometry property without any column".to_string())
            })?;
            (table, column)
        }
        ResolvedTarget::Table { .. } => {
            return Err(Error::UnsupportedOperand(format!(
                "cannot project the non-scalar property '{property_name}'"
            )))
        }
    };
    if let ast::SelectList::SelectList(list) = &mut ctx.select.select_list {
        list.push((
            sql::make_column_alias(column.clone()),
            column_expr(&table, &column),
        ));
    }
    Ok(())
}

/// Join a precomputed (materialized) result set by id.
fn add_materialized_query(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    root_name: &str,
    materialized: &citydb_filter::filter::MaterializedQuery,
) -> Result<(), Error> {
    let root = env.lookup_type(root_name)?;
    let id_column = env.id_column(root)?;
    let alias = state.aliases.next(&materialized.table);
    ctx.select.joins.push(ast::Join {
        kind: JoinKind::Inner,
        from: From::Table {
            reference: TableReference::DBTable {
                schema: materialized.schema.clone().map(SchemaName),
                table: TableName(materialized.table.clone()),
            },
            alias: alias.clone(),
        },
        on: sql::equals(
            column_expr(&alias, "id"),
            column_expr(&ctx.root_table, id_column),
        ),
    });
    Ok(())
}
