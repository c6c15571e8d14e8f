//! Spatial predicates: binary topology tests and distance tests.
//!
//! Properties with an inline geometry column use the dialect's native
//! predicate directly. Reference-only properties (child surfaces stored
//! separately) get a synthesized predicate: a coarse bounding-box
//! pre-filter on the feature's envelope plus an EXISTS subquery over every
//! non-null child surface.

use citydb_filter::filter::{
    DistanceOp, GeometryObject, LengthUnit, SchemaPath, SpatialOp, SpatialPredicate,
    ValueReference,
};
use citydb_sql::sql::ast::{Expression, From, TableAlias};
use citydb_sql::sql::helpers as sql;

use crate::query::context::{QueryContext, ResolvedTarget};
use crate::query::error::Error;
use crate::query::helpers::{
    column_expr, Env, State, ENVELOPE_PROPERTY, SURFACE_GEOMETRY_COLUMN,
    SURFACE_GEOMETRY_ROOT_COLUMN, SURFACE_GEOMETRY_TABLE,
};
use crate::query::schema_path;

pub fn build(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    spatial: &SpatialPredicate,
    negate: bool,
) -> Result<(), Error> {
    match spatial {
        SpatialPredicate::Binary {
            op,
            operand,
            geometry,
        } => build_binary(env, state, ctx, *op, operand.as_ref(), geometry, negate),
        SpatialPredicate::Distance {
            op,
            operand,
            geometry,
            distance,
        } => {
            let unit = env
                .adapter
                .database_srs()
                .unit
                .unwrap_or(LengthUnit::Metre);
            let value = distance.to_unit(unit);
            if !value.is_finite() {
                return Err(Error::UnitConversion(format!(
                    "distance {} {:?} does not convert to a finite value",
                    distance.value, distance.unit
                )));
            }
            build_distance(env, state, ctx, *op, operand.as_ref(), geometry, value, negate)
        }
    }
}

/// Resolve the spatial operand. BBOX may omit it, falling back to the
/// root type's envelope.
fn resolve_operand(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    operand: Option<&ValueReference>,
) -> Result<ResolvedTarget, Error> {
    match operand {
        Some(reference) => {
            let target = schema_path::extend(env, state, ctx, reference.path(), true)?;
            match target {
                ResolvedTarget::Geometry { .. } => Ok(target),
                _ => Err(Error::UnsupportedOperand(
                    "spatial test against a non-geometry property".to_string(),
                )),
            }
        }
        None => {
            let (table, column) = envelope_of_root(env, state, ctx)?;
            Ok(ResolvedTarget::Geometry {
                table,
                ref_column: None,
                inline_column: Some(column),
                injected_table: None,
            })
        }
    }
}

/// The envelope column of the query's root type, resolved through the
/// schema path so the join to its table is emitted (and reused) like any
/// other.
fn envelope_of_root(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
) -> Result<(TableAlias, String), Error> {
    let path = SchemaPath::new(ctx.root_type.clone()).child(ENVELOPE_PROPERTY);
    match schema_path::extend(env, state, ctx, &path, true)? {
        ResolvedTarget::Geometry {
            table,
            inline_column: Some(column),
            ..
        } => Ok((table, column)),
        _ => Err(Error::Internal(
            "the envelope property is not an inline geometry".to_string(),
        )),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_binary(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    op: SpatialOp,
    operand: Option<&ValueReference>,
    geometry: &GeometryObject,
    negate: bool,
) -> Result<(), Error> {
    let target = resolve_operand(env, state, ctx, operand)?;
    let geometry_expr = env.adapter.geometry_literal(geometry)?;

    match target {
        ResolvedTarget::Geometry {
            table,
            inline_column: Some(column),
            ..
        } => {
            let predicate = if op == SpatialOp::BBox {
                env.adapter
                    .bbox_predicate(column_expr(&table, &column), geometry_expr, negate)
            } else {
                env.adapter
                    .spatial_predicate(op, column_expr(&table, &column), geometry_expr, negate)
            };
            ctx.predicates.push(predicate);
            Ok(())
        }
        ResolvedTarget::Geometry {
            table,
            ref_column: Some(ref_column),
            inline_column: None,
            ..
        } => {
            let all = op.applies_to_all_children();
            // the coarse envelope pre-filter only narrows operators that
            // imply interaction
            let prefilter = if !negate && !matches!(op, SpatialOp::Disjoint) {
                let (envelope_table, envelope_column) = envelope_of_root(env, state, ctx)?;
                Some(env.adapter.bbox_predicate(
                    column_expr(&envelope_table, &envelope_column),
                    geometry_expr.clone(),
                    false,
                ))
            } else {
                None
            };
            let synthesized = synthesize_child_surface_test(
                state,
                &table,
                &ref_column,
                |column| env.adapter.spatial_predicate(op, column, geometry_expr.clone(), all),
                all,
                negate,
                prefilter,
            );
            ctx.predicates.push(synthesized);
            Ok(())
        }
        _ => Err(Error::Internal(
            "geometry property without any column".to_string(),
        )),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_distance(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    op: DistanceOp,
    operand: Option<&ValueReference>,
    geometry: &GeometryObject,
    distance: f64,
    negate: bool,
) -> Result<(), Error> {
    let target = resolve_operand(env, state, ctx, operand)?;
    let geometry_expr = env.adapter.geometry_literal(geometry)?;

    match target {
        ResolvedTarget::Geometry {
            table,
            inline_column: Some(column),
            ..
        } => {
            // beyond inverts distance-within
            let negated = match op {
                DistanceOp::DWithin => negate,
                DistanceOp::Beyond => !negate,
            };
            ctx.predicates.push(env.adapter.distance_within(
                column_expr(&table, &column),
                geometry_expr,
                distance,
                negated,
            ));
            Ok(())
        }
        ResolvedTarget::Geometry {
            table,
            ref_column: Some(ref_column),
            inline_column: None,
            ..
        } => {
            let all = op == DistanceOp::Beyond;
            let prefilter = if !negate && op == DistanceOp::DWithin {
                let (envelope_table, envelope_column) = envelope_of_root(env, state, ctx)?;
                Some(env.adapter.bbox_predicate(
                    column_expr(&envelope_table, &envelope_column),
                    geometry_expr.clone(),
                    false,
                ))
            } else {
                None
            };
            let synthesized = synthesize_child_surface_test(
                state,
                &table,
                &ref_column,
                |column| {
                    env.adapter.distance_within(
                        column,
                        geometry_expr.clone(),
                        distance,
                        // under all-semantics the inner test is inverted
                        // once more, cancelling the beyond inversion
                        all != (op == DistanceOp::Beyond),
                    )
                },
                all,
                negate,
                prefilter,
            );
            ctx.predicates.push(synthesized);
            Ok(())
        }
        _ => Err(Error::Internal(
            "geometry property without any column".to_string(),
        )),
    }
}

/// The synthesized predicate for reference-only geometry properties:
/// optional envelope pre-filter AND an EXISTS over the child surfaces.
/// `all` demands the test to hold for every child (DISJOINT, WITHIN,
/// BEYOND); the EXISTS then looks for a counterexample and is negated.
fn synthesize_child_surface_test(
    state: &mut State,
    table: &TableAlias,
    ref_column: &str,
    child_predicate: impl FnOnce(Expression) -> Expression,
    all: bool,
    negate: bool,
    prefilter: Option<Expression>,
) -> Expression {
    let mut parts = vec![];
    parts.extend(prefilter);

    let surface_alias = state.aliases.next(SURFACE_GEOMETRY_TABLE);
    let geometry_column = column_expr(&surface_alias, SURFACE_GEOMETRY_COLUMN);
    let where_ = sql::and_all(vec![
        sql::equals(
            column_expr(&surface_alias, SURFACE_GEOMETRY_ROOT_COLUMN),
            column_expr(table, ref_column),
        ),
        sql::is_null(geometry_column.clone(), true),
        child_predicate(geometry_column),
    ]);
    let select = sql::select_one(
        From::Table {
            reference: schema_path::db_table(SURFACE_GEOMETRY_TABLE),
            alias: surface_alias,
        },
        where_,
    );
    parts.push(sql::exists(select, all != negate));

    sql::and_all(parts)
}
