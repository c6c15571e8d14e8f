//! Compile the filter expression tree into SQL predicate tokens.
//!
//! NOT never restructures the tree; it toggles a negate flag propagated to
//! the leaves, with AND/OR swapping under negation.

pub mod comparison;
pub mod id;
pub mod select;
pub mod spatial;

use citydb_filter::filter::{LogicalPredicate, Predicate};
use citydb_sql::sql::helpers as sql;

use super::context::QueryContext;
use super::error::Error;
use super::helpers::{Env, State};

/// Compile one predicate, appending its SQL tokens to the context.
pub fn build(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    predicate: &Predicate,
    negate: bool,
) -> Result<(), Error> {
    match predicate {
        Predicate::Logical(logical) => build_logical(env, state, ctx, logical, negate),
        Predicate::Comparison(comparison) => comparison::build(env, state, ctx, comparison, negate),
        Predicate::Spatial(spatial) => spatial::build(env, state, ctx, spatial, negate),
        Predicate::Id(ids) => id::build(env, ctx, ids, negate),
        Predicate::Sql(raw) => select::build(env, state, ctx, raw, negate),
    }
}

/// Whether building this predicate must use left joins: an OR anywhere in
/// the (sub)tree would otherwise let an inner-joined optional property
/// eliminate rows of sibling branches. Computed once before building.
pub fn requires_left_joins(predicate: &Predicate, negate: bool) -> bool {
    match predicate {
        Predicate::Logical(LogicalPredicate::Not(inner)) => requires_left_joins(inner, !negate),
        Predicate::Logical(LogicalPredicate::And(operands)) => {
            (negate && operands.len() > 1)
                || operands
                    .iter()
                    .any(|operand| requires_left_joins(operand, negate))
        }
        Predicate::Logical(LogicalPredicate::Or(operands)) => {
            (!negate && operands.len() > 1)
                || operands
                    .iter()
                    .any(|operand| requires_left_joins(operand, negate))
        }
        _ => false,
    }
}

fn build_logical(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    logical: &LogicalPredicate,
    negate: bool,
) -> Result<(), Error> {
    match logical {
        LogicalPredicate::Not(inner) => build(env, state, ctx, inner, !negate),
        // AND flips to OR (and vice versa) under negation, per De Morgan
        LogicalPredicate::And(operands) => combine(env, state, ctx, operands, negate, negate),
        LogicalPredicate::Or(operands) => combine(env, state, ctx, operands, negate, !negate),
    }
}

/// Build each operand against the shared context and combine what it just
/// produced. In the disjunctive case, each operand's predicate set is
/// AND-combined first, preserving per-operand conjunctive semantics inside
/// the disjunction.
fn combine(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    operands: &[Predicate],
    negate: bool,
    disjunctive: bool,
) -> Result<(), Error> {
    let mut groups = vec![];
    for operand in operands {
        let mark = ctx.predicates.len();
        build(env, state, ctx, operand, negate)?;
        groups.push(ctx.predicates.split_off(mark));
    }

    if disjunctive {
        let branches = groups.into_iter().map(sql::and_all).collect();
        ctx.predicates.push(sql::or_all(branches));
    } else {
        for group in groups {
            ctx.predicates.extend(group);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use citydb_filter::filter::{IdPredicate, SchemaPath, ValueReference};
    use std::collections::BTreeSet;

    fn leaf() -> Predicate {
        Predicate::Id(IdPredicate {
            ids: BTreeSet::from(["a".to_string()]),
        })
    }

    fn comparison_leaf() -> Predicate {
        // the shape only matters structurally here
        Predicate::Comparison(citydb_filter::filter::ComparisonPredicate::Null {
            operand: ValueReference(SchemaPath::new("bldg:Building").child("bldg:roofType")),
        })
    }

    #[test]
    fn or_forces_left_joins() {
        let predicate = Predicate::Logical(LogicalPredicate::Or(vec![leaf(), comparison_leaf()]));
        assert!(requires_left_joins(&predicate, false));
    }

    #[test]
    fn negated_and_forces_left_joins() {
        let predicate = Predicate::Logical(LogicalPredicate::Not(Box::new(Predicate::Logical(
            LogicalPredicate::And(vec![leaf(), comparison_leaf()]),
        ))));
        assert!(requires_left_joins(&predicate, false));
    }

    #[test]
    fn plain_and_does_not_force_left_joins() {
        let predicate = Predicate::Logical(LogicalPredicate::And(vec![leaf(), comparison_leaf()]));
        assert!(!requires_left_joins(&predicate, false));
    }
}
