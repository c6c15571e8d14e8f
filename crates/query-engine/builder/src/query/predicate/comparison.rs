//! Comparison predicates: binary operators, BETWEEN, LIKE and NULL tests.

use citydb_filter::filter::{ComparisonOp, ComparisonPredicate, Literal, ValueReference};
use citydb_schema::mapping::{Join, JoinDef, JoinTarget, ObjectType, Property, ScalarType};
use citydb_sql::sql::ast::{
    self, BinaryOperator, Expression, From, JoinKind, Select, TableAlias,
};
use citydb_sql::sql::helpers as sql;

use crate::query::context::{QueryContext, ResolvedTarget};
use crate::query::error::Error;
use crate::query::helpers::{column_expr, literal_to_value, Env, State};
use crate::query::schema_path;

pub fn build(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    comparison: &ComparisonPredicate,
    negate: bool,
) -> Result<(), Error> {
    match comparison {
        ComparisonPredicate::Binary {
            op,
            operand,
            literal,
            match_case,
        } => build_binary(env, state, ctx, *op, operand, literal, *match_case, negate),
        ComparisonPredicate::Between {
            operand,
            lower,
            upper,
        } => build_between(env, state, ctx, operand, lower, upper, negate),
        ComparisonPredicate::Like {
            operand,
            pattern,
            wildcard,
            single_char,
            escape,
            match_case,
        } => build_like(
            env,
            state,
            ctx,
            operand,
            pattern,
            *wildcard,
            *single_char,
            *escape,
            *match_case,
            negate,
        ),
        ComparisonPredicate::Null { operand } => build_null(env, state, ctx, operand, negate),
    }
}

/// Resolve an operand to a scalar column and type-check the literal
/// against it.
fn resolve_scalar_operand(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    operand: &ValueReference,
    literal: &Literal,
    match_case: bool,
) -> Result<(TableAlias, String, ScalarType), Error> {
    let target = schema_path::extend(env, state, ctx, operand.path(), match_case)?;
    match target {
        ResolvedTarget::Column {
            table,
            column,
            scalar_type,
            ..
        } => {
            if !literal.matches(scalar_type) {
                return Err(Error::TypeMismatch {
                    property: operand_name(operand),
                    literal: literal.type_name(),
                    expected: scalar_type,
                });
            }
            Ok((table, column, scalar_type))
        }
        _ => Err(Error::UnsupportedOperand(format!(
            "comparison against the non-scalar property '{}'",
            operand_name(operand)
        ))),
    }
}

fn operand_name(operand: &ValueReference) -> String {
    operand
        .path()
        .last_step()
        .map_or_else(|| operand.path().root.clone(), |step| step.name.clone())
}

fn comparison_operator(op: ComparisonOp) -> BinaryOperator {
    match op {
        ComparisonOp::Equals => BinaryOperator::Equals,
        ComparisonOp::NotEquals => BinaryOperator::NotEquals,
        ComparisonOp::LessThan => BinaryOperator::LessThan,
        ComparisonOp::LessThanOrEqualTo => BinaryOperator::LessThanOrEqualTo,
        ComparisonOp::GreaterThan => BinaryOperator::GreaterThan,
        ComparisonOp::GreaterThanOrEqualTo => BinaryOperator::GreaterThanOrEqualTo,
    }
}

#[allow(clippy::too_many_arguments)]
fn build_binary(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    op: ComparisonOp,
    operand: &ValueReference,
    literal: &Literal,
    match_case: bool,
    negate: bool,
) -> Result<(), Error> {
    let (table, column, _) = resolve_scalar_operand(env, state, ctx, operand, literal, match_case)?;

    let mut left = column_expr(&table, &column);
    let mut right = Expression::Value(literal_to_value(literal));

    // a date-only timestamp compares against the truncated column
    if let Literal::Timestamp {
        date_only: true, ..
    } = literal
    {
        left = env.adapter.date_truncation(left);
    }

    // case folding applies uniformly to both sides
    if let Literal::String(text) = literal {
        if !match_case {
            let upper = env.adapter.upper_function();
            left = Expression::FunctionCall {
                function: upper.clone(),
                args: vec![left],
            };
            right = Expression::FunctionCall {
                function: upper,
                args: vec![Expression::Value(ast::Value::String(text.to_uppercase()))],
            };
        }
    }

    let mut operator = comparison_operator(op);
    if negate {
        operator = operator.negated();
    }

    ctx.predicates.push(Expression::BinaryOperation {
        left: Box::new(left),
        operator,
        right: Box::new(right),
    });
    Ok(())
}

fn build_between(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    operand: &ValueReference,
    lower: &Literal,
    upper: &Literal,
    negate: bool,
) -> Result<(), Error> {
    // both bounds type-check independently
    let (table, column, scalar_type) =
        resolve_scalar_operand(env, state, ctx, operand, lower, true)?;
    if !upper.matches(scalar_type) {
        return Err(Error::TypeMismatch {
            property: operand_name(operand),
            literal: upper.type_name(),
            expected: scalar_type,
        });
    }

    ctx.predicates.push(Expression::Between {
        expression: Box::new(column_expr(&table, &column)),
        negated: negate,
        lower: Box::new(Expression::Value(literal_to_value(lower))),
        upper: Box::new(Expression::Value(literal_to_value(upper))),
    });
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn build_like(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    operand: &ValueReference,
    pattern: &str,
    wildcard: char,
    single_char: char,
    escape: char,
    match_case: bool,
    negate: bool,
) -> Result<(), Error> {
    if wildcard == single_char || wildcard == escape || single_char == escape {
        return Err(Error::InvalidLikePattern(format!(
            "wildcard '{wildcard}', single-char '{single_char}' and escape '{escape}' must be distinct"
        )));
    }

    let literal = Literal::String(pattern.to_string());
    let (table, column, _) = resolve_scalar_operand(env, state, ctx, operand, &literal, match_case)?;

    let (translated, uses_escape) = translate_wildcards(pattern, wildcard, single_char, escape);
    let translated = if match_case {
        translated
    } else {
        translated.to_uppercase()
    };

    let mut expression = column_expr(&table, &column);
    let mut pattern_expr = Expression::Value(ast::Value::String(translated));
    if !match_case {
        let upper = env.adapter.upper_function();
        expression = Expression::FunctionCall {
            function: upper.clone(),
            args: vec![expression],
        };
        pattern_expr = Expression::FunctionCall {
            function: upper,
            args: vec![pattern_expr],
        };
    }

    ctx.predicates.push(Expression::Like {
        expression: Box::new(expression),
        negated: negate,
        pattern: Box::new(pattern_expr),
        escape: uses_escape.then_some(escape),
    });
    Ok(())
}

/// Translate user wildcards into SQL `%`/`_`, character by character.
/// Native `%`/`_` in the pattern are escaped when they are not themselves
/// the user's tokens; already-escaped sequences pass through verbatim.
pub(crate) fn translate_wildcards(
    pattern: &str,
    wildcard: char,
    single_char: char,
    escape: char,
) -> (String, bool) {
    let mut out = String::with_capacity(pattern.len());
    let mut uses_escape = false;
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c == escape {
            out.push(escape);
            if let Some(next) = chars.next() {
                out.push(next);
            }
            uses_escape = true;
        } else if c == wildcard {
            out.push('%');
        } else if c == single_char {
            out.push('_');
        } else if c == '%' || c == '_' {
            out.push(escape);
            out.push(c);
            uses_escape = true;
        } else {
            out.push(c);
        }
    }
    (out, uses_escape)
}

/// NULL tests. Scalar targets test their column directly; joined complex
/// targets test row existence; inline complex targets recurse over their
/// declared properties.
fn build_null(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    operand: &ValueReference,
    negate: bool,
) -> Result<(), Error> {
    let path = operand.path();
    let Some(last) = path.last_step().cloned() else {
        return Err(Error::UnsupportedOperand(
            "IS NULL on a root type".to_string(),
        ));
    };
    let parent_path = path.parent().ok_or_else(|| {
        Error::Internal("a path with steps always has a parent".to_string())
    })?;

    let parent_target = schema_path::extend(env, state, ctx, &parent_path, true)?;
    let (parent_alias, parent_type) = match parent_target {
        ResolvedTarget::Table { table, type_name } => (table, env.lookup_type(&type_name)?),
        _ => {
            return Err(Error::UnsupportedOperand(
                "IS NULL below a scalar property".to_string(),
            ))
        }
    };

    let resolution = env.resolve_property(parent_type, &last.name)?;
    let mut property = resolution.property;
    let mut base_join: Option<&JoinDef> = None;
    if let Property::Injected(injected) = property {
        base_join = injected.base_join.as_ref();
        property = injected.property.as_ref();
    }

    match property {
        Property::SimpleAttribute(_) | Property::Geometry(_) | Property::ImplicitGeometry(_) => {
            // re-extending the full path reuses the parent joins through
            // the table contexts
            let target = schema_path::extend(env, state, ctx, path, true)?;
            match target {
                ResolvedTarget::Column {
                    table,
                    column,
                    injected_table,
                    ..
                } => {
                    if let Some(ade_table) = injected_table {
                        promote_injected_join(ctx, &ade_table);
                    }
                    ctx.predicates
                        .push(sql::is_null(column_expr(&table, &column), negate));
                }
                ResolvedTarget::Geometry {
                    table,
                    ref_column,
                    inline_column,
                    injected_table,
                } => {
                    let column = ref_column.or(inline_column).ok_or_else(|| {
                        Error::Internal("geometry property without any column".to_string())
                    })?;
                    if let Some(ade_table) = injected_table {
                        promote_injected_join(ctx, &ade_table);
                    }
                    ctx.predicates
                        .push(sql::is_null(column_expr(&table, &column), negate));
                }
                ResolvedTarget::Table { .. } => {
                    return Err(Error::Internal(
                        "scalar property resolved to a table".to_string(),
                    ))
                }
            }
        }
        _ => {
            let target_type = property_target_type(env, property)?;
            let mut chain: Vec<&JoinDef> = vec![];
            chain.extend(base_join);
            chain.extend(property.join());

            if chain.is_empty() {
                // inline-stored complex type: null-ness is "all declared
                // inner properties are individually null"
                let target_type = target_type.ok_or_else(|| {
                    Error::UnsupportedOperand(format!(
                        "IS NULL on the untyped inline property '{}'",
                        last.name
                    ))
                })?;
                let expression = inline_null(env, state, &parent_alias, target_type, negate, 0)?;
                ctx.predicates.push(expression);
            } else {
                let select =
                    exists_for_join_chain(env, state, &chain, &parent_alias, target_type)?;
                // IS NULL means no joined row exists
                ctx.predicates.push(sql::exists(select, !negate));
            }
        }
    }
    Ok(())
}

/// The target type of a type-valued property, if it names one.
fn property_target_type<'a>(
    env: Env<'a>,
    property: &'a Property,
) -> Result<Option<&'a ObjectType>, Error> {
    match property {
        Property::ComplexAttribute(attribute) => attribute
            .target
            .as_deref()
            .map(|name| env.lookup_type(name))
            .transpose(),
        Property::Feature(p) | Property::Object(p) | Property::Complex(p) => {
            env.lookup_type(&p.target).map(Some)
        }
        _ => Ok(None),
    }
}

/// Promote the join reaching an injected property's table from inner to
/// left, scanning backward to the first match. Two injected properties
/// sharing a base-join table name at different path positions are
/// ambiguous here; the first match from the back wins, which mirrors the
/// established behavior.
fn promote_injected_join(ctx: &mut QueryContext, ade_table: &str) {
    if let Some(emitted) = ctx
        .emitted_joins
        .iter()
        .rev()
        .find(|join| join.injected && join.table == ade_table)
    {
        ctx.select.joins[emitted.index].kind = JoinKind::LeftOuter;
    }
}

/// Accumulates the FROM clause, joins and correlated predicates of an
/// EXISTS subquery while a join chain is walked.
struct ExistsParts {
    from: Option<From>,
    joins: Vec<ast::Join>,
    predicates: Vec<Expression>,
}

/// Build a `SELECT 1` subquery testing row existence along a join chain
/// starting at the parent table. Join and junction shapes are re-derived
/// here with the same condition-token substitution as path resolution.
pub(crate) fn exists_for_join_chain(
    env: Env<'_>,
    state: &mut State,
    chain: &[&JoinDef],
    parent_alias: &TableAlias,
    target_type: Option<&ObjectType>,
) -> Result<Select, Error> {
    let mut parts = ExistsParts {
        from: None,
        joins: vec![],
        predicates: vec![],
    };
    let mut current_alias = parent_alias.clone();

    for def in chain {
        match def {
            JoinDef::Join(join) => {
                current_alias =
                    attach_join(env, state, &mut parts, &current_alias, join, target_type)?;
            }
            JoinDef::JoinTable(join_table) => {
                // the junction is entered first; its to-column matches the
                // parent side, swapped relative to the forward walk
                let junction = Join {
                    table: JoinTarget::Table(join_table.table.clone()),
                    from_column: join_table.source_join.from_column.clone(),
                    to_column: join_table.source_join.to_column.clone(),
                    conditions: join_table.source_join.conditions.clone(),
                };
                current_alias =
                    attach_join(env, state, &mut parts, &current_alias, &junction, None)?;
                current_alias = attach_join(
                    env,
                    state,
                    &mut parts,
                    &current_alias,
                    &join_table.target_join,
                    target_type,
                )?;
            }
            JoinDef::Reverse => {
                return Err(Error::UnsupportedJoin(
                    "reverse join while resolving a NULL predicate".to_string(),
                ))
            }
        }
    }

    let from = parts
        .from
        .ok_or_else(|| Error::Internal("a NULL-predicate join chain cannot be empty".to_string()))?;
    let mut select = sql::select_one(from, sql::and_all(parts.predicates));
    select.joins = parts.joins;
    Ok(select)
}

/// Attach one join of the chain: the first table becomes the subquery's
/// FROM with correlated predicates, later tables become inner joins.
fn attach_join(
    env: Env<'_>,
    state: &mut State,
    parts: &mut ExistsParts,
    current_alias: &TableAlias,
    join: &Join,
    target_type: Option<&ObjectType>,
) -> Result<TableAlias, Error> {
    let table = resolve_join_table(env, &join.table, target_type, current_alias)?;
    let alias = state.aliases.next(&table);
    let mut on = vec![sql::equals(
        column_expr(current_alias, &join.from_column),
        column_expr(&alias, &join.to_column),
    )];
    for condition in &join.conditions {
        on.push(schema_path::condition_expr(
            env,
            condition,
            &alias,
            target_type,
        )?);
    }
    let relation = From::Table {
        reference: schema_path::db_table(&table),
        alias: alias.clone(),
    };
    if parts.from.is_none() {
        parts.from = Some(relation);
        parts.predicates.extend(on);
    } else {
        parts.joins.push(ast::Join {
            kind: JoinKind::Inner,
            from: relation,
            on: sql::and_all(on),
        });
    }
    Ok(alias)
}

fn resolve_join_table(
    env: Env<'_>,
    target: &JoinTarget,
    target_type: Option<&ObjectType>,
    _current: &TableAlias,
) -> Result<String, Error> {
    match target {
        JoinTarget::Table(name) => Ok(name.clone()),
        JoinTarget::Target => match target_type {
            Some(object_type) => Ok(env.table_of(object_type)?.to_string()),
            None => Err(Error::UnsupportedJoin(
                "join target token without a target type".to_string(),
            )),
        },
    }
}

/// Null-ness of an inline-stored complex type: all declared inner
/// properties individually null, or any inner property non-null when
/// negated. Terminates via the type's finite property list.
fn inline_null(
    env: Env<'_>,
    state: &mut State,
    alias: &TableAlias,
    object_type: &ObjectType,
    negate: bool,
    depth: usize,
) -> Result<Expression, Error> {
    if depth > 8 {
        return Err(Error::Internal(format!(
            "inline complex type '{}' recurses into itself",
            object_type.name
        )));
    }

    let mut parts = vec![];
    for property in &object_type.properties {
        let mut property = property;
        let mut base_join: Option<&JoinDef> = None;
        if let Property::Injected(injected) = property {
            base_join = injected.base_join.as_ref();
            property = injected.property.as_ref();
        }

        let mut chain: Vec<&JoinDef> = vec![];
        chain.extend(base_join);
        chain.extend(property.join());

        if !chain.is_empty() {
            let target_type = property_target_type(env, property)?;
            let select = exists_for_join_chain(env, state, &chain, alias, target_type)?;
            parts.push(sql::exists(select, !negate));
            continue;
        }

        match property {
            Property::SimpleAttribute(attribute) => {
                parts.push(sql::is_null(column_expr(alias, &attribute.column), negate));
            }
            Property::Geometry(geometry) => {
                for column in geometry
                    .ref_column
                    .iter()
                    .chain(geometry.inline_column.iter())
                {
                    parts.push(sql::is_null(column_expr(alias, column), negate));
                }
            }
            Property::ImplicitGeometry(geometry) => {
                parts.push(sql::is_null(
                    column_expr(alias, &geometry.ref_column),
                    negate,
                ));
            }
            Property::ComplexAttribute(attribute) => {
                if let Some(target) = attribute.target.as_deref() {
                    let target_type = env.lookup_type(target)?;
                    parts.push(inline_null(env, state, alias, target_type, negate, depth + 1)?);
                }
            }
            Property::Feature(p) | Property::Object(p) | Property::Complex(p) => {
                let target_type = env.lookup_type(&p.target)?;
                parts.push(inline_null(env, state, alias, target_type, negate, depth + 1)?);
            }
            Property::Injected(_) => {
                return Err(Error::Internal(
                    "nested injected properties are not part of the mapping model".to_string(),
                ))
            }
        }
    }

    if parts.is_empty() {
        return Ok(if negate {
            sql::false_expr()
        } else {
            sql::true_expr()
        });
    }
    Ok(if negate {
        sql::or_all(parts)
    } else {
        sql::and_all(parts)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_wildcards_are_escaped() {
        let (translated, uses_escape) = translate_wildcards("a%b_c", '*', '?', '\\');
        assert_eq!(translated, "a\\%b\\_c");
        assert!(uses_escape);
    }

    #[test]
    fn user_wildcards_translate_without_escapes() {
        let (translated, uses_escape) = translate_wildcards("a*b?c", '*', '?', '\\');
        assert_eq!(translated, "a%b_c");
        assert!(!uses_escape);
    }

    #[test]
    fn escaped_sequences_pass_through_verbatim() {
        let (translated, uses_escape) = translate_wildcards("a\\*b*c", '*', '?', '\\');
        assert_eq!(translated, "a\\*b%c");
        assert!(uses_escape);
    }

    #[test]
    fn percent_as_user_wildcard_is_not_escaped() {
        let (translated, uses_escape) = translate_wildcards("a%b", '%', '?', '\\');
        assert_eq!(translated, "a%b");
        assert!(!uses_escape);
    }
}
