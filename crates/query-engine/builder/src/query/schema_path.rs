//! Resolve schema paths to concrete table/column/join chains.
//!
//! A schema path walks type and property nodes starting at a root feature
//! or object type. Each property hop may cross extension boundaries and
//! emit joins; repeated joins to the same logical table within one nesting
//! level are reused, while joins inside a many-to-many junction start a
//! fresh level.

use std::collections::BTreeSet;

use citydb_filter::filter::{Literal, PathCondition, SchemaPath};
use citydb_schema::mapping::{
    Condition, ConditionValue, Join, JoinDef, JoinTarget, ObjectType, Property, ScalarType,
};
use citydb_sql::sql::ast::{
    self, BinaryArrayOperator, Expression, From, JoinKind, TableAlias, TableName, TableReference,
};
use citydb_sql::sql::helpers as sql;

use super::context::{EmittedJoin, QueryContext, ResolvedTarget};
use super::error::Error;
use super::helpers::{column_expr, literal_to_value, Env, State, OBJECTCLASS_ID_COLUMN};

/// Per-path traversal state: the node we are at and the table context it
/// lives in.
struct Walk<'a> {
    current_type: &'a ObjectType,
    current_table: String,
    current_alias: TableAlias,
    level: usize,
    /// Set when the walk crossed an injected property's base join; carries
    /// the ADE table name for the NULL-predicate promotion scan.
    injected_table: Option<String>,
}

/// Build a fresh query context over a schema path.
///
/// `object_class_ids` discriminates the root table; an empty set means no
/// discrimination. With `add_projection` the target column (or the root id
/// for type-terminal paths) enters the select list.
pub fn build(
    env: Env<'_>,
    state: &mut State,
    path: &SchemaPath,
    object_class_ids: &BTreeSet<u32>,
    add_projection: bool,
    match_case: bool,
) -> Result<QueryContext, Error> {
    let root = env.lookup_type(&path.root)?;
    let table = env.table_of(root)?.to_string();
    let alias = state.aliases.next(&table);
    state.context_mut(0).insert(table.clone(), alias.clone());

    let mut select = sql::simple_select(vec![]);
    select.from = Some(From::Table {
        reference: db_table(&table),
        alias: alias.clone(),
    });

    let mut ctx = QueryContext {
        select,
        root_type: path.root.clone(),
        root_table: alias.clone(),
        target: None,
        predicates: vec![],
        emitted_joins: vec![],
    };

    if !object_class_ids.is_empty() {
        ctx.predicates.push(in_or_equals(
            column_expr(&alias, OBJECTCLASS_ID_COLUMN),
            object_class_ids,
        ));
    }

    let target = extend(env, state, &mut ctx, path, match_case)?;

    if add_projection {
        project_target(env, &mut ctx, &target)?;
    }

    // merge issued aliases so statements built concurrently and later
    // combined into one outer statement never collide
    state.finish();

    Ok(ctx)
}

/// Append a further schema path to a live context, reusing its table
/// contexts. Returns what the path's terminal node resolved to.
pub fn extend(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    path: &SchemaPath,
    match_case: bool,
) -> Result<ResolvedTarget, Error> {
    let root = env.lookup_type(&ctx.root_type)?;
    let root_table = env.table_of(root)?.to_string();

    let mut walk = Walk {
        current_type: root,
        current_table: root_table,
        current_alias: ctx.root_table.clone(),
        level: 0,
        injected_table: None,
    };

    if path.root != ctx.root_type {
        let path_root = env.lookup_type(&path.root)?;
        if env.schema.is_subtype_of(&path.root, &ctx.root_type) {
            visit_type_node(env, state, ctx, &mut walk, path_root)?;
        } else if !env.schema.is_subtype_of(&ctx.root_type, &path.root) {
            return Err(Error::Internal(format!(
                "schema path root '{}' is unrelated to the query root '{}'",
                path.root, ctx.root_type
            )));
        }
    }

    let mut target = ResolvedTarget::Table {
        table: walk.current_alias.clone(),
        type_name: walk.current_type.name.clone(),
    };

    for (index, step) in path.steps.iter().enumerate() {
        let is_last = index + 1 == path.steps.len();
        // a type node right after a property discriminates the join target
        let next_type = path
            .steps
            .get(index + 1)
            .and_then(|next| env.schema.lookup_type(&next.name));

        if env
            .schema
            .resolve_property(walk.current_type, &step.name)
            .is_some()
        {
            target =
                visit_property_node(env, state, ctx, &mut walk, &step.name, is_last, next_type)?;
        } else if let Some(step_type) = env.schema.lookup_type(&step.name) {
            visit_type_node(env, state, ctx, &mut walk, step_type)?;
            target = ResolvedTarget::Table {
                table: walk.current_alias.clone(),
                type_name: walk.current_type.name.clone(),
            };
        } else {
            return Err(Error::PropertyNotFound {
                type_name: walk.current_type.name.clone(),
                property: step.name.clone(),
            });
        }

        if let Some(condition) = &step.condition {
            let expression =
                compile_path_condition(env, walk.current_type, &walk.current_alias, condition, match_case)?;
            ctx.predicates.push(expression);
        }
    }

    ctx.target = Some(target.clone());
    Ok(target)
}

/// Resolve a property on the current type, emitting joins for crossed
/// extension boundaries, injected base joins, and the property's own join.
fn visit_property_node<'a>(
    env: Env<'a>,
    state: &mut State,
    ctx: &mut QueryContext,
    walk: &mut Walk<'a>,
    property_name: &str,
    is_last: bool,
    next_type: Option<&'a ObjectType>,
) -> Result<ResolvedTarget, Error> {
    let resolution = env.resolve_property(walk.current_type, property_name)?;
    let declaring_table = env.table_of(resolution.declaring_type)?.to_string();

    for join_def in &resolution.crossed_joins {
        apply_join_def(
            env,
            state,
            ctx,
            walk,
            join_def,
            None,
            Some(declaring_table.as_str()),
            false,
            false,
        )?;
    }

    let mut property = resolution.property;
    if let Property::Injected(injected) = property {
        if let Some(base_join) = &injected.base_join {
            apply_join_def(
                env,
                state,
                ctx,
                walk,
                base_join,
                None,
                None,
                false,
                true,
            )?;
            walk.injected_table = Some(walk.current_table.clone());
        }
        property = injected.property.as_ref();
    }

    match property {
        Property::SimpleAttribute(attribute) => {
            if !is_last {
                return Err(Error::UnsupportedOperand(format!(
                    "schema path continues past the scalar property '{property_name}'"
                )));
            }
            Ok(ResolvedTarget::Column {
                table: walk.current_alias.clone(),
                column: attribute.column.clone(),
                scalar_type: attribute.r#type,
                injected_table: walk.injected_table.clone(),
            })
        }
        Property::Geometry(geometry) => {
            if !is_last {
                return Err(Error::UnsupportedOperand(format!(
                    "schema path continues past the geometry property '{property_name}'"
                )));
            }
            Ok(ResolvedTarget::Geometry {
                table: walk.current_alias.clone(),
                ref_column: geometry.ref_column.clone(),
                inline_column: geometry.inline_column.clone(),
                injected_table: walk.injected_table.clone(),
            })
        }
        Property::ImplicitGeometry(geometry) => {
            if !is_last {
                return Err(Error::UnsupportedOperand(format!(
                    "schema path continues past the implicit geometry property '{property_name}'"
                )));
            }
            Ok(ResolvedTarget::Geometry {
                table: walk.current_alias.clone(),
                ref_column: Some(geometry.ref_column.clone()),
                inline_column: None,
                injected_table: walk.injected_table.clone(),
            })
        }
        Property::ComplexAttribute(attribute) => {
            let target_type = attribute
                .target
                .as_deref()
                .map(|name| env.lookup_type(name))
                .transpose()?;
            if let Some(join_def) = &attribute.join {
                apply_join_def(env, state, ctx, walk, join_def, target_type, None, false, false)?;
            }
            if let Some(target_type) = target_type {
                walk.current_type = target_type;
            }
            Ok(ResolvedTarget::Table {
                table: walk.current_alias.clone(),
                type_name: walk.current_type.name.clone(),
            })
        }
        Property::Feature(type_property)
        | Property::Object(type_property)
        | Property::Complex(type_property) => {
            let target_type = env.lookup_type(&type_property.target)?;
            // a concrete subtype named by the next path node discriminates
            // the join target, instead of an IN list over all subtypes
            let join_target = next_type
                .filter(|next| env.schema.is_subtype_of(&next.name, &target_type.name))
                .unwrap_or(target_type);
            if let Some(join_def) = &type_property.join {
                apply_join_def(env, state, ctx, walk, join_def, Some(join_target), None, false, false)?;
            }
            walk.current_type = join_target;
            Ok(ResolvedTarget::Table {
                table: walk.current_alias.clone(),
                type_name: walk.current_type.name.clone(),
            })
        }
        Property::Injected(_) => Err(Error::Internal(
            "nested injected properties are not part of the mapping model".to_string(),
        )),
    }
}

/// Move the walk to a type node. A subtype whose join target is actually
/// the shared parent table gets a corrective join chain synthesized from
/// the extension hierarchy, so later joins land on the specialized child
/// table.
fn visit_type_node<'a>(
    env: Env<'a>,
    state: &mut State,
    ctx: &mut QueryContext,
    walk: &mut Walk<'a>,
    step_type: &'a ObjectType,
) -> Result<(), Error> {
    if step_type.name == walk.current_type.name {
        return Ok(());
    }

    if env
        .schema
        .is_subtype_of(&step_type.name, &walk.current_type.name)
    {
        // walk downward: emit the extension joins between the current type
        // and the subtype, topmost boundary first
        let chain = env.schema.extension_chain(step_type);
        let position = chain
            .iter()
            .position(|ancestor| ancestor.name == walk.current_type.name)
            .ok_or_else(|| {
                Error::Internal(format!(
                    "type '{}' vanished from the extension chain of '{}'",
                    walk.current_type.name, step_type.name
                ))
            })?;
        for descendant in chain[..position].iter().rev().copied() {
            if let Some(extension) = &descendant.extension {
                match &extension.join {
                    // extension joins point from the subtype's table to the
                    // base table; descending reverses them so the join
                    // lands on the specialized child table
                    Some(JoinDef::Join(join)) => {
                        let table = env.table_of(descendant)?.to_string();
                        let reversed = Join {
                            table: JoinTarget::Table(table),
                            from_column: join.to_column.clone(),
                            to_column: join.from_column.clone(),
                            conditions: join.conditions.clone(),
                        };
                        add_join(
                            env,
                            state,
                            ctx,
                            walk,
                            &reversed,
                            Some(descendant),
                            None,
                            false,
                            false,
                        )?;
                    }
                    Some(_) => {
                        return Err(Error::UnsupportedJoin(
                            "extension joins must be simple joins".to_string(),
                        ))
                    }
                    None => {}
                }
            }
        }
        walk.current_type = step_type;
        Ok(())
    } else if env
        .schema
        .is_subtype_of(&walk.current_type.name, &step_type.name)
    {
        // walk upward along the current type's chain
        let chain = env.schema.extension_chain(walk.current_type);
        for ancestor in chain.iter().copied() {
            if ancestor.name == step_type.name {
                break;
            }
            if let Some(extension) = &ancestor.extension {
                if let Some(join_def) = &extension.join {
                    let base = env.lookup_type(&extension.base)?;
                    let table = env.table_of(base)?.to_string();
                    apply_join_def(
                        env,
                        state,
                        ctx,
                        walk,
                        join_def,
                        Some(base),
                        Some(table.as_str()),
                        false,
                        false,
                    )?;
                }
            }
        }
        walk.current_type = step_type;
        Ok(())
    } else {
        Err(Error::Internal(format!(
            "path step type '{}' is unreachable from '{}'",
            step_type.name, walk.current_type.name
        )))
    }
}

/// Apply a join descriptor, dispatching on its shape.
#[allow(clippy::too_many_arguments)]
fn apply_join_def(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    walk: &mut Walk<'_>,
    join_def: &JoinDef,
    target_type: Option<&ObjectType>,
    target_table_hint: Option<&str>,
    force: bool,
    injected: bool,
) -> Result<(), Error> {
    match join_def {
        JoinDef::Join(join) => add_join(
            env,
            state,
            ctx,
            walk,
            join,
            target_type,
            target_table_hint,
            force,
            injected,
        ),
        JoinDef::JoinTable(join_table) => {
            // joins inside a junction start a fresh nesting level, and are
            // always forced: a junction may legitimately appear at two
            // different positions relative to the same logical table
            walk.level += 1;
            let source = Join {
                table: JoinTarget::Table(join_table.table.clone()),
                from_column: join_table.source_join.from_column.clone(),
                to_column: join_table.source_join.to_column.clone(),
                conditions: join_table.source_join.conditions.clone(),
            };
            add_join(env, state, ctx, walk, &source, None, None, true, injected)?;
            add_join(
                env,
                state,
                ctx,
                walk,
                &join_table.target_join,
                target_type,
                target_table_hint,
                true,
                injected,
            )
        }
        JoinDef::Reverse => {
            // walk backward along the join emitted for the previous node
            let last = ctx.emitted_joins.last().ok_or_else(|| {
                Error::UnsupportedJoin("reverse join without a preceding join".to_string())
            })?;
            walk.current_alias = last.from_alias.clone();
            walk.current_table = last.from_table.clone();
            Ok(())
        }
    }
}

/// Emit one simple join, unless an equal join in the current table context
/// can be reused.
#[allow(clippy::too_many_arguments)]
fn add_join(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    walk: &mut Walk<'_>,
    join: &Join,
    target_type: Option<&ObjectType>,
    target_table_hint: Option<&str>,
    force: bool,
    injected: bool,
) -> Result<(), Error> {
    let table = match &join.table {
        JoinTarget::Table(name) => name.clone(),
        JoinTarget::Target => match target_type {
            Some(object_type) => env.table_of(object_type)?.to_string(),
            None => target_table_hint
                .map(ToString::to_string)
                // a self-referential join resolves to the current table
                .unwrap_or_else(|| walk.current_table.clone()),
        },
    };

    if !force {
        if let Some(alias) = state.context_mut(walk.level).get(&table) {
            walk.current_alias = alias.clone();
            walk.current_table = table;
            return Ok(());
        }
    }

    let alias = state.aliases.next(&table);
    let mut on = sql::equals(
        column_expr(&walk.current_alias, &join.from_column),
        column_expr(&alias, &join.to_column),
    );
    for condition in &join.conditions {
        let expression = condition_expr(env, condition, &alias, target_type)?;
        on = Expression::And {
            left: Box::new(on),
            right: Box::new(expression),
        };
    }

    let kind = if state.use_left_joins {
        JoinKind::LeftOuter
    } else {
        JoinKind::Inner
    };

    tracing::debug!(
        table = table.as_str(),
        alias = alias.name.as_str(),
        "emitting join"
    );

    ctx.select.joins.push(ast::Join {
        kind,
        from: From::Table {
            reference: db_table(&table),
            alias: alias.clone(),
        },
        on,
    });
    ctx.emitted_joins.push(EmittedJoin {
        table: table.clone(),
        index: ctx.select.joins.len() - 1,
        injected,
        from_alias: walk.current_alias.clone(),
        from_table: walk.current_table.clone(),
    });
    state.context_mut(walk.level).insert(table.clone(), alias.clone());

    walk.current_alias = alias;
    walk.current_table = table;
    Ok(())
}

/// Substitute a join-condition value.
pub(crate) fn condition_expr(
    env: Env<'_>,
    condition: &Condition,
    target_alias: &TableAlias,
    target_type: Option<&ObjectType>,
) -> Result<Expression, Error> {
    let column = column_expr(target_alias, &condition.column);
    match &condition.value {
        ConditionValue::Literal(text) => {
            let value = match condition.r#type {
                ScalarType::Integer => ast::Value::Integer(text.parse().map_err(|_| {
                    Error::UnsupportedJoin(format!("invalid integer join condition '{text}'"))
                })?),
                ScalarType::Double => ast::Value::Double(text.parse().map_err(|_| {
                    Error::UnsupportedJoin(format!("invalid double join condition '{text}'"))
                })?),
                ScalarType::String => ast::Value::String(text.clone()),
                other => {
                    return Err(Error::UnsupportedOperand(format!(
                        "{other} literals are not supported as join condition values"
                    )))
                }
            };
            Ok(sql::equals(column, Expression::Value(value)))
        }
        ConditionValue::TargetObjectClassId => {
            let target_type = target_type.ok_or_else(|| {
                Error::UnsupportedJoin(
                    "objectclass condition token without a join target type".to_string(),
                )
            })?;
            if target_type.is_abstract {
                let ids = env.schema.object_class_ids(&target_type.name, true);
                if ids.is_empty() {
                    return Err(Error::Internal(format!(
                        "abstract type '{}' has no concrete subtypes",
                        target_type.name
                    )));
                }
                Ok(in_or_equals(column, &ids))
            } else {
                let id = target_type.object_class_id.ok_or_else(|| {
                    Error::Internal(format!(
                        "type '{}' carries no object class id",
                        target_type.name
                    ))
                })?;
                Ok(sql::equals(
                    column,
                    Expression::Value(ast::Value::Integer(i64::from(id))),
                ))
            }
        }
        ConditionValue::TargetId => {
            let id_column = match target_type {
                Some(object_type) => env.id_column(object_type)?,
                None => "id",
            };
            Ok(sql::equals(column, column_expr(target_alias, id_column)))
        }
    }
}

/// Compile a node-level condition into SQL predicates against the node's
/// table.
fn compile_path_condition(
    env: Env<'_>,
    object_type: &ObjectType,
    alias: &TableAlias,
    condition: &PathCondition,
    match_case: bool,
) -> Result<Expression, Error> {
    match condition {
        PathCondition::Eq { property, literal } => {
            let resolution = env.resolve_property(object_type, property)?;
            let Property::SimpleAttribute(attribute) = resolution.property else {
                return Err(Error::UnsupportedOperand(format!(
                    "node condition on the non-scalar property '{property}'"
                )));
            };
            if !literal.matches(attribute.r#type) {
                return Err(Error::TypeMismatch {
                    property: property.clone(),
                    literal: literal.type_name(),
                    expected: attribute.r#type,
                });
            }
            let column = column_expr(alias, &attribute.column);
            Ok(fold_equality(env, column, literal, match_case))
        }
        PathCondition::And(conditions) => Ok(sql::and_all(
            conditions
                .iter()
                .map(|c| compile_path_condition(env, object_type, alias, c, match_case))
                .collect::<Result<Vec<_>, Error>>()?,
        )),
        PathCondition::Or(conditions) => Ok(sql::or_all(
            conditions
                .iter()
                .map(|c| compile_path_condition(env, object_type, alias, c, match_case))
                .collect::<Result<Vec<_>, Error>>()?,
        )),
    }
}

/// An equality with case folding applied uniformly to both sides when
/// `match_case` is off and the literal is a string.
fn fold_equality(
    env: Env<'_>,
    column: Expression,
    literal: &Literal,
    match_case: bool,
) -> Expression {
    match literal {
        Literal::String(text) if !match_case => {
            let upper = env.adapter.upper_function();
            sql::equals(
                Expression::FunctionCall {
                    function: upper.clone(),
                    args: vec![column],
                },
                Expression::FunctionCall {
                    function: upper,
                    args: vec![Expression::Value(ast::Value::String(text.to_uppercase()))],
                },
            )
        }
        _ => sql::equals(column, Expression::Value(literal_to_value(literal))),
    }
}

/// Add the path target (or the root id for type-terminal paths) to the
/// select list.
fn project_target(
    env: Env<'_>,
    ctx: &mut QueryContext,
    target: &ResolvedTarget,
) -> Result<(), Error> {
    let projection = match target {
        ResolvedTarget::Column { table, column, .. } => {
            (sql::make_column_alias(column.clone()), column_expr(table, column))
        }
        ResolvedTarget::Geometry {
            table,
            ref_column,
            inline_column,
            ..
        } => {
            let column = ref_column.as_ref().or(inline_column.as_ref()).ok_or_else(|| {
                Error::Internal("geometry property without any column".to_string())
            })?;
            (sql::make_column_alias(column.clone()), column_expr(table, column))
        }
        ResolvedTarget::Table { table, type_name } => {
            let object_type = env.lookup_type(type_name)?;
            let id_column = env.id_column(object_type)?;
            (
                sql::make_column_alias(id_column),
                column_expr(table, id_column),
            )
        }
    };

    if let ast::SelectList::SelectList(list) = &mut ctx.select.select_list {
        list.push(projection);
    }
    Ok(())
}

/// Membership against one id or an id set.
pub fn in_or_equals(column: Expression, ids: &BTreeSet<u32>) -> Expression {
    if ids.len() == 1 {
        if let Some(id) = ids.first() {
            return sql::equals(
                column,
                Expression::Value(ast::Value::Integer(i64::from(*id))),
            );
        }
    }
    Expression::BinaryArrayOperation {
        left: Box::new(column),
        operator: BinaryArrayOperator::In,
        right: ids
            .iter()
            .map(|id| Expression::Value(ast::Value::Integer(i64::from(*id))))
            .collect(),
    }
}

/// A table reference without a schema qualifier; qualification is left to
/// the statement's execution search path.
pub fn db_table(table: &str) -> TableReference {
    TableReference::DBTable {
        schema: None,
        table: TableName(table.to_string()),
    }
}
