//! LoD (level of detail) filtering.
//!
//! For every concrete feature type in the filter, the builder decides
//! whether the type can satisfy the requested LoDs at all, then emits an
//! EXISTS predicate testing geometry availability: not-null checks on
//! geometry columns, explicit LoD-qualified columns, and recursive checks
//! on nested features, combined under the filter's AND/OR semantics.

use std::collections::{BTreeMap, BTreeSet};

use lazy_static::lazy_static;
use regex::Regex;

use citydb_filter::filter::{LodFilter, LodFilterMode};
use citydb_schema::mapping::{Join, JoinDef, JoinTarget, ObjectType, Property, TypeKind};
use citydb_sql::sql::ast::{self, Expression, From, JoinKind, TableAlias};
use citydb_sql::sql::helpers as sql;

use super::context::QueryContext;
use super::error::Error;
use super::helpers::{column_expr, Env, State, OBJECTCLASS_ID_COLUMN};
use super::schema_path;

lazy_static! {
    /// Properties without an explicit LoD carry it in their name.
    static ref LOD_NAME_PATTERN: Regex = Regex::new(r"^lod([0-4]).*").expect("valid lod pattern");
}

/// One EXISTS subquery in the making: a table with its correlation to the
/// parent context, its own LoD predicates and nested sub-contexts.
#[derive(Debug)]
struct LodQueryContext {
    table: String,
    alias: TableAlias,
    /// Condition linking this context to its parent (id equality along an
    /// inheritance chain, or a feature join for nested features).
    link: Expression,
    /// Extra relations needed inside the subquery, e.g. a junction table.
    joins: Vec<ast::Join>,
    predicates: Vec<Expression>,
    children: Vec<LodQueryContext>,
}

impl LodQueryContext {
    fn has_content(&self) -> bool {
        !self.predicates.is_empty() || !self.children.is_empty()
    }

    /// Emit `EXISTS (SELECT 1 FROM ... WHERE <link> AND <predicates>)`,
    /// nesting child contexts arbitrarily deep.
    fn build(self, mode: LodFilterMode) -> Expression {
        let mut body = self.predicates;
        body.extend(self.children.into_iter().map(|child| child.build(mode)));
        let combined = match mode {
            LodFilterMode::And => sql::and_all(body),
            LodFilterMode::Or => sql::or_all(body),
        };
        let where_ = Expression::And {
            left: Box::new(self.link),
            right: Box::new(combined),
        };
        let mut select = sql::select_one(
            From::Table {
                reference: schema_path::db_table(&self.table),
                alias: self.alias,
            },
            where_,
        );
        select.joins = self.joins;
        Expression::Exists {
            select: Box::new(select),
        }
    }
}

/// The correlation of a context to its parent, prepared before the
/// context itself is built.
struct Anchor {
    link: Expression,
    joins: Vec<ast::Join>,
}

/// Apply the LoD filter to the statement under construction.
pub fn build(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    filter: &LodFilter,
    feature_types: &[&ObjectType],
) -> Result<(), Error> {
    if filter.is_empty() {
        return Ok(());
    }

    let mut seen = BTreeSet::new();
    let mut branches = vec![];

    for feature_type in feature_types {
        for concrete in concrete_types(env, feature_type) {
            if !seen.insert(concrete.name.clone()) {
                continue;
            }
            if !satisfies_lod_filter(env, concrete, filter) {
                tracing::debug!(
                    feature_type = concrete.name.as_str(),
                    "feature type cannot satisfy the LoD filter"
                );
                continue;
            }

            let table = env.table_of(concrete)?.to_string();
            let alias = state.aliases.next(&table);
            let anchor = Anchor {
                link: sql::equals(
                    column_expr(&alias, env.id_column(concrete)?),
                    column_expr(&ctx.root_table, root_id_column(env, ctx)?),
                ),
                joins: vec![],
            };

            let mut visited = BTreeSet::new();
            let context = build_lod_query_context(
                env,
                state,
                concrete,
                filter,
                filter.search_depth,
                &mut visited,
                table,
                alias,
                anchor,
            )?;

            if let Some(context) = context {
                let mut branch = vec![];
                if let Some(class_id) = concrete.object_class_id {
                    branch.push(sql::equals(
                        column_expr(&ctx.root_table, OBJECTCLASS_ID_COLUMN),
                        Expression::Value(ast::Value::Integer(i64::from(class_id))),
                    ));
                }
                branch.push(context.build(filter.mode));
                branches.push(sql::and_all(branch));
            }
        }
    }

    if branches.is_empty() {
        // no type can satisfy the filter; the query still succeeds and
        // simply matches nothing
        ctx.predicates.push(sql::is_null(
            column_expr(&ctx.root_table, root_id_column(env, ctx)?),
            false,
        ));
    } else {
        ctx.predicates.push(sql::or_all(branches));
    }
    Ok(())
}

fn root_id_column<'a>(env: Env<'a>, ctx: &QueryContext) -> Result<&'a str, Error> {
    let root = env.lookup_type(&ctx.root_type)?;
    env.id_column(root)
}

/// The non-abstract types a feature-type filter entry stands for.
fn concrete_types<'a>(env: Env<'a>, feature_type: &'a ObjectType) -> Vec<&'a ObjectType> {
    let mut types = vec![];
    if !feature_type.is_abstract {
        types.push(feature_type);
    }
    types.extend(
        env.schema
            .subtypes_of(&feature_type.name)
            .into_iter()
            .filter(|subtype| !subtype.is_abstract),
    );
    types
}

/// Whether a type can satisfy the filter: under OR-mode any requested LoD
/// must be available on the type or one of its nested features, under
/// AND-mode every requested LoD must be.
pub fn satisfies_lod_filter(env: Env<'_>, object_type: &ObjectType, filter: &LodFilter) -> bool {
    let mut visited = BTreeSet::new();
    let available = availability(env, object_type, filter.search_depth, &mut visited);
    let requested = filter.requested_lods();
    match filter.mode {
        LodFilterMode::Or => requested.iter().any(|lod| available.contains(lod)),
        LodFilterMode::And => requested.iter().all(|lod| available.contains(lod)),
    }
}

/// The set of LoDs a type can attest, on its own properties or through
/// nested features up to the depth bound.
fn availability(
    env: Env<'_>,
    object_type: &ObjectType,
    depth: Option<u8>,
    visited: &mut BTreeSet<(String, String)>,
) -> BTreeSet<u8> {
    let mut lods = BTreeSet::new();
    for chain_type in env.schema.extension_chain(object_type) {
        for property in &chain_type.properties {
            let Some(property) = enabled_property(env, property) else {
                continue;
            };
            if let Some(lod) = property_lod(property) {
                lods.insert(lod);
            }
            if let Some(target) = nested_feature_target(env, property) {
                if depth == Some(0) {
                    continue;
                }
                let key = (chain_type.name.clone(), property.name().to_string());
                if !visited.insert(key) {
                    continue;
                }
                for candidate in concrete_types(env, target) {
                    lods.extend(availability(
                        env,
                        candidate,
                        depth.map(|d| d.saturating_sub(1)),
                        visited,
                    ));
                }
            }
        }
    }
    lods
}

/// Unwrap injected properties, dropping those of disabled ADE schemas.
fn enabled_property<'a>(env: Env<'a>, property: &'a Property) -> Option<&'a Property> {
    match property {
        Property::Injected(injected) => {
            if env.schema.is_ade_enabled(&injected.ade) {
                Some(injected.property.as_ref())
            } else {
                None
            }
        }
        _ => Some(property),
    }
}

/// The base join of an injected property, when its ADE schema is enabled.
fn injected_base_join<'a>(env: Env<'a>, property: &'a Property) -> Option<&'a JoinDef> {
    match property {
        Property::Injected(injected) if env.schema.is_ade_enabled(&injected.ade) => {
            injected.base_join.as_ref()
        }
        _ => None,
    }
}

/// The LoD a property attests, from its explicit field or parsed from an
/// `lodN...` name.
fn property_lod(property: &Property) -> Option<u8> {
    let (explicit, name) = match property {
        Property::Geometry(geometry) => (geometry.lod, geometry.name.as_str()),
        Property::ImplicitGeometry(geometry) => (geometry.lod, geometry.name.as_str()),
        Property::SimpleAttribute(attribute) => (attribute.lod, attribute.name.as_str()),
        _ => return None,
    };
    explicit.or_else(|| {
        let local = name.rsplit(':').next().unwrap_or(name);
        LOD_NAME_PATTERN
            .captures(local)
            .and_then(|captures| captures.get(1))
            .and_then(|digit| digit.as_str().parse().ok())
    })
}

/// The target of a feature property pointing at a nested (non-top-level)
/// feature type.
fn nested_feature_target<'a>(env: Env<'a>, property: &'a Property) -> Option<&'a ObjectType> {
    match property {
        Property::Feature(type_property) => {
            let target = env.schema.lookup_type(&type_property.target)?;
            (target.kind == TypeKind::Feature && !target.top_level).then_some(target)
        }
        _ => None,
    }
}

/// The not-null expressions a geometry property contributes.
fn geometry_columns(property: &Property, alias: &TableAlias) -> Vec<Expression> {
    match property {
        Property::Geometry(geometry) => geometry
            .ref_column
            .iter()
            .chain(geometry.inline_column.iter())
            .map(|column| sql::is_null(column_expr(alias, column), true))
            .collect(),
        Property::ImplicitGeometry(geometry) => {
            vec![sql::is_null(column_expr(alias, &geometry.ref_column), true)]
        }
        Property::SimpleAttribute(attribute) => {
            vec![sql::is_null(column_expr(alias, &attribute.column), true)]
        }
        _ => vec![],
    }
}

/// Build the LoD query context tree of one concrete type: a context per
/// backing table along its extension chain, a sub-context per injected
/// LoD property behind a base join, and a sub-context per nested feature.
/// Returns `None` when the type contributes nothing or cannot meet an
/// AND-mode requirement.
#[allow(clippy::too_many_arguments)]
fn build_lod_query_context(
    env: Env<'_>,
    state: &mut State,
    concrete: &ObjectType,
    filter: &LodFilter,
    depth: Option<u8>,
    visited: &mut BTreeSet<(String, String)>,
    table: String,
    alias: TableAlias,
    anchor: Anchor,
) -> Result<Option<LodQueryContext>, Error> {
    let mut primary = LodQueryContext {
        table,
        alias,
        link: anchor.link,
        joins: anchor.joins,
        predicates: vec![],
        children: vec![],
    };
    // contexts of further tables along the extension chain, id-linked
    let mut secondary: Vec<LodQueryContext> = vec![];
    let mut table_index: BTreeMap<String, usize> = BTreeMap::new();

    // per (context, LoD) buckets of geometry and LoD-column tests; a ref
    // and an inline column at the same LoD combine with OR
    let mut geometry_buckets: BTreeMap<(usize, u8), Vec<Expression>> = BTreeMap::new();
    let mut lod_column_buckets: BTreeMap<(usize, u8), Vec<Expression>> = BTreeMap::new();
    let mut has_geometry_properties = false;

    let chain: Vec<&ObjectType> = env.schema.extension_chain(concrete);
    for chain_type in &chain {
        let chain_table = env.table_of(chain_type)?.to_string();
        // index 0 is the primary context, 1.. are secondary contexts
        let context_index = if chain_table == primary.table {
            0
        } else if let Some(index) = table_index.get(&chain_table) {
            *index
        } else {
            let chain_alias = state.aliases.next(&chain_table);
            let link = sql::equals(
                column_expr(&chain_alias, env.id_column(chain_type)?),
                column_expr(&primary.alias, env.id_column(concrete)?),
            );
            secondary.push(LodQueryContext {
                table: chain_table.clone(),
                alias: chain_alias,
                link,
                joins: vec![],
                predicates: vec![],
                children: vec![],
            });
            let index = secondary.len();
            table_index.insert(chain_table.clone(), index);
            index
        };

        let context_alias = if context_index == 0 {
            primary.alias.clone()
        } else {
            secondary[context_index - 1].alias.clone()
        };

        for raw_property in &chain_type.properties {
            let Some(property) = enabled_property(env, raw_property) else {
                continue;
            };

            if matches!(
                property,
                Property::Geometry(_) | Property::ImplicitGeometry(_)
            ) {
                has_geometry_properties = true;
            }

            if let Some(lod) = property_lod(property) {
                if !filter.is_enabled(lod) {
                    continue;
                }
                if let Some(base_join) = injected_base_join(env, raw_property) {
                    // an injected LoD property lives on its ADE table and
                    // gets a sub-context of its own
                    let context = injected_lod_context(
                        env,
                        state,
                        base_join,
                        &context_alias,
                        property,
                    )?;
                    if context_index == 0 {
                        primary.children.push(context);
                    } else {
                        secondary[context_index - 1].children.push(context);
                    }
                    continue;
                }
                let columns = geometry_columns(property, &context_alias);
                let bucket = match property {
                    Property::SimpleAttribute(_) => &mut lod_column_buckets,
                    _ => &mut geometry_buckets,
                };
                bucket.entry((context_index, lod)).or_default().extend(columns);
                continue;
            }

            if let Some(target) = nested_feature_target(env, property) {
                if depth == Some(0) {
                    continue;
                }
                let key = (chain_type.name.clone(), property.name().to_string());
                if !visited.insert(key) {
                    // hierarchical self-referencing properties stop here
                    continue;
                }
                for candidate in concrete_types(env, target) {
                    if !satisfies_lod_filter(env, candidate, filter) {
                        continue;
                    }
                    let candidate_table = env.table_of(candidate)?.to_string();
                    let candidate_alias = state.aliases.next(&candidate_table);
                    let Some(anchor) = nested_anchor(
                        env,
                        state,
                        raw_property,
                        property,
                        &context_alias,
                        &candidate_alias,
                        candidate,
                    )?
                    else {
                        continue;
                    };
                    let child = build_lod_query_context(
                        env,
                        state,
                        candidate,
                        filter,
                        depth.map(|d| d.saturating_sub(1)),
                        visited,
                        candidate_table,
                        candidate_alias,
                        anchor,
                    )?;
                    if let Some(child) = child {
                        if context_index == 0 {
                            primary.children.push(child);
                        } else {
                            secondary[context_index - 1].children.push(child);
                        }
                    }
                }
            }
        }
    }

    // under AND-mode, a requested LoD without any contributing geometry
    // column makes the type categorically unable to satisfy the filter
    if filter.mode == LodFilterMode::And && has_geometry_properties {
        for lod in filter.requested_lods() {
            let covered = geometry_buckets.keys().any(|(_, l)| *l == lod);
            if !covered {
                return Ok(None);
            }
        }
    }

    for ((context_index, _), columns) in geometry_buckets.into_iter().chain(lod_column_buckets) {
        let predicate = sql::or_all(columns);
        if context_index == 0 {
            primary.predicates.push(predicate);
        } else {
            secondary[context_index - 1].predicates.push(predicate);
        }
    }

    for context in secondary {
        if context.has_content() {
            primary.children.push(context);
        }
    }

    Ok(primary.has_content().then_some(primary))
}

/// A sub-context for an injected LoD property: the ADE table linked by
/// the base join, testing the property's columns.
fn injected_lod_context(
    env: Env<'_>,
    state: &mut State,
    base_join: &JoinDef,
    parent_alias: &TableAlias,
    property: &Property,
) -> Result<LodQueryContext, Error> {
    let JoinDef::Join(join) = base_join else {
        return Err(Error::UnsupportedJoin(
            "injected LoD properties must use a simple base join".to_string(),
        ));
    };
    let table = match &join.table {
        JoinTarget::Table(name) => name.clone(),
        JoinTarget::Target => {
            return Err(Error::UnsupportedJoin(
                "an injected base join cannot use the target token".to_string(),
            ))
        }
    };
    let alias = state.aliases.next(&table);
    let mut link = vec![sql::equals(
        column_expr(parent_alias, &join.from_column),
        column_expr(&alias, &join.to_column),
    )];
    for condition in &join.conditions {
        link.push(schema_path::condition_expr(env, condition, &alias, None)?);
    }
    Ok(LodQueryContext {
        table,
        alias: alias.clone(),
        link: sql::and_all(link),
        joins: vec![],
        predicates: vec![sql::or_all(geometry_columns(property, &alias))],
        children: vec![],
    })
}

/// The correlation of a nested feature context to its parent: a direct
/// foreign key, a junction table, or an ADE base join followed by the
/// property's own join. Returns `None` when the property carries no join
/// at all.
fn nested_anchor(
    env: Env<'_>,
    state: &mut State,
    raw_property: &Property,
    property: &Property,
    parent_alias: &TableAlias,
    candidate_alias: &TableAlias,
    candidate: &ObjectType,
) -> Result<Option<Anchor>, Error> {
    let base_join = injected_base_join(env, raw_property);
    let own_join = property.join();

    match (base_join, own_join) {
        (None, Some(JoinDef::Join(join))) => Ok(Some(Anchor {
            link: simple_link(env, join, parent_alias, candidate_alias, candidate)?,
            joins: vec![],
        })),
        (None, Some(JoinDef::JoinTable(join_table))) => {
            let junction_alias = state.aliases.next(&join_table.table);
            // the subquery selects from the candidate table; the junction
            // comes in as an inner join and carries the correlation
            let mut on = vec![sql::equals(
                column_expr(&junction_alias, &join_table.target_join.from_column),
                column_expr(candidate_alias, &join_table.target_join.to_column),
            )];
            for condition in &join_table.target_join.conditions {
                on.push(schema_path::condition_expr(
                    env,
                    condition,
                    candidate_alias,
                    Some(candidate),
                )?);
            }
            let junction_join = ast::Join {
                kind: JoinKind::Inner,
                from: From::Table {
                    reference: schema_path::db_table(&join_table.table),
                    alias: junction_alias.clone(),
                },
                on: sql::and_all(on),
            };
            Ok(Some(Anchor {
                link: sql::equals(
                    column_expr(parent_alias, &join_table.source_join.from_column),
                    column_expr(&junction_alias, &join_table.source_join.to_column),
                ),
                joins: vec![junction_join],
            }))
        }
        (Some(JoinDef::Join(base)), own) => {
            let base_table = match &base.table {
                JoinTarget::Table(name) => name.clone(),
                JoinTarget::Target => {
                    return Err(Error::UnsupportedJoin(
                        "an injected base join cannot use the target token".to_string(),
                    ))
                }
            };
            let base_alias = state.aliases.next(&base_table);
            let link = sql::equals(
                column_expr(parent_alias, &base.from_column),
                column_expr(&base_alias, &base.to_column),
            );
            let Some(JoinDef::Join(join)) = own else {
                return Err(Error::UnsupportedJoin(
                    "an injected nested feature needs a simple join after its base join"
                        .to_string(),
                ));
            };
            let on = simple_link(env, join, &base_alias, candidate_alias, candidate)?;
            let base_join = ast::Join {
                kind: JoinKind::Inner,
                from: From::Table {
                    reference: schema_path::db_table(&base_table),
                    alias: base_alias,
                },
                on,
            };
            Ok(Some(Anchor {
                link,
                joins: vec![base_join],
            }))
        }
        (None, Some(JoinDef::Reverse)) | (Some(_), _) => Err(Error::UnsupportedJoin(
            "unsupported join shape for a nested feature".to_string(),
        )),
        (None, None) => Ok(None),
    }
}

/// `parent.from = candidate.to` plus the join's conditions.
fn simple_link(
    env: Env<'_>,
    join: &Join,
    parent_alias: &TableAlias,
    candidate_alias: &TableAlias,
    candidate: &ObjectType,
) -> Result<Expression, Error> {
    let mut link = vec![sql::equals(
        column_expr(parent_alias, &join.from_column),
        column_expr(candidate_alias, &join.to_column),
    )];
    for condition in &join.conditions {
        link.push(schema_path::condition_expr(
            env,
            condition,
            candidate_alias,
            Some(candidate),
        )?);
    }
    Ok(sql::and_all(link))
}
