//! End-to-end tests of the query builder against a small city model.

mod common;

use std::collections::BTreeSet;

use similar_asserts::assert_eq;

use citydb_filter::filter::{
    ComparisonOp, ComparisonPredicate, CounterFilter, GeometryObject, IdPredicate, Literal,
    LodFilter, LodFilterMode, LogicalPredicate, MaterializedQuery, PathCondition, Predicate,
    Query, SchemaPath, SortOrder, SortProperty, Sorting, SpatialOp, SpatialPredicate,
    ValueReference,
};
use citydb_query_builder::query::context::{BuildProperties, ResolvedTarget};
use citydb_query_builder::query::error::Error;
use citydb_query_builder::query::helpers::{Env, State};
use citydb_query_builder::query::{lod, predicate, schema_path, QueryBuilder};
use citydb_schema::mapping::CityGmlVersion;
use citydb_sql::sql::ast::{
    BinaryOperator, Expression, From, Function, JoinKind, Select, TableReference, UnaryOperator,
    Value,
};
use citydb_sql::sql::convert::select_to_sql;

fn reference(root: &str, steps: &[&str]) -> ValueReference {
    let mut path = SchemaPath::new(root);
    for step in steps {
        path = path.child(*step);
    }
    ValueReference(path)
}

fn building_query() -> Query {
    Query::for_feature_types(vec!["bldg:Building".to_string()], CityGmlVersion::V2_0)
}

fn build(query: &Query) -> Select {
    let schema = common::test_schema();
    let adapter = common::postgis();
    let builder = QueryBuilder::new(&schema, &adapter, common::registry());
    builder
        .build_query(query, &BuildProperties::new())
        .expect("query builds")
}

/// The conjunct added by a selection predicate: the WHERE clause is
/// `AND(objectclass, selection)`.
fn selection_part(select: &Select) -> &Expression {
    match &select.where_.0 {
        Expression::And { right, .. } => right,
        other => other,
    }
}

#[test]
fn it_builds_a_plain_feature_query() {
    let select = build(&building_query());
    let sql = select_to_sql(&select);
    assert_eq!(
        sql.sql,
        "SELECT \"b0\".\"id\" AS \"id\" FROM \"building\" AS \"b0\" \
         WHERE (\"b0\".\"objectclass_id\" = 26)"
    );
}

#[test]
fn schema_paths_resolve_to_the_declaring_table() {
    let schema = common::test_schema();
    let adapter = common::postgis();
    let env = Env::new(&schema, &adapter);
    let mut state = State::new(common::registry());

    let path = SchemaPath::new("bldg:Building").child("bldg:measuredHeight");
    let ctx = schema_path::build(env, &mut state, &path, &BTreeSet::new(), true, true).unwrap();

    match ctx.target.as_ref().unwrap() {
        ResolvedTarget::Column { table, column, .. } => {
            assert_eq!(column, "measured_height");
            // declared on the building table, no join needed
            assert_eq!(*table, ctx.root_table);
            assert!(ctx.select.joins.is_empty());
        }
        other => panic!("expected a column target, got {other:?}"),
    }
}

#[test]
fn inherited_properties_join_the_base_table() {
    let schema = common::test_schema();
    let adapter = common::postgis();
    let env = Env::new(&schema, &adapter);
    let mut state = State::new(common::registry());

    let path = SchemaPath::new("bldg:Building").child("creationDate");
    let ctx = schema_path::build(env, &mut state, &path, &BTreeSet::new(), true, true).unwrap();

    match ctx.target.as_ref().unwrap() {
        ResolvedTarget::Column { table, column, .. } => {
            assert_eq!(column, "creation_date");
            assert_ne!(*table, ctx.root_table);
        }
        other => panic!("expected a column target, got {other:?}"),
    }
    assert_eq!(ctx.select.joins.len(), 1);
    match &ctx.select.joins[0].from {
        From::Table {
            reference: TableReference::DBTable { table, .. },
            ..
        } => assert_eq!(table.0, "cityobject"),
        other => panic!("expected a table join, got {other:?}"),
    }
}

#[test]
fn node_conditions_discriminate_shared_tables() {
    let schema = common::test_schema();
    let adapter = common::postgis();
    let env = Env::new(&schema, &adapter);
    let mut state = State::new(common::registry());

    let path = SchemaPath::new("bldg:Building").child_with_condition(
        "bldg:boundedBySurface",
        PathCondition::Eq {
            property: "objectclass".to_string(),
            literal: Literal::Integer(33),
        },
    );
    let ctx = schema_path::build(env, &mut state, &path, &BTreeSet::new(), false, true).unwrap();

    assert_eq!(ctx.select.joins.len(), 1);
    match ctx.predicates.last().unwrap() {
        Expression::BinaryOperation {
            operator: BinaryOperator::Equals,
            right,
            ..
        } => {
            assert_eq!(**right, Expression::Value(Value::Integer(33)));
        }
        other => panic!("expected a discriminating equality, got {other:?}"),
    }
}

fn collect_in_chunks(expression: &Expression, chunks: &mut Vec<Vec<String>>) {
    match expression {
        Expression::Or { left, right } | Expression::And { left, right } => {
            collect_in_chunks(left, chunks);
            collect_in_chunks(right, chunks);
        }
        Expression::BinaryArrayOperation { right, .. } => {
            chunks.push(
                right
                    .iter()
                    .map(|value| match value {
                        Expression::Value(Value::String(s)) => s.clone(),
                        other => panic!("expected a string value, got {other:?}"),
                    })
                    .collect(),
            );
        }
        other => panic!("unexpected expression in id chunking: {other:?}"),
    }
}

#[test]
fn id_lists_chunk_at_the_parameter_ceiling() {
    let schema = common::test_schema();
    let adapter = common::oracle();
    let env = Env::new(&schema, &adapter);
    let mut state = State::new(common::registry());

    let path = SchemaPath::new("bldg:Building");
    let mut ctx = schema_path::build(env, &mut state, &path, &BTreeSet::new(), false, true).unwrap();

    let ids: BTreeSet<String> = (0..2500).map(|i| format!("ID_{i:04}")).collect();
    predicate::id::build(
        env,
        &mut ctx,
        &IdPredicate { ids: ids.clone() },
        false,
    )
    .unwrap();

    let mut chunks = vec![];
    collect_in_chunks(ctx.predicates.last().unwrap(), &mut chunks);

    let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![1000, 1000, 500]);

    // the chunks partition the original set: no duplicates, no omissions
    let mut union = BTreeSet::new();
    let mut total = 0;
    for chunk in &chunks {
        total += chunk.len();
        union.extend(chunk.iter().cloned());
    }
    assert_eq!(total, 2500);
    assert_eq!(union, ids);
}

#[test]
fn singleton_id_sets_use_equality() {
    let schema = common::test_schema();
    let adapter = common::oracle();
    let env = Env::new(&schema, &adapter);
    let mut state = State::new(common::registry());

    let path = SchemaPath::new("bldg:Building");
    let mut ctx = schema_path::build(env, &mut state, &path, &BTreeSet::new(), false, true).unwrap();

    predicate::id::build(
        env,
        &mut ctx,
        &IdPredicate {
            ids: BTreeSet::from(["ID_1".to_string()]),
        },
        false,
    )
    .unwrap();

    match ctx.predicates.last().unwrap() {
        Expression::BinaryOperation { operator, .. } => {
            assert_eq!(*operator, BinaryOperator::Equals);
        }
        other => panic!("expected an equality, got {other:?}"),
    }
}

#[test]
fn case_insensitive_comparisons_fold_both_sides() {
    let mut query = building_query();
    query.selection = Some(Predicate::Comparison(ComparisonPredicate::Binary {
        op: ComparisonOp::Equals,
        operand: reference("bldg:Building", &["name"]),
        literal: Literal::String("Foo".to_string()),
        match_case: false,
    }));
    let select = build(&query);

    match selection_part(&select) {
        Expression::BinaryOperation {
            left,
            operator: BinaryOperator::Equals,
            right,
        } => {
            assert!(matches!(
                **left,
                Expression::FunctionCall {
                    function: Function::Upper,
                    ..
                }
            ));
            match &**right {
                Expression::FunctionCall {
                    function: Function::Upper,
                    args,
                } => {
                    assert_eq!(
                        args[0],
                        Expression::Value(Value::String("FOO".to_string()))
                    );
                }
                other => panic!("expected upper(literal), got {other:?}"),
            }
        }
        other => panic!("expected a folded equality, got {other:?}"),
    }

    let sql = select_to_sql(&select);
    assert!(sql
        .params
        .contains(&citydb_sql::sql::string::Param::String("FOO".to_string())));
}

#[test]
fn lod_satisfiability_follows_the_filter_mode() {
    let schema = common::test_schema();
    let adapter = common::postgis();
    let env = Env::new(&schema, &adapter);
    let roof = schema.lookup_type("bldg:RoofSurface").unwrap();

    // available at LoD 2 only
    assert!(!lod::satisfies_lod_filter(
        env,
        roof,
        &LodFilter::new(LodFilterMode::And, &[1, 3])
    ));
    assert!(!lod::satisfies_lod_filter(
        env,
        roof,
        &LodFilter::new(LodFilterMode::Or, &[1, 3])
    ));
    assert!(lod::satisfies_lod_filter(
        env,
        roof,
        &LodFilter::new(LodFilterMode::Or, &[2, 3])
    ));
}

#[test]
fn lod_filters_nest_exists_subqueries_for_nested_features() {
    let mut query = building_query();
    query.lod_filter = Some(LodFilter::new(LodFilterMode::Or, &[2]));
    let select = build(&query);
    let sql = select_to_sql(&select);

    assert!(sql.sql.contains("EXISTS (SELECT 1 FROM \"building\""));
    assert!(sql.sql.contains("FROM \"thematic_surface\""));
    assert!(sql.sql.contains("\"lod2_solid_id\" IS NOT NULL"));
}

#[test]
fn unsatisfiable_lod_filters_yield_a_dummy_false_predicate() {
    let mut query = building_query();
    query.lod_filter = Some(LodFilter::new(LodFilterMode::And, &[3]));
    let select = build(&query);
    let sql = select_to_sql(&select);

    assert!(sql.sql.contains("\"b0\".\"id\" IS NULL"));
}

#[test]
fn null_tests_on_joined_properties_use_not_exists() {
    let mut query = building_query();
    query.selection = Some(Predicate::Comparison(ComparisonPredicate::Null {
        operand: reference("bldg:Building", &["bldg:address"]),
    }));
    let select = build(&query);

    match selection_part(&select) {
        Expression::Not(inner) => {
            assert!(matches!(**inner, Expression::Exists { .. }));
        }
        other => panic!("expected NOT EXISTS, got {other:?}"),
    }

    let sql = select_to_sql(&select);
    assert!(sql
        .sql
        .contains("NOT EXISTS (SELECT 1 FROM \"address_to_building\""));
    assert!(sql.sql.contains("INNER JOIN \"address\""));
}

#[test]
fn null_tests_on_inline_complex_types_recurse_over_their_properties() {
    let mut query = building_query();
    query.selection = Some(Predicate::Comparison(ComparisonPredicate::Null {
        operand: reference("bldg:Building", &["core:externalReference"]),
    }));
    let select = build(&query);

    // all inner properties individually null, AND-combined
    match selection_part(&select) {
        Expression::And { left, right } => {
            assert!(matches!(
                **left,
                Expression::UnaryOperation {
                    operator: UnaryOperator::IsNull,
                    ..
                }
            ));
            assert!(matches!(
                **right,
                Expression::UnaryOperation {
                    operator: UnaryOperator::IsNull,
                    ..
                }
            ));
        }
        other => panic!("expected AND of null checks, got {other:?}"),
    }
}

#[test]
fn double_negation_of_a_null_test_is_an_identity() {
    let schema = common::test_schema();
    let adapter = common::postgis();

    let null_predicate = Predicate::Comparison(ComparisonPredicate::Null {
        operand: reference("bldg:Building", &["bldg:address"]),
    });
    let doubled = Predicate::Logical(LogicalPredicate::Not(Box::new(Predicate::Logical(
        LogicalPredicate::Not(Box::new(null_predicate.clone())),
    ))));

    let build_predicates = |predicate: &Predicate| {
        let env = Env::new(&schema, &adapter);
        let mut state = State::new(common::registry());
        let path = SchemaPath::new("bldg:Building");
        let mut ctx =
            schema_path::build(env, &mut state, &path, &BTreeSet::new(), false, true).unwrap();
        predicate::build(env, &mut state, &mut ctx, predicate, false).unwrap();
        ctx.predicates
    };

    assert_eq!(build_predicates(&null_predicate), build_predicates(&doubled));
}

#[test]
fn counter_filters_use_native_fetch_when_available() {
    let mut query = building_query();
    query.counter = Some(CounterFilter {
        lower: 1,
        upper: 10,
    });
    let first = build(&query);
    assert_eq!(first.limit.offset, Some(0));
    assert_eq!(first.limit.limit, Some(10));

    query.counter = Some(CounterFilter {
        lower: 11,
        upper: 20,
    });
    let second = build(&query);
    assert_eq!(second.limit.offset, Some(10));
    assert_eq!(second.limit.limit, Some(10));

    // both windows share the same deterministic total order
    assert_eq!(first.order_by, second.order_by);
    assert_eq!(first.order_by.elements.len(), 1);
}

#[test]
fn counter_filters_emulate_windows_with_row_number_on_oracle() {
    let schema = common::test_schema();
    let adapter = common::oracle();
    let builder = QueryBuilder::new(&schema, &adapter, common::registry());

    let mut query = building_query();
    query.counter = Some(CounterFilter {
        lower: 11,
        upper: 20,
    });
    let select = builder
        .build_query(&query, &BuildProperties::new())
        .unwrap();

    assert!(matches!(select.from, Some(From::Select { .. })));
    let sql = select_to_sql(&select);
    assert!(sql.sql.contains("ROW_NUMBER() OVER (ORDER BY"));
    assert!(sql.sql.contains("BETWEEN 11 AND 20"));
}

#[test]
fn invalid_counter_windows_are_rejected() {
    let schema = common::test_schema();
    let adapter = common::postgis();
    let builder = QueryBuilder::new(&schema, &adapter, common::registry());

    let mut query = building_query();
    query.counter = Some(CounterFilter { lower: 0, upper: 5 });
    let result = builder.build_query(&query, &BuildProperties::new());
    assert!(matches!(result, Err(Error::InvalidCounterFilter { .. })));
}

#[test]
fn concurrent_builds_issue_distinct_aliases() {
    let schema = common::test_schema();
    let adapter = common::postgis();
    let registry = common::registry();

    std::thread::scope(|scope| {
        for _ in 0..50 {
            scope.spawn(|| {
                let env = Env::new(&schema, &adapter);
                let mut state = State::new(registry.clone());
                let path = SchemaPath::new("bldg:Building");
                schema_path::build(env, &mut state, &path, &BTreeSet::new(), false, true).unwrap();
            });
        }
    });

    assert_eq!(registry.issued_aliases().len(), 50);
}

#[test]
fn spatial_tests_on_reference_geometries_synthesize_child_surface_checks() {
    let mut query = building_query();
    query.selection = Some(Predicate::Spatial(SpatialPredicate::Binary {
        op: SpatialOp::Intersects,
        operand: Some(reference("bldg:Building", &["bldg:lod2Solid"])),
        geometry: GeometryObject::new(25833, "POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))"),
    }));
    let select = build(&query);

    // AND(bbox-prefilter-on-envelope, EXISTS(child surfaces)), never a
    // native spatial call on the reference column
    match selection_part(&select) {
        Expression::And { left, right } => {
            assert!(matches!(
                **left,
                Expression::BinaryOperation {
                    operator: BinaryOperator::BoundingBoxIntersects,
                    ..
                }
            ));
            assert!(matches!(**right, Expression::Exists { .. }));
        }
        other => panic!("expected AND(bbox, EXISTS), got {other:?}"),
    }

    let sql = select_to_sql(&select);
    assert!(sql.sql.contains("FROM \"surface_geometry\""));
    assert!(sql.sql.contains("ST_Intersects"));
}

#[test]
fn distance_values_convert_to_the_database_unit() {
    use citydb_filter::filter::{Distance, DistanceOp, LengthUnit};

    let mut query = building_query();
    query.selection = Some(Predicate::Spatial(SpatialPredicate::Distance {
        op: DistanceOp::DWithin,
        operand: Some(reference("bldg:Building", &["boundedBy"])),
        geometry: GeometryObject::new(25833, "POINT (5 5)"),
        distance: Distance::new(1.5, LengthUnit::Kilometre),
    }));
    let select = build(&query);

    match selection_part(&select) {
        Expression::FunctionCall { function, args } => {
            assert_eq!(*function, Function::Unknown("ST_DWithin".to_string()));
            assert_eq!(args[2], Expression::Value(Value::Double(1500.0)));
        }
        other => panic!("expected ST_DWithin, got {other:?}"),
    }
}

#[test]
fn injected_null_tests_promote_the_base_join_to_left() {
    let mut query = building_query();
    query.selection = Some(Predicate::Comparison(ComparisonPredicate::Null {
        operand: reference("bldg:Building", &["energy:heatedVolume"]),
    }));
    let select = build(&query);

    let energy_join = select
        .joins
        .iter()
        .find(|join| match &join.from {
            From::Table {
                reference: TableReference::DBTable { table, .. },
                ..
            } => table.0 == "energy_building",
            _ => false,
        })
        .expect("the ADE base join is emitted");
    assert_eq!(energy_join.kind, JoinKind::LeftOuter);
}

#[test]
fn or_predicates_force_left_joins() {
    let mut query = building_query();
    query.selection = Some(Predicate::Logical(LogicalPredicate::Or(vec![
        Predicate::Comparison(ComparisonPredicate::Binary {
            op: ComparisonOp::Equals,
            operand: reference("bldg:Building", &["name"]),
            literal: Literal::String("Foo".to_string()),
            match_case: true,
        }),
        Predicate::Comparison(ComparisonPredicate::Binary {
            op: ComparisonOp::GreaterThan,
            operand: reference("bldg:Building", &["bldg:measuredHeight"]),
            literal: Literal::Double(10.0),
            match_case: true,
        }),
    ])));
    let select = build(&query);

    assert!(select
        .joins
        .iter()
        .any(|join| join.kind == JoinKind::LeftOuter));
    // the two branches combine with OR
    assert!(matches!(selection_part(&select), Expression::Or { .. }));
}

#[test]
fn type_mismatches_are_reported() {
    let mut query = building_query();
    query.selection = Some(Predicate::Comparison(ComparisonPredicate::Binary {
        op: ComparisonOp::Equals,
        operand: reference("bldg:Building", &["name"]),
        literal: Literal::Integer(5),
        match_case: true,
    }));

    let schema = common::test_schema();
    let adapter = common::postgis();
    let builder = QueryBuilder::new(&schema, &adapter, common::registry());
    let result = builder.build_query(&query, &BuildProperties::new());
    assert!(matches!(result, Err(Error::TypeMismatch { .. })));
}

#[test]
fn negated_between_renders_not_between() {
    let mut query = building_query();
    query.selection = Some(Predicate::Logical(LogicalPredicate::Not(Box::new(
        Predicate::Comparison(ComparisonPredicate::Between {
            operand: reference("bldg:Building", &["bldg:measuredHeight"]),
            lower: Literal::Double(5.0),
            upper: Literal::Double(10.0),
        }),
    ))));
    let select = build(&query);

    match selection_part(&select) {
        Expression::Between { negated, .. } => assert!(*negated),
        other => panic!("expected BETWEEN, got {other:?}"),
    }
}

#[test]
fn materialized_queries_join_by_id() {
    let mut query = building_query();
    query.materialized_queries = vec![MaterializedQuery {
        table: "export_list".to_string(),
        schema: Some("citydb_tmp".to_string()),
    }];
    let select = build(&query);

    assert_eq!(select.joins.len(), 1);
    assert_eq!(select.joins[0].kind, JoinKind::Inner);
    let sql = select_to_sql(&select);
    assert!(sql
        .sql
        .contains("INNER JOIN \"citydb_tmp\".\"export_list\""));
}

#[test]
fn sorting_projects_the_sort_key_and_orders_by_it() {
    let mut query = building_query();
    query.sorting = Some(Sorting {
        properties: vec![SortProperty {
            path: reference("bldg:Building", &["name"]),
            order: SortOrder::Desc,
        }],
    });
    let select = build(&query);

    assert_eq!(select.order_by.elements.len(), 1);
    let sql = select_to_sql(&select);
    assert!(sql.sql.contains("ORDER BY"));
    assert!(sql.sql.contains(" DESC"));
    assert!(sql.sql.contains("AS \"order_0\""));
}

#[test]
fn distinct_and_hints_apply_to_the_statement() {
    let schema = common::test_schema();
    let adapter = common::oracle().with_hint("index(co cityobject_objectclass_fkx)");
    let builder = QueryBuilder::new(&schema, &adapter, common::registry());

    let query = building_query();
    let select = builder
        .build_query(&query, &BuildProperties::new().distinct().use_hints())
        .unwrap();

    assert!(select.distinct);
    let sql = select_to_sql(&select);
    assert!(sql
        .sql
        .starts_with("SELECT /*+ index(co cityobject_objectclass_fkx) */ DISTINCT"));
}

#[test]
fn bbox_without_an_operand_defaults_to_the_envelope() {
    let mut query = building_query();
    query.selection = Some(Predicate::Spatial(SpatialPredicate::Binary {
        op: SpatialOp::BBox,
        operand: None,
        geometry: GeometryObject::new(25833, "POLYGON ((0 0, 10 0, 10 10, 0 10, 0 0))"),
    }));
    let select = build(&query);

    match selection_part(&select) {
        Expression::BinaryOperation {
            operator: BinaryOperator::BoundingBoxIntersects,
            left,
            ..
        } => match &**left {
            Expression::ColumnReference(column) => {
                let rendered = {
                    let mut sql = citydb_sql::sql::string::SQL::new();
                    column.to_sql(&mut sql);
                    sql.sql
                };
                assert!(rendered.contains("\"envelope\""));
            }
            other => panic!("expected a column, got {other:?}"),
        },
        other => panic!("expected a bbox test, got {other:?}"),
    }
}
