//! Tests rendering a SQL AST to a parameterized string.

use similar_asserts::assert_eq;

use citydb_sql::sql::ast::*;
use citydb_sql::sql::convert::select_to_sql;
use citydb_sql::sql::helpers;
use citydb_sql::sql::string::Param;

fn building_table() -> TableReference {
    TableReference::DBTable {
        schema: Some(SchemaName("citydb".to_string())),
        table: TableName("building".to_string()),
    }
}

fn building_alias() -> TableAlias {
    helpers::make_table_alias(0, "b")
}

#[test]
fn it_converts_simple_select() {
    let alias = building_alias();
    let mut select = helpers::simple_select(vec![helpers::make_column(
        TableReference::AliasedTable(alias.clone()),
        ColumnName("id".to_string()),
        helpers::make_column_alias("id"),
    )]);
    select.from = Some(From::Table {
        reference: building_table(),
        alias,
    });

    let sql = select_to_sql(&select);
    assert_eq!(
        sql.sql,
        "SELECT \"b\".\"id\" AS \"id\" FROM \"citydb\".\"building\" AS \"b\""
    );
    assert_eq!(sql.params, vec![]);
}

#[test]
fn it_converts_a_where_clause_with_parameters() {
    let alias = building_alias();
    let mut select = helpers::simple_select(vec![helpers::make_column(
        TableReference::AliasedTable(alias.clone()),
        ColumnName("id".to_string()),
        helpers::make_column_alias("id"),
    )]);
    select.from = Some(From::Table {
        reference: building_table(),
        alias: alias.clone(),
    });
    select.where_ = Where(helpers::equals(
        helpers::table_column(&alias, "gmlid"),
        Expression::Value(Value::String("ID_5".to_string())),
    ));

    let sql = select_to_sql(&select);
    assert_eq!(
        sql.sql,
        "SELECT \"b\".\"id\" AS \"id\" FROM \"citydb\".\"building\" AS \"b\" \
         WHERE (\"b\".\"gmlid\" = ?)"
    );
    assert_eq!(sql.params, vec![Param::String("ID_5".to_string())]);
}

#[test]
fn it_converts_an_exists_subquery() {
    let alias = building_alias();
    let surface_alias = helpers::make_table_alias(1, "ts");
    let subquery = helpers::select_one(
        From::Table {
            reference: TableReference::DBTable {
                schema: None,
                table: TableName("thematic_surface".to_string()),
            },
            alias: surface_alias.clone(),
        },
        helpers::equals(
            helpers::table_column(&surface_alias, "building_id"),
            helpers::table_column(&alias, "id"),
        ),
    );

    let mut sql = citydb_sql::sql::string::SQL::new();
    helpers::exists(subquery, false).to_sql(&mut sql);
    assert_eq!(
        sql.sql,
        "EXISTS (SELECT 1 FROM \"thematic_surface\" AS \"ts\" \
         WHERE (\"ts\".\"building_id\" = \"b\".\"id\"))"
    );
}

#[test]
fn it_converts_order_by_and_result_window() {
    let alias = building_alias();
    let mut select = helpers::simple_select(vec![helpers::make_column(
        TableReference::AliasedTable(alias.clone()),
        ColumnName("id".to_string()),
        helpers::make_column_alias("id"),
    )]);
    select.from = Some(From::Table {
        reference: building_table(),
        alias: alias.clone(),
    });
    select.order_by = OrderBy {
        elements: vec![OrderByElement {
            target: helpers::table_column(&alias, "id"),
            direction: OrderByDirection::Asc,
        }],
    };
    select.limit = Limit {
        limit: Some(10),
        offset: Some(10),
    };

    let sql = select_to_sql(&select);
    assert_eq!(
        sql.sql,
        "SELECT \"b\".\"id\" AS \"id\" FROM \"citydb\".\"building\" AS \"b\" \
         ORDER BY \"b\".\"id\" ASC OFFSET 10 ROWS FETCH NEXT 10 ROWS ONLY"
    );
}

#[test]
fn it_converts_a_row_number_window_function() {
    let alias = building_alias();
    let row_number = Expression::WindowFunction {
        function: WindowFunction::RowNumber,
        order_by: OrderBy {
            elements: vec![OrderByElement {
                target: helpers::table_column(&alias, "id"),
                direction: OrderByDirection::Asc,
            }],
        },
    };

    let mut sql = citydb_sql::sql::string::SQL::new();
    row_number.to_sql(&mut sql);
    assert_eq!(sql.sql, "ROW_NUMBER() OVER (ORDER BY \"b\".\"id\" ASC)");
}

#[test]
fn it_converts_a_like_with_escape() {
    let alias = building_alias();
    let like = Expression::Like {
        expression: Box::new(helpers::table_column(&alias, "name")),
        negated: false,
        pattern: Box::new(Expression::Value(Value::String("main%".to_string()))),
        escape: Some('\\'),
    };

    let mut sql = citydb_sql::sql::string::SQL::new();
    like.to_sql(&mut sql);
    assert_eq!(sql.sql, "(\"b\".\"name\" LIKE ? ESCAPE '\\')");
    assert_eq!(sql.params, vec![Param::String("main%".to_string())]);
}

#[test]
fn it_skips_an_empty_where_clause() {
    let select = helpers::star_select(From::Table {
        reference: building_table(),
        alias: building_alias(),
    });

    let sql = select_to_sql(&select);
    assert_eq!(sql.sql, "SELECT * FROM \"citydb\".\"building\" AS \"b\"");
}
