//! Helpers for building sql::ast types in certain shapes and patterns.

use super::ast::*;

// Empty clauses //

/// An empty `WHERE` clause.
pub fn empty_where() -> Expression {
    Expression::Value(Value::Boolean(true))
}

/// An empty `ORDER BY` clause.
pub fn empty_order_by() -> OrderBy {
    OrderBy { elements: vec![] }
}

/// Empty `OFFSET` and `FETCH` clauses.
pub fn empty_limit() -> Limit {
    Limit {
        limit: None,
        offset: None,
    }
}

/// A `true` expression.
pub fn true_expr() -> Expression {
    Expression::Value(Value::Boolean(true))
}

/// A `false` expression.
pub fn false_expr() -> Expression {
    Expression::Value(Value::Boolean(false))
}

// Aliasing //

/// Create table aliases using this function so we build everything in one
/// place.
pub fn make_table_alias(unique_index: u64, name: impl Into<String>) -> TableAlias {
    TableAlias {
        unique_index,
        name: name.into(),
    }
}

/// Create column aliases using this function so we build everything in one
/// place.
pub fn make_column_alias(name: impl Into<String>) -> ColumnAlias {
    ColumnAlias { name: name.into() }
}

/// Generate a column expression refering to a specific table.
pub fn make_column(
    table: TableReference,
    name: ColumnName,
    alias: ColumnAlias,
) -> (ColumnAlias, Expression) {
    (
        alias,
        Expression::ColumnReference(ColumnReference::TableColumn { table, name }),
    )
}

/// A column of an aliased table.
pub fn table_column(alias: &TableAlias, column: impl Into<String>) -> Expression {
    Expression::ColumnReference(ColumnReference::TableColumn {
        table: TableReference::AliasedTable(alias.clone()),
        name: ColumnName(column.into()),
    })
}

// Expressions //

/// AND-combine expressions. An empty input is the neutral `true`.
pub fn and_all(expressions: Vec<Expression>) -> Expression {
    expressions
        .into_iter()
        .reduce(|left, right| Expression::And {
            left: Box::new(left),
            right: Box::new(right),
        })
        .unwrap_or_else(true_expr)
}

/// OR-combine expressions. An empty input is the neutral `false`.
pub fn or_all(expressions: Vec<Expression>) -> Expression {
    expressions
        .into_iter()
        .reduce(|left, right| Expression::Or {
            left: Box::new(left),
            right: Box::new(right),
        })
        .unwrap_or_else(false_expr)
}

/// An equality between two expressions.
pub fn equals(left: Expression, right: Expression) -> Expression {
    Expression::BinaryOperation {
        left: Box::new(left),
        operator: BinaryOperator::Equals,
        right: Box::new(right),
    }
}

/// An `IS NULL` / `IS NOT NULL` test.
pub fn is_null(expression: Expression, negated: bool) -> Expression {
    Expression::UnaryOperation {
        expression: Box::new(expression),
        operator: if negated {
            UnaryOperator::IsNotNull
        } else {
            UnaryOperator::IsNull
        },
    }
}

// SELECTs //

/// Build a simple select with a select list and the rest are empty.
pub fn simple_select(select_list: Vec<(ColumnAlias, Expression)>) -> Select {
    Select {
        hint: None,
        distinct: false,
        select_list: SelectList::SelectList(select_list),
        from: None,
        joins: vec![],
        where_: Where(empty_where()),
        order_by: empty_order_by(),
        limit: empty_limit(),
    }
}

/// Build a `SELECT 1` over a FROM clause, as used inside EXISTS.
pub fn select_one(from: From, where_: Expression) -> Select {
    Select {
        hint: None,
        distinct: false,
        select_list: SelectList::Select1,
        from: Some(from),
        joins: vec![],
        where_: Where(where_),
        order_by: empty_order_by(),
        limit: empty_limit(),
    }
}

/// Build a simple select *
pub fn star_select(from: From) -> Select {
    Select {
        hint: None,
        distinct: false,
        select_list: SelectList::SelectStar,
        from: Some(from),
        joins: vec![],
        where_: Where(empty_where()),
        order_by: empty_order_by(),
        limit: empty_limit(),
    }
}

/// An EXISTS test over a select.
pub fn exists(select: Select, negated: bool) -> Expression {
    let exists = Expression::Exists {
        select: Box::new(select),
    };
    if negated {
        Expression::Not(Box::new(exists))
    } else {
        exists
    }
}
