//! Result-window pagination. Dialects with native OFFSET/FETCH clauses
//! use them directly; the others get a ROW_NUMBER window emulation.

use citydb_filter::filter::CounterFilter;
use citydb_sql::sql::ast::{
    ColumnReference, Expression, From, Limit, OrderBy, OrderByDirection, OrderByElement,
    SelectList, TableReference, Value, Where, WindowFunction,
};
use citydb_sql::sql::helpers as sql;

use super::context::QueryContext;
use super::error::Error;
use super::helpers::{column_expr, Env, State};

const ROW_NUMBER_ALIAS: &str = "rn";

/// Apply a counter filter to the finished statement. Must run after the
/// WHERE clause and ORDER BY are in place, since the window emulation
/// rewrites the whole select.
pub fn apply(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    counter: &CounterFilter,
) -> Result<(), Error> {
    if counter.lower == 0 || counter.upper < counter.lower {
        return Err(Error::InvalidCounterFilter {
            lower: counter.lower,
            upper: counter.upper,
        });
    }

    // pagination windows are only deterministic over a total order; append
    // an id tie-breaker unless the ORDER BY already includes it
    let root = env.lookup_type(&ctx.root_type)?;
    let id_column = env.id_column(root)?;
    let id_expr = column_expr(&ctx.root_table, id_column);
    let has_id_order = ctx
        .select
        .order_by
        .elements
        .iter()
        .any(|element| element.target == id_expr);
    if !has_id_order {
        ctx.select.order_by.elements.push(OrderByElement {
            target: id_expr,
            direction: OrderByDirection::Asc,
        });
    }

    if env.adapter.supports_fetch_clause() {
        ctx.select.limit = Limit {
            offset: Some(counter.lower - 1),
            limit: Some(counter.upper - counter.lower + 1),
        };
        return Ok(());
    }

    emulate_with_row_number(state, ctx, counter)
}

/// Wrap the statement: the inner select projects a ROW_NUMBER over the
/// original ORDER BY, the outer select re-maps the original projection to
/// the derived table and windows on the row number.
fn emulate_with_row_number(
    state: &mut State,
    ctx: &mut QueryContext,
    counter: &CounterFilter,
) -> Result<(), Error> {
    let lower = to_window_bound(counter.lower, counter)?;
    let upper = to_window_bound(counter.upper, counter)?;

    let mut inner = std::mem::replace(&mut ctx.select, sql::simple_select(vec![]));
    let order_by = std::mem::replace(&mut inner.order_by, sql::empty_order_by());

    let projected: Vec<_> = match &inner.select_list {
        SelectList::SelectList(list) => list.clone(),
        _ => {
            return Err(Error::Internal(
                "window emulation needs an explicit projection".to_string(),
            ))
        }
    };

    if let SelectList::SelectList(list) = &mut inner.select_list {
        list.push((
            sql::make_column_alias(ROW_NUMBER_ALIAS),
            Expression::WindowFunction {
                function: WindowFunction::RowNumber,
                order_by: order_by.clone(),
            },
        ));
    }

    let derived = state.aliases.next("window");
    let derived_column = |alias: &citydb_sql::sql::ast::ColumnAlias| {
        Expression::ColumnReference(ColumnReference::AliasedColumn {
            table: TableReference::AliasedTable(derived.clone()),
            column: alias.clone(),
        })
    };

    let mut outer = sql::simple_select(
        projected
            .iter()
            .map(|(alias, _)| (alias.clone(), derived_column(alias)))
            .collect(),
    );
    outer.from = Some(From::Select {
        select: Box::new(inner),
        alias: derived.clone(),
    });
    outer.where_ = Where(Expression::Between {
        expression: Box::new(derived_column(&sql::make_column_alias(ROW_NUMBER_ALIAS))),
        negated: false,
        lower: Box::new(Expression::Value(Value::Integer(lower))),
        upper: Box::new(Expression::Value(Value::Integer(upper))),
    });

    // the original ORDER BY re-applies on the outer query; targets that
    // were projected map to their derived columns, anything else falls
    // back to the row number, which encodes the same order
    outer.order_by = OrderBy {
        elements: order_by
            .elements
            .into_iter()
            .map(|element| {
                let target = projected
                    .iter()
                    .find(|(_, expression)| *expression == element.target)
                    .map_or_else(
                        || derived_column(&sql::make_column_alias(ROW_NUMBER_ALIAS)),
                        |(alias, _)| derived_column(alias),
                    );
                OrderByElement {
                    target,
                    direction: element.direction,
                }
            })
            .collect(),
    };

    ctx.select = outer;
    Ok(())
}

fn to_window_bound(value: u64, counter: &CounterFilter) -> Result<i64, Error> {
    i64::try_from(value).map_err(|_| Error::InvalidCounterFilter {
        lower: counter.lower,
        upper: counter.upper,
    })
}
