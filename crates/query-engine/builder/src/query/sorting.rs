//! ORDER BY translation.

use citydb_filter::filter::{SortOrder, Sorting};
use citydb_sql::sql::ast::{OrderByDirection, OrderByElement, SelectList};
use citydb_sql::sql::helpers as sql;

use super::context::{QueryContext, ResolvedTarget};
use super::error::Error;
use super::helpers::{column_expr, Env, State};
use super::schema_path;

pub fn build(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    sorting: &Sorting,
) -> Result<(), Error> {
    for (index, sort) in sorting.properties.iter().enumerate() {
        let target = schema_path::extend(env, state, ctx, sort.path.path(), true)?;
        let ResolvedTarget::Column { table, column, .. } = target else {
            return Err(Error::UnsupportedOperand(
                "sorting by a non-scalar property".to_string(),
            ));
        };
        let expression = column_expr(&table, &column);

        // project the sort key so DISTINCT and the window emulation can
        // refer to it
        if let SelectList::SelectList(list) = &mut ctx.select.select_list {
            if !list.iter().any(|(_, existing)| *existing == expression) {
                list.push((
                    sql::make_column_alias(format!("order_{index}")),
                    expression.clone(),
                ));
            }
        }

        ctx.select.order_by.elements.push(OrderByElement {
            target: expression,
            direction: match sort.order {
                SortOrder::Asc => OrderByDirection::Asc,
                SortOrder::Desc => OrderByDirection::Desc,
            },
        });
    }
    Ok(())
}
