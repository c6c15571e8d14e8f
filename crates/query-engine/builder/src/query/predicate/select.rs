//! Raw SELECT predicates: a caller-supplied SQL fragment selecting
//! candidate ids, joined against the root table.
//!
//! The fragment must project the candidate ids under the column name `id`.
//! Negation anti-joins the fragment instead of inverting its text.

use citydb_filter::filter::SelectPredicate;
use citydb_sql::sql::ast::{self, From, JoinKind};
use citydb_sql::sql::helpers as sql;

use crate::query::context::QueryContext;
use crate::query::error::Error;
use crate::query::helpers::{column_expr, Env, State};

const DERIVED_ID_COLUMN: &str = "id";

pub fn build(
    env: Env<'_>,
    state: &mut State,
    ctx: &mut QueryContext,
    predicate: &SelectPredicate,
    negate: bool,
) -> Result<(), Error> {
    let root = env.lookup_type(&ctx.root_type)?;
    let id_column = env.id_column(root)?;

    let alias = state.aliases.next("select");
    let on = sql::equals(
        column_expr(&alias, DERIVED_ID_COLUMN),
        column_expr(&ctx.root_table, id_column),
    );

    let kind = if negate {
        JoinKind::FullOuter
    } else {
        JoinKind::Inner
    };
    ctx.select.joins.push(ast::Join {
        kind,
        from: From::RawSql {
            sql: predicate.sql.clone(),
            alias: alias.clone(),
        },
        on,
    });

    if negate {
        // unmatched root rows carry a null derived id
        ctx.predicates.push(sql::is_null(
            column_expr(&alias, DERIVED_ID_COLUMN),
            false,
        ));
    }
    Ok(())
}
