//! Resource-id (gml:id) set membership tests, chunked to the dialect's
//! IN-list ceiling.

use citydb_schema::mapping::Property;
use citydb_sql::sql::ast::{BinaryArrayOperator, BinaryOperator, Expression, Value};
use citydb_sql::sql::helpers as sql;

use citydb_filter::filter::IdPredicate;

use crate::query::context::QueryContext;
use crate::query::error::Error;
use crate::query::helpers::{column_expr, Env, GMLID_PROPERTY};

pub fn build(
    env: Env<'_>,
    ctx: &mut QueryContext,
    predicate: &IdPredicate,
    negate: bool,
) -> Result<(), Error> {
    if predicate.ids.is_empty() {
        // an empty id set matches nothing; still a valid query
        ctx.predicates.push(if negate {
            sql::true_expr()
        } else {
            sql::false_expr()
        });
        return Ok(());
    }

    let root = env.lookup_type(&ctx.root_type)?;
    let resolution = env.resolve_property(root, GMLID_PROPERTY)?;
    let Property::SimpleAttribute(attribute) = resolution.property else {
        return Err(Error::Internal(
            "the resource id property is not a scalar attribute".to_string(),
        ));
    };
    let column = column_expr(&ctx.root_table, &attribute.column);

    let ids: Vec<&String> = predicate.ids.iter().collect();
    if ids.len() == 1 {
        ctx.predicates.push(Expression::BinaryOperation {
            left: Box::new(column),
            operator: if negate {
                BinaryOperator::NotEquals
            } else {
                BinaryOperator::Equals
            },
            right: Box::new(Expression::Value(Value::String(ids[0].clone()))),
        });
        return Ok(());
    }

    // chunk to the parameter ceiling; chunks combine with OR, or with AND
    // when negated, per De Morgan
    let chunks: Vec<Expression> = ids
        .chunks(env.adapter.max_in_items())
        .map(|chunk| Expression::BinaryArrayOperation {
            left: Box::new(column.clone()),
            operator: if negate {
                BinaryArrayOperator::NotIn
            } else {
                BinaryArrayOperator::In
            },
            right: chunk
                .iter()
                .map(|id| Expression::Value(Value::String((*id).clone())))
                .collect(),
        })
        .collect();

    ctx.predicates.push(if negate {
        sql::and_all(chunks)
    } else {
        sql::or_all(chunks)
    });
    Ok(())
}
