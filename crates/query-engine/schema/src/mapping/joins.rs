//! Join descriptors connecting the tables of the schema mapping.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::ScalarType;

/// How a property or extension reaches its target table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum JoinDef {
    /// A simple foreign-key join.
    Join(Join),
    /// A many-to-many join via a junction table.
    JoinTable(JoinTable),
    /// Walk backward along the join emitted for the previous path node.
    Reverse,
}

/// A simple foreign-key join. `from_column` lives on the current table,
/// `to_column` on the target table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Join {
    pub table: JoinTarget,
    pub from_column: String,
    pub to_column: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// The target table of a join: a concrete table name, or the symbolic
/// target token resolved against the next path node's table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum JoinTarget {
    Table(String),
    Target,
}

impl JoinTarget {
    pub fn table_name(&self) -> Option<&str> {
        match self {
            JoinTarget::Table(name) => Some(name),
            JoinTarget::Target => None,
        }
    }
}

/// A many-to-many join. `source_join` connects the current table to the
/// junction table, `target_join` connects the junction table to the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JoinTable {
    pub table: String,
    pub source_join: Join,
    pub target_join: Join,
}

/// An extra equality condition on a join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Condition {
    pub column: String,
    pub r#type: ScalarType,
    pub value: ConditionValue,
}

/// The value side of a join condition. Tokens are substituted while the
/// join is emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ConditionValue {
    /// A literal, interpreted according to the condition's type.
    Literal(String),
    /// The object class id of the join's target type. Expands to an IN list
    /// over all concrete subtypes when the target is abstract.
    TargetObjectClassId,
    /// The id of the target row: `column = target.id`.
    TargetId,
}
