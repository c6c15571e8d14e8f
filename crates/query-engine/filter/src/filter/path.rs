//! Schema paths: XPath-like navigation from a root feature type to a target
//! property or type. Paths are name-based; resolution against the schema
//! mapping happens at build time.

use serde::{Deserialize, Serialize};

use super::predicate::Literal;

/// A reference to a property value, addressed by a schema path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueReference(pub SchemaPath);

impl ValueReference {
    pub fn path(&self) -> &SchemaPath {
        &self.0
    }
}

/// An ordered sequence of schema nodes starting at a root feature or object
/// type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaPath {
    /// Qualified name of the root type.
    pub root: String,
    pub steps: Vec<PathStep>,
}

impl SchemaPath {
    pub fn new(root: impl Into<String>) -> Self {
        SchemaPath {
            root: root.into(),
            steps: vec![],
        }
    }

    /// Append a step addressing a property or type by name.
    pub fn child(mut self, name: impl Into<String>) -> Self {
        self.steps.push(PathStep {
            name: name.into(),
            condition: None,
        });
        self
    }

    /// Append a step with a node-level condition.
    pub fn child_with_condition(
        mut self,
        name: impl Into<String>,
        condition: PathCondition,
    ) -> Self {
        self.steps.push(PathStep {
            name: name.into(),
            condition: Some(condition),
        });
        self
    }

    /// The path without its last step. Used when a predicate needs the
    /// parent context of its target property.
    pub fn parent(&self) -> Option<SchemaPath> {
        if self.steps.is_empty() {
            return None;
        }
        let mut parent = self.clone();
        parent.steps.pop();
        Some(parent)
    }

    pub fn last_step(&self) -> Option<&PathStep> {
        self.steps.last()
    }
}

/// One node of a schema path: a property or type name, optionally
/// discriminated by a node-level condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    pub name: String,
    pub condition: Option<PathCondition>,
}

/// An equality condition on a path node, used to discriminate rows sharing
/// a table. Composable with AND/OR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PathCondition {
    Eq { property: String, literal: Literal },
    And(Vec<PathCondition>),
    Or(Vec<PathCondition>),
}
