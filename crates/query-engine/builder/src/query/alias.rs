//! Table alias management. Aliases must be unique across concurrently
//! built statements, since materialized queries may combine independently
//! built selects into one outer statement.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use citydb_sql::sql::ast::TableAlias;

/// The process-wide alias uniqueness service. Explicit and injectable so
/// tests can substitute an isolated instance.
#[derive(Debug, Default)]
pub struct AliasRegistry {
    counters: Mutex<HashMap<String, u64>>,
    issued: Mutex<BTreeSet<String>>,
}

impl AliasRegistry {
    pub fn new() -> Arc<AliasRegistry> {
        Arc::new(AliasRegistry::default())
    }

    /// Claim the next free index for a prefix.
    fn claim(&self, prefix: &str) -> u64 {
        let mut counters = self.counters.lock().expect("alias registry poisoned");
        let counter = counters.entry(prefix.to_string()).or_insert(0);
        let index = *counter;
        *counter += 1;
        index
    }

    fn record(&self, aliases: impl IntoIterator<Item = String>) {
        let mut issued = self.issued.lock().expect("alias registry poisoned");
        issued.extend(aliases);
    }

    /// All alias names recorded by finished builds.
    pub fn issued_aliases(&self) -> BTreeSet<String> {
        self.issued.lock().expect("alias registry poisoned").clone()
    }
}

/// Issues aliases for one build. Fresh indices are claimed from the shared
/// registry; issued names are merged back when the build finishes.
#[derive(Debug)]
pub struct AliasGenerator {
    registry: Arc<AliasRegistry>,
    issued: Vec<String>,
}

impl AliasGenerator {
    pub fn new(registry: Arc<AliasRegistry>) -> Self {
        AliasGenerator {
            registry,
            issued: vec![],
        }
    }

    /// A fresh alias for a table. The prefix is the table name's first
    /// character; the index makes it unique.
    pub fn next(&mut self, table_name: &str) -> TableAlias {
        let prefix: String = table_name.chars().take(1).collect();
        let index = self.registry.claim(&prefix);
        let name = format!("{prefix}{index}");
        self.issued.push(name.clone());
        TableAlias {
            unique_index: index,
            name,
        }
    }

    /// Merge the aliases issued so far into the shared registry.
    pub fn merge(&mut self) {
        self.registry.record(self.issued.drain(..));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_are_unique_within_a_build() {
        let registry = AliasRegistry::new();
        let mut generator = AliasGenerator::new(registry);
        let a = generator.next("building");
        let b = generator.next("building");
        assert_ne!(a.name, b.name);
    }

    #[test]
    fn merged_aliases_are_recorded() {
        let registry = AliasRegistry::new();
        let mut generator = AliasGenerator::new(registry.clone());
        generator.next("building");
        generator.next("cityobject");
        generator.merge();
        assert_eq!(registry.issued_aliases().len(), 2);
    }
}
