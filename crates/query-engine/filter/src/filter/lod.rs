//! The LoD (level of detail) filter.

use serde::{Deserialize, Serialize};

/// How the requested LoDs combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LodFilterMode {
    /// A feature must be available at every requested LoD.
    And,
    /// A feature must be available at any requested LoD.
    Or,
}

/// Restricts a query to features available at the requested LoDs 0-4.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LodFilter {
    pub mode: LodFilterMode,
    pub lods: [bool; 5],
    /// Bound on the nested-feature recursion depth. `None` means unbounded.
    pub search_depth: Option<u8>,
}

impl LodFilter {
    pub fn new(mode: LodFilterMode, lods: &[u8]) -> Self {
        let mut flags = [false; 5];
        for &lod in lods {
            if let Some(flag) = flags.get_mut(usize::from(lod)) {
                *flag = true;
            }
        }
        LodFilter {
            mode,
            lods: flags,
            search_depth: None,
        }
    }

    pub fn with_search_depth(mut self, depth: u8) -> Self {
        self.search_depth = Some(depth);
        self
    }

    pub fn is_enabled(&self, lod: u8) -> bool {
        self.lods.get(usize::from(lod)).copied().unwrap_or(false)
    }

    /// The requested LoDs in ascending order.
    pub fn requested_lods(&self) -> Vec<u8> {
        (0..5).filter(|&lod| self.is_enabled(lod)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.lods.iter().all(|enabled| !enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requested_lods_are_ordered() {
        let filter = LodFilter::new(LodFilterMode::Or, &[3, 1]);
        assert_eq!(filter.requested_lods(), vec![1, 3]);
        assert!(!filter.is_enabled(0));
        assert!(filter.is_enabled(3));
    }

    #[test]
    fn out_of_range_lods_are_ignored() {
        let filter = LodFilter::new(LodFilterMode::And, &[7]);
        assert!(filter.is_empty());
    }
}
