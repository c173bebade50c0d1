//! Selector to model-file lookup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One or two source files to run through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ModelRequest {
    Single { source: String },
    Union { first: String, second: String },
}

/// Explicit table from selector value to request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCatalog {
    entries: BTreeMap<u32, ModelRequest>,
}

impl ModelCatalog {
    pub fn new(entries: impl IntoIterator<Item = (u32, ModelRequest)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn lookup(&self, selector: u32) -> Option<&ModelRequest> {
        self.entries.get(&selector)
    }

    pub fn selectors(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }
}

/// Path of the n-th bundled model.
pub fn model_path(n: u32) -> String {
    format!("models/model{}.STEP", n)
}

impl Default for ModelCatalog {
    /// Models 1 to 4 on their own, and 12 as the union of models 1 and 2.
    fn default() -> Self {
        let singles = (1..=4).map(|n| (n, ModelRequest::Single { source: model_path(n) }));
        let union = (
            12,
            ModelRequest::Union {
                first: model_path(1),
                second: model_path(2),
            },
        );
        Self::new(singles.chain(std::iter::once(union)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table() {
        let catalog = ModelCatalog::default();
        assert_eq!(catalog.selectors().collect::<Vec<_>>(), vec![1, 2, 3, 4, 12]);
        assert_eq!(
            catalog.lookup(3),
            Some(&ModelRequest::Single {
                source: "models/model3.STEP".to_string()
            })
        );
        assert_eq!(
            catalog.lookup(12),
            Some(&ModelRequest::Union {
                first: "models/model1.STEP".to_string(),
                second: "models/model2.STEP".to_string(),
            })
        );
    }

    #[test]
    fn unknown_selectors_are_absent() {
        let catalog = ModelCatalog::default();
        assert!(catalog.lookup(0).is_none());
        assert!(catalog.lookup(5).is_none());
        assert!(catalog.lookup(9).is_none());
    }
}
