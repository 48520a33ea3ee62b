//! Store configuration.

use serde::{Deserialize, Serialize};

use flatstore_core::Namespace;

/// Default number of entities fetched per query page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Settings shared by contexts and DAOs.
///
/// Serializable so applications can embed it in their own configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Namespace new keys are built in.
    pub namespace: Namespace,
    /// Entities requested per page by [`Dao::all`](crate::Dao::all).
    pub page_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: Namespace::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_namespace(mut self, namespace: impl Into<Namespace>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Page size for queries. Zero is treated as one.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}
