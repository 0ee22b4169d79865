//! Seam to the external search index.
//!
//! The search index itself is out of scope (§1): it is treated as an opaque
//! sink that gets told which contracts changed during a flush so it can
//! decide for itself what to re-index.

use async_trait::async_trait;

/// A sink that reindexes a set of contracts after a flush.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Re-index the given contract addresses.
    async fn reindex(&self, contracts: &[String]) -> anyhow::Result<()>;
}

/// A [`SearchIndex`] that does nothing.
///
/// Lets the pipeline run end-to-end without a configured search backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSearchIndex;

#[async_trait]
impl SearchIndex for NullSearchIndex {
    async fn reindex(&self, _contracts: &[String]) -> anyhow::Result<()> {
        Ok(())
    }
}
