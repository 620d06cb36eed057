//! Snapshot catalog and candidate selection
//!
//! Discovery merges the listings of every endpoint of a location into a
//! [`SnapshotCatalog`], then [`CandidateSelector`] picks one dated snapshot
//! per series. The result is turned into [`RestorableUnit`]s once sizes and
//! live-unit membership are known.

mod errors;
mod merge;
mod selector;

pub use errors::{CatalogError, CatalogResult};
pub use merge::{CatalogEntry, SnapshotCatalog};
pub use selector::{parse_target_date, source_unit_name, CandidateSelector, DATE_FORMAT};

use serde::Serialize;

use crate::gateway::Endpoint;

/// A snapshot chosen for restore, as seen in one discovery pass.
///
/// Built fresh on every pass and never persisted; restore progress lives in
/// the state store under `source_unit_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestorableUnit {
    pub snapshot_id: String,
    pub source_unit_name: String,
    pub location: String,
    pub endpoint: Endpoint,
    pub size_bytes: u64,
    pub total_shards: u32,
    /// A live unit with this name already exists in the cluster
    pub already_active: bool,
}

impl RestorableUnit {
    pub fn from_entry(
        entry: &CatalogEntry,
        location: &str,
        prefix: &str,
        size_bytes: u64,
        already_active: bool,
    ) -> Self {
        Self {
            snapshot_id: entry.listing.id.clone(),
            source_unit_name: source_unit_name(&entry.listing.id, prefix),
            location: location.to_string(),
            endpoint: entry.endpoint.clone(),
            size_bytes,
            total_shards: entry.listing.total_shards,
            already_active,
        }
    }
}
