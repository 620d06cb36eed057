//! Snapshot catalog for one location
//!
//! Endpoints of the same logical cluster may each return a partial or
//! overlapping listing. The catalog unions them keyed by snapshot id; the
//! first endpoint a snapshot was seen on is the one it is restored through.

use std::collections::BTreeMap;

use crate::gateway::{Endpoint, SnapshotListing};

/// A snapshot and the endpoint it was found on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub listing: SnapshotListing,
    pub endpoint: Endpoint,
}

/// Merged snapshot namespace of one location
#[derive(Debug, Clone, Default)]
pub struct SnapshotCatalog {
    location: String,
    entries: BTreeMap<String, CatalogEntry>,
}

impl SnapshotCatalog {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Union a listing into the catalog. Returns how many ids were new.
    pub fn merge(&mut self, endpoint: &Endpoint, listings: Vec<SnapshotListing>) -> usize {
        let mut added = 0;
        for listing in listings {
            if self.entries.contains_key(&listing.id) {
                continue;
            }
            self.entries.insert(
                listing.id.clone(),
                CatalogEntry {
                    listing,
                    endpoint: endpoint.clone(),
                },
            );
            added += 1;
        }
        added
    }

    pub fn get(&self, snapshot_id: &str) -> Option<&CatalogEntry> {
        self.entries.get(snapshot_id)
    }

    /// Entries in snapshot-id order
    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(id: &str) -> SnapshotListing {
        SnapshotListing {
            id: id.to_string(),
            status: "SUCCESS".to_string(),
            total_shards: 1,
        }
    }

    #[test]
    fn test_merge_dedupes_across_endpoints() {
        let a = Endpoint::new("es01", 9200);
        let b = Endpoint::new("es01", 9201);
        let mut catalog = SnapshotCatalog::new("dc1");

        assert_eq!(catalog.merge(&a, vec![listing("s1"), listing("s2")]), 2);
        assert_eq!(catalog.merge(&b, vec![listing("s2"), listing("s3")]), 1);

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get("s2").unwrap().endpoint, a);
        assert_eq!(catalog.get("s3").unwrap().endpoint, b);
        assert_eq!(catalog.location(), "dc1");
    }

    #[test]
    fn test_iteration_is_ordered() {
        let ep = Endpoint::new("es01", 9200);
        let mut catalog = SnapshotCatalog::new("dc1");
        catalog.merge(&ep, vec![listing("b"), listing("a"), listing("c")]);

        let ids: Vec<_> = catalog.iter().map(|e| e.listing.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
