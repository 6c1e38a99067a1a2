//! Per-build registry tables

use ahash::AHashMap;

use super::key_path::KeyPath;
use crate::shared::models::VertexId;

/// Open key handles: (owning process, handle) -> (KeyHandle vertex, key path)
#[derive(Debug, Default)]
pub struct KeyHandles {
    table: AHashMap<(VertexId, u64), (VertexId, KeyPath)>,
}

impl KeyHandles {
    pub fn insert(&mut self, owner: VertexId, handle: u64, vertex: VertexId, path: KeyPath) {
        self.table.insert((owner, handle), (vertex, path));
    }

    pub fn resolve(&self, owner: VertexId, handle: u64) -> Option<&(VertexId, KeyPath)> {
        self.table.get(&(owner, handle))
    }

    pub fn close(&mut self, owner: VertexId, handle: u64) -> Option<(VertexId, KeyPath)> {
        self.table.remove(&(owner, handle))
    }
}

/// Latest KeyEntry version per (folded key path, lower-cased value name)
#[derive(Debug, Default)]
pub struct EntryVersions {
    latest: AHashMap<(String, String), VertexId>,
}

impl EntryVersions {
    pub fn latest(&self, key: &str, name: &str) -> Option<VertexId> {
        self.latest
            .get(&(key.to_string(), name.to_lowercase()))
            .copied()
    }

    pub fn advance(&mut self, key: &str, name: &str, entry: VertexId) {
        self.latest
            .insert((key.to_string(), name.to_lowercase()), entry);
    }
}
