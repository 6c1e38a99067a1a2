// Edge Models
//
// Relations between vertices. An `Arrow` kind is directed, a plain `Edge`
// kind is traversed symmetrically. The allowed (source, destination) pairing
// of each kind is a documented contract; integration code is responsible for
// respecting it.

use ahash::AHashMap;
use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable vertex identifier (survives removals)
pub type VertexId = NodeIndex<u32>;

/// Stable edge identifier (survives removals)
pub type EdgeId = EdgeIndex<u32>;

/// Relation kinds, grouped by the type package contributing them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    // Execution
    /// Process → Process
    HasChildProcess,
    /// Host → Process
    SpawnedProcess,
    /// Process → Thread
    HasThread,
    /// Call → Call, per-thread time-ordered chain
    FollowedBy,
    /// Call → Call, skips calls without graph effects
    NextSignificantCall,
    /// Call → Process
    CreatesProcess,
    /// Call → Thread
    CreatesThread,
    /// Call → Process
    OpensProcess,
    /// Process → File
    Executes,

    // Filesystem
    /// Call → FileHandle
    CreatesFile,
    /// Call → FileHandle
    OpensFile,
    /// Call → FileHandle
    Reads,
    /// Call → FileHandle
    Writes,
    /// Call → FileHandle | KeyHandle
    Closes,
    /// Process → FileHandle | KeyHandle
    OwnsHandle,
    /// FileHandle → File | Directory, KeyHandle → Key
    Designates,
    /// Call → File
    DeletesFile,
    /// Call → File
    QueriesFile,
    /// Call → File
    MovesFrom,
    /// Call → File
    MovesTo,
    /// Call → Directory
    CreatesDirectory,
    /// Call → Directory
    ListsDirectory,
    /// Directory → File | Directory
    Contains,
    /// Host → Directory
    HasDrive,
    /// Call → Data
    HasData,

    // Imports
    /// Process → Import
    Imports,
    /// Import → File
    ImportsFile,
    /// Call → Import
    LoadsImport,

    // Registry
    /// Call → KeyHandle
    OpensKey,
    /// Call → KeyHandle
    CreatesKey,
    /// Call → KeyHandle
    UsesHandle,
    /// Key → Key
    HasSubKey,
    /// Host → Key
    HasHive,
    /// Key → KeyEntry
    HasEntry,
    /// Call → KeyEntry
    SetsEntry,
    /// Call → KeyEntry
    QueriesEntry,
    /// Call → KeyEntry
    DeletesEntry,
    /// KeyEntry → KeyEntry, previous version to next
    ChangesTowards,
    /// Call → Key
    EnumeratesKey,
    /// Call → Key
    DeletesKey,
    /// KeyEntry → File | Directory
    PointsToFile,

    // Network
    /// Call → Host
    ConnectsTo,
    /// Call → Host
    ResolvesHost,
}

impl EdgeKind {
    /// Arrows have a distinguished source and destination
    pub fn is_directed(&self) -> bool {
        !matches!(self, Self::OwnsHandle | Self::Designates)
    }

    /// Per-thread call chaining, as opposed to relations produced by effects
    #[inline]
    pub fn is_chain(&self) -> bool {
        matches!(self, Self::FollowedBy | Self::NextSignificantCall)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::HasChildProcess => "has_child_process",
            Self::SpawnedProcess => "spawned_process",
            Self::HasThread => "has_thread",
            Self::FollowedBy => "followed_by",
            Self::NextSignificantCall => "next_significant_call",
            Self::CreatesProcess => "creates_process",
            Self::CreatesThread => "creates_thread",
            Self::OpensProcess => "opens_process",
            Self::Executes => "executes",
            Self::CreatesFile => "creates_file",
            Self::OpensFile => "opens_file",
            Self::Reads => "reads",
            Self::Writes => "writes",
            Self::Closes => "closes",
            Self::OwnsHandle => "owns_handle",
            Self::Designates => "designates",
            Self::DeletesFile => "deletes_file",
            Self::QueriesFile => "queries_file",
            Self::MovesFrom => "moves_from",
            Self::MovesTo => "moves_to",
            Self::CreatesDirectory => "creates_directory",
            Self::ListsDirectory => "lists_directory",
            Self::Contains => "contains",
            Self::HasDrive => "has_drive",
            Self::HasData => "has_data",
            Self::Imports => "imports",
            Self::ImportsFile => "imports_file",
            Self::LoadsImport => "loads_import",
            Self::OpensKey => "opens_key",
            Self::CreatesKey => "creates_key",
            Self::UsesHandle => "uses_handle",
            Self::HasSubKey => "has_sub_key",
            Self::HasHive => "has_hive",
            Self::HasEntry => "has_entry",
            Self::SetsEntry => "sets_entry",
            Self::QueriesEntry => "queries_entry",
            Self::DeletesEntry => "deletes_entry",
            Self::ChangesTowards => "changes_towards",
            Self::EnumeratesKey => "enumerates_key",
            Self::DeletesKey => "deletes_key",
            Self::PointsToFile => "points_to_file",
            Self::ConnectsTo => "connects_to",
            Self::ResolvesHost => "resolves_host",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A relation stored in the universe
///
/// `attrs` makes it a DataEdge; attributes never affect identity, which is
/// `(kind, source, destination)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub kind: EdgeKind,
    pub source: VertexId,
    pub target: VertexId,
    pub attrs: AHashMap<String, serde_json::Value>,
}

impl Edge {
    /// The endpoint opposite to `v` (for symmetric traversal)
    #[inline]
    pub fn other(&self, v: VertexId) -> VertexId {
        if self.source == v {
            self.target
        } else {
            self.source
        }
    }
}

/// Identity of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeKey {
    pub kind: EdgeKind,
    pub source: VertexId,
    pub target: VertexId,
}

impl EdgeKey {
    /// Undirected kinds are keyed with ordered endpoints so that (a, b) and
    /// (b, a) are the same relation
    pub fn new(kind: EdgeKind, source: VertexId, target: VertexId) -> Self {
        if !kind.is_directed() && target < source {
            Self {
                kind,
                source: target,
                target: source,
            }
        } else {
            Self {
                kind,
                source,
                target,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undirected_key_is_symmetric() {
        let a = VertexId::new(1);
        let b = VertexId::new(2);
        assert_eq!(
            EdgeKey::new(EdgeKind::Designates, a, b),
            EdgeKey::new(EdgeKind::Designates, b, a)
        );
        assert_ne!(
            EdgeKey::new(EdgeKind::FollowedBy, a, b),
            EdgeKey::new(EdgeKind::FollowedBy, b, a)
        );
    }
}
