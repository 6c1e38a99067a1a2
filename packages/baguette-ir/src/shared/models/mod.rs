//! Shared models: vertices, edges and the graph store

mod edge;
mod store;
pub mod value;
mod vertex;

pub use edge::{Edge, EdgeId, EdgeKey, EdgeKind, VertexId};
pub use store::{Element, Graph, GraphId, GraphStats, Store, StoreError, StoreResult};
pub use value::RegValue;
pub use vertex::{
    time_bits, CallData, DataBlob, HandleData, HostData, ImportData, KeyData, KeyEntryData,
    PathData, ProcessData, ThreadData, Vertex, VertexData, VertexKey, VertexKind,
};
