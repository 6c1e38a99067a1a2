// Filter layer
//
// Named predicates that prune a finished behavior graph into a smaller view.
// A filter is bound to one graph (so it may precompute per-graph state) and
// only looks at content inside that graph, which makes `apply` idempotent.
// Filters compose by chaining: each application yields a new graph.

pub mod error;
pub mod filter;
pub mod predicates;
pub mod registry;

pub use error::{FilterError, FilterResult};
pub use filter::{Filter, GraphPredicate, PredicateFactory};
pub use registry::FilterRegistry;
