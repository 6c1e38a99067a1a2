//! Name -> filter lookup

use std::collections::BTreeMap;

use super::error::{FilterError, FilterResult};
use super::filter::Filter;
use super::predicates;
use crate::shared::models::{GraphId, Store};

#[derive(Debug, Clone, Default)]
pub struct FilterRegistry {
    filters: BTreeMap<&'static str, Filter>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every provided filter
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for filter in predicates::provided() {
            registry.register(filter);
        }
        registry
    }

    /// Register (or replace) a filter under its name
    pub fn register(&mut self, filter: Filter) {
        self.filters.insert(filter.name(), filter);
    }

    pub fn get(&self, name: &str) -> FilterResult<Filter> {
        self.filters
            .get(name)
            .copied()
            .ok_or_else(|| FilterError::unknown(name, self.names()))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.filters.keys().copied()
    }

    /// Apply the named filters in order
    ///
    /// Intermediate graphs are dropped; the input graph is left untouched.
    /// With no names the result is a plain copy of the input.
    pub fn chain(&self, store: &mut Store, graph: GraphId, names: &[&str]) -> FilterResult<GraphId> {
        let filters = names
            .iter()
            .map(|name| self.get(name))
            .collect::<FilterResult<Vec<_>>>()?;

        let mut current = graph;
        for filter in filters.iter() {
            let next = filter.apply(store, current)?;
            if current != graph {
                store.drop_graph(current)?;
            }
            current = next;
        }
        if current == graph {
            current = predicates::identity().apply(store, graph)?;
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_names() {
        let registry = FilterRegistry::standard();
        let names: Vec<_> = registry.names().collect();
        assert_eq!(names.len(), 7);
        for name in [
            "effectless-calls",
            "data-nodes",
            "simple-imports",
            "non-essential-handles",
            "non-injected-threads",
            "insignificant-processes",
            "read-only-registry",
        ] {
            assert!(names.contains(&name), "{name} missing");
        }
    }

    #[test]
    fn test_unknown_filter_lists_available() {
        let err = FilterRegistry::standard().get("nope").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("nope"));
        assert!(message.contains("data-nodes"));
    }
}
