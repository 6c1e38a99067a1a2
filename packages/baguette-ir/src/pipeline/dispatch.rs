// Call Dispatch
//
// Maps a call name to the handlers that integrate it. Keys are literal names
// or name predicates. The first lookup of a name evaluates every
// registration once and caches the resulting handler list; later lookups of
// the same name reuse it. Registering a handler invalidates the cache.
//
// Handlers run in registration order, each at most once per call, whatever
// the call's status: handlers decide themselves whether a failed call
// matters.

use ahash::AHashMap;
use parking_lot::RwLock;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use tracing::{trace, warn};

use super::context::{BuildContext, Invocation};
use super::error::PipelineResult;

pub type Handler = Arc<dyn Fn(&mut BuildContext, &Invocation) -> PipelineResult<()> + Send + Sync>;

type NamePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// How a registration selects call names
#[derive(Clone)]
pub enum MatchKey {
    Exact(String),
    Predicate { label: String, test: NamePredicate },
}

impl MatchKey {
    pub fn exact(name: impl Into<String>) -> Self {
        Self::Exact(name.into())
    }

    pub fn predicate(
        label: impl Into<String>,
        test: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::Predicate {
            label: label.into(),
            test: Arc::new(test),
        }
    }

    pub fn contains(needle: &str) -> Self {
        let needle = needle.to_string();
        Self::predicate(format!("contains({})", needle), move |name| {
            name.contains(needle.as_str())
        })
    }

    pub fn starts_with(prefix: &str) -> Self {
        let prefix = prefix.to_string();
        Self::predicate(format!("starts_with({})", prefix), move |name| {
            name.starts_with(prefix.as_str())
        })
    }

    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        let re = Regex::new(pattern)?;
        Ok(Self::predicate(format!("regex({})", pattern), move |name| {
            re.is_match(name)
        }))
    }

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == name,
            Self::Predicate { test, .. } => test(name),
        }
    }
}

impl fmt::Debug for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(name) => write!(f, "Exact({})", name),
            Self::Predicate { label, .. } => write!(f, "Predicate({})", label),
        }
    }
}

impl From<&str> for MatchKey {
    fn from(name: &str) -> Self {
        Self::Exact(name.to_string())
    }
}

struct Registration {
    keys: Vec<MatchKey>,
    handler: Handler,
}

#[derive(Default)]
pub struct DispatchTable {
    registrations: RwLock<Vec<Registration>>,
    cache: RwLock<AHashMap<String, Arc<[Handler]>>>,
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("registrations", &self.registrations.read().len())
            .field("cached_names", &self.cache.read().len())
            .finish()
    }
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under every key in `keys`
    ///
    /// A handler matched by several keys still runs once per call.
    pub fn register<K, F>(&self, keys: impl IntoIterator<Item = K>, handler: F)
    where
        K: Into<MatchKey>,
        F: Fn(&mut BuildContext, &Invocation) -> PipelineResult<()> + Send + Sync + 'static,
    {
        let registration = Registration {
            keys: keys.into_iter().map(Into::into).collect(),
            handler: Arc::new(handler),
        };
        self.registrations.write().push(registration);
        self.cache.write().clear();
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.read().len()
    }

    /// Names resolved so far
    pub fn cached_names(&self) -> usize {
        self.cache.read().len()
    }

    /// Handlers for `name`, in registration order
    pub fn handlers_for(&self, name: &str) -> Arc<[Handler]> {
        if let Some(handlers) = self.cache.read().get(name) {
            return Arc::clone(handlers);
        }

        let handlers: Arc<[Handler]> = self
            .registrations
            .read()
            .iter()
            .filter(|registration| registration.keys.iter().any(|key| key.matches(name)))
            .map(|registration| Arc::clone(&registration.handler))
            .collect();
        trace!(name, handlers = handlers.len(), "Resolved call handlers");
        self.cache
            .write()
            .insert(name.to_string(), Arc::clone(&handlers));
        handlers
    }

    /// Run every handler registered for the invocation's call name
    ///
    /// Source-data failures are logged and skipped; anything else aborts.
    /// Returns the number of handlers that completed.
    pub fn integrate(&self, ctx: &mut BuildContext, invocation: &Invocation) -> PipelineResult<usize> {
        let handlers = self.handlers_for(invocation.api());
        let mut completed = 0;
        for handler in handlers.iter() {
            match handler(ctx, invocation) {
                Ok(()) => completed += 1,
                Err(err) if !err.is_fatal() => {
                    warn!(seq = invocation.seq, error = %err, "Skipping call");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(completed)
    }
}
