//! Event bus
//!
//! Events form an open class hierarchy rooted at [`EVENT`]. Throwing an event
//! walks its class and every ancestor up to the root; at each level it
//! releases the threads blocked in [`EventBus::wait`] for that level and runs
//! the level's callbacks in registration order.
//!
//! Callback failures never stop sibling callbacks or ancestor levels: errors
//! are collected per level and handed back to the thrower as one
//! [`EventError`] once every level has been processed.
//!
//! Callbacks receive a mutable context `C` from the thrower (the build context
//! for the builder's bus), which is how finalization passes reach the graph
//! without ambient lookups.

use ahash::AHashMap;
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// ============================================================
// Class hierarchy
// ============================================================

/// A node of the event class hierarchy, declared as a `static`
#[derive(Debug)]
pub struct EventClass {
    name: &'static str,
    parent: Option<&'static EventClass>,
}

impl EventClass {
    pub const fn root(name: &'static str) -> Self {
        Self { name, parent: None }
    }

    pub const fn derive(name: &'static str, parent: &'static EventClass) -> Self {
        Self {
            name,
            parent: Some(parent),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parent(&self) -> Option<&'static EventClass> {
        self.parent
    }

    /// This class followed by its superclasses, root last
    pub fn ancestors(&'static self) -> impl Iterator<Item = &'static EventClass> {
        std::iter::successors(Some(self), |class| class.parent)
    }

    /// Whether `self` is `other` or one of its subclasses
    pub fn is_a(&'static self, other: &'static EventClass) -> bool {
        self.ancestors().any(|class| std::ptr::eq(class, other))
    }

    #[inline]
    fn id(&'static self) -> usize {
        self as *const EventClass as usize
    }
}

/// Root of the hierarchy
pub static EVENT: EventClass = EventClass::root("Event");

/// Anything that can be thrown on an [`EventBus`]
pub trait Event: Any + Send + Sync + fmt::Debug {
    /// Most-derived class of this event
    fn class(&self) -> &'static EventClass;

    fn as_any(&self) -> &dyn Any;
}

impl<'a> dyn Event + 'a {
    pub fn downcast_ref<T: Event>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is_a(&self, class: &'static EventClass) -> bool {
        self.class().is_a(class)
    }
}

// ============================================================
// Errors
// ============================================================

pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Failures of one hierarchy level
#[derive(Debug)]
pub struct LevelFailure {
    pub class: &'static str,
    pub errors: Vec<CallbackError>,
}

/// Aggregate of every callback failure raised by one `throw`
#[derive(Debug, Error)]
#[error("event callbacks failed: {}", summarize(.failures))]
pub struct EventError {
    pub failures: Vec<LevelFailure>,
}

impl EventError {
    pub fn error_count(&self) -> usize {
        self.failures.iter().map(|f| f.errors.len()).sum()
    }
}

fn summarize(failures: &[LevelFailure]) -> String {
    failures
        .iter()
        .map(|level| {
            let messages: Vec<String> = level.errors.iter().map(|e| e.to_string()).collect();
            format!("[{}] {}", level.class, messages.join("; "))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================
// Bus
// ============================================================

pub type Callback<C> =
    Arc<dyn Fn(&mut C, &dyn Event) -> Result<(), CallbackError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

struct Waiter {
    slot: Mutex<Option<Arc<dyn Event>>>,
    ready: Condvar,
}

impl Waiter {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(None),
            ready: Condvar::new(),
        })
    }

    fn release(&self, event: Arc<dyn Event>) {
        let mut slot = self.slot.lock();
        if slot.is_none() {
            *slot = Some(event);
        }
        self.ready.notify_all();
    }
}

struct Level<C> {
    callbacks: Vec<(CallbackId, Callback<C>)>,
    waiters: Vec<Arc<Waiter>>,
}

impl<C> Default for Level<C> {
    fn default() -> Self {
        Self {
            callbacks: Vec::new(),
            waiters: Vec::new(),
        }
    }
}

/// Publish/subscribe hub over the event class hierarchy
pub struct EventBus<C = ()> {
    levels: Mutex<AHashMap<usize, Level<C>>>,
    next_id: AtomicU64,
}

impl<C> Default for EventBus<C> {
    fn default() -> Self {
        Self {
            levels: Mutex::new(AHashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<C> fmt::Debug for EventBus<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let levels = self.levels.lock();
        f.debug_struct("EventBus")
            .field("levels", &levels.len())
            .finish()
    }
}

impl<C> EventBus<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a persistent callback for `class` and its subclasses
    pub fn add_callback<F>(&self, class: &'static EventClass, callback: F) -> CallbackId
    where
        F: Fn(&mut C, &dyn Event) -> Result<(), CallbackError> + Send + Sync + 'static,
    {
        let id = CallbackId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.levels
            .lock()
            .entry(class.id())
            .or_default()
            .callbacks
            .push((id, Arc::new(callback)));
        id
    }

    /// Returns whether the callback was registered
    pub fn remove_callback(&self, class: &'static EventClass, id: CallbackId) -> bool {
        let mut levels = self.levels.lock();
        let Some(level) = levels.get_mut(&class.id()) else {
            return false;
        };
        let before = level.callbacks.len();
        level.callbacks.retain(|(cid, _)| *cid != id);
        before != level.callbacks.len()
    }

    pub fn callback_count(&self, class: &'static EventClass) -> usize {
        self.levels
            .lock()
            .get(&class.id())
            .map(|level| level.callbacks.len())
            .unwrap_or(0)
    }

    /// Throw `event` through its class and every ancestor
    ///
    /// Returns whether anyone reacted (a waiter was released or a callback
    /// ran). Callback errors are aggregated per level and returned after all
    /// levels ran.
    pub fn throw(&self, ctx: &mut C, event: Arc<dyn Event>) -> Result<bool, EventError> {
        let mut reacted = false;
        let mut failures = Vec::new();

        for class in event.class().ancestors() {
            // Snapshot under the lock; callbacks may re-enter the bus
            let (waiters, callbacks) = {
                let mut levels = self.levels.lock();
                match levels.get_mut(&class.id()) {
                    Some(level) => (
                        std::mem::take(&mut level.waiters),
                        level.callbacks.clone(),
                    ),
                    None => continue,
                }
            };

            for waiter in waiters {
                waiter.release(Arc::clone(&event));
                reacted = true;
            }

            let mut errors = Vec::new();
            for (_, callback) in callbacks {
                reacted = true;
                if let Err(err) = callback(ctx, event.as_ref()) {
                    errors.push(err);
                }
            }
            if !errors.is_empty() {
                failures.push(LevelFailure {
                    class: class.name(),
                    errors,
                });
            }
        }

        if failures.is_empty() {
            Ok(reacted)
        } else {
            Err(EventError { failures })
        }
    }

    /// Convenience wrapper taking the event by value
    pub fn throw_event<E: Event>(&self, ctx: &mut C, event: E) -> Result<bool, EventError> {
        self.throw(ctx, Arc::new(event))
    }

    fn park(&self, class: &'static EventClass) -> Arc<Waiter> {
        let waiter = Waiter::new();
        self.levels
            .lock()
            .entry(class.id())
            .or_default()
            .waiters
            .push(Arc::clone(&waiter));
        waiter
    }

    /// Block until an event of `class` (or a subclass) is thrown
    pub fn wait(&self, class: &'static EventClass) -> Arc<dyn Event> {
        let waiter = self.park(class);
        let mut slot = waiter.slot.lock();
        loop {
            if let Some(event) = slot.take() {
                return event;
            }
            waiter.ready.wait(&mut slot);
        }
    }

    /// Like [`wait`](Self::wait), giving up after `timeout`
    pub fn wait_timeout(&self, class: &'static EventClass, timeout: Duration) -> Option<Arc<dyn Event>> {
        let waiter = self.park(class);
        {
            let mut slot = waiter.slot.lock();
            if slot.is_none() {
                waiter.ready.wait_for(&mut slot, timeout);
            }
            if let Some(event) = slot.take() {
                return Some(event);
            }
        }

        // Timed out: withdraw, then pick up a release that raced the withdrawal
        if let Some(level) = self.levels.lock().get_mut(&class.id()) {
            level.waiters.retain(|w| !Arc::ptr_eq(w, &waiter));
        }
        let event = waiter.slot.lock().take();
        event
    }

    /// Number of threads currently parked on `class`
    pub fn waiter_count(&self, class: &'static EventClass) -> usize {
        self.levels
            .lock()
            .get(&class.id())
            .map(|level| level.waiters.len())
            .unwrap_or(0)
    }
}
