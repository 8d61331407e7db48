#![forbid(unsafe_code)]

//! A simulated virtualized list host.
//!
//! Drives binding objects the way an items control with container recycling
//! does:
//!
//! - realizing an index takes a container from the recycle pool (or builds a
//!   new one) and processes phase 0 against the item;
//! - every [`layout_pass`](VirtualList::layout_pass) advances each realized
//!   container by one phase;
//! - scrolling derealizes containers that left the viewport, recycles them into
//!   the pool, and realizes the newly visible indices.
//!
//! Only the visible window `[first, first + viewport)` is ever realized.

use std::collections::BTreeMap;
use std::fmt;

use xbind_runtime::{Bindings, Inspectable, NextPhase};

/// One recyclable item container: its binding object plus its targets.
pub struct Container<T> {
    bindings: Box<dyn Bindings>,
    targets: T,
    pending: Option<u32>,
}

impl<T> Container<T> {
    #[must_use]
    pub fn new(bindings: Box<dyn Bindings>, targets: T) -> Self {
        Self {
            bindings,
            targets,
            pending: None,
        }
    }

    #[must_use]
    pub fn bindings(&self) -> &dyn Bindings {
        &*self.bindings
    }

    #[must_use]
    pub fn targets(&self) -> &T {
        &self.targets
    }

    /// Next phase this container waits for, if any.
    #[must_use]
    pub fn pending_phase(&self) -> Option<u32> {
        self.pending
    }
}

impl<T: fmt::Debug> fmt::Debug for Container<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("initialized", &self.bindings.is_initialized())
            .field("pending", &self.pending)
            .field("targets", &self.targets)
            .finish()
    }
}

/// Counters accumulated over the lifetime of a list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ListStats {
    pub created: usize,
    pub recycled: usize,
    pub layout_passes: usize,
    pub phase_calls: usize,
}

type Factory<T> = Box<dyn Fn() -> Container<T>>;

/// Virtualized list over a fixed item source.
pub struct VirtualList<T> {
    items: Vec<Inspectable>,
    viewport: usize,
    first: usize,
    realized: BTreeMap<usize, Container<T>>,
    pool: Vec<Container<T>>,
    factory: Factory<T>,
    stats: ListStats,
}

impl<T> VirtualList<T> {
    /// Create a list showing `viewport` rows; nothing is realized yet.
    pub fn new(
        items: Vec<Inspectable>,
        viewport: usize,
        factory: impl Fn() -> Container<T> + 'static,
    ) -> Self {
        Self {
            items,
            viewport,
            first: 0,
            realized: BTreeMap::new(),
            pool: Vec::new(),
            factory: Box::new(factory),
            stats: ListStats::default(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn first_visible(&self) -> usize {
        self.first
    }

    /// Visible index range.
    #[must_use]
    pub fn window(&self) -> std::ops::Range<usize> {
        let end = self.first.saturating_add(self.viewport).min(self.items.len());
        self.first.min(end)..end
    }

    /// Realize every visible index that is not realized yet.
    pub fn realize_visible(&mut self) {
        for index in self.window() {
            if !self.realized.contains_key(&index) {
                self.realize(index);
            }
        }
    }

    fn realize(&mut self, index: usize) {
        let mut container = match self.pool.pop() {
            Some(container) => {
                self.stats.recycled += 1;
                container
            }
            None => {
                self.stats.created += 1;
                (self.factory)()
            }
        };
        let next = container
            .bindings
            .process_bindings(&self.items[index], index, 0);
        self.stats.phase_calls += 1;
        container.pending = next.phase();
        tracing::trace!(index, %next, "container realized");
        self.realized.insert(index, container);
    }

    /// Recycle the container at `index` into the pool.
    pub fn derealize(&mut self, index: usize) -> bool {
        let Some(mut container) = self.realized.remove(&index) else {
            return false;
        };
        container.bindings.recycle();
        container.pending = None;
        self.pool.push(container);
        tracing::trace!(index, pool = self.pool.len(), "container recycled");
        true
    }

    /// Advance every realized container by one phase.
    ///
    /// Returns the number of `process_bindings` calls made; zero means every
    /// visible container is complete.
    pub fn layout_pass(&mut self) -> usize {
        self.stats.layout_passes += 1;
        let mut calls = 0;
        for (&index, container) in &mut self.realized {
            let Some(phase) = container.pending else {
                continue;
            };
            let next = container
                .bindings
                .process_bindings(&self.items[index], index, phase);
            container.pending = match next {
                NextPhase::Phase(next) => Some(next),
                NextPhase::Complete => None,
            };
            calls += 1;
        }
        self.stats.phase_calls += calls;
        calls
    }

    /// Run layout passes until every visible container is complete.
    ///
    /// Returns the number of passes that did work.
    pub fn settle(&mut self) -> usize {
        let mut passes = 0;
        while self.layout_pass() > 0 {
            passes += 1;
        }
        passes
    }

    /// Scroll so `first` is the first visible index, recycling containers that
    /// leave the viewport and realizing the ones that enter it.
    pub fn scroll_to(&mut self, first: usize) {
        self.first = first.min(self.items.len().saturating_sub(self.viewport));
        let window = self.window();
        let leaving: Vec<usize> = self
            .realized
            .keys()
            .copied()
            .filter(|index| !window.contains(index))
            .collect();
        for index in &leaving {
            self.derealize(*index);
        }
        self.realize_visible();
        tracing::debug!(
            first = self.first,
            recycled = leaving.len(),
            realized = self.realized.len(),
            "list scrolled"
        );
    }

    /// Stop tracking on every container, realized or pooled.
    pub fn teardown(&mut self) {
        for container in self.realized.values().chain(self.pool.iter()) {
            container.bindings.stop_tracking();
        }
        tracing::debug!(
            realized = self.realized.len(),
            pooled = self.pool.len(),
            "list torn down"
        );
    }

    #[must_use]
    pub fn container(&self, index: usize) -> Option<&Container<T>> {
        self.realized.get(&index)
    }

    pub fn realized(&self) -> impl Iterator<Item = (usize, &Container<T>)> {
        self.realized.iter().map(|(index, container)| (*index, container))
    }

    #[must_use]
    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    #[must_use]
    pub fn stats(&self) -> ListStats {
        self.stats
    }

    /// Live subscriptions over every container, realized or pooled.
    #[must_use]
    pub fn live_subscriptions(&self) -> usize {
        self.realized
            .values()
            .chain(self.pool.iter())
            .map(|container| container.bindings.live_subscriptions())
            .sum()
    }
}

impl<T> fmt::Debug for VirtualList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualList")
            .field("items", &self.items.len())
            .field("viewport", &self.viewport)
            .field("first", &self.first)
            .field("realized", &self.realized.len())
            .field("pool", &self.pool.len())
            .field("stats", &self.stats)
            .finish()
    }
}
