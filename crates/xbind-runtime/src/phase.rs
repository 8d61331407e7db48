#![forbid(unsafe_code)]

//! Phased evaluation state machine for one realized element.
//!
//! A virtualized list realizes a container, then spends one layout pass per
//! phase on it: `process_bindings(item, index, k)` evaluates only the slots
//! tagged `k` and reports the next phase worth visiting. Expensive bindings
//! (images, formatted text) get high tags and land after the row is already
//! on screen.
//!
//! ```text
//! Unstarted ──process(k₀)──▶ InPhase(k₁) ──process(k₁)──▶ … ──▶ Complete
//!     ▲                                                          │
//!     └──────────── reset (new root / data changed / recycle) ───┘
//! ```
//!
//! `InPhase(k)` means "`k` is the next phase to process". Tags are static and
//! compiler-assigned; resetting never discards them.

use std::fmt;
use std::rc::Rc;

/// Scheduler state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseState {
    Unstarted,
    InPhase(u32),
    Complete,
}

/// What the host should do after processing a phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NextPhase {
    /// Call `process_bindings` again with this phase on a later pass.
    Phase(u32),
    /// Nothing left for this realization.
    Complete,
}

impl NextPhase {
    #[must_use]
    pub fn phase(self) -> Option<u32> {
        match self {
            Self::Phase(phase) => Some(phase),
            Self::Complete => None,
        }
    }

    #[must_use]
    pub fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Raw host encoding: the phase, or `-1` once complete.
    #[must_use]
    pub fn to_raw(self) -> i64 {
        match self {
            Self::Phase(phase) => i64::from(phase),
            Self::Complete => -1,
        }
    }
}

impl fmt::Display for NextPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Phase(phase) => write!(f, "phase {phase}"),
            Self::Complete => f.write_str("complete"),
        }
    }
}

/// Which slots one evaluation pass covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvalScope {
    /// Initial-phase slots that are not current (the `update` path).
    NotPhased,
    /// Every slot tagged with this phase, current or not.
    Phase(u32),
    /// Every slot regardless of phase or currency.
    DataChanged,
}

impl EvalScope {
    /// Whether a slot tagged `phase` (currently `current`) is evaluated.
    #[must_use]
    pub fn covers(self, phase: u32, current: bool) -> bool {
        match self {
            Self::NotPhased => phase == 0 && !current,
            Self::Phase(k) => phase == k,
            Self::DataChanged => true,
        }
    }
}

/// Smallest of the sorted `tags` strictly greater than `phase`.
#[must_use]
pub fn next_after(tags: &[u32], phase: u32) -> NextPhase {
    let idx = tags.partition_point(|&tag| tag <= phase);
    tags.get(idx)
        .map_or(NextPhase::Complete, |&tag| NextPhase::Phase(tag))
}

/// Per-element phase progress over a static set of tags.
#[derive(Clone)]
pub struct PhaseScheduler {
    tags: Rc<[u32]>,
    state: PhaseState,
}

impl PhaseScheduler {
    /// `tags` must be sorted and de-duplicated.
    #[must_use]
    pub fn new(tags: Rc<[u32]>) -> Self {
        debug_assert!(tags.windows(2).all(|w| w[0] < w[1]), "phase tags not sorted");
        Self {
            tags,
            state: PhaseState::Unstarted,
        }
    }

    #[must_use]
    pub fn state(&self) -> PhaseState {
        self.state
    }

    #[must_use]
    pub fn tags(&self) -> &[u32] {
        &self.tags
    }

    /// Back to `Unstarted`; tags are kept.
    pub fn reset(&mut self) {
        self.state = PhaseState::Unstarted;
    }

    /// The phase that should be processed next, if any.
    #[must_use]
    pub fn pending(&self) -> Option<u32> {
        match self.state {
            PhaseState::Unstarted => self.tags.first().copied(),
            PhaseState::InPhase(phase) => Some(phase),
            PhaseState::Complete => None,
        }
    }

    /// Smallest tag strictly greater than `phase`.
    #[must_use]
    pub fn next_after(&self, phase: u32) -> NextPhase {
        next_after(&self.tags, phase)
    }

    /// Record that `phase` has been processed and move on.
    pub fn complete(&mut self, phase: u32) -> NextPhase {
        let next = self.next_after(phase);
        self.state = match next {
            NextPhase::Phase(tag) => PhaseState::InPhase(tag),
            NextPhase::Complete => PhaseState::Complete,
        };
        next
    }

    /// Record that the initial phase ran through `update`.
    ///
    /// Only advances an `Unstarted` scheduler; a realization already past
    /// phase 0 is left alone.
    pub fn complete_initial(&mut self) {
        if self.state == PhaseState::Unstarted {
            let next = self.next_after(0);
            self.state = match next {
                NextPhase::Phase(tag) => PhaseState::InPhase(tag),
                NextPhase::Complete => PhaseState::Complete,
            };
        }
    }

    /// Mark every phase done.
    pub fn finish(&mut self) {
        self.state = PhaseState::Complete;
    }
}

impl fmt::Debug for PhaseScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseScheduler")
            .field("tags", &&*self.tags)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(tags: &[u32]) -> PhaseScheduler {
        PhaseScheduler::new(tags.into())
    }

    #[test]
    fn walks_every_tag_once() {
        let mut s = scheduler(&[0, 1, 4]);
        assert_eq!(s.pending(), Some(0));
        assert_eq!(s.complete(0), NextPhase::Phase(1));
        assert_eq!(s.state(), PhaseState::InPhase(1));
        assert_eq!(s.complete(1), NextPhase::Phase(4));
        assert_eq!(s.complete(4), NextPhase::Complete);
        assert_eq!(s.state(), PhaseState::Complete);
        assert_eq!(s.pending(), None);
    }

    #[test]
    fn next_after_skips_gaps() {
        let s = scheduler(&[0, 3, 7]);
        assert_eq!(s.next_after(0), NextPhase::Phase(3));
        assert_eq!(s.next_after(1), NextPhase::Phase(3));
        assert_eq!(s.next_after(7), NextPhase::Complete);
    }

    #[test]
    fn reset_keeps_tags() {
        let mut s = scheduler(&[0, 2]);
        s.complete(0);
        s.reset();
        assert_eq!(s.state(), PhaseState::Unstarted);
        assert_eq!(s.tags(), &[0, 2]);
        assert_eq!(s.pending(), Some(0));
    }

    #[test]
    fn complete_initial_only_from_unstarted() {
        let mut s = scheduler(&[0, 1, 2]);
        s.complete_initial();
        assert_eq!(s.state(), PhaseState::InPhase(1));
        s.complete(1);
        s.complete_initial();
        assert_eq!(s.state(), PhaseState::InPhase(2));
    }

    #[test]
    fn unphased_table_completes_after_initial() {
        let mut s = scheduler(&[0]);
        s.complete_initial();
        assert_eq!(s.state(), PhaseState::Complete);
    }

    #[test]
    fn empty_table_has_nothing_pending() {
        let s = scheduler(&[]);
        assert_eq!(s.pending(), None);
        assert_eq!(s.next_after(0), NextPhase::Complete);
    }

    #[test]
    fn scope_coverage() {
        assert!(EvalScope::NotPhased.covers(0, false));
        assert!(!EvalScope::NotPhased.covers(0, true));
        assert!(!EvalScope::NotPhased.covers(1, false));
        assert!(EvalScope::Phase(2).covers(2, true));
        assert!(!EvalScope::Phase(2).covers(1, false));
        assert!(EvalScope::DataChanged.covers(9, true));
    }

    #[test]
    fn next_phase_raw_encoding() {
        assert_eq!(NextPhase::Phase(3).to_raw(), 3);
        assert_eq!(NextPhase::Complete.to_raw(), -1);
        assert_eq!(NextPhase::Complete.to_string(), "complete");
    }
}
