#![forbid(unsafe_code)]

//! The per-element binding object.
//!
//! A [`BindingObject`] is what generated code instantiates for every bound
//! element: it owns the data root, the tracking state, per-slot evaluation
//! results, and the phase scheduler, and drives them through the lifecycle
//!
//! ```text
//! connect → set_data_root → update / process_bindings … → recycle → … → stop_tracking
//! ```
//!
//! # Re-entrancy
//!
//! Evaluation runs generated code (evaluators, target writes) which can, in
//! turn, mutate sources or call back into this object. At most one evaluation
//! is in flight per object: anything arriving while one is on the stack is
//! queued and run once the current pass completes, de-duplicated per cache
//! key. A circular binding keeps re-queueing itself; the queue is dropped with
//! a warning after [`BindingConfig::max_coalesced_rounds`] rounds.
//!
//! # Invariants
//!
//! 1. `is_initialized()` is false whenever the tracking state is absent or no
//!    data root is set.
//! 2. `update()` twice with an unchanged root evaluates nothing the second
//!    time and leaves every subscription in place.
//! 3. After `stop_tracking()` no subscription made by this object is live.
//! 4. A new data root (or `invalidate()`) forgets every per-slot result; the
//!    next evaluation of each slot writes unconditionally.
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Unknown connection id | `Err(BindingError)`, logged at error |
//! | Data root of the wrong type | `false`, previous root kept, logged at warn |
//! | Source collected | Slot keeps its last written value |
//! | Evaluator yields `None` | Slot keeps its last written value |
//! | Re-entrant call | Deferred to the end of the current pass |

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;

use crate::config::BindingConfig;
use crate::context::DataContextSource;
use crate::error::BindingError;
use crate::notify::{Change, Subscription, SubscriptionId, Topic};
use crate::observer::Observer;
use crate::phase::{EvalScope, NextPhase, PhaseScheduler, PhaseState};
use crate::root::{Inspectable, RootKind};
use crate::table::{BindingTable, ConnectionId, SlotId};
use crate::tracking::{BindingTrackingState, CacheKey, ListenerGate, TrackingListener};

/// Per-slot evaluation result of the current realization.
#[derive(Default)]
struct SlotState {
    /// Evaluated against the current root since the last invalidation.
    current: bool,
    /// Last value written to the target.
    last: Option<Box<dyn Any>>,
}

impl SlotState {
    fn forget(&mut self) {
        self.current = false;
        self.last = None;
    }
}

struct ObjectState<R: RootKind> {
    data_root: Option<R::Root>,
    item_index: Option<usize>,
    tracking: Option<BindingTrackingState>,
    targets: AHashMap<ConnectionId, Inspectable>,
    slots: Vec<SlotState>,
    phases: PhaseScheduler,
}

impl<R: RootKind> ObjectState<R> {
    fn forget_results(&mut self) {
        self.slots.iter_mut().for_each(SlotState::forget);
        self.phases.reset();
    }
}

/// Work deferred while an evaluation is in flight.
enum Pending<R: RootKind> {
    Update,
    UpdateAll,
    Refresh { key: CacheKey, change: Change },
    SetRoot(R::Root),
    Phase(u32),
    CompletePhases,
    Invalidate,
    Recycle,
    Connect(ConnectionId, Inspectable),
    Disconnect(ConnectionId),
}

impl<R: RootKind> Pending<R> {
    fn duplicates(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Update, Self::Update)
            | (Self::UpdateAll, Self::UpdateAll)
            | (Self::CompletePhases, Self::CompletePhases) => true,
            (
                Self::Refresh { key: a, change: ca },
                Self::Refresh { key: b, change: cb },
            ) => a == b && ca == cb,
            _ => false,
        }
    }

    /// Work that changes what a later `Update` would evaluate.
    fn changes_state(&self) -> bool {
        matches!(
            self,
            Self::SetRoot(_) | Self::Invalidate | Self::Recycle | Self::Connect(..) | Self::Disconnect(_)
        )
    }
}

/// Clears the in-flight flag even if generated code panics.
struct BusyGuard<'a> {
    busy: &'a Cell<bool>,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.busy.set(false);
    }
}

struct Shared<R: RootKind> {
    table: Rc<BindingTable<R>>,
    config: BindingConfig,
    state: RefCell<ObjectState<R>>,
    initialized: Cell<bool>,
    busy: Cell<bool>,
    stop_requested: Cell<bool>,
    pending: RefCell<VecDeque<Pending<R>>>,
    gate: RefCell<Option<Rc<ListenerGate>>>,
    data_context: RefCell<Option<Subscription>>,
    this: Weak<Shared<R>>,
}

impl<R: RootKind> Shared<R> {
    fn name(&self) -> &'static str {
        self.table.name()
    }

    fn enter(&self) -> Option<BusyGuard<'_>> {
        if self.busy.get() {
            return None;
        }
        self.busy.set(true);
        Some(BusyGuard { busy: &self.busy })
    }

    /// Run `work` now, or queue it behind the evaluation in flight.
    fn dispatch(&self, work: Pending<R>) {
        match self.enter() {
            Some(guard) => {
                self.execute(work);
                self.settle(guard);
            }
            None => self.defer(work),
        }
    }

    fn defer(&self, work: Pending<R>) {
        let mut pending = self.pending.borrow_mut();
        // Only coalesce with work queued after the last state change.
        if pending
            .iter()
            .rev()
            .take_while(|queued| !queued.changes_state())
            .any(|queued| queued.duplicates(&work))
        {
            return;
        }
        tracing::trace!(table = self.name(), queued = pending.len() + 1, "re-entrant call deferred");
        pending.push_back(work);
    }

    /// Drain deferred work, then release the in-flight flag.
    fn settle(&self, guard: BusyGuard<'_>) {
        let mut rounds = 0_u32;
        loop {
            if self.stop_requested.get() {
                self.pending.borrow_mut().clear();
                break;
            }
            let batch: Vec<Pending<R>> = self.pending.borrow_mut().drain(..).collect();
            if batch.is_empty() {
                break;
            }
            rounds += 1;
            if rounds > self.config.max_coalesced_rounds {
                tracing::warn!(
                    table = self.name(),
                    rounds,
                    dropped = batch.len(),
                    "deferred binding work did not settle (circular binding?); dropping it"
                );
                break;
            }
            for work in batch {
                if self.stop_requested.get() {
                    break;
                }
                self.execute(work);
            }
        }
        drop(guard);
        if self.stop_requested.replace(false) {
            self.stop_now();
        }
    }

    fn execute(&self, work: Pending<R>) {
        let mut state = self.state.borrow_mut();
        match work {
            Pending::Update => self.run_update(&mut state),
            Pending::UpdateAll => self.run_update_all(&mut state),
            Pending::Refresh { key, change } => self.run_refresh(&mut state, key, &change),
            Pending::SetRoot(root) => self.assign_root(&mut state, root),
            Pending::Phase(phase) => {
                self.run_phase(&mut state, phase);
            }
            Pending::CompletePhases => self.run_complete_phases(&mut state),
            Pending::Invalidate => state.forget_results(),
            Pending::Recycle => self.recycle_state(&mut state),
            Pending::Connect(id, target) => self.attach(&mut state, id, target),
            Pending::Disconnect(id) => self.detach(&mut state, id),
        }
    }

    fn ensure_tracking(&self, state: &mut ObjectState<R>) {
        if state.tracking.is_some() {
            return;
        }
        let tracking = BindingTrackingState::new();
        let listener: Weak<dyn TrackingListener> = self.this.clone();
        tracking.set_listener(Some(listener));
        *self.gate.borrow_mut() = Some(tracking.gate());
        state.tracking = Some(tracking);
        tracing::debug!(table = self.name(), "binding tracking initialized");
    }

    fn close_gate(&self) {
        if let Some(gate) = self.gate.borrow().as_ref() {
            gate.close();
        }
    }

    fn stop_now(&self) {
        self.close_gate();
        self.pending.borrow_mut().clear();
        let context = self.data_context.borrow_mut().take();
        drop(context);
        let tracking = {
            let mut state = self.state.borrow_mut();
            state.forget_results();
            state.tracking.take()
        };
        let released = tracking
            .as_ref()
            .map_or(0, BindingTrackingState::live_subscriptions);
        drop(tracking);
        *self.gate.borrow_mut() = None;
        self.initialized.set(false);
        tracing::debug!(table = self.name(), released, "binding tracking stopped");
    }

    fn assign_root(&self, state: &mut ObjectState<R>, root: R::Root) {
        state.data_root = Some(root);
        state.forget_results();
        tracing::debug!(table = self.name(), root = R::type_name(), "data root assigned");
    }

    fn recycle_state(&self, state: &mut ObjectState<R>) {
        state.data_root = None;
        state.item_index = None;
        state.forget_results();
        self.initialized.set(false);
        tracing::debug!(table = self.name(), "binding object recycled");
    }

    fn attach(&self, state: &mut ObjectState<R>, id: ConnectionId, target: Inspectable) {
        state.targets.insert(id, target);
        for (index, def) in self.table.slots().enumerate() {
            if def.connection == id {
                state.slots[index].forget();
            }
        }
        tracing::debug!(table = self.name(), connection = %id, "target connected");
    }

    fn detach(&self, state: &mut ObjectState<R>, id: ConnectionId) {
        let removed = state.targets.remove(&id).is_some();
        for (index, def) in self.table.slots().enumerate() {
            if def.connection != id {
                continue;
            }
            state.slots[index].forget();
            if let Some(tracking) = state.tracking.as_mut() {
                tracking.release_slot(def.id);
            }
        }
        tracing::debug!(table = self.name(), connection = %id, removed, "unloaded object disconnected");
    }

    fn run_update(&self, state: &mut ObjectState<R>) {
        self.ensure_tracking(state);
        let Some(root) = state.data_root.clone() else {
            tracing::debug!(table = self.name(), "update without a data root; nothing evaluated");
            return;
        };
        let evaluated = self.evaluate(state, &root, EvalScope::NotPhased);
        state.phases.complete_initial();
        self.initialized.set(true);
        tracing::debug!(
            table = self.name(),
            evaluated,
            phase = ?state.phases.state(),
            "bindings updated"
        );
    }

    fn run_update_all(&self, state: &mut ObjectState<R>) {
        self.ensure_tracking(state);
        let Some(root) = state.data_root.clone() else {
            return;
        };
        let evaluated = self.evaluate(state, &root, EvalScope::DataChanged);
        state.phases.finish();
        self.initialized.set(true);
        tracing::debug!(table = self.name(), evaluated, "all bindings re-evaluated");
    }

    fn run_phase(&self, state: &mut ObjectState<R>, phase: u32) -> NextPhase {
        self.ensure_tracking(state);
        let Some(root) = state.data_root.clone() else {
            tracing::debug!(table = self.name(), phase, "phase requested without a data root");
            return NextPhase::Complete;
        };
        let evaluated = self.evaluate(state, &root, EvalScope::Phase(phase));
        let next = state.phases.complete(phase);
        self.initialized.set(true);
        tracing::trace!(table = self.name(), phase, evaluated, %next, "phase processed");
        next
    }

    fn run_complete_phases(&self, state: &mut ObjectState<R>) {
        if state.data_root.is_none() {
            return;
        }
        while let Some(phase) = state.phases.pending() {
            self.run_phase(state, phase);
        }
    }

    fn run_refresh(&self, state: &mut ObjectState<R>, key: CacheKey, change: &Change) {
        let Some(slot) = state
            .tracking
            .as_ref()
            .and_then(|tracking| tracking.route(key, change))
        else {
            return;
        };
        let Some(index) = self.table.slot_index(slot) else {
            return;
        };
        // Invalidated slots are re-evaluated by their own phase.
        if !state.slots[index].current {
            return;
        }
        let Some(root) = state.data_root.clone() else {
            return;
        };
        tracing::trace!(table = self.name(), %slot, kind = %change.kind(), "source changed");
        self.evaluate_slot(state, &root, index);
    }

    fn evaluate(&self, state: &mut ObjectState<R>, root: &R::Root, scope: EvalScope) -> usize {
        let mut evaluated = 0;
        for index in 0..self.table.slot_count() {
            let phase = self.table.compiled(index).def.phase;
            if scope.covers(phase, state.slots[index].current) {
                self.evaluate_slot(state, root, index);
                evaluated += 1;
            }
        }
        evaluated
    }

    fn evaluate_slot(&self, state: &mut ObjectState<R>, root: &R::Root, index: usize) {
        let compiled = self.table.compiled(index);
        let def = compiled.def;
        let mut observer = Observer::new(def.id, def.kinds, self.config.reference_mode);
        let value = compiled.program.evaluate(root, &mut observer);
        if let Some(tracking) = state.tracking.as_mut() {
            tracking.apply(def.id, observer.finish());
        }

        let slot = &mut state.slots[index];
        slot.current = true;
        let Some(value) = value else {
            tracing::trace!(table = self.name(), slot = %def.id, "value unavailable; keeping last");
            return;
        };
        if self.config.skip_redundant_writes
            && slot
                .last
                .as_deref()
                .is_some_and(|last| compiled.program.same_value(last, &*value))
        {
            tracing::trace!(table = self.name(), slot = %def.id, "value unchanged; write skipped");
            return;
        }
        let Some(target) = state.targets.get(&def.connection) else {
            // Written once the connection arrives.
            slot.current = false;
            tracing::trace!(table = self.name(), slot = %def.id, "target not connected");
            return;
        };
        if compiled.program.write(&**target, &*value) {
            slot.last = Some(value);
            tracing::trace!(table = self.name(), slot = %def.id, "target written");
        } else {
            tracing::warn!(
                table = self.name(),
                slot = %def.id,
                connection = %def.connection,
                "target rejected the written value type"
            );
        }
    }

    fn data_context_changed<E: DataContextSource + ?Sized>(&self, element: &E) {
        let _span = tracing::debug_span!("data_context_changed", table = self.name()).entered();
        let Some(data) = element.data_context() else {
            tracing::debug!(table = self.name(), "data context cleared; keeping root");
            return;
        };
        match R::resolve(&data) {
            Some(root) => {
                self.dispatch(Pending::SetRoot(root));
                self.dispatch(Pending::Update);
            }
            None => tracing::warn!(
                table = self.name(),
                expected = R::type_name(),
                "data context has unexpected type; keeping root"
            ),
        }
    }
}

impl<R: RootKind> TrackingListener for Shared<R> {
    fn on_change(&self, key: CacheKey, change: &Change) {
        self.dispatch(Pending::Refresh {
            key,
            change: change.clone(),
        });
    }
}

/// Generated per-element binding object, generic over the root capability.
pub struct BindingObject<R: RootKind> {
    shared: Rc<Shared<R>>,
}

impl<R: RootKind> BindingObject<R> {
    /// Create an object for `table`. Prefer [`BindingTable::create`].
    #[must_use]
    pub fn new(table: Rc<BindingTable<R>>, config: BindingConfig) -> Self {
        let state = ObjectState {
            data_root: None,
            item_index: None,
            tracking: None,
            targets: AHashMap::new(),
            slots: (0..table.slot_count()).map(|_| SlotState::default()).collect(),
            phases: PhaseScheduler::new(Rc::clone(table.phases())),
        };
        let shared = Rc::new_cyclic(|this| Shared {
            table,
            config,
            state: RefCell::new(state),
            initialized: Cell::new(false),
            busy: Cell::new(false),
            stop_requested: Cell::new(false),
            pending: RefCell::new(VecDeque::new()),
            gate: RefCell::new(None),
            data_context: RefCell::new(None),
            this: this.clone(),
        });
        Self { shared }
    }

    /// Record the target for `connection`. Does not evaluate.
    ///
    /// An id the table does not know, or a target of another type than the
    /// table declared, is a configuration error: generated code and runtime
    /// disagree, and the host should treat it as fatal.
    pub fn connect(&self, connection: ConnectionId, target: Inspectable) -> Result<(), BindingError> {
        let table = &self.shared.table;
        let Some(def) = table.connection(connection) else {
            tracing::error!(table = table.name(), %connection, "connect: unknown connection id");
            return Err(BindingError::UnknownConnection {
                table: table.name(),
                connection,
            });
        };
        if !def.accepts(&*target) {
            tracing::error!(
                table = table.name(),
                %connection,
                expected = def.target_type_name(),
                "connect: target has the wrong type"
            );
            return Err(BindingError::TargetTypeMismatch {
                table: table.name(),
                connection,
                expected: def.target_type_name(),
            });
        }
        self.shared.dispatch(Pending::Connect(connection, target));
        Ok(())
    }

    /// Assign a late-bound data root.
    ///
    /// Returns `false`, keeping the previous root, if `data` is not of the
    /// root type.
    pub fn set_data_root(&self, data: &Inspectable) -> bool {
        match R::resolve(data) {
            Some(root) => {
                self.set_root(root);
                true
            }
            None => {
                tracing::warn!(
                    table = self.shared.name(),
                    expected = R::type_name(),
                    "data root has unexpected type; keeping previous root"
                );
                false
            }
        }
    }

    /// Assign a typed data root.
    pub fn set_root(&self, root: R::Root) {
        self.shared.dispatch(Pending::SetRoot(root));
    }

    /// Evaluate the initial-phase slots that are not current; arm later phases.
    pub fn update(&self) {
        let _span = tracing::debug_span!("binding_update", table = self.shared.name()).entered();
        self.shared.dispatch(Pending::Update);
    }

    /// Re-evaluate every slot regardless of phase ("data changed").
    pub fn update_all(&self) {
        let _span = tracing::debug_span!("binding_update_all", table = self.shared.name()).entered();
        self.shared.dispatch(Pending::UpdateAll);
    }

    /// `update()` unless already initialized.
    pub fn initialize(&self) {
        if !self.is_initialized() {
            self.update();
        }
    }

    /// Element-loading path: adopt the element's data context if not yet
    /// initialized, then update.
    pub fn loading<E: DataContextSource + ?Sized>(&self, element: &E) {
        if self.is_initialized() {
            return;
        }
        if let Some(data) = element.data_context() {
            self.set_data_root(&data);
        }
        self.update();
    }

    /// Advance phased evaluation for a container being realized.
    ///
    /// Phase 0 adopts `item` as the data root (a different item forgets every
    /// slot result; the same item only restarts the phase walk). Returns the
    /// next phase to visit, or [`NextPhase::Complete`].
    pub fn process_bindings(&self, item: &Inspectable, item_index: usize, phase: u32) -> NextPhase {
        let shared = &self.shared;
        let _span = tracing::debug_span!(
            "process_bindings",
            table = shared.name(),
            index = item_index,
            phase
        )
        .entered();
        let root = if phase == 0 {
            let Some(root) = R::resolve(item) else {
                tracing::warn!(
                    table = shared.name(),
                    expected = R::type_name(),
                    "item has unexpected type; bindings not processed"
                );
                return NextPhase::Complete;
            };
            Some(root)
        } else {
            None
        };

        let Some(guard) = shared.enter() else {
            if let Some(root) = root {
                shared.defer(Pending::SetRoot(root));
            }
            shared.defer(Pending::Phase(phase));
            return shared.table.next_phase_after(phase);
        };
        let next = {
            let mut state = shared.state.borrow_mut();
            if let Some(root) = root {
                let same = state
                    .data_root
                    .as_ref()
                    .is_some_and(|current| R::same(current, &root));
                if same {
                    state.phases.reset();
                } else {
                    shared.assign_root(&mut state, root);
                }
                state.item_index = Some(item_index);
            }
            shared.run_phase(&mut state, phase)
        };
        shared.settle(guard);
        next
    }

    /// Evaluate one phase against the current root.
    ///
    /// Returns whether more phases remain.
    pub fn process_binding(&self, phase: u32) -> bool {
        let shared = &self.shared;
        let Some(guard) = shared.enter() else {
            shared.defer(Pending::Phase(phase));
            return !shared.table.next_phase_after(phase).is_complete();
        };
        let next = {
            let mut state = shared.state.borrow_mut();
            shared.run_phase(&mut state, phase)
        };
        shared.settle(guard);
        !next.is_complete()
    }

    /// Run every remaining phase in order.
    pub fn complete_phases(&self) {
        self.shared.dispatch(Pending::CompletePhases);
    }

    /// Explicit "data changed": forget every slot result and restart phases.
    pub fn invalidate(&self) {
        self.shared.dispatch(Pending::Invalidate);
    }

    /// Forget per-item results so the object can serve another item.
    ///
    /// Subscriptions stay: the next root's evaluation re-points them.
    pub fn recycle(&self) {
        self.shared.dispatch(Pending::Recycle);
    }

    /// Data-template reset; same as [`recycle`](Self::recycle).
    pub fn reset_template(&self) {
        self.recycle();
    }

    /// Release every subscription and clear `is_initialized`.
    ///
    /// Idempotent and safe from any state. Called from inside an evaluation of
    /// this object, handlers are silenced immediately and the release happens
    /// when the evaluation returns.
    pub fn stop_tracking(&self) {
        let shared = &self.shared;
        match shared.enter() {
            Some(guard) => {
                shared.stop_now();
                drop(guard);
            }
            None => {
                shared.close_gate();
                shared.initialized.set(false);
                shared.stop_requested.set(true);
            }
        }
    }

    /// Follow `element`'s inherited data context: every change assigns the new
    /// context as root and updates. Replaces any previous subscription.
    pub fn subscribe_for_data_context_changed<E: DataContextSource + ?Sized>(&self, element: &Rc<E>) {
        let shared = Rc::downgrade(&self.shared);
        let source = Rc::downgrade(element);
        let subscription = element
            .notifier()
            .subscribe(Topic::DataContextChanged, move |_| {
                let (Some(shared), Some(element)) = (shared.upgrade(), source.upgrade()) else {
                    return;
                };
                shared.data_context_changed(&*element);
            });
        let previous = self.shared.data_context.borrow_mut().replace(subscription);
        drop(previous);
    }

    /// Sever one connection (an independently unloaded child) and release the
    /// subscriptions of the slots writing to it.
    pub fn disconnect_unloaded_object(&self, connection: ConnectionId) -> Result<(), BindingError> {
        let table = &self.shared.table;
        if table.connection(connection).is_none() {
            tracing::error!(table = table.name(), %connection, "disconnect: unknown connection id");
            return Err(BindingError::UnknownConnection {
                table: table.name(),
                connection,
            });
        }
        self.shared.dispatch(Pending::Disconnect(connection));
        Ok(())
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.shared.initialized.get()
    }

    #[must_use]
    pub fn table(&self) -> &Rc<BindingTable<R>> {
        &self.shared.table
    }

    #[must_use]
    pub fn config(&self) -> &BindingConfig {
        &self.shared.config
    }

    // Diagnostics below borrow the object state and panic if called from
    // inside an evaluation of this same object.

    /// The current data root.
    #[must_use]
    pub fn data_root(&self) -> Option<R::Root> {
        self.shared.state.borrow().data_root.clone()
    }

    /// Item index passed with the last phase-0 `process_bindings`.
    #[must_use]
    pub fn item_index(&self) -> Option<usize> {
        self.shared.state.borrow().item_index
    }

    #[must_use]
    pub fn phase_state(&self) -> PhaseState {
        self.shared.state.borrow().phases.state()
    }

    #[must_use]
    pub fn has_tracking(&self) -> bool {
        self.shared.state.borrow().tracking.is_some()
    }

    #[must_use]
    pub fn is_connected(&self, connection: ConnectionId) -> bool {
        self.shared.state.borrow().targets.contains_key(&connection)
    }

    /// Whether `slot` has been evaluated against the current root.
    #[must_use]
    pub fn is_current(&self, slot: SlotId) -> bool {
        let Some(index) = self.shared.table.slot_index(slot) else {
            return false;
        };
        self.shared.state.borrow().slots[index].current
    }

    /// Number of live subscriptions held by the tracking state.
    #[must_use]
    pub fn live_subscriptions(&self) -> usize {
        self.shared
            .state
            .borrow()
            .tracking
            .as_ref()
            .map_or(0, BindingTrackingState::live_subscriptions)
    }

    /// `(cache, subscription)` pairs in cache order.
    #[must_use]
    pub fn tracking_snapshot(&self) -> Vec<(CacheKey, SubscriptionId)> {
        self.shared
            .state
            .borrow()
            .tracking
            .as_ref()
            .map(BindingTrackingState::snapshot)
            .unwrap_or_default()
    }
}

impl<R: RootKind> fmt::Debug for BindingObject<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("BindingObject");
        s.field("table", &self.shared.table.name())
            .field("initialized", &self.shared.initialized.get());
        if let Ok(state) = self.shared.state.try_borrow() {
            s.field("phase", &state.phases.state())
                .field("tracking", &state.tracking);
        }
        s.finish()
    }
}
