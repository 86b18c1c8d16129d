use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{BoxFuture, Shared};
use serde_json::Value;

use crate::controller::{Controller, ControllerKind, Scope};
use crate::error::{DismissReason, PresentOutcome, StackError};
use crate::options::PresentOptions;
use crate::view::View;

/// Monotonically increasing entry identifier, allocated per presenter.
pub type EntryId = u64;

/// Shared, clonable completion signal. Resolves exactly once.
pub type CompletionFuture = Shared<BoxFuture<'static, PresentOutcome>>;

/// Lifecycle state of a stack entry.
///
/// Transitions are monotonic except `Active <-> Presented`, which may cycle
/// as entries above are presented and dismissed. No entry ever returns to an
/// earlier state after reaching `Dismissed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentableState {
    /// Created synchronously; view/controller not yet materialized.
    Initialized,

    /// View and controller exist; entry is on the stack but not topmost.
    Presented,

    /// Topmost non-dismissed entry, receiving focus-level events.
    Active,

    /// Dismissal requested or cascaded; teardown pending or in progress.
    Dismissed,

    /// Controller/view/scope released; pruned on the next tick.
    Disposed,
}

/// Callback registered through [`PresentContext::schedule`].
pub(crate) type TimerCallback = Box<dyn FnOnce(&PresentContext) + Send>;

struct Timer {
    timeout: Duration,
    elapsed: Duration,
    callback: Option<TimerCallback>,
}

pub(crate) struct DismissRecord {
    pub reason: DismissReason,
    /// State the entry was in when dismissal was requested; used to fire
    /// deactivation before `on_dismiss` when the entry was Active.
    pub prior: PresentableState,
}

/// Shared core of one stack entry: everything that must be reachable from
/// present handles, controller contexts, view close listeners and in-flight
/// pipeline futures. The controller/view/scope themselves are owned
/// exclusively by the collection-side [`Presentable`].
pub(crate) struct PresentableCore {
    id: EntryId,
    kind: ControllerKind,
    options: PresentOptions,
    layer: i32,
    tag: i64,
    state: Mutex<PresentableState>,
    dismissal: Mutex<Option<DismissRecord>>,
    result: Mutex<Option<Value>>,
    elapsed: Mutex<Duration>,
    timers: Mutex<Vec<Timer>>,
    completion_tx: Mutex<Option<oneshot::Sender<PresentOutcome>>>,
    completion: CompletionFuture,
    ever_presented: AtomicBool,
    teardown_enqueued: AtomicBool,
    dismiss_hook_fired: AtomicBool,
}

impl PresentableCore {
    pub(crate) fn new(
        id: EntryId,
        kind: ControllerKind,
        options: PresentOptions,
        layer: i32,
        tag: i64,
    ) -> Arc<Self> {
        let (tx, rx) = oneshot::channel::<PresentOutcome>();
        let completion = rx
            .map(|resolved| match resolved {
                Ok(outcome) => outcome,
                // Sender dropped without resolving: destructive teardown.
                Err(_) => PresentOutcome::Cancelled,
            })
            .boxed()
            .shared();

        Arc::new(Self {
            id,
            kind,
            options,
            layer,
            tag,
            state: Mutex::new(PresentableState::Initialized),
            dismissal: Mutex::new(None),
            result: Mutex::new(None),
            elapsed: Mutex::new(Duration::ZERO),
            timers: Mutex::new(Vec::new()),
            completion_tx: Mutex::new(Some(tx)),
            completion,
            ever_presented: AtomicBool::new(false),
            teardown_enqueued: AtomicBool::new(false),
            dismiss_hook_fired: AtomicBool::new(false),
        })
    }

    /// Clonable view of the entry's exactly-once completion signal.
    pub(crate) fn completion(&self) -> CompletionFuture {
        self.completion.clone()
    }

    pub(crate) fn id(&self) -> EntryId {
        self.id
    }

    pub(crate) fn kind(&self) -> ControllerKind {
        self.kind
    }

    pub(crate) fn options(&self) -> PresentOptions {
        self.options
    }

    pub(crate) fn layer(&self) -> i32 {
        self.layer
    }

    pub(crate) fn tag(&self) -> i64 {
        self.tag
    }

    pub(crate) fn state(&self) -> PresentableState {
        *self.state.lock().unwrap()
    }

    pub(crate) fn set_state(&self, next: PresentableState) {
        let mut state = self.state.lock().unwrap();
        log::debug!("entry #{} ({}): {:?} -> {:?}", self.id, self.kind, *state, next);
        *state = next;
    }

    pub(crate) fn mark_presented(&self) {
        self.ever_presented.store(true, Ordering::Relaxed);
        self.set_state(PresentableState::Presented);
    }

    pub(crate) fn ever_presented(&self) -> bool {
        self.ever_presented.load(Ordering::Relaxed)
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state() == PresentableState::Active
    }

    pub(crate) fn is_dismissed(&self) -> bool {
        matches!(
            self.state(),
            PresentableState::Dismissed | PresentableState::Disposed
        )
    }

    /// Request dismissal. Idempotent: only the first request records a reason
    /// and transitions the state; later requests (including a view-close
    /// notification racing an explicit dismiss) are no-ops.
    pub(crate) fn request_dismiss(&self, reason: DismissReason, result: Option<Value>) -> bool {
        let prior = {
            let mut state = self.state.lock().unwrap();
            if matches!(
                *state,
                PresentableState::Dismissed | PresentableState::Disposed
            ) {
                return false;
            }
            let prior = *state;
            *state = PresentableState::Dismissed;
            prior
        };

        if let Some(value) = result {
            self.set_result(value);
        }
        *self.dismissal.lock().unwrap() = Some(DismissRecord { reason, prior });
        log::debug!("entry #{} ({}): dismissal requested from {:?}", self.id, self.kind, prior);
        true
    }

    /// Whether this entry still needs a teardown operation enqueued. Flips
    /// exactly once so a dismissed entry gets exactly one teardown sequence.
    pub(crate) fn claim_teardown(&self) -> bool {
        !self.teardown_enqueued.swap(true, Ordering::Relaxed)
    }

    pub(crate) fn dismiss_reason(&self) -> Option<DismissReason> {
        self.dismissal
            .lock()
            .unwrap()
            .as_ref()
            .map(|record| record.reason.clone())
    }

    /// State the entry was in when dismissal was first requested.
    pub(crate) fn dismiss_prior(&self) -> Option<PresentableState> {
        self.dismissal
            .lock()
            .unwrap()
            .as_ref()
            .map(|record| record.prior)
    }

    /// Whether `on_dismiss` still needs to fire for this entry. Flips exactly
    /// once; a destructive presenter disposal racing a teardown operation must
    /// not fire the hook twice.
    pub(crate) fn claim_dismiss_hook(&self) -> bool {
        !self.dismiss_hook_fired.swap(true, Ordering::Relaxed)
    }

    /// Write-once result slot; the second write is silently ignored.
    pub(crate) fn set_result(&self, value: Value) {
        let mut slot = self.result.lock().unwrap();
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    pub(crate) fn result(&self) -> Option<Value> {
        self.result.lock().unwrap().clone()
    }

    pub(crate) fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap()
    }

    pub(crate) fn advance_elapsed(&self, frame_time: Duration) {
        *self.elapsed.lock().unwrap() += frame_time;
    }

    pub(crate) fn schedule(&self, timeout: Duration, callback: TimerCallback) {
        self.timers.lock().unwrap().push(Timer {
            timeout,
            elapsed: Duration::ZERO,
            callback: Some(callback),
        });
    }

    /// Advance all pending timers by `frame_time` and collect the callbacks
    /// of every timer that reached its timeout, in insertion order. Fired
    /// timers are removed before their callbacks run, so a callback may
    /// re-schedule a new timer without affecting the current sweep.
    pub(crate) fn advance_timers(&self, frame_time: Duration) -> Vec<TimerCallback> {
        let mut timers = self.timers.lock().unwrap();
        for timer in timers.iter_mut() {
            timer.elapsed += frame_time;
        }

        let mut due = Vec::new();
        let mut i = 0;
        while i < timers.len() {
            if timers[i].elapsed >= timers[i].timeout {
                let mut timer = timers.remove(i);
                if let Some(callback) = timer.callback.take() {
                    due.push(callback);
                }
            } else {
                i += 1;
            }
        }
        due
    }

    /// Resolve the completion signal. The first resolution wins; later calls
    /// are no-ops.
    pub(crate) fn resolve(&self, outcome: PresentOutcome) {
        if let Some(tx) = self.completion_tx.lock().unwrap().take() {
            log::debug!("entry #{} ({}): resolved {:?}", self.id, self.kind, outcome);
            let _ = tx.send(outcome);
        }
    }

    /// Compute and send the final outcome at disposal time. Priority:
    /// accumulated teardown errors, then the cancellation flag, then the
    /// result slot. Returns the failure the signal resolved with, if any.
    pub(crate) fn resolve_on_dispose(
        &self,
        errors: Vec<anyhow::Error>,
    ) -> Option<Arc<StackError>> {
        let reason = self
            .dismiss_reason()
            .unwrap_or(DismissReason::Cancelled);

        let outcome = if errors.is_empty() {
            match reason {
                DismissReason::Failed(cause) => PresentOutcome::Failed(cause),
                DismissReason::Cancelled => PresentOutcome::Cancelled,
                DismissReason::Requested => {
                    let result = self.result();
                    if !self.ever_presented() && result.is_none() {
                        // Dismissed before it ever presented and without a
                        // result: that is a cancellation, not a completion.
                        PresentOutcome::Cancelled
                    } else {
                        PresentOutcome::Completed(result.unwrap_or(Value::Null))
                    }
                }
            }
        } else {
            let mut all = errors;
            if let DismissReason::Failed(cause) = &reason {
                all.insert(0, anyhow::anyhow!(cause.clone()));
            }
            PresentOutcome::Failed(Arc::new(StackError::Teardown(all)))
        };

        let failure = match &outcome {
            PresentOutcome::Failed(err) => Some(err.clone()),
            _ => None,
        };
        self.resolve(outcome);
        failure
    }
}

/// The surface a controller (and its timers) receives back from the stack:
/// elapsed presented time, activation flag, timer scheduling, and the dismiss
/// entry points of its own entry. Cheap to clone.
#[derive(Clone)]
pub struct PresentContext {
    core: Arc<PresentableCore>,
}

impl PresentContext {
    pub(crate) fn new(core: Arc<PresentableCore>) -> Self {
        Self { core }
    }

    pub fn id(&self) -> EntryId {
        self.core.id()
    }

    pub fn kind(&self) -> ControllerKind {
        self.core.kind()
    }

    /// Time the entry has spent in `Presented`/`Active` across ticks.
    pub fn elapsed(&self) -> Duration {
        self.core.elapsed()
    }

    pub fn is_active(&self) -> bool {
        self.core.is_active()
    }

    /// Register a one-shot timer fired from the entry's per-tick update once
    /// `timeout` of presented time has accumulated.
    pub fn schedule(
        &self,
        timeout: Duration,
        callback: impl FnOnce(&PresentContext) + Send + 'static,
    ) {
        self.core.schedule(timeout, Box::new(callback));
    }

    /// Dismiss the entry without a result.
    pub fn dismiss(&self) {
        self.core.request_dismiss(DismissReason::Requested, None);
    }

    /// Dismiss the entry with a result value.
    pub fn dismiss_with(&self, result: Value) {
        self.core.request_dismiss(DismissReason::Requested, Some(result));
    }

    /// Dismiss the entry with any serializable result.
    pub fn dismiss_value<T: serde::Serialize>(&self, result: T) {
        self.dismiss_with(serde_json::to_value(result).unwrap_or(Value::Null));
    }

    /// Dismiss the entry because of an error; the completion signal of the
    /// entry and its cascaded children resolves failed.
    pub fn dismiss_with_error(&self, error: anyhow::Error) {
        self.core.request_dismiss(
            DismissReason::Failed(Arc::new(StackError::Dismissal(error))),
            None,
        );
    }

    /// Cancel the entry: the completion signal resolves cancelled.
    pub fn cancel(&self) {
        self.core.request_dismiss(DismissReason::Cancelled, None);
    }
}

/// One stack entry: a controller/view pair with its lifecycle core. Owned by
/// the presenter's collection; handles and contexts only hold the core.
pub struct Presentable {
    core: Arc<PresentableCore>,
    parent: Option<EntryId>,
    controller: Option<Box<dyn Controller>>,
    view: Option<Box<dyn View>>,
    scope: Option<Box<dyn Scope>>,
    errors: Vec<anyhow::Error>,
}

impl Presentable {
    pub(crate) fn new(core: Arc<PresentableCore>, parent: Option<EntryId>) -> Self {
        Self {
            core,
            parent,
            controller: None,
            view: None,
            scope: None,
            errors: Vec::new(),
        }
    }

    pub fn id(&self) -> EntryId {
        self.core.id()
    }

    pub fn kind(&self) -> ControllerKind {
        self.core.kind()
    }

    pub fn options(&self) -> PresentOptions {
        self.core.options()
    }

    pub fn layer(&self) -> i32 {
        self.core.layer()
    }

    pub fn tag(&self) -> i64 {
        self.core.tag()
    }

    pub fn state(&self) -> PresentableState {
        self.core.state()
    }

    /// Non-owning back-reference to the parent entry, `None` for roots.
    pub fn parent(&self) -> Option<EntryId> {
        self.parent
    }

    /// Whether the entry may receive routed commands.
    pub fn is_command_receptive(&self) -> bool {
        matches!(
            self.state(),
            PresentableState::Presented | PresentableState::Active
        )
    }

    pub(crate) fn core(&self) -> &Arc<PresentableCore> {
        &self.core
    }

    pub(crate) fn context(&self) -> PresentContext {
        PresentContext::new(self.core.clone())
    }

    pub(crate) fn set_view(&mut self, view: Box<dyn View>) {
        self.view = Some(view);
    }

    pub(crate) fn set_controller(&mut self, controller: Box<dyn Controller>) {
        self.controller = Some(controller);
    }

    pub(crate) fn set_scope(&mut self, scope: Option<Box<dyn Scope>>) {
        self.scope = scope;
    }

    pub fn controller_mut(&mut self) -> Option<&mut (dyn Controller + 'static)> {
        self.controller.as_deref_mut()
    }

    pub(crate) fn view_mut(&mut self) -> Option<&mut (dyn View + 'static)> {
        self.view.as_deref_mut()
    }

    pub(crate) fn take_controller(&mut self) -> Option<Box<dyn Controller>> {
        self.controller.take()
    }

    pub(crate) fn take_view(&mut self) -> Option<Box<dyn View>> {
        self.view.take()
    }

    pub(crate) fn take_scope(&mut self) -> Option<Box<dyn Scope>> {
        self.scope.take()
    }

    pub(crate) fn push_error(&mut self, error: anyhow::Error) {
        self.errors.push(error);
    }

    pub(crate) fn take_errors(&mut self) -> Vec<anyhow::Error> {
        std::mem::take(&mut self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    fn test_core() -> (Arc<PresentableCore>, CompletionFuture) {
        let core = PresentableCore::new(1, ControllerKind("test"), PresentOptions::empty(), 0, 0);
        let completion = core.completion();
        (core, completion)
    }

    #[test]
    fn dismiss_is_idempotent() {
        let (core, _completion) = test_core();
        core.mark_presented();
        assert!(core.request_dismiss(DismissReason::Requested, Some(Value::from(1))));
        assert!(!core.request_dismiss(DismissReason::Cancelled, Some(Value::from(2))));
        // First reason and result win.
        assert_eq!(core.result(), Some(Value::from(1)));
        assert!(core.claim_teardown());
        assert!(!core.claim_teardown());
    }

    #[test]
    fn result_slot_is_write_once() {
        let (core, _completion) = test_core();
        core.set_result(Value::from("first"));
        core.set_result(Value::from("second"));
        assert_eq!(core.result(), Some(Value::from("first")));
    }

    #[test]
    fn completion_resolves_exactly_once() {
        let (core, completion) = test_core();
        core.resolve(PresentOutcome::Cancelled);
        core.resolve(PresentOutcome::Completed(Value::Null));
        assert!(block_on(completion).is_cancelled());
    }

    #[test]
    fn never_presented_dismissal_resolves_cancelled() {
        let (core, completion) = test_core();
        core.request_dismiss(DismissReason::Requested, None);
        core.resolve_on_dispose(Vec::new());
        assert!(block_on(completion).is_cancelled());
    }

    #[test]
    fn presented_dismissal_resolves_with_result() {
        let (core, completion) = test_core();
        core.mark_presented();
        core.request_dismiss(DismissReason::Requested, Some(Value::from(42)));
        core.resolve_on_dispose(Vec::new());
        match block_on(completion) {
            PresentOutcome::Completed(value) => assert_eq!(value, Value::from(42)),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn teardown_errors_take_priority_over_result() {
        let (core, completion) = test_core();
        core.mark_presented();
        core.request_dismiss(DismissReason::Requested, Some(Value::from(7)));
        core.resolve_on_dispose(vec![anyhow::anyhow!("release failed")]);
        match block_on(completion) {
            PresentOutcome::Failed(err) => match err.as_ref() {
                StackError::Teardown(errors) => assert_eq!(errors.len(), 1),
                other => panic!("unexpected error: {:?}", other),
            },
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn timers_fire_in_insertion_order_and_allow_rescheduling() {
        let (core, _completion) = test_core();
        let ctx = PresentContext::new(core.clone());

        let fired = Arc::new(Mutex::new(Vec::new()));
        for label in ["a", "b"] {
            let fired = fired.clone();
            core.schedule(
                Duration::from_millis(10),
                Box::new(move |ctx: &PresentContext| {
                    fired.lock().unwrap().push(label);
                    // Re-scheduling must not affect the current sweep.
                    ctx.schedule(Duration::from_millis(10), |_| {});
                }),
            );
        }

        let due = core.advance_timers(Duration::from_millis(10));
        assert_eq!(due.len(), 2);
        for callback in due {
            callback(&ctx);
        }
        assert_eq!(*fired.lock().unwrap(), vec!["a", "b"]);

        // Both re-scheduled timers are pending but not yet due.
        assert!(core.advance_timers(Duration::from_millis(5)).is_empty());
        assert_eq!(core.advance_timers(Duration::from_millis(5)).len(), 2);
    }

    #[test]
    fn dismissal_records_prior_state() {
        let (core, _completion) = test_core();
        core.mark_presented();
        core.set_state(PresentableState::Active);
        core.request_dismiss(DismissReason::Requested, None);
        assert_eq!(core.dismiss_prior(), Some(PresentableState::Active));
        assert!(matches!(core.dismiss_reason(), Some(DismissReason::Requested)));
    }
}
