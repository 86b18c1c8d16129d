use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::collection::PresentableCollection;
use crate::command::{self, CommandOutcome};
use crate::controller::{Controller, ControllerDescriptor, ControllerFactory, ControllerKind};
use crate::error::{DismissReason, PresentOutcome, StackError};
use crate::middleware::{MiddlewareChain, PresentRequest};
use crate::options::PresentOptions;
use crate::presentable::{
    CompletionFuture, EntryId, PresentContext, Presentable, PresentableCore, PresentableState,
};
use crate::scheduler::{
    self, DismissOp, Operation, OperationScheduler, PresentOp, PresentPhase, ViewCreation,
};
use crate::view::{View, ViewFactory, ViewRequest};

/// Side-channel callback for faults that have no caller to return to:
/// per-tick controller errors and teardown failures of ignored handles.
pub type ErrorCallback = Box<dyn Fn(&StackError) + Send>;

/// Clonable handle to one presented entry. Observes lifecycle state, awaits
/// the completion outcome, and requests dismissal; it never owns the
/// controller or view.
#[derive(Clone)]
pub struct PresentHandle {
    core: Arc<PresentableCore>,
    completion: CompletionFuture,
}

impl std::fmt::Debug for PresentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresentHandle")
            .field("id", &self.core.id())
            .field("kind", &self.core.kind())
            .field("state", &self.core.state())
            .finish()
    }
}

impl PresentHandle {
    pub(crate) fn new(core: Arc<PresentableCore>) -> Self {
        let completion = core.completion();
        Self { core, completion }
    }

    pub fn id(&self) -> EntryId {
        self.core.id()
    }

    pub fn kind(&self) -> ControllerKind {
        self.core.kind()
    }

    pub fn state(&self) -> PresentableState {
        self.core.state()
    }

    pub fn options(&self) -> PresentOptions {
        self.core.options()
    }

    /// Whether the entry has not yet been dismissed or disposed.
    pub fn is_live(&self) -> bool {
        !self.core.is_dismissed()
    }

    /// The entry's completion signal. Clonable; every clone resolves with the
    /// same outcome.
    pub fn completion(&self) -> CompletionFuture {
        self.completion.clone()
    }

    /// Await the final outcome. The presenter must keep ticking for the
    /// outcome to ever arrive.
    pub async fn wait(&self) -> PresentOutcome {
        self.completion.clone().await
    }

    /// Dismiss the entry without a result.
    pub fn dismiss(&self) {
        self.core.request_dismiss(DismissReason::Requested, None);
    }

    /// Dismiss the entry with a result value.
    pub fn dismiss_with(&self, result: Value) {
        self.core
            .request_dismiss(DismissReason::Requested, Some(result));
    }

    /// Dismiss the entry with any serializable result.
    pub fn dismiss_value<T: serde::Serialize>(&self, result: T) {
        self.dismiss_with(serde_json::to_value(result).unwrap_or(Value::Null));
    }

    /// Dismiss the entry because of an error; its subtree resolves failed.
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

    pub(crate) fn core(&self) -> &Arc<PresentableCore> {
        &self.core
    }
}

/// The presentation stack facade.
///
/// Owns the ordered collection, the operation queue, and the registered
/// factories. Presents are admitted synchronously (usage faults are returned
/// from the call site); the awaitable parts of the pipeline run as queued
/// operations driven from [`Presenter::update`], one at a time in FIFO order.
pub struct Presenter {
    collection: PresentableCollection,
    scheduler: OperationScheduler,
    middleware: MiddlewareChain,
    view_factory: Arc<dyn ViewFactory>,
    controller_factory: Arc<dyn ControllerFactory>,
    descriptors: HashMap<ControllerKind, ControllerDescriptor>,
    error_callback: Option<ErrorCallback>,
    default_args: Value,
    next_id: EntryId,
    disposed: bool,
}

impl Presenter {
    pub(crate) fn new(
        view_factory: Arc<dyn ViewFactory>,
        controller_factory: Arc<dyn ControllerFactory>,
        middleware: MiddlewareChain,
        descriptors: HashMap<ControllerKind, ControllerDescriptor>,
        error_callback: Option<ErrorCallback>,
        default_args: Value,
    ) -> Self {
        Self {
            collection: PresentableCollection::new(),
            scheduler: OperationScheduler::new(),
            middleware,
            view_factory,
            controller_factory,
            descriptors,
            error_callback,
            default_args,
            next_id: 1,
            disposed: false,
        }
    }

    /// Start the builder. See [`crate::PresenterBuilder`].
    pub fn builder(
        view_factory: impl ViewFactory + 'static,
        controller_factory: impl ControllerFactory + 'static,
    ) -> crate::PresenterBuilder {
        crate::PresenterBuilder::new(view_factory, controller_factory)
    }

    /// Present a registered controller kind with the default arguments as a
    /// root entry.
    pub fn present(&mut self, kind: ControllerKind) -> Result<PresentHandle, StackError> {
        let args = self.default_args.clone();
        self.present_with(kind, args, PresentOptions::empty(), None)
    }

    /// Present a registered controller kind.
    ///
    /// Admission is synchronous: usage faults (disposed presenter, unknown
    /// kind, invalid option combination, foreign parent) are returned here.
    /// The entry is inserted immediately in `Initialized` state; middleware
    /// and view creation run as a queued operation driven by `update`.
    pub fn present_with(
        &mut self,
        kind: ControllerKind,
        args: Value,
        options: PresentOptions,
        parent: Option<&PresentHandle>,
    ) -> Result<PresentHandle, StackError> {
        if self.disposed {
            return Err(StackError::PresenterDisposed);
        }
        if !options.is_valid() {
            return Err(StackError::InvalidOptions(options));
        }
        let descriptor = self
            .descriptors
            .get(&kind)
            .cloned()
            .ok_or(StackError::UnknownControllerKind(kind))?;

        let parent_id = match parent {
            None => None,
            Some(handle) => {
                let id = handle.id();
                let live = self
                    .collection
                    .get(id)
                    .map(|entry| {
                        Arc::ptr_eq(entry.core(), handle.core()) && !entry.core().is_dismissed()
                    })
                    .unwrap_or(false);
                if !live {
                    return Err(StackError::ForeignParent(id));
                }
                Some(id)
            }
        };

        // DISMISS_CURRENT replaces its target, so the new entry is inserted
        // as a root; linking it under the target would cascade it away too.
        let dismiss_target = if options.contains(PresentOptions::DISMISS_CURRENT) {
            parent_id.or_else(|| self.collection.topmost_live())
        } else {
            None
        };
        let link_parent = if options.contains(PresentOptions::DISMISS_CURRENT) {
            None
        } else {
            parent_id
        };

        let id = self.next_id;
        self.next_id += 1;
        let core = PresentableCore::new(id, kind, options, descriptor.layer, descriptor.tag);
        let handle = PresentHandle::new(core.clone());
        self.collection
            .insert(Presentable::new(core.clone(), link_parent));
        let z_index = self.collection.z_index_of(id, descriptor.layer);

        let request = PresentRequest {
            id,
            kind,
            args: args.clone(),
            options,
            layer: descriptor.layer,
            tag: descriptor.tag,
            parent: link_parent,
        };
        let view_request = ViewRequest {
            resource_key: descriptor.resolved_resource_key(),
            layer: descriptor.layer,
            z_index,
            options,
            parent: link_parent,
        };

        let chain = self.middleware.clone();
        let factory = self.view_factory.clone();
        let pipeline_core = core;
        let creation: ViewCreation = async move {
            // Dismissed before the operation started: skip every collaborator.
            if pipeline_core.is_dismissed() {
                return Err(StackError::Cancelled);
            }
            for middleware in chain.iter() {
                middleware
                    .on_present(&request)
                    .await
                    .map_err(StackError::Middleware)?;
                if pipeline_core.is_dismissed() {
                    return Err(StackError::Cancelled);
                }
            }
            let mut view = factory
                .create_view(&view_request)
                .await
                .map_err(StackError::ViewCreation)?;
            if pipeline_core.is_dismissed() {
                // Dismissed during view creation: discard the fresh view.
                if let Err(err) = view.dispose() {
                    log::warn!("disposing never-presented view failed: {}", err);
                }
                return Err(StackError::Cancelled);
            }
            Ok(view)
        }
        .boxed();

        log::info!(
            "🚀 presenting {} as entry #{} (options: {:?}, parent: {:?})",
            kind,
            id,
            options,
            link_parent
        );
        self.scheduler.enqueue(Operation::Present(PresentOp {
            id,
            args,
            dismiss_parent: dismiss_target,
            phase: PresentPhase::Creating(creation),
        }));

        Ok(handle)
    }

    /// Drive the stack one frame: run queued operations as far as they get
    /// without blocking, prune disposed entries, manage activation, and
    /// forward per-tick updates and due timers to live controllers.
    pub fn update(&mut self, frame_time: Duration) {
        if self.disposed {
            return;
        }

        loop {
            self.collect_dismiss_requests();
            if !self.pump_operations() {
                break;
            }
        }

        // Activation snapshot for this frame, taken once after the
        // operations ran so a single entry is top for the whole pass.
        let top = self.collection.topmost_live();
        let mut index = 0;
        while index < self.collection.len() {
            let state = self.collection.at(index).map(|entry| entry.state());
            if state == Some(PresentableState::Disposed) {
                let entry = self.collection.remove_at(index);
                log::debug!("pruned entry #{} ({})", entry.id(), entry.kind());
                continue;
            }
            let is_top = self
                .collection
                .at(index)
                .map(|entry| Some(entry.id()) == top)
                .unwrap_or(false);
            self.update_entry(index, frame_time, is_top);
            index += 1;
        }
    }

    /// Route a command through the stack, topmost first. Returns whether any
    /// controller consumed it.
    pub fn invoke_command(&mut self, name: &str, args: &Value) -> CommandOutcome {
        if self.disposed {
            return CommandOutcome::Unhandled;
        }
        command::route(&mut self.collection, name, args)
    }

    /// Request dismissal of every root entry; cascades cover the full stack.
    /// Teardown runs through the ordinary queued operations.
    pub fn dismiss_all(&mut self) {
        for root in self.collection.roots() {
            if let Some(entry) = self.collection.get(root) {
                entry
                    .core()
                    .request_dismiss(DismissReason::Cancelled, None);
            }
        }
    }

    /// Destructive synchronous teardown of the whole stack. Skips queued
    /// operations and transitions; every completion signal resolves
    /// cancelled (or failed, when releasing an entry errored). The presenter
    /// accepts no further structural calls.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        log::info!(
            "💀 disposing presenter with {} entries on the stack",
            self.collection.len()
        );
        self.scheduler.clear();

        // Pass 1, top first: mark everything cancelled and fire the
        // dismissal hooks that have not run yet.
        for index in (0..self.collection.len()).rev() {
            let Some(entry) = self.collection.at_mut(index) else {
                continue;
            };
            let core = entry.core().clone();
            core.request_dismiss(DismissReason::Cancelled, None);
            core.claim_teardown();
            let ctx = entry.context();
            if core.claim_dismiss_hook() {
                if core.dismiss_prior() == Some(PresentableState::Active) {
                    fire_hook(entry, &ctx, |controller, ctx| controller.on_deactivate(ctx));
                }
                fire_hook(entry, &ctx, |controller, ctx| controller.on_dismiss(ctx));
            }
        }

        // Pass 2, top first: release controllers, views and scopes, resolving
        // each completion signal.
        let ids: Vec<EntryId> = self.collection.iter().rev().map(|entry| entry.id()).collect();
        for id in ids {
            self.dispose_entry(id);
        }
        while !self.collection.is_empty() {
            self.collection.remove_at(0);
        }
        self.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Whether no operation is queued or in flight.
    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn len(&self) -> usize {
        self.collection.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collection.is_empty()
    }

    /// Read-only view of the ordered collection, bottom to top.
    pub fn collection(&self) -> &PresentableCollection {
        &self.collection
    }

    pub fn entries(&self) -> impl Iterator<Item = &Presentable> {
        self.collection.iter()
    }

    pub fn find_by_kind(&self, kind: ControllerKind) -> Vec<EntryId> {
        self.collection.find_by_kind(kind)
    }

    pub fn find_by_tag(&self, tag: i64) -> Vec<EntryId> {
        self.collection.find_by_tag(tag)
    }

    /// Handle for an entry already on the stack.
    pub fn handle(&self, id: EntryId) -> Option<PresentHandle> {
        self.collection
            .get(id)
            .map(|entry| PresentHandle::new(entry.core().clone()))
    }

    /// Direct access to an entry's controller, for hosts that drive screens
    /// imperatively between ticks.
    pub fn controller_mut(&mut self, id: EntryId) -> Option<&mut (dyn Controller + 'static)> {
        self.collection.get_mut(id)?.controller_mut()
    }

    /// Enqueue a teardown operation for every entry whose dismissal has been
    /// requested but not yet scheduled.
    fn collect_dismiss_requests(&mut self) {
        let pending: Vec<EntryId> = self
            .collection
            .iter()
            .filter(|entry| {
                entry.state() == PresentableState::Dismissed && entry.core().claim_teardown()
            })
            .map(|entry| entry.id())
            .collect();
        for id in pending {
            log::debug!("queueing teardown of entry #{}", id);
            self.scheduler.enqueue(Operation::Dismiss(DismissOp {
                root: id,
                order: None,
                position: 0,
                fade: None,
            }));
        }
    }

    /// Run queued operations until one parks on a pending future or the
    /// queue drains. Returns whether at least one operation completed.
    fn pump_operations(&mut self) -> bool {
        let mut progressed = false;
        while let Some(operation) = self.scheduler.take_next() {
            let finished = match operation {
                Operation::Present(mut op) => {
                    let done = self.step_present(&mut op);
                    if !done {
                        self.scheduler.park(Operation::Present(op));
                    }
                    done
                }
                Operation::Dismiss(mut op) => {
                    let done = self.step_dismiss(&mut op);
                    if !done {
                        self.scheduler.park(Operation::Dismiss(op));
                    }
                    done
                }
            };
            if finished {
                progressed = true;
            } else {
                break;
            }
        }
        progressed
    }

    fn step_present(&mut self, op: &mut PresentOp) -> bool {
        loop {
            let created = match &mut op.phase {
                PresentPhase::Creating(future) => scheduler::poll_once(future),
                PresentPhase::FadingIn(fade) => return scheduler::poll_once(fade).is_some(),
            };
            match created {
                None => return false,
                Some(Err(err)) => {
                    self.fail_present(op.id, err);
                    return true;
                }
                Some(Ok(view)) => match self.materialize(op.id, &op.args, op.dismiss_parent, view)
                {
                    Some(fade) => op.phase = PresentPhase::FadingIn(fade),
                    None => return true,
                },
            }
        }
    }

    /// Wire a freshly created view into its entry: close listener, scope,
    /// controller, the `Presented` transition and `on_present`. Returns the
    /// view's optional fade-in future.
    fn materialize(
        &mut self,
        id: EntryId,
        args: &Value,
        dismiss_parent: Option<EntryId>,
        mut view: Box<dyn View>,
    ) -> Option<BoxFuture<'static, ()>> {
        enum Materialized {
            Discarded,
            Fault(StackError),
            Ready(Option<BoxFuture<'static, ()>>),
        }

        let Some(kind) = self.collection.get(id).map(|entry| entry.kind()) else {
            let _ = view.dispose();
            return None;
        };

        let materialized = {
            let Some(entry) = self.collection.get_mut(id) else {
                let _ = view.dispose();
                return None;
            };
            if entry.core().is_dismissed() {
                // Dismissed while the pipeline was in flight; the pending
                // teardown operation resolves the completion signal.
                if let Err(err) = view.dispose() {
                    entry.push_error(err);
                }
                Materialized::Discarded
            } else {
                let core = entry.core().clone();
                let listener_core = core.clone();
                view.set_close_listener(Box::new(move || {
                    listener_core.request_dismiss(DismissReason::Requested, None);
                }));

                let ctx = entry.context();
                let mut scope = self.controller_factory.create_scope(kind);
                match self
                    .controller_factory
                    .create_controller(kind, &ctx, args, view.as_mut())
                {
                    Err(err) => {
                        if let Err(cleanup) = view.dispose() {
                            entry.push_error(cleanup);
                        }
                        if let Some(scope) = scope.as_mut() {
                            if let Err(cleanup) = scope.close() {
                                entry.push_error(cleanup);
                            }
                        }
                        Materialized::Fault(StackError::ControllerCreation(err))
                    }
                    Ok(mut controller) => {
                        let fade = view.transition_in();
                        core.mark_presented();
                        let presented = controller.on_present(&ctx);
                        entry.set_view(view);
                        entry.set_scope(scope);
                        entry.set_controller(controller);
                        match presented {
                            Ok(()) => Materialized::Ready(fade),
                            Err(err) => Materialized::Fault(StackError::Dismissal(err)),
                        }
                    }
                }
            }
        };

        match materialized {
            Materialized::Discarded => None,
            Materialized::Fault(err) => {
                self.fail_present(id, err);
                None
            }
            Materialized::Ready(fade) => {
                log::info!("entry #{} ({}) presented", id, kind);
                self.apply_structural_options(id, dismiss_parent);
                fade
            }
        }
    }

    /// Dismissals implied by the new entry's option flags, applied once it is
    /// actually presented.
    fn apply_structural_options(&self, id: EntryId, dismiss_parent: Option<EntryId>) {
        let Some(entry) = self.collection.get(id) else {
            return;
        };
        let options = entry.options();
        let kind = entry.kind();
        let root = self.collection.root_of(id);

        if options.contains(PresentOptions::DISMISS_ALL) {
            for other in self.collection.roots() {
                if other == root {
                    continue;
                }
                if let Some(other_entry) = self.collection.get(other) {
                    other_entry
                        .core()
                        .request_dismiss(DismissReason::Cancelled, None);
                }
            }
        }
        if let Some(parent) = dismiss_parent {
            if let Some(parent_entry) = self.collection.get(parent) {
                log::debug!("entry #{} replaces entry #{}", id, parent);
                parent_entry
                    .core()
                    .request_dismiss(DismissReason::Requested, None);
            }
        }
        if options.contains(PresentOptions::SINGLETON) {
            for other in self.collection.find_by_kind(kind) {
                if other == id {
                    continue;
                }
                if let Some(other_entry) = self.collection.get(other) {
                    other_entry
                        .core()
                        .request_dismiss(DismissReason::Cancelled, None);
                }
            }
        }
    }

    /// A present pipeline ended without materializing. `Cancelled` means the
    /// entry was dismissed by someone else mid-pipeline and needs nothing
    /// further; real faults mark the entry failed so its teardown resolves
    /// the completion signal accordingly.
    fn fail_present(&mut self, id: EntryId, err: StackError) {
        if matches!(err, StackError::Cancelled) {
            log::debug!("present of entry #{} cancelled mid-pipeline", id);
            return;
        }
        log::warn!("present of entry #{} failed: {}", id, err);
        let err = Arc::new(err);
        self.report(&err);
        if let Some(entry) = self.collection.get(id) {
            entry
                .core()
                .request_dismiss(DismissReason::Failed(err), None);
        }
    }

    fn step_dismiss(&mut self, op: &mut DismissOp) -> bool {
        if op.order.is_none() {
            let order = self.collection.teardown_order(op.root);
            log::debug!("tearing down subtree of entry #{}: {:?}", op.root, order);
            op.order = Some(order);
        }
        loop {
            if let Some(fade) = op.fade.as_mut() {
                if scheduler::poll_once(fade).is_none() {
                    return false;
                }
                op.fade = None;
                if let Some(id) = op
                    .order
                    .as_ref()
                    .and_then(|order| order.get(op.position).copied())
                {
                    self.dispose_entry(id);
                }
                op.position += 1;
            }
            let Some(id) = op
                .order
                .as_ref()
                .and_then(|order| order.get(op.position).copied())
            else {
                return true;
            };
            match self.begin_entry_dismiss(id, op.root) {
                Some(fade) => op.fade = Some(fade),
                None => {
                    self.dispose_entry(id);
                    op.position += 1;
                }
            }
        }
    }

    /// Start tearing one entry of a dismiss cascade down: propagate the
    /// root's reason and result, fire deactivation/dismissal hooks, and hand
    /// back the view's optional fade-out future.
    fn begin_entry_dismiss(
        &mut self,
        id: EntryId,
        root: EntryId,
    ) -> Option<BoxFuture<'static, ()>> {
        let cascade = if id == root {
            None
        } else {
            self.collection.get(root).map(|root_entry| {
                let core = root_entry.core();
                (
                    core.dismiss_reason().unwrap_or(DismissReason::Requested),
                    core.result(),
                )
            })
        };

        let entry = self.collection.get_mut(id)?;
        if entry.state() == PresentableState::Disposed {
            return None;
        }
        let core = entry.core().clone();
        if let Some((reason, result)) = cascade {
            core.request_dismiss(reason, result);
            // The cascade covers this entry; no separate teardown operation.
            core.claim_teardown();
        }

        let ctx = entry.context();
        if core.claim_dismiss_hook() {
            if core.dismiss_prior() == Some(PresentableState::Active) {
                fire_hook(entry, &ctx, |controller, ctx| controller.on_deactivate(ctx));
            }
            fire_hook(entry, &ctx, |controller, ctx| controller.on_dismiss(ctx));
        }
        entry.view_mut().and_then(|view| view.transition_out())
    }

    /// Release an entry's controller, view and scope, accumulating errors,
    /// and resolve its completion signal. Safe to call twice; the second call
    /// is a no-op.
    fn dispose_entry(&mut self, id: EntryId) {
        let factory = self.controller_factory.clone();
        let teardown_failure = {
            let Some(entry) = self.collection.get_mut(id) else {
                return;
            };
            if entry.state() == PresentableState::Disposed {
                return;
            }
            if let Some(controller) = entry.take_controller() {
                if let Err(err) = factory.release_controller(controller) {
                    entry.push_error(err);
                }
            }
            if let Some(mut view) = entry.take_view() {
                if let Err(err) = view.dispose() {
                    entry.push_error(err);
                }
            }
            if let Some(mut scope) = entry.take_scope() {
                if let Err(err) = scope.close() {
                    entry.push_error(err);
                }
            }
            let errors = entry.take_errors();
            let had_teardown_errors = !errors.is_empty();
            let core = entry.core().clone();
            core.set_state(PresentableState::Disposed);
            let failure = core.resolve_on_dispose(errors);
            log::debug!("entry #{} disposed", id);
            // Pipeline faults were already reported when they happened; only
            // fresh teardown errors go to the side channel here.
            if had_teardown_errors { failure } else { None }
        };
        if let Some(err) = teardown_failure {
            self.report(&err);
        }
    }

    /// Per-entry portion of the tick: activation bookkeeping, elapsed time,
    /// the controller's update, and due timers.
    fn update_entry(&mut self, index: usize, frame_time: Duration, is_top: bool) {
        let mut tick_faults: Vec<anyhow::Error> = Vec::new();
        {
            let Some(entry) = self.collection.at_mut(index) else {
                return;
            };
            let state = entry.state();
            if !matches!(
                state,
                PresentableState::Presented | PresentableState::Active
            ) {
                return;
            }
            let ctx = entry.context();

            if is_top && state == PresentableState::Presented {
                entry.core().set_state(PresentableState::Active);
                if let Some(controller) = entry.controller_mut() {
                    if let Err(err) = controller.on_activate(&ctx) {
                        tick_faults.push(err);
                    }
                }
            } else if !is_top && state == PresentableState::Active {
                entry.core().set_state(PresentableState::Presented);
                if let Some(controller) = entry.controller_mut() {
                    if let Err(err) = controller.on_deactivate(&ctx) {
                        tick_faults.push(err);
                    }
                }
            }

            entry.core().advance_elapsed(frame_time);
            if let Some(controller) = entry.controller_mut() {
                if let Err(err) = controller.update(&ctx, frame_time) {
                    tick_faults.push(err);
                }
            }
            for callback in entry.core().advance_timers(frame_time) {
                callback(&ctx);
            }
        }
        for err in tick_faults {
            let err = StackError::Tick(err);
            log::warn!("{}", err);
            self.report(&err);
        }
    }

    fn report(&self, err: &StackError) {
        if let Some(callback) = &self.error_callback {
            callback(err);
        }
    }
}

/// Run a controller lifecycle hook, accumulating a failure into the entry's
/// teardown error list. Entries without a controller no-op.
fn fire_hook(
    entry: &mut Presentable,
    ctx: &PresentContext,
    hook: impl FnOnce(&mut dyn Controller, &PresentContext) -> anyhow::Result<()>,
) {
    let result = match entry.controller_mut() {
        Some(controller) => hook(controller, ctx),
        None => Ok(()),
    };
    if let Err(err) = result {
        entry.push_error(err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;

    struct NullView;

    impl View for NullView {
        fn dispose(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct NullViewFactory;

    #[async_trait]
    impl ViewFactory for NullViewFactory {
        async fn create_view(&self, _request: &ViewRequest) -> Result<Box<dyn View>> {
            Ok(Box::new(NullView))
        }
    }

    struct NullController;

    impl Controller for NullController {}

    struct NullControllerFactory;

    impl ControllerFactory for NullControllerFactory {
        fn create_controller(
            &self,
            _kind: ControllerKind,
            _ctx: &PresentContext,
            _args: &Value,
            _view: &mut dyn View,
        ) -> Result<Box<dyn Controller>> {
            Ok(Box::new(NullController))
        }
    }

    const SCREEN: ControllerKind = ControllerKind("screen");

    fn presenter() -> Presenter {
        Presenter::builder(NullViewFactory, NullControllerFactory)
            .register(ControllerDescriptor::new(SCREEN))
            .build()
    }

    #[test]
    fn unknown_kind_is_a_synchronous_usage_fault() {
        let mut presenter = presenter();
        let err = presenter.present(ControllerKind("nowhere")).unwrap_err();
        assert!(matches!(err, StackError::UnknownControllerKind(_)));
        assert!(presenter.is_empty());
    }

    #[test]
    fn exclusive_popup_combination_is_rejected() {
        let mut presenter = presenter();
        let err = presenter
            .present_with(
                SCREEN,
                Value::Null,
                PresentOptions::EXCLUSIVE | PresentOptions::POPUP,
                None,
            )
            .unwrap_err();
        assert!(matches!(err, StackError::InvalidOptions(_)));
    }

    #[test]
    fn disposed_presenter_rejects_presents() {
        let mut presenter = presenter();
        presenter.dispose();
        let err = presenter.present(SCREEN).unwrap_err();
        assert!(matches!(err, StackError::PresenterDisposed));
    }

    #[test]
    fn handle_debug_reports_the_entry() {
        let mut presenter = presenter();
        let handle = presenter.present(SCREEN).unwrap();
        let text = format!("{:?}", handle);
        assert!(text.contains("id: 1"));
        assert!(text.contains("screen"));
    }

    #[test]
    fn parent_handle_from_another_presenter_is_rejected() {
        let mut first = presenter();
        let mut second = presenter();
        let foreign = first.present(SCREEN).unwrap();
        let err = second
            .present_with(SCREEN, Value::Null, PresentOptions::CHILD, Some(&foreign))
            .unwrap_err();
        assert!(matches!(err, StackError::ForeignParent(_)));
    }
}
