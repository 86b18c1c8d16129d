use std::collections::VecDeque;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::StackError;
use crate::presentable::EntryId;
use crate::view::View;

/// The awaitable part of a present pipeline: middleware chain, then the view
/// factory, with cancellation checkpoints after each await.
pub(crate) type ViewCreation = BoxFuture<'static, Result<Box<dyn View>, StackError>>;

pub(crate) enum PresentPhase {
    /// Running middleware + view factory.
    Creating(ViewCreation),

    /// Entry materialized; awaiting the view's optional fade-in hook.
    FadingIn(BoxFuture<'static, ()>),
}

pub(crate) struct PresentOp {
    pub id: EntryId,
    pub args: Value,
    /// Set for `DISMISS_CURRENT`: the enclosing entry to dismiss once this
    /// one is presented.
    pub dismiss_parent: Option<EntryId>,
    pub phase: PresentPhase,
}

pub(crate) struct DismissOp {
    pub root: EntryId,
    /// Teardown sequence (children-first post-order), computed when the
    /// operation actually starts so it observes the collection as-is.
    pub order: Option<Vec<EntryId>>,
    pub position: usize,
    /// Fade-out hook of the entry currently being torn down.
    pub fade: Option<BoxFuture<'static, ()>>,
}

pub(crate) enum Operation {
    Present(PresentOp),
    Dismiss(DismissOp),
}

impl Operation {
    pub(crate) fn entry_id(&self) -> EntryId {
        match self {
            Operation::Present(op) => op.id,
            Operation::Dismiss(op) => op.root,
        }
    }
}

/// FIFO single-flight queue of stack-mutating operations.
///
/// At most one operation is in flight; the next is dequeued only once the
/// current one completes, whether it succeeded, failed or was cancelled. The
/// presenter drives the in-flight operation from its tick; a failing
/// operation is simply completed-with-failure and never stalls the queue.
#[derive(Default)]
pub(crate) struct OperationScheduler {
    queue: VecDeque<Operation>,
    in_flight: Option<Operation>,
}

impl OperationScheduler {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn enqueue(&mut self, operation: Operation) {
        self.queue.push_back(operation);
    }

    /// Take the operation to drive this step: the in-flight one if parked,
    /// otherwise the head of the queue.
    pub(crate) fn take_next(&mut self) -> Option<Operation> {
        self.in_flight.take().or_else(|| self.queue.pop_front())
    }

    /// Park a still-pending operation as in-flight.
    pub(crate) fn park(&mut self, operation: Operation) {
        debug_assert!(self.in_flight.is_none());
        self.in_flight = Some(operation);
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.queue.is_empty()
    }

    /// Drop everything without running it. Used by destructive presenter
    /// disposal; completion signals are resolved by the disposal passes.
    pub(crate) fn clear(&mut self) {
        self.queue.clear();
        self.in_flight = None;
    }
}

/// Poll a stored future once with a noop waker. The tick loop re-polls every
/// frame, so readiness never depends on a real waker.
pub(crate) fn poll_once<T>(future: &mut BoxFuture<'static, T>) -> Option<T> {
    let waker = futures::task::noop_waker();
    let mut cx = Context::from_waker(&waker);
    match future.as_mut().poll(&mut cx) {
        Poll::Ready(value) => Some(value),
        Poll::Pending => None,
    }
}
