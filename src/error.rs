use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::controller::ControllerKind;
use crate::options::PresentOptions;
use crate::presentable::EntryId;

/// Faults raised by the presentation stack.
///
/// Usage faults (`PresenterDisposed`, `UnknownControllerKind`,
/// `InvalidOptions`, `ForeignParent`) are returned synchronously from the
/// call site. Pipeline and teardown faults surface through an entry's
/// completion outcome instead.
#[derive(Debug)]
pub enum StackError {
    /// The presenter has been disposed; no structural calls are accepted.
    PresenterDisposed,

    /// The controller kind was never registered with the builder.
    UnknownControllerKind(ControllerKind),

    /// Mutually exclusive option flags were combined.
    InvalidOptions(PresentOptions),

    /// The parent handle does not refer to a live entry in this presenter.
    ForeignParent(EntryId),

    /// A middleware aborted the present pipeline.
    Middleware(anyhow::Error),

    /// The view factory failed or produced an unusable view.
    ViewCreation(anyhow::Error),

    /// The controller factory failed.
    ControllerCreation(anyhow::Error),

    /// The operation was cancelled before it could complete.
    Cancelled,

    /// An error supplied to `dismiss_with_error`, carried to the completion
    /// signal of the entry and its cascaded children.
    Dismissal(anyhow::Error),

    /// A controller's per-tick update or activation hook failed. Reported
    /// through the side-channel callback only; the entry stays presented.
    Tick(anyhow::Error),

    /// Aggregate of all errors accumulated while tearing an entry down.
    Teardown(Vec<anyhow::Error>),
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PresenterDisposed => write!(f, "presenter has been disposed"),
            Self::UnknownControllerKind(kind) => {
                write!(f, "controller kind {:?} is not registered", kind)
            }
            Self::InvalidOptions(options) => {
                write!(f, "invalid present option combination: {:?}", options)
            }
            Self::ForeignParent(id) => {
                write!(f, "parent handle #{} is not a live entry of this presenter", id)
            }
            Self::Middleware(err) => write!(f, "middleware aborted present: {}", err),
            Self::ViewCreation(err) => write!(f, "view creation failed: {}", err),
            Self::ControllerCreation(err) => write!(f, "controller creation failed: {}", err),
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::Dismissal(err) => write!(f, "entry dismissed with error: {}", err),
            Self::Tick(err) => write!(f, "controller tick fault: {}", err),
            Self::Teardown(errors) => {
                write!(f, "teardown completed with {} error(s):", errors.len())?;
                for err in errors {
                    write!(f, " [{}]", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for StackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Middleware(err)
            | Self::ViewCreation(err)
            | Self::ControllerCreation(err)
            | Self::Dismissal(err)
            | Self::Tick(err) => Some(err.as_ref()),
            Self::Teardown(errors) => errors
                .first()
                .map(|err| -> &(dyn std::error::Error + 'static) { err.as_ref() }),
            _ => None,
        }
    }
}

/// How an entry's completion signal resolved. Cloneable so any number of
/// handle clones can observe the same resolution.
#[derive(Debug, Clone)]
pub enum PresentOutcome {
    /// Dismissed normally; carries the entry's result slot (`Null` if unset).
    Completed(Value),

    /// Dismissed without ever presenting, explicitly cancelled, or torn down
    /// destructively.
    Cancelled,

    /// The pipeline faulted or teardown accumulated errors.
    Failed(Arc<StackError>),
}

impl PresentOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Why an entry is being dismissed. Cascaded verbatim to all descendants so
/// a whole subtree resolves with the same reason.
#[derive(Debug, Clone)]
pub enum DismissReason {
    /// Ordinary dismissal; the entry resolves with its result slot.
    Requested,

    /// Explicit cancel or destructive teardown.
    Cancelled,

    /// Dismissed because of an error; the subtree resolves failed.
    Failed(Arc<StackError>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teardown_display_lists_all_errors() {
        let err = StackError::Teardown(vec![
            anyhow::anyhow!("scope close failed"),
            anyhow::anyhow!("view dispose failed"),
        ]);
        let text = err.to_string();
        assert!(text.contains("2 error(s)"));
        assert!(text.contains("scope close failed"));
        assert!(text.contains("view dispose failed"));
    }

    #[test]
    fn source_chains_to_first_cause() {
        let err = StackError::ViewCreation(anyhow::anyhow!("resource missing"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
