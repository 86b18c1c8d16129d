//! A presentation-stack manager: screens, popups and overlays as entries of
//! an ordered stack, each a controller/view pair with an explicit lifecycle.
//!
//! The [`Presenter`] is the facade. Hosts supply a [`ViewFactory`] and a
//! [`ControllerFactory`], register controller kinds through the
//! [`PresenterBuilder`], then drive the stack by calling
//! [`Presenter::update`] once per frame. Present calls return a
//! [`PresentHandle`] whose completion signal resolves when the entry is
//! eventually torn down.

pub mod builder;
pub mod collection;
pub mod command;
pub mod controller;
pub mod error;
pub mod middleware;
pub mod options;
pub mod presentable;
pub mod presenter;
mod scheduler;
pub mod view;

pub use builder::PresenterBuilder;
pub use collection::PresentableCollection;
pub use command::CommandOutcome;
pub use controller::{
    Controller, ControllerDescriptor, ControllerFactory, ControllerKind, Scope,
};
pub use error::{DismissReason, PresentOutcome, StackError};
pub use middleware::{Middleware, PresentRequest};
pub use options::PresentOptions;
pub use presentable::{
    CompletionFuture, EntryId, PresentContext, Presentable, PresentableState,
};
pub use presenter::{ErrorCallback, PresentHandle, Presenter};
pub use view::{CloseListener, View, ViewFactory, ViewRequest};
