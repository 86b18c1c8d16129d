use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::controller::{ControllerDescriptor, ControllerFactory, ControllerKind};
use crate::error::StackError;
use crate::middleware::{Middleware, MiddlewareChain};
use crate::presenter::{ErrorCallback, Presenter};
use crate::view::ViewFactory;

/// Fluent configuration for a [`Presenter`].
///
/// Controller kinds must be registered here; presenting an unregistered kind
/// is a synchronous usage fault. Middleware runs in registration order on
/// every present.
pub struct PresenterBuilder {
    view_factory: Arc<dyn ViewFactory>,
    controller_factory: Arc<dyn ControllerFactory>,
    middleware: Vec<Arc<dyn Middleware>>,
    descriptors: Vec<ControllerDescriptor>,
    error_callback: Option<ErrorCallback>,
    default_args: Value,
}

impl PresenterBuilder {
    pub fn new(
        view_factory: impl ViewFactory + 'static,
        controller_factory: impl ControllerFactory + 'static,
    ) -> Self {
        Self {
            view_factory: Arc::new(view_factory),
            controller_factory: Arc::new(controller_factory),
            middleware: Vec::new(),
            descriptors: Vec::new(),
            error_callback: None,
            default_args: Value::Null,
        }
    }

    /// Register a controller kind. Registering the same kind twice keeps the
    /// last descriptor.
    pub fn register(mut self, descriptor: ControllerDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Append a middleware to the present pipeline.
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Side-channel callback for faults with no caller to return to.
    pub fn on_error(mut self, callback: impl Fn(&StackError) + Send + 'static) -> Self {
        self.error_callback = Some(Box::new(callback));
        self
    }

    /// Arguments substituted when `present` is called without any.
    pub fn default_args(mut self, args: Value) -> Self {
        self.default_args = args;
        self
    }

    pub fn build(self) -> Presenter {
        let mut descriptors: HashMap<ControllerKind, ControllerDescriptor> = HashMap::new();
        for descriptor in self.descriptors {
            descriptors.insert(descriptor.kind, descriptor);
        }
        Presenter::new(
            self.view_factory,
            self.controller_factory,
            MiddlewareChain::new(self.middleware),
            descriptors,
            self.error_callback,
            self.default_args,
        )
    }
}
