use std::fmt;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;

use crate::presentable::PresentContext;
use crate::view::View;

/// Explicit type tag identifying a controller kind.
///
/// Kinds are registered with the [`crate::PresenterBuilder`] via a
/// [`ControllerDescriptor`]; presenting an unregistered kind is a synchronous
/// usage fault. This replaces runtime type introspection with a static
/// association made at registration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerKind(pub &'static str);

impl ControllerKind {
    pub fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Static registration record for a controller kind.
#[derive(Debug, Clone)]
pub struct ControllerDescriptor {
    pub kind: ControllerKind,

    /// Explicit view resource key; defaults to the kind name.
    pub resource_key: Option<String>,

    /// Z-grouping layer for entries of this kind.
    pub layer: i32,

    /// Free-form classification tag, not unique.
    pub tag: i64,
}

impl ControllerDescriptor {
    pub fn new(kind: ControllerKind) -> Self {
        Self {
            kind,
            resource_key: None,
            layer: 0,
            tag: 0,
        }
    }

    pub fn resource_key(mut self, key: impl Into<String>) -> Self {
        self.resource_key = Some(key.into());
        self
    }

    pub fn layer(mut self, layer: i32) -> Self {
        self.layer = layer;
        self
    }

    pub fn tag(mut self, tag: i64) -> Self {
        self.tag = tag;
        self
    }

    /// Resolve the view resource key: explicit override wins, otherwise the
    /// kind name by convention.
    pub fn resolved_resource_key(&self) -> String {
        self.resource_key
            .clone()
            .unwrap_or_else(|| self.kind.name().to_string())
    }
}

/// A screen controller. Every method is an optional capability with a no-op
/// default; a controller participates in a lifecycle event by overriding it.
///
/// Errors returned from lifecycle hooks never crash the stack: present-time
/// errors abort that entry's pipeline, teardown errors are accumulated into
/// the entry's completion outcome, and per-tick errors are reported through
/// the presenter's side-channel error callback.
pub trait Controller: Send {
    /// Fired when the entry transitions `Initialized -> Presented`.
    fn on_present(&mut self, _ctx: &PresentContext) -> Result<()> {
        Ok(())
    }

    /// Fired when the entry becomes the topmost non-dismissed entry.
    fn on_activate(&mut self, _ctx: &PresentContext) -> Result<()> {
        Ok(())
    }

    /// Fired when the entry is no longer topmost, or just before dismissal
    /// of an active entry.
    fn on_deactivate(&mut self, _ctx: &PresentContext) -> Result<()> {
        Ok(())
    }

    /// Fired once when the entry is dismissed, before its children's
    /// disposal completes the cascade.
    fn on_dismiss(&mut self, _ctx: &PresentContext) -> Result<()> {
        Ok(())
    }

    /// Per-tick update, forwarded only while Presented or Active.
    fn update(&mut self, _ctx: &PresentContext, _frame_time: Duration) -> Result<()> {
        Ok(())
    }

    /// Return true to consume a routed command and stop propagation.
    fn handle_command(&mut self, _ctx: &PresentContext, _name: &str, _args: &Value) -> bool {
        false
    }
}

/// Scoped service-resolution context opened around a controller's
/// construction and closed during the entry's teardown.
pub trait Scope: Send {
    fn close(&mut self) -> Result<()>;
}

/// Builds and releases controllers. Treated as a stateless service from the
/// stack's perspective.
pub trait ControllerFactory: Send + Sync {
    /// Construct a controller for a freshly created view. The entry is in
    /// state `Initialized` and transitions to `Presented` once this returns.
    fn create_controller(
        &self,
        kind: ControllerKind,
        ctx: &PresentContext,
        args: &Value,
        view: &mut dyn View,
    ) -> Result<Box<dyn Controller>>;

    /// Open an optional resolution scope for the controller's lifetime.
    fn create_scope(&self, _kind: ControllerKind) -> Option<Box<dyn Scope>> {
        None
    }

    /// Release hook invoked with the controller during teardown.
    fn release_controller(&self, _controller: Box<dyn Controller>) -> Result<()> {
        Ok(())
    }
}
