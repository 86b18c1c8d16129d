use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::options::PresentOptions;
use crate::presentable::EntryId;

/// Callback invoked by a view when it is closed from outside the stack
/// (window manager, user gesture, engine-side destruction). The stack maps
/// this to an ordinary dismissal request for the owning entry.
pub type CloseListener = Box<dyn Fn() + Send + Sync>;

/// Opaque view handle produced by the host's [`ViewFactory`].
///
/// The stack only manages the view's lifecycle; how it renders is entirely
/// the host's business. All methods except `dispose` are optional
/// capabilities with no-op defaults.
pub trait View: Send {
    /// Release the view. Called exactly once during entry teardown.
    fn dispose(&mut self) -> Result<()>;

    /// Register the external-close notification. Views that cannot be closed
    /// externally may ignore the listener.
    fn set_close_listener(&mut self, _listener: CloseListener) {}

    /// Optional async fade-in hook, awaited after the entry is presented.
    fn transition_in(&mut self) -> Option<BoxFuture<'static, ()>> {
        None
    }

    /// Optional async fade-out hook, awaited before the entry is disposed.
    fn transition_out(&mut self) -> Option<BoxFuture<'static, ()>> {
        None
    }
}

/// Everything the view factory needs to materialize a view for an entry.
#[derive(Debug, Clone)]
pub struct ViewRequest {
    /// Descriptor override, or the controller kind name by convention.
    pub resource_key: String,

    /// Layer the entry was registered on.
    pub layer: i32,

    /// Stacking position among same-layer entries, assigned at present time.
    pub z_index: usize,

    /// Option flags of the present call.
    pub options: PresentOptions,

    /// Entry id of the parent, for hosts that nest view transforms.
    pub parent: Option<EntryId>,
}

/// Asynchronously produces view handles. Treated as a stateless service:
/// every call is independently awaitable and may fail.
#[async_trait]
pub trait ViewFactory: Send + Sync {
    async fn create_view(&self, request: &ViewRequest) -> Result<Box<dyn View>>;
}
