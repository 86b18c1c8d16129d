use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::controller::ControllerKind;
use crate::options::PresentOptions;
use crate::presentable::EntryId;

/// Metadata of an admitted present call, handed to each middleware before the
/// entry is materialized.
#[derive(Debug, Clone)]
pub struct PresentRequest {
    pub id: EntryId,
    pub kind: ControllerKind,
    pub args: Value,
    pub options: PresentOptions,
    pub layer: i32,
    pub tag: i64,
    pub parent: Option<EntryId>,
}

/// Async interceptor run before every present completes. An error aborts the
/// remaining chain and fails that present; sibling entries are unaffected.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn on_present(&self, request: &PresentRequest) -> Result<()>;
}

/// Ordered list of middleware, consulted in registration order.
#[derive(Clone, Default)]
pub(crate) struct MiddlewareChain {
    middleware: Vec<std::sync::Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub(crate) fn new(middleware: Vec<std::sync::Arc<dyn Middleware>>) -> Self {
        Self { middleware }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &std::sync::Arc<dyn Middleware>> {
        self.middleware.iter()
    }
}
