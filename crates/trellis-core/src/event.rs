use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identity of a view instance, assigned at construction.
///
/// Ids are process-unique and never reused; the subview table and the
/// per-view dispose channel are keyed by them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u64);

impl ViewId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ViewId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle events published by the view engine on its mediator.
///
/// The payload identifies the view by [`ViewId`]; subscribers that need the
/// view itself hold their own handle to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewEvent {
    /// A render pass is starting (before teardown and HTML generation).
    RenderStart(ViewId),
    /// A render pass finished (new markup is mounted, hooks have run).
    RenderEnd(ViewId),
    /// The view was disposed.
    Dispose(ViewId),
}

impl ViewEvent {
    /// The view this event concerns.
    pub fn view_id(&self) -> ViewId {
        match self {
            ViewEvent::RenderStart(id) | ViewEvent::RenderEnd(id) | ViewEvent::Dispose(id) => *id,
        }
    }
}

/// Channel names used by the view engine.
pub mod channels {
    use super::ViewId;

    /// Published at the start of every render pass.
    pub const RENDER_START: &str = "render:start";

    /// Published at the end of every render pass.
    pub const RENDER_END: &str = "render:end";

    /// Per-view channel published once when the view is disposed. Parents
    /// watch their children's dispose channels to prune their subview
    /// tables.
    pub fn dispose(id: ViewId) -> String {
        format!("dispose:{id}")
    }
}
