//! Core engine for the **trellis** view framework.
//!
//! `trellis-core` provides the composite view engine, the template manager,
//! and the pub/sub mediator that power a trellis application. Views own
//! trees of child views, declare the templates they render with, and talk
//! to each other over named mediator channels instead of direct references.
//!
//! # Key types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`CompositeView`] | A view owning a subtree of children and a render pipeline |
//! | [`ViewState`] | Per-view behavior: template declaration, data, lifecycle hooks |
//! | [`ViewEnv`] | Injected services: mediator, template manager, compiler |
//! | [`TemplateManager`] | Caching, deduplicating front end over a [`TemplateSource`] |
//! | [`Mediator`] | Channel-based pub/sub decoupling publishers from subscribers |
//! | [`Element`] | The document seam the engine renders into |
//! | [`TestElement`](testing::TestElement) | In-memory element for tests |
//!
//! # Architecture
//!
//! 1. **mount** -- [`CompositeView::mount`] runs the init hooks and, unless
//!    the root element already carries server-rendered markup, kicks off a
//!    render pass.
//! 2. **fetch** -- The view's [`TemplateQuery`] goes through the
//!    [`TemplateManager`], which caches fetches per id and deduplicates
//!    concurrent requests for the same template.
//! 3. **populate** -- Old subviews are torn down, the compile function
//!    turns template + data + partials into markup, and the markup is
//!    mounted on the root element.
//! 4. **events** -- Render and dispose transitions are published on
//!    mediator channels, so parents prune disposed children automatically
//!    and external observers can watch the view tree.
//!
//! # Quick example
//!
//! ```ignore
//! use std::sync::Arc;
//! use trellis_core::{
//!     CompositeView, InlineSource, TemplateManager, TemplateQuery, ViewEnv, ViewState,
//! };
//!
//! struct TaskList;
//!
//! impl ViewState for TaskList {
//!     fn templates(&self) -> Option<TemplateQuery> {
//!         Some(TemplateQuery::from(vec!["list", "list/row"]))
//!     }
//! }
//!
//! # async fn demo(root: trellis_core::ElementRef) {
//! let source = InlineSource::preloaded([
//!     ("list", "<ul>{{> row }}</ul>"),
//!     ("list/row", "<li>x</li>"),
//! ]);
//! let env = ViewEnv::new(Arc::new(TemplateManager::new(Arc::new(source))));
//! let view = CompositeView::mount(TaskList, root, env).await?;
//! # }
//! ```

use std::sync::{Mutex, MutexGuard};

pub mod compile;
pub mod element;
pub mod event;
pub mod mediator;
pub mod template;
pub mod testing;
pub mod view;

pub use compile::{default_compiler, interpolate, Compiler, Partials, TemplateData};
pub use element::{Element, ElementRef};
pub use event::{channels, ViewEvent, ViewId};
pub use mediator::{Mediator, SubscriptionToken};
pub use template::{
    EmbeddedSource, HttpError, HttpFetch, InlineSource, LoadedTemplates, RemoteSource,
    TemplateContent, TemplateError, TemplateManager, TemplateQuery, TemplateSource,
};
pub use view::{
    as_subview, spawn_render, CompositeView, PostInit, Subview, SubviewHandle, ViewCore, ViewEnv,
    ViewOptions, ViewRef, ViewState,
};

/// Lock a mutex, recovering the guard if a previous holder panicked. The
/// engine's shared state stays usable after a poisoned lock.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|err| err.into_inner())
}
