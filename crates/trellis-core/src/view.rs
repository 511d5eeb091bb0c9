use std::collections::HashMap;
use std::mem;
use std::sync::{Arc, Mutex};

use crate::compile::{self, Compiler, Partials, TemplateData};
use crate::element::ElementRef;
use crate::event::{channels, ViewEvent, ViewId};
use crate::lock;
use crate::mediator::{Mediator, SubscriptionToken};
use crate::template::{
    LoadedTemplates, TemplateContent, TemplateError, TemplateManager, TemplateQuery,
};

/// Shared services injected into every view at construction.
///
/// There are no process globals: the mediator, template manager, and compile
/// function are explicit, cloneable handles, so tests (and multi-tenant
/// hosts) run isolated instances side by side.
#[derive(Clone)]
pub struct ViewEnv {
    /// Lifecycle event bus shared by views built from this env.
    pub mediator: Arc<Mediator<ViewEvent>>,
    /// Template cache shared by views built from this env.
    pub templates: Arc<TemplateManager>,
    /// Compile function turning `(template, data, partials)` into markup.
    pub compiler: Compiler,
}

impl ViewEnv {
    /// Create an env around a template manager, with a fresh mediator and
    /// the default interpolating compiler.
    pub fn new(templates: Arc<TemplateManager>) -> Self {
        Self {
            mediator: Arc::new(Mediator::new()),
            templates,
            compiler: compile::default_compiler(),
        }
    }

    /// Share an existing mediator instead of a fresh one.
    pub fn with_mediator(mut self, mediator: Arc<Mediator<ViewEvent>>) -> Self {
        self.mediator = mediator;
        self
    }

    /// Replace the compile function.
    pub fn with_compiler(mut self, compiler: Compiler) -> Self {
        self.compiler = compiler;
        self
    }
}

/// Presentation knobs for a view, mainly around the loading indicator.
#[derive(Debug, Clone)]
pub struct ViewOptions {
    /// CSS class of the loader element injected by
    /// [`show_loading`](ViewCore::show_loading).
    pub loader_class: String,
    /// CSS class added to the root element while loading.
    pub loading_class: String,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            loader_class: "loader".to_string(),
            loading_class: "loading".to_string(),
        }
    }
}

/// What [`ViewState::post_init`] wants the engine to do next.
pub enum PostInit {
    /// Run a render pass right away (the default).
    Render,
    /// Leave the view unrendered; the caller will render explicitly.
    Defer,
}

/// Per-view behavior plugged into a [`CompositeView`].
///
/// All methods have defaults, so a unit struct is a valid (empty, inert)
/// view. Hooks receive the engine-owned [`ViewCore`] so they can add
/// subviews, query the element tree, or subscribe to channels.
///
/// # Lifecycle
///
/// ```text
/// mount ── on_init ──┬─ root has markup ── on_ready ── on_rendered
///                    └─ root blank ─────── post_init ──(Render)── render()
///
/// render ── load templates ── pre_render ── teardown subviews
///        ── compile ── mount markup ── on_rendered
/// ```
pub trait ViewState: Send + 'static {
    /// Template declaration: one identifier, a list (first entry is the
    /// main template, the rest become partials), or `None` for an empty
    /// view whose render just clears the root element.
    fn templates(&self) -> Option<TemplateQuery> {
        None
    }

    /// Data handed to the compile function on each render.
    fn data(&self, core: &ViewCore) -> TemplateData {
        let _ = core;
        TemplateData::new()
    }

    /// Extra partials merged over the ones derived from the template list.
    /// On a key collision these win.
    fn partials(&self) -> Partials {
        Partials::new()
    }

    /// Runs first during mount, before the readiness check.
    fn on_init(&mut self, core: &mut ViewCore) {
        let _ = core;
    }

    /// Runs during mount when the root element is blank. The default asks
    /// the engine to render.
    fn post_init(&mut self, core: &mut ViewCore) -> PostInit {
        let _ = core;
        PostInit::Render
    }

    /// Runs during mount when the root element already carries markup
    /// (server-rendered or otherwise prepared content).
    fn on_ready(&mut self, core: &mut ViewCore) {
        let _ = core;
    }

    /// Runs at the start of every render pass, before subview teardown.
    fn pre_render(&mut self, core: &mut ViewCore) {
        let _ = core;
    }

    /// Runs after markup is mounted: on every render pass, and once during
    /// a prerendered mount.
    fn on_rendered(&mut self, core: &mut ViewCore) {
        let _ = core;
    }

    /// Runs when the view is disposed, before subviews are closed.
    fn on_dispose(&mut self, core: &mut ViewCore) {
        let _ = core;
    }
}

/// Object-safe surface a parent needs from a child view.
///
/// [`CompositeView`] implements this; tests and adapters can implement it
/// for lighter-weight children.
pub trait Subview: Send {
    /// Unique identity of this view.
    fn view_id(&self) -> ViewId;

    /// The view's root element.
    fn root(&self) -> ElementRef;

    /// Tear the view down. Must be idempotent and must publish the view's
    /// dispose channel exactly once so parents can prune their tables.
    fn dispose(&mut self);

    /// Whether the view has been disposed.
    fn is_disposed(&self) -> bool;

    /// Dispose and detach the root element from the document.
    fn remove(&mut self) {
        self.dispose();
        self.root().detach();
    }
}

/// Shared handle to a child view.
pub type SubviewHandle = Arc<Mutex<dyn Subview>>;

/// Shared handle to a mounted [`CompositeView`].
pub type ViewRef<S> = Arc<Mutex<CompositeView<S>>>;

/// Coerce a typed view handle into the object-safe [`SubviewHandle`] a
/// parent's subview table stores.
pub fn as_subview<S: ViewState>(view: &ViewRef<S>) -> SubviewHandle {
    view.clone() as SubviewHandle
}

struct SubviewEntry {
    view: SubviewHandle,
    /// Once-subscription on the child's dispose channel; cancelled when the
    /// child is closed through the parent instead.
    watcher: SubscriptionToken,
}

type SubviewTable = Arc<Mutex<HashMap<ViewId, SubviewEntry>>>;

/// Engine-owned state of a view: root element, services, subview table,
/// selector cache, and recorded mediator subscriptions.
///
/// Hooks receive `&mut ViewCore` and drive subview management and element
/// queries through it.
pub struct ViewCore {
    id: ViewId,
    el: ElementRef,
    env: ViewEnv,
    options: ViewOptions,
    subviews: SubviewTable,
    selector_cache: HashMap<String, Vec<ElementRef>>,
    tokens: Vec<SubscriptionToken>,
    loading: bool,
    disposed: bool,
}

impl ViewCore {
    fn new(el: ElementRef, env: ViewEnv, options: ViewOptions) -> Self {
        Self {
            id: ViewId::next(),
            el,
            env,
            options,
            subviews: Arc::new(Mutex::new(HashMap::new())),
            selector_cache: HashMap::new(),
            tokens: Vec::new(),
            loading: false,
            disposed: false,
        }
    }

    /// This view's identity.
    pub fn id(&self) -> ViewId {
        self.id
    }

    /// The view's root element.
    pub fn el(&self) -> &ElementRef {
        &self.el
    }

    /// The services this view was constructed with.
    pub fn env(&self) -> &ViewEnv {
        &self.env
    }

    /// Whether the view has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // --- element-selector cache ---------------------------------------

    /// Query `selector` scoped to this view's root, memoizing the result
    /// for the lifetime of the current render.
    pub fn find(&mut self, selector: &str) -> Vec<ElementRef> {
        if let Some(hit) = self.selector_cache.get(selector) {
            return hit.clone();
        }
        let matches = self.el.query(selector);
        self.selector_cache
            .insert(selector.to_string(), matches.clone());
        matches
    }

    /// Drop one memoized selector result.
    pub fn evict_cached(&mut self, selector: &str) {
        self.selector_cache.remove(selector);
    }

    /// Drop every memoized selector result. Stale handles after a markup
    /// replacement are unsafe, so every render pass does this.
    pub fn clear_cache(&mut self) {
        self.selector_cache.clear();
    }

    // --- mediator subscriptions ---------------------------------------

    /// Subscribe this view to a channel. The subscription is cancelled
    /// automatically when the view is disposed.
    pub fn subscribe(
        &mut self,
        channel: impl Into<String>,
        handler: impl FnMut(&ViewEvent) + Send + 'static,
    ) -> SubscriptionToken {
        let token = self.env.mediator.subscribe(channel, handler);
        self.tokens.push(token);
        token
    }

    /// Like [`subscribe`](Self::subscribe), but for a single publish.
    pub fn subscribe_once(
        &mut self,
        channel: impl Into<String>,
        handler: impl FnMut(&ViewEvent) + Send + 'static,
    ) -> SubscriptionToken {
        let token = self.env.mediator.subscribe_once(channel, handler);
        self.tokens.push(token);
        token
    }

    // --- subview management -------------------------------------------

    /// Register a child view in the subview table.
    ///
    /// The parent watches the child's dispose channel: a child that
    /// disposes itself independently is pruned from the table without the
    /// parent calling [`close_subview`](Self::close_subview). Ownership is
    /// a tree: a view must not sit in two parents' tables at once.
    pub fn add_subview(&mut self, view: SubviewHandle) -> ViewId {
        let child_id = lock(&view).view_id();
        let table = Arc::downgrade(&self.subviews);
        let watcher = self
            .env
            .mediator
            .subscribe_once(channels::dispose(child_id), move |_event| {
                if let Some(table) = table.upgrade() {
                    lock(&table).remove(&child_id);
                }
            });
        lock(&self.subviews).insert(child_id, SubviewEntry { view, watcher });
        child_id
    }

    /// Close one child: unsubscribe the dispose watcher, dispose and detach
    /// the child, drop the table entry. Unknown ids are a no-op.
    pub fn close_subview(&mut self, id: ViewId) {
        // Take the entry out before disposing: the child's dispose publish
        // must not find a live watcher pointing back at the table.
        let entry = lock(&self.subviews).remove(&id);
        if let Some(entry) = entry {
            self.env.mediator.unsubscribe(entry.watcher);
            lock(&entry.view).remove();
        }
    }

    /// Close every tracked child. Idempotent; a second call on an empty
    /// table does nothing.
    pub fn close_subviews(&mut self) {
        let ids: Vec<ViewId> = lock(&self.subviews).keys().copied().collect();
        for id in ids {
            self.close_subview(id);
        }
    }

    /// Number of children currently tracked.
    pub fn subview_count(&self) -> usize {
        lock(&self.subviews).len()
    }

    /// Whether `id` is currently tracked as a child.
    pub fn has_subview(&self, id: ViewId) -> bool {
        lock(&self.subviews).contains_key(&id)
    }

    /// Handle to a tracked child, if present.
    pub fn subview(&self, id: ViewId) -> Option<SubviewHandle> {
        lock(&self.subviews).get(&id).map(|entry| entry.view.clone())
    }

    /// Build one child per element matching `selector` within this view's
    /// root. `build` is invoked with `(index, element)` for each match and
    /// its result is registered via [`add_subview`](Self::add_subview).
    pub fn read_subviews(
        &mut self,
        selector: &str,
        mut build: impl FnMut(usize, ElementRef) -> SubviewHandle,
    ) -> Vec<ViewId> {
        let matches = self.find(selector);
        matches
            .into_iter()
            .enumerate()
            .map(|(index, element)| {
                let view = build(index, element);
                self.add_subview(view)
            })
            .collect()
    }

    /// Append a child's root element into `target` (this view's own root by
    /// default) and register the child.
    pub fn append(&mut self, view: SubviewHandle, target: Option<&ElementRef>) -> ViewId {
        let root = lock(&view).root();
        target.unwrap_or(&self.el).append_child(root);
        self.add_subview(view)
    }

    /// Append one child per item: the collection convenience over
    /// [`append`](Self::append).
    pub fn append_each<T>(
        &mut self,
        items: impl IntoIterator<Item = T>,
        target: Option<&ElementRef>,
        mut build: impl FnMut(T) -> SubviewHandle,
    ) -> Vec<ViewId> {
        items
            .into_iter()
            .map(|item| self.append(build(item), target))
            .collect()
    }

    // --- loading indicator --------------------------------------------

    /// Replace the root content with a loader element and tag the root with
    /// the loading class. No-op if already loading.
    pub fn show_loading(&mut self) {
        if self.loading {
            return;
        }
        self.loading = true;
        self.el.add_class(&self.options.loading_class);
        self.el
            .set_html(&format!("<i class=\"{}\"></i>", self.options.loader_class));
    }

    /// Remove the loader and the loading class, if active. Every render
    /// pass does this before mounting new markup.
    pub fn hide_loading(&mut self) {
        if self.loading {
            self.loading = false;
            self.el.remove_class(&self.options.loading_class);
            self.el.empty();
        }
    }

    /// Whether the loading indicator is active.
    pub fn is_loading(&self) -> bool {
        self.loading
    }
}

/// A view that owns a subtree of child views and drives the
/// fetch → compile → mount render pipeline.
///
/// Construction goes through [`mount`](CompositeView::mount); the view is
/// handed out as a [`ViewRef`] so parents and the embedding application can
/// share it. Every render pass and the final disposal leave no dangling
/// child views and no stale cached element handles.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use trellis_core::template::{InlineSource, TemplateManager, TemplateQuery};
/// use trellis_core::view::{CompositeView, ViewEnv, ViewState};
/// use trellis_core::testing::TestElement;
///
/// struct TaskList;
///
/// impl ViewState for TaskList {
///     fn templates(&self) -> Option<TemplateQuery> {
///         Some(TemplateQuery::from(vec!["list", "list/row"]))
///     }
/// }
///
/// # async fn demo() {
/// let source = InlineSource::preloaded([
///     ("list", "<ul>{{> row }}</ul>"),
///     ("list/row", "<li>x</li>"),
/// ]);
/// let env = ViewEnv::new(Arc::new(TemplateManager::new(Arc::new(source))));
/// let view = CompositeView::mount(TaskList, TestElement::new(), env)
///     .await
///     .unwrap();
/// # }
/// ```
pub struct CompositeView<S: ViewState> {
    core: ViewCore,
    state: S,
}

impl<S: ViewState> CompositeView<S> {
    /// Mount a view on `el` with default [`ViewOptions`].
    pub async fn mount(state: S, el: ElementRef, env: ViewEnv) -> Result<ViewRef<S>, TemplateError> {
        Self::mount_with(state, el, env, ViewOptions::default()).await
    }

    /// Mount a view on `el`.
    ///
    /// Runs [`on_init`](ViewState::on_init), then checks readiness: a root
    /// element that already carries markup is treated as rendered
    /// ([`on_ready`](ViewState::on_ready) and
    /// [`on_rendered`](ViewState::on_rendered) fire once, no fetch); a
    /// blank root goes through [`post_init`](ViewState::post_init), whose
    /// default triggers a render pass.
    pub async fn mount_with(
        mut state: S,
        el: ElementRef,
        env: ViewEnv,
        options: ViewOptions,
    ) -> Result<ViewRef<S>, TemplateError> {
        let mut core = ViewCore::new(el, env, options);
        state.on_init(&mut core);

        if !core.el.is_blank() {
            state.on_ready(&mut core);
            state.on_rendered(&mut core);
            return Ok(Arc::new(Mutex::new(CompositeView { core, state })));
        }

        let next = state.post_init(&mut core);
        let view = Arc::new(Mutex::new(CompositeView { core, state }));
        if matches!(next, PostInit::Render) {
            CompositeView::render(&view).await?;
        }
        Ok(view)
    }

    /// Run a render pass: resolve the view's template declaration, fetch
    /// through the template manager, and populate.
    ///
    /// The view's lock is not held while the fetch is in flight; when the
    /// templates arrive the continuation re-checks the view and drops the
    /// result silently if the view was disposed in the meantime. A view
    /// with no template declaration just clears its root element.
    pub async fn render(this: &ViewRef<S>) -> Result<(), TemplateError> {
        let (query, manager) = {
            let view = lock(this);
            if view.core.disposed {
                return Ok(());
            }
            (view.state.templates(), view.core.env.templates.clone())
        };

        let query = match query {
            Some(query) if !query.is_empty() => query,
            _ => {
                let view = lock(this);
                if !view.core.disposed {
                    view.core.el.empty();
                }
                return Ok(());
            }
        };

        let loaded = manager.load(&query).await?;
        lock(this).apply_loaded(&query, loaded);
        Ok(())
    }

    /// The plugged-in state.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Mutable access to the plugged-in state.
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// The engine-owned core.
    pub fn core(&self) -> &ViewCore {
        &self.core
    }

    /// Mutable access to the engine-owned core.
    pub fn core_mut(&mut self) -> &mut ViewCore {
        &mut self.core
    }

    /// Tear the view down: publish the dispose channel, run the
    /// [`on_dispose`](ViewState::on_dispose) hook, clear the selector
    /// cache, close every subview, and cancel this view's mediator
    /// subscriptions. Idempotent.
    pub fn dispose(&mut self) {
        if self.core.disposed {
            return;
        }
        self.core.disposed = true;

        let mediator = self.core.env.mediator.clone();
        mediator.publish(
            &channels::dispose(self.core.id),
            &ViewEvent::Dispose(self.core.id),
        );
        self.state.on_dispose(&mut self.core);
        self.core.clear_cache();
        self.core.close_subviews();
        for token in mem::take(&mut self.core.tokens) {
            mediator.unsubscribe(token);
        }
    }

    /// Dispose and clear the root element's content, leaving the element
    /// itself in the document.
    pub fn clear(&mut self) {
        self.dispose();
        self.core.el.empty();
    }

    fn apply_loaded(&mut self, query: &TemplateQuery, loaded: LoadedTemplates) {
        match loaded {
            LoadedTemplates::Single(content) => self.populate(content, None),
            LoadedTemplates::Many(map) => {
                let Some(main_id) = query.main_id() else {
                    return;
                };
                let mut map = map;
                let Some(main) = map.remove(main_id) else {
                    return;
                };
                let mut partials: Partials = map
                    .into_iter()
                    .map(|(id, content)| (partial_key(&id), content))
                    .collect();
                // View-declared partials win on key collision.
                partials.extend(self.state.partials());
                self.populate(main, Some(partials));
            }
        }
    }

    /// The synchronous tail of a render pass. Teardown of the current
    /// subview tree happens strictly before data gathering and HTML
    /// generation: data hooks may read view state, and they must observe a
    /// world without the old children in it.
    fn populate(&mut self, template: TemplateContent, partials: Option<Partials>) {
        if self.core.disposed {
            return;
        }
        let id = self.core.id;
        let mediator = self.core.env.mediator.clone();

        mediator.publish(channels::RENDER_START, &ViewEvent::RenderStart(id));
        self.state.pre_render(&mut self.core);
        self.core.clear_cache();
        self.core.close_subviews();
        self.core.hide_loading();

        let data = self.state.data(&self.core);
        let empty = Partials::new();
        let html = (self.core.env.compiler)(
            &template,
            &data,
            partials.as_ref().unwrap_or(&empty),
        );
        self.core.el.set_html(&html);

        self.state.on_rendered(&mut self.core);
        mediator.publish(channels::RENDER_END, &ViewEvent::RenderEnd(id));
    }
}

impl<S: ViewState> Subview for CompositeView<S> {
    fn view_id(&self) -> ViewId {
        self.core.id
    }

    fn root(&self) -> ElementRef {
        self.core.el.clone()
    }

    fn dispose(&mut self) {
        CompositeView::dispose(self);
    }

    fn is_disposed(&self) -> bool {
        self.core.disposed
    }
}

/// Render a view on a background task, returning its join handle.
///
/// This is the fire-and-forget shape of [`CompositeView::render`]: the view
/// stays usable (and disposable) while the fetch is in flight.
pub fn spawn_render<S: ViewState>(
    view: ViewRef<S>,
) -> tokio::task::JoinHandle<Result<(), TemplateError>> {
    tokio::spawn(async move { CompositeView::render(&view).await })
}

/// Partial key for a template id: the last `/`-separated segment, so
/// `path/sub/bar` is exposed to the template as partial `bar`.
fn partial_key(id: &str) -> String {
    match id.rsplit('/').next() {
        Some(last) => last.to_string(),
        None => id.to_string(),
    }
}
