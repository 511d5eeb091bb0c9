//! In-memory test doubles for the engine's collaborator seams.
//!
//! Nothing here touches a real document or network. [`TestElement`] is a
//! scriptable [`Element`], [`ManualSource`] is a template source whose
//! fetches resolve only when the test says so, and [`RecordingFetch`] plays
//! back canned HTTP responses. All three are used by this crate's own tests
//! and are exported for downstream integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::channel::oneshot;
use futures::future::{self, BoxFuture, FutureExt};

use crate::element::{Element, ElementRef};
use crate::lock;
use crate::template::{HttpError, HttpFetch, TemplateContent, TemplateError, TemplateSource};

#[derive(Default)]
struct ElementInner {
    html: String,
    classes: Vec<String>,
    queries: HashMap<String, Vec<ElementRef>>,
    query_counts: HashMap<String, usize>,
    appended: Vec<ElementRef>,
    detached: bool,
}

/// Scriptable in-memory element.
///
/// Markup is an opaque string; [`query`](Element::query) answers from
/// results stubbed with [`stub_query`](TestElement::stub_query) and counts
/// every call, so tests can assert on selector-cache behavior.
#[derive(Default)]
pub struct TestElement {
    inner: Mutex<ElementInner>,
}

impl TestElement {
    /// A blank element.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// An element carrying initial markup.
    pub fn with_html(html: &str) -> Arc<Self> {
        let el = Self::default();
        lock(&el.inner).html = html.to_string();
        Arc::new(el)
    }

    /// Script the result set for a selector.
    pub fn stub_query(&self, selector: &str, matches: Vec<Arc<TestElement>>) {
        let matches = matches
            .into_iter()
            .map(|el| el as ElementRef)
            .collect();
        lock(&self.inner).queries.insert(selector.to_string(), matches);
    }

    /// How many times [`query`](Element::query) ran for a selector.
    pub fn query_count(&self, selector: &str) -> usize {
        lock(&self.inner)
            .query_counts
            .get(selector)
            .copied()
            .unwrap_or(0)
    }

    /// Classes currently on the element.
    pub fn classes(&self) -> Vec<String> {
        lock(&self.inner).classes.clone()
    }

    /// How many children were appended.
    pub fn appended_count(&self) -> usize {
        lock(&self.inner).appended.len()
    }

    /// Whether [`detach`](Element::detach) was called.
    pub fn is_detached(&self) -> bool {
        lock(&self.inner).detached
    }
}

impl Element for TestElement {
    fn html(&self) -> String {
        lock(&self.inner).html.clone()
    }

    fn set_html(&self, html: &str) {
        lock(&self.inner).html = html.to_string();
    }

    fn query(&self, selector: &str) -> Vec<ElementRef> {
        let mut inner = lock(&self.inner);
        *inner.query_counts.entry(selector.to_string()).or_insert(0) += 1;
        inner.queries.get(selector).cloned().unwrap_or_default()
    }

    fn append_child(&self, child: ElementRef) {
        lock(&self.inner).appended.push(child);
    }

    fn detach(&self) {
        lock(&self.inner).detached = true;
    }

    fn add_class(&self, class: &str) {
        let mut inner = lock(&self.inner);
        if !inner.classes.iter().any(|c| c == class) {
            inner.classes.push(class.to_string());
        }
    }

    fn remove_class(&self, class: &str) {
        lock(&self.inner).classes.retain(|c| c != class);
    }
}

type FetchOutcome = Result<TemplateContent, TemplateError>;

#[derive(Default)]
struct ManualInner {
    outcomes: HashMap<String, FetchOutcome>,
    waiters: HashMap<String, Vec<oneshot::Sender<FetchOutcome>>>,
    dispatches: HashMap<String, usize>,
}

/// Template source with test-controlled resolution.
///
/// A fetch for an id stays pending until [`resolve`](ManualSource::resolve)
/// or [`fail`](ManualSource::fail) runs for it; outcomes set ahead of time
/// answer immediately. Every [`fetch`](TemplateSource::fetch) call is
/// counted per id, so cache-deduplication tests can assert exact dispatch
/// numbers.
#[derive(Default)]
pub struct ManualSource {
    inner: Mutex<ManualInner>,
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `id` with `content`, waking every pending fetch for it.
    /// Later fetches for the same id resolve immediately.
    pub fn resolve(&self, id: &str, content: &str) {
        self.settle(id, Ok(TemplateContent::from(content)));
    }

    /// Fail `id` with `error`, waking every pending fetch for it.
    pub fn fail(&self, id: &str, error: TemplateError) {
        self.settle(id, Err(error));
    }

    /// Number of [`fetch`](TemplateSource::fetch) calls seen for `id`.
    pub fn dispatch_count(&self, id: &str) -> usize {
        lock(&self.inner).dispatches.get(id).copied().unwrap_or(0)
    }

    fn settle(&self, id: &str, outcome: FetchOutcome) {
        let waiters = {
            let mut inner = lock(&self.inner);
            inner.outcomes.insert(id.to_string(), outcome.clone());
            inner.waiters.remove(id).unwrap_or_default()
        };
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

impl TemplateSource for ManualSource {
    fn fetch(&self, id: &str) -> BoxFuture<'static, FetchOutcome> {
        let mut inner = lock(&self.inner);
        *inner.dispatches.entry(id.to_string()).or_insert(0) += 1;

        if let Some(outcome) = inner.outcomes.get(id) {
            return future::ready(outcome.clone()).boxed();
        }

        let (tx, rx) = oneshot::channel();
        inner.waiters.entry(id.to_string()).or_default().push(tx);
        let id = id.to_string();
        async move {
            rx.await.unwrap_or_else(|_canceled| {
                Err(TemplateError::Fetch {
                    id,
                    reason: "fetch aborted".to_string(),
                })
            })
        }
        .boxed()
    }
}

#[derive(Default)]
struct RecordingInner {
    responses: HashMap<String, String>,
    requests: Vec<String>,
}

/// HTTP double that records every request and answers from canned bodies.
/// Requests with no canned response fail.
#[derive(Default)]
pub struct RecordingFetch {
    inner: Mutex<RecordingInner>,
}

impl RecordingFetch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Can a response body for a URL.
    pub fn respond(&self, url: &str, body: &str) {
        lock(&self.inner)
            .responses
            .insert(url.to_string(), body.to_string());
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        lock(&self.inner).requests.clone()
    }
}

impl HttpFetch for RecordingFetch {
    fn get(&self, url: &str) -> BoxFuture<'static, Result<String, HttpError>> {
        let mut inner = lock(&self.inner);
        inner.requests.push(url.to_string());
        let result = match inner.responses.get(url) {
            Some(body) => Ok(body.clone()),
            None => Err(HttpError {
                url: url.to_string(),
                message: "no canned response".to_string(),
            }),
        };
        future::ready(result).boxed()
    }
}
