use futures::future::{self, BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::Mutex;

use super::{TemplateContent, TemplateError, TemplateSource};
use crate::lock;

/// Template source backed by an in-process registry.
///
/// Content is supplied by value through [`register`](InlineSource::register)
/// (or preloaded at construction) and resolved immediately. An identifier
/// with no registration is taken literally as the template source itself,
/// so call sites can pass small templates inline without registering them
/// first.
///
/// # Example
///
/// ```rust,ignore
/// use trellis_core::template::InlineSource;
///
/// let source = InlineSource::preloaded([
///     ("greeting", "<p>hello {{ name }}</p>"),
/// ]);
/// ```
#[derive(Default)]
pub struct InlineSource {
    templates: Mutex<HashMap<String, TemplateContent>>,
}

impl InlineSource {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry preloaded with `(id, content)` pairs.
    pub fn preloaded<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let source = Self::new();
        for (id, content) in entries {
            source.register(id, content.as_ref());
        }
        source
    }

    /// Register (or replace) template content under `id`.
    pub fn register(&self, id: impl Into<String>, content: &str) {
        lock(&self.templates).insert(id.into(), TemplateContent::from(content));
    }
}

impl TemplateSource for InlineSource {
    fn fetch(&self, id: &str) -> BoxFuture<'static, Result<TemplateContent, TemplateError>> {
        let content = lock(&self.templates)
            .get(id)
            .cloned()
            .unwrap_or_else(|| TemplateContent::from(id));
        future::ready(Ok(content)).boxed()
    }
}
