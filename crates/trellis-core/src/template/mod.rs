//! Template loading and caching.
//!
//! A [`TemplateManager`] resolves opaque template identifiers to template
//! source text through a pluggable [`TemplateSource`] strategy, deduplicating
//! fetches so each identifier is fetched at most once per manager instance.
//! Three strategies ship with the crate:
//!
//! | Strategy | Identifier means | Resolution |
//! |----------|------------------|------------|
//! | [`InlineSource`] | a registered name (or the content itself) | immediate |
//! | [`EmbeddedSource`] | a selector into a host document | immediate |
//! | [`RemoteSource`] | a path fragment of a URL | deferred HTTP GET |

mod embedded;
mod inline;
mod remote;

pub use embedded::EmbeddedSource;
pub use inline::InlineSource;
pub use remote::{HttpError, HttpFetch, RemoteSource};

use futures::future::{self, BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::lock;

/// Resolved template source text, cheap to clone between callers that share
/// a cache entry.
pub type TemplateContent = Arc<str>;

/// Errors surfaced by template resolution.
///
/// The manager never retries; a failed fetch stays cached (so every caller
/// observes the same outcome) until evicted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// The identifier matched nothing in the source.
    #[error("template `{id}` not found")]
    NotFound {
        /// The identifier that failed to resolve.
        id: String,
    },
    /// The underlying fetch failed (network error, bad status, aborted).
    #[error("failed to fetch template `{id}`: {reason}")]
    Fetch {
        /// The identifier that failed to resolve.
        id: String,
        /// Human-readable failure description from the collaborator.
        reason: String,
    },
}

/// A template declaration: one identifier, or an ordered list whose first
/// entry is the main template and the rest become partials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateQuery {
    /// A single template identifier.
    Single(String),
    /// An ordered list of identifiers. The first is the main template.
    List(Vec<String>),
}

impl TemplateQuery {
    /// The main template identifier: the single id, or the first of the
    /// list. `None` for an empty list.
    pub fn main_id(&self) -> Option<&str> {
        match self {
            TemplateQuery::Single(id) => Some(id),
            TemplateQuery::List(ids) => ids.first().map(String::as_str),
        }
    }

    /// Whether the query names no templates at all.
    pub fn is_empty(&self) -> bool {
        matches!(self, TemplateQuery::List(ids) if ids.is_empty())
    }
}

impl From<&str> for TemplateQuery {
    fn from(id: &str) -> Self {
        TemplateQuery::Single(id.to_string())
    }
}

impl From<String> for TemplateQuery {
    fn from(id: String) -> Self {
        TemplateQuery::Single(id)
    }
}

impl From<Vec<String>> for TemplateQuery {
    fn from(ids: Vec<String>) -> Self {
        TemplateQuery::List(ids)
    }
}

impl From<Vec<&str>> for TemplateQuery {
    fn from(ids: Vec<&str>) -> Self {
        TemplateQuery::List(ids.into_iter().map(str::to_string).collect())
    }
}

/// Result of [`TemplateManager::load`], mirroring the two query shapes.
#[derive(Debug, Clone)]
pub enum LoadedTemplates {
    /// Content of the single requested template.
    Single(TemplateContent),
    /// Identifier-to-content map for a list query.
    Many(HashMap<String, TemplateContent>),
}

/// Fetch strategy behind a [`TemplateManager`].
///
/// `fetch` is called at most once per identifier per manager instance; the
/// manager owns caching and deduplication, so sources stay stateless where
/// they can.
pub trait TemplateSource: Send + Sync + 'static {
    /// Resolve one identifier to template source text.
    fn fetch(&self, id: &str) -> BoxFuture<'static, Result<TemplateContent, TemplateError>>;
}

type SharedFetch = Shared<BoxFuture<'static, Result<TemplateContent, TemplateError>>>;

/// Caching front-end over a [`TemplateSource`].
///
/// A given identifier's fetch is started at most once per manager instance:
/// concurrent and later requests for the same identifier attach to the same
/// pending (or resolved) fetch. The check-and-insert is a single synchronous
/// step under the cache lock, so two callers racing on the same identifier
/// cannot both dispatch. Entries never expire; [`evict`](Self::evict) and
/// [`clear`](Self::clear) are the only eviction paths.
///
/// Managers are shared (`Arc<TemplateManager>`) by every view configured to
/// use them.
pub struct TemplateManager {
    source: Arc<dyn TemplateSource>,
    cache: Mutex<HashMap<String, SharedFetch>>,
}

impl TemplateManager {
    /// Create a manager over the given fetch strategy.
    pub fn new(source: Arc<dyn TemplateSource>) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve one identifier, consulting the cache first.
    ///
    /// Resolves exactly once per call: immediately for cached or synchronous
    /// sources, later for pending remote fetches.
    pub async fn get(&self, id: &str) -> Result<TemplateContent, TemplateError> {
        let fetch = {
            let mut cache = lock(&self.cache);
            cache
                .entry(id.to_string())
                .or_insert_with(|| self.source.fetch(id).shared())
                .clone()
        };
        fetch.await
    }

    /// Resolve a query, dispatching on its shape.
    pub async fn load(&self, query: &TemplateQuery) -> Result<LoadedTemplates, TemplateError> {
        match query {
            TemplateQuery::Single(id) => Ok(LoadedTemplates::Single(self.get(id).await?)),
            TemplateQuery::List(ids) => Ok(LoadedTemplates::Many(self.load_all(ids).await?)),
        }
    }

    /// Resolve every identifier in the list, returning an id-to-content map.
    ///
    /// Fetches are dispatched in list order and awaited together; the result
    /// is available only once the last of them completes, whatever their
    /// completion order. Cache hits count as completed.
    pub async fn load_all(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, TemplateContent>, TemplateError> {
        let fetches: Vec<_> = ids.iter().map(|id| self.get(id)).collect();
        let results = future::join_all(fetches).await;
        let mut map = HashMap::with_capacity(ids.len());
        for (id, result) in ids.iter().zip(results) {
            map.insert(id.clone(), result?);
        }
        Ok(map)
    }

    /// Drop one cache entry, forcing the next `get` to fetch again.
    pub fn evict(&self, id: &str) {
        lock(&self.cache).remove(id);
    }

    /// Drop the entire cache.
    pub fn clear(&self) {
        lock(&self.cache).clear();
    }

    /// Whether a fetch for `id` is cached (pending or resolved).
    pub fn is_cached(&self, id: &str) -> bool {
        lock(&self.cache).contains_key(id)
    }
}
