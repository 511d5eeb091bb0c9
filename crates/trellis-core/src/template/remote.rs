use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;

use super::{TemplateContent, TemplateError, TemplateSource};

/// Failure reported by an [`HttpFetch`] collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("GET {url} failed: {message}")]
pub struct HttpError {
    /// The URL that was requested.
    pub url: String,
    /// Transport- or status-level failure description.
    pub message: String,
}

/// Minimal HTTP capability consumed by [`RemoteSource`].
///
/// trellis does not pick a transport; the embedding application supplies one
/// (and owns concerns like timeouts, retries, and request cancellation).
/// The [`testing`](crate::testing) module provides a canned-response
/// implementation.
pub trait HttpFetch: Send + Sync + 'static {
    /// Issue a GET for `url`, resolving to the response body.
    fn get(&self, url: &str) -> BoxFuture<'static, Result<String, HttpError>>;
}

/// Template source that fetches templates over HTTP.
///
/// The identifier is combined with a configurable prefix and suffix to build
/// the URL; one GET is issued per identifier. Deduplication is the manager's
/// job: the pending request itself is what gets cached, so a second
/// requester attaches to the in-flight GET. Network failures are propagated
/// as [`TemplateError::Fetch`]; the source never retries.
pub struct RemoteSource {
    http: Arc<dyn HttpFetch>,
    prefix: String,
    suffix: String,
}

impl RemoteSource {
    /// Create a source with the default prefix (`/templates/`) and suffix
    /// (`.template.html`).
    pub fn new(http: Arc<dyn HttpFetch>) -> Self {
        Self {
            http,
            prefix: "/templates/".to_string(),
            suffix: ".template.html".to_string(),
        }
    }

    /// Override the URL prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Override the URL suffix.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// URL for a given template identifier.
    pub fn url(&self, id: &str) -> String {
        format!("{}{}{}", self.prefix, id, self.suffix)
    }
}

impl TemplateSource for RemoteSource {
    fn fetch(&self, id: &str) -> BoxFuture<'static, Result<TemplateContent, TemplateError>> {
        let url = self.url(id);
        let id = id.to_string();
        let request = self.http.get(&url);
        async move {
            request
                .await
                .map(|body| TemplateContent::from(body.as_str()))
                .map_err(|err| TemplateError::Fetch {
                    id,
                    reason: err.to_string(),
                })
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateManager;
    use crate::testing::RecordingFetch;

    #[test]
    fn builds_urls_with_defaults() {
        let http = Arc::new(RecordingFetch::new());
        let source = RemoteSource::new(http);
        assert_eq!(source.url("foo"), "/templates/foo.template.html");
    }

    #[test]
    fn builds_urls_with_custom_affixes() {
        let http = Arc::new(RecordingFetch::new());
        let source = RemoteSource::new(http)
            .with_prefix("https://cdn.example.com/tpl/")
            .with_suffix(".mustache");
        assert_eq!(
            source.url("list/row"),
            "https://cdn.example.com/tpl/list/row.mustache"
        );
    }

    #[tokio::test]
    async fn fetches_over_http_once_per_id() {
        let http = Arc::new(RecordingFetch::new());
        http.respond("/templates/foo.template.html", "<p>FOO</p>");

        let manager = TemplateManager::new(Arc::new(RemoteSource::new(http.clone())));
        assert_eq!(&*manager.get("foo").await.unwrap(), "<p>FOO</p>");
        assert_eq!(&*manager.get("foo").await.unwrap(), "<p>FOO</p>");

        assert_eq!(http.requests(), vec!["/templates/foo.template.html"]);
    }

    #[tokio::test]
    async fn network_failures_map_to_fetch_errors() {
        let http = Arc::new(RecordingFetch::new());
        let manager = TemplateManager::new(Arc::new(RemoteSource::new(http)));

        match manager.get("missing").await.unwrap_err() {
            TemplateError::Fetch { id, reason } => {
                assert_eq!(id, "missing");
                assert!(reason.contains("/templates/missing.template.html"));
            }
            other => panic!("expected Fetch, got {other:?}"),
        }
    }
}
