use futures::future::{self, BoxFuture, FutureExt};

use super::{TemplateContent, TemplateError, TemplateSource};
use crate::element::ElementRef;

/// Template source that reads templates embedded in a host document.
///
/// The identifier is treated as a selector; the content is the inner markup
/// of the first matching element. This covers the common pattern of shipping
/// templates inside the page, e.g.
/// `<script type="text/template" id="row">...</script>` looked up as
/// `#row`. Resolution is immediate; per-selector caching is handled by the
/// [`TemplateManager`](super::TemplateManager) above, so the document is
/// queried at most once per selector.
pub struct EmbeddedSource {
    document: ElementRef,
}

impl EmbeddedSource {
    /// Create a source scoped to the given document root.
    pub fn new(document: ElementRef) -> Self {
        Self { document }
    }
}

impl TemplateSource for EmbeddedSource {
    fn fetch(&self, id: &str) -> BoxFuture<'static, Result<TemplateContent, TemplateError>> {
        let result = match self.document.query(id).first() {
            Some(element) => Ok(TemplateContent::from(element.html())),
            None => Err(TemplateError::NotFound { id: id.to_string() }),
        };
        future::ready(result).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::TemplateManager;
    use crate::testing::TestElement;
    use std::sync::Arc;

    #[tokio::test]
    async fn resolves_embedded_markup() {
        let document = TestElement::new();
        let holder = TestElement::with_html("<li>{{ name }}</li>");
        document.stub_query("#row", vec![holder]);

        let manager = TemplateManager::new(Arc::new(EmbeddedSource::new(document)));
        assert_eq!(&*manager.get("#row").await.unwrap(), "<li>{{ name }}</li>");
    }

    #[tokio::test]
    async fn queries_the_document_once_per_selector() {
        let document = TestElement::new();
        let holder = TestElement::with_html("x");
        document.stub_query("#tpl", vec![holder]);
        let probe = document.clone();

        let manager = TemplateManager::new(Arc::new(EmbeddedSource::new(document)));
        manager.get("#tpl").await.unwrap();
        manager.get("#tpl").await.unwrap();

        assert_eq!(probe.query_count("#tpl"), 1);
    }

    #[tokio::test]
    async fn missing_selector_is_not_found() {
        let document = TestElement::new();
        let manager = TemplateManager::new(Arc::new(EmbeddedSource::new(document)));

        let err = manager.get("#nope").await.unwrap_err();
        assert_eq!(
            err,
            TemplateError::NotFound {
                id: "#nope".to_string()
            }
        );
    }
}
