use std::sync::Arc;

/// Shared handle to an element in the host document.
pub type ElementRef = Arc<dyn Element>;

/// The document seam the view engine renders into.
///
/// trellis does not ship a DOM: the embedding application provides handles to
/// whatever element model it uses (a real browser bridge, a server-side
/// document, a widget tree). The engine only needs markup get/set, scoped
/// queries, child attachment, and detachment. The
/// [`testing`](crate::testing) module provides an in-memory implementation
/// for tests.
///
/// Selector syntax is opaque to the engine; it is passed through verbatim to
/// [`query`](Element::query).
pub trait Element: Send + Sync + 'static {
    /// Current inner markup of this element.
    fn html(&self) -> String;

    /// Replace this element's inner markup.
    fn set_html(&self, html: &str);

    /// Elements matching `selector`, scoped to this element's subtree.
    fn query(&self, selector: &str) -> Vec<ElementRef>;

    /// Attach `child` as this element's last child.
    fn append_child(&self, child: ElementRef);

    /// Detach this element from its parent document.
    fn detach(&self);

    /// Add a CSS class to this element.
    fn add_class(&self, class: &str);

    /// Remove a CSS class from this element.
    fn remove_class(&self, class: &str);

    /// Clear this element's content.
    fn empty(&self) {
        self.set_html("");
    }

    /// Whether the element's markup is empty after trimming. An element
    /// containing only whitespace is blank; one containing empty tags such
    /// as `<span></span>` is not.
    fn is_blank(&self) -> bool {
        self.html().trim().is_empty()
    }
}
