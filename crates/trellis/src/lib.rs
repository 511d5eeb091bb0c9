//! **trellis** -- a composite view framework with pluggable template
//! sources and a pub/sub mediator.
//!
//! This is the umbrella crate that re-exports everything you need from a
//! single dependency:
//!
//! ```toml
//! [dependencies]
//! trellis = "0.1"
//! ```
//!
//! # Re-exports
//!
//! * All public items from [`trellis_core`] are available at the crate root
//!   ([`CompositeView`], [`ViewState`], [`ViewEnv`], [`TemplateManager`],
//!   [`Mediator`], etc.).
//! * [`futures`] and [`tokio`] are re-exported so downstream crates do not
//!   need to depend on them directly.
//!
//! # Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use trellis::{
//!     CompositeView, InlineSource, TemplateManager, TemplateQuery, ViewEnv, ViewState,
//! };
//! use trellis::testing::TestElement;
//!
//! struct Greeting;
//!
//! impl ViewState for Greeting {
//!     fn templates(&self) -> Option<TemplateQuery> {
//!         Some(TemplateQuery::from("greeting"))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = InlineSource::preloaded([("greeting", "<p>Hello, trellis!</p>")]);
//!     let env = ViewEnv::new(Arc::new(TemplateManager::new(Arc::new(source))));
//!     let root = TestElement::new();
//!     let view = CompositeView::mount(Greeting, root.clone(), env).await.unwrap();
//!     println!("{}", root.html());
//! }
//! ```

pub use trellis_core::*;

// Re-export dependencies for use in examples and downstream crates
pub use futures;
pub use tokio;
