//! Shows the remote template source: URL building from id, per-id caching,
//! and main-plus-partials rendering.
//!
//! Run with: `cargo run --example remote_templates`

use std::sync::Arc;

use trellis::testing::{RecordingFetch, TestElement};
use trellis::{
    CompositeView, Element, RemoteSource, TemplateManager, TemplateQuery, ViewEnv, ViewState,
};

struct Profile;

impl ViewState for Profile {
    fn templates(&self) -> Option<TemplateQuery> {
        Some(TemplateQuery::from(vec!["profile", "widgets/avatar"]))
    }

    fn data(&self, _core: &trellis::ViewCore) -> std::collections::HashMap<String, String> {
        std::collections::HashMap::from([("name".to_string(), "Ada".to_string())])
    }
}

#[tokio::main]
async fn main() {
    // Stands in for a real HTTP client; any HttpFetch impl works here.
    let http = Arc::new(RecordingFetch::new());
    http.respond(
        "/templates/profile.template.html",
        "<article>{{> avatar }}<h2>{{ name }}</h2></article>",
    );
    http.respond(
        "/templates/widgets/avatar.template.html",
        "<img class=\"avatar\" alt=\"{{ name }}\">",
    );

    let source = RemoteSource::new(http.clone());
    let manager = Arc::new(TemplateManager::new(Arc::new(source)));
    let env = ViewEnv::new(manager.clone());

    let root = TestElement::new();
    let _view = CompositeView::mount(Profile, root.clone(), env.clone())
        .await
        .unwrap();
    println!("{}", root.html());

    // A second mount re-uses the cached fetches.
    let again = TestElement::new();
    let _second = CompositeView::mount(Profile, again, env).await.unwrap();

    println!("\nrequests made:");
    for url in http.requests() {
        println!("  GET {url}");
    }
}
