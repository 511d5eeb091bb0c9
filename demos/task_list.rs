//! Renders a task list view with one child view per task, then disposes the
//! parent and shows the children being torn down with it.
//!
//! Run with: `cargo run --example task_list`

use std::collections::HashMap;
use std::sync::Arc;

use trellis::testing::TestElement;
use trellis::{
    as_subview, channels, CompositeView, Element, InlineSource, TemplateManager, TemplateQuery,
    ViewEnv, ViewEvent, ViewState,
};

struct TaskList {
    title: String,
}

impl ViewState for TaskList {
    fn templates(&self) -> Option<TemplateQuery> {
        Some(TemplateQuery::from("tasks/list"))
    }

    fn data(&self, _core: &trellis::ViewCore) -> HashMap<String, String> {
        HashMap::from([("title".to_string(), self.title.clone())])
    }
}

struct TaskRow {
    label: String,
}

impl ViewState for TaskRow {
    fn templates(&self) -> Option<TemplateQuery> {
        Some(TemplateQuery::from("tasks/row"))
    }

    fn data(&self, _core: &trellis::ViewCore) -> HashMap<String, String> {
        HashMap::from([("label".to_string(), self.label.clone())])
    }
}

#[tokio::main]
async fn main() {
    let source = InlineSource::preloaded([
        ("tasks/list", "<section><h1>{{ title }}</h1><ul></ul></section>"),
        ("tasks/row", "<li>{{ label }}</li>"),
    ]);
    let env = ViewEnv::new(Arc::new(TemplateManager::new(Arc::new(source))));

    // Watch the view tree over the mediator.
    env.mediator.subscribe(channels::RENDER_END, |event: &ViewEvent| {
        println!("rendered view {}", event.view_id());
    });

    let root = TestElement::new();
    let list = CompositeView::mount(
        TaskList {
            title: "Today".to_string(),
        },
        root.clone(),
        env.clone(),
    )
    .await
    .unwrap();

    for label in ["water plants", "file expenses", "walk the dog"] {
        let row_el = TestElement::new();
        let row = CompositeView::mount(
            TaskRow {
                label: label.to_string(),
            },
            row_el,
            env.clone(),
        )
        .await
        .unwrap();
        list.lock().unwrap().core_mut().append(as_subview(&row), None);
    }

    {
        let list = list.lock().unwrap();
        println!("\n{}", root.html());
        println!("rows attached: {}", root.appended_count());
        println!("subviews tracked: {}", list.core().subview_count());
    }

    list.lock().unwrap().dispose();
    println!(
        "after dispose, subviews tracked: {}",
        list.lock().unwrap().core().subview_count()
    );
}
