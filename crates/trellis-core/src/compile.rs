use std::collections::HashMap;
use std::sync::Arc;

use crate::template::TemplateContent;

/// Key/value data handed to the compile function, gathered from a view's
/// [`data`](crate::view::ViewState::data) hook.
pub type TemplateData = HashMap<String, String>;

/// Named template fragments made available to the main template during
/// compilation.
pub type Partials = HashMap<String, TemplateContent>;

/// The pluggable function turning `(template, data, partials)` into markup.
///
/// A [`ViewEnv`](crate::view::ViewEnv) carries one compiler shared by every
/// view constructed from it; swap it to plug in a real template engine.
pub type Compiler = Arc<dyn Fn(&str, &TemplateData, &Partials) -> String + Send + Sync>;

/// Partial-inclusion recursion guard.
const MAX_PARTIAL_DEPTH: usize = 8;

/// The default [`Compiler`]: [`interpolate`] behind an `Arc`.
pub fn default_compiler() -> Compiler {
    Arc::new(|template, data, partials| interpolate(template, data, partials))
}

/// A minimal mustache-flavored interpolator.
///
/// `{{ key }}` is replaced with the matching data value (missing keys render
/// as nothing), and `{{> name }}` splices in the named partial, itself
/// interpolated. This is deliberately small; real applications plug in
/// their template engine of choice through the [`Compiler`] seam, but it is
/// enough for small views and for tests.
pub fn interpolate(template: &str, data: &TemplateData, partials: &Partials) -> String {
    expand(template, data, partials, MAX_PARTIAL_DEPTH)
}

fn expand(template: &str, data: &TemplateData, partials: &Partials, depth: usize) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let tag = after[..end].trim();
                if let Some(name) = tag.strip_prefix('>') {
                    if depth > 0 {
                        if let Some(partial) = partials.get(name.trim()) {
                            out.push_str(&expand(partial, data, partials, depth - 1));
                        }
                    }
                } else if let Some(value) = data.get(tag) {
                    out.push_str(value);
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated tag; emit the remainder verbatim.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> TemplateData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn partials(pairs: &[(&str, &str)]) -> Partials {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), TemplateContent::from(*v)))
            .collect()
    }

    #[test]
    fn substitutes_data_keys() {
        let out = interpolate(
            "<p>{{ greeting }}, {{name}}!</p>",
            &data(&[("greeting", "hello"), ("name", "world")]),
            &Partials::new(),
        );
        assert_eq!(out, "<p>hello, world!</p>");
    }

    #[test]
    fn missing_keys_render_empty() {
        let out = interpolate("[{{ nope }}]", &TemplateData::new(), &Partials::new());
        assert_eq!(out, "[]");
    }

    #[test]
    fn splices_partials() {
        let out = interpolate(
            "<ul>{{> row }}{{> row }}</ul>",
            &TemplateData::new(),
            &partials(&[("row", "<li>x</li>")]),
        );
        assert_eq!(out, "<ul><li>x</li><li>x</li></ul>");
    }

    #[test]
    fn partials_interpolate_their_own_placeholders() {
        let out = interpolate(
            "{{> row }}",
            &data(&[("name", "a")]),
            &partials(&[("row", "<li>{{ name }}</li>")]),
        );
        assert_eq!(out, "<li>a</li>");
    }

    #[test]
    fn nested_partials_stop_at_depth_limit() {
        // A self-including partial terminates instead of recursing forever.
        let out = interpolate(
            "{{> loop }}",
            &TemplateData::new(),
            &partials(&[("loop", "x{{> loop }}")]),
        );
        assert_eq!(out, "x".repeat(MAX_PARTIAL_DEPTH));
    }

    #[test]
    fn unterminated_tag_is_literal() {
        let out = interpolate("a {{ b", &TemplateData::new(), &Partials::new());
        assert_eq!(out, "a {{ b");
    }

    #[test]
    fn missing_partial_renders_empty() {
        let out = interpolate("<ul>{{> nope }}</ul>", &TemplateData::new(), &Partials::new());
        assert_eq!(out, "<ul></ul>");
    }
}
