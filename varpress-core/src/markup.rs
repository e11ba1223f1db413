//! Content transforms: provenance front matter stripping and Markdown
//! rendering into the HTML the LMS page resource expects.

use pulldown_cmark::{html, Event, Options, Parser};

/// Remove a leading YAML front-matter block if present.
///
/// Cuts through the *first* closing fence only, so a `---` sequence later in
/// the body is never mistaken for the close. Input without a leading fence
/// is returned unchanged, which also makes the operation idempotent.
pub fn strip_front_matter(text: &str) -> &str {
    if let Some(rest) = text.strip_prefix("---") {
        if let Some(end) = rest.find("\n---") {
            return rest[end + 4..].trim_start();
        }
    }
    text
}

/// Convert a Markdown body to HTML.
///
/// Deterministic: fenced code blocks pass through verbatim, tables are
/// converted, and soft line breaks are promoted to hard breaks so authored
/// line structure survives rendering.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

/// Compose the display title for one published variant page.
pub fn page_title(module_title: &str, audience: &str, locale: &str) -> String {
    format!("{module_title} [{audience} / {locale}]")
}
