use varpress_core::markup::{markdown_to_html, page_title, strip_front_matter};

#[test]
fn strip_front_matter_removes_leading_block() {
    assert_eq!(strip_front_matter("---\nid: x\n---\n\nBody"), "Body");
}

#[test]
fn strip_front_matter_is_identity_without_a_fence() {
    let text = "# Heading\n\nNo front matter here.";
    assert_eq!(strip_front_matter(text), text);
}

#[test]
fn strip_front_matter_is_idempotent_on_stripped_input() {
    let raw = "---\nid: x\ntitle: T\n---\n\n# Body\n\ntext";
    let once = strip_front_matter(raw);
    assert_eq!(strip_front_matter(once), once);
}

#[test]
fn strip_front_matter_stops_at_the_first_closing_fence() {
    // The thematic break in the body must not be treated as the close.
    let raw = "---\nid: x\n---\n\nIntro\n\n---\n\nOutro";
    assert_eq!(strip_front_matter(raw), "Intro\n\n---\n\nOutro");
}

#[test]
fn strip_front_matter_handles_unclosed_fence() {
    let raw = "--- this is just a line that starts with dashes";
    assert_eq!(strip_front_matter(raw), raw);
}

#[test]
fn markdown_preserves_fenced_code_verbatim() {
    let html = markdown_to_html("```python\nx = 1 < 2\n```\n");
    assert!(html.contains("<pre><code"), "got: {html}");
    assert!(html.contains("x = 1 &lt; 2"), "got: {html}");
}

#[test]
fn markdown_converts_tables() {
    let html = markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |\n");
    assert!(html.contains("<table>"), "got: {html}");
    assert!(html.contains("<td>1</td>"), "got: {html}");
}

#[test]
fn markdown_renders_single_newlines_as_hard_breaks() {
    let html = markdown_to_html("line one\nline two\n");
    assert!(html.contains("<br"), "got: {html}");
}

#[test]
fn markdown_converts_lists() {
    let html = markdown_to_html("- one\n- two\n");
    assert!(html.contains("<ul>"), "got: {html}");
    assert!(html.contains("<li>one</li>"), "got: {html}");
}

#[test]
fn page_title_contains_audience_and_locale() {
    assert_eq!(
        page_title("Core Concepts", "developer", "en-US"),
        "Core Concepts [developer / en-US]"
    );
}
