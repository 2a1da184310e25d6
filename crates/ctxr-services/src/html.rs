//! HTML to plain text stripping for fetched pages.

use scraper::{Html, Node};

const SKIP_TAGS: [&str; 4] = ["script", "style", "noscript", "head"];
const BLOCK_TAGS: [&str; 16] = [
    "p", "div", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "section",
    "article", "blockquote",
];

/// Strip tags from an HTML page, keeping visible text with newlines at
/// block boundaries. Script/style content is dropped entirely.
pub fn strip_html(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::new();
    let mut pending_break = false;

    for node in document.root_element().descendants() {
        match node.value() {
            Node::Text(t) => {
                let skip = node.ancestors().any(|a| {
                    a.value()
                        .as_element()
                        .is_some_and(|e| SKIP_TAGS.contains(&e.name()))
                });
                if skip {
                    continue;
                }
                let trimmed = t.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if pending_break && !text.is_empty() {
                    text.push('\n');
                } else if !text.is_empty() && !text.ends_with('\n') {
                    text.push(' ');
                }
                text.push_str(trimmed);
                pending_break = false;
            }
            Node::Element(e) => {
                if BLOCK_TAGS.contains(&e.name()) {
                    pending_break = true;
                }
            }
            _ => {}
        }
    }
    text
}
