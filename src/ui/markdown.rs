//! Markdown to display-safe HTML.
//!
//! Raw HTML in a message is shown as text, never passed through, and links
//! with script-capable schemes are neutralized. Rendering is total: any input
//! produces output.

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

const UNSAFE_SCHEMES: &[&str] = &["javascript:", "vbscript:", "data:"];

fn parser_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

fn is_unsafe_url(url: &str) -> bool {
    let lowered = url.trim_start().to_ascii_lowercase();
    UNSAFE_SCHEMES
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
}

fn sanitize_event(event: Event<'_>) -> Event<'_> {
    match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) if is_unsafe_url(&dest_url) => Event::Start(Tag::Link {
            link_type,
            dest_url: CowStr::Borrowed("#"),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) if is_unsafe_url(&dest_url) => Event::Start(Tag::Image {
            link_type,
            dest_url: CowStr::Borrowed(""),
            title,
            id,
        }),
        other => other,
    }
}

pub fn render(text: &str) -> String {
    let parser = Parser::new_ext(text, parser_options()).map(sanitize_event);
    let mut output = String::with_capacity(text.len() + text.len() / 2);
    html::push_html(&mut output, parser);

    // Input made only of link definitions and the like renders to nothing.
    if output.trim().is_empty() && !text.trim().is_empty() {
        return format!("<p>{}</p>\n", escape_html(text.trim()));
    }
    output
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
