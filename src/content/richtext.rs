//! Rich text to HTML
//!
//! Consecutive list items are grouped into one list; inline spans are nested
//! by (start, longest first) and reopened when they overlap.

use tera::escape_html;

use super::{InlineSpan, RichTextSpan};

/// Render a rich-text body as HTML
pub fn as_html(body: &[RichTextSpan]) -> String {
    let mut html = String::new();
    let mut open_list: Option<&'static str> = None;

    for element in body {
        let list = match element.kind.as_str() {
            "list-item" => Some("ul"),
            "o-list-item" => Some("ol"),
            _ => None,
        };

        if open_list != list {
            if let Some(tag) = open_list {
                html.push_str(&format!("</{}>", tag));
            }
            if let Some(tag) = list {
                html.push_str(&format!("<{}>", tag));
            }
            open_list = list;
        }

        html.push_str(&render_element(element));
    }

    if let Some(tag) = open_list {
        html.push_str(&format!("</{}>", tag));
    }

    html
}

fn render_element(element: &RichTextSpan) -> String {
    let inner = || render_inline(&element.text, &element.spans);

    match element.kind.as_str() {
        kind @ ("heading1" | "heading2" | "heading3" | "heading4" | "heading5" | "heading6") => {
            let level = &kind["heading".len()..];
            format!("<h{}>{}</h{}>", level, inner(), level)
        }
        "list-item" | "o-list-item" => format!("<li>{}</li>", inner()),
        "preformatted" => format!("<pre>{}</pre>", inner()),
        "image" => match &element.url {
            Some(url) => format!(
                r#"<p class="block-img"><img src="{}" alt="{}"></p>"#,
                escape_html(url),
                escape_html(element.alt.as_deref().unwrap_or(""))
            ),
            None => String::new(),
        },
        _ => format!("<p>{}</p>", inner()),
    }
}

/// Render text with its inline spans
fn render_inline(text: &str, spans: &[InlineSpan]) -> String {
    let offsets = Utf16Offsets::new(text);

    // (byte start, byte end, span) for non-empty spans, in nesting order
    let mut ranges: Vec<(usize, usize, &InlineSpan)> = spans
        .iter()
        .map(|s| (offsets.byte(s.start), offsets.byte(s.end), s))
        .filter(|(start, end, _)| start < end)
        .collect();
    if ranges.is_empty() {
        return escape_text(text);
    }
    ranges.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut bounds: Vec<usize> = vec![0, text.len()];
    for (start, end, _) in &ranges {
        bounds.push(*start);
        bounds.push(*end);
    }
    bounds.sort_unstable();
    bounds.dedup();

    let mut html = String::new();
    let mut stack: Vec<usize> = Vec::new();

    for window in bounds.windows(2) {
        let (from, to) = (window[0], window[1]);
        let active: Vec<usize> = ranges
            .iter()
            .enumerate()
            .filter(|(_, (start, end, _))| *start <= from && to <= *end)
            .map(|(i, _)| i)
            .collect();

        let common = stack
            .iter()
            .zip(active.iter())
            .take_while(|(a, b)| a == b)
            .count();

        while stack.len() > common {
            if let Some(i) = stack.pop() {
                html.push_str(&close_tag(ranges[i].2));
            }
        }
        for &i in &active[common..] {
            html.push_str(&open_tag(ranges[i].2));
            stack.push(i);
        }

        html.push_str(&escape_text(&text[from..to]));
    }

    while let Some(i) = stack.pop() {
        html.push_str(&close_tag(ranges[i].2));
    }

    html
}

fn open_tag(span: &InlineSpan) -> String {
    match span.kind.as_str() {
        "strong" => "<strong>".to_string(),
        "em" => "<em>".to_string(),
        "hyperlink" => {
            let data = span.data.as_ref();
            let url = data.and_then(|d| d.url.as_deref()).unwrap_or("#");
            match data.and_then(|d| d.target.as_deref()) {
                Some(target) => format!(
                    r#"<a href="{}" target="{}" rel="noopener">"#,
                    escape_html(url),
                    escape_html(target)
                ),
                None => format!(r#"<a href="{}">"#, escape_html(url)),
            }
        }
        other => format!(r#"<span class="{}">"#, escape_html(other)),
    }
}

fn close_tag(span: &InlineSpan) -> String {
    match span.kind.as_str() {
        "strong" => "</strong>",
        "em" => "</em>",
        "hyperlink" => "</a>",
        _ => "</span>",
    }
    .to_string()
}

fn escape_text(text: &str) -> String {
    escape_html(text).replace('\n', "<br />")
}

/// Maps UTF-16 offsets (as sent by the API) to byte offsets
struct Utf16Offsets {
    /// (utf16 offset, byte offset) at every char boundary, plus the end
    points: Vec<(usize, usize)>,
}

impl Utf16Offsets {
    fn new(text: &str) -> Self {
        let mut points = Vec::with_capacity(text.len() + 1);
        let mut utf16 = 0;
        for (byte, c) in text.char_indices() {
            points.push((utf16, byte));
            utf16 += c.len_utf16();
        }
        points.push((utf16, text.len()));
        Self { points }
    }

    /// Byte offset of the last char boundary at or before `utf16`
    fn byte(&self, utf16: usize) -> usize {
        let idx = self.points.partition_point(|(u, _)| *u <= utf16);
        self.points[idx.saturating_sub(1)].1
    }
}
