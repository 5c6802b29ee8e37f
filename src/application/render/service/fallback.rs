//! Guaranteed-safe rendering used when the regular pipeline fails.
//!
//! The output is plain text: every markup-significant character is replaced by
//! its entity and the only tag ever introduced is the fixed `<br/>` for line
//! breaks. It therefore needs no sanitisation pass of its own.

const LINE_BREAK: &str = "<br/>";

/// Escape `text` for display as literal content, converting line breaks to `<br/>`.
pub fn escape_fallback(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + text.len() / 8);
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\r' if chars.peek() == Some(&'\n') => {
                chars.next();
                escaped.push_str(LINE_BREAK);
            }
            '\n' => escaped.push_str(LINE_BREAK),
            other => push_escaped(&mut escaped, other),
        }
    }

    escaped
}

/// Escape text content for embedding inside an element body.
pub(crate) fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        push_escaped(&mut escaped, ch);
    }
    escaped
}

/// Escape an attribute value; control whitespace collapses to a space.
pub(crate) fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\n' | '\r' | '\t' => escaped.push(' '),
            other => push_escaped(&mut escaped, other),
        }
    }
    escaped
}

fn push_escaped(buffer: &mut String, ch: char) {
    match ch {
        '&' => buffer.push_str("&amp;"),
        '<' => buffer.push_str("&lt;"),
        '>' => buffer.push_str("&gt;"),
        '"' => buffer.push_str("&quot;"),
        '\'' => buffer.push_str("&#39;"),
        other => buffer.push(other),
    }
}
