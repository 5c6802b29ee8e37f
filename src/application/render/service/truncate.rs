use std::borrow::Cow;

/// Marker appended to truncated source text.
pub const ELLIPSIS: &str = "...";

/// Shorten `text` to at most `max_length` characters before parsing.
///
/// When the cut would land inside a word and the last space of the cut window
/// sits in its final fifth, the cut retracts to that space. This operates on raw
/// markdown and can split markup (a half-written link, an unterminated fence);
/// the parser then degrades the fragment to literal text.
pub fn truncate(text: &str, max_length: Option<usize>) -> Cow<'_, str> {
    let Some(max_length) = max_length else {
        return Cow::Borrowed(text);
    };

    let Some((cut, _)) = text.char_indices().nth(max_length) else {
        return Cow::Borrowed(text);
    };

    let mut head = &text[..cut];
    let threshold = max_length * 4 / 5;
    let last_space = head
        .char_indices()
        .enumerate()
        .filter(|(_, (_, ch))| *ch == ' ')
        .last();

    if let Some((char_index, (byte_index, _))) = last_space
        && char_index >= threshold
    {
        head = &head[..byte_index];
    }

    let mut truncated = String::with_capacity(head.len() + ELLIPSIS.len());
    truncated.push_str(head);
    truncated.push_str(ELLIPSIS);
    Cow::Owned(truncated)
}
