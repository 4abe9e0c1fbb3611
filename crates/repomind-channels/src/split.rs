use std::borrow::Cow;

/// Discord's per-message character limit.
pub const MAX_MESSAGE_CHARS: usize = 2000;
/// Piece size used once a reply exceeds [`MAX_MESSAGE_CHARS`].
pub const SPLIT_CHARS: usize = 1900;

/// Split a reply for Discord.
///
/// Text of at most 2000 characters is returned whole; longer text becomes
/// consecutive pieces of at most 1900 characters, cut on char boundaries.
#[must_use]
pub fn split_message(text: &str) -> Vec<&str> {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return vec![text];
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == SPLIT_CHARS {
            pieces.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// Cut `text` to at most `max_chars` characters, marking the cut with `…`.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        None => Cow::Borrowed(text),
        Some(_) => {
            let keep = max_chars.saturating_sub(1);
            let end = text.char_indices().nth(keep).map_or(text.len(), |(i, _)| i);
            Cow::Owned(format!("{}…", &text[..end]))
        }
    }
}
