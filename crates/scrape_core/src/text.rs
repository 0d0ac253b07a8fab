/// Truncates `text` to at most `max_chars` characters, trimming trailing
/// whitespace left at the cut. Never splits a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].trim_end().to_string(),
        None => text.to_string(),
    }
}
