//! Text cleanup and overlapping windows for the slow path.

/// Punctuation kept by [`clean_text`]; everything else that is not a letter,
/// digit or whitespace is dropped.
const ALLOWED_PUNCTUATION: &[char] = &[
    '.', ',', ';', ':', '!', '?', '-', '–', '—', '№', '"', '\'', '«', '»', '(', ')', '/', '%',
    '+', '=', '@', '#', '&', '_', '₽', '$', '€',
];

/// Drops characters outside the allowed set and collapses whitespace runs to
/// a single space.
pub fn clean_text(text: &str) -> String {
    let filtered: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || ALLOWED_PUNCTUATION.contains(c))
        .collect();
    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Splits `text` into windows of `size` characters where consecutive windows
/// share `overlap` characters. At most `max_windows` windows are returned.
///
/// `overlap` must be smaller than `size`; config validation guarantees it.
pub fn windows(text: &str, size: usize, overlap: usize, max_windows: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() || size == 0 || max_windows == 0 {
        return Vec::new();
    }

    let step = size.saturating_sub(overlap).max(1);
    let mut result = Vec::new();
    let mut start = 0;

    while start < chars.len() && result.len() < max_windows {
        let end = (start + size).min(chars.len());
        result.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    result
}
