/// Decode plain-text bytes. Invalid UTF-8 sequences become U+FFFD.
pub(crate) fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Cap `text` at `limit` characters, appending `marker` when anything was cut.
///
/// Returns the (possibly shortened) text and whether truncation happened.
/// Text at or under the limit is returned unchanged.
pub(crate) fn truncate(text: String, limit: usize, marker: &str) -> (String, bool) {
    match text.char_indices().nth(limit) {
        None => (text, false),
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + marker.len());
            out.push_str(&text[..cut]);
            out.push_str(marker);
            (out, true)
        }
    }
}
