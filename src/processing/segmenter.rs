//! Splits long-form text into chunks the speech backend can take in one call.
//!
//! Each pass looks at a window of at most `limit` characters and cuts after the
//! last break character of the highest-priority class found in that window:
//!
//! 1. newline
//! 2. Bengali sentence enders (`।`, `॥`)
//! 3. `.` `!` `?`
//! 4. plain space
//!
//! When the window has none of these the text is hard-cut at `limit` characters.
//! Limits are counted in Unicode scalar values, not bytes.

/// Safe character limit per segment.
/// 3000 characters is roughly 750 tokens, well under the backend's 8192 token ceiling.
pub const DEFAULT_SEGMENT_CHAR_LIMIT: usize = 3000;

/// Break classes in priority order. The first class with any match wins.
const BREAK_CLASSES: &[&[char]] = &[&['\n'], &['।', '॥'], &['.', '!', '?'], &[' ']];

/// Split `text` into ordered, non-empty chunks of at most `limit` characters.
///
/// Whitespace at chunk boundaries is trimmed; nothing else is dropped. A `limit`
/// of zero is treated as one.
///
/// ```
/// use narrator_lib::processing::segment;
///
/// let chunks = segment("Hello world. Bye.", 6);
/// assert_eq!(chunks, vec!["Hello", "world.", "Bye."]);
/// ```
pub fn segment(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut remaining = text.trim();

    while !remaining.is_empty() {
        let window_end = match remaining.char_indices().nth(limit) {
            Some((byte_idx, _)) => byte_idx,
            None => {
                chunks.push(remaining.to_string());
                break;
            }
        };

        let window = &remaining[..window_end];
        let cut = find_break(window).unwrap_or_else(|| {
            log::debug!(
                "Segmenter: no break point in {} char window, hard cut",
                limit
            );
            window_end
        });

        let chunk = remaining[..cut].trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        remaining = remaining[cut..].trim();
    }

    chunks
}

/// Byte offset just past the preferred break character in `window`, if any.
fn find_break(window: &str) -> Option<usize> {
    BREAK_CLASSES.iter().find_map(|class| {
        window
            .char_indices()
            .filter(|(_, c)| class.contains(c))
            .last()
            .map(|(idx, c)| idx + c.len_utf8())
    })
}
