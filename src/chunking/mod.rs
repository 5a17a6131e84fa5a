//! Fixed-size text chunking.
//!
//! Text is split on raw character offsets into `ceil(len / segment_size)`
//! chunks, where `segment_size = max(len / max_segments, MIN_SEGMENT_SIZE)`.
//! The floor keeps short documents from being shredded into tiny segments.
//! Concatenating the chunks in order reproduces the input exactly.

use crate::core::Chunk;

/// Smallest segment size in characters.
pub const MIN_SEGMENT_SIZE: usize = 500;

/// Default upper bound on segments per document.
pub const DEFAULT_MAX_SEGMENTS: usize = 20;

/// How a text will be split, without materializing the chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    /// Input length in characters.
    pub char_len: usize,
    /// Segment size in characters.
    pub segment_size: usize,
    /// Number of chunks.
    pub chunk_count: usize,
}

/// Segment size for a text of `char_len` characters.
///
/// `max_segments == 0` is treated as 1.
#[must_use]
pub fn segment_size(char_len: usize, max_segments: usize) -> usize {
    (char_len / max_segments.max(1)).max(MIN_SEGMENT_SIZE)
}

/// Computes the chunk plan for `text`.
#[must_use]
pub fn plan(text: &str, max_segments: usize) -> ChunkPlan {
    let char_len = text.chars().count();
    let size = segment_size(char_len, max_segments);
    ChunkPlan {
        char_len,
        segment_size: size,
        chunk_count: char_len.div_ceil(size),
    }
}

/// Splits `text` into ordered chunks.
///
/// Empty input yields no chunks.
#[must_use]
pub fn chunk(text: &str, max_segments: usize) -> Vec<Chunk> {
    if text.is_empty() {
        return Vec::new();
    }

    // Byte offset of every character, so slicing never splits a code point.
    let boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let char_len = boundaries.len();
    let size = segment_size(char_len, max_segments);
    let total = char_len.div_ceil(size);

    (0..total)
        .map(|index| {
            let start = index * size;
            let end = (start + size).min(char_len);
            let start_byte = boundaries[start];
            let end_byte = boundaries.get(end).copied().unwrap_or(text.len());
            Chunk {
                index,
                text: text[start_byte..end_byte].to_string(),
                start_offset: start,
                end_offset: end,
                total_chunk_count: total,
            }
        })
        .collect()
}

/// Normalizes scraped text before chunking.
///
/// - CRLF and lone CR become LF
/// - control characters other than newline and tab are removed
/// - runs of spaces/tabs become one space; whitespace at line edges is dropped
/// - three or more consecutive newlines become one blank line
/// - leading and trailing whitespace is removed
#[must_use]
pub fn clean_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    let mut newlines = 0usize;
    let mut prev_cr = false;

    for ch in raw.chars() {
        match ch {
            '\n' if prev_cr => {}
            '\r' | '\n' => {
                newlines += 1;
                pending_space = false;
            }
            ' ' | '\t' => {
                if newlines == 0 {
                    pending_space = true;
                }
            }
            c if c.is_control() => {}
            c => {
                if !out.is_empty() {
                    if newlines >= 2 {
                        out.push_str("\n\n");
                    } else if newlines == 1 {
                        out.push('\n');
                    } else if pending_space {
                        out.push(' ');
                    }
                }
                newlines = 0;
                pending_space = false;
                out.push(c);
            }
        }
        prev_cr = ch == '\r';
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk("", 10).is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = chunk("hello world", 20);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world");
        assert_eq!(chunks[0].total_chunk_count, 1);
        assert!(chunks[0].is_last());
    }

    #[test]
    fn test_twelve_thousand_chars_twenty_segments() {
        let text = "x".repeat(12_000);
        let p = plan(&text, 20);
        assert_eq!(p.segment_size, 600);
        assert_eq!(p.chunk_count, 20);

        let chunks = chunk(&text, 20);
        assert_eq!(chunks.len(), 20);
        assert!(chunks.iter().all(|c| c.char_len() == 600));
        assert_eq!(chunks[19].start_offset, 11_400);
        assert_eq!(chunks[19].end_offset, 12_000);
    }

    #[test]
    fn test_floor_applies_to_short_documents() {
        let text = "y".repeat(1_001);
        let p = plan(&text, 10);
        assert_eq!(p.segment_size, MIN_SEGMENT_SIZE);
        assert_eq!(p.chunk_count, 3);
    }

    #[test]
    fn test_zero_max_segments_treated_as_one() {
        let text = "z".repeat(2_000);
        assert_eq!(chunk(&text, 0).len(), 1);
    }

    #[test]
    fn test_multibyte_offsets_are_characters() {
        let text = "é".repeat(1_000);
        let chunks = chunk(&text, 2);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text.chars().count(), 500);
        assert_eq!(chunks[1].start_offset, 500);
    }

    #[test]
    fn test_clean_text() {
        let raw = "  Acme\tInc.  \r\n\r\n\r\n\r\nWe   build\u{0007} rockets.  \nNext line\n\n";
        assert_eq!(clean_text(raw), "Acme Inc.\n\nWe build rockets.\nNext line");
    }

    #[test]
    fn test_clean_text_is_idempotent() {
        let once = clean_text("a \t b\n\n\n\nc  ");
        assert_eq!(clean_text(&once), once);
    }

    proptest! {
        #[test]
        fn prop_chunks_cover_input(text in "\\PC{0,3000}", max_segments in 0usize..40) {
            let chunks = chunk(&text, max_segments);
            let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
            prop_assert_eq!(joined, text.clone());
            prop_assert_eq!(chunks.len(), plan(&text, max_segments).chunk_count);
        }

        #[test]
        fn prop_non_final_chunks_meet_floor(text in "[a-z ]{0,5000}", max_segments in 1usize..40) {
            let chunks = chunk(&text, max_segments);
            for c in chunks.iter().filter(|c| !c.is_last()) {
                prop_assert!(c.char_len() >= MIN_SEGMENT_SIZE);
            }
            if let Some(last) = chunks.last() {
                prop_assert!(last.char_len() >= 1);
            }
        }

        #[test]
        fn prop_offsets_are_contiguous(text in "\\PC{1,2000}", max_segments in 1usize..10) {
            let chunks = chunk(&text, max_segments);
            for pair in chunks.windows(2) {
                prop_assert_eq!(pair[0].end_offset, pair[1].start_offset);
            }
            prop_assert_eq!(chunks[0].start_offset, 0);
        }
    }
}
