//! Bounded, overlapping text chunking with exact byte/line offsets (C2).

use serde::{Deserialize, Serialize};

use super::tokenize::whitespace_tokens_with_offsets;

/// A bounded text window within a parent file.
///
/// `chunk_index` is zero-based and monotonic in `start_char`. Offsets are
/// byte offsets into the original text; `start_line`/`end_line` are 1-based
/// and inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_index: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
}

/// 1-based line number of the given byte offset, found by counting newlines
/// up to it rather than re-splitting the text into lines.
fn line_at(text: &str, byte_offset: usize) -> usize {
    text[..byte_offset].matches('\n').count() + 1
}

/// Split `text` into an ordered sequence of overlapping chunks.
///
/// For inputs of at most `max_tokens` tokens, emits exactly one chunk
/// spanning the whole text with `chunk_index = 0`. For empty (or
/// whitespace-only) text, emits zero chunks. Consecutive chunks overlap by
/// approximately `overlap_tokens` tokens.
pub fn chunk_text(text: &str, max_tokens: usize, overlap_tokens: usize) -> Vec<Chunk> {
    let tokens = whitespace_tokens_with_offsets(text);
    if tokens.is_empty() {
        return Vec::new();
    }

    if tokens.len() <= max_tokens {
        return vec![Chunk {
            chunk_index: 0,
            start_char: 0,
            end_char: text.len(),
            start_line: 1,
            end_line: line_at(text, text.len()),
            text: text.to_string(),
        }];
    }

    let step = max_tokens.saturating_sub(overlap_tokens).max(1);
    let mut chunks = Vec::new();
    let mut idx = 0;
    let mut chunk_index = 0;

    loop {
        let end_tok = (idx + max_tokens).min(tokens.len());
        let start_char = tokens[idx].0;
        let end_char = tokens[end_tok - 1].1;

        chunks.push(Chunk {
            chunk_index,
            start_char,
            end_char,
            start_line: line_at(text, start_char),
            end_line: line_at(text, end_char),
            text: text[start_char..end_char].to_string(),
        });

        chunk_index += 1;
        if end_tok == tokens.len() {
            break;
        }
        idx += step;
    }

    chunks
}

/// Build the canonical `ChunkId` for the `index`-th chunk of `parent_path`.
pub fn make_chunk_id(parent_path: &str, index: usize) -> String {
    format!("{parent_path}#chunk_{index}")
}

/// Split a `ChunkId` back into its parent path and (if chunked) chunk index.
///
/// Whole-file ids (no recognizable `#chunk_N` suffix) parse back to
/// `(id, None)`.
pub fn parse_chunk_id(id: &str) -> (String, Option<usize>) {
    if let Some((parent, suffix)) = id.rsplit_once("#chunk_") {
        if let Ok(index) = suffix.parse::<usize>() {
            return (parent.to_string(), Some(index));
        }
    }
    (id.to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", 100, 10).is_empty());
        assert!(chunk_text("   \n\t  ", 100, 10).is_empty());
    }

    #[test]
    fn short_text_yields_single_chunk() {
        let text = "hello world\nfoo bar";
        let chunks = chunk_text(text, 100, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks[0].end_char, text.len());
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 2);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn long_text_overlaps_and_covers_in_order() {
        let words: Vec<String> = (0..50).map(|i| format!("w{i}")).collect();
        let text = words.join(" ");
        let chunks = chunk_text(&text, 10, 3);

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert!(pair[0].chunk_index < pair[1].chunk_index);
            assert!(pair[0].start_char < pair[1].start_char);
            assert!(pair[1].start_char < pair[0].end_char);
        }
        assert_eq!(chunks.last().unwrap().end_char, text.len());
    }

    #[test]
    fn chunk_id_roundtrip() {
        assert_eq!(parse_chunk_id("src/a.rs"), ("src/a.rs".to_string(), None));
        assert_eq!(
            parse_chunk_id(&make_chunk_id("src/a.rs", 3)),
            ("src/a.rs".to_string(), Some(3))
        );
    }
}
