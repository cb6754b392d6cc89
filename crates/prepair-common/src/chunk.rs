//! Fixed-size text chunking.
//!
//! Chunks are purely positional slices of the raw text — never semantic.
//! Joining cleaned chunks back in ordinal order must reconstruct the
//! document, so slicing is done on character counts at UTF-8 boundaries.

/// One positional fragment of a longer text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub index: usize,
    pub text: String,
}

/// Split `text` into consecutive chunks of at most `limit` characters.
/// An empty input yields no chunks; `limit` is clamped to at least 1.
pub fn chunk_text(text: &str, limit: usize) -> Vec<TextChunk> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut chars_in_chunk = 0;

    for (pos, _) in text.char_indices() {
        if chars_in_chunk == limit {
            chunks.push(TextChunk {
                index: chunks.len(),
                text: text[start..pos].to_string(),
            });
            start = pos;
            chars_in_chunk = 0;
        }
        chars_in_chunk += 1;
    }
    if start < text.len() {
        chunks.push(TextChunk {
            index: chunks.len(),
            text: text[start..].to_string(),
        });
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejoin(chunks: &[TextChunk]) -> String {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    #[test]
    fn test_round_trip_exact_multiple() {
        let text = "abcdef";
        let chunks = chunk_text(text, 2);
        assert_eq!(chunks.len(), 3);
        assert_eq!(rejoin(&chunks), text);
    }

    #[test]
    fn test_round_trip_with_remainder() {
        let text = "abcdefg";
        let chunks = chunk_text(text, 3);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].text, "g");
        assert_eq!(rejoin(&chunks), text);
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_text("", 10).is_empty());
    }

    #[test]
    fn test_chunk_indices_are_ordinal() {
        let chunks = chunk_text("0123456789", 4);
        let indices: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_multibyte_boundaries_survive() {
        let text = "αβγδε ζη θικλμ — ⟨x⟩ 研究論文";
        for limit in 1..=text.chars().count() + 1 {
            let chunks = chunk_text(text, limit);
            assert_eq!(rejoin(&chunks), text, "limit {limit}");
            for c in &chunks[..chunks.len().saturating_sub(1)] {
                assert_eq!(c.text.chars().count(), limit);
            }
        }
    }

    #[test]
    fn test_limit_larger_than_text() {
        let chunks = chunk_text("short", 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short");
    }
}
