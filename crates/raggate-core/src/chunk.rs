//! Sliding-window text chunker with overlap.
//!
//! Splits document body text into windows bounded by `max_tokens`, where
//! consecutive windows share an `overlap_tokens` tail so that context is
//! not lost at chunk boundaries. Window ends prefer newline or space
//! boundaries so words stay intact, and all splits snap to valid UTF-8
//! char boundaries.
//!
//! Token counts use a rough 4-chars-per-token heuristic rather than a
//! real tokenizer; the chunker is a deterministic black box as far as
//! the rest of the pipeline is concerned.
//!
//! # Guarantees
//!
//! - Empty or whitespace-only input yields an empty sequence, not an
//!   error and not a single empty chunk.
//! - Whitespace-only windows are never emitted.
//! - Output is deterministic for a given input and configuration.
//! - With `overlap_tokens = 0` the chunks partition the text: joining
//!   them reproduces the input up to whitespace trimming at the seams.

use crate::models::{Chunk, SourceFile};

/// Approximate characters-per-token ratio (4 chars ≈ 1 token).
const CHARS_PER_TOKEN: usize = 4;

/// Default window size, in tokens.
pub const DEFAULT_MAX_TOKENS: usize = 1024;

/// Default overlap between consecutive windows, in tokens.
pub const DEFAULT_OVERLAP_TOKENS: usize = 256;

/// Split `text` into overlapping windows of at most `max_tokens` tokens.
///
/// Consecutive windows overlap by roughly `overlap_tokens` tokens. An
/// overlap equal to or larger than the window size is clamped so the
/// scan always makes forward progress.
pub fn chunk_text(text: &str, max_tokens: usize, overlap_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN).max(1);
    let overlap_chars = overlap_tokens
        .saturating_mul(CHARS_PER_TOKEN)
        .min(max_chars.saturating_sub(1));

    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let len = text.len();
    let mut start = 0usize;

    while start < len {
        let mut end = snap_to_char_boundary(text, (start + max_chars).min(len));

        // Prefer to end on a newline or space so words stay whole.
        if end < len {
            if let Some(pos) = text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
            {
                if pos > 0 {
                    end = start + pos + 1;
                }
            }
        }

        if end <= start {
            // Pathological input (a single unbroken run wider than the
            // window): force one char of progress.
            end = next_char_boundary(text, start + 1);
        }

        let piece = text[start..end].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }

        if end >= len {
            break;
        }

        let mut next = snap_to_char_boundary(text, end.saturating_sub(overlap_chars));
        if next <= start {
            next = end;
        }
        start = next;
    }

    chunks
}

/// Chunk a source file and assign deterministic ids.
///
/// Ids take the form `"{file_name}_part_{seq}"` with `seq` starting at 1
/// and increasing by one per non-empty chunk, independent of any other
/// file processed in the same run. Re-chunking an unchanged file yields
/// the same ids, which is what makes re-ingestion an overwrite rather
/// than an append.
pub fn chunk_file(file: &SourceFile, max_tokens: usize, overlap_tokens: usize) -> Vec<Chunk> {
    chunk_text(&file.body, max_tokens, overlap_tokens)
        .into_iter()
        .enumerate()
        .map(|(i, text)| Chunk {
            id: format!("{}_part_{}", file.file_name, i + 1),
            file_name: file.file_name.clone(),
            seq: i + 1,
            text,
        })
        .collect()
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Advance a byte index to the next valid UTF-8 char boundary.
fn next_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_ws(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_empty_input_yields_no_chunks() {
        assert!(chunk_text("", 1024, 256).is_empty());
    }

    #[test]
    fn test_whitespace_only_yields_no_chunks() {
        assert!(chunk_text("  \n\t  \n", 1024, 256).is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Office hours are 9 to 5.", 1024, 256);
        assert_eq!(chunks, vec!["Office hours are 9 to 5.".to_string()]);
    }

    #[test]
    fn test_long_text_multiple_chunks() {
        let text = (0..200)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text(&text, 10, 2);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(!c.trim().is_empty());
        }
    }

    #[test]
    fn test_no_overlap_partitions_text() {
        let text = (0..100)
            .map(|i| format!("tok{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_text(&text, 8, 0);
        assert!(chunks.len() > 1);
        assert_eq!(strip_ws(&chunks.join(" ")), strip_ws(&text));
    }

    #[test]
    fn test_overlap_duplicates_content() {
        let text = (0..100)
            .map(|i| format!("tok{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let joined: usize = chunk_text(&text, 8, 4)
            .iter()
            .map(|c| strip_ws(c).len())
            .sum();
        assert!(joined > strip_ws(&text).len());
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha beta gamma delta epsilon zeta eta theta iota kappa.";
        assert_eq!(chunk_text(text, 3, 1), chunk_text(text, 3, 1));
    }

    #[test]
    fn test_multibyte_utf8_does_not_panic() {
        let text = "héllo wörld ωραία μέρα σήμερα 今日は ".repeat(20);
        let chunks = chunk_text(&text, 4, 1);
        assert!(!chunks.is_empty());
    }

    #[test]
    fn test_unbroken_run_still_progresses() {
        let text = "x".repeat(100);
        let chunks = chunk_text(&text, 2, 1);
        assert!(!chunks.is_empty());
        assert!(strip_ws(&chunks.join("")).len() >= text.len());
    }

    #[test]
    fn test_chunk_file_ids_one_based() {
        let file = SourceFile {
            file_name: "policy.md".to_string(),
            access_group: "hr".to_string(),
            body: (0..80)
                .map(|i| format!("clause{}", i))
                .collect::<Vec<_>>()
                .join(" "),
        };
        let chunks = chunk_file(&file, 8, 2);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.seq, i + 1);
            assert_eq!(c.id, format!("policy.md_part_{}", i + 1));
            assert_eq!(c.file_name, "policy.md");
        }
    }

    #[test]
    fn test_chunk_file_empty_body() {
        let file = SourceFile {
            file_name: "blank.md".to_string(),
            access_group: "general".to_string(),
            body: "   \n".to_string(),
        };
        assert!(chunk_file(&file, 1024, 256).is_empty());
    }
}
