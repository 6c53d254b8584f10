//! Text chunking with separator-aware boundaries and configurable overlap.
//!
//! Splits page text into windows of at most `chunk_size` characters.
//! Boundaries prefer natural breaks, tried in priority order: paragraph
//! break, line break, sentence punctuation, word boundary, with a hard
//! character cut only when nothing else fits inside the window. Each chunk
//! (except the first of a page) re-includes up to `chunk_overlap` trailing
//! characters of its predecessor so a boundary never severs a sentence's
//! context.
//!
//! All counting is in characters, never bytes; slicing stays on char
//! boundaries by construction.

use crate::types::{DocumentChunk, PageText};
use std::collections::HashMap;

/// Boundary separators in priority order.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

/// Split one text into overlapping chunks.
///
/// An empty or whitespace-only input yields zero chunks.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let overlap = chunk_overlap.min(chunk_size.saturating_sub(1));

    split_spans(&chars, chunk_size, overlap)
        .into_iter()
        .filter_map(|(start, end)| {
            let chunk: String = chars[start..end].iter().collect();
            let chunk = chunk.trim().to_string();
            if chunk.is_empty() {
                None
            } else {
                Some(chunk)
            }
        })
        .collect()
}

/// Chunk a sequence of pages, tagging each chunk with its page's provenance
/// and a per-document sequence index.
pub fn chunk_pages(
    pages: &[PageText],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<DocumentChunk> {
    let mut seq_by_document: HashMap<String, u32> = HashMap::new();
    let mut chunks = Vec::new();

    for page in pages {
        let document = page.document.to_string_lossy().to_string();

        for text in split_text(&page.text, chunk_size, chunk_overlap) {
            let seq = seq_by_document.entry(document.clone()).or_insert(0);
            chunks.push(DocumentChunk {
                id: uuid::Uuid::new_v4().to_string(),
                document: document.clone(),
                page: page.page,
                seq: *seq,
                text,
            });
            *seq += 1;
        }
    }

    tracing::debug!(
        "Chunked {} pages into {} chunks (size: {}, overlap: {})",
        pages.len(),
        chunks.len(),
        chunk_size,
        chunk_overlap
    );

    chunks
}

/// Compute chunk spans as (start, end) char offsets, end-exclusive.
///
/// Invariants: spans cover the whole text with no gaps; each span is at
/// most `chunk_size` chars; consecutive spans overlap by at most `overlap`
/// chars; starts are strictly increasing, so the walk always terminates.
fn split_spans(chars: &[char], chunk_size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let len = chars.len();
    if len == 0 {
        return Vec::new();
    }

    let mut spans = Vec::new();
    let mut start = 0;

    while start < len {
        let window_end = (start + chunk_size).min(len);
        let brk = if window_end == len {
            len
        } else {
            find_break(chars, start, window_end)
        };

        spans.push((start, brk));

        if brk >= len {
            break;
        }

        // Step back for overlap, then snap forward to a word start so the
        // next chunk never opens mid-word.
        let mut next = brk.saturating_sub(overlap).max(start + 1);
        while next < brk && !chars[next - 1].is_whitespace() {
            next += 1;
        }
        start = next;
    }

    spans
}

/// Pick the best boundary inside the window `[start, window_end)`.
///
/// Tries each separator in priority order and breaks after the last
/// occurrence inside the window; falls back to a hard cut at `window_end`.
fn find_break(chars: &[char], start: usize, window_end: usize) -> usize {
    let window: String = chars[start..window_end].iter().collect();

    for sep in SEPARATORS {
        if let Some(pos) = window.rfind(sep) {
            let brk = start + window[..pos].chars().count() + sep.chars().count();
            if brk > start && brk <= window_end {
                return brk;
            }
        }
    }

    window_end
}
