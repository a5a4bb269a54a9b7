//! Overlapping fixed-size character windows over extracted text.

use crate::error::ConfigError;
use crate::models::{Chunk, ChunkingConfig, SourceKind, TextBlock};
use crate::utils::is_blank;

/// Splits text blocks into overlapping chunks.
///
/// Consecutive chunks of one block share exactly `overlap` characters. Chunk ends prefer a
/// natural break point in the last fifth of the window, but never one that would leave the
/// next window without forward progress.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Maximum chunk length in characters.
    chunk_size: usize,
    /// Characters shared by consecutive chunks.
    overlap: usize,
}

impl TextChunker {
    pub fn new(config: &ChunkingConfig) -> Result<Self, ConfigError> {
        if config.chunk_size == 0 || config.chunk_overlap >= config.chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        Ok(Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
        })
    }

    pub fn with_defaults() -> Self {
        let config = ChunkingConfig::default();
        Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Chunk every block of one source. Indices run across blocks in order; blank blocks
    /// contribute nothing, so an all-blank source yields no chunks.
    pub fn chunk(&self, source: &str, kind: SourceKind, blocks: &[TextBlock]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for block in blocks {
            if is_blank(&block.text) {
                continue;
            }
            for (content, start, end) in self.split_text(&block.text) {
                let index = chunks.len() as u32;
                chunks.push(Chunk::new(source, kind, content, index, block.page, start, end));
            }
        }

        chunks
    }

    /// Split one string into `(content, start_offset, end_offset)` windows, offsets in chars.
    pub fn split_text(&self, content: &str) -> Vec<(String, u64, u64)> {
        let chars: Vec<char> = content.chars().collect();
        let total_chars = chars.len();
        let mut chunks = Vec::new();

        let mut start = 0;
        while start < total_chars {
            let target_end = (start + self.chunk_size).min(total_chars);
            let end = self.find_break_point(&chars, start, target_end);

            chunks.push((
                chars[start..end].iter().collect(),
                start as u64,
                end as u64,
            ));

            if end >= total_chars {
                break;
            }
            // end > start + overlap, so this always advances
            start = end - self.overlap;
        }

        chunks
    }

    /// Find a natural break point in `(start + overlap, target_end]`, near the end.
    fn find_break_point(&self, chars: &[char], start: usize, target_end: usize) -> usize {
        if target_end >= chars.len() {
            return chars.len();
        }

        let search_start = target_end
            .saturating_sub(self.chunk_size / 5)
            .max(start + self.overlap);
        if search_start >= target_end {
            return target_end;
        }

        // Priority: double newline > single newline > sentence end > space
        let mut best_break = None;
        let mut last_newline = None;
        let mut last_sentence = None;
        let mut last_space = None;

        for (pos, c) in chars
            .iter()
            .enumerate()
            .take(target_end)
            .skip(search_start)
        {
            match c {
                '\n' => {
                    if pos > 0 && chars[pos - 1] == '\n' {
                        best_break = Some(pos + 1);
                    }
                    last_newline = Some(pos + 1);
                }
                '.' | '!' | '?' => {
                    if chars.get(pos + 1).is_some_and(|c| c.is_whitespace()) {
                        last_sentence = Some(pos + 1);
                    }
                }
                ' ' | '\t' => {
                    last_space = Some(pos + 1);
                }
                _ => {}
            }
        }

        best_break
            .or(last_newline)
            .or(last_sentence)
            .or(last_space)
            .unwrap_or(target_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(chunk_size: usize, chunk_overlap: usize) -> TextChunker {
        TextChunker::new(&ChunkingConfig {
            chunk_size,
            chunk_overlap,
        })
        .unwrap()
    }

    fn assert_exact_overlap(chunker: &TextChunker, text: &str) {
        let pieces = chunker.split_text(text);
        for pair in pieces.windows(2) {
            let (a, _, a_end) = &pair[0];
            let (b, b_start, _) = &pair[1];
            assert_eq!(a_end - b_start, chunker.overlap() as u64);

            let a_chars: Vec<char> = a.chars().collect();
            let tail: String = a_chars[a_chars.len() - chunker.overlap()..].iter().collect();
            let head: String = b.chars().take(chunker.overlap()).collect();
            assert_eq!(tail, head);
        }
        for (content, _, _) in &pieces {
            assert!(content.chars().count() <= chunker.chunk_size());
        }
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunker = TextChunker::with_defaults();
        let chunks = chunker.chunk(
            "notes.json",
            SourceKind::Transcript,
            &[TextBlock::whole("Hello, world!")],
        );

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Hello, world!");
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].source, "notes.json");
    }

    #[test]
    fn test_blank_input_yields_nothing() {
        let chunker = TextChunker::with_defaults();
        assert!(chunker.chunk("a.pdf", SourceKind::Document, &[]).is_empty());
        assert!(
            chunker
                .chunk(
                    "a.pdf",
                    SourceKind::Document,
                    &[TextBlock::page(0, ""), TextBlock::page(1, "  \n ")]
                )
                .is_empty()
        );
    }

    #[test]
    fn test_exact_overlap_without_break_points() {
        assert_exact_overlap(&chunker(200, 40), &"a".repeat(1000));
    }

    #[test]
    fn test_exact_overlap_with_break_points() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(60)
            + "\n\nA new paragraph starts here.\nAnd a new line. "
            + &"Lorem ipsum dolor sit amet, consectetur. ".repeat(40);
        assert_exact_overlap(&chunker(1000, 200), &text);
        assert_exact_overlap(&chunker(100, 90), &text);
        assert_exact_overlap(&chunker(50, 0), &text);
    }

    #[test]
    fn test_exact_overlap_multibyte() {
        let text = "héllo wörld ünïcode ✓ ".repeat(100);
        assert_exact_overlap(&chunker(64, 16), &text);
    }

    #[test]
    fn test_prefers_sentence_break() {
        let text = format!("{}. {}", "a".repeat(90), "b".repeat(100));
        let pieces = chunker(100, 10).split_text(&text);
        assert_eq!(pieces[0].0, format!("{}.", "a".repeat(90)));
    }

    #[test]
    fn test_indices_are_global_across_pages() {
        let chunker = chunker(100, 20);
        let chunks = chunker.chunk(
            "book.pdf",
            SourceKind::Document,
            &[
                TextBlock::page(0, "x".repeat(250)),
                TextBlock::page(1, ""),
                TextBlock::page(2, "short page"),
            ],
        );

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as u32);
        }
        let last = chunks.last().unwrap();
        assert_eq!(last.page, Some(2));
        assert_eq!(last.content, "short page");
        assert!(chunks.iter().filter(|c| c.page == Some(0)).count() >= 3);
    }

    #[test]
    fn test_rejects_overlap_not_below_size() {
        let result = TextChunker::new(&ChunkingConfig {
            chunk_size: 100,
            chunk_overlap: 100,
        });
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }
}
