//! Fixed-size text chunker for analysis calls.

use thiserror::Error;
use unicode_segmentation::UnicodeSegmentation;

use crate::DEFAULT_CHUNK_SIZE;

/// Errors raised when configuring a chunker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    #[error("chunk size must be at least 1 character, got {0}")]
    InvalidSize(usize),
}

/// A contiguous slice of the input text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunk<'a> {
    /// Position of this chunk in the sequence (0-indexed)
    pub index: usize,

    /// Character offset of the chunk in the original text
    pub offset: usize,

    /// Length in characters
    pub len: usize,

    /// The chunk text
    pub content: &'a str,
}

impl TextChunk<'_> {
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Splits text into consecutive chunks of at most `max_chars` characters.
///
/// Chunks never overlap and never drop text: concatenating them in order
/// gives back the input. Cuts land on grapheme boundaries unless a single
/// grapheme is wider than the limit, in which case it is split by character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunker {
    max_chars: usize,
}

impl TextChunker {
    /// Create a chunker with the given maximum chunk size in characters.
    pub fn new(max_chars: usize) -> Result<Self, ChunkError> {
        if max_chars == 0 {
            return Err(ChunkError::InvalidSize(max_chars));
        }
        Ok(Self { max_chars })
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Iterate over the chunks of `text`. Empty text yields no chunks.
    ///
    /// The iterator is `Clone`, so the sequence can be restarted.
    pub fn chunks<'a>(&self, text: &'a str) -> TextChunks<'a> {
        TextChunks {
            text,
            max_chars: self.max_chars,
            byte_pos: 0,
            char_pos: 0,
            index: 0,
        }
    }

    /// Collect the chunks of `text` into a vector.
    pub fn split<'a>(&self, text: &'a str) -> Vec<TextChunk<'a>> {
        self.chunks(text).collect()
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Iterator returned by [`TextChunker::chunks`].
#[derive(Debug, Clone)]
pub struct TextChunks<'a> {
    text: &'a str,
    max_chars: usize,
    byte_pos: usize,
    char_pos: usize,
    index: usize,
}

impl<'a> Iterator for TextChunks<'a> {
    type Item = TextChunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.byte_pos >= self.text.len() {
            return None;
        }

        let rest = &self.text[self.byte_pos..];
        let mut end = 0;
        let mut chars = 0;

        for grapheme in rest.graphemes(true) {
            let width = grapheme.chars().count();
            if chars + width > self.max_chars {
                break;
            }
            chars += width;
            end += grapheme.len();
        }

        if end == 0 {
            // The first grapheme alone exceeds the limit.
            end = rest
                .char_indices()
                .nth(self.max_chars)
                .map_or(rest.len(), |(i, _)| i);
            chars = rest[..end].chars().count();
        }

        let chunk = TextChunk {
            index: self.index,
            offset: self.char_pos,
            len: chars,
            content: &rest[..end],
        };

        self.byte_pos += end;
        self.char_pos += chars;
        self.index += 1;

        Some(chunk)
    }
}

impl std::iter::FusedIterator for TextChunks<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[TextChunk<'_>]) -> String {
        chunks.iter().map(|c| c.content).collect()
    }

    #[test]
    fn test_zero_size_rejected() {
        assert_eq!(TextChunker::new(0), Err(ChunkError::InvalidSize(0)));
    }

    #[test]
    fn test_empty_text() {
        let chunker = TextChunker::new(10).unwrap();
        assert!(chunker.split("").is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunker = TextChunker::default();
        let chunks = chunker.split("great game loved it too expensive");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "great game loved it too expensive");
        assert_eq!(chunks[0].offset, 0);
    }

    #[test]
    fn test_reconstruction_and_bound() {
        let samples = [
            "a",
            "abcdefghij",
            "abcdefghijk",
            "The quick brown fox jumps over the lazy dog. ",
            "naïve café déjà vu — ünïcödé everywhere",
            "日本語のテキストを分割する",
            "emoji 🎮🕹️👾 and flags 🇺🇸🇯🇵 mixed in",
        ];

        for size in 1..=12 {
            let chunker = TextChunker::new(size).unwrap();
            for sample in samples {
                let chunks = chunker.split(sample);
                assert_eq!(reconstruct(&chunks), sample, "size {size}");
                for chunk in &chunks {
                    assert!(chunk.len <= size, "chunk {:?} exceeds {size}", chunk.content);
                    assert_eq!(chunk.len, chunk.content.chars().count());
                    assert!(!chunk.is_empty());
                }
            }
        }
    }

    #[test]
    fn test_offsets_are_contiguous() {
        let chunker = TextChunker::new(4).unwrap();
        let chunks = chunker.split("0123456789");
        let offsets: Vec<usize> = chunks.iter().map(|c| c.offset).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
        let indexes: Vec<usize> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[test]
    fn test_does_not_split_graphemes_when_avoidable() {
        // "e" + combining acute accent is one grapheme of two chars
        let text = "abe\u{301}cd";
        let chunker = TextChunker::new(3).unwrap();
        let chunks = chunker.split(text);
        assert_eq!(chunks[0].content, "ab");
        assert_eq!(chunks[1].content, "e\u{301}c");
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_wide_grapheme_split_by_char() {
        let text = "e\u{301}\u{302}\u{303}";
        let chunker = TextChunker::new(2).unwrap();
        let chunks = chunker.split(text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_restartable() {
        let chunker = TextChunker::new(3).unwrap();
        let iter = chunker.chunks("restartable");
        let first: Vec<_> = iter.clone().collect();
        let second: Vec<_> = iter.collect();
        assert_eq!(first, second);
    }
}
