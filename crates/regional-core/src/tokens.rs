//! Token-block tables for break-separated prompts
//!
//! The host packs each break-separated segment into whole blocks of
//! `chunk_tokens` usable tokens. One-dimensional compositing addresses the
//! packed context by these block ranges.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Counts prompt tokens the way the host tokenizer does
pub trait TokenCounter {
    /// Number of tokens in `text`, excluding start/end markers
    fn count_tokens(&self, text: &str) -> usize;
}

impl<F> TokenCounter for F
where
    F: Fn(&str) -> usize,
{
    fn count_tokens(&self, text: &str) -> usize {
        self(text)
    }
}

/// Half-open range of context blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenRange {
    pub start: usize,
    pub end: usize,
}

impl TokenRange {
    /// Number of blocks
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the range is empty
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Block ranges of every segment of one prompt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTable {
    ranges: SmallVec<[TokenRange; 8]>,
    token_counts: SmallVec<[usize; 8]>,
}

impl TokenTable {
    /// Tokenize each `brk`-separated segment of `prompt`
    pub fn build<T: TokenCounter + ?Sized>(
        prompt: &str,
        brk: &str,
        chunk_tokens: usize,
        counter: &T,
    ) -> Self {
        let mut table = Self::default();
        let mut cursor = 0;
        for segment in prompt.split(brk) {
            let tokens = counter.count_tokens(segment);
            let blocks = tokens.div_ceil(chunk_tokens.max(1)).max(1);
            table.ranges.push(TokenRange {
                start: cursor,
                end: cursor + blocks,
            });
            table.token_counts.push(tokens);
            cursor += blocks;
        }
        table
    }

    /// Table from explicit ranges
    pub fn from_ranges(ranges: impl IntoIterator<Item = TokenRange>) -> Self {
        let ranges: SmallVec<[TokenRange; 8]> = ranges.into_iter().collect();
        let token_counts = ranges.iter().map(|_| 0).collect();
        Self {
            ranges,
            token_counts,
        }
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether the table has no segments
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Block range per segment
    pub fn ranges(&self) -> &[TokenRange] {
        &self.ranges
    }

    /// Token count per segment
    pub fn token_counts(&self) -> &[usize] {
        &self.token_counts
    }

    /// Blocks spanned by the whole prompt
    pub fn total_blocks(&self) -> usize {
        self.ranges.last().map(|r| r.end).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(text: &str) -> usize {
        text.split_whitespace().count()
    }

    #[test]
    fn test_ranges_accumulate() {
        let table = TokenTable::build("a b c BREAK d BREAK e f", "BREAK", 75, &words);
        assert_eq!(table.len(), 3);
        assert_eq!(table.token_counts(), &[3, 1, 2]);
        assert_eq!(
            table.ranges(),
            &[
                TokenRange { start: 0, end: 1 },
                TokenRange { start: 1, end: 2 },
                TokenRange { start: 2, end: 3 },
            ]
        );
        assert_eq!(table.total_blocks(), 3);
    }

    #[test]
    fn test_long_segment_spans_blocks() {
        let long = vec!["w"; 80].join(" ");
        let prompt = format!("{} BREAK tail", long);
        let table = TokenTable::build(&prompt, "BREAK", 75, &words);
        assert_eq!(table.ranges()[0], TokenRange { start: 0, end: 2 });
        assert_eq!(table.ranges()[1], TokenRange { start: 2, end: 3 });
    }

    #[test]
    fn test_full_chunk_fits_one_block() {
        let exact = vec!["w"; 75].join(" ");
        let table = TokenTable::build(&exact, "BREAK", 75, &words);
        assert_eq!(table.ranges()[0].len(), 1);
    }

    #[test]
    fn test_empty_segment_still_takes_a_block() {
        let table = TokenTable::build("BREAK x", "BREAK", 75, &words);
        assert_eq!(table.ranges()[0], TokenRange { start: 0, end: 1 });
    }

    #[test]
    fn test_closure_counter() {
        let counter = |text: &str| text.len();
        let table = TokenTable::build("abc", "BREAK", 2, &counter);
        assert_eq!(table.ranges()[0].len(), 2);
    }
}
