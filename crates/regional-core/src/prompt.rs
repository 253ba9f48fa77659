//! Prompt keyword handling
//!
//! Region prompts are written left to right, top to bottom:
//!
//! ```text
//! sky, clouds ADDBASE red car ADDCOL blue car ADDROW road BREAK puddles
//! └── base ──┘        └ cell ┘       └ cell ┘       └─── one cell ───┘
//! ```
//!
//! The host only understands `BREAK`, so row/column keywords are rewritten
//! to it once the region structure has been read off the prompt.

use crate::ratio::{count_keyword, Grid, RatioParser};
use crate::{Keywords, RegionError, Result};

/// Leading prompt segment blended under every region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseSegment {
    /// Base prompt text
    pub text: String,
    /// Breaks inside the base text
    pub breaks: usize,
}

impl BaseSegment {
    /// Context blocks the base consumes
    pub fn blocks(&self) -> usize {
        1 + self.breaks
    }
}

/// Reads and rewrites region keywords in prompts
#[derive(Debug, Clone)]
pub struct PromptRewriter {
    keywords: Keywords,
    parser: RatioParser,
}

impl PromptRewriter {
    /// Create a rewriter for the given keywords
    pub fn new(keywords: &Keywords) -> Self {
        Self {
            keywords: keywords.clone(),
            parser: RatioParser::with_separators(keywords.row.as_str(), keywords.col.as_str()),
        }
    }

    /// Configured keywords
    pub fn keywords(&self) -> &Keywords {
        &self.keywords
    }

    /// Whether the prompt places row or column boundaries itself
    pub fn has_layout_keywords(&self, prompt: &str) -> bool {
        prompt.contains(&self.keywords.row) || prompt.contains(&self.keywords.col)
    }

    /// Separate the base segment from the main prompt
    ///
    /// Text before the base keyword is the base. Without that keyword and
    /// with `use_base`, the first break-separated segment is the base.
    pub fn split_base(&self, prompt: &str, use_base: bool) -> Result<(Option<BaseSegment>, String)> {
        let brk = &self.keywords.brk;
        if let Some((base, main)) = prompt.split_once(self.keywords.base.as_str()) {
            let segment = BaseSegment {
                text: base.to_string(),
                breaks: base.matches(brk.as_str()).count(),
            };
            return Ok((Some(segment), main.to_string()));
        }
        if !use_base {
            return Ok((None, prompt.to_string()));
        }
        let (base, main) = prompt
            .split_once(brk.as_str())
            .ok_or_else(|| RegionError::MissingBase {
                keyword: brk.clone(),
            })?;
        let segment = BaseSegment {
            text: base.to_string(),
            breaks: 0,
        };
        Ok((Some(segment), main.to_string()))
    }

    /// Break counts per cell, split on the row and column keywords
    pub fn break_grid(&self, main: &str) -> Result<Grid<usize>> {
        self.parser.parse(main, count_keyword(&self.keywords.brk))
    }

    /// Replace row/column keywords with breaks and put the base back in front
    pub fn rewrite(&self, base: Option<&BaseSegment>, main: &str) -> String {
        let main = self.keywords_to_breaks(main);
        match base {
            Some(base) => format!("{}{}{}", base.text, self.spaced_break(), main),
            None => main,
        }
    }

    /// Split a prompt on the break keyword
    pub fn segments<'p>(&self, prompt: &'p str) -> Vec<&'p str> {
        prompt.split(self.keywords.brk.as_str()).collect()
    }

    /// Number of break-separated segments
    pub fn segment_count(&self, prompt: &str) -> usize {
        prompt.matches(self.keywords.brk.as_str()).count() + 1
    }

    /// Repeat the last segment until the prompt has `segments` of them
    pub fn pad_segments(&self, prompt: &str, segments: usize) -> String {
        let have = self.segment_count(prompt);
        if have >= segments {
            return prompt.to_string();
        }
        let last = self.segments(prompt).last().copied().unwrap_or_default();
        let mut padded = prompt.to_string();
        for _ in have..segments {
            padded.push_str(&self.spaced_break());
            padded.push_str(last);
        }
        padded
    }

    /// Fit a negative prompt to `segments` segments
    ///
    /// Missing segments repeat the first one, excess ones are dropped, and
    /// blank segments become a lone comma so each still tokenizes.
    pub fn expand_negative(&self, negative: &str, segments: usize) -> String {
        let negative = self.keywords_to_breaks(negative);
        let mut parts: Vec<&str> = self.segments(&negative);
        let first = parts.first().copied().unwrap_or_default();
        parts.resize(segments.max(1), first);
        parts
            .into_iter()
            .map(|p| if p.trim().is_empty() { "," } else { p })
            .collect::<Vec<_>>()
            .join(self.spaced_break().as_str())
    }

    /// Prefix the first segment to every other segment and drop it
    pub fn apply_common(&self, prompt: &str) -> String {
        let parts = self.segments(prompt);
        let Some((common, rest)) = parts.split_first() else {
            return prompt.to_string();
        };
        if rest.is_empty() {
            return prompt.to_string();
        }
        rest.iter()
            .map(|p| format!("{}, {}", common.trim_end(), p.trim_start()))
            .collect::<Vec<_>>()
            .join(self.spaced_break().as_str())
    }

    fn keywords_to_breaks(&self, text: &str) -> String {
        text.replace(self.keywords.row.as_str(), &self.keywords.brk)
            .replace(self.keywords.col.as_str(), &self.keywords.brk)
    }

    fn spaced_break(&self) -> String {
        format!(" {} ", self.keywords.brk)
    }
}
