//! Table of contents derivation
//!
//! The TOC is never stored. It is rebuilt from the block sequence whenever
//! that sequence changes: a block contributes one entry when its first
//! non-blank line is an ATX heading of level 1 to 3.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::document::{Block, BlockId};

/// One navigation entry derived from a heading line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TocEntry {
    /// Heading level (1-3)
    pub level: u8,
    /// Heading text without the `#` markers
    pub text: String,
    /// Block the heading comes from
    pub block_id: BlockId,
}

fn heading_regex() -> &'static Regex {
    static HEADING_RE: OnceLock<Regex> = OnceLock::new();
    HEADING_RE.get_or_init(|| Regex::new(r"^(#{1,3})[ \t]+(.*)$").expect("valid heading regex"))
}

/// Parse a single line as a level 1-3 heading.
///
/// Returns `None` for deeper headings, `#tag` style text and headings with no text.
#[must_use]
pub fn parse_heading(line: &str) -> Option<(u8, &str)> {
    let caps = heading_regex().captures(line.trim_end())?;
    let level = caps.get(1)?.as_str().len() as u8;
    let text = caps
        .get(2)?
        .as_str()
        .trim_end_matches('#')
        .trim();
    if text.is_empty() {
        return None;
    }
    Some((level, text))
}

/// Heading of a single block, taken from its first non-blank line
#[must_use]
pub fn block_heading(block: &Block) -> Option<TocEntry> {
    let first = block.content.lines().find(|l| !l.trim().is_empty())?;
    let (level, text) = parse_heading(first)?;
    Some(TocEntry {
        level,
        text: text.to_string(),
        block_id: block.id.clone(),
    })
}

/// Derive the table of contents for a block sequence
#[must_use]
pub fn derive_toc(blocks: &[Block]) -> Vec<TocEntry> {
    blocks.iter().filter_map(block_heading).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_two_heading() {
        let block = Block::with_id("b1", "## Title\nbody text");
        let entry = block_heading(&block).unwrap();
        assert_eq!(entry.level, 2);
        assert_eq!(entry.text, "Title");
        assert_eq!(entry.block_id, BlockId::from("b1"));
    }

    #[test]
    fn test_no_leading_hash() {
        let block = Block::with_id("b1", "plain paragraph\n## Later heading");
        assert!(block_heading(&block).is_none());
    }

    #[test]
    fn test_heading_levels() {
        assert_eq!(parse_heading("# One"), Some((1, "One")));
        assert_eq!(parse_heading("### Three"), Some((3, "Three")));
        assert_eq!(parse_heading("#### Four"), None);
        assert_eq!(parse_heading("#hashtag"), None);
        assert_eq!(parse_heading("##   "), None);
        assert_eq!(parse_heading("## Closed ##"), Some((2, "Closed")));
    }

    #[test]
    fn test_leading_blank_lines_skipped() {
        let block = Block::with_id("b1", "\n\n# Intro");
        assert_eq!(block_heading(&block).unwrap().text, "Intro");
    }

    #[test]
    fn test_derive_toc_keeps_sequence_order() {
        let blocks = vec![
            Block::with_id("a", "# First"),
            Block::with_id("b", "no heading"),
            Block::with_id("c", "### Third"),
        ];
        let toc = derive_toc(&blocks);
        assert_eq!(toc.len(), 2);
        assert_eq!(toc[0].block_id.as_str(), "a");
        assert_eq!(toc[1].level, 3);
    }
}
