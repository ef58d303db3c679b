//! Fixed-width layout of the free-text blocks.
//!
//! Every multi-line block on the form is printed in a monospaced font, so the
//! limits are character counts per line and a number of lines per block.

use textwrap::{Options, WordSeparator, WordSplitter, WrapAlgorithm};

pub const JOB_WIDTH: usize = 91;
pub const DUTIES_WIDTH: usize = 91;
/// Columns at the start of the duties block covered by the abbreviation box.
pub const DUTIES_ABBREVIATION_GAP: usize = 21;
pub const DUTIES_MAX_LINES: usize = 4;
pub const CAREER_REC_WIDTH: usize = 13;
pub const CAREER_REC_MAX_LINES: usize = 2;
pub const COMMENTS_WIDTH: usize = 92;
pub const COMMENTS_MAX_LINES: usize = 18;

/// Wraps `text` so no line is longer than `width`, keeping blank lines.
///
/// Each newline-separated segment is wrapped on its own with greedy word
/// wrapping. A blank segment becomes exactly one empty line. Words longer
/// than `width` are left whole on a line of their own.
pub fn wrap(text: &str, width: usize) -> String {
    wrap_with_lead_in(text, width, "")
}

/// Like [`wrap`], but the first line starts with `lead_in`, which counts
/// toward that line's width.
pub fn wrap_with_lead_in(text: &str, width: usize, lead_in: &str) -> String {
    let mut lines: Vec<String> = Vec::new();

    for (index, segment) in text.split('\n').enumerate() {
        let segment = segment.trim_end_matches('\r').replace('\t', " ");
        if segment.trim().is_empty() {
            lines.push(String::new());
            continue;
        }

        let indent = if index == 0 { lead_in } else { "" };
        let options = Options::new(width)
            .initial_indent(indent)
            .break_words(false)
            .word_separator(WordSeparator::AsciiSpace)
            .word_splitter(WordSplitter::NoHyphenation)
            .wrap_algorithm(WrapAlgorithm::FirstFit);

        lines.extend(
            textwrap::wrap(&segment, options)
                .into_iter()
                .map(|line| line.into_owned()),
        );
    }

    lines.join("\n")
}

/// Keeps the first `max` lines of `text`.
pub fn truncate_lines(text: &str, max: usize) -> String {
    text.split('\n').take(max).collect::<Vec<_>>().join("\n")
}

pub fn line_count(text: &str) -> usize {
    text.split('\n').count()
}

/// Block 28, command employment and achievements.
pub fn wrap_job(text: &str) -> String {
    wrap(text, JOB_WIDTH)
}

/// Block 29. The first line is shifted right past the abbreviation box.
pub fn wrap_duties_description(text: &str) -> String {
    let gap = " ".repeat(DUTIES_ABBREVIATION_GAP);
    wrap_with_lead_in(text, DUTIES_WIDTH, &gap)
}

pub fn wrap_career_rec(text: &str) -> String {
    truncate_lines(&wrap(text, CAREER_REC_WIDTH), CAREER_REC_MAX_LINES)
}

pub fn wrap_comments(text: &str) -> String {
    truncate_lines(&wrap(text, COMMENTS_WIDTH), COMMENTS_MAX_LINES)
}
