//! Line diff for write previews.
//!
//! Display only: the confirmed write always replaces the whole file with
//! the proposed content, never with anything derived from these spans.

use similar::{Algorithm, DiffTag, capture_diff_slices};
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanTag {
    Equal,
    Delete,
    Insert,
    Replace,
}

/// One opcode: lines `old_range` of the old text correspond to lines
/// `new_range` of the new text (0-based, end exclusive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSpan {
    pub tag: SpanTag,
    pub old_range: Range<usize>,
    pub new_range: Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Removed,
    Added,
}

/// A changed line ready for display, numbered from 1 in its own file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedLine {
    pub kind: ChangeKind,
    pub number: usize,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct LineDiff {
    old_lines: Vec<String>,
    new_lines: Vec<String>,
    spans: Vec<DiffSpan>,
}

impl LineDiff {
    pub fn compute(old: &str, new: &str) -> Self {
        let old_lines: Vec<&str> = old.lines().collect();
        let new_lines: Vec<&str> = new.lines().collect();

        let spans = capture_diff_slices(Algorithm::Myers, &old_lines, &new_lines)
            .iter()
            .map(|op| {
                let (tag, old_range, new_range) = op.as_tag_tuple();
                let tag = match tag {
                    DiffTag::Equal => SpanTag::Equal,
                    DiffTag::Delete => SpanTag::Delete,
                    DiffTag::Insert => SpanTag::Insert,
                    DiffTag::Replace => SpanTag::Replace,
                };
                DiffSpan {
                    tag,
                    old_range,
                    new_range,
                }
            })
            .collect();

        Self {
            old_lines: old_lines.into_iter().map(str::to_string).collect(),
            new_lines: new_lines.into_iter().map(str::to_string).collect(),
            spans,
        }
    }

    pub fn spans(&self) -> &[DiffSpan] {
        &self.spans
    }

    pub fn has_changes(&self) -> bool {
        self.spans.iter().any(|s| s.tag != SpanTag::Equal)
    }

    /// Changed lines in display order: for a replace, removals come first.
    pub fn changed_lines(&self) -> Vec<ChangedLine> {
        let mut out = Vec::new();
        for span in &self.spans {
            if matches!(span.tag, SpanTag::Delete | SpanTag::Replace) {
                for idx in span.old_range.clone() {
                    out.push(ChangedLine {
                        kind: ChangeKind::Removed,
                        number: idx + 1,
                        text: self.old_lines[idx].clone(),
                    });
                }
            }
            if matches!(span.tag, SpanTag::Insert | SpanTag::Replace) {
                for idx in span.new_range.clone() {
                    out.push(ChangedLine {
                        kind: ChangeKind::Added,
                        number: idx + 1,
                        text: self.new_lines[idx].clone(),
                    });
                }
            }
        }
        out
    }

    /// `(added, removed)` line counts.
    pub fn stats(&self) -> (usize, usize) {
        self.changed_lines()
            .iter()
            .fold((0, 0), |(a, r), line| match line.kind {
                ChangeKind::Added => (a + 1, r),
                ChangeKind::Removed => (a, r + 1),
            })
    }
}
