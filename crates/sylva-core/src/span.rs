use serde::{Deserialize, Serialize};

/// Line/column range covered by a node.
///
/// Lines and columns are 1-based; the end position points one past the last
/// character of the node, so a node spanning exactly one line has
/// `start_line == end_line`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanRange {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl SpanRange {
    pub fn new(start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Number of lines the span touches.
    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// True when this span fully contains the line range `[start, end]`.
    pub fn covers_lines(&self, start: u32, end: u32) -> bool {
        self.start_line <= start && end <= self.end_line
    }

    /// True when this span intersects the line range `[start, end]`.
    pub fn intersects_lines(&self, start: u32, end: u32) -> bool {
        self.start_line <= end && self.end_line >= start
    }
}

impl std::fmt::Display for SpanRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_col, self.end_line, self.end_col
        )
    }
}
