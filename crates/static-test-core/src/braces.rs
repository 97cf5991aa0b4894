//! Balanced `{ ... }` region scanning.
//!
//! Code is treated as plain text: braces inside string literals, character
//! literals or comments are counted like any other brace and will throw the
//! depth off.

use regex::Regex;

/// Half-open byte range `[start, end)` into a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn slice<'a>(&self, buffer: &'a str) -> &'a str {
        &buffer[self.start..self.end]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanMode {
    /// From the start of the opener match through the closing brace.
    Full,
    /// Strictly between the outermost braces.
    Inner,
}

/// Positions of the outermost `{` and its matching `}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracePair {
    pub open: usize,
    pub close: usize,
}

/// Finds the first `{` at or after `from` and the `}` that balances it.
pub fn matching_braces(buffer: &str, from: usize) -> Option<BracePair> {
    let bytes = buffer.as_bytes();
    let mut depth: Option<usize> = None;
    let mut open = 0;
    for (pos, &b) in bytes.iter().enumerate().skip(from) {
        match (b, depth) {
            (b'{', None) => {
                open = pos;
                depth = Some(1);
            }
            (b'{', Some(d)) => depth = Some(d + 1),
            (b'}', Some(1)) => return Some(BracePair { open, close: pos }),
            (b'}', Some(d)) => depth = Some(d - 1),
            _ => {}
        }
    }
    None
}

/// Locates the first match of `opener` and the balanced brace region after it.
///
/// Returns `None` when the opener does not occur or its braces never balance.
pub fn locate(buffer: &str, opener: &Regex, mode: SpanMode) -> Option<Span> {
    let m = opener.find(buffer)?;
    let pair = matching_braces(buffer, m.end())?;
    Some(match mode {
        SpanMode::Full => Span {
            start: m.start(),
            end: pair.close + 1,
        },
        SpanMode::Inner => Span {
            start: pair.open + 1,
            end: pair.close,
        },
    })
}

/// 0-indexed line containing byte `pos`.
pub fn line_of(text: &str, pos: usize) -> usize {
    text.as_bytes()[..pos].iter().filter(|&&b| b == b'\n').count()
}
