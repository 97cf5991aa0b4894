//! Splitting a test block into one isolated body per `SHOULD_NOT_COMPILE`
//! directive.
//!
//! A directive runs from its opener to the `)` that balances it and the `;`
//! after that. Anything following on the same line, such as a trailing
//! comment or another directive, is left alone.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::braces::{self, Span};

pub const SHOULD_NOT_COMPILE: &str = "SHOULD_NOT_COMPILE";
pub const SHOULD_NOT_COMPILE_WITH_MESSAGE: &str = "SHOULD_NOT_COMPILE_WITH_MESSAGE";

/// One directive occurrence in the block text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub span: Span,
    /// The wrapped code, without the directive syntax.
    pub fragment: String,
    pub expected_message: Option<String>,
}

/// A block body in which exactly one directive is live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    /// Position among the block's directives, in source order.
    pub index: usize,
    pub fragment: String,
    pub expected_message: Option<String>,
    /// 0-indexed line of the live statement within `body`.
    pub line: usize,
    pub body: String,
}

fn directive_opener() -> Result<&'static Regex> {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_try_init(|| {
        Regex::new(&format!(
            r"\b{SHOULD_NOT_COMPILE}(?P<with_message>_WITH_MESSAGE)?\("
        ))
    })
    .context("compile SHOULD_NOT_COMPILE pattern")
}

/// Where a directive's argument list closes, and its last comma at depth zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ArgumentList {
    close: usize,
    last_comma: Option<usize>,
}

/// Scans from just past a directive's `(` to the `)` that balances it.
///
/// Parentheses and commas inside string or character literals are skipped.
/// A `'` right after an alphanumeric is a digit separator, not a literal.
fn argument_list(text: &str, from: usize) -> Option<ArgumentList> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut last_comma = None;
    let mut pos = from;
    while pos < bytes.len() {
        match bytes[pos] {
            b'(' => depth += 1,
            b')' if depth == 0 => {
                return Some(ArgumentList {
                    close: pos,
                    last_comma,
                })
            }
            b')' => depth -= 1,
            b',' if depth == 0 => last_comma = Some(pos),
            b'"' => pos = literal_end(bytes, pos)?,
            b'\'' if pos == 0 || !bytes[pos - 1].is_ascii_alphanumeric() => {
                pos = literal_end(bytes, pos)?
            }
            _ => {}
        }
        pos += 1;
    }
    None
}

/// Index of the quote closing the literal opened at `open`. Literals do not
/// span lines.
fn literal_end(bytes: &[u8], open: usize) -> Option<usize> {
    let quote = bytes[open];
    let mut pos = open + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 1,
            b'\n' => return None,
            b if b == quote => return Some(pos),
            _ => {}
        }
        pos += 1;
    }
    None
}

/// End of the statement whose argument list closes at `close`: just past the
/// `;`, which may only be preceded by whitespace.
fn statement_end(text: &str, close: usize) -> Option<usize> {
    let rest = text[close + 1..].trim_start();
    rest.starts_with(';').then(|| text.len() - rest.len() + 1)
}

/// The decoded message when `arg` is exactly one string literal.
fn message_literal(arg: &str) -> Option<String> {
    let lit = arg.trim();
    let bytes = lit.as_bytes();
    if bytes.first() != Some(&b'"') || literal_end(bytes, 0)? != bytes.len() - 1 {
        return None;
    }
    Some(unescape_message(&lit[1..lit.len() - 1]))
}

fn unescape_message(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// All directives in `text`, in source order.
///
/// An opener without a balanced argument list followed by `;`, or a message
/// form whose last argument is not a string literal, is left as plain code.
/// Scanning resumes after each directive, so an opener inside another
/// directive's arguments is not a directive of its own.
pub fn directives(text: &str) -> Result<Vec<Directive>> {
    let opener = directive_opener()?;
    let mut out = Vec::new();
    let mut cursor = 0;
    for caps in opener.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() < cursor {
            continue;
        }
        let Some(args) = argument_list(text, whole.end()) else {
            continue;
        };
        let Some(end) = statement_end(text, args.close) else {
            continue;
        };
        let (code_end, expected_message) = if caps.name("with_message").is_some() {
            let Some(comma) = args.last_comma else { continue };
            let Some(message) = message_literal(&text[comma + 1..args.close]) else {
                continue;
            };
            (comma, Some(message))
        } else {
            (args.close, None)
        };
        out.push(Directive {
            span: Span {
                start: whole.start(),
                end,
            },
            fragment: text[whole.end()..code_end].trim().to_string(),
            expected_message,
        });
        cursor = end;
    }
    Ok(out)
}

/// Builds the body where directive `live` becomes a plain statement and every
/// other directive is dropped. Returns the body and the statement's line.
pub fn isolate(text: &str, all: &[Directive], live: usize) -> (String, usize) {
    let mut body = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut line = 0;
    for (idx, d) in all.iter().enumerate() {
        body.push_str(&text[cursor..d.span.start]);
        if idx == live {
            line = braces::line_of(&body, body.len());
            body.push_str(&d.fragment);
            body.push(';');
        }
        cursor = d.span.end;
    }
    body.push_str(&text[cursor..]);
    (body, line)
}

/// One isolated body per directive, in source order. Empty when the block
/// has no directives.
pub fn split(text: &str) -> Result<Vec<Assertion>> {
    let all = directives(text)?;
    let out: Vec<Assertion> = (0..all.len())
        .map(|index| {
            let (body, line) = isolate(text, &all, index);
            Assertion {
                index,
                fragment: all[index].fragment.clone(),
                expected_message: all[index].expected_message.clone(),
                line,
                body,
            }
        })
        .collect();
    tracing::debug!(assertions = out.len(), "split static test block");
    Ok(out)
}
