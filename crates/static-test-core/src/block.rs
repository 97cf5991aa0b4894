use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::braces::{self, Span, SpanMode};
use crate::error::StaticTestError;

pub const BLOCK_KEYWORD: &str = "STATIC_TEST";

/// One `STATIC_TEST(<name>) { ... }` block, resolved by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestBlock {
    pub name: String,
    /// Inner span, strictly between the outermost braces.
    pub span: Span,
    /// 1-indexed line of the first byte after the opening brace.
    pub start_line: usize,
    pub code: String,
}

fn any_block_opener() -> Result<&'static Regex> {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_try_init(|| Regex::new(&format!(r"\b{BLOCK_KEYWORD}\(\s*\w+\s*\)")))
        .context("compile STATIC_TEST pattern")
}

fn identifier() -> Result<&'static Regex> {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_try_init(|| Regex::new(r"^\w+$"))
        .context("compile identifier pattern")
}

fn named_block_opener(name: &str) -> Result<Regex> {
    Regex::new(&format!(
        r"\b{BLOCK_KEYWORD}\(\s*{}\s*\)",
        regex::escape(name)
    ))
    .with_context(|| format!("compile STATIC_TEST({name}) pattern"))
}

/// Resolves the block called `name`.
pub fn find(buffer: &str, name: &str) -> Result<TestBlock> {
    if !identifier()?.is_match(name) {
        return Err(StaticTestError::InvalidTestName {
            name: name.to_string(),
        }
        .into());
    }
    let opener = named_block_opener(name)?;
    if !opener.is_match(buffer) {
        return Err(StaticTestError::TestNotFound {
            name: name.to_string(),
            available: block_names(buffer)?,
        }
        .into());
    }
    let span = braces::locate(buffer, &opener, SpanMode::Inner).ok_or_else(|| {
        StaticTestError::UnbalancedBlock {
            name: name.to_string(),
        }
    })?;
    let start_line = braces::line_of(buffer, span.start) + 1;
    tracing::debug!(name, start = span.start, end = span.end, start_line, "located static test");
    Ok(TestBlock {
        name: name.to_string(),
        span,
        start_line,
        code: span.slice(buffer).to_string(),
    })
}

/// Removes every static test block, first occurrence first, until none remain.
///
/// A block whose braces never balance stops the scan and is left in place.
pub fn strip_all(buffer: &str) -> Result<String> {
    let opener = any_block_opener()?;
    let mut out = buffer.to_string();
    while let Some(span) = braces::locate(&out, opener, SpanMode::Full) {
        let before = out.len();
        out.replace_range(span.start..span.end, "");
        if out.len() >= before {
            return Err(StaticTestError::StripStalled { offset: span.start }.into());
        }
    }
    Ok(out)
}

/// Names of all blocks in source order.
fn block_names(buffer: &str) -> Result<Vec<String>> {
    let opener = any_block_opener()?;
    Ok(opener
        .find_iter(buffer)
        .filter_map(|m| {
            let text = m.as_str();
            let open = text.find('(')?;
            Some(text[open + 1..text.len() - 1].trim().to_string())
        })
        .collect())
}
