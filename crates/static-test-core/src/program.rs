use anyhow::Result;

use crate::block;
use crate::directive::{self, Assertion};

/// A standalone translation unit exercising one directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedProgram {
    pub source: String,
    pub index: usize,
    pub fragment: String,
    pub expected_message: Option<String>,
    /// 1-indexed line where the block body starts in the file under test.
    pub block_start_line: usize,
    /// 0-indexed line of the live statement within the block body.
    pub assertion_line: usize,
}

impl SynthesizedProgram {
    /// Line in the file under test that failures are reported against.
    pub fn report_line(&self) -> usize {
        self.block_start_line + self.assertion_line
    }
}

/// `cleaned` verbatim followed by a `main` whose body is `body`.
pub fn synthesize_source(cleaned: &str, body: &str) -> String {
    let mut out = String::with_capacity(cleaned.len() + body.len() + 32);
    out.push_str(cleaned);
    out.push_str("\n\nint main() {\n");
    out.push_str(body);
    out.push_str("\nreturn 0;\n}\n");
    out
}

pub fn synthesize(cleaned: &str, block_start_line: usize, assertion: &Assertion) -> SynthesizedProgram {
    SynthesizedProgram {
        source: synthesize_source(cleaned, &assertion.body),
        index: assertion.index,
        fragment: assertion.fragment.clone(),
        expected_message: assertion.expected_message.clone(),
        block_start_line,
        assertion_line: assertion.line,
    }
}

/// All programs for the block called `name`, one per directive, in source order.
pub fn generate(file_content: &str, name: &str) -> Result<Vec<SynthesizedProgram>> {
    let test_block = block::find(file_content, name)?;
    let assertions = directive::split(&test_block.code)?;
    if assertions.is_empty() {
        return Ok(Vec::new());
    }
    let cleaned = block::strip_all(file_content)?;
    Ok(assertions
        .iter()
        .map(|a| synthesize(&cleaned, test_block.start_line, a))
        .collect())
}
