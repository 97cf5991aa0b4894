//! Retargeting a recorded build command at a different source file.

use anyhow::Result;

use crate::braces::Span;
use crate::error::StaticTestError;

/// One shell word with the byte range it occupies in the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
    pub span: Span,
}

/// Splits a command line into words using POSIX shell quoting rules
/// (single quotes, double quotes, backslash escapes). Expansions are not
/// performed. An unterminated quote runs to the end of the line.
pub fn tokenize(command: &str) -> Vec<Token> {
    let mut out = Vec::new();
    let mut chars = command.char_indices().peekable();
    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut value = String::new();
        let mut end = start;
        while let Some(&(pos, c)) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            chars.next();
            end = pos + c.len_utf8();
            match c {
                '\'' => {
                    for (pos, c) in chars.by_ref() {
                        end = pos + c.len_utf8();
                        if c == '\'' {
                            break;
                        }
                        value.push(c);
                    }
                }
                '"' => {
                    while let Some((pos, c)) = chars.next() {
                        end = pos + c.len_utf8();
                        match c {
                            '"' => break,
                            '\\' => match chars.peek() {
                                Some(&(npos, n)) if matches!(n, '"' | '\\' | '$' | '`' | '\n') => {
                                    chars.next();
                                    end = npos + n.len_utf8();
                                    if n != '\n' {
                                        value.push(n);
                                    }
                                }
                                _ => value.push('\\'),
                            },
                            _ => value.push(c),
                        }
                    }
                }
                '\\' => {
                    if let Some((npos, n)) = chars.next() {
                        end = npos + n.len_utf8();
                        if n != '\n' {
                            value.push(n);
                        }
                    }
                }
                _ => value.push(c),
            }
        }
        out.push(Token {
            value,
            span: Span { start, end },
        });
    }
    out
}

/// Quotes `word` for a POSIX shell when it contains anything beyond a
/// conservative set of path characters.
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '+' | ',' | ':' | '='));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Replaces the last word of `command` equal to `file` with `replacement`.
///
/// Words after the file argument are kept. When no word matches but the raw
/// line ends with `file`, that suffix is replaced instead.
pub fn substitute_file(command: &str, file: &str, replacement: &str) -> Result<String> {
    if let Some(tok) = tokenize(command).into_iter().rev().find(|t| t.value == file) {
        let mut out = String::with_capacity(command.len() + replacement.len());
        out.push_str(&command[..tok.span.start]);
        out.push_str(&shell_quote(replacement));
        out.push_str(&command[tok.span.end..]);
        return Ok(out);
    }
    if let Some(head) = command.strip_suffix(file) {
        return Ok(format!("{head}{replacement}"));
    }
    Err(StaticTestError::CommandMissingFile {
        file: file.to_string(),
        command: command.to_string(),
    }
    .into())
}

/// argv counterpart of [`substitute_file`].
pub fn substitute_argv(args: &[String], file: &str, replacement: &str) -> Result<Vec<String>> {
    let Some(idx) = args.iter().rposition(|a| a == file) else {
        return Err(StaticTestError::CommandMissingFile {
            file: file.to_string(),
            command: args.join(" "),
        }
        .into());
    };
    let mut out = args.to_vec();
    out[idx] = replacement.to_string();
    Ok(out)
}
