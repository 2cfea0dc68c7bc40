//! SQL script statement splitting.
//!
//! The split is deliberately line-oriented, not a SQL tokenizer: a
//! statement accumulates trimmed lines until one ends with `;`, which
//! closes it. Blank lines between statements are skipped; a `;` followed
//! by trailing content does not close the statement. Scripts must be
//! written so each statement's terminator is the last non-whitespace
//! character on its final line — terminators inside quoted literals are
//! unsupported input, a contract of the script format.

use std::path::Path;

use crate::error::ToolsError;

/// Splits script text into discrete statements.
pub fn split_statements(source: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for raw in source.lines() {
        let line = raw.trim();

        // Skip blank lines between statements; keep them once one started.
        if current.is_empty() && line.is_empty() {
            continue;
        }

        current.push(line);
        if line.ends_with(';') {
            statements.push(current.join("\n"));
            current.clear();
        }
    }

    statements
}

/// Reads and splits a script file.
///
/// # Errors
///
/// Returns `ToolsError::Io` if the file cannot be read.
pub fn parse_script(path: impl AsRef<Path>) -> Result<Vec<String>, ToolsError> {
    let path = path.as_ref();
    tracing::trace!(script = %path.display(), "parsing sql script");
    let text = std::fs::read_to_string(path)?;
    Ok(split_statements(&text))
}

/// Unescapes backslash-style literal escape sequences (`\n`, `\t`, `\r`,
/// `\'`, `\"`, `\\`, `\uXXXX`). Unrecognized sequences are kept verbatim.
pub fn unescape_literals(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&hex);
                    }
                }
            }
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}
