//! Plain-text input parsers.
//!
//! Supported formats:
//! - [evaluation-point files](points): rows of 3 (single point) or 6 (point
//!   pair) whitespace-separated coordinates.
//! - [transform files](transforms): `TRANS ... ENDTRANS` blocks of per-surface
//!   rigid motions.

pub mod points;
pub mod transforms;

use thiserror::Error;

/// Errors during input file parsing.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    FormatError { line: usize, message: String },
}

/// Strip a trailing `#` comment and surrounding whitespace.
fn strip_comment(line: &str) -> &str {
    line.split('#').next().unwrap_or("").trim()
}

fn parse_f64(token: &str, line: usize, what: &str) -> Result<f64, ParseError> {
    token.parse().map_err(|_| ParseError::FormatError {
        line,
        message: format!("Invalid {}: {}", what, token),
    })
}
