//! Parser for evaluation-point files.
//!
//! Each non-blank, non-comment line holds either three coordinates (a point
//! at which the LDOS is wanted) or six (a source/observation pair for the
//! two-point Green's function). All rows of one file must have the same
//! width.
//!
//! ```text
//! # x y z
//! 0.0 0.0 1.0
//! 0.0 0.0 1.5
//! ```

use std::path::Path;

use super::{parse_f64, strip_comment, ParseError};

/// Parse an evaluation-point file from a string. Returns the rows and their
/// common width (3 or 6).
pub fn parse_points(content: &str) -> Result<(Vec<Vec<f64>>, usize), ParseError> {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    let mut width = None;

    for (idx, raw) in content.lines().enumerate() {
        let line = strip_comment(raw);
        if line.is_empty() {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|t| parse_f64(t, idx + 1, "coordinate"))
            .collect::<Result<Vec<_>, _>>()?;

        if row.len() != 3 && row.len() != 6 {
            return Err(ParseError::FormatError {
                line: idx + 1,
                message: format!("Expected 3 or 6 columns, got {}", row.len()),
            });
        }
        match width {
            None => width = Some(row.len()),
            Some(w) if w != row.len() => {
                return Err(ParseError::FormatError {
                    line: idx + 1,
                    message: format!("Row has {} columns but earlier rows have {}", row.len(), w),
                })
            }
            Some(_) => {}
        }
        rows.push(row);
    }

    let width = width.ok_or_else(|| ParseError::FormatError {
        line: 1,
        message: "No evaluation points found".into(),
    })?;
    Ok((rows, width))
}

/// Read and parse an evaluation-point file.
pub fn read_points(path: &Path) -> Result<(Vec<Vec<f64>>, usize), ParseError> {
    let content = std::fs::read_to_string(path)?;
    parse_points(&content)
}
