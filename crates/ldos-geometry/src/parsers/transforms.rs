//! Parser for geometry-transform files.
//!
//! ```text
//! TRANS d=0.5
//!   OBJECT tip
//!   DISPLACED 0 0 0.5
//!   ROTATED 30 ABOUT 0 0 1
//! ENDTRANS
//!
//! TRANS d=1.0 OBJECT tip DISP 0 0 1.0
//! ```
//!
//! A block may move several surfaces; motions of one surface accumulate in
//! the order written. A `TRANS` line carrying further tokens is a complete
//! one-line transform and needs no `ENDTRANS`.

use std::path::Path;

use super::{parse_f64, strip_comment, ParseError};
use crate::transform::{GeometryTransform, RigidMotion};

struct Pending {
    transform: GeometryTransform,
    surface: Option<String>,
}

/// Parse a transform file from a string.
pub fn parse_transforms(content: &str) -> Result<Vec<GeometryTransform>, ParseError> {
    let mut transforms = Vec::new();
    let mut current: Option<Pending> = None;
    let mut opened_at = 0;

    for (idx, raw) in content.lines().enumerate() {
        let line = idx + 1;
        let tokens: Vec<&str> = strip_comment(raw).split_whitespace().collect();
        let Some(first) = tokens.first() else {
            continue;
        };

        match first.to_ascii_uppercase().as_str() {
            "TRANS" => {
                if current.is_some() {
                    return Err(format_error(opened_at, "TRANS block is missing ENDTRANS"));
                }
                let tag = tokens
                    .get(1)
                    .ok_or_else(|| format_error(line, "TRANS requires a tag"))?;
                let mut pending = Pending {
                    transform: GeometryTransform::new(*tag),
                    surface: None,
                };
                if tokens.len() > 2 {
                    apply_keywords(&tokens[2..], &mut pending, line)?;
                    transforms.push(pending.transform);
                } else {
                    current = Some(pending);
                    opened_at = line;
                }
            }
            "ENDTRANS" => {
                let pending = current
                    .take()
                    .ok_or_else(|| format_error(line, "ENDTRANS without TRANS"))?;
                transforms.push(pending.transform);
            }
            _ => {
                let pending = current
                    .as_mut()
                    .ok_or_else(|| format_error(line, "statement outside TRANS block"))?;
                apply_keywords(&tokens, pending, line)?;
            }
        }
    }

    if current.is_some() {
        return Err(format_error(opened_at, "TRANS block is missing ENDTRANS"));
    }
    Ok(transforms)
}

/// Read and parse a transform file.
pub fn read_transforms(path: &Path) -> Result<Vec<GeometryTransform>, ParseError> {
    let content = std::fs::read_to_string(path)?;
    parse_transforms(&content)
}

fn apply_keywords(tokens: &[&str], pending: &mut Pending, line: usize) -> Result<(), ParseError> {
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].to_ascii_uppercase().as_str() {
            "OBJECT" | "OBJ" | "SURFACE" => {
                let label = tokens
                    .get(i + 1)
                    .ok_or_else(|| format_error(line, "OBJECT requires a surface label"))?;
                pending.surface = Some(label.to_string());
                i += 2;
            }
            "DISPLACED" | "DISP" => {
                let v = floats(tokens, i + 1, 3, line, "displacement")?;
                let surface = current_surface(pending, line)?;
                pending
                    .transform
                    .push_motion(surface, RigidMotion::translation(v[0], v[1], v[2]));
                i += 4;
            }
            "ROTATED" | "ROT" => {
                let angle = floats(tokens, i + 1, 1, line, "rotation angle")?[0];
                let about = tokens.get(i + 2).map(|t| t.to_ascii_uppercase());
                if about.as_deref() != Some("ABOUT") {
                    return Err(format_error(line, "ROTATED requires 'ABOUT ax ay az'"));
                }
                let axis = floats(tokens, i + 3, 3, line, "rotation axis")?;
                let surface = current_surface(pending, line)?;
                let rotation = RigidMotion::rotation_about([axis[0], axis[1], axis[2]], angle)
                    .map_err(|e| format_error(line, &e.to_string()))?;
                pending.transform.push_motion(surface, rotation);
                i += 6;
            }
            other => {
                return Err(format_error(line, &format!("Unknown keyword '{}'", other)));
            }
        }
    }
    Ok(())
}

fn current_surface(pending: &Pending, line: usize) -> Result<String, ParseError> {
    pending
        .surface
        .clone()
        .ok_or_else(|| format_error(line, "motion given before OBJECT"))
}

fn floats(tokens: &[&str], start: usize, n: usize, line: usize, what: &str) -> Result<Vec<f64>, ParseError> {
    if start + n > tokens.len() {
        return Err(format_error(line, &format!("Expected {} value(s) for {}", n, what)));
    }
    tokens[start..start + n]
        .iter()
        .map(|t| parse_f64(t, line, what))
        .collect()
}

fn format_error(line: usize, message: &str) -> ParseError {
    ParseError::FormatError {
        line,
        message: message.to_string(),
    }
}
