//! Parses CCP4 symmetry operator records into 4×4 affine matrices. Each
//! record is a comma-separated triple of expressions such as
//! `-x+1/2, y, z+1/4`; this module tokenizes each expression into signed
//! terms and lays them into one matrix row.

use crate::density::Matrix4;
use crate::error::{raise, DensityError, Res};

/// Splits an expression into signed terms without losing the sign character,
/// e.g. `"-x+1/2"` -> `["-x", "+1/2"]`.
fn split_terms(expr: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();
    for (i, c) in expr.chars().enumerate() {
        if (c == '+' || c == '-') && i > 0 && !current.is_empty() {
            terms.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        terms.push(current);
    }
    terms
}

fn axis_column(letter: char) -> Option<usize> {
    match letter {
        'X' => Some(0),
        'Y' => Some(1),
        'Z' => Some(2),
        _ => None,
    }
}

fn apply_term(term: &str, matrix: &mut Matrix4, row: usize, original: &str) -> Res<()> {
    let (sign, body) = match term.chars().next() {
        Some('+') => (1.0f32, &term[1..]),
        Some('-') => (-1.0f32, &term[1..]),
        _ => (1.0f32, term),
    };
    if body.is_empty() {
        return raise(DensityError::BadSymmetryOperator {
            text: original.trim().to_string(),
            reason: "empty term",
        });
    }

    if body.len() == 1 {
        if let Some(col) = axis_column(body.chars().next().unwrap()) {
            matrix[row][col] += sign;
            return Ok(());
        }
    }

    if let Some((num, den)) = body.split_once('/') {
        let num: f32 = match num.parse() {
            Ok(v) => v,
            Err(_) => {
                return raise(DensityError::BadSymmetryOperator {
                    text: original.trim().to_string(),
                    reason: "non-numeric translation numerator",
                })
            }
        };
        let den: f32 = match den.parse() {
            Ok(v) => v,
            Err(_) => {
                return raise(DensityError::BadSymmetryOperator {
                    text: original.trim().to_string(),
                    reason: "non-numeric translation denominator",
                })
            }
        };
        if den == 0.0 {
            return raise(DensityError::BadSymmetryOperator {
                text: original.trim().to_string(),
                reason: "division by zero in translation term",
            });
        }
        matrix[row][3] += sign * (num / den);
        return Ok(());
    }

    raise(DensityError::BadSymmetryOperator {
        text: original.trim().to_string(),
        reason: "unrecognised term",
    })
}

/// Parses one 80-byte symmetry record into a 4×4 affine matrix. Case
/// insensitive and ignores whitespace; bottom row is always `(0, 0, 0, 1)`.
pub fn parse_operator(raw: &str) -> Res<Matrix4> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let exprs: Vec<&str> = cleaned.split(',').collect();
    if exprs.len() != 3 {
        return raise(DensityError::BadSymmetryOperator {
            text: raw.trim().to_string(),
            reason: "expected exactly three comma-separated expressions",
        });
    }

    let mut matrix: Matrix4 = [[0.0; 4]; 4];
    matrix[3][3] = 1.0;
    for (row, expr) in exprs.iter().enumerate() {
        if expr.is_empty() {
            return raise(DensityError::BadSymmetryOperator {
                text: raw.trim().to_string(),
                reason: "empty expression",
            });
        }
        for term in split_terms(expr) {
            apply_term(&term, &mut matrix, row, raw)?;
        }
    }
    Ok(matrix)
}
