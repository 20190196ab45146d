//! Reusable attribute, dtype and shape checks shared by every operator.
//!
//! Each check takes the owning operator name and the semantic parameter name
//! and returns the value unchanged on success, so diagnostics read the same
//! across the whole catalog.

use crate::dtype::{display_set, DtypeError, DtypeTag};
use crate::shape::{Shape, ShapeError};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigurationError {
    #[error("{op}: attribute {param} is required but was not supplied")]
    Missing { op: String, param: String },

    #[error("{op}: attribute {param} should be of type {expected}, but got {actual}")]
    WrongType {
        op: String,
        param: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("{op}: {param} should be {expected}, but got {actual}")]
    Invalid {
        op: String,
        param: String,
        expected: String,
        actual: String,
    },

    #[error("{op}: {param} should be one of [{allowed}], but got {actual}")]
    NotInSet {
        op: String,
        param: String,
        allowed: String,
        actual: String,
    },
}

/// Comparison relations used by numeric checks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Rel {
    Eq,
    Ne,
    Le,
    Lt,
    Ge,
    Gt,
}

impl Rel {
    pub fn holds<T: PartialOrd>(self, value: &T, bound: &T) -> bool {
        match self {
            Rel::Eq => value == bound,
            Rel::Ne => value != bound,
            Rel::Le => value <= bound,
            Rel::Lt => value < bound,
            Rel::Ge => value >= bound,
            Rel::Gt => value > bound,
        }
    }

    fn phrase(self) -> &'static str {
        match self {
            Rel::Eq => "equal to",
            Rel::Ne => "not equal to",
            Rel::Le => "at most",
            Rel::Lt => "less than",
            Rel::Ge => "at least",
            Rel::Gt => "greater than",
        }
    }
}

impl Display for Rel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.phrase())
    }
}

/// Boundary inclusivity for range checks.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Bounds {
    IncNeither,
    IncLeft,
    IncRight,
    IncBoth,
}

impl Bounds {
    pub fn contains(self, low: f64, high: f64, value: f64) -> bool {
        let left = match self {
            Bounds::IncLeft | Bounds::IncBoth => value >= low,
            _ => value > low,
        };
        let right = match self {
            Bounds::IncRight | Bounds::IncBoth => value <= high,
            _ => value < high,
        };
        left && right
    }

    fn brackets(self) -> (char, char) {
        match self {
            Bounds::IncNeither => ('(', ')'),
            Bounds::IncLeft => ('[', ')'),
            Bounds::IncRight => ('(', ']'),
            Bounds::IncBoth => ('[', ']'),
        }
    }
}

pub fn check_number(
    op: &str,
    param: &str,
    value: f64,
    bound: f64,
    rel: Rel,
) -> Result<f64, ConfigurationError> {
    if rel.holds(&value, &bound) {
        Ok(value)
    } else {
        Err(ConfigurationError::Invalid {
            op: op.to_string(),
            param: param.to_string(),
            expected: format!("{} {}", rel, bound),
            actual: value.to_string(),
        })
    }
}

pub fn check_int(
    op: &str,
    param: &str,
    value: i64,
    bound: i64,
    rel: Rel,
) -> Result<i64, ConfigurationError> {
    if rel.holds(&value, &bound) {
        Ok(value)
    } else {
        Err(ConfigurationError::Invalid {
            op: op.to_string(),
            param: param.to_string(),
            expected: format!("{} {}", rel, bound),
            actual: value.to_string(),
        })
    }
}

pub fn check_number_range(
    op: &str,
    param: &str,
    value: f64,
    low: f64,
    high: f64,
    bounds: Bounds,
) -> Result<f64, ConfigurationError> {
    if bounds.contains(low, high, value) {
        Ok(value)
    } else {
        let (l, r) = bounds.brackets();
        Err(ConfigurationError::Invalid {
            op: op.to_string(),
            param: param.to_string(),
            expected: format!("in the range {}{}, {}{}", l, low, high, r),
            actual: value.to_string(),
        })
    }
}

/// Membership in a static enumeration. Returns the canonical spelling so
/// case-insensitive operators can normalize what the front-end supplied.
pub fn check_string(
    op: &str,
    param: &str,
    value: &str,
    allowed: &'static [&'static str],
    fold_case: bool,
) -> Result<&'static str, ConfigurationError> {
    let matched = allowed.iter().find(|choice| {
        if fold_case {
            choice.eq_ignore_ascii_case(value)
        } else {
            ***choice == *value
        }
    });
    match matched {
        Some(choice) => Ok(choice),
        None => Err(ConfigurationError::NotInSet {
            op: op.to_string(),
            param: param.to_string(),
            allowed: allowed.join(", "),
            actual: value.to_string(),
        }),
    }
}

pub fn check_dtype_in(
    op: &str,
    param: &str,
    dtype: DtypeTag,
    allowed: &[DtypeTag],
) -> Result<DtypeTag, DtypeError> {
    if allowed.contains(&dtype) {
        Ok(dtype)
    } else {
        Err(DtypeError::NotAllowed {
            op: op.to_string(),
            param: param.to_string(),
            allowed: display_set(allowed),
            actual: dtype,
        })
    }
}

/// All listed tensors must share exactly one dtype drawn from `allowed`.
/// The first argument fixes the reference dtype; the first mismatching
/// parameter is named in the error.
pub fn check_dtypes_same(
    op: &str,
    args: &[(&str, DtypeTag)],
    allowed: &[DtypeTag],
) -> Result<DtypeTag, DtypeError> {
    let (first_name, first) = args[0];
    let first = check_dtype_in(op, first_name, first, allowed)?;
    for (name, dtype) in &args[1..] {
        if *dtype != first {
            return Err(DtypeError::Mismatch {
                op: op.to_string(),
                param: name.to_string(),
                actual: *dtype,
                reference: first_name.to_string(),
                expected: first,
            });
        }
    }
    Ok(first)
}

pub fn check_rank(op: &str, param: &str, shape: &Shape, expected: usize) -> Result<(), ShapeError> {
    if shape.rank() == expected {
        Ok(())
    } else {
        Err(ShapeError::Rank {
            op: op.to_string(),
            param: param.to_string(),
            expected,
            actual: shape.rank(),
            shape: shape.clone(),
        })
    }
}

pub fn check_rank_at_least(
    op: &str,
    param: &str,
    shape: &Shape,
    expected: usize,
) -> Result<(), ShapeError> {
    if shape.rank() >= expected {
        Ok(())
    } else {
        Err(ShapeError::RankAtLeast {
            op: op.to_string(),
            param: param.to_string(),
            expected,
            actual: shape.rank(),
        })
    }
}

pub fn check_dim_eq(
    op: &str,
    lhs_name: &str,
    lhs: usize,
    rhs_name: &str,
    rhs: usize,
) -> Result<(), ShapeError> {
    if lhs == rhs {
        Ok(())
    } else {
        Err(ShapeError::DimMismatch {
            op: op.to_string(),
            lhs_name: lhs_name.to_string(),
            lhs,
            rhs_name: rhs_name.to_string(),
            rhs,
        })
    }
}

pub fn check_shapes_eq(
    op: &str,
    lhs_name: &str,
    lhs: &Shape,
    rhs_name: &str,
    rhs: &Shape,
) -> Result<(), ShapeError> {
    if lhs == rhs {
        Ok(())
    } else {
        Err(ShapeError::ShapeMismatch {
            op: op.to_string(),
            lhs_name: lhs_name.to_string(),
            lhs: lhs.clone(),
            rhs_name: rhs_name.to_string(),
            rhs: rhs.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::check::{
        check_dtype_in, check_dtypes_same, check_number, check_number_range, check_rank,
        check_string, Bounds, Rel,
    };
    use crate::dtype::{DtypeError, DtypeTag, FLOAT_TYPES};
    use crate::shape::Shape;

    #[test]
    fn test_rel() {
        assert!(Rel::Ne.holds(&1.0, &2.0));
        assert!(!Rel::Ne.holds(&1.0, &1.0));
        assert!(Rel::Le.holds(&0.0, &0.0));
        assert!(!Rel::Gt.holds(&0.0, &0.0));
    }

    #[test]
    fn test_check_number() {
        assert_eq!(check_number("Op", "delta", 2.0, 0.0, Rel::Ne).unwrap(), 2.0);
        let err = check_number("Op", "delta", 0.0, 0.0, Rel::Ne).expect_err("");
        assert_eq!(
            err.to_string(),
            "Op: delta should be not equal to 0, but got 0"
        );
    }

    #[test]
    fn test_check_number_range() {
        assert!(check_number_range("Op", "lr", 0.1, 0.0, f64::INFINITY, Bounds::IncNeither).is_ok());
        assert!(
            check_number_range("Op", "lr", 0.0, 0.0, f64::INFINITY, Bounds::IncNeither).is_err()
        );
        assert!(check_number_range("Op", "l1", 0.0, 0.0, f64::INFINITY, Bounds::IncLeft).is_ok());
    }

    #[test]
    fn test_check_string() {
        assert_eq!(
            check_string("Op", "padding", "same", &["VALID", "SAME"], true).unwrap(),
            "SAME"
        );
        assert!(check_string("Op", "round_mode", "round", &["Round"], false).is_err());
    }

    #[test]
    fn test_check_dtype_in() {
        assert_eq!(
            check_dtype_in("Op", "x", DtypeTag::Float16, FLOAT_TYPES).unwrap(),
            DtypeTag::Float16
        );
        assert!(check_dtype_in("Op", "x", DtypeTag::Bool, FLOAT_TYPES).is_err());
    }

    #[test]
    fn test_check_dtypes_same() {
        let same = check_dtypes_same(
            "Op",
            &[("var", DtypeTag::Float32), ("accum", DtypeTag::Float32)],
            &[DtypeTag::Float32],
        );
        assert_eq!(same.unwrap(), DtypeTag::Float32);

        let err = check_dtypes_same(
            "Op",
            &[("var", DtypeTag::Float32), ("accum", DtypeTag::Float16)],
            &[DtypeTag::Float32, DtypeTag::Float16],
        )
        .expect_err("");
        assert_eq!(
            err,
            DtypeError::Mismatch {
                op: "Op".to_string(),
                param: "accum".to_string(),
                actual: DtypeTag::Float16,
                reference: "var".to_string(),
                expected: DtypeTag::Float32,
            }
        );
    }

    #[test]
    fn test_check_rank() {
        let shape = Shape::new([2, 3]);
        assert!(check_rank("Op", "x", &shape, 2).is_ok());
        let err = check_rank("Op", "x", &shape, 4).expect_err("");
        assert_eq!(
            err.to_string(),
            "Op: x should be a 4-D tensor, but got a 2-D tensor whose shape is [2, 3]"
        );
    }
}
