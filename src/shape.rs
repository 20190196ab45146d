use itertools::Itertools;
use smallvec::SmallVec;
use std::fmt::{self, Display, Formatter};
use std::ops::Index;
use thiserror::Error;

pub type Array = SmallVec<[usize; 5]>;

pub fn display_comma(arr: &[usize]) -> String {
    arr.iter().map(|s| s.to_string()).join(", ")
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ShapeError {
    #[error("{op}: {param} should be a {expected}-D tensor, but got a {actual}-D tensor whose shape is {shape}")]
    Rank {
        op: String,
        param: String,
        expected: usize,
        actual: usize,
        shape: Shape,
    },

    #[error("{op}: rank of {param} should be at least {expected}, but got {actual}")]
    RankAtLeast {
        op: String,
        param: String,
        expected: usize,
        actual: usize,
    },

    #[error("{op}: {lhs_name} should be equal to {rhs_name}, but got {lhs} and {rhs}")]
    DimMismatch {
        op: String,
        lhs_name: String,
        lhs: usize,
        rhs_name: String,
        rhs: usize,
    },

    #[error("{op}: {lhs_name} {lhs} should be equal to {rhs_name} {rhs}")]
    ShapeMismatch {
        op: String,
        lhs_name: String,
        lhs: Shape,
        rhs_name: String,
        rhs: Shape,
    },

    #[error("{op}: sliding window of extent {window} does not fit {param} of extent {extent}")]
    WindowTooLarge {
        op: String,
        param: String,
        window: usize,
        extent: usize,
    },

    #[error("{op}: expected {expected} input tensors, but got {actual}")]
    Arity {
        op: String,
        expected: usize,
        actual: usize,
    },
}

/// Extents of one tensor, outermost axis first. Rank is the number of axes.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Shape {
    extents: Array,
}

impl Shape {
    pub fn new<E>(extents: E) -> Shape
    where
        E: IntoIterator<Item = usize>,
    {
        Shape {
            extents: extents.into_iter().collect(),
        }
    }

    pub fn scalar() -> Shape {
        Shape::new([])
    }

    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    pub fn size(&self) -> usize {
        self.extents.iter().product()
    }
}

impl Index<usize> for Shape {
    type Output = usize;

    fn index(&self, axis: usize) -> &usize {
        &self.extents[axis]
    }
}

impl From<&[usize]> for Shape {
    fn from(extents: &[usize]) -> Shape {
        Shape::new(extents.iter().copied())
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(extents: [usize; N]) -> Shape {
        Shape::new(extents)
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", display_comma(&self.extents))
    }
}

#[cfg(test)]
mod tests {
    use crate::shape::Shape;

    #[test]
    fn test_basics() {
        let s = Shape::new([1, 10, 10, 3]);
        assert_eq!(s.rank(), 4);
        assert_eq!(s.size(), 300);
        assert_eq!(s[3], 3);
        assert_eq!(s.extents(), &[1, 10, 10, 3]);
    }

    #[test]
    fn test_display() {
        assert_eq!(Shape::new([1, 8, 8, 27]).to_string(), "[1, 8, 8, 27]");
        assert_eq!(Shape::scalar().to_string(), "[]");
    }

    #[test]
    fn test_zero_extent() {
        let s = Shape::new([2, 0, 3]);
        assert_eq!(s.rank(), 3);
        assert_eq!(s.size(), 0);
    }
}
