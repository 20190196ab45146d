//! Batched diagonal operators. All three work against a square "assist"
//! tensor whose trailing two dimensions carry the matrix.

use crate::attrs::Attrs;
use crate::check::{
    check_dim_eq, check_dtypes_same, check_rank_at_least, check_shapes_eq, ConfigurationError,
};
use crate::dtype::{DtypeError, DtypeTag};
use crate::kernel::{Backend, Format, KernelDescriptor};
use crate::ops::{Operator, OperatorDescriptor};
use crate::registry::{RegistrationError, RegistryBuilder};
use crate::shape::{Shape, ShapeError};
use std::cmp;

const VALID_TYPES: &[DtypeTag] = &[
    DtypeTag::Float16,
    DtypeTag::Float32,
    DtypeTag::Int32,
    DtypeTag::Int8,
    DtypeTag::Uint8,
];

fn check_square_assist(op: &str, assist: &Shape) -> Result<(), ShapeError> {
    check_rank_at_least(op, "assist", assist, 2)?;
    let r = assist.rank();
    check_dim_eq(
        op,
        "assist's penultimate dimension",
        assist[r - 2],
        "assist's last dimension",
        assist[r - 1],
    )
}

/// Builds a batched diagonal tensor from per-diagonal values.
#[derive(Clone, Debug, PartialEq)]
pub struct MatrixDiag;

impl MatrixDiag {
    pub const NAME: &'static str = "MatrixDiag";
    pub const INPUTS: &'static [&'static str] = &["x", "assist"];
    pub const OUTPUTS: &'static [&'static str] = &["y"];

    pub fn from_attrs(_attrs: &Attrs) -> Result<Self, ConfigurationError> {
        Ok(MatrixDiag)
    }

    pub fn infer_shape(&self, inputs: &[Shape]) -> Result<Vec<Shape>, ShapeError> {
        let (x, assist) = (&inputs[0], &inputs[1]);
        check_square_assist(Self::NAME, assist)?;
        if x.rank() + 1 > assist.rank() {
            return Err(ShapeError::RankAtLeast {
                op: Self::NAME.to_string(),
                param: "assist".to_string(),
                expected: x.rank() + 1,
                actual: assist.rank(),
            });
        }

        // Walking from the last dimension backward, every non-unit x
        // dimension must line up with the assist dimension one to the left.
        for i in 1..=x.rank() {
            let xd = x[x.rank() - i];
            if xd != 1 {
                let ad = assist[assist.rank() - i - 1];
                check_dim_eq(
                    Self::NAME,
                    &format!("x dim -{}", i),
                    xd,
                    &format!("assist dim -{}", i + 1),
                    ad,
                )?;
            }
        }

        Ok(vec![assist.clone()])
    }

    pub fn infer_dtype(&self, inputs: &[DtypeTag]) -> Result<Vec<DtypeTag>, DtypeError> {
        let out = check_dtypes_same(
            Self::NAME,
            &[("x", inputs[0]), ("assist", inputs[1])],
            VALID_TYPES,
        )?;
        Ok(vec![out])
    }
}

/// Extracts the batched diagonal of a batched tensor.
#[derive(Clone, Debug, PartialEq)]
pub struct MatrixDiagPart;

impl MatrixDiagPart {
    pub const NAME: &'static str = "MatrixDiagPart";
    pub const INPUTS: &'static [&'static str] = &["x", "assist"];
    pub const OUTPUTS: &'static [&'static str] = &["y"];

    pub fn from_attrs(_attrs: &Attrs) -> Result<Self, ConfigurationError> {
        Ok(MatrixDiagPart)
    }

    pub fn infer_shape(&self, inputs: &[Shape]) -> Result<Vec<Shape>, ShapeError> {
        let (x, assist) = (&inputs[0], &inputs[1]);
        check_rank_at_least(Self::NAME, "x", x, 2)?;
        check_square_assist(Self::NAME, assist)?;
        check_shapes_eq(Self::NAME, "x shape", x, "assist shape", assist)?;

        let r = assist.rank();
        let diag = cmp::min(assist[r - 2], assist[r - 1]);
        let out = assist.extents()[..r - 2]
            .iter()
            .copied()
            .chain([diag])
            .collect::<Vec<_>>();
        Ok(vec![Shape::new(out)])
    }

    pub fn infer_dtype(&self, inputs: &[DtypeTag]) -> Result<Vec<DtypeTag>, DtypeError> {
        let out = check_dtypes_same(
            Self::NAME,
            &[("x", inputs[0]), ("assist", inputs[1])],
            VALID_TYPES,
        )?;
        Ok(vec![out])
    }
}

/// Overwrites the batched diagonal of a batched tensor.
#[derive(Clone, Debug, PartialEq)]
pub struct MatrixSetDiag;

impl MatrixSetDiag {
    pub const NAME: &'static str = "MatrixSetDiag";
    pub const INPUTS: &'static [&'static str] = &["x", "diagonal", "assist"];
    pub const OUTPUTS: &'static [&'static str] = &["y"];

    pub fn from_attrs(_attrs: &Attrs) -> Result<Self, ConfigurationError> {
        Ok(MatrixSetDiag)
    }

    pub fn infer_shape(&self, inputs: &[Shape]) -> Result<Vec<Shape>, ShapeError> {
        let (x, diagonal, assist) = (&inputs[0], &inputs[1], &inputs[2]);
        check_rank_at_least(Self::NAME, "x", x, 2)?;
        check_square_assist(Self::NAME, assist)?;
        check_shapes_eq(Self::NAME, "x shape", x, "assist shape", assist)?;

        // Expected diagonal shape: x with its shorter trailing dimension
        // removed.
        let r = x.rank();
        let (expected, removed): (Shape, &str) = if x[r - 2] < x[r - 1] {
            (
                Shape::new(x.extents()[..r - 1].iter().copied()),
                "last dimension",
            )
        } else {
            (
                Shape::new(
                    x.extents()[..r - 2]
                        .iter()
                        .copied()
                        .chain([x[r - 1]])
                        .collect::<Vec<_>>(),
                ),
                "second last dimension",
            )
        };
        check_shapes_eq(
            Self::NAME,
            "diagonal shape",
            diagonal,
            &format!("x shape excluding the {}", removed),
            &expected,
        )?;

        Ok(vec![assist.clone()])
    }

    pub fn infer_dtype(&self, inputs: &[DtypeTag]) -> Result<Vec<DtypeTag>, DtypeError> {
        let out = check_dtypes_same(
            Self::NAME,
            &[
                ("x", inputs[0]),
                ("diagonal", inputs[1]),
                ("assist", inputs[2]),
            ],
            VALID_TYPES,
        )?;
        Ok(vec![out])
    }
}

pub fn diag_descriptor() -> OperatorDescriptor {
    OperatorDescriptor::new(
        MatrixDiag::NAME,
        MatrixDiag::INPUTS,
        MatrixDiag::OUTPUTS,
        vec![],
        |attrs| Ok(Operator::MatrixDiag(MatrixDiag::from_attrs(attrs)?)),
    )
}

pub fn diag_part_descriptor() -> OperatorDescriptor {
    OperatorDescriptor::new(
        MatrixDiagPart::NAME,
        MatrixDiagPart::INPUTS,
        MatrixDiagPart::OUTPUTS,
        vec![],
        |attrs| Ok(Operator::MatrixDiagPart(MatrixDiagPart::from_attrs(attrs)?)),
    )
}

pub fn set_diag_descriptor() -> OperatorDescriptor {
    OperatorDescriptor::new(
        MatrixSetDiag::NAME,
        MatrixSetDiag::INPUTS,
        MatrixSetDiag::OUTPUTS,
        vec![],
        |attrs| Ok(Operator::MatrixSetDiag(MatrixSetDiag::from_attrs(attrs)?)),
    )
}

fn diag_formats(arity: usize) -> Vec<Vec<(DtypeTag, Format)>> {
    VALID_TYPES
        .iter()
        .map(|&dtype| vec![(dtype, Format::Default); arity])
        .collect()
}

pub fn register(builder: &mut RegistryBuilder) -> Result<(), RegistrationError> {
    builder.register_operator(diag_descriptor())?;
    let mut diag = KernelDescriptor::build(MatrixDiag::NAME, Backend::Ascend, "matrix_diag")
        .compute_cost(10);
    for combo in diag_formats(3) {
        diag = diag.dtype_format(&combo);
    }
    builder.register_kernel(diag.finish()?)?;

    builder.register_operator(diag_part_descriptor())?;
    let mut part =
        KernelDescriptor::build(MatrixDiagPart::NAME, Backend::Ascend, "matrix_diag_part")
            .compute_cost(10);
    for combo in diag_formats(3) {
        part = part.dtype_format(&combo);
    }
    builder.register_kernel(part.finish()?)?;

    builder.register_operator(set_diag_descriptor())?;
    let mut set = KernelDescriptor::build(MatrixSetDiag::NAME, Backend::Ascend, "matrix_set_diag")
        .compute_cost(10);
    for combo in diag_formats(4) {
        set = set.dtype_format(&combo);
    }
    builder.register_kernel(set.finish()?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::dtype::DtypeTag;
    use crate::ops::matrix::{MatrixDiag, MatrixDiagPart, MatrixSetDiag};
    use crate::shape::{Shape, ShapeError};

    #[test]
    fn test_diag_build() {
        let out = MatrixDiag
            .infer_shape(&[Shape::new([2]), Shape::new([3, 2, 2])])
            .unwrap();
        assert_eq!(out, vec![Shape::new([3, 2, 2])]);

        // unit x dimensions broadcast against the assist
        let out = MatrixDiag
            .infer_shape(&[Shape::new([1]), Shape::new([3, 2, 2])])
            .unwrap();
        assert_eq!(out, vec![Shape::new([3, 2, 2])]);
    }

    #[test]
    fn test_diag_walk_mismatch() {
        let err = MatrixDiag
            .infer_shape(&[Shape::new([3]), Shape::new([3, 2, 2])])
            .expect_err("");
        assert!(matches!(err, ShapeError::DimMismatch { .. }));
    }

    #[test]
    fn test_diag_assist_must_be_square() {
        let err = MatrixDiag
            .infer_shape(&[Shape::new([2]), Shape::new([3, 2, 4])])
            .expect_err("");
        assert!(matches!(err, ShapeError::DimMismatch { .. }));
    }

    #[test]
    fn test_diag_assist_rank() {
        let err = MatrixDiag
            .infer_shape(&[Shape::new([2]), Shape::new([4])])
            .expect_err("");
        assert!(matches!(err, ShapeError::RankAtLeast { .. }));

        // assist rank must exceed x rank
        let err = MatrixDiag
            .infer_shape(&[Shape::new([3, 2, 2]), Shape::new([2, 2])])
            .expect_err("");
        assert!(matches!(err, ShapeError::RankAtLeast { .. }));
    }

    #[test]
    fn test_diag_part() {
        let out = MatrixDiagPart
            .infer_shape(&[Shape::new([3, 2, 2]), Shape::new([3, 2, 2])])
            .unwrap();
        assert_eq!(out, vec![Shape::new([3, 2])]);
    }

    #[test]
    fn test_diag_part_requires_equal_shapes() {
        let err = MatrixDiagPart
            .infer_shape(&[Shape::new([3, 2, 2]), Shape::new([4, 2, 2])])
            .expect_err("");
        assert!(matches!(err, ShapeError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_set_diag() {
        let out = MatrixSetDiag
            .infer_shape(&[
                Shape::new([3, 2, 2]),
                Shape::new([3, 2]),
                Shape::new([3, 2, 2]),
            ])
            .unwrap();
        assert_eq!(out, vec![Shape::new([3, 2, 2])]);
    }

    #[test]
    fn test_set_diag_bad_diagonal() {
        let err = MatrixSetDiag
            .infer_shape(&[
                Shape::new([3, 2, 2]),
                Shape::new([3, 3]),
                Shape::new([3, 2, 2]),
            ])
            .expect_err("");
        assert!(matches!(err, ShapeError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_family_dtypes() {
        let out = MatrixDiag
            .infer_dtype(&[DtypeTag::Float32, DtypeTag::Float32])
            .unwrap();
        assert_eq!(out, vec![DtypeTag::Float32]);

        assert!(MatrixDiag
            .infer_dtype(&[DtypeTag::Float64, DtypeTag::Float64])
            .is_err());
        assert!(MatrixSetDiag
            .infer_dtype(&[DtypeTag::Float32, DtypeTag::Float16, DtypeTag::Float32])
            .is_err());
    }
}
