pub mod array;
pub mod image;
pub mod matrix;
pub mod quant;
pub mod sparse;

use crate::attrs::{AttributeSpec, Attrs};
use crate::check::ConfigurationError;
use crate::dtype::DtypeTag;
use crate::error::InferenceError;
use crate::shape::{Shape, ShapeError};

/// A validated operator instance. One variant per operator kind; each
/// carries its own immutable attributes and `infer_shape`/`infer_dtype`.
#[derive(Clone, Debug, PartialEq)]
pub enum Operator {
    ExtractImagePatches(image::ExtractImagePatches),
    Range(array::Range),
    LinSpace(array::LinSpace),
    Quant(quant::Quant),
    Dequant(quant::Dequant),
    MatrixDiag(matrix::MatrixDiag),
    MatrixDiagPart(matrix::MatrixDiagPart),
    MatrixSetDiag(matrix::MatrixSetDiag),
    SparseApplyFtrl(sparse::SparseApplyFtrl),
    SparseApplyProximalAdagrad(sparse::SparseApplyProximalAdagrad),
}

/// Outcome of shape/dtype inference for one graph node.
///
/// `InPlaceAck` marks operators whose real effect is mutating input tensors
/// aliased with their state parameters; the reported shapes are degenerate
/// acknowledgements, not computed values.
#[derive(Clone, Debug, PartialEq)]
pub enum Inference {
    Value {
        shapes: Vec<Shape>,
        dtypes: Vec<DtypeTag>,
    },
    InPlaceAck {
        shapes: Vec<Shape>,
        dtypes: Vec<DtypeTag>,
    },
}

impl Inference {
    pub fn shapes(&self) -> &[Shape] {
        match self {
            Inference::Value { shapes, .. } | Inference::InPlaceAck { shapes, .. } => shapes,
        }
    }

    pub fn dtypes(&self) -> &[DtypeTag] {
        match self {
            Inference::Value { dtypes, .. } | Inference::InPlaceAck { dtypes, .. } => dtypes,
        }
    }

    pub fn is_in_place(&self) -> bool {
        matches!(self, Inference::InPlaceAck { .. })
    }
}

impl Operator {
    pub fn name(&self) -> &'static str {
        match self {
            Operator::ExtractImagePatches(_) => image::ExtractImagePatches::NAME,
            Operator::Range(_) => array::Range::NAME,
            Operator::LinSpace(_) => array::LinSpace::NAME,
            Operator::Quant(_) => quant::Quant::NAME,
            Operator::Dequant(_) => quant::Dequant::NAME,
            Operator::MatrixDiag(_) => matrix::MatrixDiag::NAME,
            Operator::MatrixDiagPart(_) => matrix::MatrixDiagPart::NAME,
            Operator::MatrixSetDiag(_) => matrix::MatrixSetDiag::NAME,
            Operator::SparseApplyFtrl(_) => sparse::SparseApplyFtrl::NAME,
            Operator::SparseApplyProximalAdagrad(_) => sparse::SparseApplyProximalAdagrad::NAME,
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Operator::ExtractImagePatches(_) => image::ExtractImagePatches::INPUTS.len(),
            Operator::Range(_) => array::Range::INPUTS.len(),
            Operator::LinSpace(_) => array::LinSpace::INPUTS.len(),
            Operator::Quant(_) => quant::Quant::INPUTS.len(),
            Operator::Dequant(_) => quant::Dequant::INPUTS.len(),
            Operator::MatrixDiag(_) => matrix::MatrixDiag::INPUTS.len(),
            Operator::MatrixDiagPart(_) => matrix::MatrixDiagPart::INPUTS.len(),
            Operator::MatrixSetDiag(_) => matrix::MatrixSetDiag::INPUTS.len(),
            Operator::SparseApplyFtrl(_) => sparse::SparseApplyFtrl::INPUTS.len(),
            Operator::SparseApplyProximalAdagrad(_) => {
                sparse::SparseApplyProximalAdagrad::INPUTS.len()
            }
        }
    }

    /// Pure shape and dtype inference for one node. Fails fast on the first
    /// violated contract; never mutates anything.
    pub fn infer(
        &self,
        input_shapes: &[Shape],
        input_dtypes: &[DtypeTag],
    ) -> Result<Inference, InferenceError> {
        if input_shapes.len() != self.arity() || input_dtypes.len() != self.arity() {
            return Err(ShapeError::Arity {
                op: self.name().to_string(),
                expected: self.arity(),
                actual: input_shapes.len().min(input_dtypes.len()),
            }
            .into());
        }

        let (shapes, dtypes, in_place) = match self {
            Operator::ExtractImagePatches(op) => {
                (op.infer_shape(input_shapes)?, op.infer_dtype(input_dtypes)?, false)
            }
            Operator::Range(op) => {
                (op.infer_shape(input_shapes)?, op.infer_dtype(input_dtypes)?, false)
            }
            Operator::LinSpace(op) => {
                (op.infer_shape(input_shapes)?, op.infer_dtype(input_dtypes)?, false)
            }
            Operator::Quant(op) => {
                (op.infer_shape(input_shapes)?, op.infer_dtype(input_dtypes)?, false)
            }
            Operator::Dequant(op) => {
                (op.infer_shape(input_shapes)?, op.infer_dtype(input_dtypes)?, false)
            }
            Operator::MatrixDiag(op) => {
                (op.infer_shape(input_shapes)?, op.infer_dtype(input_dtypes)?, false)
            }
            Operator::MatrixDiagPart(op) => {
                (op.infer_shape(input_shapes)?, op.infer_dtype(input_dtypes)?, false)
            }
            Operator::MatrixSetDiag(op) => {
                (op.infer_shape(input_shapes)?, op.infer_dtype(input_dtypes)?, false)
            }
            Operator::SparseApplyFtrl(op) => {
                (op.infer_shape(input_shapes)?, op.infer_dtype(input_dtypes)?, true)
            }
            Operator::SparseApplyProximalAdagrad(op) => {
                (op.infer_shape(input_shapes)?, op.infer_dtype(input_dtypes)?, true)
            }
        };

        Ok(if in_place {
            Inference::InPlaceAck { shapes, dtypes }
        } else {
            Inference::Value { shapes, dtypes }
        })
    }
}

/// Per-operator-type contract: name, ordered io names, attribute schema and
/// the constructor turning parsed attribute values into a validated
/// `Operator`. Built once per operator type at registration.
#[derive(Debug)]
pub struct OperatorDescriptor {
    name: &'static str,
    inputs: &'static [&'static str],
    outputs: &'static [&'static str],
    attrs: Vec<AttributeSpec>,
    build: fn(&Attrs) -> Result<Operator, ConfigurationError>,
}

impl OperatorDescriptor {
    pub fn new(
        name: &'static str,
        inputs: &'static [&'static str],
        outputs: &'static [&'static str],
        attrs: Vec<AttributeSpec>,
        build: fn(&Attrs) -> Result<Operator, ConfigurationError>,
    ) -> OperatorDescriptor {
        OperatorDescriptor {
            name,
            inputs,
            outputs,
            attrs,
            build,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn inputs(&self) -> &'static [&'static str] {
        self.inputs
    }

    pub fn outputs(&self) -> &'static [&'static str] {
        self.outputs
    }

    pub fn attrs(&self) -> &[AttributeSpec] {
        &self.attrs
    }

    /// All-or-nothing construction: every attribute spec is evaluated in
    /// declaration order and the first violation aborts with no instance.
    pub fn instantiate(&self, attrs: &Attrs) -> Result<Operator, ConfigurationError> {
        (self.build)(attrs)
    }
}

#[cfg(test)]
mod tests {
    use crate::attrs::Attrs;
    use crate::dtype::DtypeTag;
    use crate::error::InferenceError;
    use crate::ops::{image, sparse};
    use crate::shape::{Shape, ShapeError};

    #[test]
    fn test_arity_checked() {
        let desc = image::descriptor();
        let attrs = Attrs::new()
            .set("ksizes", vec![1, 3, 3, 1])
            .set("strides", vec![1, 1, 1, 1])
            .set("rates", vec![1, 1, 1, 1]);
        let op = desc.instantiate(&attrs).unwrap();
        let err = op.infer(&[], &[]).expect_err("");
        assert_eq!(
            err,
            InferenceError::Shape(ShapeError::Arity {
                op: "ExtractImagePatches".to_string(),
                expected: 1,
                actual: 0,
            })
        );
        assert!(op
            .infer(&[Shape::new([1, 10, 10, 3])], &[DtypeTag::Float32])
            .is_ok());
    }

    #[test]
    fn test_in_place_flag() {
        let desc = sparse::adagrad_descriptor();
        let op = desc.instantiate(&Attrs::new()).unwrap();
        let state = Shape::new([3, 1, 2]);
        let scalar = Shape::scalar();
        let shapes = [
            state.clone(),
            state,
            scalar.clone(),
            scalar.clone(),
            scalar,
            Shape::new([2, 1, 2]),
            Shape::new([2]),
        ];
        let dtypes = [
            DtypeTag::Float32,
            DtypeTag::Float32,
            DtypeTag::Float32,
            DtypeTag::Float32,
            DtypeTag::Float32,
            DtypeTag::Float32,
            DtypeTag::Int32,
        ];
        let out = op.infer(&shapes, &dtypes).unwrap();
        assert!(out.is_in_place());
        assert_eq!(out.shapes(), &[Shape::new([1]), Shape::new([1])]);
    }
}
