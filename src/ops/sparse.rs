//! Sparse in-place optimizer updates. These operators mutate their state
//! tensors through input aliasing; inference reports a degenerate `[1]`
//! acknowledgement per state tensor rather than a computed value.

use crate::attrs::{AttrKind, AttrValue, AttributeSpec, Attrs, Constraint};
use crate::check::{
    check_dim_eq, check_dtype_in, check_dtypes_same, check_rank, check_rank_at_least,
    check_shapes_eq, Bounds, ConfigurationError, Rel,
};
use crate::dtype::{DtypeError, DtypeTag, INDEX_TYPES};
use crate::kernel::{Backend, Format, KernelDescriptor};
use crate::ops::{Operator, OperatorDescriptor};
use crate::registry::{RegistrationError, RegistryBuilder};
use crate::shape::{Shape, ShapeError};

fn use_locking_spec() -> AttributeSpec {
    AttributeSpec::optional("use_locking", AttrKind::Bool, Some(AttrValue::Bool(false)))
}

/// Shared contract of both update families: every state tensor has one
/// identical shape, the gradient matches the state past the leading
/// dimension, and the rank-1 indices tensor addresses gradient rows.
fn check_update_shapes(
    op: &str,
    state: &[(&str, &Shape)],
    grad: &Shape,
    indices: &Shape,
) -> Result<(), ShapeError> {
    let (var_name, var) = state[0];
    for (name, shape) in &state[1..] {
        check_shapes_eq(
            op,
            &format!("{} shape", var_name),
            var,
            &format!("{} shape", name),
            shape,
        )?;
    }
    check_rank_at_least(op, "grad", grad, 1)?;
    if var.rank() > 1 {
        check_shapes_eq(
            op,
            &format!("{} shape excluding the leading dimension", var_name),
            &Shape::new(var.extents()[1..].iter().copied()),
            "grad shape excluding the leading dimension",
            &Shape::new(grad.extents()[1..].iter().copied()),
        )?;
    }
    check_rank(op, "indices", indices, 1)?;
    check_dim_eq(op, "grad's leading dimension", grad[0], "indices length", indices[0])
}

/// FTRL-proximal sparse update over `var`/`accum`/`linear`.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseApplyFtrl {
    lr: f64,
    l1: f64,
    l2: f64,
    lr_power: f64,
    use_locking: bool,
}

fn lr_spec() -> AttributeSpec {
    AttributeSpec::required("lr", AttrKind::Float).constrain(Constraint::Range {
        low: 0.0,
        high: f64::INFINITY,
        bounds: Bounds::IncNeither,
    })
}

fn reg_spec(name: &'static str) -> AttributeSpec {
    AttributeSpec::required(name, AttrKind::Float).constrain(Constraint::Range {
        low: 0.0,
        high: f64::INFINITY,
        bounds: Bounds::IncLeft,
    })
}

fn lr_power_spec() -> AttributeSpec {
    AttributeSpec::required("lr_power", AttrKind::Float).constrain(Constraint::Number {
        bound: 0.0,
        rel: Rel::Le,
    })
}

impl SparseApplyFtrl {
    pub const NAME: &'static str = "SparseApplyFtrl";
    pub const INPUTS: &'static [&'static str] = &["var", "accum", "linear", "grad", "indices"];
    pub const OUTPUTS: &'static [&'static str] = &["var", "accum", "linear"];

    pub fn from_attrs(attrs: &Attrs) -> Result<Self, ConfigurationError> {
        let lr = lr_spec().float(Self::NAME, attrs)?;
        let l1 = reg_spec("l1").float(Self::NAME, attrs)?;
        let l2 = reg_spec("l2").float(Self::NAME, attrs)?;
        let lr_power = lr_power_spec().float(Self::NAME, attrs)?;
        let use_locking = use_locking_spec().boolean(Self::NAME, attrs)?;
        Ok(SparseApplyFtrl {
            lr,
            l1,
            l2,
            lr_power,
            use_locking,
        })
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    pub fn l1(&self) -> f64 {
        self.l1
    }

    pub fn l2(&self) -> f64 {
        self.l2
    }

    pub fn lr_power(&self) -> f64 {
        self.lr_power
    }

    pub fn use_locking(&self) -> bool {
        self.use_locking
    }

    pub fn infer_shape(&self, inputs: &[Shape]) -> Result<Vec<Shape>, ShapeError> {
        let (var, accum, linear) = (&inputs[0], &inputs[1], &inputs[2]);
        let (grad, indices) = (&inputs[3], &inputs[4]);
        check_update_shapes(
            Self::NAME,
            &[("var", var), ("accum", accum), ("linear", linear)],
            grad,
            indices,
        )?;
        Ok(vec![Shape::new([1]), Shape::new([1]), Shape::new([1])])
    }

    pub fn infer_dtype(&self, inputs: &[DtypeTag]) -> Result<Vec<DtypeTag>, DtypeError> {
        let state = check_dtypes_same(
            Self::NAME,
            &[
                ("var", inputs[0]),
                ("accum", inputs[1]),
                ("linear", inputs[2]),
                ("grad", inputs[3]),
            ],
            &[DtypeTag::Float32],
        )?;
        check_dtype_in(Self::NAME, "indices", inputs[4], &[DtypeTag::Int32])?;
        Ok(vec![state, state, state])
    }
}

/// Proximal Adagrad sparse update over `var`/`accum`, with the learning
/// rate and regularizers supplied as scalar tensors.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseApplyProximalAdagrad {
    use_locking: bool,
}

impl SparseApplyProximalAdagrad {
    pub const NAME: &'static str = "SparseApplyProximalAdagrad";
    pub const INPUTS: &'static [&'static str] =
        &["var", "accum", "lr", "l1", "l2", "grad", "indices"];
    pub const OUTPUTS: &'static [&'static str] = &["var", "accum"];

    pub fn from_attrs(attrs: &Attrs) -> Result<Self, ConfigurationError> {
        let use_locking = use_locking_spec().boolean(Self::NAME, attrs)?;
        Ok(SparseApplyProximalAdagrad { use_locking })
    }

    pub fn use_locking(&self) -> bool {
        self.use_locking
    }

    pub fn infer_shape(&self, inputs: &[Shape]) -> Result<Vec<Shape>, ShapeError> {
        let (var, accum) = (&inputs[0], &inputs[1]);
        let (grad, indices) = (&inputs[5], &inputs[6]);
        check_update_shapes(
            Self::NAME,
            &[("var", var), ("accum", accum)],
            grad,
            indices,
        )?;
        Ok(vec![Shape::new([1]), Shape::new([1])])
    }

    pub fn infer_dtype(&self, inputs: &[DtypeTag]) -> Result<Vec<DtypeTag>, DtypeError> {
        let state = check_dtypes_same(
            Self::NAME,
            &[("var", inputs[0]), ("accum", inputs[1]), ("grad", inputs[5])],
            &[DtypeTag::Float32],
        )?;
        check_dtype_in(Self::NAME, "lr", inputs[2], &[DtypeTag::Float32])?;
        check_dtype_in(Self::NAME, "l1", inputs[3], &[DtypeTag::Float32])?;
        check_dtype_in(Self::NAME, "l2", inputs[4], &[DtypeTag::Float32])?;
        check_dtype_in(Self::NAME, "indices", inputs[6], INDEX_TYPES)?;
        Ok(vec![state, state])
    }
}

pub fn ftrl_descriptor() -> OperatorDescriptor {
    OperatorDescriptor::new(
        SparseApplyFtrl::NAME,
        SparseApplyFtrl::INPUTS,
        SparseApplyFtrl::OUTPUTS,
        vec![
            lr_spec(),
            reg_spec("l1"),
            reg_spec("l2"),
            lr_power_spec(),
            use_locking_spec(),
        ],
        |attrs| Ok(Operator::SparseApplyFtrl(SparseApplyFtrl::from_attrs(attrs)?)),
    )
}

pub fn adagrad_descriptor() -> OperatorDescriptor {
    OperatorDescriptor::new(
        SparseApplyProximalAdagrad::NAME,
        SparseApplyProximalAdagrad::INPUTS,
        SparseApplyProximalAdagrad::OUTPUTS,
        vec![use_locking_spec()],
        |attrs| {
            Ok(Operator::SparseApplyProximalAdagrad(
                SparseApplyProximalAdagrad::from_attrs(attrs)?,
            ))
        },
    )
}

// Both update primitives are pinned to the CPU backend.
pub fn register(builder: &mut RegistryBuilder) -> Result<(), RegistrationError> {
    builder.register_operator(ftrl_descriptor())?;
    let f32d = (DtypeTag::Float32, Format::Default);
    let i32d = (DtypeTag::Int32, Format::Default);
    builder.register_kernel(
        KernelDescriptor::build(SparseApplyFtrl::NAME, Backend::Cpu, "sparse_apply_ftrl")
            .compute_cost(10)
            .attr("lr", true)
            .attr("l1", true)
            .attr("l2", true)
            .attr("lr_power", true)
            .attr("use_locking", false)
            .dtype_format(&[f32d, f32d, f32d, f32d, i32d, f32d, f32d, f32d])
            .finish()?,
    )?;

    builder.register_operator(adagrad_descriptor())?;
    builder.register_kernel(
        KernelDescriptor::build(
            SparseApplyProximalAdagrad::NAME,
            Backend::Cpu,
            "sparse_apply_proximal_adagrad",
        )
        .compute_cost(10)
        .attr("use_locking", false)
        .dtype_format(&[f32d, f32d, f32d, f32d, f32d, f32d, i32d, f32d, f32d])
        .finish()?,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::attrs::Attrs;
    use crate::dtype::DtypeTag;
    use crate::ops::sparse::{SparseApplyFtrl, SparseApplyProximalAdagrad};
    use crate::shape::{Shape, ShapeError};

    fn ftrl_attrs(lr: f64, l1: f64, l2: f64, lr_power: f64) -> Attrs {
        Attrs::new()
            .set("lr", lr)
            .set("l1", l1)
            .set("l2", l2)
            .set("lr_power", lr_power)
    }

    fn ftrl() -> SparseApplyFtrl {
        SparseApplyFtrl::from_attrs(&ftrl_attrs(0.01, 0.0, 0.0, -0.5)).unwrap()
    }

    #[test]
    fn test_ftrl_attr_ranges() {
        assert!(SparseApplyFtrl::from_attrs(&ftrl_attrs(0.0, 0.0, 0.0, -0.5)).is_err());
        assert!(SparseApplyFtrl::from_attrs(&ftrl_attrs(0.01, -1.0, 0.0, -0.5)).is_err());
        assert!(SparseApplyFtrl::from_attrs(&ftrl_attrs(0.01, 0.0, -1.0, -0.5)).is_err());
        assert!(SparseApplyFtrl::from_attrs(&ftrl_attrs(0.01, 0.0, 0.0, 0.5)).is_err());
        let op = SparseApplyFtrl::from_attrs(&ftrl_attrs(0.01, 0.0, 0.0, 0.0)).unwrap();
        assert_eq!(op.lr_power(), 0.0);
        assert!(!op.use_locking());
    }

    #[test]
    fn test_ftrl_shapes() {
        let state = Shape::new([3, 1, 2]);
        let out = ftrl()
            .infer_shape(&[
                state.clone(),
                state.clone(),
                state,
                Shape::new([2, 1, 2]),
                Shape::new([2]),
            ])
            .unwrap();
        assert_eq!(out, vec![Shape::new([1]), Shape::new([1]), Shape::new([1])]);
    }

    #[test]
    fn test_ftrl_state_shape_mismatch() {
        let err = ftrl()
            .infer_shape(&[
                Shape::new([3, 2]),
                Shape::new([3, 2]),
                Shape::new([4, 2]),
                Shape::new([2, 2]),
                Shape::new([2]),
            ])
            .expect_err("");
        assert!(matches!(err, ShapeError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_ftrl_grad_tail_mismatch() {
        let err = ftrl()
            .infer_shape(&[
                Shape::new([3, 2]),
                Shape::new([3, 2]),
                Shape::new([3, 2]),
                Shape::new([2, 5]),
                Shape::new([2]),
            ])
            .expect_err("");
        assert!(matches!(err, ShapeError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_ftrl_indices_contract() {
        let state = Shape::new([3, 2]);
        let err = ftrl()
            .infer_shape(&[
                state.clone(),
                state.clone(),
                state.clone(),
                Shape::new([2, 2]),
                Shape::new([2, 1]),
            ])
            .expect_err("");
        assert!(matches!(err, ShapeError::Rank { .. }));

        let err = ftrl()
            .infer_shape(&[
                state.clone(),
                state.clone(),
                state,
                Shape::new([2, 2]),
                Shape::new([3]),
            ])
            .expect_err("");
        assert!(matches!(err, ShapeError::DimMismatch { .. }));
    }

    #[test]
    fn test_ftrl_dtypes() {
        let f = DtypeTag::Float32;
        let out = ftrl()
            .infer_dtype(&[f, f, f, f, DtypeTag::Int32])
            .unwrap();
        assert_eq!(out, vec![f, f, f]);

        assert!(ftrl()
            .infer_dtype(&[f, f, DtypeTag::Float16, f, DtypeTag::Int32])
            .is_err());
        assert!(ftrl().infer_dtype(&[f, f, f, f, DtypeTag::Int64]).is_err());
    }

    #[test]
    fn test_adagrad_indices_dtypes() {
        let op = SparseApplyProximalAdagrad::from_attrs(&Attrs::new()).unwrap();
        let f = DtypeTag::Float32;
        for indices in [DtypeTag::Int16, DtypeTag::Int64, DtypeTag::Uint64] {
            let out = op.infer_dtype(&[f, f, f, f, f, f, indices]).unwrap();
            assert_eq!(out, vec![f, f]);
        }
        assert!(op.infer_dtype(&[f, f, f, f, f, f, DtypeTag::Int8]).is_err());
        assert!(op
            .infer_dtype(&[f, f, DtypeTag::Float16, f, f, f, DtypeTag::Int32])
            .is_err());
    }

    #[test]
    fn test_adagrad_shapes() {
        let op = SparseApplyProximalAdagrad::from_attrs(&Attrs::new()).unwrap();
        let state = Shape::new([3, 2]);
        let scalar = Shape::scalar();
        let out = op
            .infer_shape(&[
                state.clone(),
                state,
                scalar.clone(),
                scalar.clone(),
                scalar,
                Shape::new([2, 2]),
                Shape::new([2]),
            ])
            .unwrap();
        assert_eq!(out, vec![Shape::new([1]), Shape::new([1])]);
    }
}
