use crate::attrs::{AttrKind, AttrValue, AttributeSpec, Attrs, Constraint};
use crate::check::{check_dtype_in, check_dtypes_same, check_number, ConfigurationError, Rel};
use crate::dtype::{DtypeError, DtypeTag};
use crate::kernel::{Backend, Format, KernelDescriptor};
use crate::ops::{Operator, OperatorDescriptor};
use crate::registry::{RegistrationError, RegistryBuilder};
use crate::shape::{Shape, ShapeError};

/// Evaluates `x * delta + start` over an assistant tensor; the arithmetic
/// sequence bounds are attributes fixed at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct Range {
    start: f64,
    limit: f64,
    delta: f64,
}

fn start_spec() -> AttributeSpec {
    AttributeSpec::required("start", AttrKind::Float)
}

fn limit_spec() -> AttributeSpec {
    AttributeSpec::optional("limit", AttrKind::Float, None)
}

fn delta_spec() -> AttributeSpec {
    AttributeSpec::optional("delta", AttrKind::Float, Some(AttrValue::Float(1.0))).constrain(
        Constraint::Number {
            bound: 0.0,
            rel: Rel::Ne,
        },
    )
}

impl Range {
    pub const NAME: &'static str = "Range";
    pub const INPUTS: &'static [&'static str] = &["x"];
    pub const OUTPUTS: &'static [&'static str] = &["y"];

    pub fn from_attrs(attrs: &Attrs) -> Result<Self, ConfigurationError> {
        let start = start_spec().float(Self::NAME, attrs)?;
        let limit = limit_spec().float_opt(Self::NAME, attrs)?;
        let delta = delta_spec().float(Self::NAME, attrs)?;

        // A missing limit turns the supplied start into the limit, with the
        // sequence starting at zero.
        let (start, limit) = match limit {
            Some(limit) => (start, limit),
            None => (0.0, start),
        };

        check_number(Self::NAME, "start", start, limit, Rel::Ne)?;
        if delta > 0.0 && start > limit {
            return Err(ConfigurationError::Invalid {
                op: Self::NAME.to_string(),
                param: "limit".to_string(),
                expected: format!("greater than start {} when delta {} is positive", start, delta),
                actual: limit.to_string(),
            });
        }
        if delta < 0.0 && start < limit {
            return Err(ConfigurationError::Invalid {
                op: Self::NAME.to_string(),
                param: "start".to_string(),
                expected: format!("greater than limit {} when delta {} is negative", limit, delta),
                actual: start.to_string(),
            });
        }

        Ok(Range {
            start,
            limit,
            delta,
        })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn limit(&self) -> f64 {
        self.limit
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn infer_shape(&self, inputs: &[Shape]) -> Result<Vec<Shape>, ShapeError> {
        Ok(vec![inputs[0].clone()])
    }

    pub fn infer_dtype(&self, inputs: &[DtypeTag]) -> Result<Vec<DtypeTag>, DtypeError> {
        let x = check_dtype_in(
            Self::NAME,
            "x",
            inputs[0],
            &[DtypeTag::Float32, DtypeTag::Int32],
        )?;
        Ok(vec![x])
    }
}

/// Interpolates ticks of an interval against an assistant tensor.
#[derive(Clone, Debug, PartialEq)]
pub struct LinSpace;

impl LinSpace {
    pub const NAME: &'static str = "LinSpace";
    pub const INPUTS: &'static [&'static str] = &["assist", "start", "stop", "num"];
    pub const OUTPUTS: &'static [&'static str] = &["output"];

    pub fn from_attrs(_attrs: &Attrs) -> Result<Self, ConfigurationError> {
        Ok(LinSpace)
    }

    pub fn infer_shape(&self, inputs: &[Shape]) -> Result<Vec<Shape>, ShapeError> {
        Ok(vec![inputs[0].clone()])
    }

    pub fn infer_dtype(&self, inputs: &[DtypeTag]) -> Result<Vec<DtypeTag>, DtypeError> {
        check_dtype_in(Self::NAME, "num", inputs[3], &[DtypeTag::Int32])?;
        let out = check_dtypes_same(
            Self::NAME,
            &[
                ("assist", inputs[0]),
                ("start", inputs[1]),
                ("stop", inputs[2]),
            ],
            &[DtypeTag::Float32],
        )?;
        Ok(vec![out])
    }
}

pub fn range_descriptor() -> OperatorDescriptor {
    OperatorDescriptor::new(
        Range::NAME,
        Range::INPUTS,
        Range::OUTPUTS,
        vec![start_spec(), limit_spec(), delta_spec()],
        |attrs| Ok(Operator::Range(Range::from_attrs(attrs)?)),
    )
}

pub fn lin_space_descriptor() -> OperatorDescriptor {
    OperatorDescriptor::new(
        LinSpace::NAME,
        LinSpace::INPUTS,
        LinSpace::OUTPUTS,
        vec![],
        |attrs| Ok(Operator::LinSpace(LinSpace::from_attrs(attrs)?)),
    )
}

pub fn register(builder: &mut RegistryBuilder) -> Result<(), RegistrationError> {
    builder.register_operator(range_descriptor())?;
    builder.register_kernel(
        KernelDescriptor::build(Range::NAME, Backend::Ascend, "range")
            .compute_cost(10)
            .attr("start", true)
            .attr("limit", false)
            .attr("delta", false)
            .dtype_format(&[
                (DtypeTag::Float32, Format::Default),
                (DtypeTag::Float32, Format::Default),
            ])
            .dtype_format(&[
                (DtypeTag::Int32, Format::Default),
                (DtypeTag::Int32, Format::Default),
            ])
            .finish()?,
    )?;

    builder.register_operator(lin_space_descriptor())?;
    builder.register_kernel(
        KernelDescriptor::build(LinSpace::NAME, Backend::Ascend, "lin_space")
            .compute_cost(10)
            .dtype_format(&[
                (DtypeTag::Float32, Format::Default),
                (DtypeTag::Float32, Format::Default),
                (DtypeTag::Float32, Format::Default),
                (DtypeTag::Int32, Format::Default),
                (DtypeTag::Float32, Format::Default),
            ])
            .finish()?,
    )?;
    Ok(())
}
