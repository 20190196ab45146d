use crate::attrs::{AttrKind, AttrValue, AttributeSpec, Attrs, Constraint};
use crate::check::{check_dtype_in, ConfigurationError};
use crate::dtype::{DtypeError, DtypeTag};
use crate::kernel::{Backend, Format, KernelDescriptor};
use crate::ops::{Operator, OperatorDescriptor};
use crate::registry::{RegistrationError, RegistryBuilder};
use crate::shape::{Shape, ShapeError};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RoundMode {
    Round,
    Floor,
    Ceil,
    Trunc,
}

/// Affine quantization to int8: `y = round(scale * x + offset)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Quant {
    scale: f64,
    offset: f64,
    sqrt_mode: bool,
    round_mode: RoundMode,
}

fn scale_spec() -> AttributeSpec {
    AttributeSpec::required("scale", AttrKind::Float)
}

fn offset_spec() -> AttributeSpec {
    AttributeSpec::required("offset", AttrKind::Float)
}

fn sqrt_mode_spec() -> AttributeSpec {
    AttributeSpec::optional("sqrt_mode", AttrKind::Bool, Some(AttrValue::Bool(false)))
}

fn round_mode_spec() -> AttributeSpec {
    AttributeSpec::optional(
        "round_mode",
        AttrKind::Str,
        Some(AttrValue::Str("Round".to_string())),
    )
    .constrain(Constraint::OneOf {
        choices: &["Round", "Floor", "Ceil", "Trunc"],
        fold_case: false,
    })
}

impl Quant {
    pub const NAME: &'static str = "Quant";
    pub const INPUTS: &'static [&'static str] = &["input_x"];
    pub const OUTPUTS: &'static [&'static str] = &["y"];

    pub fn from_attrs(attrs: &Attrs) -> Result<Self, ConfigurationError> {
        let scale = scale_spec().float(Self::NAME, attrs)?;
        let offset = offset_spec().float(Self::NAME, attrs)?;
        let sqrt_mode = sqrt_mode_spec().boolean(Self::NAME, attrs)?;
        let round_mode = match round_mode_spec().string(Self::NAME, attrs)?.as_str() {
            "Floor" => RoundMode::Floor,
            "Ceil" => RoundMode::Ceil,
            "Trunc" => RoundMode::Trunc,
            _ => RoundMode::Round,
        };
        Ok(Quant {
            scale,
            offset,
            sqrt_mode,
            round_mode,
        })
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn sqrt_mode(&self) -> bool {
        self.sqrt_mode
    }

    pub fn round_mode(&self) -> RoundMode {
        self.round_mode
    }

    pub fn infer_shape(&self, inputs: &[Shape]) -> Result<Vec<Shape>, ShapeError> {
        Ok(vec![inputs[0].clone()])
    }

    /// Output dtype is fixed by table: int8 for any allowed input.
    pub fn infer_dtype(&self, inputs: &[DtypeTag]) -> Result<Vec<DtypeTag>, DtypeError> {
        check_dtype_in(
            Self::NAME,
            "input_x",
            inputs[0],
            &[DtypeTag::Float16, DtypeTag::Float32],
        )?;
        Ok(vec![DtypeTag::Int8])
    }
}

/// Rescales int32 accumulators back to float16: `y = x * deq_scale`.
#[derive(Clone, Debug, PartialEq)]
pub struct Dequant {
    sqrt_mode: bool,
    relu_flag: bool,
}

fn relu_flag_spec() -> AttributeSpec {
    AttributeSpec::optional("relu_flag", AttrKind::Bool, Some(AttrValue::Bool(false)))
}

impl Dequant {
    pub const NAME: &'static str = "Dequant";
    pub const INPUTS: &'static [&'static str] = &["input_x", "deq_scale"];
    pub const OUTPUTS: &'static [&'static str] = &["y"];

    pub fn from_attrs(attrs: &Attrs) -> Result<Self, ConfigurationError> {
        let sqrt_mode = sqrt_mode_spec().boolean(Self::NAME, attrs)?;
        let relu_flag = relu_flag_spec().boolean(Self::NAME, attrs)?;
        Ok(Dequant {
            sqrt_mode,
            relu_flag,
        })
    }

    pub fn sqrt_mode(&self) -> bool {
        self.sqrt_mode
    }

    pub fn relu_flag(&self) -> bool {
        self.relu_flag
    }

    pub fn infer_shape(&self, inputs: &[Shape]) -> Result<Vec<Shape>, ShapeError> {
        Ok(vec![inputs[0].clone()])
    }

    pub fn infer_dtype(&self, inputs: &[DtypeTag]) -> Result<Vec<DtypeTag>, DtypeError> {
        check_dtype_in(Self::NAME, "input_x", inputs[0], &[DtypeTag::Int32])?;
        check_dtype_in(
            Self::NAME,
            "deq_scale",
            inputs[1],
            &[DtypeTag::Float16, DtypeTag::Uint64],
        )?;
        Ok(vec![DtypeTag::Float16])
    }
}

pub fn quant_descriptor() -> OperatorDescriptor {
    OperatorDescriptor::new(
        Quant::NAME,
        Quant::INPUTS,
        Quant::OUTPUTS,
        vec![
            scale_spec(),
            offset_spec(),
            sqrt_mode_spec(),
            round_mode_spec(),
        ],
        |attrs| Ok(Operator::Quant(Quant::from_attrs(attrs)?)),
    )
}

pub fn dequant_descriptor() -> OperatorDescriptor {
    OperatorDescriptor::new(
        Dequant::NAME,
        Dequant::INPUTS,
        Dequant::OUTPUTS,
        vec![sqrt_mode_spec(), relu_flag_spec()],
        |attrs| Ok(Operator::Dequant(Dequant::from_attrs(attrs)?)),
    )
}

pub fn register(builder: &mut RegistryBuilder) -> Result<(), RegistrationError> {
    builder.register_operator(quant_descriptor())?;
    builder.register_kernel(
        KernelDescriptor::build(Quant::NAME, Backend::Ascend, "ascend_quant")
            .compute_cost(10)
            .attr("scale", true)
            .attr("offset", true)
            .attr("sqrt_mode", false)
            .attr("round_mode", false)
            .dtype_format(&[
                (DtypeTag::Float16, Format::Default),
                (DtypeTag::Int8, Format::Default),
            ])
            .dtype_format(&[
                (DtypeTag::Float32, Format::Default),
                (DtypeTag::Int8, Format::Default),
            ])
            .finish()?,
    )?;

    builder.register_operator(dequant_descriptor())?;
    builder.register_kernel(
        KernelDescriptor::build(Dequant::NAME, Backend::Ascend, "ascend_dequant")
            .compute_cost(10)
            .attr("sqrt_mode", false)
            .attr("relu_flag", false)
            .dtype_format(&[
                (DtypeTag::Int32, Format::Default),
                (DtypeTag::Float16, Format::Default),
                (DtypeTag::Float16, Format::Default),
            ])
            .dtype_format(&[
                (DtypeTag::Int32, Format::Default),
                (DtypeTag::Uint64, Format::Default),
                (DtypeTag::Float16, Format::Default),
            ])
            .finish()?,
    )?;
    Ok(())
}
