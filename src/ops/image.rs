use crate::attrs::{AttrKind, AttrValue, AttributeSpec, Attrs, Constraint};
use crate::check::{check_dtype_in, check_rank, ConfigurationError};
use crate::dtype::{DtypeError, DtypeTag, NUMBER_TYPES};
use crate::kernel::{Backend, Format, KernelDescriptor};
use crate::ops::{Operator, OperatorDescriptor};
use crate::registry::{RegistrationError, RegistryBuilder};
use crate::shape::{Shape, ShapeError};

/// Extracts sliding patches from a 4-D NHWC image into depth.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractImagePatches {
    ksizes: [i64; 4],
    strides: [i64; 4],
    rates: [i64; 4],
    padding: Padding,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Padding {
    Valid,
    Same,
}

fn window_spec(name: &'static str) -> AttributeSpec {
    AttributeSpec::required(name, AttrKind::IntList)
}

fn padding_spec() -> AttributeSpec {
    AttributeSpec::optional(
        "padding",
        AttrKind::Str,
        Some(AttrValue::Str("VALID".to_string())),
    )
    .constrain(Constraint::OneOf {
        choices: &["VALID", "SAME"],
        fold_case: true,
    })
}

/// The window attributes all share one layout: [1, row, col, 1] with
/// positive row/col extents.
fn window_attr(name: &'static str, attrs: &Attrs) -> Result<[i64; 4], ConfigurationError> {
    let op = ExtractImagePatches::NAME;
    let stem = name.trim_end_matches('s');
    let list = window_spec(name).int_list(op, attrs)?;
    if list.len() != 4 || list[0] != 1 || list[3] != 1 {
        return Err(ConfigurationError::Invalid {
            op: op.to_string(),
            param: name.to_string(),
            expected: format!("of the form [1, {}_row, {}_col, 1]", stem, stem),
            actual: format!("{:?}", list),
        });
    }
    if list[1] < 1 || list[2] < 1 {
        return Err(ConfigurationError::Invalid {
            op: op.to_string(),
            param: name.to_string(),
            expected: format!("positive {}_row and {}_col", stem, stem),
            actual: format!("{:?}", list),
        });
    }
    Ok([list[0], list[1], list[2], list[3]])
}

impl ExtractImagePatches {
    pub const NAME: &'static str = "ExtractImagePatches";
    pub const INPUTS: &'static [&'static str] = &["input_x"];
    pub const OUTPUTS: &'static [&'static str] = &["y"];

    pub fn from_attrs(attrs: &Attrs) -> Result<Self, ConfigurationError> {
        let ksizes = window_attr("ksizes", attrs)?;
        let strides = window_attr("strides", attrs)?;
        let rates = window_attr("rates", attrs)?;
        let padding = match padding_spec().string(Self::NAME, attrs)?.as_str() {
            "SAME" => Padding::Same,
            _ => Padding::Valid,
        };
        Ok(ExtractImagePatches {
            ksizes,
            strides,
            rates,
            padding,
        })
    }

    pub fn infer_shape(&self, inputs: &[Shape]) -> Result<Vec<Shape>, ShapeError> {
        let x = &inputs[0];
        check_rank(Self::NAME, "input_x", x, 4)?;

        let (in_batch, in_row, in_col, in_depth) = (x[0], x[1], x[2], x[3]);
        let (ksize_row, ksize_col) = (self.ksizes[1] as usize, self.ksizes[2] as usize);
        let (stride_row, stride_col) = (self.strides[1] as usize, self.strides[2] as usize);
        let (rate_row, rate_col) = (self.rates[1] as usize, self.rates[2] as usize);

        let out_depth = ksize_row * ksize_col * in_depth;
        let (out_row, out_col) = match self.padding {
            Padding::Valid => (
                valid_extent(Self::NAME, "in_row", in_row, ksize_row, rate_row, stride_row)?,
                valid_extent(Self::NAME, "in_col", in_col, ksize_col, rate_col, stride_col)?,
            ),
            Padding::Same => (
                same_extent(in_row, stride_row),
                same_extent(in_col, stride_col),
            ),
        };

        Ok(vec![Shape::new([in_batch, out_row, out_col, out_depth])])
    }

    pub fn infer_dtype(&self, inputs: &[DtypeTag]) -> Result<Vec<DtypeTag>, DtypeError> {
        let x = check_dtype_in(Self::NAME, "input_x", inputs[0], NUMBER_TYPES)?;
        Ok(vec![x])
    }
}

// VALID padding: the dilated window must fit entirely inside the image.
fn valid_extent(
    op: &str,
    param: &str,
    extent: usize,
    ksize: usize,
    rate: usize,
    stride: usize,
) -> Result<usize, ShapeError> {
    let window = ksize + (ksize - 1) * (rate - 1);
    if window > extent {
        return Err(ShapeError::WindowTooLarge {
            op: op.to_string(),
            param: param.to_string(),
            window,
            extent,
        });
    }
    Ok((extent - window) / stride + 1)
}

fn same_extent(extent: usize, stride: usize) -> usize {
    if extent == 0 {
        0
    } else {
        (extent - 1) / stride + 1
    }
}

pub fn descriptor() -> OperatorDescriptor {
    OperatorDescriptor::new(
        ExtractImagePatches::NAME,
        ExtractImagePatches::INPUTS,
        ExtractImagePatches::OUTPUTS,
        vec![
            window_spec("ksizes"),
            window_spec("strides"),
            window_spec("rates"),
            padding_spec(),
        ],
        |attrs| Ok(Operator::ExtractImagePatches(ExtractImagePatches::from_attrs(attrs)?)),
    )
}

pub fn register(builder: &mut RegistryBuilder) -> Result<(), RegistrationError> {
    builder.register_operator(descriptor())?;
    builder.register_kernel(
        KernelDescriptor::build(
            ExtractImagePatches::NAME,
            Backend::Ascend,
            "extract_image_patches",
        )
        .compute_cost(10)
        .attr("ksizes", true)
        .attr("strides", true)
        .attr("rates", true)
        .attr("padding", false)
        .dtype_format(&[
            (DtypeTag::Float16, Format::Nhwc),
            (DtypeTag::Float16, Format::Nhwc),
        ])
        .dtype_format(&[
            (DtypeTag::Float32, Format::Nhwc),
            (DtypeTag::Float32, Format::Nhwc),
        ])
        .dtype_format(&[
            (DtypeTag::Uint8, Format::Nhwc),
            (DtypeTag::Uint8, Format::Nhwc),
        ])
        .finish()?,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::attrs::Attrs;
    use crate::dtype::DtypeTag;
    use crate::ops::image::{descriptor, ExtractImagePatches};
    use crate::shape::{Shape, ShapeError};

    fn attrs(padding: &str) -> Attrs {
        Attrs::new()
            .set("ksizes", vec![1, 3, 3, 1])
            .set("strides", vec![1, 1, 1, 1])
            .set("rates", vec![1, 1, 1, 1])
            .set("padding", padding)
    }

    fn build(padding: &str) -> ExtractImagePatches {
        ExtractImagePatches::from_attrs(&attrs(padding)).unwrap()
    }

    #[test]
    fn test_valid_padding() {
        let op = build("VALID");
        let out = op.infer_shape(&[Shape::new([1, 10, 10, 3])]).unwrap();
        assert_eq!(out, vec![Shape::new([1, 8, 8, 27])]);
    }

    #[test]
    fn test_same_padding() {
        let op = build("same");
        let out = op.infer_shape(&[Shape::new([1, 10, 10, 3])]).unwrap();
        assert_eq!(out, vec![Shape::new([1, 10, 10, 27])]);
    }

    #[test]
    fn test_strided() {
        let op = ExtractImagePatches::from_attrs(
            &Attrs::new()
                .set("ksizes", vec![1, 2, 2, 1])
                .set("strides", vec![1, 2, 2, 1])
                .set("rates", vec![1, 2, 2, 1])
                .set("padding", "VALID"),
        )
        .unwrap();
        // effective window = 2 + (2 - 1) * (2 - 1) = 3
        let out = op.infer_shape(&[Shape::new([2, 7, 9, 1])]).unwrap();
        assert_eq!(out, vec![Shape::new([2, 3, 4, 4])]);
    }

    #[test]
    fn test_rank_must_be_4() {
        let op = build("VALID");
        let err = op.infer_shape(&[Shape::new([10, 10, 3])]).expect_err("");
        assert!(matches!(err, ShapeError::Rank { actual: 3, .. }));
    }

    #[test]
    fn test_window_too_large() {
        let op = build("VALID");
        let err = op.infer_shape(&[Shape::new([1, 2, 2, 3])]).expect_err("");
        assert_eq!(
            err,
            ShapeError::WindowTooLarge {
                op: "ExtractImagePatches".to_string(),
                param: "in_row".to_string(),
                window: 3,
                extent: 2,
            }
        );
    }

    #[test]
    fn test_bad_window_layout() {
        let bad = Attrs::new()
            .set("ksizes", vec![2, 3, 3, 1])
            .set("strides", vec![1, 1, 1, 1])
            .set("rates", vec![1, 1, 1, 1]);
        assert!(ExtractImagePatches::from_attrs(&bad).is_err());

        let nonpositive = Attrs::new()
            .set("ksizes", vec![1, 0, 3, 1])
            .set("strides", vec![1, 1, 1, 1])
            .set("rates", vec![1, 1, 1, 1]);
        assert!(ExtractImagePatches::from_attrs(&nonpositive).is_err());
    }

    #[test]
    fn test_padding_default_and_enum() {
        let defaulted = Attrs::new()
            .set("ksizes", vec![1, 3, 3, 1])
            .set("strides", vec![1, 1, 1, 1])
            .set("rates", vec![1, 1, 1, 1]);
        assert!(ExtractImagePatches::from_attrs(&defaulted).is_ok());
        assert!(ExtractImagePatches::from_attrs(&attrs("full")).is_err());
    }

    #[test]
    fn test_dtype_passthrough() {
        let op = build("VALID");
        assert_eq!(
            op.infer_dtype(&[DtypeTag::Float16]).unwrap(),
            vec![DtypeTag::Float16]
        );
        assert!(op.infer_dtype(&[DtypeTag::Bool]).is_err());
    }

    #[test]
    fn test_descriptor_io() {
        let desc = descriptor();
        assert_eq!(desc.name(), "ExtractImagePatches");
        assert_eq!(desc.inputs(), &["input_x"]);
        assert_eq!(desc.attrs().len(), 4);
    }
}
