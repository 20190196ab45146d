//! Backend kernel metadata. A kernel descriptor records, for one operator
//! on one backend, which dtype/format combinations the kernel binary
//! accepts across its full input+output signature.

use std::fmt;

use itertools::Itertools;
use thiserror::Error;

use crate::dtype::DtypeTag;
use crate::registry::RegistrationError;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Backend {
    Ascend,
    Gpu,
    Cpu,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Ascend => "Ascend",
            Backend::Gpu => "GPU",
            Backend::Cpu => "CPU",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Format {
    Default,
    Nchw,
    Nhwc,
    Nc1hwc0,
    FracZ,
}

impl Format {
    pub fn name(&self) -> &'static str {
        match self {
            Format::Default => "DefaultFormat",
            Format::Nchw => "NCHW",
            Format::Nhwc => "NHWC",
            Format::Nc1hwc0 => "NC1HWC0",
            Format::FracZ => "FracZ",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Attribute the kernel binary reads at launch time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KernelAttr {
    pub name: &'static str,
    pub required: bool,
}

/// Kernel entry for one (operator, backend) pair. Each combination lists
/// one `(dtype, format)` per input followed by one per output, so every
/// combination has the same length.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelDescriptor {
    op_name: &'static str,
    backend: Backend,
    kernel_name: &'static str,
    compute_cost: u32,
    partial_shape: bool,
    attrs: Vec<KernelAttr>,
    combinations: Vec<Vec<(DtypeTag, Format)>>,
}

impl KernelDescriptor {
    pub fn build(
        op_name: &'static str,
        backend: Backend,
        kernel_name: &'static str,
    ) -> KernelBuild {
        KernelBuild {
            inner: KernelDescriptor {
                op_name,
                backend,
                kernel_name,
                compute_cost: 0,
                partial_shape: false,
                attrs: vec![],
                combinations: vec![],
            },
        }
    }

    pub fn op_name(&self) -> &'static str {
        self.op_name
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn kernel_name(&self) -> &'static str {
        self.kernel_name
    }

    pub fn compute_cost(&self) -> u32 {
        self.compute_cost
    }

    pub fn partial_shape(&self) -> bool {
        self.partial_shape
    }

    pub fn attrs(&self) -> &[KernelAttr] {
        &self.attrs
    }

    pub fn combinations(&self) -> &[Vec<(DtypeTag, Format)>] {
        &self.combinations
    }

    pub fn supports(&self, requested: &[(DtypeTag, Format)]) -> bool {
        self.combinations.iter().any(|combo| combo == requested)
    }
}

pub struct KernelBuild {
    inner: KernelDescriptor,
}

impl KernelBuild {
    pub fn compute_cost(mut self, cost: u32) -> Self {
        self.inner.compute_cost = cost;
        self
    }

    pub fn partial_shape(mut self, flag: bool) -> Self {
        self.inner.partial_shape = flag;
        self
    }

    pub fn attr(mut self, name: &'static str, required: bool) -> Self {
        self.inner.attrs.push(KernelAttr { name, required });
        self
    }

    pub fn dtype_format(mut self, combo: &[(DtypeTag, Format)]) -> Self {
        self.inner.combinations.push(combo.to_vec());
        self
    }

    pub fn finish(self) -> Result<KernelDescriptor, RegistrationError> {
        let desc = self.inner;
        if desc.combinations.is_empty() {
            return Err(RegistrationError::EmptyCombinations {
                op: desc.op_name.to_string(),
                kernel: desc.kernel_name.to_string(),
            });
        }
        let width = desc.combinations[0].len();
        if desc.combinations.iter().any(|c| c.len() != width) {
            return Err(RegistrationError::RaggedCombinations {
                op: desc.op_name.to_string(),
                kernel: desc.kernel_name.to_string(),
            });
        }
        Ok(desc)
    }
}

pub fn display_combo(combo: &[(DtypeTag, Format)]) -> String {
    format!(
        "({})",
        combo
            .iter()
            .map(|(dtype, format)| format!("{}/{}", dtype, format))
            .join(", ")
    )
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum UnsupportedKernelError {
    #[error("no kernels registered for operator {op} on backend {backend}")]
    NoKernels { op: String, backend: Backend },
    #[error(
        "operator {op} on backend {backend} has no kernel accepting {requested}; supported: {}",
        .supported.join(", ")
    )]
    NoMatch {
        op: String,
        backend: Backend,
        requested: String,
        supported: Vec<String>,
    },
}
