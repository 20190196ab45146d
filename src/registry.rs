//! Global operator and kernel registry.
//!
//! Registration happens in two phases: a mutable `RegistryBuilder` collects
//! operator descriptors and kernel descriptors, then `freeze` produces the
//! immutable `Registry` every lookup goes through. The process-wide registry
//! holding the builtin catalog is populated once on first access.

use std::collections::HashMap;

use lazy_static::lazy_static;
use thiserror::Error;
use tracing::debug;

use crate::attrs::Attrs;
use crate::dtype::DtypeTag;
use crate::error::InferenceError;
use crate::kernel::{display_combo, Backend, Format, KernelDescriptor, UnsupportedKernelError};
use crate::ops::{self, Inference, OperatorDescriptor};
use crate::shape::Shape;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum RegistrationError {
    #[error("operator {0} is already registered")]
    DuplicateOperator(String),

    #[error("kernel {kernel} for operator {op} on backend {backend} is already registered with different metadata")]
    ConflictingKernel {
        op: String,
        backend: Backend,
        kernel: String,
    },

    #[error("kernel {kernel} for operator {op} declares no dtype/format combinations")]
    EmptyCombinations { op: String, kernel: String },

    #[error("kernel {kernel} for operator {op} declares combinations of differing lengths")]
    RaggedCombinations { op: String, kernel: String },
}

#[derive(Default)]
pub struct RegistryBuilder {
    ops: HashMap<&'static str, OperatorDescriptor>,
    kernels: HashMap<&'static str, HashMap<Backend, Vec<KernelDescriptor>>>,
}

impl RegistryBuilder {
    pub fn new() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn register_operator(
        &mut self,
        desc: OperatorDescriptor,
    ) -> Result<(), RegistrationError> {
        let name = desc.name();
        if self.ops.contains_key(name) {
            return Err(RegistrationError::DuplicateOperator(name.to_string()));
        }
        debug!(operator = name, "registered operator");
        self.ops.insert(name, desc);
        Ok(())
    }

    /// Re-registering a byte-identical kernel descriptor is a no-op; the
    /// same (operator, backend, kernel name) with different metadata is a
    /// conflict. Kernels may be registered before their operator.
    pub fn register_kernel(&mut self, desc: KernelDescriptor) -> Result<(), RegistrationError> {
        let per_backend = self.kernels.entry(desc.op_name()).or_default();
        let entries = per_backend.entry(desc.backend()).or_default();
        if let Some(existing) = entries
            .iter()
            .find(|k| k.kernel_name() == desc.kernel_name())
        {
            if *existing == desc {
                return Ok(());
            }
            return Err(RegistrationError::ConflictingKernel {
                op: desc.op_name().to_string(),
                backend: desc.backend(),
                kernel: desc.kernel_name().to_string(),
            });
        }
        debug!(
            operator = desc.op_name(),
            backend = %desc.backend(),
            kernel = desc.kernel_name(),
            "registered kernel"
        );
        entries.push(desc);
        Ok(())
    }

    pub fn freeze(self) -> Registry {
        debug!(
            operators = self.ops.len(),
            kernel_ops = self.kernels.len(),
            "registry frozen"
        );
        Registry {
            ops: self.ops,
            kernels: self.kernels,
        }
    }
}

pub struct Registry {
    ops: HashMap<&'static str, OperatorDescriptor>,
    kernels: HashMap<&'static str, HashMap<Backend, Vec<KernelDescriptor>>>,
}

impl Registry {
    pub fn operator(&self, name: &str) -> Option<&OperatorDescriptor> {
        self.ops.get(name)
    }

    /// One-shot inference for a graph node: instantiate the named operator
    /// from its attributes, then run shape and dtype inference.
    pub fn infer(
        &self,
        op_name: &str,
        input_shapes: &[Shape],
        input_dtypes: &[DtypeTag],
        attrs: &Attrs,
    ) -> Result<Inference, InferenceError> {
        let desc = self
            .ops
            .get(op_name)
            .ok_or_else(|| InferenceError::UnknownOperator(op_name.to_string()))?;
        let op = desc.instantiate(attrs)?;
        op.infer(input_shapes, input_dtypes)
    }

    /// Select a kernel for the node's full dtype/format signature (inputs
    /// followed by outputs). The first registered kernel listing an exact
    /// matching combination wins.
    pub fn lookup_kernel(
        &self,
        op_name: &str,
        backend: Backend,
        dtypes: &[DtypeTag],
        formats: &[Format],
    ) -> Result<&KernelDescriptor, UnsupportedKernelError> {
        let entries = self
            .kernels
            .get(op_name)
            .and_then(|per_backend| per_backend.get(&backend))
            .filter(|entries| !entries.is_empty())
            .ok_or_else(|| UnsupportedKernelError::NoKernels {
                op: op_name.to_string(),
                backend,
            })?;

        let requested: Vec<(DtypeTag, Format)> = dtypes
            .iter()
            .copied()
            .zip(formats.iter().copied())
            .collect();
        if let Some(kernel) = entries.iter().find(|k| k.supports(&requested)) {
            return Ok(kernel);
        }
        Err(UnsupportedKernelError::NoMatch {
            op: op_name.to_string(),
            backend,
            requested: display_combo(&requested),
            supported: entries
                .iter()
                .flat_map(|k| k.combinations().iter().map(|c| display_combo(c)))
                .collect(),
        })
    }
}

fn register_builtins(builder: &mut RegistryBuilder) -> Result<(), RegistrationError> {
    ops::image::register(builder)?;
    ops::array::register(builder)?;
    ops::quant::register(builder)?;
    ops::matrix::register(builder)?;
    ops::sparse::register(builder)?;
    Ok(())
}

lazy_static! {
    static ref REGISTRY: Registry = {
        let mut builder = RegistryBuilder::new();
        // The builtin catalog is compiled in; failing to register it leaves
        // the compiler unable to do anything useful.
        if let Err(e) = register_builtins(&mut builder) {
            panic!("builtin registration failed: {}", e);
        }
        builder.freeze()
    };
}

/// The process-wide registry holding the builtin operator catalog.
pub fn global() -> &'static Registry {
    &REGISTRY
}
