use thiserror::Error;

use crate::check::ConfigurationError;
use crate::dtype::DtypeError;
use crate::kernel::UnsupportedKernelError;
use crate::registry::RegistrationError;
use crate::shape::ShapeError;

/// Everything that can fail while inferring one graph node.
#[derive(Debug, Error, PartialEq)]
pub enum InferenceError {
    #[error("unknown operator {0}")]
    UnknownOperator(String),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Dtype(#[from] DtypeError),
}

/// Top-level error for embedders that funnel every failure into one type.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    UnsupportedKernel(#[from] UnsupportedKernelError),
}

impl From<ConfigurationError> for Error {
    fn from(e: ConfigurationError) -> Error {
        Error::Inference(e.into())
    }
}

impl From<ShapeError> for Error {
    fn from(e: ShapeError) -> Error {
        Error::Inference(e.into())
    }
}

impl From<DtypeError> for Error {
    fn from(e: DtypeError) -> Error {
        Error::Inference(e.into())
    }
}
