//! Operator contracts for a tensor graph compiler: attribute validation,
//! shape and dtype inference, and a registry mapping operators to the
//! backend kernels that can execute them.

pub mod attrs;
pub mod check;
pub mod dtype;
pub mod error;
pub mod kernel;
pub mod ops;
pub mod registry;
pub mod shape;
