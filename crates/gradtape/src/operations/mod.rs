//! Reference tensor kernels.
//!
//! These are the primitives behind [`CpuBackend`](crate::backend::CpuBackend).
//! They allocate their output and never mutate inputs.

mod elementwise;
mod matmul;
mod reduce;

pub use elementwise::{add, apply, apply_binary, mul, relu, scale, sigmoid, sub, tanh};
pub use matmul::matmul;
pub use reduce::{argmax_rows, log_softmax_rows, mean, softmax_rows, sum};
