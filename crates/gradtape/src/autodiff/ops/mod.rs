//! Tracked tensor operations with automatic differentiation.
//!
//! Each operation computes its forward value through a [`Backend`] and, when
//! the tape is recording, appends a gradient rule to it.
//!
//! [`Backend`]: crate::backend::Backend

mod activation;
mod arith;
mod linalg;
mod loss;
mod reduce;

pub use activation::{tracked_relu, tracked_sigmoid, tracked_softmax, tracked_tanh};
pub use arith::{
    tracked_add, tracked_mul, tracked_neg, tracked_scale, tracked_square, tracked_sub,
};
pub use linalg::tracked_matmul;
pub use loss::tracked_cross_entropy;
pub use reduce::{tracked_mean, tracked_sum};

use super::tape::{NodeId, NodeInputs};
use crate::error::TensorError;
use crate::scalar::Float;
use crate::tensor::Tensor;

/// Tracked ids among optional inputs.
fn present(ids: &[Option<NodeId>]) -> NodeInputs {
    ids.iter().flatten().copied().collect()
}

/// The value of a gradient that must hold exactly one element.
fn scalar_grad<T: Float>(grad_output: &Tensor<T>) -> Result<T, TensorError> {
    grad_output.item().ok_or(TensorError::ShapeMismatch {
        expected: 1,
        actual: grad_output.len(),
    })
}
