//! Compute backend abstraction.
//!
//! A backend supplies the primitives the execution context and the gradient
//! rules are written against:
//!
//! - `CpuBackend`: reference kernels, GEMM through faer (always available)
//!
//! The trait is object safe so gradient rules can receive `&dyn Backend<T>`
//! regardless of which concrete backend the context was built with.

mod cpu;
mod faer_interop;

use std::fmt::Debug;

use crate::error::TensorError;
use crate::scalar::Float;
use crate::tensor::Tensor;

pub use cpu::CpuBackend;
pub(crate) use faer_interop::gemm_column_major;

/// Element-wise, matrix, reduction and activation primitives.
pub trait Backend<T: Float>: Debug {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    fn add(&self, a: &Tensor<T>, b: &Tensor<T>) -> Result<Tensor<T>, TensorError>;

    fn sub(&self, a: &Tensor<T>, b: &Tensor<T>) -> Result<Tensor<T>, TensorError>;

    /// Element-wise product.
    fn mul(&self, a: &Tensor<T>, b: &Tensor<T>) -> Result<Tensor<T>, TensorError>;

    fn scale(&self, a: &Tensor<T>, alpha: T) -> Tensor<T>;

    /// `op(a) @ op(b)` for rank-2 tensors.
    fn matmul(
        &self,
        a: &Tensor<T>,
        transpose_a: bool,
        b: &Tensor<T>,
        transpose_b: bool,
    ) -> Result<Tensor<T>, TensorError>;

    /// Sum of all elements as a 0-d tensor.
    fn sum(&self, a: &Tensor<T>) -> Tensor<T>;

    /// Mean of all elements as a 0-d tensor.
    fn mean(&self, a: &Tensor<T>) -> Tensor<T>;

    /// Apply `f` to every element.
    fn map(&self, a: &Tensor<T>, f: &dyn Fn(T) -> T) -> Tensor<T>;

    /// Softmax over the columns of each row of a rank-2 tensor.
    fn softmax_rows(&self, a: &Tensor<T>) -> Result<Tensor<T>, TensorError>;

    /// Log-softmax over the columns of each row of a rank-2 tensor.
    fn log_softmax_rows(&self, a: &Tensor<T>) -> Result<Tensor<T>, TensorError>;

    fn relu(&self, a: &Tensor<T>) -> Tensor<T> {
        self.map(a, &|x| if x > T::zero() { x } else { T::zero() })
    }

    fn sigmoid(&self, a: &Tensor<T>) -> Tensor<T> {
        self.map(a, &|x| T::one() / (T::one() + (-x).exp()))
    }

    fn tanh(&self, a: &Tensor<T>) -> Tensor<T> {
        self.map(a, &|x| x.tanh())
    }

    /// Tensor of `a`'s shape filled with `value`.
    fn full_like(&self, a: &Tensor<T>, value: T) -> Tensor<T> {
        Tensor::full(a.shape(), value)
    }
}
