//! Reference CPU backend.

use crate::backend::Backend;
use crate::error::TensorError;
use crate::operations;
use crate::scalar::Float;
use crate::tensor::Tensor;

/// Naive loop kernels with faer GEMM for matrix products.
///
/// Suitable for small models, tests and debugging.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        Self
    }
}

impl<T: Float> Backend<T> for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn add(&self, a: &Tensor<T>, b: &Tensor<T>) -> Result<Tensor<T>, TensorError> {
        operations::add(a, b)
    }

    fn sub(&self, a: &Tensor<T>, b: &Tensor<T>) -> Result<Tensor<T>, TensorError> {
        operations::sub(a, b)
    }

    fn mul(&self, a: &Tensor<T>, b: &Tensor<T>) -> Result<Tensor<T>, TensorError> {
        operations::mul(a, b)
    }

    fn scale(&self, a: &Tensor<T>, alpha: T) -> Tensor<T> {
        operations::scale(a, alpha)
    }

    fn matmul(
        &self,
        a: &Tensor<T>,
        transpose_a: bool,
        b: &Tensor<T>,
        transpose_b: bool,
    ) -> Result<Tensor<T>, TensorError> {
        operations::matmul(a, transpose_a, b, transpose_b)
    }

    fn sum(&self, a: &Tensor<T>) -> Tensor<T> {
        operations::sum(a)
    }

    fn mean(&self, a: &Tensor<T>) -> Tensor<T> {
        operations::mean(a)
    }

    fn map(&self, a: &Tensor<T>, f: &dyn Fn(T) -> T) -> Tensor<T> {
        operations::apply(a, f)
    }

    fn softmax_rows(&self, a: &Tensor<T>) -> Result<Tensor<T>, TensorError> {
        operations::softmax_rows(a)
    }

    fn log_softmax_rows(&self, a: &Tensor<T>) -> Result<Tensor<T>, TensorError> {
        operations::log_softmax_rows(a)
    }

    fn relu(&self, a: &Tensor<T>) -> Tensor<T> {
        operations::relu(a)
    }

    fn sigmoid(&self, a: &Tensor<T>) -> Tensor<T> {
        operations::sigmoid(a)
    }

    fn tanh(&self, a: &Tensor<T>) -> Tensor<T> {
        operations::tanh(a)
    }
}
