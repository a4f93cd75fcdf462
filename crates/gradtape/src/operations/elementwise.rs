//! Element-wise tensor operations.

use crate::error::TensorError;
use crate::scalar::{Float, Scalar};
use crate::tensor::Tensor;

/// Apply a function to each element, returning a new tensor.
///
/// # Example
///
/// ```
/// use gradtape::Tensor;
/// use gradtape::operations::apply;
///
/// let t = Tensor::from_vec(vec![1.0, 4.0, 9.0], &[3]).unwrap();
/// let ts = apply(&t, |x: f64| x.sqrt());
/// assert_eq!(ts.data(), &[1.0, 2.0, 3.0]);
/// ```
pub fn apply<ElT: Scalar, F>(tensor: &Tensor<ElT>, f: F) -> Tensor<ElT>
where
    F: Fn(ElT) -> ElT,
{
    let mut out = tensor.detach();
    for x in out.data_mut() {
        *x = f(*x);
    }
    out
}

/// Combine two same-shaped tensors element-wise.
///
/// # Example
///
/// ```
/// use gradtape::Tensor;
/// use gradtape::operations::apply_binary;
///
/// let a = Tensor::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
/// let b = Tensor::from_vec(vec![4.0, 5.0, 6.0], &[3]).unwrap();
/// let c = apply_binary("add", &a, &b, |x, y| x + y).unwrap();
/// assert_eq!(c.data(), &[5.0, 7.0, 9.0]);
/// ```
pub fn apply_binary<ElT: Scalar, F>(
    op: &'static str,
    a: &Tensor<ElT>,
    b: &Tensor<ElT>,
    f: F,
) -> Result<Tensor<ElT>, TensorError>
where
    F: Fn(ElT, ElT) -> ElT,
{
    if a.shape() != b.shape() {
        return Err(TensorError::IncompatibleShapes {
            op,
            lhs: a.shape().to_vec(),
            rhs: b.shape().to_vec(),
        });
    }
    let data: Vec<ElT> = a
        .data()
        .iter()
        .zip(b.data().iter())
        .map(|(&x, &y)| f(x, y))
        .collect();
    Tensor::from_vec(data, a.shape())
}

pub fn add<ElT: Scalar>(a: &Tensor<ElT>, b: &Tensor<ElT>) -> Result<Tensor<ElT>, TensorError> {
    apply_binary("add", a, b, |x, y| x + y)
}

pub fn sub<ElT: Scalar>(a: &Tensor<ElT>, b: &Tensor<ElT>) -> Result<Tensor<ElT>, TensorError> {
    apply_binary("sub", a, b, |x, y| x - y)
}

/// Hadamard product.
pub fn mul<ElT: Scalar>(a: &Tensor<ElT>, b: &Tensor<ElT>) -> Result<Tensor<ElT>, TensorError> {
    apply_binary("mul", a, b, |x, y| x * y)
}

/// Multiply all elements by a scalar.
pub fn scale<ElT: Scalar>(tensor: &Tensor<ElT>, alpha: ElT) -> Tensor<ElT> {
    apply(tensor, |x| x * alpha)
}

/// Rectified linear unit: `max(0, x)`.
pub fn relu<ElT: Float>(tensor: &Tensor<ElT>) -> Tensor<ElT> {
    apply(tensor, |x| if x > ElT::zero() { x } else { ElT::zero() })
}

/// Logistic sigmoid: `1 / (1 + exp(-x))`.
pub fn sigmoid<ElT: Float>(tensor: &Tensor<ElT>) -> Tensor<ElT> {
    apply(tensor, |x| ElT::one() / (ElT::one() + (-x).exp()))
}

pub fn tanh<ElT: Float>(tensor: &Tensor<ElT>) -> Tensor<ElT> {
    apply(tensor, |x| x.tanh())
}
