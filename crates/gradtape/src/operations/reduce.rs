//! Reductions and row-wise normalizations.

use crate::error::TensorError;
use crate::scalar::{Float, Scalar};
use crate::tensor::Tensor;

/// Sum of all elements as a 0-d tensor.
pub fn sum<ElT: Scalar>(tensor: &Tensor<ElT>) -> Tensor<ElT> {
    let total = tensor
        .data()
        .iter()
        .fold(ElT::zero(), |acc, &x| acc + x);
    Tensor::scalar(total)
}

/// Mean of all elements as a 0-d tensor.
///
/// ```
/// use gradtape::Tensor;
/// use gradtape::operations::mean;
///
/// let a = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
/// assert_eq!(mean(&a).item(), Some(3.5));
/// ```
pub fn mean<ElT: Float>(tensor: &Tensor<ElT>) -> Tensor<ElT> {
    let n = ElT::from_f64(tensor.len() as f64);
    let total = sum(tensor).item().unwrap_or_else(ElT::zero);
    Tensor::scalar(total / n)
}

/// Index of the largest entry in each row of a `[rows, cols]` tensor.
///
/// Ties resolve to the lowest column index.
pub fn argmax_rows<ElT: Scalar>(tensor: &Tensor<ElT>) -> Result<Vec<usize>, TensorError> {
    let (rows, cols) = tensor.matrix_dims()?;
    let data = tensor.data();
    Ok((0..rows)
        .map(|i| {
            let mut best = 0;
            for j in 1..cols {
                if data[i + j * rows] > data[i + best * rows] {
                    best = j;
                }
            }
            best
        })
        .collect())
}

/// Numerically stable softmax over the columns of each row.
pub fn softmax_rows<ElT: Float>(tensor: &Tensor<ElT>) -> Result<Tensor<ElT>, TensorError> {
    let (rows, cols) = tensor.matrix_dims()?;
    let data = tensor.data();
    let mut out = vec![ElT::zero(); data.len()];
    for i in 0..rows {
        let mut max = data[i];
        for j in 1..cols {
            if data[i + j * rows] > max {
                max = data[i + j * rows];
            }
        }
        let mut denom = ElT::zero();
        for j in 0..cols {
            let e = (data[i + j * rows] - max).exp();
            out[i + j * rows] = e;
            denom = denom + e;
        }
        for j in 0..cols {
            out[i + j * rows] = out[i + j * rows] / denom;
        }
    }
    Tensor::from_vec(out, tensor.shape())
}

/// Row-wise `x - logsumexp(x)` over the columns of a rank-2 tensor.
pub fn log_softmax_rows<ElT: Float>(tensor: &Tensor<ElT>) -> Result<Tensor<ElT>, TensorError> {
    let (rows, cols) = tensor.matrix_dims()?;
    let data = tensor.data();
    let mut out = vec![ElT::zero(); data.len()];
    for i in 0..rows {
        let mut max = data[i];
        for j in 1..cols {
            if data[i + j * rows] > max {
                max = data[i + j * rows];
            }
        }
        let mut denom = ElT::zero();
        for j in 0..cols {
            denom = denom + (data[i + j * rows] - max).exp();
        }
        let lse = max + denom.ln();
        for j in 0..cols {
            out[i + j * rows] = data[i + j * rows] - lse;
        }
    }
    Tensor::from_vec(out, tensor.shape())
}
