//! Matrix multiplication for rank-2 tensors.

use crate::error::TensorError;
use crate::scalar::Float;
use crate::tensor::Tensor;

/// `op(a) @ op(b)` where `op` optionally transposes its operand.
///
/// # Example
///
/// ```
/// use gradtape::Tensor;
/// use gradtape::operations::matmul;
///
/// let x = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[4, 1]).unwrap();
/// let w = Tensor::from_vec(vec![0.5], &[1, 1]).unwrap();
/// let y = matmul(&x, false, &w, false).unwrap();
/// assert_eq!(y.data(), &[0.5, 1.0, 1.5, 2.0]);
/// ```
pub fn matmul<T: Float>(
    a: &Tensor<T>,
    transpose_a: bool,
    b: &Tensor<T>,
    transpose_b: bool,
) -> Result<Tensor<T>, TensorError> {
    let (a_rows, a_cols) = a.matrix_dims()?;
    let (b_rows, b_cols) = b.matrix_dims()?;

    let (m, k_a) = if transpose_a { (a_cols, a_rows) } else { (a_rows, a_cols) };
    let (k_b, n) = if transpose_b { (b_cols, b_rows) } else { (b_rows, b_cols) };
    if k_a != k_b {
        return Err(TensorError::IncompatibleShapes {
            op: "matmul",
            lhs: a.shape().to_vec(),
            rhs: b.shape().to_vec(),
        });
    }

    let data = T::gemm(
        a.data(),
        a_rows,
        a_cols,
        transpose_a,
        b.data(),
        b_rows,
        b_cols,
        transpose_b,
    );
    Tensor::from_vec(data, &[m, n])
}
