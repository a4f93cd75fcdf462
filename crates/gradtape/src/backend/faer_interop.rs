//! Column-major GEMM through faer.
//!
//! Tensors and faer share column-major storage, so slices are viewed as
//! `MatRef` without copying; transposes are free views.

use faer::linalg::matmul::matmul;
use faer::{Accum, MatMut, MatRef, Par};
use faer_traits::ComplexField;

/// `alpha * op(a) @ op(b)` for column-major slices, returned column-major.
///
/// Callers are responsible for checking that inner dimensions agree.
pub(crate) fn gemm_column_major<E: ComplexField + Copy + Default>(
    a: &[E],
    (a_rows, a_cols): (usize, usize),
    transpose_a: bool,
    b: &[E],
    (b_rows, b_cols): (usize, usize),
    transpose_b: bool,
    alpha: E,
) -> Vec<E> {
    let a_mat = MatRef::from_column_major_slice(a, a_rows, a_cols);
    let b_mat = MatRef::from_column_major_slice(b, b_rows, b_cols);
    let lhs = if transpose_a { a_mat.transpose() } else { a_mat };
    let rhs = if transpose_b { b_mat.transpose() } else { b_mat };

    let m = lhs.nrows();
    let n = rhs.ncols();
    let mut out = vec![E::default(); m * n];
    let dst = MatMut::from_column_major_slice_mut(&mut out, m, n);

    matmul(dst, Accum::Replace, lhs, rhs, alpha, Par::Seq);
    out
}
