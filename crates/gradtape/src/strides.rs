//! Shape and stride utilities.
//!
//! Tensors are stored column-major, matching faer.

use crate::error::TensorError;

/// Number of elements for a shape. The empty shape is a scalar with one element.
#[inline]
pub fn num_elements(shape: &[usize]) -> usize {
    shape.iter().product::<usize>().max(1)
}

/// Reject shapes with zero-sized dimensions.
pub fn validate_shape(shape: &[usize]) -> Result<(), TensorError> {
    if shape.contains(&0) {
        return Err(TensorError::InvalidShape {
            shape: shape.to_vec(),
        });
    }
    Ok(())
}

/// Compute column-major strides from shape.
///
/// For shape [d0, d1, d2, ...], returns strides [1, d0, d0*d1, ...].
///
/// # Examples
///
/// ```
/// use gradtape::strides::compute_strides;
///
/// assert_eq!(compute_strides(&[3, 4, 5]), vec![1, 3, 12]);
/// assert_eq!(compute_strides(&[]), Vec::<usize>::new());
/// ```
pub fn compute_strides(shape: &[usize]) -> Vec<usize> {
    let mut stride = 1;
    shape
        .iter()
        .map(|&dim| {
            let current = stride;
            stride *= dim;
            current
        })
        .collect()
}

/// Convert cartesian indices to a linear column-major offset.
#[inline]
pub fn cartesian_to_linear(indices: &[usize], strides: &[usize]) -> usize {
    indices
        .iter()
        .zip(strides.iter())
        .map(|(&idx, &stride)| idx * stride)
        .sum()
}

/// Reorder row-major data (last index fastest) into column-major storage.
pub fn row_major_to_column_major<T: Copy>(data: &[T], shape: &[usize]) -> Vec<T> {
    if shape.len() < 2 {
        return data.to_vec();
    }
    let strides = compute_strides(shape);
    let mut out = data.to_vec();
    let mut indices = vec![0usize; shape.len()];
    for &value in data {
        out[cartesian_to_linear(&indices, &strides)] = value;
        // Advance row-major odometer.
        for axis in (0..shape.len()).rev() {
            indices[axis] += 1;
            if indices[axis] < shape[axis] {
                break;
            }
            indices[axis] = 0;
        }
    }
    out
}
