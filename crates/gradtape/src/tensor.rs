//! Dense n-dimensional tensor.
//!
//! A tensor owns a column-major [`Dense`] buffer, its shape and strides, and a
//! gradient-tracking flag. Operations never mutate their inputs; they produce
//! new tensors.

use crate::error::TensorError;
use crate::scalar::{DType, Scalar};
use crate::storage::Dense;
use crate::strides::{
    cartesian_to_linear, compute_strides, num_elements, row_major_to_column_major,
    validate_shape,
};

/// A dense n-dimensional tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<ElT: Scalar> {
    storage: Dense<ElT>,
    shape: Vec<usize>,
    strides: Vec<usize>,
    requires_grad: bool,
}

impl<ElT: Scalar> Tensor<ElT> {
    fn from_storage(storage: Dense<ElT>, shape: &[usize]) -> Self {
        Self {
            storage,
            shape: shape.to_vec(),
            strides: compute_strides(shape),
            requires_grad: false,
        }
    }

    /// Create a tensor filled with `value`.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::InvalidShape` if `shape` has a zero-sized dimension.
    pub fn try_full(shape: &[usize], value: ElT) -> Result<Self, TensorError> {
        validate_shape(shape)?;
        Ok(Self::from_storage(
            Dense::filled(num_elements(shape), value),
            shape,
        ))
    }

    /// Fallible [`Tensor::zeros`].
    pub fn try_zeros(shape: &[usize]) -> Result<Self, TensorError> {
        Self::try_full(shape, ElT::zero())
    }

    /// Create a tensor filled with `value`.
    ///
    /// # Panics
    ///
    /// Panics if `shape` contains a zero-sized dimension; use
    /// [`Tensor::try_full`] for fallible construction.
    pub fn full(shape: &[usize], value: ElT) -> Self {
        match Self::try_full(shape, value) {
            Ok(t) => t,
            Err(_) => panic!("tensor dimensions must be positive, got {shape:?}"),
        }
    }

    /// Create a zero-initialized tensor.
    ///
    /// # Examples
    ///
    /// ```
    /// use gradtape::Tensor;
    ///
    /// let t: Tensor<f64> = Tensor::zeros(&[2, 3, 4]);
    /// assert_eq!(t.shape(), &[2, 3, 4]);
    /// assert_eq!(t.len(), 24);
    /// ```
    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, ElT::zero())
    }

    /// Create a tensor filled with ones.
    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, ElT::one())
    }

    /// Create a 0-dimensional tensor holding one value.
    pub fn scalar(value: ElT) -> Self {
        Self::from_storage(Dense::from_vec(vec![value]), &[])
    }

    /// Create tensor from column-major data and shape.
    ///
    /// # Errors
    ///
    /// Returns `TensorError::InvalidShape` for zero-sized dimensions and
    /// `TensorError::ShapeMismatch` if data length doesn't match shape.
    ///
    /// # Examples
    ///
    /// ```
    /// use gradtape::Tensor;
    ///
    /// let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], &[2, 3]).unwrap();
    /// assert_eq!(t.get(&[1, 0]), Some(&2.0));
    /// assert_eq!(t.get(&[0, 1]), Some(&3.0));
    /// ```
    pub fn from_vec(data: Vec<ElT>, shape: &[usize]) -> Result<Self, TensorError> {
        validate_shape(shape)?;
        let expected = num_elements(shape);
        if data.len() != expected {
            return Err(TensorError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self::from_storage(Dense::from_vec(data), shape))
    }

    /// Create tensor from row-major data (the order values are usually written in).
    ///
    /// ```
    /// use gradtape::Tensor;
    ///
    /// let t = Tensor::from_row_major(vec![1, 2, 3, 4, 5, 6], &[2, 3]).unwrap();
    /// assert_eq!(t.get(&[0, 1]), Some(&2));
    /// assert_eq!(t.get(&[1, 0]), Some(&4));
    /// ```
    pub fn from_row_major(data: Vec<ElT>, shape: &[usize]) -> Result<Self, TensorError> {
        validate_shape(shape)?;
        let expected = num_elements(shape);
        if data.len() != expected {
            return Err(TensorError::ShapeMismatch {
                expected,
                actual: data.len(),
            });
        }
        let data = row_major_to_column_major(&data, shape);
        Ok(Self::from_storage(Dense::from_vec(data), shape))
    }

    /// Create a tensor with the same shape as `self` from column-major data.
    pub fn with_data(&self, data: Vec<ElT>) -> Result<Self, TensorError> {
        Self::from_vec(data, &self.shape)
    }

    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    #[inline]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Element type tag.
    #[inline]
    pub fn dtype(&self) -> DType {
        self.storage.dtype()
    }

    /// Get underlying column-major data.
    #[inline]
    pub fn data(&self) -> &[ElT] {
        self.storage.as_slice()
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [ElT] {
        self.storage.as_mut_slice()
    }

    /// Consume the tensor and return its column-major data.
    pub fn into_vec(self) -> Vec<ElT> {
        self.storage.into_vec()
    }

    #[inline]
    pub fn get_linear(&self, i: usize) -> Option<&ElT> {
        self.storage.as_slice().get(i)
    }

    /// Get element by cartesian indices.
    ///
    /// Returns `None` if indices are out of bounds or wrong number of indices.
    pub fn get(&self, indices: &[usize]) -> Option<&ElT> {
        if indices.len() != self.ndim() {
            return None;
        }
        if indices.iter().zip(self.shape.iter()).any(|(&i, &d)| i >= d) {
            return None;
        }
        self.get_linear(cartesian_to_linear(indices, &self.strides))
    }

    /// Set element by cartesian indices.
    pub fn set(&mut self, indices: &[usize], value: ElT) -> Result<(), TensorError> {
        if indices.len() != self.ndim() {
            return Err(TensorError::WrongNumberOfIndices {
                expected: self.ndim(),
                actual: indices.len(),
            });
        }
        for (&index, &dim_size) in indices.iter().zip(self.shape.iter()) {
            if index >= dim_size {
                return Err(TensorError::IndexOutOfBounds { index, dim_size });
            }
        }
        let linear = cartesian_to_linear(indices, &self.strides);
        self.storage[linear] = value;
        Ok(())
    }

    pub fn fill(&mut self, value: ElT) {
        self.storage.as_mut_slice().fill(value);
    }

    /// The single value of a one-element tensor.
    pub fn item(&self) -> Option<ElT> {
        match self.data() {
            [value] => Some(*value),
            _ => None,
        }
    }

    /// Whether this tensor is marked for gradient tracking.
    #[inline]
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }

    /// Mark the tensor as trainable.
    pub fn with_requires_grad(mut self) -> Self {
        self.requires_grad = true;
        self
    }

    pub fn set_requires_grad(&mut self, requires_grad: bool) {
        self.requires_grad = requires_grad;
    }

    /// Copy without the gradient-tracking flag.
    pub fn detach(&self) -> Self {
        Self {
            requires_grad: false,
            ..self.clone()
        }
    }

    /// Reshape into a new tensor with the same elements.
    pub fn reshape(&self, new_shape: &[usize]) -> Result<Self, TensorError> {
        validate_shape(new_shape)?;
        let new_len = num_elements(new_shape);
        if new_len != self.len() {
            return Err(TensorError::ShapeMismatch {
                expected: self.len(),
                actual: new_len,
            });
        }
        let mut out = Self::from_storage(self.storage.clone(), new_shape);
        out.requires_grad = self.requires_grad;
        Ok(out)
    }

    /// Rows and columns of a rank-2 tensor.
    pub fn matrix_dims(&self) -> Result<(usize, usize), TensorError> {
        match self.shape.as_slice() {
            &[rows, cols] => Ok((rows, cols)),
            other => Err(TensorError::RankMismatch {
                expected: 2,
                actual: other.len(),
            }),
        }
    }

    /// Copy out the data in row-major order.
    pub fn to_row_major(&self) -> Vec<ElT> {
        if self.ndim() < 2 {
            return self.data().to_vec();
        }
        let mut out = Vec::with_capacity(self.len());
        let mut indices = vec![0usize; self.ndim()];
        for _ in 0..self.len() {
            out.push(self.data()[cartesian_to_linear(&indices, &self.strides)]);
            for axis in (0..self.ndim()).rev() {
                indices[axis] += 1;
                if indices[axis] < self.shape[axis] {
                    break;
                }
                indices[axis] = 0;
            }
        }
        out
    }
}
