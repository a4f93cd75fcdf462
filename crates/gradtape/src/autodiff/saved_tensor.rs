//! Saved tensor for backward pass.

use std::rc::Rc;

use crate::scalar::Scalar;
use crate::tensor::Tensor;

/// Forward value kept alive for a gradient rule.
///
/// Uses `Rc` for cheap sharing: the tape is owned by a single execution
/// context and never crosses threads.
#[derive(Debug)]
pub struct SavedTensor<T: Scalar> {
    data: Rc<Tensor<T>>,
}

impl<T: Scalar> SavedTensor<T> {
    /// Save a detached copy of `tensor`.
    pub fn new(tensor: &Tensor<T>) -> Self {
        Self {
            data: Rc::new(tensor.detach()),
        }
    }

    pub fn get(&self) -> &Tensor<T> {
        &self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }
}

impl<T: Scalar> Clone for SavedTensor<T> {
    fn clone(&self) -> Self {
        Self {
            data: Rc::clone(&self.data),
        }
    }
}
