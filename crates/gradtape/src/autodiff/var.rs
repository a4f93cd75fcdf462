//! Tensor handle flowing through a recorded forward pass.

use super::tape::{NodeId, Tape};
use crate::scalar::{Float, Scalar};
use crate::tensor::Tensor;

/// A tensor value plus its position on the tape, if it is tracked.
///
/// Produced by the operations of an execution scope. A `Var` whose node id
/// is `None` is a constant: no gradient flows through it.
#[derive(Debug, Clone)]
pub struct Var<T: Scalar> {
    tensor: Tensor<T>,
    node_id: Option<NodeId>,
}

impl<T: Scalar> Var<T> {
    /// Wrap a tensor that never takes part in differentiation.
    pub fn constant(tensor: Tensor<T>) -> Self {
        Self {
            tensor,
            node_id: None,
        }
    }

    pub(crate) fn tracked(tensor: Tensor<T>, node_id: NodeId) -> Self {
        Self {
            tensor,
            node_id: Some(node_id),
        }
    }

    pub fn tensor(&self) -> &Tensor<T> {
        &self.tensor
    }

    pub fn into_tensor(self) -> Tensor<T> {
        self.tensor
    }

    pub fn node_id(&self) -> Option<NodeId> {
        self.node_id
    }

    /// Whether this value was recorded on a tape.
    pub fn is_tracked(&self) -> bool {
        self.node_id.is_some()
    }

    pub fn shape(&self) -> &[usize] {
        self.tensor.shape()
    }

    pub fn len(&self) -> usize {
        self.tensor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensor.is_empty()
    }

    pub fn data(&self) -> &[T] {
        self.tensor.data()
    }

    /// The single element of a one-element value.
    pub fn item(&self) -> Option<T> {
        self.tensor.item()
    }

    /// Untracked copy of the value.
    pub fn detach(&self) -> Self {
        Self::constant(self.tensor.detach())
    }
}

impl<T: Float> Var<T> {
    /// Register `tensor` as a trainable leaf on `tape`.
    ///
    /// Returns `None` when the tape is not recording.
    pub fn tracked_leaf(tape: &mut Tape<T>, tensor: Tensor<T>) -> Option<Self> {
        let id = tape.leaf(tensor.shape(), true)?;
        Some(Self::tracked(tensor, id))
    }
}

impl<T: Scalar> From<Tensor<T>> for Var<T> {
    fn from(tensor: Tensor<T>) -> Self {
        Self::constant(tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_is_untracked() {
        let v = Var::constant(Tensor::<f64>::scalar(3.0));
        assert!(!v.is_tracked());
        assert_eq!(v.item(), Some(3.0));
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn test_detach_drops_node() {
        let v = Var::tracked(Tensor::<f32>::ones(&[2]), NodeId::new_for_test(0));
        assert!(v.is_tracked());
        let d = v.detach();
        assert!(!d.is_tracked());
        assert_eq!(d.data(), v.data());
    }

    #[test]
    fn test_tracked_leaf_needs_recording() {
        let mut tape: Tape<f64> = Tape::new();
        assert!(Var::tracked_leaf(&mut tape, Tensor::ones(&[2])).is_none());

        tape.set_recording(true);
        let v = Var::tracked_leaf(&mut tape, Tensor::ones(&[2])).unwrap();
        assert!(v.is_tracked());
        assert!(tape.get_node(v.node_id().unwrap()).unwrap().is_trainable_leaf());
    }
}
