//! Gradient storage container.

use std::collections::HashMap;

use super::tape::NodeId;
use super::var::Var;
use crate::error::GradientError;
use crate::operations::add;
use crate::scalar::Float;
use crate::tensor::Tensor;

/// Container for accumulated gradients.
///
/// Stores gradients keyed by NodeId. A node reached along several paths
/// receives the sum of all contributions.
#[derive(Debug, Clone)]
pub struct Gradients<T: Float> {
    grads: HashMap<NodeId, Tensor<T>>,
}

impl<T: Float> Gradients<T> {
    /// Create empty gradient container.
    pub fn new() -> Self {
        Self {
            grads: HashMap::new(),
        }
    }

    /// Accumulate gradient for a node, adding to any existing contribution.
    pub fn accumulate(&mut self, id: NodeId, grad: Tensor<T>) -> Result<(), GradientError> {
        match self.grads.get_mut(&id) {
            Some(existing) => match add(existing, &grad) {
                Ok(summed) => *existing = summed,
                Err(_) => {
                    return Err(GradientError::AccumulationMismatch {
                        node: id.index(),
                        existing: existing.shape().to_vec(),
                        incoming: grad.shape().to_vec(),
                    });
                }
            },
            None => {
                self.grads.insert(id, grad);
            }
        }
        Ok(())
    }

    /// Get gradient for a node.
    pub fn get(&self, id: NodeId) -> Option<&Tensor<T>> {
        self.grads.get(&id)
    }

    /// Gradient with respect to a tracked variable.
    pub fn wrt(&self, var: &Var<T>) -> Option<&Tensor<T>> {
        var.node_id().and_then(|id| self.get(id))
    }

    /// Remove and return gradient (for passing to backward functions).
    pub fn remove(&mut self, id: NodeId) -> Option<Tensor<T>> {
        self.grads.remove(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.grads.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.grads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grads.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Tensor<T>)> {
        self.grads.iter()
    }
}

impl<T: Float> Default for Gradients<T> {
    fn default() -> Self {
        Self::new()
    }
}
