//! Stochastic gradient descent.

use std::collections::HashMap;

use super::Optimizer;
use crate::error::Result;
use crate::parameter::ParamId;
use crate::scalar::Float;
use crate::tensor::Tensor;

/// Gradient descent with optional momentum and L2 weight decay.
///
/// Without momentum: `value -= lr * (grad + weight_decay * value)`.
/// With momentum `mu`: `v = mu * v + g; value -= lr * v`, one velocity
/// buffer per parameter.
#[derive(Debug, Clone)]
pub struct Sgd<T: Float> {
    learning_rate: T,
    momentum: T,
    weight_decay: T,
    velocity: HashMap<ParamId, Vec<T>>,
    staged: HashMap<ParamId, Vec<T>>,
}

impl<T: Float> Sgd<T> {
    pub fn new(learning_rate: T) -> Self {
        Self {
            learning_rate,
            momentum: T::zero(),
            weight_decay: T::zero(),
            velocity: HashMap::new(),
            staged: HashMap::new(),
        }
    }

    pub fn with_momentum(mut self, momentum: T) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: T) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    pub fn momentum(&self) -> T {
        self.momentum
    }

    pub fn weight_decay(&self) -> T {
        self.weight_decay
    }

    /// Velocity buffer of a parameter, present once it has been updated
    /// with momentum enabled.
    pub fn velocity(&self, id: ParamId) -> Option<&[T]> {
        self.velocity.get(&id).map(Vec::as_slice)
    }
}

/// SGD with the given learning rate and no momentum.
pub fn sgd<T: Float>(learning_rate: T) -> Sgd<T> {
    Sgd::new(learning_rate)
}

impl<T: Float> Optimizer<T> for Sgd<T> {
    fn name(&self) -> &'static str {
        "sgd"
    }

    fn learning_rate(&self) -> T {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: T) {
        self.learning_rate = learning_rate;
    }

    fn update(&mut self, id: ParamId, value: &mut Tensor<T>, grad: &Tensor<T>) -> Result<()> {
        let (lr, mu, wd) = (self.learning_rate, self.momentum, self.weight_decay);
        let use_momentum = mu != T::zero();
        let velocity = if use_momentum {
            let committed = self.velocity.get(&id);
            Some(self.staged.entry(id).or_insert_with(|| {
                committed.cloned().unwrap_or_else(|| vec![T::zero(); grad.len()])
            }))
        } else {
            None
        };

        match velocity {
            Some(v) => {
                let pairs = value.data_mut().iter_mut().zip(grad.data());
                for ((x, &g), vi) in pairs.zip(v.iter_mut()) {
                    let g = g + wd * *x;
                    *vi = mu * *vi + g;
                    *x = *x - lr * *vi;
                }
            }
            None => {
                for (x, &g) in value.data_mut().iter_mut().zip(grad.data()) {
                    let g = g + wd * *x;
                    *x = *x - lr * g;
                }
            }
        }
        Ok(())
    }

    fn commit_state(&mut self) {
        self.velocity.extend(self.staged.drain());
    }

    fn discard_state(&mut self) {
        self.staged.clear();
    }
}
