//! Adam optimizer.

use std::collections::HashMap;

use super::Optimizer;
use crate::error::Result;
use crate::parameter::ParamId;
use crate::scalar::Float;
use crate::tensor::Tensor;

/// Moment buffers for a single parameter plus its own step counter.
#[derive(Debug, Clone)]
struct MomentBuf<T> {
    m: Vec<T>,
    v: Vec<T>,
    step: i32,
}

impl<T: Float> MomentBuf<T> {
    fn zeros(n: usize) -> Self {
        Self {
            m: vec![T::zero(); n],
            v: vec![T::zero(); n],
            step: 0,
        }
    }
}

/// Adam with bias-corrected first and second moments.
///
/// Bias correction uses each parameter's own step count, so a parameter
/// added mid-training starts its correction from one.
#[derive(Debug, Clone)]
pub struct Adam<T: Float> {
    learning_rate: T,
    beta1: T,
    beta2: T,
    eps: T,
    state: HashMap<ParamId, MomentBuf<T>>,
    staged: HashMap<ParamId, MomentBuf<T>>,
}

impl<T: Float> Adam<T> {
    /// Adam with `beta1 = 0.9`, `beta2 = 0.999`, `eps = 1e-8`.
    pub fn new(learning_rate: T) -> Self {
        Self::with_betas(
            learning_rate,
            T::from_f64(0.9),
            T::from_f64(0.999),
            T::from_f64(1e-8),
        )
    }

    pub fn with_betas(learning_rate: T, beta1: T, beta2: T, eps: T) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            eps,
            state: HashMap::new(),
            staged: HashMap::new(),
        }
    }

    pub fn betas(&self) -> (T, T) {
        (self.beta1, self.beta2)
    }

    pub fn eps(&self) -> T {
        self.eps
    }

    /// Number of updates applied to a parameter so far.
    pub fn step_count(&self, id: ParamId) -> usize {
        self.state.get(&id).map_or(0, |s| s.step as usize)
    }
}

/// Adam with the given learning rate and default betas.
pub fn adam<T: Float>(learning_rate: T) -> Adam<T> {
    Adam::new(learning_rate)
}

impl<T: Float> Optimizer<T> for Adam<T> {
    fn name(&self) -> &'static str {
        "adam"
    }

    fn learning_rate(&self) -> T {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: T) {
        self.learning_rate = learning_rate;
    }

    fn update(&mut self, id: ParamId, value: &mut Tensor<T>, grad: &Tensor<T>) -> Result<()> {
        let (lr, b1, b2, eps) = (self.learning_rate, self.beta1, self.beta2, self.eps);
        let committed = self.state.get(&id);
        let buf = self.staged.entry(id).or_insert_with(|| {
            committed
                .cloned()
                .unwrap_or_else(|| MomentBuf::zeros(grad.len()))
        });
        buf.step += 1;

        let one = T::one();
        let bc1_inv = one / (one - b1.powi(buf.step));
        let bc2_inv = one / (one - b2.powi(buf.step));

        for (((x, &g), m), v) in value
            .data_mut()
            .iter_mut()
            .zip(grad.data())
            .zip(buf.m.iter_mut())
            .zip(buf.v.iter_mut())
        {
            *m = b1 * *m + (one - b1) * g;
            *v = b2 * *v + (one - b2) * g * g;
            let m_hat = *m * bc1_inv;
            let v_hat = *v * bc2_inv;
            *x = *x - lr * m_hat / (v_hat.sqrt() + eps);
        }
        Ok(())
    }

    fn commit_state(&mut self) {
        self.state.extend(self.staged.drain());
    }

    fn discard_state(&mut self) {
        self.staged.clear();
    }
}
