//! Optimizers: consume gradients, update parameter values.
//!
//! - [`Sgd`]: plain, momentum and weight-decayed gradient descent
//! - [`Adam`]: bias-corrected adaptive moments
//!
//! All per-parameter state is keyed by [`ParamId`] and persists across
//! steps for as long as the optimizer lives.

mod adam;
mod sgd;

pub use adam::{Adam, adam};
pub use sgd::{Sgd, sgd};

use crate::error::{Error, Result, TensorError};
use crate::parameter::{ModuleParameter, ParamId};
use crate::scalar::Float;
use crate::tensor::Tensor;

/// Parameter update rule.
///
/// Implementors supply [`Optimizer::update`]; [`Optimizer::apply`] drives it
/// over a set of parameters.
///
/// `update` writes into a staged copy of the value. Per-parameter state it
/// advances must stay staged as well until [`Optimizer::commit_state`];
/// [`Optimizer::discard_state`] drops it when any update in the same call
/// fails.
pub trait Optimizer<T: Float> {
    fn name(&self) -> &'static str;

    fn learning_rate(&self) -> T;

    fn set_learning_rate(&mut self, learning_rate: T);

    /// Update one staged parameter value in place from its gradient.
    ///
    /// `value` and `grad` have the same shape.
    fn update(&mut self, id: ParamId, value: &mut Tensor<T>, grad: &Tensor<T>) -> Result<()>;

    /// Keep the state staged by `update` calls since the last commit.
    fn commit_state(&mut self) {}

    /// Drop the state staged by `update` calls since the last commit.
    fn discard_state(&mut self) {}

    /// Update every parameter from its bound gradient, then clear the
    /// gradients.
    ///
    /// All gradients are checked before any value is touched: a parameter
    /// without a gradient fails the whole call with
    /// [`Error::UnboundGradient`] and leaves every parameter unchanged.
    /// New values are computed on copies and written back only once every
    /// update has succeeded, so a failing `update` also leaves values,
    /// gradients and optimizer state untouched.
    fn apply(&mut self, params: &mut [&mut ModuleParameter<T>]) -> Result<()> {
        let mut grads = Vec::with_capacity(params.len());
        for param in params.iter() {
            let Some(grad) = param.gradient() else {
                tracing::warn!(optimizer = self.name(), param = param.name(), "unbound gradient");
                return Err(Error::UnboundGradient {
                    name: param.name().to_string(),
                });
            };
            if grad.shape() != param.shape() {
                tracing::warn!(
                    optimizer = self.name(),
                    param = param.name(),
                    "gradient shape mismatch"
                );
                return Err(TensorError::IncompatibleShapes {
                    op: "optimizer_apply",
                    lhs: param.shape().to_vec(),
                    rhs: grad.shape().to_vec(),
                }
                .into());
            }
            grads.push(grad.clone());
        }

        let mut staged = Vec::with_capacity(params.len());
        for (param, grad) in params.iter().zip(grads.iter()) {
            let mut value = param.value().clone();
            if let Err(err) = self.update(param.id(), &mut value, grad) {
                tracing::warn!(optimizer = self.name(), param = param.name(), "update failed");
                self.discard_state();
                return Err(err);
            }
            staged.push(value);
        }

        for (param, value) in params.iter_mut().zip(staged) {
            *param.value_mut() = value;
            param.zero_grad();
        }
        self.commit_state();
        tracing::trace!(optimizer = self.name(), params = params.len(), "applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn param(name: &str, value: f64) -> ModuleParameter<f64> {
        ModuleParameter::weight(name, Tensor::scalar(value).with_requires_grad()).unwrap()
    }

    #[test]
    fn test_apply_updates_and_clears() {
        let mut p = param("w", 1.0);
        p.set_gradient(Tensor::scalar(0.5));

        let mut opt = sgd(0.1);
        opt.apply(&mut [&mut p]).unwrap();

        assert_relative_eq!(p.value().item().unwrap(), 0.95);
        assert!(p.gradient().is_none());
    }

    #[test]
    fn test_apply_unbound_gradient_touches_nothing() {
        let mut a = param("a", 1.0);
        let mut b = param("b", 2.0);
        a.set_gradient(Tensor::scalar(1.0));

        let mut opt = sgd(0.1);
        let err = opt.apply(&mut [&mut a, &mut b]).unwrap_err();

        assert!(matches!(err, Error::UnboundGradient { ref name } if name == "b"));
        assert_eq!(a.value().item(), Some(1.0));
        assert_eq!(b.value().item(), Some(2.0));
        assert!(a.gradient().is_some());
    }

    #[test]
    fn test_apply_rejects_mismatched_gradient() {
        let mut p = param("w", 1.0);
        p.set_gradient(Tensor::ones(&[3]));
        let mut opt = adam(0.1);
        assert!(matches!(
            opt.apply(&mut [&mut p]),
            Err(Error::Backend(TensorError::IncompatibleShapes { .. }))
        ));
        assert_eq!(p.value().item(), Some(1.0));
    }

    /// Momentum SGD that refuses to update one parameter.
    #[derive(Debug)]
    struct FailOn {
        inner: Sgd<f64>,
        refuse: ParamId,
    }

    impl Optimizer<f64> for FailOn {
        fn name(&self) -> &'static str {
            "fail_on"
        }

        fn learning_rate(&self) -> f64 {
            self.inner.learning_rate()
        }

        fn set_learning_rate(&mut self, learning_rate: f64) {
            self.inner.set_learning_rate(learning_rate);
        }

        fn update(
            &mut self,
            id: ParamId,
            value: &mut Tensor<f64>,
            grad: &Tensor<f64>,
        ) -> Result<()> {
            if id == self.refuse {
                return Err(TensorError::InvalidShape { shape: vec![0] }.into());
            }
            self.inner.update(id, value, grad)
        }

        fn commit_state(&mut self) {
            self.inner.commit_state();
        }

        fn discard_state(&mut self) {
            self.inner.discard_state();
        }
    }

    #[test]
    fn test_failing_update_leaves_everything_untouched() {
        let mut a = param("a", 1.0);
        let mut b = param("b", 1.0);
        a.set_gradient(Tensor::scalar(4.0));
        b.set_gradient(Tensor::scalar(4.0));

        let mut opt = FailOn {
            inner: sgd(0.1).with_momentum(0.9),
            refuse: b.id(),
        };
        assert!(opt.apply(&mut [&mut a, &mut b]).is_err());

        assert_eq!(a.value().item(), Some(1.0));
        assert_eq!(b.value().item(), Some(1.0));
        assert!(a.gradient().is_some() && b.gradient().is_some());
        assert!(opt.inner.velocity(a.id()).is_none());
    }

    #[test]
    fn test_discarded_adam_update_does_not_advance_moments() {
        let mut a = param("a", 1.0);
        let mut opt = adam(0.1);
        a.set_gradient(Tensor::scalar(3.0));
        opt.apply(&mut [&mut a]).unwrap();

        let mut staged = a.value().clone();
        opt.update(a.id(), &mut staged, &Tensor::scalar(3.0)).unwrap();
        opt.discard_state();
        assert_eq!(opt.step_count(a.id()), 1);

        a.set_gradient(Tensor::scalar(3.0));
        opt.apply(&mut [&mut a]).unwrap();
        assert_eq!(opt.step_count(a.id()), 2);
    }

    #[test]
    fn test_apply_through_trait_object() {
        let mut p = param("w", 0.0);
        p.set_gradient(Tensor::scalar(-1.0));
        let mut opt: Box<dyn Optimizer<f64>> = Box::new(sgd(0.5));
        opt.apply(&mut [&mut p]).unwrap();
        assert_relative_eq!(p.value().item().unwrap(), 0.5);
    }
}
