//! Training step orchestration.
//!
//! A step moves through `Idle -> Recording -> Backward -> Applied -> Idle`.
//! Parameter values change only after the forward and backward passes both
//! succeed; any earlier failure resets the tape, returns to `Idle` and
//! leaves every parameter untouched.

use crate::autodiff::{Var, backward};
use crate::backend::Backend;
use crate::context::{GraphExecutionContext, Phase, Scope};
use crate::error::{Error, GradientError, Result};
use crate::optim::Optimizer;
use crate::parameter::ModuleParameter;
use crate::scalar::{Float, Scalar};
use crate::tensor::Tensor;

/// Position of a context in the training-step state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepState {
    Idle,
    /// Forward pass running with the tape recording.
    Recording,
    /// Gradients being computed from the loss.
    Backward,
    /// Optimizer update done, tape about to be reset.
    Applied,
}

/// Outcome of a successful training step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport<T> {
    /// 1-based count of completed steps on the context.
    pub step: u64,
    pub loss: T,
}

/// Loss value and the gradient for each input, in input order.
#[derive(Debug, Clone)]
pub struct ValueAndGrad<T: Scalar> {
    pub value: T,
    pub gradients: Vec<Tensor<T>>,
}

/// Open recording section. Resets the tape and returns the context to
/// `Idle` when dropped, including on early return or unwinding.
struct RecordingSection<'a, T: Float, B: Backend<T>> {
    ctx: &'a GraphExecutionContext<T, B>,
}

impl<'a, T: Float, B: Backend<T>> RecordingSection<'a, T, B> {
    fn open(ctx: &'a GraphExecutionContext<T, B>, what: &str) -> Result<Self> {
        if ctx.phase() != Phase::Train {
            return Err(Error::StateConflict(format!(
                "{what} requires the train phase, context is {:?}",
                ctx.phase()
            )));
        }
        let state = ctx.step_state();
        if state != StepState::Idle {
            return Err(Error::StateConflict(format!(
                "{what} started while another step is {state:?}"
            )));
        }
        ctx.begin_recording();
        ctx.set_step_state(StepState::Recording);
        Ok(Self { ctx })
    }
}

impl<T: Float, B: Backend<T>> Drop for RecordingSection<'_, T, B> {
    fn drop(&mut self) {
        self.ctx.reset_tape();
        self.ctx.set_step_state(StepState::Idle);
    }
}

impl<'ctx, T: Float, B: Backend<T>> Scope<'ctx, T, B> {
    /// Run `forward` over fresh leaves for `inputs` and differentiate its
    /// loss. The section must already be open.
    fn record_and_differentiate<F>(
        &self,
        inputs: &[&Tensor<T>],
        forward: F,
    ) -> Result<(T, Vec<Tensor<T>>)>
    where
        F: FnOnce(&Self, &[Var<T>]) -> Result<Var<T>>,
    {
        let ctx = self.context();
        let backend: &dyn Backend<T> = ctx.backend();
        let leaves: Vec<Var<T>> = {
            let mut tape = ctx.tape().borrow_mut();
            inputs
                .iter()
                .map(|&t| {
                    Var::tracked_leaf(&mut *tape, t.clone())
                        .unwrap_or_else(|| Var::constant(t.clone()))
                })
                .collect()
        };

        let loss = forward(self, &leaves)?;

        ctx.set_step_state(StepState::Backward);
        let grads = {
            let mut tape = ctx.tape().borrow_mut();
            tape.set_recording(false);
            backward(&*tape, &loss, backend)?
        };
        let value = loss
            .item()
            .ok_or(GradientError::NonScalarRoot { len: loss.len() })?;
        let gradients = leaves
            .iter()
            .map(|leaf| {
                grads
                    .wrt(leaf)
                    .cloned()
                    .unwrap_or_else(|| Tensor::zeros(leaf.shape()))
            })
            .collect();
        Ok((value, gradients))
    }

    /// Run one atomic training step.
    ///
    /// `forward` receives this scope and one tracked handle per parameter,
    /// in order, and returns a single-element loss. On success every
    /// parameter is updated by `optimizer` and the report carries the loss.
    ///
    /// # Errors
    /// - [`Error::StateConflict`] outside the TRAIN phase or when a step is
    ///   already running on this context
    /// - any error from `forward` or from the backward pass; parameters and
    ///   their gradients are then left as they were
    ///
    /// # Example
    ///
    /// ```
    /// use gradtape::{ModuleParameter, Tensor, create_training_context, sgd};
    ///
    /// let ctx = create_training_context::<f64>();
    /// let scope = ctx.enter().unwrap();
    /// let mut w = ModuleParameter::weight("w", Tensor::scalar(3.0).with_requires_grad()).unwrap();
    /// let mut opt = sgd(0.25);
    ///
    /// // loss = w^2, dloss/dw = 2w = 6
    /// let report = scope
    ///     .train_step(&mut opt, &mut [&mut w], |s, p| s.square(&p[0]))
    ///     .unwrap();
    /// assert_eq!(report.loss, 9.0);
    /// assert_eq!(w.value().item(), Some(1.5));
    /// ```
    pub fn train_step<O, F>(
        &self,
        optimizer: &mut O,
        params: &mut [&mut ModuleParameter<T>],
        forward: F,
    ) -> Result<StepReport<T>>
    where
        O: Optimizer<T> + ?Sized,
        F: FnOnce(&Self, &[Var<T>]) -> Result<Var<T>>,
    {
        let ctx = self.context();
        let section = RecordingSection::open(ctx, "training step")?;

        let values: Vec<&Tensor<T>> = params.iter().map(|p| p.value()).collect();
        let (loss, gradients) = self.record_and_differentiate(&values, forward)?;

        for (param, grad) in params.iter_mut().zip(gradients) {
            param.set_gradient(grad);
        }
        if let Err(err) = optimizer.apply(params) {
            for param in params.iter_mut() {
                param.zero_grad();
            }
            return Err(err);
        }
        ctx.set_step_state(StepState::Applied);
        let step = ctx.increment_completed_steps();
        drop(section);

        tracing::debug!(
            step,
            loss = loss.to_f64(),
            optimizer = optimizer.name(),
            "training step complete"
        );
        Ok(StepReport { step, loss })
    }

    /// Record `forward` over `inputs` and return the loss with its gradient
    /// with respect to each input. No parameter is updated.
    ///
    /// Inputs are treated as trainable leaves regardless of their
    /// `requires_grad` flag. Same phase and nesting rules as
    /// [`Scope::train_step`].
    pub fn value_and_grad<F>(&self, inputs: &[&Tensor<T>], forward: F) -> Result<ValueAndGrad<T>>
    where
        F: FnOnce(&Self, &[Var<T>]) -> Result<Var<T>>,
    {
        let _section = RecordingSection::open(self.context(), "value_and_grad")?;
        let (value, gradients) = self.record_and_differentiate(inputs, forward)?;
        Ok(ValueAndGrad { value, gradients })
    }
}
