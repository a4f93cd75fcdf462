//! Scoped acquisition handle for an execution context.

use std::marker::PhantomData;

use super::{GraphExecutionContext, Phase, release_thread_slot};
use crate::autodiff::{self, Tape, Var};
use crate::backend::{Backend, CpuBackend};
use crate::error::Result;
use crate::nn::{CrossEntropyLoss, Loss, MeanSquaredError};
use crate::scalar::Float;
use crate::tensor::Tensor;
use crate::train::StepState;

/// Active execution scope. Every tensor operation runs through it.
///
/// Inside a TRAIN-phase recording section (a training step or
/// [`Scope::value_and_grad`]) operations on tracked values are recorded on
/// the context's tape. Everywhere else results are untracked constants.
///
/// Dropping the scope releases the context.
#[derive(Debug)]
pub struct Scope<'ctx, T: Float, B: Backend<T> = CpuBackend> {
    ctx: &'ctx GraphExecutionContext<T, B>,
    // Tied to the thread that entered the context.
    _not_send: PhantomData<*const ()>,
}

impl<'ctx, T: Float, B: Backend<T>> Scope<'ctx, T, B> {
    pub(crate) fn new(ctx: &'ctx GraphExecutionContext<T, B>) -> Self {
        Self {
            ctx,
            _not_send: PhantomData,
        }
    }

    pub fn context(&self) -> &'ctx GraphExecutionContext<T, B> {
        self.ctx
    }

    pub fn phase(&self) -> Phase {
        self.ctx.phase()
    }

    pub fn backend(&self) -> &B {
        self.ctx.backend()
    }

    pub fn step_state(&self) -> StepState {
        self.ctx.step_state()
    }

    /// Number of entries currently on the tape.
    pub fn tape_len(&self) -> usize {
        self.ctx.tape().borrow().len()
    }

    pub fn is_recording(&self) -> bool {
        self.ctx.tape().borrow().is_recording()
    }

    fn with_tape<R>(&self, f: impl FnOnce(&mut Tape<T>, &dyn Backend<T>) -> R) -> R {
        let backend: &dyn Backend<T> = self.ctx.backend();
        let mut tape = self.ctx.tape().borrow_mut();
        f(&mut *tape, backend)
    }

    /// Wrap a tensor that never receives gradients.
    pub fn constant(&self, tensor: Tensor<T>) -> Var<T> {
        Var::constant(tensor)
    }

    /// Bring a tensor into the scope.
    ///
    /// Tensors with `requires_grad` become tape leaves while recording;
    /// otherwise the result is an untracked constant.
    pub fn input(&self, tensor: &Tensor<T>) -> Var<T> {
        if !tensor.requires_grad() {
            return Var::constant(tensor.clone());
        }
        self.with_tape(|tape, _| {
            Var::tracked_leaf(tape, tensor.clone()).unwrap_or_else(|| Var::constant(tensor.clone()))
        })
    }

    pub fn add(&self, a: &Var<T>, b: &Var<T>) -> Result<Var<T>> {
        Ok(self.with_tape(|tape, backend| autodiff::tracked_add(tape, backend, a, b))?)
    }

    pub fn sub(&self, a: &Var<T>, b: &Var<T>) -> Result<Var<T>> {
        Ok(self.with_tape(|tape, backend| autodiff::tracked_sub(tape, backend, a, b))?)
    }

    /// Element-wise product.
    pub fn mul(&self, a: &Var<T>, b: &Var<T>) -> Result<Var<T>> {
        Ok(self.with_tape(|tape, backend| autodiff::tracked_mul(tape, backend, a, b))?)
    }

    pub fn scale(&self, a: &Var<T>, alpha: T) -> Var<T> {
        self.with_tape(|tape, backend| autodiff::tracked_scale(tape, backend, a, alpha))
    }

    pub fn neg(&self, a: &Var<T>) -> Var<T> {
        self.with_tape(|tape, backend| autodiff::tracked_neg(tape, backend, a))
    }

    pub fn square(&self, a: &Var<T>) -> Result<Var<T>> {
        Ok(self.with_tape(|tape, backend| autodiff::tracked_square(tape, backend, a))?)
    }

    /// Matrix product of two rank-2 values.
    pub fn matmul(&self, a: &Var<T>, b: &Var<T>) -> Result<Var<T>> {
        Ok(self.with_tape(|tape, backend| autodiff::tracked_matmul(tape, backend, a, b))?)
    }

    /// Sum of all elements.
    pub fn sum(&self, a: &Var<T>) -> Var<T> {
        self.with_tape(|tape, backend| autodiff::tracked_sum(tape, backend, a))
    }

    /// Mean of all elements.
    pub fn mean(&self, a: &Var<T>) -> Var<T> {
        self.with_tape(|tape, backend| autodiff::tracked_mean(tape, backend, a))
    }

    pub fn relu(&self, a: &Var<T>) -> Var<T> {
        self.with_tape(|tape, backend| autodiff::tracked_relu(tape, backend, a))
    }

    pub fn sigmoid(&self, a: &Var<T>) -> Var<T> {
        self.with_tape(|tape, backend| autodiff::tracked_sigmoid(tape, backend, a))
    }

    pub fn tanh(&self, a: &Var<T>) -> Var<T> {
        self.with_tape(|tape, backend| autodiff::tracked_tanh(tape, backend, a))
    }

    /// Softmax over the columns of each row.
    pub fn softmax(&self, a: &Var<T>) -> Result<Var<T>> {
        Ok(self.with_tape(|tape, backend| autodiff::tracked_softmax(tape, backend, a))?)
    }

    /// Mean squared error between `prediction` and `target`.
    pub fn mse_loss(&self, prediction: &Var<T>, target: &Var<T>) -> Result<Var<T>> {
        MeanSquaredError.compute(self, prediction, target)
    }

    /// Mean softmax cross-entropy of `[N, C]` logits against class labels.
    pub fn cross_entropy_loss(&self, logits: &Var<T>, labels: &Tensor<i64>) -> Result<Var<T>> {
        CrossEntropyLoss.compute(self, logits, labels)
    }

    /// Cross-entropy recorded as a single tape entry.
    pub(crate) fn fused_cross_entropy(
        &self,
        logits: &Var<T>,
        labels: &Tensor<i64>,
    ) -> Result<Var<T>> {
        Ok(self.with_tape(|tape, backend| {
            autodiff::tracked_cross_entropy(tape, backend, logits, labels)
        })?)
    }
}

impl<T: Float, B: Backend<T>> Drop for Scope<'_, T, B> {
    fn drop(&mut self) {
        release_thread_slot();
        tracing::debug!(phase = ?self.ctx.phase(), "context exit");
    }
}
