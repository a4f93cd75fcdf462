//! Phase-aware graph execution context.
//!
//! A [`GraphExecutionContext`] binds a tape, a compute backend and a phase.
//! Operations run through the [`Scope`] returned by
//! [`GraphExecutionContext::enter`]; the scope is released on drop.
//!
//! # Example
//!
//! ```
//! use gradtape::{Phase, Tensor, create_inference_context};
//!
//! let ctx = create_inference_context::<f32>();
//! let scope = ctx.enter().unwrap();
//! assert_eq!(scope.phase(), Phase::Eval);
//!
//! let x = scope.input(&Tensor::ones(&[2, 2]).with_requires_grad());
//! let y = scope.relu(&x);
//! assert!(!y.is_tracked());
//! assert_eq!(scope.tape_len(), 0);
//! ```

mod scope;

pub use scope::Scope;

use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;

use crate::autodiff::Tape;
use crate::backend::{Backend, CpuBackend};
use crate::config::TrainingConfig;
use crate::error::{Error, Result};
use crate::scalar::Float;
use crate::train::StepState;

/// Execution phase of a context. Fixed for the context's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Differentiable: recording sections capture operations on the tape.
    #[default]
    Train,
    /// Inference: nothing is ever recorded.
    Eval,
}

/// How the tape is prepared for each recording section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TapeMode {
    /// Allocate a new tape for every step.
    #[default]
    Fresh,
    /// Clear the existing tape and keep its capacity.
    Reuse,
}

thread_local! {
    static CONTEXT_ACTIVE: Cell<bool> = const { Cell::new(false) };
}

/// Mark a context active on this thread. Fails if one already is.
fn acquire_thread_slot() -> Result<()> {
    CONTEXT_ACTIVE.with(|active| {
        if active.get() {
            return Err(Error::StateConflict(
                "an execution context is already active on this thread".to_string(),
            ));
        }
        active.set(true);
        Ok(())
    })
}

fn release_thread_slot() {
    CONTEXT_ACTIVE.with(|active| active.set(false));
}

/// Owns the tape and backend for one training or inference loop.
#[derive(Debug)]
pub struct GraphExecutionContext<T: Float, B: Backend<T> = CpuBackend> {
    phase: Phase,
    tape_mode: TapeMode,
    backend: B,
    tape: RefCell<Tape<T>>,
    step_state: Cell<StepState>,
    completed_steps: Cell<u64>,
}

impl<T: Float, B: Backend<T>> GraphExecutionContext<T, B> {
    /// Create a context with the default tape mode.
    pub fn new(phase: Phase, backend: B) -> Self {
        Self::with_tape_mode(phase, TapeMode::default(), backend)
    }

    pub fn with_tape_mode(phase: Phase, tape_mode: TapeMode, backend: B) -> Self {
        let tape = match phase {
            Phase::Train => Tape::new(),
            Phase::Eval => Tape::eval_locked(),
        };
        Self {
            phase,
            tape_mode,
            backend,
            tape: RefCell::new(tape),
            step_state: Cell::new(StepState::Idle),
            completed_steps: Cell::new(0),
        }
    }

    pub fn builder() -> ContextBuilder<T, B> {
        ContextBuilder::new()
    }

    /// Create a context from a validated configuration.
    pub fn from_config(config: &TrainingConfig, backend: B) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_tape_mode(config.phase, config.tape_mode, backend))
    }

    /// Enter the context, returning the scope under which operations run.
    ///
    /// Fails with [`Error::StateConflict`] if any context is already active
    /// on the current thread, including this one.
    pub fn enter(&self) -> Result<Scope<'_, T, B>> {
        acquire_thread_slot()?;
        tracing::debug!(phase = ?self.phase, backend = self.backend.name(), "context enter");
        Ok(Scope::new(self))
    }

    /// Enter the context and run `f` under its scope. The scope is released
    /// when `f` returns, whether or not it failed.
    pub fn run<R>(&self, f: impl FnOnce(&Scope<'_, T, B>) -> Result<R>) -> Result<R> {
        let scope = self.enter()?;
        f(&scope)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn tape_mode(&self) -> TapeMode {
        self.tape_mode
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn step_state(&self) -> StepState {
        self.step_state.get()
    }

    /// Number of training steps that reached the applied state.
    pub fn completed_steps(&self) -> u64 {
        self.completed_steps.get()
    }

    pub(crate) fn tape(&self) -> &RefCell<Tape<T>> {
        &self.tape
    }

    pub(crate) fn set_step_state(&self, state: StepState) {
        tracing::trace!(from = ?self.step_state.get(), to = ?state, "step state");
        self.step_state.set(state);
    }

    pub(crate) fn increment_completed_steps(&self) -> u64 {
        let next = self.completed_steps.get() + 1;
        self.completed_steps.set(next);
        next
    }

    /// Prepare the tape for a recording section according to the tape mode.
    pub(crate) fn begin_recording(&self) {
        let mut tape = self.tape.borrow_mut();
        match self.tape_mode {
            TapeMode::Fresh => *tape = Tape::new(),
            TapeMode::Reuse => tape.clear(),
        }
        tape.set_recording(true);
    }

    /// Stop recording and drop every tape entry.
    pub(crate) fn reset_tape(&self) {
        self.tape.borrow_mut().clear();
    }
}

/// Builder for [`GraphExecutionContext`].
#[derive(Debug)]
pub struct ContextBuilder<T: Float, B: Backend<T>> {
    phase: Phase,
    tape_mode: TapeMode,
    backend: Option<B>,
    _marker: PhantomData<T>,
}

impl<T: Float, B: Backend<T>> ContextBuilder<T, B> {
    pub fn new() -> Self {
        Self {
            phase: Phase::default(),
            tape_mode: TapeMode::default(),
            backend: None,
            _marker: PhantomData,
        }
    }

    pub fn phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn tape_mode(mut self, tape_mode: TapeMode) -> Self {
        self.tape_mode = tape_mode;
        self
    }

    pub fn backend(mut self, backend: B) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Fails with [`Error::MissingBackend`] if no backend was supplied.
    pub fn build(self) -> Result<GraphExecutionContext<T, B>> {
        let backend = self.backend.ok_or(Error::MissingBackend)?;
        Ok(GraphExecutionContext::with_tape_mode(
            self.phase,
            self.tape_mode,
            backend,
        ))
    }
}

impl<T: Float, B: Backend<T>> Default for ContextBuilder<T, B> {
    fn default() -> Self {
        Self::new()
    }
}

/// TRAIN-phase context on the CPU backend.
pub fn create_training_context<T: Float>() -> GraphExecutionContext<T, CpuBackend> {
    GraphExecutionContext::new(Phase::Train, CpuBackend::new())
}

/// EVAL-phase context on the CPU backend.
pub fn create_inference_context<T: Float>() -> GraphExecutionContext<T, CpuBackend> {
    GraphExecutionContext::new(Phase::Eval, CpuBackend::new())
}

/// Run `f` under a fresh TRAIN-phase context on the CPU backend.
///
/// ```
/// use gradtape::{ModuleParameter, Tensor, deep_learning, sgd};
///
/// let mut w = ModuleParameter::weight("w", Tensor::scalar(3.0).with_requires_grad()).unwrap();
/// let report = deep_learning::<f64, _>(|scope| {
///     scope.train_step(&mut sgd(0.25), &mut [&mut w], |s, p| s.mul(&p[0], &p[0]))
/// })
/// .unwrap();
/// assert_eq!(report.step, 1);
/// assert_eq!(w.value().item(), Some(1.5));
/// ```
pub fn deep_learning<T: Float, R>(f: impl FnOnce(&Scope<'_, T>) -> Result<R>) -> Result<R> {
    let ctx = create_training_context::<T>();
    ctx.run(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use crate::optim::sgd;
    use crate::parameter::ModuleParameter;
    use crate::tensor::Tensor;

    #[test]
    fn test_builder_requires_backend() {
        let err = ContextBuilder::<f64, CpuBackend>::new()
            .phase(Phase::Train)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::MissingBackend));
    }

    #[test]
    fn test_builder_sets_fields() {
        let ctx: GraphExecutionContext<f32> = GraphExecutionContext::builder()
            .phase(Phase::Eval)
            .tape_mode(TapeMode::Reuse)
            .backend(CpuBackend)
            .build()
            .unwrap();
        assert_eq!(ctx.phase(), Phase::Eval);
        assert_eq!(ctx.tape_mode(), TapeMode::Reuse);
        assert!(ctx.tape().borrow().is_eval_locked());
        assert_eq!(ctx.step_state(), StepState::Idle);
    }

    #[test]
    fn test_enter_twice_conflicts() {
        let ctx = create_training_context::<f64>();
        let scope = ctx.enter().unwrap();
        assert!(matches!(ctx.enter(), Err(Error::StateConflict(_))));

        let other = create_inference_context::<f64>();
        assert!(matches!(other.enter(), Err(Error::StateConflict(_))));

        drop(scope);
        assert!(ctx.enter().is_ok());
    }

    #[test]
    fn test_scope_released_after_drop() {
        let ctx = create_training_context::<f32>();
        {
            let _scope = ctx.enter().unwrap();
        }
        let other = create_inference_context::<f32>();
        assert!(other.enter().is_ok());
    }

    #[test]
    fn test_from_config() {
        let config = TrainingConfig {
            phase: Phase::Train,
            tape_mode: TapeMode::Reuse,
            optimizer: OptimizerConfig::default(),
        };
        let ctx = GraphExecutionContext::<f64, _>::from_config(&config, CpuBackend).unwrap();
        assert_eq!(ctx.tape_mode(), TapeMode::Reuse);
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let config = TrainingConfig {
            optimizer: OptimizerConfig::Sgd {
                learning_rate: 0.0,
                momentum: 0.0,
                weight_decay: 0.0,
            },
            ..TrainingConfig::default()
        };
        assert!(matches!(
            GraphExecutionContext::<f64, _>::from_config(&config, CpuBackend),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_deep_learning_runs_block_in_training_scope() {
        let mut w = ModuleParameter::weight("w", Tensor::scalar(2.0).with_requires_grad()).unwrap();
        let phase = deep_learning::<f64, _>(|scope| {
            scope.train_step(&mut sgd(0.5), &mut [&mut w], |s, p| s.mul(&p[0], &p[0]))?;
            Ok(scope.phase())
        })
        .unwrap();
        assert_eq!(phase, Phase::Train);
        // w - 0.5 * 2w
        assert_eq!(w.value().item(), Some(0.0));
    }

    #[test]
    fn test_deep_learning_releases_thread_after_error() {
        let nested = deep_learning::<f32, ()>(|_| {
            let other = create_inference_context::<f32>();
            other.enter()?;
            Ok(())
        });
        assert!(matches!(nested, Err(Error::StateConflict(_))));

        let held = create_training_context::<f32>();
        let _scope = held.enter().unwrap();
        assert!(matches!(
            deep_learning::<f32, ()>(|_| Ok(())),
            Err(Error::StateConflict(_))
        ));
    }

    #[test]
    fn test_run_enters_given_context() {
        let ctx = create_inference_context::<f64>();
        let len = ctx
            .run(|scope| {
                let x = scope.input(&Tensor::ones(&[2]).with_requires_grad());
                let _ = scope.relu(&x);
                Ok(scope.tape_len())
            })
            .unwrap();
        assert_eq!(len, 0);
        assert!(ctx.enter().is_ok());
    }
}
