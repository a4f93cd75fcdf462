//! gradtape - phase-aware gradient tape and training step for dense tensors
//!
//! This crate records differentiable computations on a tape owned by an
//! explicit execution context, back-propagates a scalar loss through it, and
//! hands the resulting gradients to an optimizer in one atomic step.
//!
//! # Architecture
//!
//! ```text
//! Level 1: Training API (context, train modules)
//!     → GraphExecutionContext, Scope::train_step, Scope::value_and_grad
//!
//! Level 2: Differentiation (autodiff module)
//!     → Tape, Var, GradFn nodes, backward
//!
//! Level 3: Tensor kernels (operations, backend modules)
//!     → CpuBackend (faer GEMM, elementwise loops)
//! ```
//!
//! # Example
//!
//! ```
//! use gradtape::{ModuleParameter, Tensor, create_training_context, sgd};
//!
//! let ctx = create_training_context::<f64>();
//! let w0 = Tensor::from_vec(vec![0.5], &[1, 1]).unwrap().with_requires_grad();
//! let mut w = ModuleParameter::weight("w", w0).unwrap();
//! let x = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[4, 1]).unwrap();
//! let y = Tensor::from_vec(vec![2.0, 4.0, 6.0, 8.0], &[4, 1]).unwrap();
//! let mut opt = sgd(0.01);
//!
//! let scope = ctx.enter().unwrap();
//! for _ in 0..10 {
//!     scope
//!         .train_step(&mut opt, &mut [&mut w], |s, p| {
//!             let pred = s.matmul(&s.constant(x.clone()), &p[0])?;
//!             s.mse_loss(&pred, &s.constant(y.clone()))
//!         })
//!         .unwrap();
//! }
//! assert!((w.value().data()[0] - 2.0).abs() < 1.5);
//! ```

pub mod autodiff;
pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod nn;
pub mod operations;
pub mod optim;
pub mod parameter;
pub mod random;
pub mod scalar;
pub mod storage;
pub mod strides;
pub mod telemetry;
pub mod tensor;
pub mod train;

pub use autodiff::{Gradients, Var};
pub use config::{OptimizerConfig, TrainingConfig};
pub use context::{
    ContextBuilder, GraphExecutionContext, Phase, Scope, TapeMode, create_inference_context,
    create_training_context, deep_learning,
};
pub use error::{Error, GradientError, Result, TensorError};
pub use nn::{
    Accuracy, BinaryAccuracy, CrossEntropyLoss, Loss, MeanSquaredError, Metric, accuracy,
    binary_accuracy, cross_entropy, mse,
};
pub use optim::{Adam, Optimizer, Sgd, adam, sgd};
pub use parameter::{ModuleParameter, ParamId, ParamKind};
pub use random::RandomFloat;
pub use scalar::{DType, Float, Scalar};
pub use telemetry::init_tracing;
pub use tensor::Tensor;
pub use train::{StepReport, StepState, ValueAndGrad};
