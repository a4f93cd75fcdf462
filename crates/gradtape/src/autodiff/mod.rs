//! Tape-based reverse-mode automatic differentiation.
//!
//! # Architecture
//!
//! ```text
//! Scope ──records through──►  Tape<T> (owned by the execution context)
//!   │                            │
//!   ▼                            ▼
//! Var<T> (tensor + NodeId)   Vec<Node<T>>
//!                                │
//!                                ▼
//!                       GradFn<T> (e.g. MatmulBackward)
//!                                │
//!                         SavedTensor (Rc)
//! ```
//!
//! # Example
//!
//! ```
//! use gradtape::Tensor;
//! use gradtape::autodiff::{Tape, Var, backward, tracked_matmul, tracked_sum};
//! use gradtape::backend::CpuBackend;
//!
//! let mut tape = Tape::new();
//! tape.set_recording(true);
//!
//! let a_t = Tensor::<f64>::ones(&[2, 3]);
//! let a = Var::tracked_leaf(&mut tape, a_t).unwrap();
//! let b = Var::constant(Tensor::ones(&[3, 4]));
//!
//! let c = tracked_matmul(&mut tape, &CpuBackend, &a, &b).unwrap();
//! let loss = tracked_sum(&mut tape, &CpuBackend, &c);
//!
//! let grads = backward(&tape, &loss, &CpuBackend).unwrap();
//! assert_eq!(grads.wrt(&a).unwrap().data(), &[4.0; 6]);
//! ```
//!
//! # Design Notes
//!
//! - One tape per execution context, no global graph
//! - Gradients accumulate in a map keyed by `NodeId`, summing over paths
//! - Backward order comes from a topological sort of the reachable subgraph

mod backward;
mod gradients;
mod ops;
mod saved_tensor;
mod tape;
mod var;

pub use backward::backward;
pub use gradients::Gradients;
pub use ops::{
    tracked_add, tracked_cross_entropy, tracked_matmul, tracked_mean, tracked_mul, tracked_neg,
    tracked_relu, tracked_scale, tracked_sigmoid, tracked_softmax, tracked_square, tracked_sub,
    tracked_sum, tracked_tanh,
};
pub use saved_tensor::SavedTensor;
pub use tape::{GradFn, Node, NodeId, NodeInputs, Tape};
pub use var::Var;
