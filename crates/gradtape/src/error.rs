//! Error types for gradtape.

use thiserror::Error;

/// Errors raised by tensor construction and compute backend primitives.
#[derive(Debug, Error)]
pub enum TensorError {
    /// Shape mismatch between data length and expected size.
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Operands of a binary operation have different shapes.
    #[error("incompatible shapes {lhs:?} and {rhs:?} for {op}")]
    IncompatibleShapes {
        op: &'static str,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },

    /// Shape contains a zero-sized dimension.
    #[error("invalid shape {shape:?}: dimensions must be positive")]
    InvalidShape { shape: Vec<usize> },

    /// Index out of bounds.
    #[error("index out of bounds: index {index} is out of range for dimension {dim_size}")]
    IndexOutOfBounds { index: usize, dim_size: usize },

    /// Wrong number of indices provided.
    #[error("wrong number of indices: expected {expected}, got {actual}")]
    WrongNumberOfIndices { expected: usize, actual: usize },

    /// Operation requires specific tensor rank.
    #[error("expected tensor of rank {expected}, got rank {actual}")]
    RankMismatch { expected: usize, actual: usize },

    /// Class label outside `0..num_classes`.
    #[error("label {label} out of range for {num_classes} classes")]
    LabelOutOfRange { label: i64, num_classes: usize },
}

/// Errors raised by the reverse-mode pass over a tape.
#[derive(Debug, Error)]
pub enum GradientError {
    /// `backward` was called before anything was recorded.
    #[error("backward called on an empty tape")]
    EmptyTape,

    /// The root tensor was never recorded on this tape.
    #[error("backward root is not recorded on the tape")]
    RootNotRecorded,

    /// The root must hold exactly one element.
    #[error("backward requires a scalar root, got {len} elements")]
    NonScalarRoot { len: usize },

    /// Two gradient contributions for the same node disagree in shape.
    #[error("gradient shape mismatch for node {node}: {existing:?} vs {incoming:?}")]
    AccumulationMismatch {
        node: usize,
        existing: Vec<usize>,
        incoming: Vec<usize>,
    },

    /// The recorded graph is not acyclic.
    #[error("tape contains a cycle through node {node}")]
    Cycle { node: usize },
}

/// Top-level error for contexts, parameters, optimizers and training steps.
#[derive(Debug, Error)]
pub enum Error {
    /// A context or training step was entered while another one is active,
    /// or an operation was attempted in the wrong phase.
    #[error("state conflict: {0}")]
    StateConflict(String),

    /// Reverse-mode pass failed.
    #[error(transparent)]
    Gradient(#[from] GradientError),

    /// Optimizer was asked to apply a parameter with no gradient.
    #[error("parameter `{name}` has no gradient bound")]
    UnboundGradient { name: String },

    /// Compute backend primitive failed.
    #[error("backend error: {0}")]
    Backend(#[from] TensorError),

    /// Parameter tensor was not marked for gradient tracking.
    #[error("parameter `{name}` requires a tensor with gradient tracking enabled")]
    ParameterNotTrainable { name: String },

    /// Context was built without a compute backend.
    #[error("execution context has no compute backend configured")]
    MissingBackend,

    /// Configuration could not be parsed or failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}
