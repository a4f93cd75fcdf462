//! Gradient tape for reverse-mode automatic differentiation.

use smallvec::SmallVec;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use super::var::Var;
use crate::backend::Backend;
use crate::error::TensorError;
use crate::scalar::Float;
use crate::tensor::Tensor;

/// Input node ids of one recorded operation. Most operations are binary.
pub type NodeInputs = SmallVec<[NodeId; 2]>;

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(0);

fn next_epoch() -> u64 {
    NEXT_EPOCH.fetch_add(1, Ordering::Relaxed)
}

/// Unique identifier for a node on a tape.
///
/// The epoch changes whenever a tape is created or cleared, so ids held by
/// tensors from an earlier forward pass never alias nodes of a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    epoch: u64,
    index: usize,
}

impl NodeId {
    /// Position on the tape.
    pub fn index(&self) -> usize {
        self.index
    }

    #[cfg(test)]
    pub(crate) fn new_for_test(index: usize) -> Self {
        Self { epoch: u64::MAX, index }
    }
}

/// Gradient rule of one recorded operation.
///
/// Given the gradient of the operation's output, returns the gradient for
/// each input that is tracked on the tape.
pub trait GradFn<T: Float>: Debug {
    /// Operation name, for logs and tape inspection.
    fn name(&self) -> &'static str;

    /// Compute the vector-Jacobian product for each tracked input.
    fn backward(
        &self,
        grad_output: &Tensor<T>,
        backend: &dyn Backend<T>,
    ) -> Result<Vec<(NodeId, Tensor<T>)>, TensorError>;

    /// Tracked input node ids.
    fn inputs(&self) -> NodeInputs;
}

#[derive(Debug)]
pub(crate) enum NodeKind<T: Float> {
    Leaf { requires_grad: bool },
    Op(Box<dyn GradFn<T>>),
}

/// One tape entry: a leaf or a recorded operation.
#[derive(Debug)]
pub struct Node<T: Float> {
    id: NodeId,
    shape: Vec<usize>,
    kind: NodeKind<T>,
}

impl<T: Float> Node<T> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Shape of the value this node produced.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Gradient rule (`None` for leaves).
    pub fn grad_fn(&self) -> Option<&dyn GradFn<T>> {
        match &self.kind {
            NodeKind::Op(grad_fn) => Some(grad_fn.as_ref()),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// Leaves that asked for gradients.
    pub fn is_trainable_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { requires_grad: true })
    }

    /// Operation name, `"leaf"` for leaves.
    pub fn op_name(&self) -> &'static str {
        self.grad_fn().map_or("leaf", |f| f.name())
    }
}

/// Append-only log of differentiable operations.
///
/// A tape records only while recording is switched on. An EVAL-locked tape
/// refuses to switch recording on at all.
pub struct Tape<T: Float> {
    nodes: Vec<Node<T>>,
    epoch: u64,
    recording: bool,
    eval_locked: bool,
}

impl<T: Float> Tape<T> {
    /// Create a tape that may record.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            epoch: next_epoch(),
            recording: false,
            eval_locked: false,
        }
    }

    /// Create a tape that never records.
    pub fn eval_locked() -> Self {
        Self {
            eval_locked: true,
            ..Self::new()
        }
    }

    pub fn is_eval_locked(&self) -> bool {
        self.eval_locked
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Switch recording on or off. Returns whether recording is now on.
    pub fn set_recording(&mut self, enabled: bool) -> bool {
        if enabled && self.eval_locked {
            tracing::warn!("recording requested on an eval-locked tape; ignoring");
            return false;
        }
        self.recording = enabled;
        self.recording
    }

    fn push(&mut self, shape: &[usize], kind: NodeKind<T>) -> NodeId {
        let id = NodeId {
            epoch: self.epoch,
            index: self.nodes.len(),
        };
        self.nodes.push(Node {
            id,
            shape: shape.to_vec(),
            kind,
        });
        id
    }

    /// Register a leaf. Returns `None` when not recording.
    pub fn leaf(&mut self, shape: &[usize], requires_grad: bool) -> Option<NodeId> {
        if !self.recording {
            return None;
        }
        Some(self.push(shape, NodeKind::Leaf { requires_grad }))
    }

    /// Append an operation entry producing a value of `output_shape`.
    ///
    /// Returns `None` (and drops `grad_fn`) when not recording.
    pub fn record(
        &mut self,
        grad_fn: Box<dyn GradFn<T>>,
        output_shape: &[usize],
    ) -> Option<NodeId> {
        if !self.recording {
            return None;
        }
        tracing::trace!(
            op = grad_fn.name(),
            inputs = grad_fn.inputs().len(),
            index = self.nodes.len(),
            "tape record"
        );
        Some(self.push(output_shape, NodeKind::Op(grad_fn)))
    }

    /// Whether `id` belongs to this tape's current epoch.
    pub fn owns(&self, id: NodeId) -> bool {
        id.epoch == self.epoch && id.index < self.nodes.len()
    }

    /// Get node by ID.
    pub fn get_node(&self, id: NodeId) -> Option<&Node<T>> {
        if id.epoch != self.epoch {
            return None;
        }
        self.nodes.get(id.index)
    }

    pub fn nodes(&self) -> &[Node<T>] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop all entries, stop recording and invalidate outstanding node ids.
    /// Keeps the allocated capacity.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.recording = false;
        self.epoch = next_epoch();
    }

    /// Wrap `output` as the result of an operation over `inputs`.
    ///
    /// Records an entry only when recording and at least one input is
    /// tracked on this tape; otherwise the result is an untracked constant.
    pub(crate) fn track<F>(&mut self, output: Tensor<T>, inputs: &[&Var<T>], make: F) -> Var<T>
    where
        F: FnOnce(&[Option<NodeId>]) -> Box<dyn GradFn<T>>,
    {
        if !self.recording {
            return Var::constant(output);
        }
        let ids: SmallVec<[Option<NodeId>; 2]> = inputs
            .iter()
            .map(|v| v.node_id().filter(|&id| self.owns(id)))
            .collect();
        if ids.iter().all(Option::is_none) {
            return Var::constant(output);
        }
        let grad_fn = make(&ids);
        match self.record(grad_fn, output.shape()) {
            Some(id) => Var::tracked(output, id),
            None => Var::constant(output),
        }
    }
}

impl<T: Float> Default for Tape<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> Debug for Tape<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tape")
            .field("num_nodes", &self.nodes.len())
            .field("epoch", &self.epoch)
            .field("recording", &self.recording)
            .field("eval_locked", &self.eval_locked)
            .finish()
    }
}
