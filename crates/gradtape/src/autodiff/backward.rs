//! Backward pass execution for reverse-mode automatic differentiation.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

use super::gradients::Gradients;
use super::tape::{NodeId, Tape};
use super::var::Var;
use crate::backend::Backend;
use crate::error::{GradientError, Result};
use crate::scalar::Float;
use crate::tensor::Tensor;

/// Execute the backward pass from a scalar root.
///
/// Returns the gradient of `root` with respect to every trainable leaf on
/// the tape. Leaves that do not influence the root receive a zero gradient
/// of their own shape.
///
/// # Errors
/// - [`GradientError::EmptyTape`] if nothing was recorded
/// - [`GradientError::RootNotRecorded`] if `root` is not on this tape
/// - [`GradientError::NonScalarRoot`] if `root` has more than one element
/// - any backend error raised by a gradient rule
pub fn backward<T: Float>(
    tape: &Tape<T>,
    root: &Var<T>,
    backend: &dyn Backend<T>,
) -> Result<Gradients<T>> {
    if tape.is_empty() {
        return Err(GradientError::EmptyTape.into());
    }
    let root_id = root
        .node_id()
        .filter(|&id| tape.owns(id))
        .ok_or(GradientError::RootNotRecorded)?;
    if root.len() != 1 {
        return Err(GradientError::NonScalarRoot { len: root.len() }.into());
    }

    let order = reverse_topological_order(tape, root_id)?;
    tracing::debug!(
        nodes = order.len(),
        tape_len = tape.len(),
        backend = backend.name(),
        "backward"
    );

    let mut pending = Gradients::new();
    pending.accumulate(root_id, Tensor::ones(root.shape()))?;
    let mut leaf_grads = Gradients::new();

    for node_id in order {
        let grad_output = match pending.remove(node_id) {
            Some(g) => g,
            None => continue,
        };
        let node = match tape.get_node(node_id) {
            Some(n) => n,
            None => continue,
        };

        if let Some(grad_fn) = node.grad_fn() {
            for (input_id, input_grad) in grad_fn.backward(&grad_output, backend)? {
                pending.accumulate(input_id, input_grad)?;
            }
        } else if node.is_trainable_leaf() {
            leaf_grads.accumulate(node_id, grad_output)?;
        }
    }

    for node in tape.nodes() {
        if node.is_trainable_leaf() && !leaf_grads.contains(node.id()) {
            leaf_grads.accumulate(node.id(), Tensor::zeros(node.shape()))?;
        }
    }

    Ok(leaf_grads)
}

/// Nodes reachable from `root`, ordered so every node precedes its inputs.
fn reverse_topological_order<T: Float>(
    tape: &Tape<T>,
    root: NodeId,
) -> std::result::Result<Vec<NodeId>, GradientError> {
    let mut graph: DiGraph<NodeId, ()> = DiGraph::new();
    let mut node_to_idx: HashMap<NodeId, NodeIndex> = HashMap::new();
    let mut stack = vec![root];

    node_to_idx.insert(root, graph.add_node(root));
    while let Some(node_id) = stack.pop() {
        let output_idx = node_to_idx[&node_id];
        let Some(grad_fn) = tape.get_node(node_id).and_then(|n| n.grad_fn()) else {
            continue;
        };
        for input_id in grad_fn.inputs() {
            let input_idx = match node_to_idx.get(&input_id) {
                Some(&idx) => idx,
                None => {
                    let idx = graph.add_node(input_id);
                    node_to_idx.insert(input_id, idx);
                    stack.push(input_id);
                    idx
                }
            };
            // Edge from input to output (forward direction)
            graph.add_edge(input_idx, output_idx, ());
        }
    }

    let forward = toposort(&graph, None).map_err(|cycle| GradientError::Cycle {
        node: graph[cycle.node_id()].index(),
    })?;
    Ok(forward.into_iter().rev().map(|idx| graph[idx]).collect())
}
