//! Loss functions evaluated through an execution scope.

use crate::autodiff::Var;
use crate::backend::Backend;
use crate::context::Scope;
use crate::error::Result;
use crate::scalar::Float;
use crate::tensor::Tensor;

/// A differentiable loss reducing a prediction and a target to a scalar.
pub trait Loss<T: Float> {
    /// What the prediction is compared against.
    type Target: ?Sized;

    fn name(&self) -> &'static str;

    fn compute<B: Backend<T>>(
        &self,
        scope: &Scope<'_, T, B>,
        prediction: &Var<T>,
        target: &Self::Target,
    ) -> Result<Var<T>>;
}

/// `mean((prediction - target)^2)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanSquaredError;

/// Alias for [`MeanSquaredError`].
pub type Mse = MeanSquaredError;

impl<T: Float> Loss<T> for MeanSquaredError {
    type Target = Var<T>;

    fn name(&self) -> &'static str {
        "mse"
    }

    fn compute<B: Backend<T>>(
        &self,
        scope: &Scope<'_, T, B>,
        prediction: &Var<T>,
        target: &Var<T>,
    ) -> Result<Var<T>> {
        let diff = scope.sub(prediction, target)?;
        let squared = scope.square(&diff)?;
        Ok(scope.mean(&squared))
    }
}

/// Softmax cross-entropy of `[N, C]` logits against `N` integer class
/// labels, averaged over the batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropyLoss;

/// Alias for [`CrossEntropyLoss`].
pub type SoftmaxCrossEntropy = CrossEntropyLoss;

impl<T: Float> Loss<T> for CrossEntropyLoss {
    type Target = Tensor<i64>;

    fn name(&self) -> &'static str {
        "cross_entropy"
    }

    fn compute<B: Backend<T>>(
        &self,
        scope: &Scope<'_, T, B>,
        prediction: &Var<T>,
        target: &Tensor<i64>,
    ) -> Result<Var<T>> {
        scope.fused_cross_entropy(prediction, target)
    }
}

/// Mean squared error loss.
pub fn mse() -> MeanSquaredError {
    MeanSquaredError
}

/// Softmax cross-entropy loss.
pub fn cross_entropy() -> CrossEntropyLoss {
    CrossEntropyLoss
}
