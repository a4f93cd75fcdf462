//! Named trainable tensors.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::scalar::Float;
use crate::tensor::Tensor;

static NEXT_PARAM_ID: AtomicU64 = AtomicU64::new(0);

/// Process-unique parameter identity. Never reused.
///
/// Optimizers key their per-parameter state by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParamId(u64);

impl ParamId {
    fn next() -> Self {
        Self(NEXT_PARAM_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "param#{}", self.0)
    }
}

/// Role of a parameter inside a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Weight,
    Bias,
}

/// A named tensor that an optimizer updates.
///
/// The value changes only through [`Optimizer::apply`]. The gradient slot is
/// filled by a successful training step and cleared by `apply`.
///
/// [`Optimizer::apply`]: crate::optim::Optimizer::apply
#[derive(Debug)]
pub struct ModuleParameter<T: Float> {
    id: ParamId,
    name: String,
    kind: ParamKind,
    value: Tensor<T>,
    gradient: Option<Tensor<T>>,
}

impl<T: Float> ModuleParameter<T> {
    /// Create a parameter. Fails unless `value` has gradient tracking on.
    pub fn new(name: impl Into<String>, kind: ParamKind, value: Tensor<T>) -> Result<Self> {
        let name = name.into();
        if !value.requires_grad() {
            return Err(Error::ParameterNotTrainable { name });
        }
        Ok(Self {
            id: ParamId::next(),
            name,
            kind,
            value,
            gradient: None,
        })
    }

    /// Create a weight parameter.
    ///
    /// # Example
    ///
    /// ```
    /// use gradtape::{ModuleParameter, Tensor};
    ///
    /// let value = Tensor::<f64>::ones(&[2, 2]).with_requires_grad();
    /// let w = ModuleParameter::weight("w", value).unwrap();
    /// assert_eq!(w.name(), "w");
    /// assert!(w.gradient().is_none());
    ///
    /// assert!(ModuleParameter::weight("frozen", Tensor::<f64>::ones(&[2])).is_err());
    /// ```
    pub fn weight(name: impl Into<String>, value: Tensor<T>) -> Result<Self> {
        Self::new(name, ParamKind::Weight, value)
    }

    /// Create a bias parameter.
    pub fn bias(name: impl Into<String>, value: Tensor<T>) -> Result<Self> {
        Self::new(name, ParamKind::Bias, value)
    }

    pub fn id(&self) -> ParamId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ParamKind {
        self.kind
    }

    pub fn value(&self) -> &Tensor<T> {
        &self.value
    }

    pub fn shape(&self) -> &[usize] {
        self.value.shape()
    }

    /// Gradient from the last backward pass, if not yet consumed.
    pub fn gradient(&self) -> Option<&Tensor<T>> {
        self.gradient.as_ref()
    }

    /// Drop the bound gradient.
    pub fn zero_grad(&mut self) {
        self.gradient = None;
    }

    pub(crate) fn value_mut(&mut self) -> &mut Tensor<T> {
        &mut self.value
    }

    pub(crate) fn set_gradient(&mut self, gradient: Tensor<T>) {
        self.gradient = Some(gradient);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trainable() -> Tensor<f64> {
        Tensor::ones(&[1]).with_requires_grad()
    }

    #[test]
    fn test_ids_are_unique() {
        let a = ModuleParameter::weight("a", trainable()).unwrap();
        let b = ModuleParameter::weight("a", trainable()).unwrap();
        assert_ne!(a.id(), b.id());
        assert!(b.id() > a.id());
    }

    #[test]
    fn test_requires_trainable_tensor() {
        let err = ModuleParameter::bias("b", Tensor::<f32>::zeros(&[3])).unwrap_err();
        assert!(matches!(err, Error::ParameterNotTrainable { ref name } if name == "b"));
    }

    #[test]
    fn test_gradient_slot() {
        let mut p =
            ModuleParameter::bias("b", Tensor::<f32>::zeros(&[2]).with_requires_grad()).unwrap();
        assert_eq!(p.kind(), ParamKind::Bias);
        assert!(p.gradient().is_none());

        p.set_gradient(Tensor::ones(&[2]));
        assert_eq!(p.gradient().unwrap().data(), &[1.0, 1.0]);

        p.zero_grad();
        assert!(p.gradient().is_none());
    }

    #[test]
    fn test_display_id() {
        let p = ModuleParameter::weight("w", trainable()).unwrap();
        assert!(p.id().to_string().starts_with("param#"));
    }
}
