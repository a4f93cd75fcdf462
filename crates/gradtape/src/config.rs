//! Serializable training configuration.

use serde::{Deserialize, Serialize};

use crate::context::{Phase, TapeMode};
use crate::error::{Error, Result};
use crate::optim::{Adam, Optimizer, Sgd};
use crate::scalar::Float;

/// Optimizer choice and hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OptimizerConfig {
    Sgd {
        learning_rate: f64,
        #[serde(default)]
        momentum: f64,
        #[serde(default)]
        weight_decay: f64,
    },
    Adam {
        learning_rate: f64,
        #[serde(default = "default_beta1")]
        beta1: f64,
        #[serde(default = "default_beta2")]
        beta2: f64,
        #[serde(default = "default_eps")]
        eps: f64,
    },
}

fn default_beta1() -> f64 {
    0.9
}

fn default_beta2() -> f64 {
    0.999
}

fn default_eps() -> f64 {
    1e-8
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig::Sgd {
            learning_rate: 0.01,
            momentum: 0.0,
            weight_decay: 0.0,
        }
    }
}

impl OptimizerConfig {
    pub fn learning_rate(&self) -> f64 {
        match *self {
            OptimizerConfig::Sgd { learning_rate, .. }
            | OptimizerConfig::Adam { learning_rate, .. } => learning_rate,
        }
    }

    /// Check hyperparameter ranges.
    pub fn validate(&self) -> Result<()> {
        let lr = self.learning_rate();
        if !(lr.is_finite() && lr > 0.0) {
            return Err(Error::Config(format!(
                "learning_rate must be positive, got {lr}"
            )));
        }
        match *self {
            OptimizerConfig::Sgd {
                momentum,
                weight_decay,
                ..
            } => {
                if !(0.0..1.0).contains(&momentum) {
                    return Err(Error::Config(format!(
                        "momentum must be in [0, 1), got {momentum}"
                    )));
                }
                if weight_decay < 0.0 {
                    return Err(Error::Config(format!(
                        "weight_decay must be non-negative, got {weight_decay}"
                    )));
                }
            }
            OptimizerConfig::Adam {
                beta1, beta2, eps, ..
            } => {
                for (name, beta) in [("beta1", beta1), ("beta2", beta2)] {
                    if !(0.0..1.0).contains(&beta) {
                        return Err(Error::Config(format!(
                            "{name} must be in [0, 1), got {beta}"
                        )));
                    }
                }
                if eps <= 0.0 {
                    return Err(Error::Config(format!("eps must be positive, got {eps}")));
                }
            }
        }
        Ok(())
    }

    /// Validate and construct the optimizer.
    pub fn build<T: Float>(&self) -> Result<Box<dyn Optimizer<T>>> {
        self.validate()?;
        let optimizer: Box<dyn Optimizer<T>> = match *self {
            OptimizerConfig::Sgd {
                learning_rate,
                momentum,
                weight_decay,
            } => Box::new(
                Sgd::new(T::from_f64(learning_rate))
                    .with_momentum(T::from_f64(momentum))
                    .with_weight_decay(T::from_f64(weight_decay)),
            ),
            OptimizerConfig::Adam {
                learning_rate,
                beta1,
                beta2,
                eps,
            } => Box::new(Adam::with_betas(
                T::from_f64(learning_rate),
                T::from_f64(beta1),
                T::from_f64(beta2),
                T::from_f64(eps),
            )),
        };
        Ok(optimizer)
    }
}

/// Phase, tape lifetime and optimizer for a training loop.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub phase: Phase,
    pub tape_mode: TapeMode,
    pub optimizer: OptimizerConfig,
}

impl TrainingConfig {
    /// Parse and validate a JSON document.
    ///
    /// # Example
    ///
    /// ```
    /// use gradtape::{Phase, TapeMode, TrainingConfig};
    ///
    /// let config = TrainingConfig::from_json_str(
    ///     r#"{"tape_mode": "reuse", "optimizer": {"kind": "adam", "learning_rate": 0.001}}"#,
    /// )
    /// .unwrap();
    /// assert_eq!(config.phase, Phase::Train);
    /// assert_eq!(config.tape_mode, TapeMode::Reuse);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.optimizer.validate()
    }
}
