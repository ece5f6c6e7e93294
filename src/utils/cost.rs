//! Cost functions for the output layer.
//!
//! Each cost exposes `compute` (the per-neuron cost contribution against a
//! one-hot target component) and `delta` (the gradient seed written into the
//! output layer's error slots). The pairing mirrors the activations module:
//! a strategy enum chosen once at network construction.

use crate::utils::activations::Activation;

/// Floor for activations inside logarithms.
const LOG_EPSILON: f32 = 1e-12;

/// Cost function evaluated at the softmax output layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cost {
    /// Half squared error: 0.5 * (a - y)^2.
    Quadratic,
    /// Categorical cross-entropy against a one-hot target: -y * ln(a).
    ///
    /// With softmax outputs the gradient seed reduces to `a - y`; the
    /// activation-derivative factor cancels algebraically.
    CrossEntropy,
}

impl Cost {
    /// Per-neuron cost contribution for activation `a` and target `y`.
    pub fn compute(self, activation: f32, target: f32) -> f32 {
        match self {
            Cost::Quadratic => {
                let diff = activation - target;
                0.5 * diff * diff
            }
            Cost::CrossEntropy => -target * activation.max(LOG_EPSILON).ln(),
        }
    }

    /// Gradient seed at the output layer for weighted input `z`,
    /// activation `a` and target `y`.
    pub fn delta(self, z: f32, activation: f32, target: f32) -> f32 {
        match self {
            Cost::Quadratic => (activation - target) * Activation::Sigmoid.derivative(z),
            Cost::CrossEntropy => activation - target,
        }
    }
}
