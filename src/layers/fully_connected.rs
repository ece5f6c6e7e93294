//! Fully-connected (dense) layer.
//!
//! Each neuron holds one weight per predecessor neuron plus a bias. Weights
//! are stored row-major per neuron, so `weights[j * prev_size + i]` connects
//! predecessor neuron `i` to neuron `j`.

use crate::layers::scratch::{LayerScratch, SampleScratch};
use crate::utils::{Activation, SimpleRng};

pub struct FullyConnectedLayer {
    layer_size: usize,
    prev_size: usize,
    activation: Activation,
    weights: Vec<f32>, // [layer_size * prev_size]
    biases: Vec<f32>,  // [layer_size]
}

impl FullyConnectedLayer {
    /// Create a fully-connected layer of `layer_size` neurons reading
    /// `prev_size` predecessor activations. Weights are zero until the
    /// network initializes them from its seeded generator.
    pub fn new(layer_size: usize, prev_size: usize, activation: Activation) -> Self {
        assert!(layer_size > 0, "layer size must be non-zero");
        assert!(prev_size > 0, "predecessor size must be non-zero");
        FullyConnectedLayer {
            layer_size,
            prev_size,
            activation,
            weights: vec![0.0; layer_size * prev_size],
            biases: vec![0.0; layer_size],
        }
    }

    /// Draw weights from a standard normal distribution scaled by
    /// 1/sqrt(prev_size); biases from the same unscaled distribution.
    ///
    /// The per-neuron draw order (weights, then bias) is fixed so a seed
    /// reproduces the same tensors.
    pub fn init_weights(&mut self, rng: &mut SimpleRng) {
        let scale = 1.0 / (self.prev_size as f32).sqrt();
        for j in 0..self.layer_size {
            for i in 0..self.prev_size {
                self.weights[j * self.prev_size + i] = rng.next_gaussian() * scale;
            }
            self.biases[j] = rng.next_gaussian();
        }
    }

    /// Weighted sum of predecessor activations plus bias, through the
    /// activation function. Stores both the pre-activation and the
    /// activation in the slot.
    pub fn feed_forward(&self, prev: &LayerScratch, own: &mut LayerScratch) {
        for j in 0..self.layer_size {
            let row = &self.weights[j * self.prev_size..(j + 1) * self.prev_size];
            let mut z = self.biases[j];
            for (weight, activation) in row.iter().zip(prev.activations.iter()) {
                z += weight * activation;
            }
            own.weighted_inputs[j] = z;
            own.activations[j] = self.activation.compute(z);
        }
    }

    /// This layer's error from the successor's propagated error:
    /// `error[j] = successor_error(j) * activation'(z[j])`.
    ///
    /// `successor_error` is the flat-index lookup into the successor chain
    /// (fully-connected layers are 1D, so the successor must support it).
    pub fn compute_errors<F>(&self, own: &mut LayerScratch, successor_error: F)
    where
        F: Fn(usize) -> f32,
    {
        for j in 0..self.layer_size {
            own.errors[j] = successor_error(j) * self.activation.derivative(own.weighted_inputs[j]);
        }
    }

    /// Error components for the predecessor: for each predecessor neuron
    /// `i`, the sum over this layer of `weight[j][i] * error[j]`.
    pub fn calc_bwd_error(&self, own: &mut LayerScratch) {
        for i in 0..self.prev_size {
            let mut error = 0.0;
            for j in 0..self.layer_size {
                error += self.weights[j * self.prev_size + i] * own.errors[j];
            }
            own.bwd_errors[i] = error;
        }
    }

    /// Apply the accumulated gradient for one mini-batch.
    ///
    /// Each weight first shrinks by the L2 decay factor
    /// `1 - rate * (lambda / total)`, then the gradient averaged over the
    /// mini-batch slots is subtracted. Biases are updated symmetrically
    /// without the decay term.
    pub fn end_batch(
        &mut self,
        slots: &[SampleScratch],
        own_idx: usize,
        learning_rate: f32,
        lambda: f32,
        num_training_samples: usize,
    ) {
        let mb_size = slots.len() as f32;
        let decay = 1.0 - learning_rate * (lambda / num_training_samples as f32);
        for j in 0..self.layer_size {
            for i in 0..self.prev_size {
                let mut weight_delta = 0.0;
                for slot in slots {
                    weight_delta += slot.layers[own_idx - 1].activations[i]
                        * slot.layers[own_idx].errors[j];
                }
                weight_delta *= learning_rate / mb_size;
                let weight = &mut self.weights[j * self.prev_size + i];
                *weight *= decay;
                *weight -= weight_delta;
            }
            let mut bias_delta = 0.0;
            for slot in slots {
                bias_delta += slot.layers[own_idx].errors[j];
            }
            bias_delta *= learning_rate / mb_size;
            self.biases[j] -= bias_delta;
        }
    }

    pub fn size(&self) -> usize {
        self.layer_size
    }

    pub fn prev_size(&self) -> usize {
        self.prev_size
    }

    pub fn num_dims(&self) -> usize {
        1
    }

    pub fn dim(&self, i: usize) -> usize {
        assert!(i == 0, "fully-connected layer is 1D");
        self.layer_size
    }

    pub fn scratch(&self) -> LayerScratch {
        LayerScratch::trainable(self.layer_size, self.prev_size)
    }

    /// Weight connecting predecessor neuron `input` to neuron `neuron`.
    pub fn weight(&self, neuron: usize, input: usize) -> f32 {
        assert!(neuron < self.layer_size, "neuron index out of range");
        assert!(input < self.prev_size, "input index out of range");
        self.weights[neuron * self.prev_size + input]
    }

    pub fn set_weight(&mut self, neuron: usize, input: usize, value: f32) {
        assert!(neuron < self.layer_size, "neuron index out of range");
        assert!(input < self.prev_size, "input index out of range");
        self.weights[neuron * self.prev_size + input] = value;
    }

    pub fn bias(&self, neuron: usize) -> f32 {
        assert!(neuron < self.layer_size, "neuron index out of range");
        self.biases[neuron]
    }

    pub fn set_bias(&mut self, neuron: usize, value: f32) {
        assert!(neuron < self.layer_size, "neuron index out of range");
        self.biases[neuron] = value;
    }

    pub fn sum_squared_weights(&self) -> f32 {
        self.weights.iter().map(|w| w * w).sum()
    }
}
