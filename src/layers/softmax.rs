//! Softmax output layer at the tail of the chain.
//!
//! Shares the weight and bias structure of the fully-connected layer but
//! produces a normalized exponential over all neurons: the forward pass
//! first computes every weighted input, then normalizes. The output error
//! is seeded directly from the cost function against a one-hot target;
//! there is no successor to read an error from.

use crate::layers::scratch::{LayerScratch, SampleScratch};
use crate::utils::{Cost, SimpleRng};

pub struct SoftMaxLayer {
    layer_size: usize,
    prev_size: usize,
    cost: Cost,
    weights: Vec<f32>, // [layer_size * prev_size]
    biases: Vec<f32>,  // [layer_size]
}

impl SoftMaxLayer {
    /// Create a softmax output layer of `layer_size` classes reading
    /// `prev_size` predecessor activations.
    pub fn new(layer_size: usize, prev_size: usize, cost: Cost) -> Self {
        assert!(layer_size > 0, "layer size must be non-zero");
        assert!(prev_size > 0, "predecessor size must be non-zero");
        SoftMaxLayer {
            layer_size,
            prev_size,
            cost,
            weights: vec![0.0; layer_size * prev_size],
            biases: vec![0.0; layer_size],
        }
    }

    /// Same scheme as the fully-connected layer: normal draws scaled by
    /// 1/sqrt(prev_size) for weights, unscaled for biases.
    pub fn init_weights(&mut self, rng: &mut SimpleRng) {
        let scale = 1.0 / (self.prev_size as f32).sqrt();
        for j in 0..self.layer_size {
            for i in 0..self.prev_size {
                self.weights[j * self.prev_size + i] = rng.next_gaussian() * scale;
            }
            self.biases[j] = rng.next_gaussian();
        }
    }

    /// Compute every neuron's weighted input, then normalize:
    /// `a[j] = exp(z[j]) / sum_k exp(z[k])`.
    ///
    /// The maximum weighted input is subtracted before exponentiation so the
    /// normalization stays finite for any finite weighted-input vector.
    pub fn feed_forward(&self, prev: &LayerScratch, own: &mut LayerScratch) {
        for j in 0..self.layer_size {
            let row = &self.weights[j * self.prev_size..(j + 1) * self.prev_size];
            let mut z = self.biases[j];
            for (weight, activation) in row.iter().zip(prev.activations.iter()) {
                z += weight * activation;
            }
            own.weighted_inputs[j] = z;
        }

        let mut max = own.weighted_inputs[0];
        for &z in own.weighted_inputs.iter().skip(1) {
            if z > max {
                max = z;
            }
        }
        let mut sum = 0.0;
        for j in 0..self.layer_size {
            own.activations[j] = (own.weighted_inputs[j] - max).exp();
            sum += own.activations[j];
        }
        let inv_sum = 1.0 / sum;
        for activation in own.activations.iter_mut() {
            *activation *= inv_sum;
        }
    }

    /// Seed the backward pass from the cost gradient against the one-hot
    /// encoding of `label`.
    pub fn compute_output_error(&self, label: u8, own: &mut LayerScratch) {
        for j in 0..self.layer_size {
            let target = if j == label as usize { 1.0 } else { 0.0 };
            own.errors[j] = self
                .cost
                .delta(own.weighted_inputs[j], own.activations[j], target);
        }
    }

    /// Per-sample cost against the one-hot encoding of `label`.
    pub fn compute_output_cost(&self, label: u8, own: &LayerScratch) -> f32 {
        let mut cost = 0.0;
        for j in 0..self.layer_size {
            let target = if j == label as usize { 1.0 } else { 0.0 };
            cost += self.cost.compute(own.activations[j], target);
        }
        cost
    }

    /// Error components for the predecessor, identical in form to the
    /// fully-connected layer.
    pub fn calc_bwd_error(&self, own: &mut LayerScratch) {
        for i in 0..self.prev_size {
            let mut error = 0.0;
            for j in 0..self.layer_size {
                error += self.weights[j * self.prev_size + i] * own.errors[j];
            }
            own.bwd_errors[i] = error;
        }
    }

    /// Apply the accumulated gradient for one mini-batch; decay-then-
    /// subtract for weights, plain averaged gradient for biases.
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

    /// Index of the maximum activation. Ties resolve to the first
    /// occurrence in index order.
    pub fn read_output(&self, own: &LayerScratch) -> usize {
        let mut result = 0;
        let mut max = own.activations[0];
        for (j, &activation) in own.activations.iter().enumerate().skip(1) {
            if activation > max {
                result = j;
                max = activation;
            }
        }
        result
    }

    /// Sum of squared weights, used for the L2 term of the reported loss.
    pub fn sum_squared_weights(&self) -> f32 {
        self.weights.iter().map(|w| w * w).sum()
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
        assert!(i == 0, "softmax layer is 1D");
        self.layer_size
    }

    pub fn scratch(&self) -> LayerScratch {
        LayerScratch::trainable(self.layer_size, self.prev_size)
    }

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
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forward_with_weighted_inputs(inputs: &[f32]) -> LayerScratch {
        // Drive the normalization directly through a layer whose weights
        // reproduce the requested weighted inputs from a one-hot input.
        let size = inputs.len();
        let mut layer = SoftMaxLayer::new(size, 1, Cost::CrossEntropy);
        for (j, &z) in inputs.iter().enumerate() {
            layer.set_weight(j, 0, z);
        }
        let mut prev = LayerScratch::activations_only(1);
        prev.activations[0] = 1.0;
        let mut own = layer.scratch();
        layer.feed_forward(&prev, &mut own);
        own
    }

    #[test]
    fn test_activations_sum_to_one() {
        let own = forward_with_weighted_inputs(&[1.0, 2.0, 3.0]);
        let sum: f32 = own.activations.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_activations_sum_to_one_for_large_inputs() {
        let own = forward_with_weighted_inputs(&[1000.0, 1001.0, 1002.0]);
        let sum: f32 = own.activations.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(own.activations.iter().all(|a| a.is_finite()));
    }

    #[test]
    fn test_uniform_weighted_inputs_give_uniform_activations() {
        let own = forward_with_weighted_inputs(&[4.0, 4.0, 4.0, 4.0]);
        for &a in &own.activations {
            assert!((a - 0.25).abs() < 1e-6);
        }
    }

    #[test]
    fn test_read_output_argmax() {
        let own = forward_with_weighted_inputs(&[0.5, 3.0, 1.0]);
        let layer = SoftMaxLayer::new(3, 1, Cost::CrossEntropy);
        assert_eq!(layer.read_output(&own), 1);
    }

    #[test]
    fn test_read_output_tie_takes_first() {
        let layer = SoftMaxLayer::new(3, 1, Cost::CrossEntropy);
        let mut own = layer.scratch();
        own.activations.copy_from_slice(&[0.4, 0.4, 0.2]);
        assert_eq!(layer.read_output(&own), 0);
    }

    #[test]
    fn test_cross_entropy_error_is_activation_minus_target() {
        let layer = SoftMaxLayer::new(3, 1, Cost::CrossEntropy);
        let mut own = layer.scratch();
        own.activations.copy_from_slice(&[0.2, 0.5, 0.3]);
        layer.compute_output_error(1, &mut own);
        assert!((own.errors[0] - 0.2).abs() < 1e-6);
        assert!((own.errors[1] - (0.5 - 1.0)).abs() < 1e-6);
        assert!((own.errors[2] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_sum_squared_weights() {
        let mut layer = SoftMaxLayer::new(2, 2, Cost::CrossEntropy);
        layer.set_weight(0, 0, 1.0);
        layer.set_weight(0, 1, 2.0);
        layer.set_weight(1, 0, 3.0);
        layer.set_weight(1, 1, 4.0);
        assert!((layer.sum_squared_weights() - 30.0).abs() < 1e-6);
    }
}
