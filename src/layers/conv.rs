//! Convolutional layer with shared per-feature-map kernels.
//!
//! Each feature map slides one kernel over the input volume, so the output
//! grid per feature map is (inputW - kernelW + 1) x (inputH - kernelH + 1)
//! and all spatial positions of a feature map share one weight tensor and
//! one bias. Neurons are addressed as (x, y, z) with z naming the feature
//! map, flat-indexed in the canonical order of the geometry module.

use crate::layers::geometry::flat_index;
use crate::layers::scratch::{LayerScratch, SampleScratch};
use crate::utils::{Activation, SimpleRng};

pub struct ConvLayer {
    kernel_w: usize,
    kernel_h: usize,
    kernel_d: usize,
    input_w: usize,
    input_h: usize,
    input_d: usize,
    num_feature_maps: usize,
    activation: Activation,
    weights: Vec<f32>, // [fm][a][b][c] row-major
    biases: Vec<f32>,  // [fm]
}

impl ConvLayer {
    /// Create a convolutional layer over an `input_w` x `input_h` x
    /// `input_d` volume with `num_feature_maps` kernels of shape
    /// `kernel_w` x `kernel_h` x `kernel_d`.
    ///
    /// # Panics
    ///
    /// Panics if the kernel depth does not match the input depth or the
    /// kernel exceeds the input plane. Both are construction-time contract
    /// violations.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kernel_w: usize,
        kernel_h: usize,
        kernel_d: usize,
        num_feature_maps: usize,
        input_w: usize,
        input_h: usize,
        input_d: usize,
        activation: Activation,
    ) -> Self {
        assert_eq!(kernel_d, input_d, "kernel depth must match input depth");
        assert!(
            kernel_w <= input_w && kernel_h <= input_h,
            "kernel does not fit within the input plane"
        );
        assert!(num_feature_maps > 0, "feature map count must be non-zero");
        let weight_count = num_feature_maps * kernel_w * kernel_h * kernel_d;
        ConvLayer {
            kernel_w,
            kernel_h,
            kernel_d,
            input_w,
            input_h,
            input_d,
            num_feature_maps,
            activation,
            weights: vec![0.0; weight_count],
            biases: vec![0.0; num_feature_maps],
        }
    }

    fn weight_index(&self, fm: usize, a: usize, b: usize, c: usize) -> usize {
        ((fm * self.kernel_w + a) * self.kernel_h + b) * self.kernel_d + c
    }

    pub fn output_width(&self) -> usize {
        self.input_w - self.kernel_w + 1
    }

    pub fn output_height(&self) -> usize {
        self.input_h - self.kernel_h + 1
    }

    pub fn num_feature_maps(&self) -> usize {
        self.num_feature_maps
    }

    pub fn input_width(&self) -> usize {
        self.input_w
    }

    pub fn input_height(&self) -> usize {
        self.input_h
    }

    pub fn input_depth(&self) -> usize {
        self.input_d
    }

    pub fn input_size(&self) -> usize {
        self.input_w * self.input_h * self.input_d
    }

    /// Draw kernel weights from a standard normal distribution scaled by
    /// 1/sqrt(kernelW * kernelH * kernelD); one unscaled bias per feature
    /// map, drawn after that map's weights.
    pub fn init_weights(&mut self, rng: &mut SimpleRng) {
        let scale = 1.0 / ((self.kernel_w * self.kernel_h * self.kernel_d) as f32).sqrt();
        for fm in 0..self.num_feature_maps {
            for a in 0..self.kernel_w {
                for b in 0..self.kernel_h {
                    for c in 0..self.kernel_d {
                        let i = self.weight_index(fm, a, b, c);
                        self.weights[i] = rng.next_gaussian() * scale;
                    }
                }
            }
            self.biases[fm] = rng.next_gaussian();
        }
    }

    /// Convolve every output neuron's receptive field against its feature
    /// map's kernel, add the feature-map bias and apply the activation.
    pub fn feed_forward(&self, prev: &LayerScratch, own: &mut LayerScratch) {
        let (out_w, out_h) = (self.output_width(), self.output_height());
        for fm in 0..self.num_feature_maps {
            for y in 0..out_h {
                for x in 0..out_w {
                    let mut z = 0.0;
                    for a in 0..self.kernel_w {
                        for b in 0..self.kernel_h {
                            for c in 0..self.kernel_d {
                                let input = prev.activations
                                    [flat_index(x + a, y + b, c, self.input_w, self.input_h)];
                                z += input * self.weights[self.weight_index(fm, a, b, c)];
                            }
                        }
                    }
                    z += self.biases[fm];
                    let i = flat_index(x, y, fm, out_w, out_h);
                    own.weighted_inputs[i] = z;
                    own.activations[i] = self.activation.compute(z);
                }
            }
        }
    }

    /// This layer's error from the successor's propagated error, times the
    /// activation derivative. `successor_error` receives the neuron's
    /// (x, y, featureMap) coordinate and its flat index; the caller bridges
    /// to the successor's indexing scheme.
    pub fn compute_errors<F>(&self, own: &mut LayerScratch, successor_error: F)
    where
        F: Fn(usize, usize, usize, usize) -> f32,
    {
        let (out_w, out_h) = (self.output_width(), self.output_height());
        for fm in 0..self.num_feature_maps {
            for y in 0..out_h {
                for x in 0..out_w {
                    let i = flat_index(x, y, fm, out_w, out_h);
                    own.errors[i] = successor_error(x, y, fm, i)
                        * self.activation.derivative(own.weighted_inputs[i]);
                }
            }
        }
    }

    /// Error components for every predecessor voxel: the correlation of
    /// this layer's error with the un-flipped kernel, summed over feature
    /// maps, with kernel offsets clipped to the output grid.
    pub fn calc_bwd_error(&self, own: &mut LayerScratch) {
        let (out_w, out_h) = (self.output_width(), self.output_height());
        for z in 0..self.input_d {
            for y in 0..self.input_h {
                for x in 0..self.input_w {
                    let mut error = 0.0;
                    for fm in 0..self.num_feature_maps {
                        for a in 0..self.kernel_w {
                            for b in 0..self.kernel_h {
                                if a <= x && b <= y && x - a < out_w && y - b < out_h {
                                    let neuron_error =
                                        own.errors[flat_index(x - a, y - b, fm, out_w, out_h)];
                                    error += self.weights[self.weight_index(fm, a, b, z)]
                                        * neuron_error;
                                }
                            }
                        }
                    }
                    own.bwd_errors[flat_index(x, y, z, self.input_w, self.input_h)] = error;
                }
            }
        }
    }

    /// Apply the accumulated gradient for one mini-batch.
    ///
    /// The gradient of a kernel weight sums the product of receptive-field
    /// activation and output error over every output position and every
    /// slot, scaled by rate/mbSize; weights shrink by the L2 decay factor
    /// before the subtraction. The per-feature-map bias gradient sums the
    /// errors the same way, without decay.
    pub fn end_batch(
        &mut self,
        slots: &[SampleScratch],
        own_idx: usize,
        learning_rate: f32,
        lambda: f32,
        num_training_samples: usize,
    ) {
        let (out_w, out_h) = (self.output_width(), self.output_height());
        let mb_size = slots.len() as f32;
        let decay = 1.0 - learning_rate * (lambda / num_training_samples as f32);
        for fm in 0..self.num_feature_maps {
            for a in 0..self.kernel_w {
                for b in 0..self.kernel_h {
                    for c in 0..self.kernel_d {
                        let mut weight_delta = 0.0;
                        for slot in slots {
                            let prev = &slot.layers[own_idx - 1];
                            let own = &slot.layers[own_idx];
                            for y in 0..out_h {
                                for x in 0..out_w {
                                    let input = prev.activations[flat_index(
                                        x + a,
                                        y + b,
                                        c,
                                        self.input_w,
                                        self.input_h,
                                    )];
                                    weight_delta +=
                                        input * own.errors[flat_index(x, y, fm, out_w, out_h)];
                                }
                            }
                        }
                        weight_delta *= learning_rate / mb_size;
                        let i = self.weight_index(fm, a, b, c);
                        self.weights[i] *= decay;
                        self.weights[i] -= weight_delta;
                    }
                }
            }
            let mut bias_delta = 0.0;
            for slot in slots {
                let own = &slot.layers[own_idx];
                for y in 0..out_h {
                    for x in 0..out_w {
                        bias_delta += own.errors[flat_index(x, y, fm, out_w, out_h)];
                    }
                }
            }
            bias_delta *= learning_rate / mb_size;
            self.biases[fm] -= bias_delta;
        }
    }

    pub fn size(&self) -> usize {
        self.output_width() * self.output_height() * self.num_feature_maps
    }

    pub fn num_dims(&self) -> usize {
        3
    }

    /// Per-axis size: output width, output height, then feature maps as z.
    pub fn dim(&self, i: usize) -> usize {
        match i {
            0 => self.output_width(),
            1 => self.output_height(),
            2 => self.num_feature_maps,
            _ => panic!("convolutional layer dimension {} out of range", i),
        }
    }

    pub fn scratch(&self) -> LayerScratch {
        LayerScratch::trainable(self.size(), self.input_size())
    }

    /// Kernel weight for feature map `fm` at offset (a, b, c).
    pub fn weight(&self, fm: usize, a: usize, b: usize, c: usize) -> f32 {
        self.check_weight_bounds(fm, a, b, c);
        self.weights[self.weight_index(fm, a, b, c)]
    }

    pub fn set_weight(&mut self, fm: usize, a: usize, b: usize, c: usize, value: f32) {
        self.check_weight_bounds(fm, a, b, c);
        let i = self.weight_index(fm, a, b, c);
        self.weights[i] = value;
    }

    pub fn bias(&self, fm: usize) -> f32 {
        assert!(fm < self.num_feature_maps, "feature map index out of range");
        self.biases[fm]
    }

    pub fn set_bias(&mut self, fm: usize, value: f32) {
        assert!(fm < self.num_feature_maps, "feature map index out of range");
        self.biases[fm] = value;
    }

    fn check_weight_bounds(&self, fm: usize, a: usize, b: usize, c: usize) {
        assert!(fm < self.num_feature_maps, "feature map index out of range");
        assert!(
            a < self.kernel_w && b < self.kernel_h && c < self.kernel_d,
            "kernel offset out of range"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_shape() {
        let layer = ConvLayer::new(5, 5, 1, 20, 28, 28, 1, Activation::Sigmoid);
        assert_eq!(layer.output_width(), 24);
        assert_eq!(layer.output_height(), 24);
        assert_eq!(layer.size(), 24 * 24 * 20);
        assert_eq!(layer.dim(0), 24);
        assert_eq!(layer.dim(1), 24);
        assert_eq!(layer.dim(2), 20);
    }

    #[test]
    #[should_panic(expected = "kernel depth must match input depth")]
    fn test_kernel_depth_mismatch() {
        ConvLayer::new(3, 3, 2, 4, 28, 28, 1, Activation::Sigmoid);
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn test_oversized_kernel() {
        ConvLayer::new(9, 9, 1, 4, 8, 8, 1, Activation::Sigmoid);
    }

    #[test]
    fn test_constant_input_uniform_preactivation() {
        // A 3x3 all-ones kernel with zero bias over a constant plane gives
        // a uniform weighted input of 9 * value everywhere.
        let mut layer = ConvLayer::new(3, 3, 1, 1, 5, 5, 1, Activation::Sigmoid);
        for a in 0..3 {
            for b in 0..3 {
                layer.set_weight(0, a, b, 0, 1.0);
            }
        }
        layer.set_bias(0, 0.0);

        let mut prev = LayerScratch::activations_only(25);
        prev.activations.iter_mut().for_each(|a| *a = 0.5);
        let mut own = layer.scratch();

        layer.feed_forward(&prev, &mut own);

        for &z in &own.weighted_inputs {
            assert!((z - 4.5).abs() < 1e-5);
        }
    }

    #[test]
    fn test_deterministic_initialization() {
        let mut layer1 = ConvLayer::new(3, 3, 1, 2, 6, 6, 1, Activation::Relu);
        let mut layer2 = ConvLayer::new(3, 3, 1, 2, 6, 6, 1, Activation::Relu);
        layer1.init_weights(&mut SimpleRng::new(5));
        layer2.init_weights(&mut SimpleRng::new(5));

        for fm in 0..2 {
            for a in 0..3 {
                for b in 0..3 {
                    assert_eq!(
                        layer1.weight(fm, a, b, 0).to_bits(),
                        layer2.weight(fm, a, b, 0).to_bits()
                    );
                }
            }
            assert_eq!(layer1.bias(fm).to_bits(), layer2.bias(fm).to_bits());
        }
    }
}
