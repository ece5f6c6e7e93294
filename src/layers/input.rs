//! Input layer: the activation source for the first trainable layer.
//!
//! Holds one neuron per pixel in a fixed 2D grid of depth 1. It has no
//! weights and performs no computation of its own; `set_sample` copies a
//! flattened pixel buffer into a slot's activation array and every other
//! layer operation is a composition-contract violation.

use crate::layers::scratch::LayerScratch;

/// Parameter-free image layer at the head of the chain.
pub struct InputLayer {
    width: usize,
    height: usize,
}

impl InputLayer {
    /// Create an input layer for `width` x `height` images (depth 1).
    pub fn new(width: usize, height: usize) -> Self {
        assert!(width > 0 && height > 0, "input dimensions must be non-zero");
        InputLayer { width, height }
    }

    /// Copy one flattened image into the slot's activation array.
    ///
    /// The buffer is row-major, so pixel `i` lands at (x = i mod W,
    /// y = i div W, z = 0), which is exactly the canonical flat order.
    ///
    /// # Panics
    ///
    /// Panics if the buffer length does not match the neuron count.
    pub fn set_sample(&self, pixels: &[f32], own: &mut LayerScratch) {
        assert_eq!(
            pixels.len(),
            self.size(),
            "sample size does not match input layer size"
        );
        own.activations.copy_from_slice(pixels);
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn size(&self) -> usize {
        self.width * self.height
    }

    pub fn num_dims(&self) -> usize {
        3
    }

    /// Per-axis size: width, height, then a depth of 1.
    pub fn dim(&self, i: usize) -> usize {
        match i {
            0 => self.width,
            1 => self.height,
            2 => 1,
            _ => panic!("input layer dimension {} out of range", i),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_layer_shape() {
        let layer = InputLayer::new(28, 28);
        assert_eq!(layer.size(), 784);
        assert_eq!(layer.num_dims(), 3);
        assert_eq!(layer.dim(0), 28);
        assert_eq!(layer.dim(1), 28);
        assert_eq!(layer.dim(2), 1);
    }

    #[test]
    fn test_set_sample_copies_pixels() {
        let layer = InputLayer::new(2, 2);
        let mut scratch = LayerScratch::activations_only(4);
        layer.set_sample(&[0.1, 0.2, 0.3, 0.4], &mut scratch);
        assert_eq!(scratch.activations, vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    #[should_panic(expected = "sample size does not match")]
    fn test_set_sample_rejects_wrong_length() {
        let layer = InputLayer::new(2, 2);
        let mut scratch = LayerScratch::activations_only(4);
        layer.set_sample(&[0.1, 0.2, 0.3], &mut scratch);
    }
}
