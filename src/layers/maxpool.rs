//! Max-pooling layer: fixed-window downsampling with no parameters.
//!
//! The output grid is (inputW / poolW) x (inputH / poolH) per depth slice;
//! both input dimensions must divide exactly. The layer computes no weighted
//! inputs and no errors. In the backward direction it is a pure pass-through:
//! when a predecessor asks for an error component, the request is forwarded
//! to this layer's own successor at the downsampled coordinate. The error is
//! not masked to the arg-max position of the window.

use crate::layers::scratch::{LayerScratch, SampleScratch};
use crate::utils::SimpleRng;

pub struct MaxPoolLayer {
    pool_w: usize,
    pool_h: usize,
    input_w: usize,
    input_h: usize,
    input_d: usize,
}

impl MaxPoolLayer {
    /// Create a pooling layer with window `pool_w` x `pool_h` over an
    /// `input_w` x `input_h` x `input_d` volume.
    ///
    /// # Panics
    ///
    /// Panics unless both input dimensions are exact multiples of the pool
    /// window (construction-time contract).
    pub fn new(pool_w: usize, pool_h: usize, input_w: usize, input_h: usize, input_d: usize) -> Self {
        assert!(pool_w > 0 && pool_h > 0, "pool window must be non-zero");
        assert!(
            input_w % pool_w == 0,
            "input width is not divisible by the pool width"
        );
        assert!(
            input_h % pool_h == 0,
            "input height is not divisible by the pool height"
        );
        MaxPoolLayer {
            pool_w,
            pool_h,
            input_w,
            input_h,
            input_d,
        }
    }

    pub fn pool_width(&self) -> usize {
        self.pool_w
    }

    pub fn pool_height(&self) -> usize {
        self.pool_h
    }

    pub fn output_width(&self) -> usize {
        self.input_w / self.pool_w
    }

    pub fn output_height(&self) -> usize {
        self.input_h / self.pool_h
    }

    pub fn input_size(&self) -> usize {
        self.input_w * self.input_h * self.input_d
    }

    /// Nothing to initialize.
    pub fn init_weights(&mut self, _rng: &mut SimpleRng) {}

    /// Each output activation is the maximum predecessor activation within
    /// its pool window. No weighted input and no activation function.
    pub fn feed_forward(&self, prev: &LayerScratch, own: &mut LayerScratch) {
        use crate::layers::geometry::flat_index;
        let (out_w, out_h) = (self.output_width(), self.output_height());
        for z in 0..self.input_d {
            for y in 0..out_h {
                for x in 0..out_w {
                    let mut max = f32::NEG_INFINITY;
                    for b in 0..self.pool_h {
                        for a in 0..self.pool_w {
                            let input = prev.activations[flat_index(
                                x * self.pool_w + a,
                                y * self.pool_h + b,
                                z,
                                self.input_w,
                                self.input_h,
                            )];
                            if input > max {
                                max = input;
                            }
                        }
                    }
                    own.activations[flat_index(x, y, z, out_w, out_h)] = max;
                }
            }
        }
    }

    /// Downsampled coordinate a predecessor query at (x, y, z) maps to.
    pub fn pooled_coord(&self, x: usize, y: usize, z: usize) -> (usize, usize, usize) {
        (x / self.pool_w, y / self.pool_h, z)
    }

    pub fn size(&self) -> usize {
        self.output_width() * self.output_height() * self.input_d
    }

    pub fn num_dims(&self) -> usize {
        3
    }

    pub fn dim(&self, i: usize) -> usize {
        match i {
            0 => self.output_width(),
            1 => self.output_height(),
            2 => self.input_d,
            _ => panic!("max-pooling layer dimension {} out of range", i),
        }
    }

    pub fn scratch(&self) -> LayerScratch {
        LayerScratch::activations_only(self.size())
    }

    /// No parameters to update.
    pub fn end_batch(
        &mut self,
        _slots: &[SampleScratch],
        _own_idx: usize,
        _learning_rate: f32,
        _lambda: f32,
        _num_training_samples: usize,
    ) {
    }
}
