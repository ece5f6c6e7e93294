//! Per-sample scratch state for forward and backward passes.
//!
//! Every neuron carries a weighted input, an activation and an error per
//! concurrently-processed sample. Storage is slot-major: each mini-batch slot
//! owns one `LayerScratch` per layer, flat-indexed by neuron. Handing each
//! worker a `&mut SampleScratch` makes the slots disjoint by construction,
//! so the parallel phase of a mini-batch needs no locking while the weight
//! tensors are read shared.

/// Scratch arrays for one layer within one mini-batch slot.
///
/// Arrays a layer variant never writes are left empty (the input layer has
/// no weighted inputs or errors, the max-pooling layer only activations).
/// `bwd_errors` holds the error components this layer propagates for its
/// predecessor, so it is sized to the predecessor's neuron count.
#[derive(Clone, Debug, Default)]
pub struct LayerScratch {
    pub weighted_inputs: Vec<f32>,
    pub activations: Vec<f32>,
    pub errors: Vec<f32>,
    pub bwd_errors: Vec<f32>,
}

impl LayerScratch {
    /// Scratch with only activation storage (input and pooling layers).
    pub fn activations_only(size: usize) -> Self {
        LayerScratch {
            weighted_inputs: Vec::new(),
            activations: vec![0.0; size],
            errors: Vec::new(),
            bwd_errors: Vec::new(),
        }
    }

    /// Scratch for a trainable layer of `size` neurons whose predecessor
    /// has `prev_size` neurons.
    pub fn trainable(size: usize, prev_size: usize) -> Self {
        LayerScratch {
            weighted_inputs: vec![0.0; size],
            activations: vec![0.0; size],
            errors: vec![0.0; size],
            bwd_errors: vec![0.0; prev_size],
        }
    }
}

/// All per-layer scratch owned by one mini-batch slot.
#[derive(Clone, Debug)]
pub struct SampleScratch {
    pub layers: Vec<LayerScratch>,
}
