//! Layer types and the capability surface shared between them.
//!
//! The network is a linear chain over a closed set of layer variants, so the
//! chain is modeled as a sum type rather than trait objects: every operation
//! dispatches over the fixed variant set, and a variant that cannot support
//! an operation fails fast with a panic. That covers composition-contract
//! violations such as feeding forward through the input layer or asking a
//! volumetric layer for a flat error lookup.
//!
//! Layers of different dimensionality interoperate through the canonical
//! flat ordering in [`geometry`]: a 1D successor is queried by flat index,
//! a 3D successor by (x, y, z).

pub mod conv;
pub mod fully_connected;
pub mod geometry;
pub mod input;
pub mod maxpool;
pub mod scratch;
pub mod softmax;

pub use conv::ConvLayer;
pub use fully_connected::FullyConnectedLayer;
pub use input::InputLayer;
pub use maxpool::MaxPoolLayer;
pub use scratch::{LayerScratch, SampleScratch};
pub use softmax::SoftMaxLayer;

use crate::utils::SimpleRng;
use geometry::flat_index;

/// One layer of the network chain.
pub enum Layer {
    Input(InputLayer),
    FullyConnected(FullyConnectedLayer),
    Conv(ConvLayer),
    MaxPool(MaxPoolLayer),
    SoftMax(SoftMaxLayer),
}

impl Layer {
    /// Variant name for contract-violation messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Layer::Input(_) => "input",
            Layer::FullyConnected(_) => "fully-connected",
            Layer::Conv(_) => "convolutional",
            Layer::MaxPool(_) => "max-pooling",
            Layer::SoftMax(_) => "softmax",
        }
    }

    /// Total neuron count.
    pub fn size(&self) -> usize {
        match self {
            Layer::Input(l) => l.size(),
            Layer::FullyConnected(l) => l.size(),
            Layer::Conv(l) => l.size(),
            Layer::MaxPool(l) => l.size(),
            Layer::SoftMax(l) => l.size(),
        }
    }

    /// Number of dimensions the layer exposes (1 or 3).
    pub fn num_dims(&self) -> usize {
        match self {
            Layer::Input(l) => l.num_dims(),
            Layer::FullyConnected(l) => l.num_dims(),
            Layer::Conv(l) => l.num_dims(),
            Layer::MaxPool(l) => l.num_dims(),
            Layer::SoftMax(l) => l.num_dims(),
        }
    }

    /// Per-axis size.
    pub fn dim(&self, i: usize) -> usize {
        match self {
            Layer::Input(l) => l.dim(i),
            Layer::FullyConnected(l) => l.dim(i),
            Layer::Conv(l) => l.dim(i),
            Layer::MaxPool(l) => l.dim(i),
            Layer::SoftMax(l) => l.dim(i),
        }
    }

    /// Declared size of the predecessor this layer expects, if it reads one.
    pub fn declared_input_size(&self) -> Option<usize> {
        match self {
            Layer::Input(_) => None,
            Layer::FullyConnected(l) => Some(l.prev_size()),
            Layer::Conv(l) => Some(l.input_size()),
            Layer::MaxPool(l) => Some(l.input_size()),
            Layer::SoftMax(l) => Some(l.prev_size()),
        }
    }

    /// Allocate this layer's scratch arrays for one mini-batch slot.
    pub fn scratch(&self) -> LayerScratch {
        match self {
            Layer::Input(l) => LayerScratch::activations_only(l.size()),
            Layer::FullyConnected(l) => l.scratch(),
            Layer::Conv(l) => l.scratch(),
            Layer::MaxPool(l) => l.scratch(),
            Layer::SoftMax(l) => l.scratch(),
        }
    }

    /// Initialize weights and biases from the network's seeded generator.
    pub fn init_weights(&mut self, rng: &mut SimpleRng) {
        match self {
            Layer::Input(_) => panic!("input layer has no weights to initialize"),
            Layer::FullyConnected(l) => l.init_weights(rng),
            Layer::Conv(l) => l.init_weights(rng),
            Layer::MaxPool(l) => l.init_weights(rng),
            Layer::SoftMax(l) => l.init_weights(rng),
        }
    }

    /// Forward pass for one slot, reading the predecessor's activations.
    pub fn feed_forward(&self, prev: &LayerScratch, own: &mut LayerScratch) {
        match self {
            Layer::Input(_) => panic!("input layer does not feed forward"),
            Layer::FullyConnected(l) => l.feed_forward(prev, own),
            Layer::Conv(l) => l.feed_forward(prev, own),
            Layer::MaxPool(l) => l.feed_forward(prev, own),
            Layer::SoftMax(l) => l.feed_forward(prev, own),
        }
    }

    /// Compute this layer's errors from the successor chain's propagated
    /// error. `succ_layers`/`succ_scratch` are the chain suffix starting at
    /// the immediate successor.
    pub fn compute_errors(
        &self,
        own: &mut LayerScratch,
        succ_layers: &[Layer],
        succ_scratch: &[LayerScratch],
    ) {
        match self {
            Layer::Input(_) => panic!("input layer does not backpropagate"),
            Layer::SoftMax(_) => {
                panic!("softmax layer has no successor; seed its error from the cost instead")
            }
            Layer::MaxPool(_) => {} // no errors of its own; pass-through
            Layer::FullyConnected(l) => {
                l.compute_errors(own, |j| successor_error_flat(succ_layers, succ_scratch, j));
            }
            Layer::Conv(l) => {
                let successor_is_1d = succ_layers
                    .first()
                    .unwrap_or_else(|| panic!("convolutional layer has no successor"))
                    .num_dims()
                    == 1;
                l.compute_errors(own, |x, y, fm, flat| {
                    if successor_is_1d {
                        successor_error_flat(succ_layers, succ_scratch, flat)
                    } else {
                        successor_error_volume(succ_layers, succ_scratch, x, y, fm)
                    }
                });
            }
        }
    }

    /// Produce the error components the predecessor will read.
    pub fn calc_bwd_error(&self, own: &mut LayerScratch) {
        match self {
            Layer::Input(_) => panic!("input layer does not propagate errors"),
            Layer::FullyConnected(l) => l.calc_bwd_error(own),
            Layer::Conv(l) => l.calc_bwd_error(own),
            Layer::MaxPool(_) => {} // forwards lookups instead of storing a buffer
            Layer::SoftMax(l) => l.calc_bwd_error(own),
        }
    }

    /// Apply the gradient accumulated over one mini-batch.
    pub fn end_batch(
        &mut self,
        slots: &[SampleScratch],
        own_idx: usize,
        learning_rate: f32,
        lambda: f32,
        num_training_samples: usize,
    ) {
        match self {
            Layer::Input(_) => panic!("input layer has no parameters to update"),
            Layer::FullyConnected(l) => {
                l.end_batch(slots, own_idx, learning_rate, lambda, num_training_samples)
            }
            Layer::Conv(l) => {
                l.end_batch(slots, own_idx, learning_rate, lambda, num_training_samples)
            }
            Layer::MaxPool(l) => {
                l.end_batch(slots, own_idx, learning_rate, lambda, num_training_samples)
            }
            Layer::SoftMax(l) => {
                l.end_batch(slots, own_idx, learning_rate, lambda, num_training_samples)
            }
        }
    }
}

/// Read the propagated error for predecessor neuron `index` from a 1D
/// successor. `chain`/`scratch` are the successor suffix of the layer chain.
///
/// # Panics
///
/// Panics if the immediate successor cannot answer a flat lookup (a 1D
/// layer never precedes a convolutional or pooling layer).
pub fn successor_error_flat(chain: &[Layer], scratch: &[LayerScratch], index: usize) -> f32 {
    match &chain[0] {
        Layer::FullyConnected(_) | Layer::SoftMax(_) => scratch[0].bwd_errors[index],
        other => panic!(
            "{} layer cannot answer a flat backward-error lookup",
            other.kind()
        ),
    }
}

/// Read the propagated error for the predecessor neuron at (x, y, z) from a
/// volumetric successor. Max-pooling layers forward the request to their own
/// successor at the downsampled coordinate, bridging to a flat index when
/// that successor is 1D.
pub fn successor_error_volume(
    chain: &[Layer],
    scratch: &[LayerScratch],
    x: usize,
    y: usize,
    z: usize,
) -> f32 {
    match &chain[0] {
        Layer::Conv(l) => {
            scratch[0].bwd_errors[flat_index(x, y, z, l.input_width(), l.input_height())]
        }
        Layer::MaxPool(l) => {
            let (px, py, pz) = l.pooled_coord(x, y, z);
            let (next_layers, next_scratch) = (&chain[1..], &scratch[1..]);
            assert!(
                !next_layers.is_empty(),
                "max-pooling layer has no successor to forward the error request to"
            );
            if next_layers[0].num_dims() == 1 {
                let flat = flat_index(px, py, pz, l.output_width(), l.output_height());
                successor_error_flat(next_layers, next_scratch, flat)
            } else {
                successor_error_volume(next_layers, next_scratch, px, py, pz)
            }
        }
        other => panic!(
            "{} layer cannot answer a coordinate backward-error lookup",
            other.kind()
        ),
    }
}
