//! Feed-forward neural network training engine.
//!
//! This library trains networks built from heterogeneous layer types
//! (input, fully-connected, convolutional, max-pooling, softmax-output)
//! composed into a linear chain, using mini-batch stochastic gradient
//! descent with hand-derived backpropagation. The samples of a mini-batch
//! are processed in parallel over disjoint per-sample scratch slots.
//!
//! # Modules
//!
//! - `layers`: layer types, scratch storage and coordinate bridging
//! - `network`: the orchestrator (wiring, passes, SGD epochs, evaluation)
//! - `data`: in-memory dataset partitions with deterministic shuffling
//! - `config`: training hyperparameter bundle
//! - `architecture`: layer-stack configuration and network building
//! - `utils`: RNG, activation and cost strategies

pub mod architecture;
pub mod config;
pub mod data;
pub mod layers;
pub mod network;
pub mod utils;
