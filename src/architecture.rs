//! Architecture configuration structures.
//!
//! Defines a network layer stack via JSON configuration files, enabling
//! topology experimentation without code changes. The builder tracks the
//! shape flowing through the chain, so convolutional and pooling layers
//! derive their input volume from the preceding layer instead of repeating
//! it in the file.

use serde::Deserialize;
use std::error::Error;
use std::fs;

use crate::config::TrainingParams;
use crate::layers::{ConvLayer, FullyConnectedLayer, InputLayer, Layer, MaxPoolLayer, SoftMaxLayer};
use crate::network::Network;
use crate::utils::{Activation, Cost};

/// Configuration for a single layer in the stack.
///
/// Different layer types require different fields:
///
/// - **fully_connected**: `layer_size`, optional `activation`
///   ("sigmoid" or "relu", default sigmoid)
/// - **conv**: `kernel_width`, `kernel_height`, `num_feature_maps`,
///   optional `activation`; the kernel depth follows the incoming volume
/// - **maxpool**: `pool_width`, `pool_height`
/// - **softmax**: `layer_size`, optional `cost`
///   ("cross_entropy" or "quadratic", default cross_entropy)
#[derive(Debug, Clone, Deserialize)]
pub struct LayerSpec {
    /// Type of layer: "fully_connected", "conv", "maxpool" or "softmax".
    pub layer_type: String,

    /// Neuron count for fully-connected and softmax layers.
    pub layer_size: Option<usize>,

    /// Activation function for trainable hidden layers.
    pub activation: Option<String>,

    /// Cost function for the softmax layer.
    pub cost: Option<String>,

    /// Kernel width for conv layers.
    pub kernel_width: Option<usize>,

    /// Kernel height for conv layers.
    pub kernel_height: Option<usize>,

    /// Feature map count for conv layers.
    pub num_feature_maps: Option<usize>,

    /// Pool window width for maxpool layers.
    pub pool_width: Option<usize>,

    /// Pool window height for maxpool layers.
    pub pool_height: Option<usize>,
}

/// Configuration for the entire layer stack.
///
/// # Example
///
/// ```json
/// {
///   "input_width": 28,
///   "input_height": 28,
///   "layers": [
///     { "layer_type": "conv", "kernel_width": 5, "kernel_height": 5,
///       "num_feature_maps": 20, "activation": "sigmoid" },
///     { "layer_type": "maxpool", "pool_width": 2, "pool_height": 2 },
///     { "layer_type": "fully_connected", "layer_size": 100 },
///     { "layer_type": "softmax", "layer_size": 10 }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ArchitectureSpec {
    /// Width of the input image grid.
    pub input_width: usize,

    /// Height of the input image grid.
    pub input_height: usize,

    /// Layer stack in chain order; the last entry must be a softmax layer.
    pub layers: Vec<LayerSpec>,
}

fn invalid(message: String) -> Box<dyn Error> {
    Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message,
    ))
}

/// Loads an architecture from a JSON file and validates it.
pub fn load_architecture(path: &str) -> Result<ArchitectureSpec, Box<dyn Error>> {
    let contents = fs::read_to_string(path)?;
    let spec: ArchitectureSpec = serde_json::from_str(&contents)?;
    validate_architecture(&spec)?;
    Ok(spec)
}

/// Shape flowing between layers while validating or building a stack.
enum FlowShape {
    Volume(usize, usize, usize),
    Flat(usize),
}

fn parse_activation(spec: &LayerSpec, index: usize) -> Result<Activation, Box<dyn Error>> {
    match spec.activation.as_deref() {
        None | Some("sigmoid") => Ok(Activation::Sigmoid),
        Some("relu") => Ok(Activation::Relu),
        Some(other) => Err(invalid(format!(
            "layer {}: invalid activation '{}', must be one of: sigmoid, relu",
            index, other
        ))),
    }
}

fn parse_cost(spec: &LayerSpec, index: usize) -> Result<Cost, Box<dyn Error>> {
    match spec.cost.as_deref() {
        None | Some("cross_entropy") => Ok(Cost::CrossEntropy),
        Some("quadratic") => Ok(Cost::Quadratic),
        Some(other) => Err(invalid(format!(
            "layer {}: invalid cost '{}', must be one of: cross_entropy, quadratic",
            index, other
        ))),
    }
}

fn require(field: Option<usize>, name: &str, index: usize) -> Result<usize, Box<dyn Error>> {
    let value = field.ok_or_else(|| {
        invalid(format!(
            "layer {}: missing required field '{}'",
            index, name
        ))
    })?;
    if value == 0 {
        return Err(invalid(format!(
            "layer {}: '{}' must be greater than 0",
            index, name
        )));
    }
    Ok(value)
}

/// Walk the stack once, checking per-layer fields and the shape each layer
/// hands to the next. Returns the flat output size of the last layer.
fn check_stack(spec: &ArchitectureSpec) -> Result<usize, Box<dyn Error>> {
    if spec.input_width == 0 || spec.input_height == 0 {
        return Err(invalid("input dimensions must be non-zero".to_string()));
    }
    if spec.layers.is_empty() {
        return Err(invalid("architecture must have at least one layer".to_string()));
    }
    match spec.layers.last().map(|l| l.layer_type.as_str()) {
        Some("softmax") => {}
        _ => {
            return Err(invalid(
                "the last layer of the stack must be a softmax layer".to_string(),
            ));
        }
    }

    let mut shape = FlowShape::Volume(spec.input_width, spec.input_height, 1);
    for (i, layer) in spec.layers.iter().enumerate() {
        shape = match layer.layer_type.as_str() {
            "fully_connected" => {
                let size = require(layer.layer_size, "layer_size", i)?;
                parse_activation(layer, i)?;
                FlowShape::Flat(size)
            }
            "conv" => {
                let kernel_w = require(layer.kernel_width, "kernel_width", i)?;
                let kernel_h = require(layer.kernel_height, "kernel_height", i)?;
                let num_fms = require(layer.num_feature_maps, "num_feature_maps", i)?;
                parse_activation(layer, i)?;
                let FlowShape::Volume(w, h, _) = shape else {
                    return Err(invalid(format!(
                        "layer {}: a conv layer cannot follow a 1D layer",
                        i
                    )));
                };
                if kernel_w > w || kernel_h > h {
                    return Err(invalid(format!(
                        "layer {}: kernel {}x{} does not fit input {}x{}",
                        i, kernel_w, kernel_h, w, h
                    )));
                }
                FlowShape::Volume(w - kernel_w + 1, h - kernel_h + 1, num_fms)
            }
            "maxpool" => {
                let pool_w = require(layer.pool_width, "pool_width", i)?;
                let pool_h = require(layer.pool_height, "pool_height", i)?;
                let FlowShape::Volume(w, h, d) = shape else {
                    return Err(invalid(format!(
                        "layer {}: a maxpool layer cannot follow a 1D layer",
                        i
                    )));
                };
                if w % pool_w != 0 || h % pool_h != 0 {
                    return Err(invalid(format!(
                        "layer {}: input {}x{} is not divisible by pool window {}x{}",
                        i, w, h, pool_w, pool_h
                    )));
                }
                FlowShape::Volume(w / pool_w, h / pool_h, d)
            }
            "softmax" => {
                if i != spec.layers.len() - 1 {
                    return Err(invalid(format!(
                        "layer {}: softmax must be the last layer of the stack",
                        i
                    )));
                }
                let size = require(layer.layer_size, "layer_size", i)?;
                parse_cost(layer, i)?;
                FlowShape::Flat(size)
            }
            other => {
                return Err(invalid(format!(
                    "layer {}: invalid layer type '{}', must be one of: \
                     fully_connected, conv, maxpool, softmax",
                    i, other
                )));
            }
        };
    }
    Ok(match shape {
        FlowShape::Flat(n) => n,
        FlowShape::Volume(w, h, d) => w * h * d,
    })
}

/// Validates an architecture specification.
pub fn validate_architecture(spec: &ArchitectureSpec) -> Result<(), Box<dyn Error>> {
    check_stack(spec).map(|_| ())
}

/// Builds a network from an architecture specification and training
/// parameters. Weights are initialized by the network from `params.seed`.
pub fn build_network(
    spec: &ArchitectureSpec,
    params: TrainingParams,
) -> Result<Network, Box<dyn Error>> {
    check_stack(spec)?;

    let input = InputLayer::new(spec.input_width, spec.input_height);
    let mut hidden = Vec::new();
    let mut output = None;
    let mut shape = FlowShape::Volume(spec.input_width, spec.input_height, 1);

    for (i, layer) in spec.layers.iter().enumerate() {
        let flat = match &shape {
            FlowShape::Volume(w, h, d) => w * h * d,
            FlowShape::Flat(n) => *n,
        };
        match layer.layer_type.as_str() {
            "fully_connected" => {
                let size = require(layer.layer_size, "layer_size", i)?;
                let activation = parse_activation(layer, i)?;
                hidden.push(Layer::FullyConnected(FullyConnectedLayer::new(
                    size, flat, activation,
                )));
                shape = FlowShape::Flat(size);
            }
            "conv" => {
                let kernel_w = require(layer.kernel_width, "kernel_width", i)?;
                let kernel_h = require(layer.kernel_height, "kernel_height", i)?;
                let num_fms = require(layer.num_feature_maps, "num_feature_maps", i)?;
                let activation = parse_activation(layer, i)?;
                let FlowShape::Volume(w, h, d) = shape else {
                    unreachable!("check_stack rejects conv after a 1D layer");
                };
                hidden.push(Layer::Conv(ConvLayer::new(
                    kernel_w, kernel_h, d, num_fms, w, h, d, activation,
                )));
                shape = FlowShape::Volume(w - kernel_w + 1, h - kernel_h + 1, num_fms);
            }
            "maxpool" => {
                let pool_w = require(layer.pool_width, "pool_width", i)?;
                let pool_h = require(layer.pool_height, "pool_height", i)?;
                let FlowShape::Volume(w, h, d) = shape else {
                    unreachable!("check_stack rejects maxpool after a 1D layer");
                };
                hidden.push(Layer::MaxPool(MaxPoolLayer::new(pool_w, pool_h, w, h, d)));
                shape = FlowShape::Volume(w / pool_w, h / pool_h, d);
            }
            "softmax" => {
                let size = require(layer.layer_size, "layer_size", i)?;
                let cost = parse_cost(layer, i)?;
                output = Some(SoftMaxLayer::new(size, flat, cost));
                shape = FlowShape::Flat(size);
            }
            _ => unreachable!("check_stack rejects unknown layer types"),
        }
    }

    let output = output.expect("check_stack guarantees a softmax tail");
    Network::new(params, input, hidden, output)
}
