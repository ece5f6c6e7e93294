// Tests for the JSON configuration surfaces: training parameters and
// architecture specifications.

use std::io::Write;
use tempfile::NamedTempFile;

use feedforward_nn::architecture::{build_network, load_architecture, validate_architecture};
use feedforward_nn::config::{load_params, validate_params, TrainingParams};

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_params() {
    let file = write_temp(
        r#"{
  "learning_rate": 0.03,
  "lambda": 0.1,
  "mini_batch_size": 10,
  "num_epochs": 60,
  "seed": 7,
  "monitor_interval": 5000,
  "monitor_evaluation_accuracy": true
}"#,
    );

    let params = load_params(file.path().to_str().unwrap()).unwrap();
    assert_eq!(params.learning_rate, 0.03);
    assert_eq!(params.lambda, 0.1);
    assert_eq!(params.mini_batch_size, 10);
    assert_eq!(params.num_epochs, 60);
    assert_eq!(params.seed, 7);
    assert_eq!(params.monitor_interval, 5000);
    assert!(params.monitor_evaluation_accuracy);
    assert!(!params.monitor_evaluation_cost);
    assert!(!params.monitor_training_accuracy);
    assert!(!params.monitor_training_cost);
}

#[test]
fn test_monitor_interval_defaults() {
    let file = write_temp(
        r#"{
  "learning_rate": 0.5,
  "lambda": 0.0,
  "mini_batch_size": 10,
  "num_epochs": 1,
  "seed": 1
}"#,
    );

    let params = load_params(file.path().to_str().unwrap()).unwrap();
    assert_eq!(params.monitor_interval, 1000);
}

#[test]
fn test_load_params_rejects_zero_mini_batch() {
    let file = write_temp(
        r#"{
  "learning_rate": 0.5,
  "lambda": 0.0,
  "mini_batch_size": 0,
  "num_epochs": 1,
  "seed": 1
}"#,
    );

    assert!(load_params(file.path().to_str().unwrap()).is_err());
}

#[test]
fn test_load_params_rejects_malformed_json() {
    let file = write_temp("{ not json");
    assert!(load_params(file.path().to_str().unwrap()).is_err());
}

#[test]
fn test_load_architecture_and_build() {
    let file = write_temp(
        r#"{
  "input_width": 12,
  "input_height": 12,
  "layers": [
    { "layer_type": "conv", "kernel_width": 5, "kernel_height": 5,
      "num_feature_maps": 4, "activation": "sigmoid" },
    { "layer_type": "maxpool", "pool_width": 2, "pool_height": 2 },
    { "layer_type": "fully_connected", "layer_size": 20 },
    { "layer_type": "softmax", "layer_size": 10, "cost": "cross_entropy" }
  ]
}"#,
    );

    let spec = load_architecture(file.path().to_str().unwrap()).unwrap();
    assert_eq!(spec.layers.len(), 4);

    let params = TrainingParams {
        learning_rate: 0.1,
        lambda: 0.0,
        mini_batch_size: 4,
        num_epochs: 1,
        seed: 11,
        monitor_interval: 1000,
        monitor_evaluation_accuracy: false,
        monitor_evaluation_cost: false,
        monitor_training_accuracy: false,
        monitor_training_cost: false,
    };
    let network = build_network(&spec, params).unwrap();

    // input 12x12 -> conv 8x8x4 -> pool 4x4x4 -> fc 20 -> softmax 10
    assert_eq!(network.num_layers(), 5);
    assert_eq!(network.layer(1).size(), 8 * 8 * 4);
    assert_eq!(network.layer(2).size(), 4 * 4 * 4);
    assert_eq!(network.layer(3).size(), 20);
    assert_eq!(network.layer(4).size(), 10);
}

#[test]
fn test_architecture_requires_softmax_tail() {
    let file = write_temp(
        r#"{
  "input_width": 4,
  "input_height": 4,
  "layers": [
    { "layer_type": "fully_connected", "layer_size": 8 }
  ]
}"#,
    );

    let error = load_architecture(file.path().to_str().unwrap())
        .err()
        .unwrap()
        .to_string();
    assert!(error.contains("softmax"));
}

#[test]
fn test_architecture_rejects_bad_activation() {
    let file = write_temp(
        r#"{
  "input_width": 4,
  "input_height": 4,
  "layers": [
    { "layer_type": "fully_connected", "layer_size": 8, "activation": "tanh" },
    { "layer_type": "softmax", "layer_size": 2 }
  ]
}"#,
    );

    let error = load_architecture(file.path().to_str().unwrap())
        .err()
        .unwrap()
        .to_string();
    assert!(error.contains("invalid activation"));
}

#[test]
fn test_validate_params_ranges() {
    let mut params = TrainingParams {
        learning_rate: 0.1,
        lambda: 0.0,
        mini_batch_size: 10,
        num_epochs: 1,
        seed: 0,
        monitor_interval: 100,
        monitor_evaluation_accuracy: false,
        monitor_evaluation_cost: false,
        monitor_training_accuracy: false,
        monitor_training_cost: false,
    };
    assert!(validate_params(&params).is_ok());

    params.learning_rate = 0.0;
    assert!(validate_params(&params).is_err());
    params.learning_rate = 0.1;

    params.lambda = -0.5;
    assert!(validate_params(&params).is_err());
    params.lambda = 0.0;

    params.monitor_interval = 0;
    assert!(validate_params(&params).is_err());
}

#[test]
fn test_architecture_validation_matches_load() {
    let file = write_temp(
        r#"{
  "input_width": 9,
  "input_height": 9,
  "layers": [
    { "layer_type": "maxpool", "pool_width": 2, "pool_height": 2 },
    { "layer_type": "softmax", "layer_size": 2 }
  ]
}"#,
    );

    // 9 is not divisible by 2: both the loader and the standalone
    // validator must reject the stack.
    let result = load_architecture(file.path().to_str().unwrap());
    assert!(result.is_err());

    let raw = std::fs::read_to_string(file.path()).unwrap();
    let spec = serde_json::from_str(&raw).unwrap();
    assert!(validate_architecture(&spec).is_err());
}
