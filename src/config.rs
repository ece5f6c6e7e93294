//! Training configuration.
//!
//! A plain value bundle read once at network construction: the orchestrator
//! never mutates it, and the hyperparameters are threaded from here into
//! every layer's end-of-batch update. Parses from JSON for experiment files.

use serde::Deserialize;
use std::error::Error;
use std::fs;

fn default_monitor_interval() -> usize {
    1000
}

/// Hyperparameters and monitoring toggles for one training run.
///
/// # Example
///
/// ```json
/// {
///   "learning_rate": 0.03,
///   "lambda": 0.1,
///   "mini_batch_size": 10,
///   "num_epochs": 60,
///   "seed": 1,
///   "monitor_interval": 1000,
///   "monitor_evaluation_accuracy": true
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingParams {
    /// Step size for the gradient update.
    pub learning_rate: f32,

    /// L2 weight-decay coefficient.
    pub lambda: f32,

    /// Number of samples processed concurrently per parameter update.
    pub mini_batch_size: usize,

    /// Number of passes over the training partition.
    pub num_epochs: usize,

    /// Seed for the shared weight-initialization and shuffle generator.
    pub seed: u64,

    /// Interval, in training images processed, between monitoring reports.
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval: usize,

    /// Report classification accuracy on the validation partition.
    #[serde(default)]
    pub monitor_evaluation_accuracy: bool,

    /// Report total cost on the validation partition.
    #[serde(default)]
    pub monitor_evaluation_cost: bool,

    /// Report classification accuracy on the training partition.
    #[serde(default)]
    pub monitor_training_accuracy: bool,

    /// Report total cost on the training partition.
    #[serde(default)]
    pub monitor_training_cost: bool,
}

/// Loads training parameters from a JSON file.
///
/// # Returns
///
/// `Ok(TrainingParams)` on success, or an error if the file cannot be read,
/// the JSON is invalid or a parameter is out of range.
pub fn load_params(path: &str) -> Result<TrainingParams, Box<dyn Error>> {
    let contents = fs::read_to_string(path)?;
    let params: TrainingParams = serde_json::from_str(&contents)?;
    validate_params(&params)?;
    Ok(params)
}

fn invalid(message: &str) -> Box<dyn Error> {
    Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        message.to_string(),
    ))
}

/// Validates parameter ranges.
pub fn validate_params(params: &TrainingParams) -> Result<(), Box<dyn Error>> {
    if params.learning_rate <= 0.0 {
        return Err(invalid("learning_rate must be positive"));
    }
    if params.lambda < 0.0 {
        return Err(invalid("lambda must be non-negative"));
    }
    if params.mini_batch_size == 0 {
        return Err(invalid("mini_batch_size must be greater than 0"));
    }
    if params.monitor_interval == 0 {
        return Err(invalid("monitor_interval must be greater than 0"));
    }
    Ok(())
}
