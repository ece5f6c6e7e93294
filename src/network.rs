//! Network orchestrator: layer wiring, forward/backward passes, mini-batch
//! parallel execution, SGD epochs and evaluation.
//!
//! The orchestrator is the only component aware of the full chain order. It
//! owns every layer and all per-slot scratch storage. During the parallel
//! phase of a mini-batch the weight tensors are read shared while each rayon
//! worker holds exclusive access to one slot's scratch; `end_batch` runs
//! strictly after the fan-out joins, which is the sole concurrency
//! invariant the engine relies on.

use rayon::prelude::*;
use std::error::Error;
use std::io::{self, Write};
use std::time::Instant;

use crate::config::TrainingParams;
use crate::data::Dataset;
use crate::layers::{InputLayer, Layer, SampleScratch, SoftMaxLayer};
use crate::utils::SimpleRng;

/// A feed-forward network: an input layer at the head, hidden layers in
/// chain order and a softmax output layer at the tail.
pub struct Network {
    params: TrainingParams,
    layers: Vec<Layer>,
    slots: Vec<SampleScratch>,
    rng: SimpleRng,
}

fn chain_error(message: String) -> Box<dyn Error> {
    Box::new(io::Error::new(io::ErrorKind::InvalidData, message))
}

impl Network {
    /// Wire the chain, validate every layer's declared input size against
    /// its predecessor's neuron count and initialize all weights from one
    /// generator seeded with `params.seed`.
    ///
    /// # Errors
    ///
    /// Returns an error on any shape mismatch between adjacent layers, on
    /// an input or softmax layer appearing among the hidden layers, or on
    /// a zero mini-batch size.
    pub fn new(
        params: TrainingParams,
        input: InputLayer,
        hidden: Vec<Layer>,
        output: SoftMaxLayer,
    ) -> Result<Network, Box<dyn Error>> {
        if params.mini_batch_size == 0 {
            return Err(chain_error("mini-batch size must be non-zero".to_string()));
        }

        let mut layers = Vec::with_capacity(hidden.len() + 2);
        layers.push(Layer::Input(input));
        for (i, layer) in hidden.into_iter().enumerate() {
            match layer {
                Layer::Input(_) => {
                    return Err(chain_error(format!(
                        "hidden layer {}: input layer can only appear at the head of the chain",
                        i
                    )));
                }
                Layer::SoftMax(_) => {
                    return Err(chain_error(format!(
                        "hidden layer {}: softmax layer can only appear at the tail of the chain",
                        i
                    )));
                }
                other => layers.push(other),
            }
        }
        layers.push(Layer::SoftMax(output));

        for i in 1..layers.len() {
            let declared = layers[i]
                .declared_input_size()
                .expect("non-input layers declare an input size");
            let actual = layers[i - 1].size();
            if declared != actual {
                return Err(chain_error(format!(
                    "layer {} ({}) declares input size {} but its predecessor ({}) has {} neurons",
                    i,
                    layers[i].kind(),
                    declared,
                    layers[i - 1].kind(),
                    actual
                )));
            }
        }

        let mut rng = SimpleRng::new(params.seed);
        for i in 1..layers.len() {
            layers[i].init_weights(&mut rng);
        }

        let slots = (0..params.mini_batch_size)
            .map(|_| SampleScratch {
                layers: layers.iter().map(Layer::scratch).collect(),
            })
            .collect();

        Ok(Network {
            params,
            layers,
            slots,
            rng,
        })
    }

    fn set_input(layers: &[Layer], slot: &mut SampleScratch, pixels: &[f32]) {
        match &layers[0] {
            Layer::Input(l) => l.set_sample(pixels, &mut slot.layers[0]),
            _ => panic!("first layer of the chain must be the input layer"),
        }
    }

    fn output_layer(layers: &[Layer]) -> &SoftMaxLayer {
        match layers.last() {
            Some(Layer::SoftMax(l)) => l,
            _ => panic!("last layer of the chain must be the softmax output layer"),
        }
    }

    /// Forward pass for one slot: every layer after the input, in chain
    /// order.
    fn feed_forward_slot(layers: &[Layer], slot: &mut SampleScratch) {
        for i in 1..layers.len() {
            let (prev_part, own_part) = slot.layers.split_at_mut(i);
            layers[i].feed_forward(&prev_part[i - 1], &mut own_part[0]);
        }
    }

    /// Full backward pass for one sample in one slot: set the input, feed
    /// forward, seed the output error from the cost, then walk the hidden
    /// layers from the last down to the first. Each hidden layer computes
    /// its own error and then the buffer its predecessor will read; the
    /// first layer after the input has nothing left to propagate to.
    fn backprop_sample(layers: &[Layer], slot: &mut SampleScratch, pixels: &[f32], label: u8) {
        Self::set_input(layers, slot, pixels);
        Self::feed_forward_slot(layers, slot);

        let last = layers.len() - 1;
        let softmax = Self::output_layer(layers);
        {
            let own = &mut slot.layers[last];
            softmax.compute_output_error(label, own);
            softmax.calc_bwd_error(own);
        }

        for i in (1..last).rev() {
            let (head, tail) = slot.layers.split_at_mut(i + 1);
            layers[i].compute_errors(&mut head[i], &layers[i + 1..], tail);
            if i > 1 {
                layers[i].calc_bwd_error(&mut head[i]);
            }
        }
    }

    /// Train on one mini-batch: fan the samples out over the worker pool,
    /// one full backward pass per sample into its private slot, then join
    /// and apply every layer's accumulated gradient in reverse chain order.
    ///
    /// # Panics
    ///
    /// Panics if the slice lengths do not match the configured mini-batch
    /// size.
    pub fn update_mini_batch(
        &mut self,
        images: &[Vec<f32>],
        labels: &[u8],
        num_training_samples: usize,
    ) {
        assert_eq!(
            images.len(),
            self.slots.len(),
            "mini-batch image count does not match the configured size"
        );
        assert_eq!(
            labels.len(),
            self.slots.len(),
            "mini-batch label count does not match the configured size"
        );

        let layers = &self.layers;
        self.slots
            .par_iter_mut()
            .enumerate()
            .for_each(|(mb, slot)| Self::backprop_sample(layers, slot, &images[mb], labels[mb]));

        // All workers have joined; weights may mutate now.
        let (learning_rate, lambda) = (self.params.learning_rate, self.params.lambda);
        for i in (1..self.layers.len()).rev() {
            self.layers[i].end_batch(
                &self.slots,
                i,
                learning_rate,
                lambda,
                num_training_samples,
            );
        }
    }

    /// Run one epoch per configured count: shuffle images and labels with
    /// one per-epoch seed, then train the full mini-batches in order.
    /// A tail shorter than one mini-batch is skipped.
    pub fn sgd(&mut self, data: &mut Dataset) {
        for epoch in 0..self.params.num_epochs {
            let epoch_start = Instant::now();

            let shuffle_seed = self.rng.next_u32() as u64;
            data.shuffle_training(shuffle_seed);

            let num_training = data.training_images().len();
            let mb_size = self.params.mini_batch_size;
            let full_batches_end = num_training - num_training % mb_size;

            for batch_start in (0..full_batches_end).step_by(mb_size) {
                let batch_timer = Instant::now();
                self.update_mini_batch(
                    &data.training_images()[batch_start..batch_start + mb_size],
                    &data.training_labels()[batch_start..batch_start + mb_size],
                    num_training,
                );
                let secs = batch_timer.elapsed().as_secs_f32().max(1e-9);
                print!(
                    "\rMinibatch {} / {} ({:.0} images/s)",
                    batch_start,
                    num_training,
                    mb_size as f32 / secs
                );
                io::stdout().flush().ok();

                if batch_start % self.params.monitor_interval == 0 {
                    self.monitor(data);
                }
            }
            println!();
            println!(
                "Epoch {} complete in {:.1} s.",
                epoch,
                epoch_start.elapsed().as_secs_f32()
            );
        }
    }

    /// Report the configured accuracy/cost figures. Pure side channel.
    fn monitor(&mut self, data: &Dataset) {
        if self.params.monitor_evaluation_accuracy {
            let correct =
                self.evaluate_accuracy(data.validation_images(), data.validation_labels());
            println!(
                "\nAccuracy on validation data: {} / {}",
                correct,
                data.validation_images().len()
            );
        }
        if self.params.monitor_evaluation_cost {
            let cost =
                self.evaluate_total_cost(data.validation_images(), data.validation_labels());
            println!("\nCost on validation data: {}", cost);
        }
        if self.params.monitor_training_accuracy {
            let correct = self.evaluate_accuracy(data.training_images(), data.training_labels());
            println!(
                "\nAccuracy on training data: {} / {}",
                correct,
                data.training_images().len()
            );
        }
        if self.params.monitor_training_cost {
            let cost = self.evaluate_total_cost(data.training_images(), data.training_labels());
            println!("\nCost on training data: {}", cost);
        }
    }

    /// Count correct argmax classifications over a dataset, processed in
    /// chunks of up to one mini-batch with one worker per slot.
    pub fn evaluate_accuracy(&mut self, images: &[Vec<f32>], labels: &[u8]) -> usize {
        assert_eq!(images.len(), labels.len(), "image/label count mismatch");
        let mut correct = 0;
        let mb_size = self.slots.len();
        for start in (0..images.len()).step_by(mb_size) {
            let count = (images.len() - start).min(mb_size);
            let layers = &self.layers;
            let chunk = &mut self.slots[..count];
            correct += chunk
                .par_iter_mut()
                .enumerate()
                .map(|(j, slot)| {
                    Self::set_input(layers, slot, &images[start + j]);
                    Self::feed_forward_slot(layers, slot);
                    let predicted =
                        Self::output_layer(layers).read_output(&slot.layers[layers.len() - 1]);
                    usize::from(predicted == labels[start + j] as usize)
                })
                .sum::<usize>();
        }
        correct
    }

    /// Total cost over a dataset: the per-sample cost scaled by the set
    /// size, plus the L2 term computed from the output layer's sum of
    /// squared weights, reduced by summation across slots.
    pub fn evaluate_total_cost(&mut self, images: &[Vec<f32>], labels: &[u8]) -> f32 {
        assert_eq!(images.len(), labels.len(), "image/label count mismatch");
        let num_images = images.len();
        let regularization = 0.5 * (self.params.lambda / num_images as f32)
            * Self::output_layer(&self.layers).sum_squared_weights();
        let mut cost = 0.0;
        let mb_size = self.slots.len();
        for start in (0..num_images).step_by(mb_size) {
            let count = (num_images - start).min(mb_size);
            let layers = &self.layers;
            let chunk = &mut self.slots[..count];
            cost += chunk
                .par_iter_mut()
                .enumerate()
                .map(|(j, slot)| {
                    Self::set_input(layers, slot, &images[start + j]);
                    Self::feed_forward_slot(layers, slot);
                    let sample_cost = Self::output_layer(layers)
                        .compute_output_cost(labels[start + j], &slot.layers[layers.len() - 1]);
                    sample_cost / num_images as f32 + regularization
                })
                .sum::<f32>();
        }
        cost
    }

    /// Forward one sample through slot 0 and return the output activations.
    pub fn forward(&mut self, pixels: &[f32]) -> Vec<f32> {
        let layers = &self.layers;
        let slot = &mut self.slots[0];
        Self::set_input(layers, slot, pixels);
        Self::feed_forward_slot(layers, slot);
        slot.layers[layers.len() - 1].activations.clone()
    }

    /// Forward one sample and return the argmax class.
    pub fn classify(&mut self, pixels: &[f32]) -> usize {
        let layers = &self.layers;
        let slot = &mut self.slots[0];
        Self::set_input(layers, slot, pixels);
        Self::feed_forward_slot(layers, slot);
        Self::output_layer(layers).read_output(&slot.layers[layers.len() - 1])
    }

    /// Forward one sample and return its cost (no regularization term).
    pub fn sample_cost(&mut self, pixels: &[f32], label: u8) -> f32 {
        let layers = &self.layers;
        let slot = &mut self.slots[0];
        Self::set_input(layers, slot, pixels);
        Self::feed_forward_slot(layers, slot);
        Self::output_layer(layers).compute_output_cost(label, &slot.layers[layers.len() - 1])
    }

    /// Sum of squared weights of the output layer, as used by the L2 term
    /// of the reported loss.
    pub fn sum_squared_weights(&self) -> f32 {
        Self::output_layer(&self.layers).sum_squared_weights()
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, i: usize) -> &Layer {
        &self.layers[i]
    }

    pub fn layer_mut(&mut self, i: usize) -> &mut Layer {
        &mut self.layers[i]
    }

    /// Read-only view of one mini-batch slot's scratch state.
    pub fn scratch(&self, slot: usize) -> &SampleScratch {
        &self.slots[slot]
    }

    pub fn params(&self) -> &TrainingParams {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::FullyConnectedLayer;
    use crate::utils::{Activation, Cost};

    fn small_params(mini_batch_size: usize) -> TrainingParams {
        TrainingParams {
            learning_rate: 0.5,
            lambda: 0.0,
            mini_batch_size,
            num_epochs: 1,
            seed: 42,
            monitor_interval: 1000,
            monitor_evaluation_accuracy: false,
            monitor_evaluation_cost: false,
            monitor_training_accuracy: false,
            monitor_training_cost: false,
        }
    }

    #[test]
    fn test_chain_wiring() {
        let network = Network::new(
            small_params(4),
            InputLayer::new(4, 4),
            vec![Layer::FullyConnected(FullyConnectedLayer::new(
                8,
                16,
                Activation::Sigmoid,
            ))],
            SoftMaxLayer::new(3, 8, Cost::CrossEntropy),
        )
        .unwrap();

        assert_eq!(network.num_layers(), 3);
        assert_eq!(network.layer(0).size(), 16);
        assert_eq!(network.layer(1).size(), 8);
        assert_eq!(network.layer(2).size(), 3);
    }

    #[test]
    fn test_chain_size_mismatch_is_rejected() {
        let result = Network::new(
            small_params(4),
            InputLayer::new(4, 4),
            vec![Layer::FullyConnected(FullyConnectedLayer::new(
                8,
                10, // input layer has 16 neurons
                Activation::Sigmoid,
            ))],
            SoftMaxLayer::new(3, 8, Cost::CrossEntropy),
        );

        let message = result.err().expect("mismatch must be rejected").to_string();
        assert!(message.contains("declares input size 10"));
    }

    #[test]
    fn test_softmax_in_hidden_position_is_rejected() {
        let result = Network::new(
            small_params(4),
            InputLayer::new(4, 4),
            vec![Layer::SoftMax(SoftMaxLayer::new(8, 16, Cost::CrossEntropy))],
            SoftMaxLayer::new(3, 8, Cost::CrossEntropy),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_mini_batch_is_rejected() {
        let result = Network::new(
            small_params(0),
            InputLayer::new(2, 2),
            Vec::new(),
            SoftMaxLayer::new(2, 4, Cost::CrossEntropy),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_scratch_allocated_per_slot() {
        let network = Network::new(
            small_params(3),
            InputLayer::new(2, 2),
            Vec::new(),
            SoftMaxLayer::new(2, 4, Cost::CrossEntropy),
        )
        .unwrap();

        for slot in 0..3 {
            let scratch = network.scratch(slot);
            assert_eq!(scratch.layers.len(), 2);
            assert_eq!(scratch.layers[0].activations.len(), 4);
            assert_eq!(scratch.layers[1].activations.len(), 2);
            assert_eq!(scratch.layers[1].bwd_errors.len(), 4);
        }
    }
}
