// Tests for the forward pass: determinism, softmax normalization, max-pool
// window maxima and the convolution arithmetic on a constant input.

use approx::assert_relative_eq;
use feedforward_nn::config::TrainingParams;
use feedforward_nn::layers::geometry::flat_index;
use feedforward_nn::layers::{
    ConvLayer, FullyConnectedLayer, InputLayer, Layer, MaxPoolLayer, SoftMaxLayer,
};
use feedforward_nn::network::Network;
use feedforward_nn::utils::{Activation, Cost, SimpleRng};

fn params(mini_batch_size: usize, seed: u64) -> TrainingParams {
    TrainingParams {
        learning_rate: 0.1,
        lambda: 0.0,
        mini_batch_size,
        num_epochs: 1,
        seed,
        monitor_interval: 1000,
        monitor_evaluation_accuracy: false,
        monitor_evaluation_cost: false,
        monitor_training_accuracy: false,
        monitor_training_cost: false,
    }
}

fn random_pixels(count: usize, seed: u64) -> Vec<f32> {
    let mut rng = SimpleRng::new(seed);
    (0..count).map(|_| rng.next_f32()).collect()
}

fn small_mlp(seed: u64) -> Network {
    Network::new(
        params(2, seed),
        InputLayer::new(4, 4),
        vec![Layer::FullyConnected(FullyConnectedLayer::new(
            8,
            16,
            Activation::Sigmoid,
        ))],
        SoftMaxLayer::new(3, 8, Cost::CrossEntropy),
    )
    .unwrap()
}

#[test]
fn test_forward_is_deterministic() {
    let mut network = small_mlp(42);
    let pixels = random_pixels(16, 9);

    let first = network.forward(&pixels);
    let second = network.forward(&pixels);

    assert_eq!(first, second);
}

#[test]
fn test_same_seed_gives_identical_networks() {
    let mut first = small_mlp(7);
    let mut second = small_mlp(7);
    let pixels = random_pixels(16, 11);

    assert_eq!(first.forward(&pixels), second.forward(&pixels));
}

#[test]
fn test_different_seeds_give_different_networks() {
    let mut first = small_mlp(7);
    let mut second = small_mlp(8);
    let pixels = random_pixels(16, 11);

    assert_ne!(first.forward(&pixels), second.forward(&pixels));
}

#[test]
fn test_softmax_outputs_sum_to_one() {
    let mut network = small_mlp(42);
    for seed in 1..6 {
        let outputs = network.forward(&random_pixels(16, seed));
        let sum: f32 = outputs.iter().sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-5);
        assert!(outputs.iter().all(|a| *a >= 0.0));
    }
}

#[test]
fn test_softmax_stable_for_extreme_weighted_inputs() {
    // Saturated weights push the weighted inputs to the hundreds; the
    // normalization must stay finite and sum to one regardless.
    let mut network = Network::new(
        params(1, 1),
        InputLayer::new(2, 2),
        Vec::new(),
        SoftMaxLayer::new(3, 4, Cost::CrossEntropy),
    )
    .unwrap();
    let Layer::SoftMax(softmax) = network.layer_mut(1) else {
        panic!("tail must be softmax");
    };
    for j in 0..3 {
        for i in 0..4 {
            softmax.set_weight(j, i, if j == 0 { 300.0 } else { -300.0 });
        }
        softmax.set_bias(j, 0.0);
    }

    let outputs = network.forward(&[1.0, 1.0, 1.0, 1.0]);
    let sum: f32 = outputs.iter().sum();
    assert!(outputs.iter().all(|a| a.is_finite()));
    assert_relative_eq!(sum, 1.0, epsilon = 1e-5);
    assert!(outputs[0] > 0.99);
}

#[test]
fn test_classify_is_argmax_of_forward() {
    let mut network = small_mlp(13);
    let pixels = random_pixels(16, 5);
    let outputs = network.forward(&pixels);
    let argmax = outputs
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .unwrap()
        .0;
    assert_eq!(network.classify(&pixels), argmax);
}

#[test]
fn test_maxpool_activation_equals_window_maximum() {
    // input 4x4 -> pool 2x2 -> softmax; the pool output must equal the
    // maximum over its window and therefore never exceed it.
    let mut network = Network::new(
        params(1, 3),
        InputLayer::new(4, 4),
        vec![Layer::MaxPool(MaxPoolLayer::new(2, 2, 4, 4, 1))],
        SoftMaxLayer::new(2, 4, Cost::CrossEntropy),
    )
    .unwrap();
    let pixels = random_pixels(16, 21);
    network.forward(&pixels);

    let pool_scratch = &network.scratch(0).layers[1];
    for y in 0..2 {
        for x in 0..2 {
            let mut window_max = f32::NEG_INFINITY;
            for b in 0..2 {
                for a in 0..2 {
                    let value = pixels[flat_index(2 * x + a, 2 * y + b, 0, 4, 4)];
                    window_max = window_max.max(value);
                }
            }
            assert_eq!(
                pool_scratch.activations[flat_index(x, y, 0, 2, 2)],
                window_max
            );
        }
    }
}

#[test]
fn test_constant_plane_through_all_ones_kernel() {
    // A single 3x3x1 kernel of all-ones weights and zero bias over a 5x5
    // constant plane yields a uniform pre-activation of 9 * value.
    let value = 0.3f32;
    let mut network = Network::new(
        params(1, 5),
        InputLayer::new(5, 5),
        vec![Layer::Conv(ConvLayer::new(
            3,
            3,
            1,
            1,
            5,
            5,
            1,
            Activation::Sigmoid,
        ))],
        SoftMaxLayer::new(2, 9, Cost::CrossEntropy),
    )
    .unwrap();
    let Layer::Conv(conv) = network.layer_mut(1) else {
        panic!("hidden layer must be conv");
    };
    for a in 0..3 {
        for b in 0..3 {
            conv.set_weight(0, a, b, 0, 1.0);
        }
    }
    conv.set_bias(0, 0.0);

    network.forward(&vec![value; 25]);

    let conv_scratch = &network.scratch(0).layers[1];
    assert_eq!(conv_scratch.weighted_inputs.len(), 9);
    for &z in &conv_scratch.weighted_inputs {
        assert_relative_eq!(z, 9.0 * value, epsilon = 1e-5);
    }
}

#[test]
#[should_panic(expected = "sample size does not match")]
fn test_forward_rejects_wrong_pixel_count() {
    let mut network = small_mlp(42);
    network.forward(&[0.0; 15]);
}
