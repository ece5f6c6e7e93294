//! In-memory dataset collaborator.
//!
//! The engine consumes pre-decoded samples: flattened images with pixel
//! values already scaled to [0, 1] and one integer class label per image,
//! split into independent training/validation/test partitions. Decoding the
//! source files is outside the engine; this container only validates the
//! pairing and provides the in-place deterministic shuffle the SGD loop
//! needs.

use std::error::Error;
use std::io;

use crate::utils::SimpleRng;

/// Training, validation and test partitions with paired labels.
pub struct Dataset {
    training_images: Vec<Vec<f32>>,
    training_labels: Vec<u8>,
    validation_images: Vec<Vec<f32>>,
    validation_labels: Vec<u8>,
    test_images: Vec<Vec<f32>>,
    test_labels: Vec<u8>,
}

fn check_pairing(name: &str, images: &[Vec<f32>], labels: &[u8]) -> Result<(), Box<dyn Error>> {
    if images.len() != labels.len() {
        return Err(Box::new(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "{} partition has {} images but {} labels",
                name,
                images.len(),
                labels.len()
            ),
        )));
    }
    Ok(())
}

impl Dataset {
    /// Bundle the three partitions, validating that every partition pairs
    /// each image with exactly one label.
    pub fn new(
        training_images: Vec<Vec<f32>>,
        training_labels: Vec<u8>,
        validation_images: Vec<Vec<f32>>,
        validation_labels: Vec<u8>,
        test_images: Vec<Vec<f32>>,
        test_labels: Vec<u8>,
    ) -> Result<Dataset, Box<dyn Error>> {
        check_pairing("training", &training_images, &training_labels)?;
        check_pairing("validation", &validation_images, &validation_labels)?;
        check_pairing("test", &test_images, &test_labels)?;
        Ok(Dataset {
            training_images,
            training_labels,
            validation_images,
            validation_labels,
            test_images,
            test_labels,
        })
    }

    /// Shuffle the training partition in place with the identical
    /// permutation applied to images and labels, deterministic for a seed.
    pub fn shuffle_training(&mut self, seed: u64) {
        let mut rng = SimpleRng::new(seed);
        rng.shuffle_parallel(&mut self.training_images, &mut self.training_labels);
    }

    pub fn training_images(&self) -> &[Vec<f32>] {
        &self.training_images
    }

    pub fn training_labels(&self) -> &[u8] {
        &self.training_labels
    }

    pub fn validation_images(&self) -> &[Vec<f32>] {
        &self.validation_images
    }

    pub fn validation_labels(&self) -> &[u8] {
        &self.validation_labels
    }

    pub fn test_images(&self) -> &[Vec<f32>] {
        &self.test_images
    }

    pub fn test_labels(&self) -> &[u8] {
        &self.test_labels
    }
}
