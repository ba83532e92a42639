//! Labeled spike train datasets.
use itertools::Itertools;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::ops::Index;
use std::path::Path;

use crate::error::SNNError;

/// A binary spike train (one flag per time step) with its class label.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Example {
    pub spikes: Vec<u8>,
    pub label: usize,
}

/// An indexable collection of labeled spike trains.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    examples: Vec<Example>,
}

impl Dataset {
    pub fn new(examples: Vec<Example>) -> Self {
        Dataset { examples }
    }

    /// Sample `num_examples` spike trains of `len` steps, where every flag is set with probability `p`,
    /// and labels are drawn uniformly in `0..num_labels`.
    pub fn rand<R: Rng>(
        num_examples: usize,
        len: usize,
        num_labels: usize,
        p: f64,
        rng: &mut R,
    ) -> Result<Self, SNNError> {
        if !(0.0..=1.0).contains(&p) {
            return Err(SNNError::InvalidParameters(
                "Spike probability must be in [0, 1]".to_string(),
            ));
        }
        if num_labels == 0 {
            return Err(SNNError::InvalidParameters(
                "A dataset needs at least one label".to_string(),
            ));
        }

        let examples = (0..num_examples)
            .map(|_| Example {
                spikes: (0..len).map(|_| rng.gen_bool(p) as u8).collect(),
                label: rng.gen_range(0..num_labels),
            })
            .collect();
        Ok(Dataset { examples })
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Example> + '_ {
        self.examples.iter()
    }

    pub fn push(&mut self, example: Example) {
        self.examples.push(example);
    }

    /// Returns the distinct labels of the dataset, in increasing order.
    pub fn labels(&self) -> Vec<usize> {
        self.examples
            .iter()
            .map(|example| example.label)
            .unique()
            .sorted()
            .collect()
    }

    /// Save the dataset to a JSON file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        let file = File::create(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(|e| SNNError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| SNNError::IOError(e.to_string()))
    }

    /// Load a dataset from a JSON file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SNNError> {
        let file = File::open(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| SNNError::IOError(e.to_string()))
    }
}

impl Index<usize> for Dataset {
    type Output = Example;

    fn index(&self, index: usize) -> &Self::Output {
        &self.examples[index]
    }
}

impl From<Vec<Example>> for Dataset {
    fn from(examples: Vec<Example>) -> Self {
        Dataset { examples }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use tempfile::NamedTempFile;

    #[test]
    fn test_dataset_rand() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let dataset = Dataset::rand(20, 300, 3, 2.0 / 3.0, &mut rng).unwrap();
        assert_eq!(dataset.len(), 20);
        assert!(dataset.iter().all(|example| example.spikes.len() == 300));
        assert!(dataset
            .iter()
            .all(|example| example.spikes.iter().all(|&flag| flag <= 1)));
        assert!(dataset.labels().iter().all(|&label| label < 3));

        assert!(Dataset::rand(1, 10, 2, 1.5, &mut rng).is_err());
        assert!(Dataset::rand(1, 10, 0, 0.5, &mut rng).is_err());
    }

    #[test]
    fn test_dataset_labels() {
        let dataset = Dataset::from(vec![
            Example { spikes: vec![1], label: 7 },
            Example { spikes: vec![0], label: 2 },
            Example { spikes: vec![1, 1], label: 7 },
        ]);
        assert_eq!(dataset.labels(), vec![2, 7]);
        assert_eq!(dataset[2].spikes, vec![1, 1]);
        assert!(Dataset::default().labels().is_empty());
    }

    #[test]
    fn test_dataset_save_load() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let dataset = Dataset::rand(5, 30, 2, 0.5, &mut rng).unwrap();
        let file = NamedTempFile::new().unwrap();
        dataset.save_to(file.path()).unwrap();
        assert_eq!(Dataset::load_from(file.path()).unwrap(), dataset);

        assert!(matches!(
            Dataset::load_from("/nonexistent/dataset.json"),
            Err(SNNError::IOError(_))
        ));
    }
}
