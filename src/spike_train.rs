//! Spike train encoding and decoding, and input waveforms.
use rand::Rng;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};

use crate::error::SNNError;

/// Convert a binary spike train (one flag per time step) into spike times.
/// Every flag equal to 1 at position `idx` produces a spike at `idx * dt`, so the returned times are sorted.
///
/// # Examples
///
/// ```
/// use rusty_stdp::spike_train::spike_train_to_times;
///
/// let times = spike_train_to_times(&[0, 1, 1, 0, 1], 2.0);
/// assert_eq!(times, vec![2.0, 4.0, 8.0]);
/// ```
pub fn spike_train_to_times(spike_train: &[u8], dt: f64) -> Vec<f64> {
    spike_train
        .iter()
        .enumerate()
        .filter(|(_, &flag)| flag == 1)
        .map(|(idx, _)| idx as f64 * dt)
        .collect()
}

/// A time-indexed current (in nA) sampled at a fixed resolution.
/// Past the last sample, the waveform holds its last value.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CurrentWaveform {
    values: Vec<f64>,
    dt: f64,
}

impl CurrentWaveform {
    /// Create a waveform from samples taken every `dt` ms.
    pub fn build(values: Vec<f64>, dt: f64) -> Result<Self, SNNError> {
        if !(dt > 0.0 && dt.is_finite()) {
            return Err(SNNError::InvalidParameters(
                "Waveform resolution must be positive and finite".to_string(),
            ));
        }
        if values.is_empty() {
            return Err(SNNError::InvalidParameters(
                "Waveform must contain at least one sample".to_string(),
            ));
        }
        Ok(CurrentWaveform { values, dt })
    }

    /// Create a waveform sampled at 1 ms.
    pub fn from_millis(values: Vec<f64>) -> Result<Self, SNNError> {
        Self::build(values, 1.0)
    }

    /// Returns the current at time `t` (in ms).
    pub fn at(&self, t: f64) -> f64 {
        let idx = (t / self.dt).floor();
        if idx <= 0.0 {
            return self.values[0];
        }
        let idx = (idx as usize).min(self.values.len() - 1);
        self.values[idx]
    }

    /// Returns the samples of the waveform.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Returns the sampling resolution of the waveform.
    pub fn dt(&self) -> f64 {
        self.dt
    }
}

/// Returns a 1 ms step current equal to `amplitude` on `[t_start, t_end]` and zero elsewhere.
/// With `append_zero`, an extra zero sample terminates the waveform so the current vanishes after `t_end`.
pub fn step_current(
    t_start: usize,
    t_end: usize,
    amplitude: f64,
    append_zero: bool,
) -> Result<CurrentWaveform, SNNError> {
    if t_start > t_end {
        return Err(SNNError::InvalidParameters(format!(
            "Step start {} is after step end {}",
            t_start, t_end
        )));
    }
    let mut size = 1 + t_end;
    if append_zero {
        size += 1;
    }
    let mut values = vec![0.0; size];
    values[t_start..=t_end].fill(amplitude);
    CurrentWaveform::from_millis(values)
}

/// Sample spike times (in ms) from a homogeneous Poisson process with the given rate (in Hz) on `[start, end)`.
pub fn random_spike_train<R: Rng>(
    rate: f64,
    start: f64,
    end: f64,
    rng: &mut R,
) -> Result<Vec<f64>, SNNError> {
    if start > end {
        return Err(SNNError::InvalidParameters(
            "Spike train start must not exceed its end".to_string(),
        ));
    }
    if rate == 0.0 {
        return Ok(vec![]);
    }
    // Inter-spike intervals in ms
    let isi = Exp::new(rate / 1000.0).map_err(|e| {
        SNNError::InvalidParameters(format!("Invalid firing rate {}: {}", rate, e))
    })?;

    let mut times = vec![];
    let mut t = start + isi.sample(rng);
    while t < end {
        times.push(t);
        t += isi.sample(rng);
    }
    Ok(times)
}

/// Returns the average firing rate (in Hz) of spike times observed on `[start, end)` (in ms).
pub fn average_spike_rate(times: &[f64], start: f64, end: f64) -> Result<f64, SNNError> {
    if end <= start {
        return Err(SNNError::InvalidParameters(
            "Observation window must have a positive duration".to_string(),
        ));
    }
    let count = times.iter().filter(|&&t| t >= start && t < end).count();
    Ok(count as f64 / (end - start) * 1000.0)
}
