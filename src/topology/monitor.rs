//! Monitors recording state variables and spikes during a simulation.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::SNNError;

/// Records named variables of chosen neurons (or synapses) at every time step.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct StateMonitor {
    variables: Vec<String>,
    indices: Vec<usize>,
    times: Vec<f64>,
    /// For each variable, one row of values per recorded time step.
    values: BTreeMap<String, Vec<Vec<f64>>>,
}

impl StateMonitor {
    pub fn new(variables: Vec<String>, indices: Vec<usize>) -> Self {
        let values = variables
            .iter()
            .map(|name| (name.clone(), vec![]))
            .collect();
        StateMonitor {
            variables,
            indices,
            times: vec![],
            values,
        }
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// The indices of the recorded neurons or synapses.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Returns the recorded rows of a variable, one per time step.
    pub fn values(&self, variable: &str) -> Option<&[Vec<f64>]> {
        self.values.get(variable).map(|rows| rows.as_slice())
    }

    /// Record one row per variable at time `t`, in the order of [`Self::variables`].
    pub(crate) fn record(&mut self, t: f64, rows: Vec<Vec<f64>>) {
        self.times.push(t);
        for (name, row) in self.variables.iter().zip(rows) {
            if let Some(recorded) = self.values.get_mut(name) {
                recorded.push(row);
            }
        }
    }
}

/// Records the spikes of a layer.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SpikeMonitor {
    /// Spiking neuron of each recorded spike.
    indices: Vec<usize>,
    /// Time of each recorded spike.
    times: Vec<f64>,
    counts: Vec<usize>,
}

impl SpikeMonitor {
    pub fn new(num_neurons: usize) -> Self {
        SpikeMonitor {
            indices: vec![],
            times: vec![],
            counts: vec![0; num_neurons],
        }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Returns the number of spikes of every neuron.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Returns the number of recorded spikes.
    pub fn num_spikes(&self) -> usize {
        self.indices.len()
    }

    pub(crate) fn record(&mut self, t: f64, spikes: &[usize]) {
        for &i in spikes {
            self.indices.push(i);
            self.times.push(t);
            self.counts[i] += 1;
        }
    }
}

/// The monitors attached to one layer or connection.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Monitor {
    /// Name of the monitored layer or connection.
    source: String,
    state: Option<StateMonitor>,
    spikes: Option<SpikeMonitor>,
}

impl Monitor {
    pub fn new(source: &str, state: Option<StateMonitor>, spikes: Option<SpikeMonitor>) -> Self {
        Monitor {
            source: source.to_string(),
            state,
            spikes,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn state(&self) -> Option<&StateMonitor> {
        self.state.as_ref()
    }

    pub(crate) fn state_mut(&mut self) -> Option<&mut StateMonitor> {
        self.state.as_mut()
    }

    pub fn spikes(&self) -> Option<&SpikeMonitor> {
        self.spikes.as_ref()
    }

    pub(crate) fn spikes_mut(&mut self) -> Option<&mut SpikeMonitor> {
        self.spikes.as_mut()
    }

    /// Returns the spike counts of the monitored layer, or an empty slice for a connection.
    pub fn spike_counts(&self) -> &[usize] {
        self.spikes
            .as_ref()
            .map(|spikes| spikes.counts())
            .unwrap_or(&[])
    }

    /// Overwrite the recorded data with that of a copy taken from this monitor.
    pub(crate) fn rewind(&mut self, saved: &Monitor) {
        self.state.clone_from(&saved.state);
        self.spikes.clone_from(&saved.spikes);
    }

    /// Save the recorded data to a JSON file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        let file = File::create(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self).map_err(|e| SNNError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| SNNError::IOError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_monitor_record() {
        let mut monitor = StateMonitor::new(vec!["s".to_string(), "c".to_string()], vec![0]);
        monitor.record(0.0, vec![vec![1.0], vec![2.0]]);
        monitor.record(0.1, vec![vec![3.0], vec![4.0]]);
        assert_eq!(monitor.times(), &[0.0, 0.1]);
        assert_eq!(monitor.values("s"), Some(&[vec![1.0], vec![3.0]][..]));
        assert_eq!(monitor.values("c"), Some(&[vec![2.0], vec![4.0]][..]));
        assert_eq!(monitor.values("d"), None);
    }

    #[test]
    fn test_spike_monitor_record() {
        let mut monitor = SpikeMonitor::new(3);
        monitor.record(1.0, &[0, 2]);
        monitor.record(2.0, &[2]);
        assert_eq!(monitor.counts(), &[1, 0, 2]);
        assert_eq!(monitor.indices(), &[0, 2, 2]);
        assert_eq!(monitor.times(), &[1.0, 1.0, 2.0]);
        assert_eq!(monitor.num_spikes(), 3);
    }

    #[test]
    fn test_monitor_rewind() {
        let mut monitor = Monitor::new("layer", None, Some(SpikeMonitor::new(2)));
        let saved = monitor.clone();
        if let Some(spikes) = monitor.spikes_mut() {
            spikes.record(0.5, &[1]);
        }
        assert_eq!(monitor.spike_counts(), &[0, 1]);
        monitor.rewind(&saved);
        assert_eq!(monitor.spike_counts(), &[0, 0]);
        assert_eq!(monitor.source(), "layer");

        let connection_monitor = Monitor::new("connection", None, None);
        assert!(connection_monitor.spike_counts().is_empty());
    }
}
