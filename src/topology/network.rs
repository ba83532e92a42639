//! Network container: registration of layers and connections, simulation loop, checkpoints and training.
use itertools::Itertools;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::dataset::Dataset;
use crate::error::SNNError;
use crate::neuron::{Population, PopulationState};
use crate::spike_train::spike_train_to_times;
use crate::synapse::SynapsesState;
use crate::topology::connection::Connection;
use crate::topology::layer::Layer;
use crate::topology::monitor::{Monitor, SpikeMonitor, StateMonitor};
use crate::DEFAULT_TIME_STEP;

/// Resolution of the binary spike trains of a dataset, in ms.
pub const TRAINING_SPIKE_RESOLUTION: f64 = 1.0;

/// Simulation settings of a network.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Integration time step, in ms.
    pub dt: f64,
    /// Seed of the random number generator driving the Poisson inputs.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            dt: DEFAULT_TIME_STEP,
            seed: 0,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), SNNError> {
        if !(self.dt > 0.0 && self.dt.is_finite()) {
            return Err(SNNError::InvalidParameters(format!(
                "Time step must be positive and finite, got {}",
                self.dt
            )));
        }
        Ok(())
    }

    /// Save the configuration to a JSON file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        let file = File::create(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| SNNError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| SNNError::IOError(e.to_string()))
    }

    /// Load a configuration from a JSON file.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, SNNError> {
        let file = File::open(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let reader = BufReader::new(file);
        let config: Self =
            serde_json::from_reader(reader).map_err(|e| SNNError::IOError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// What to rewind between two training examples.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum RestorePolicy {
    /// Rewind the whole network to its last checkpoint, so learned weights are discarded.
    #[default]
    Checkpoint,
    /// Rewind everything except the synapses, so learning accumulates over the examples.
    KeepSynapses,
}

/// Spike counts of the hidden layer for every label, as left by the last example of that label.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct TrainingRecord {
    /// Distinct labels, in increasing order.
    labels: Vec<usize>,
    /// One row of spike counts per label.
    counts: Vec<Vec<usize>>,
}

impl TrainingRecord {
    fn new(labels: Vec<usize>, num_neurons: usize) -> Self {
        let counts = vec![vec![0; num_neurons]; labels.len()];
        TrainingRecord { labels, counts }
    }

    fn row(&self, label: usize) -> Option<usize> {
        self.labels.binary_search(&label).ok()
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    /// Returns all rows of spike counts, ordered by label.
    pub fn counts(&self) -> &[Vec<usize>] {
        &self.counts
    }

    /// Returns the spike counts recorded for a label.
    pub fn counts_for(&self, label: usize) -> Option<&[usize]> {
        self.row(label).map(|row| self.counts[row].as_slice())
    }

    /// Returns the label each neuron responds the most to, or `None` for a silent neuron.
    /// Ties go to the smallest label.
    pub fn assignments(&self) -> Vec<Option<usize>> {
        let num_neurons = self.counts.first().map_or(0, |row| row.len());
        (0..num_neurons)
            .map(|j| {
                (0..self.labels.len())
                    .filter(|&row| self.counts[row][j] > 0)
                    .min_by_key(|&row| Reverse(self.counts[row][j]))
                    .map(|row| self.labels[row])
            })
            .collect()
    }

    /// Save the record to a JSON file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        let file = File::create(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)
            .map_err(|e| SNNError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| SNNError::IOError(e.to_string()))
    }
}

/// Numeric state of the whole network at some point in time.
#[derive(Debug, Clone)]
struct Checkpoint {
    num_steps: u64,
    populations: Vec<PopulationState>,
    synapses: Vec<SynapsesState>,
    monitors: Vec<Monitor>,
}

/// A network of layers and connections, simulated with a fixed time step.
#[derive(Debug)]
pub struct Network {
    name: String,
    config: SimulationConfig,
    rng: ChaCha8Rng,
    num_steps: u64,
    layers: Vec<Layer>,
    connections: Vec<Connection>,
    /// Positions of the source and target layers of every connection.
    endpoints: Vec<(usize, usize)>,
    monitors: Vec<Monitor>,
    /// Position of the monitor of every layer.
    layer_monitors: Vec<usize>,
    /// Position of the monitor of every connection, if it has one.
    connection_monitors: Vec<Option<usize>>,
    checkpoint: Option<Checkpoint>,
}

impl Network {
    /// Create an empty network.
    pub fn new(name: &str, config: SimulationConfig) -> Self {
        Network {
            name: name.to_string(),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            num_steps: 0,
            layers: vec![],
            connections: vec![],
            endpoints: vec![],
            monitors: vec![],
            layer_monitors: vec![],
            connection_monitors: vec![],
            checkpoint: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Returns the current simulation time, in ms.
    pub fn time(&self) -> f64 {
        self.num_steps as f64 * self.config.dt
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn monitors(&self) -> &[Monitor] {
        &self.monitors
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.name() == name)
    }

    pub fn layer_mut(&mut self, name: &str) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|layer| layer.name() == name)
    }

    pub fn connection(&self, name: &str) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|connection| connection.name() == name)
    }

    /// Returns the monitor of the layer or connection with the given name.
    pub fn monitor(&self, name: &str) -> Option<&Monitor> {
        self.monitors.iter().find(|monitor| monitor.source() == name)
    }

    fn layer_position(&self, name: &str) -> Result<usize, SNNError> {
        self.layers
            .iter()
            .position(|layer| layer.name() == name)
            .ok_or_else(|| SNNError::UnknownLayer(name.to_string()))
    }

    fn check_name(&self, name: &str) -> Result<(), SNNError> {
        let taken = self.layers.iter().any(|layer| layer.name() == name)
            || self
                .connections
                .iter()
                .any(|connection| connection.name() == name);
        if taken {
            return Err(SNNError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    /// Register a layer with its monitor, then checkpoint the network.
    /// Input layers only get a spike monitor.
    pub fn add_layer(&mut self, layer: Layer) -> Result<(), SNNError> {
        self.check_name(layer.name())?;
        layer.population().check_time_step(self.config.dt)?;

        let state = if layer.is_input() || layer.recorded_variables().is_empty() {
            None
        } else {
            Some(StateMonitor::new(
                layer.recorded_variables().to_vec(),
                (0..layer.size()).collect(),
            ))
        };
        let spikes = Some(SpikeMonitor::new(layer.size()));
        self.layer_monitors.push(self.monitors.len());
        self.monitors.push(Monitor::new(layer.name(), state, spikes));

        log::debug!(
            "Layer {} of {} {} neurons added to {}",
            layer.name(),
            layer.size(),
            layer.kind(),
            self.name
        );
        self.layers.push(layer);
        self.store();
        Ok(())
    }

    /// Register a connection between two registered layers, with a monitor on its first synapse if it records any variable,
    /// then checkpoint the network.
    pub fn add_connection(&mut self, connection: Connection) -> Result<(), SNNError> {
        self.check_name(connection.name())?;
        let source = self.layer_position(connection.source())?;
        let target = self.layer_position(connection.target())?;

        if self.layers[source].size() != connection.source_size()
            || self.layers[target].size() != connection.target_size()
        {
            return Err(SNNError::DimensionMismatch(format!(
                "Connection {} was built for {}x{} neurons, but layers {} and {} have {} and {}",
                connection.name(),
                connection.source_size(),
                connection.target_size(),
                connection.source(),
                connection.target(),
                self.layers[source].size(),
                self.layers[target].size()
            )));
        }
        if !self.layers[target]
            .population()
            .accepts(connection.synapses().target())
        {
            return Err(SNNError::IncompatibleTarget(format!(
                "{} synapses of {} cannot drive the {} layer {}",
                connection.kind(),
                connection.name(),
                self.layers[target].kind(),
                connection.target()
            )));
        }

        let variables = connection.recorded_variables();
        if variables.is_empty() || connection.num_synapses() == 0 {
            self.connection_monitors.push(None);
        } else {
            self.connection_monitors.push(Some(self.monitors.len()));
            self.monitors.push(Monitor::new(
                connection.name(),
                Some(StateMonitor::new(variables, vec![0])),
                None,
            ));
        }

        log::debug!(
            "Connection {} of {} {} synapses added to {}",
            connection.name(),
            connection.num_synapses(),
            connection.kind(),
            self.name
        );
        self.endpoints.push((source, target));
        self.connections.push(connection);
        self.store();
        Ok(())
    }

    /// Checkpoint the numeric state of the network: populations, synapses, monitors and clock.
    pub fn store(&mut self) {
        self.checkpoint = Some(Checkpoint {
            num_steps: self.num_steps,
            populations: self
                .layers
                .iter()
                .map(|layer| layer.population().snapshot())
                .collect(),
            synapses: self
                .connections
                .iter()
                .map(|connection| connection.synapses().snapshot())
                .collect(),
            monitors: self.monitors.clone(),
        });
    }

    /// Rewind the numeric state of the network to the last checkpoint.
    /// The registered layers, connections and monitors are left untouched.
    pub fn restore(&mut self) -> Result<(), SNNError> {
        self.rewind(true)
    }

    fn rewind(&mut self, with_synapses: bool) -> Result<(), SNNError> {
        let checkpoint = self
            .checkpoint
            .as_ref()
            .ok_or_else(|| SNNError::InvalidOperation("No checkpoint to restore".to_string()))?;

        for (layer, state) in self.layers.iter_mut().zip(&checkpoint.populations) {
            layer.population_mut().restore(state)?;
        }
        if with_synapses {
            for (connection, state) in self.connections.iter_mut().zip(&checkpoint.synapses) {
                connection.synapses_mut().restore(state)?;
            }
        } else {
            // Kept traces must decay from the rewound clock, not from the time they were last updated
            let offset = (checkpoint.num_steps as f64 - self.num_steps as f64) * self.config.dt;
            for connection in self.connections.iter_mut() {
                connection.synapses_mut().shift_clock(offset);
            }
        }
        for (monitor, saved) in self.monitors.iter_mut().zip(&checkpoint.monitors) {
            monitor.rewind(saved);
        }
        self.num_steps = checkpoint.num_steps;
        Ok(())
    }

    /// Record the state monitors of all layers and connections at time `t`.
    fn record_states(&mut self, t: f64) {
        for (layer, &m) in self.layers.iter().zip(&self.layer_monitors) {
            if let Some(state) = self.monitors[m].state_mut() {
                let rows = state
                    .variables()
                    .iter()
                    .map(|name| layer.population().variable(name, t).unwrap_or_default())
                    .collect();
                state.record(t, rows);
            }
        }
        for (connection, &m) in self.connections.iter().zip(&self.connection_monitors) {
            let Some(m) = m else { continue };
            if let Some(state) = self.monitors[m].state_mut() {
                let rows = state
                    .variables()
                    .iter()
                    .map(|name| connection.synapses().variable(0, name).into_iter().collect())
                    .collect();
                state.record(t, rows);
            }
        }
    }

    /// Advance the network by one time step.
    fn step(&mut self) {
        let dt = self.config.dt;
        let t = self.time();

        self.record_states(t);

        // Integrate and detect threshold crossings
        let spikes: Vec<Vec<usize>> = self
            .layers
            .iter_mut()
            .map(|layer| layer.population_mut().step(t, dt, &mut self.rng))
            .collect();
        for connection in self.connections.iter_mut() {
            connection.synapses_mut().integrate(dt);
        }
        for (layer_spikes, &m) in spikes.iter().zip(&self.layer_monitors) {
            if let Some(monitor) = self.monitors[m].spikes_mut() {
                monitor.record(t, layer_spikes);
            }
        }

        // Deliver spikes and apply plasticity
        for (connection, &(source, target)) in self.connections.iter_mut().zip(&self.endpoints) {
            connection.propagate(
                &spikes[source],
                &spikes[target],
                t,
                self.layers[target].population_mut(),
            );
        }

        for (layer, layer_spikes) in self.layers.iter_mut().zip(&spikes) {
            layer.population_mut().reset(layer_spikes, t);
        }
        self.num_steps += 1;
    }

    /// Run the simulation for `duration` ms, i.e., for `duration / dt` time steps (rounded).
    pub fn run(&mut self, duration: f64) -> Result<(), SNNError> {
        self.config.validate()?;
        if !(duration >= 0.0 && duration.is_finite()) {
            return Err(SNNError::InvalidParameters(format!(
                "Simulation duration must be non-negative and finite, got {}",
                duration
            )));
        }
        // Spikes may have been programmed since the layers were added
        for layer in &self.layers {
            layer.population().check_time_step(self.config.dt)?;
        }

        let total_steps = (duration / self.config.dt).round() as u64;
        let start = self.time();
        let end = start + total_steps as f64 * self.config.dt;
        log::info!("Starting simulation of {} until t = {} ms...", self.name, end);

        // For logging purposes
        let log_interval = (total_steps / 100).max(1);

        for step in 1..=total_steps {
            self.step();

            if step % log_interval == 0 {
                let progress = step as f64 / total_steps as f64 * 100.0;
                log::debug!(
                    "Simulation progress: {:.2}% (Time: {:.2}/{:.2})",
                    progress,
                    self.time(),
                    end
                );
            }
        }

        log::info!("Simulation completed successfully!");
        Ok(())
    }

    /// Log a description of the network, then run the simulation for `duration` ms.
    pub fn run_simulation(&mut self, duration: f64) -> Result<(), SNNError> {
        log::info!("{}", self);
        self.run(duration)
    }

    /// Present every example of the dataset to the network for `duration` ms, and record the spike counts of the hidden layer per label.
    ///
    /// The first registered layer must be a manual spike input, whose last neuron replays the example spike train
    /// (one flag per ms), and the second registered layer is the hidden layer.
    /// The network is rewound to its last checkpoint after every example, according to the `policy`.
    pub fn train(
        &mut self,
        dataset: &Dataset,
        duration: f64,
        policy: RestorePolicy,
    ) -> Result<TrainingRecord, SNNError> {
        if self.layers.len() < 2 {
            return Err(SNNError::InvalidOperation(
                "Training requires an input layer and a hidden layer".to_string(),
            ));
        }
        let input_size = match self.layers[0].population() {
            Population::SpikeGenerator(_) => self.layers[0].size(),
            other => {
                return Err(SNNError::InvalidOperation(format!(
                    "Training requires a manual spike input as first layer, got a {} layer",
                    other.kind()
                )))
            }
        };
        let hidden_monitor = self.layer_monitors[1];

        let mut record = TrainingRecord::new(dataset.labels(), self.layers[1].size());
        log::info!(
            "Training {} on {} examples of {} labels...",
            self.name,
            dataset.len(),
            record.num_labels()
        );

        for (n, example) in dataset.iter().enumerate() {
            let start = self.time();
            let times: Vec<f64> = spike_train_to_times(&example.spikes, TRAINING_SPIKE_RESOLUTION)
                .into_iter()
                .map(|t| start + t)
                .collect();
            let indices = vec![input_size - 1; times.len()];
            self.layers[0].set_spikes(&indices, &times)?;

            self.run(duration)?;

            let counts = self.monitors[hidden_monitor].spike_counts().to_vec();
            let row = record.row(example.label).ok_or_else(|| {
                SNNError::InvalidOperation(format!("Unexpected label {}", example.label))
            })?;
            log::debug!(
                "Example {}/{} (label {}): {} hidden spikes",
                n + 1,
                dataset.len(),
                example.label,
                counts.iter().sum::<usize>()
            );
            record.counts[row] = counts;

            match policy {
                RestorePolicy::Checkpoint => self.rewind(true)?,
                RestorePolicy::KeepSynapses => self.rewind(false)?,
            }
        }

        log::info!("Training completed successfully!");
        Ok(record)
    }

    /// Release dopamine on all synapses of a dopamine-modulated connection.
    pub fn reward(&mut self, connection: &str) -> Result<(), SNNError> {
        let connection = self
            .connections
            .iter_mut()
            .find(|c| c.name() == connection)
            .ok_or_else(|| SNNError::UnknownConnection(connection.to_string()))?;
        connection.synapses_mut().release_dopamine()?;
        log::debug!("Dopamine released on {}", connection.name());
        Ok(())
    }

    /// Returns a description of the layers, connections and monitors of the network.
    pub fn describe(&self) -> String {
        self.to_string()
    }

    /// Save the data of all monitors to a JSON file.
    pub fn save_monitors_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        let file = File::create(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &self.monitors)
            .map_err(|e| SNNError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| SNNError::IOError(e.to_string()))
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "Network {} (dt = {} ms, t = {} ms)",
            self.name,
            self.config.dt,
            self.time()
        )?;
        writeln!(f, "Layers:")?;
        for layer in self.layers.iter() {
            writeln!(
                f,
                "  {}: {} {} neurons",
                layer.name(),
                layer.size(),
                layer.kind()
            )?;
        }
        writeln!(f, "Connections:")?;
        for connection in self.connections.iter() {
            writeln!(
                f,
                "  {}: {} -> {}, {} {} synapses",
                connection.name(),
                connection.source(),
                connection.target(),
                connection.num_synapses(),
                connection.kind()
            )?;
        }
        write!(f, "Monitors:")?;
        for monitor in self.monitors.iter() {
            let mut recorded = vec![];
            if let Some(state) = monitor.state() {
                recorded.push(format!("state [{}]", state.variables().iter().join(", ")));
            }
            if monitor.spikes().is_some() {
                recorded.push("spikes".to_string());
            }
            write!(f, "\n  {}: {}", monitor.source(), recorded.join(", "))?;
        }
        Ok(())
    }
}
