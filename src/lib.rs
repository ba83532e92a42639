//! This crate provides tools for building, simulating and training small spiking neural networks (SNNs)
//! with spike-timing-dependent plasticity (STDP) in Rust.
//!
//! Networks are made of layers (populations of neurons sharing one model) and connections (populations of
//! synapses sharing one plasticity rule). They are simulated with a fixed time step, in ms.
//!
//! # Building and Simulating Networks
//!
//! ```rust
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use rusty_stdp::neuron::LifParams;
//! use rusty_stdp::synapse::StdpParams;
//! use rusty_stdp::topology::{Connection, Layer, Network, SimulationConfig};
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let mut network = Network::new("demo", SimulationConfig::default());
//!
//! // One input neuron replaying a binary spike train, and twelve hidden neurons
//! let input = Layer::manual_spike_input(&[0, 1, 1, 0, 1], 1.0, 1, "input").unwrap();
//! let hidden = Layer::lif(12, "hidden", LifParams::default(), &mut rng).unwrap();
//! let connection =
//!     Connection::stdp("input_hidden", &input, &hidden, StdpParams::default(), None, None, &mut rng).unwrap();
//!
//! network.add_layer(input).unwrap();
//! network.add_layer(hidden).unwrap();
//! network.add_connection(connection).unwrap();
//!
//! network.run(10.0).unwrap();
//! assert_eq!(network.monitor("hidden").unwrap().spike_counts().len(), 12);
//! ```
//!
//! # Training Networks
//!
//! ```rust
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use rusty_stdp::dataset::Dataset;
//! use rusty_stdp::neuron::LifParams;
//! use rusty_stdp::synapse::DiehlCookStdpParams;
//! use rusty_stdp::topology::{Connection, Layer, Network, RestorePolicy, SimulationConfig};
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let dataset = Dataset::rand(3, 50, 2, 0.5, &mut rng).unwrap();
//!
//! let mut network = Network::new("training", SimulationConfig::default());
//! let input = Layer::manual_spike_input(&[], 1.0, 1, "input").unwrap();
//! let hidden = Layer::lif(4, "hidden", LifParams::default(), &mut rng).unwrap();
//! let weights = vec![vec![0.3; 4]];
//! let connection = Connection::diehl_cook_stdp(
//!     "input_hidden", &input, &hidden, DiehlCookStdpParams::default(), &weights, None, &mut rng,
//! ).unwrap();
//! network.add_layer(input).unwrap();
//! network.add_layer(hidden).unwrap();
//! network.add_connection(connection).unwrap();
//!
//! let record = network.train(&dataset, 50.0, RestorePolicy::Checkpoint).unwrap();
//! assert!(record.num_labels() <= 2);
//! ```
pub mod dataset;
pub mod error;
pub mod neuron;
pub mod processing;
pub mod spike_train;
pub mod synapse;
pub mod topology;

/// Minimum number of neurons (or synapses) to update in parallel.
pub const MIN_PARALLEL_NEURONS: usize = 10_000;
/// Tolerance used when comparing times, in ms.
pub const TIME_RESOLUTION: f64 = 1e-9;
/// Default simulation time step, in ms.
pub const DEFAULT_TIME_STEP: f64 = 0.1;
