//! Topology module assembling neuron populations and synapses into a network.
//!
//! - [`layer`]: Named populations of neurons sharing one model
//! - [`connection`]: Named populations of synapses between two layers, sharing one plasticity rule
//! - [`monitor`]: Recorders of state variables and spikes
//! - [`network`]: The network container, its simulation loop, checkpoints and training
pub mod connection;
pub mod layer;
pub mod monitor;
pub mod network;

pub use connection::Connection;
pub use layer::Layer;
pub use monitor::{Monitor, SpikeMonitor, StateMonitor};
pub use network::{Network, RestorePolicy, SimulationConfig, TrainingRecord};
