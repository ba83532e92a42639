//! Error module for the Rusty STDP library.
use std::error::Error;
use std::fmt;

/// Error types for the library.
#[derive(Debug, PartialEq)]
pub enum SNNError {
    /// Error for invalid parameters, e.g., a negative time constant or a rate out of range.
    InvalidParameters(String),
    /// Error for an unknown neuron model type, e.g., an unrecognized Izhikevich preset.
    UnknownModelType(String),
    /// Error for an unknown smoothing window.
    UnknownWindow(String),
    /// Error for a layer or connection name already registered in the network.
    DuplicateName(String),
    /// Error for a layer not found in the network.
    UnknownLayer(String),
    /// Error for a connection not found in the network.
    UnknownConnection(String),
    /// Error for a synapse writing to a state variable the target population does not have.
    IncompatibleTarget(String),
    /// Error for arrays whose dimensions do not fit the populations, e.g., a too small weight matrix.
    DimensionMismatch(String),
    /// Error for invalid operation.
    InvalidOperation(String),
    /// Error for I/O operations.
    IOError(String),
}

impl fmt::Display for SNNError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SNNError::InvalidParameters(e) => write!(f, "Invalid parameters: {}", e),
            SNNError::UnknownModelType(e) => write!(f, "Unknown model type: {}", e),
            SNNError::UnknownWindow(e) => write!(
                f,
                "Unknown window {}: must be one of flat, hanning, hamming, bartlett, blackman",
                e
            ),
            SNNError::DuplicateName(e) => {
                write!(f, "Name already registered in the network: {}", e)
            }
            SNNError::UnknownLayer(e) => write!(f, "Layer not found in the network: {}", e),
            SNNError::UnknownConnection(e) => {
                write!(f, "Connection not found in the network: {}", e)
            }
            SNNError::IncompatibleTarget(e) => write!(f, "Incompatible target layer: {}", e),
            SNNError::DimensionMismatch(e) => write!(f, "Dimension mismatch: {}", e),
            SNNError::InvalidOperation(e) => write!(f, "Invalid operation: {}", e),
            SNNError::IOError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl Error for SNNError {}
