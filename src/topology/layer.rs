//! Layer constructors for every neuron model.
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::SNNError;
use crate::neuron::{
    CurrentBasedLifModel, CurrentBasedLifNeuron, CurrentBasedLifParams, DiehlCookNeuron,
    DiehlCookParams, IzhikevichNeuron, IzhikevichParams, IzhikevichPreset, LayerMode, LifNeuron,
    LifParams, Population, SpikeGenerator, DIEHL_COOK_THETA_INIT,
};
use crate::spike_train::{spike_train_to_times, CurrentWaveform};

/// Smallest and largest membrane resistance drawn for a current-driven layer.
const CURRENT_BASED_RESISTANCE_RANGE: (u32, u32) = (2, 15);

/// A named population of neurons, together with the state variables recorded by its monitor.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Layer {
    name: String,
    population: Population,
    variables: Vec<String>,
}

fn check_size(size: usize) -> Result<(), SNNError> {
    if size == 0 {
        return Err(SNNError::InvalidParameters(
            "A layer must contain at least one neuron".to_string(),
        ));
    }
    Ok(())
}

fn variables(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

/// Read a threshold offset array from a JSON file.
fn load_theta<P: AsRef<Path>>(path: P) -> Result<Vec<f64>, SNNError> {
    let file = File::open(path).map_err(|e| SNNError::IOError(e.to_string()))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(|e| SNNError::IOError(e.to_string()))
}

impl Layer {
    /// A layer of leaky integrate-and-fire neurons with random initial potentials and thresholds.
    pub fn lif<R: Rng>(
        num_neurons: usize,
        name: &str,
        params: LifParams,
        rng: &mut R,
    ) -> Result<Self, SNNError> {
        check_size(num_neurons)?;
        params.validate()?;
        let neurons = (0..num_neurons)
            .map(|_| LifNeuron::rand(&params, rng))
            .collect();
        Ok(Layer {
            name: name.to_string(),
            population: Population::Lif { params, neurons },
            variables: variables(&["v"]),
        })
    }

    /// A layer of adaptive-threshold neurons.
    ///
    /// The threshold offsets are read from the JSON array at `theta_path` if provided, which is mandatory in test mode.
    /// Otherwise, they all start at 20 mV.
    pub fn diehl_cook_lif<P: AsRef<Path>>(
        num_neurons: usize,
        name: &str,
        params: DiehlCookParams,
        theta_path: Option<P>,
    ) -> Result<Self, SNNError> {
        check_size(num_neurons)?;
        if !(params.tc_theta > 0.0) {
            return Err(SNNError::InvalidParameters(
                "Threshold time constant must be positive".to_string(),
            ));
        }

        let theta = match theta_path {
            Some(path) => {
                let theta = load_theta(path)?;
                if theta.len() != num_neurons {
                    return Err(SNNError::DimensionMismatch(format!(
                        "{} threshold offsets for a layer of {} neurons",
                        theta.len(),
                        num_neurons
                    )));
                }
                theta
            }
            None if params.mode == LayerMode::Test => {
                return Err(SNNError::InvalidParameters(
                    "Test mode requires learned threshold offsets".to_string(),
                ))
            }
            None => vec![DIEHL_COOK_THETA_INIT; num_neurons],
        };

        let neurons = theta
            .into_iter()
            .map(|theta| DiehlCookNeuron::new(&params, theta))
            .collect();
        Ok(Layer {
            name: name.to_string(),
            population: Population::DiehlCookLif { params, neurons },
            variables: variables(&["v"]),
        })
    }

    /// A layer of Izhikevich neurons of the given firing class (RS, IB, CH, FS, TC, RZ or LTS).
    pub fn izhikevich(num_neurons: usize, name: &str, model_type: &str) -> Result<Self, SNNError> {
        check_size(num_neurons)?;
        let preset: IzhikevichPreset = model_type.parse()?;
        let params = IzhikevichParams::from(preset);
        let neurons = vec![IzhikevichNeuron::new(&params); num_neurons];
        Ok(Layer {
            name: name.to_string(),
            population: Population::Izhikevich {
                preset,
                params,
                neurons,
            },
            variables: variables(&["v"]),
        })
    }

    /// A layer of leaky integrate-and-fire neurons driven by an input current, with thresholds ramping with the neuron index.
    /// The membrane resistance is drawn uniformly in {2, ..., 15} unless provided.
    pub fn current_based_lif<R: Rng>(
        num_neurons: usize,
        name: &str,
        params: CurrentBasedLifParams,
        input_current: CurrentWaveform,
        rng: &mut R,
    ) -> Result<Self, SNNError> {
        check_size(num_neurons)?;
        if !(params.tau_m > 0.0 && params.tau_ref >= 0.0) {
            return Err(SNNError::InvalidParameters(
                "Membrane time constant must be positive and refractory period non-negative"
                    .to_string(),
            ));
        }

        let (r_min, r_max) = CURRENT_BASED_RESISTANCE_RANGE;
        let r = match params.r {
            Some(r) => r,
            None => rng.gen_range(r_min..=r_max) as f64,
        };
        let neurons = (0..num_neurons)
            .map(|i| CurrentBasedLifNeuron::rand(&params, i, rng))
            .collect();
        Ok(Layer {
            name: name.to_string(),
            population: Population::CurrentBasedLif {
                model: CurrentBasedLifModel {
                    params,
                    r,
                    input_current,
                },
                neurons,
            },
            variables: variables(&["v", "vth", "I"]),
        })
    }

    /// A layer of independent Poisson spike sources firing at `rate` Hz.
    pub fn poisson_input(num_neurons: usize, name: &str, rate: f64) -> Result<Self, SNNError> {
        check_size(num_neurons)?;
        if !(rate >= 0.0 && rate.is_finite()) {
            return Err(SNNError::InvalidParameters(format!(
                "Poisson rate must be non-negative and finite, got {}",
                rate
            )));
        }
        Ok(Layer {
            name: name.to_string(),
            population: Population::PoissonInput {
                size: num_neurons,
                rate,
            },
            variables: vec![],
        })
    }

    /// A layer replaying a binary spike train sampled every `dt` ms.
    ///
    /// All spikes of the train are emitted by the last neuron of the layer.
    pub fn manual_spike_input(
        spike_train: &[u8],
        dt: f64,
        num_neurons: usize,
        name: &str,
    ) -> Result<Self, SNNError> {
        check_size(num_neurons)?;
        if !(dt > 0.0) {
            return Err(SNNError::InvalidParameters(
                "Spike train resolution must be positive".to_string(),
            ));
        }
        let times = spike_train_to_times(spike_train, dt);
        let indices = vec![num_neurons - 1; times.len()];
        let generator = SpikeGenerator::build(num_neurons, &indices, &times)?;
        Ok(Layer {
            name: name.to_string(),
            population: Population::SpikeGenerator(generator),
            variables: vec![],
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of neurons in the layer.
    pub fn size(&self) -> usize {
        self.population.size()
    }

    pub fn kind(&self) -> &'static str {
        self.population.kind()
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub(crate) fn population_mut(&mut self) -> &mut Population {
        &mut self.population
    }

    /// Returns true for layers of spike sources, which only get a spike monitor.
    pub fn is_input(&self) -> bool {
        self.population.is_input()
    }

    /// The state variables recorded by the layer monitor.
    pub fn recorded_variables(&self) -> &[String] {
        &self.variables
    }

    /// Reprogram a manual spike input with spikes of neurons `indices` at `times`.
    pub fn set_spikes(&mut self, indices: &[usize], times: &[f64]) -> Result<(), SNNError> {
        match &mut self.population {
            Population::SpikeGenerator(generator) => generator.set_spikes(indices, times),
            other => Err(SNNError::InvalidOperation(format!(
                "Cannot program spikes of a {} layer",
                other.kind()
            ))),
        }
    }

    /// Returns the threshold offsets of an adaptive-threshold layer.
    pub fn theta(&self) -> Option<Vec<f64>> {
        match &self.population {
            Population::DiehlCookLif { neurons, .. } => {
                Some(neurons.iter().map(|neuron| neuron.theta).collect())
            }
            _ => None,
        }
    }

    /// Save the threshold offsets of an adaptive-threshold layer to a JSON file, to be loaded in test mode.
    pub fn save_theta_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SNNError> {
        let theta = self.theta().ok_or_else(|| {
            SNNError::InvalidOperation(format!(
                "A {} layer has no threshold offsets",
                self.kind()
            ))
        })?;
        let file = File::create(path).map_err(|e| SNNError::IOError(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, &theta).map_err(|e| SNNError::IOError(e.to_string()))?;
        writer.flush().map_err(|e| SNNError::IOError(e.to_string()))
    }
}
