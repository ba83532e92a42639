//! Neuron models and populations.
//!
//! Every model is made of a typed parameter set and a per-neuron state implementing [`NeuronDynamics`].
//! Populations gather the neurons of one model and are selected through the [`Population`] enum.
//! Time is expressed in ms, potentials in mV, currents in nA and resistances in MOhm.
use itertools::Itertools;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::SNNError;
use crate::spike_train::CurrentWaveform;
use crate::{MIN_PARALLEL_NEURONS, TIME_RESOLUTION};

/// The state variable of a target neuron that a synapse writes to on a presynaptic spike.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum SynapticTarget {
    /// The synaptic conductance `ge`.
    Conductance,
    /// The membrane potential `v`.
    Potential,
}

/// The clock-driven dynamics of a single neuron, together with its threshold and reset rules.
pub trait NeuronDynamics: Clone + Send + Sync {
    type Params: Sync;

    /// Advance the neuron state by one Euler step of length `dt`, starting at time `t`.
    fn integrate(&mut self, params: &Self::Params, t: f64, dt: f64);

    /// Returns true if the neuron fires at time `t`.
    fn crossed(&self, params: &Self::Params, t: f64) -> bool;

    /// Apply the reset rule after a spike at time `t`.
    fn reset(&mut self, params: &Self::Params, t: f64);

    /// Returns the value of a named state variable at time `t`, if the model has it.
    fn variable(&self, params: &Self::Params, name: &str, t: f64) -> Option<f64>;

    /// A mutable reference to the state variable receiving synaptic input, if the model has it.
    fn target_mut(&mut self, target: SynapticTarget) -> Option<&mut f64>;

    /// Returns true if the model exposes the given synaptic target.
    fn accepts(target: SynapticTarget) -> bool;
}

fn is_refractory(last_spike: f64, tau_ref: f64, t: f64) -> bool {
    t - last_spike < tau_ref - TIME_RESOLUTION
}

/// Integrate all neurons, in parallel for large populations, and returns the indices of the neurons crossing their threshold.
fn step_neurons<N: NeuronDynamics>(
    neurons: &mut [N],
    params: &N::Params,
    t: f64,
    dt: f64,
) -> Vec<usize> {
    if neurons.len() > MIN_PARALLEL_NEURONS {
        neurons
            .par_iter_mut()
            .for_each(|neuron| neuron.integrate(params, t, dt));
        neurons
            .par_iter()
            .enumerate()
            .filter(|(_, neuron)| neuron.crossed(params, t))
            .map(|(i, _)| i)
            .collect()
    } else {
        neurons
            .iter_mut()
            .for_each(|neuron| neuron.integrate(params, t, dt));
        neurons
            .iter()
            .enumerate()
            .filter(|(_, neuron)| neuron.crossed(params, t))
            .map(|(i, _)| i)
            .collect()
    }
}

/// Parameters of the leaky integrate-and-fire neuron.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct LifParams {
    pub v_rest: f64,
    pub v_reset: f64,
    /// Nominal threshold, each neuron draws its own threshold in `[v_th, v_th + 5)`.
    pub v_th: f64,
    pub r: f64,
    pub tau_m: f64,
    pub tau_ref: f64,
}

impl Default for LifParams {
    fn default() -> Self {
        LifParams {
            v_rest: -70.0,
            v_reset: -65.0,
            v_th: -50.0,
            r: 2.0,
            tau_m: 10.0,
            tau_ref: 5.0,
        }
    }
}

impl LifParams {
    pub fn validate(&self) -> Result<(), SNNError> {
        if !(self.tau_m > 0.0) || self.tau_ref < 0.0 {
            return Err(SNNError::InvalidParameters(
                "LIF time constants must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A leaky integrate-and-fire neuron driven by a decaying conductance.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct LifNeuron {
    pub v: f64,
    pub ge: f64,
    pub vth: f64,
    pub last_spike: f64,
}

impl LifNeuron {
    /// A neuron with a random initial potential in `[v_rest, v_th)` and a random threshold in `[v_th, v_th + 5)`.
    pub fn rand<R: Rng>(params: &LifParams, rng: &mut R) -> Self {
        LifNeuron {
            v: params.v_rest + rng.gen::<f64>() * (params.v_th - params.v_rest),
            ge: 0.0,
            vth: params.v_th + rng.gen::<f64>() * 5.0,
            last_spike: f64::NEG_INFINITY,
        }
    }
}

impl NeuronDynamics for LifNeuron {
    type Params = LifParams;

    fn integrate(&mut self, params: &LifParams, t: f64, dt: f64) {
        let dge = -self.ge / params.tau_m;
        if !is_refractory(self.last_spike, params.tau_ref, t) {
            self.v += dt * self.ge * (self.v - params.v_rest) / params.tau_m;
        }
        self.ge += dt * dge;
    }

    fn crossed(&self, params: &LifParams, t: f64) -> bool {
        !is_refractory(self.last_spike, params.tau_ref, t) && self.v > self.vth
    }

    fn reset(&mut self, params: &LifParams, t: f64) {
        self.v = params.v_reset;
        self.last_spike = t;
    }

    fn variable(&self, _params: &LifParams, name: &str, _t: f64) -> Option<f64> {
        match name {
            "v" => Some(self.v),
            "ge" => Some(self.ge),
            "vth" => Some(self.vth),
            _ => None,
        }
    }

    fn target_mut(&mut self, target: SynapticTarget) -> Option<&mut f64> {
        match target {
            SynapticTarget::Conductance => Some(&mut self.ge),
            SynapticTarget::Potential => Some(&mut self.v),
        }
    }

    fn accepts(_target: SynapticTarget) -> bool {
        true
    }
}

/// Operating mode of an adaptive-threshold layer.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub enum LayerMode {
    /// The threshold offset adapts on each spike and slowly decays.
    Train,
    /// The threshold offset is frozen, typically to values learned during training.
    Test,
}

/// Parameters of the adaptive-threshold neuron of Diehl and Cook.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DiehlCookParams {
    pub v_rest: f64,
    pub v_reset: f64,
    pub refrac: f64,
    pub offset: f64,
    pub vth: f64,
    pub tc_theta: f64,
    pub theta_plus: f64,
    pub mode: LayerMode,
}

impl Default for DiehlCookParams {
    fn default() -> Self {
        DiehlCookParams {
            v_rest: -65.0,
            v_reset: -65.0,
            refrac: 5.0,
            offset: 20.0,
            vth: -52.0,
            tc_theta: 1e7,
            theta_plus: 0.05,
            mode: LayerMode::Train,
        }
    }
}

/// Membrane time constant of the adaptive-threshold neuron.
const DIEHL_COOK_TAU_M: f64 = 100.0;
/// Time constant of the excitatory conductance of the adaptive-threshold neuron.
const DIEHL_COOK_TAU_GE: f64 = 1.0;
/// Rate at which the timer of the adaptive-threshold neuron runs.
const DIEHL_COOK_TIMER_RATE: f64 = 0.05;
/// Initial threshold offset when no learned values are provided.
pub const DIEHL_COOK_THETA_INIT: f64 = 20.0;

/// A leaky integrate-and-fire neuron with a homeostatic threshold offset `theta`.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DiehlCookNeuron {
    pub v: f64,
    pub ge: f64,
    pub timer: f64,
    pub theta: f64,
    pub last_spike: f64,
}

impl DiehlCookNeuron {
    pub fn new(params: &DiehlCookParams, theta: f64) -> Self {
        DiehlCookNeuron {
            v: params.v_rest,
            ge: 0.0,
            timer: 0.0,
            theta,
            last_spike: f64::NEG_INFINITY,
        }
    }
}

impl NeuronDynamics for DiehlCookNeuron {
    type Params = DiehlCookParams;

    fn integrate(&mut self, params: &DiehlCookParams, t: f64, dt: f64) {
        if !is_refractory(self.last_spike, params.refrac, t) {
            let i_syn = -self.ge * self.v;
            self.v += dt * ((params.v_rest - self.v) + i_syn) / DIEHL_COOK_TAU_M;
        }
        self.ge += dt * (-self.ge / DIEHL_COOK_TAU_GE);
        self.timer += dt * DIEHL_COOK_TIMER_RATE;
        if params.mode == LayerMode::Train {
            self.theta += dt * (-self.theta / params.tc_theta);
        }
    }

    fn crossed(&self, params: &DiehlCookParams, t: f64) -> bool {
        !is_refractory(self.last_spike, params.refrac, t)
            && self.v > self.theta - params.offset + params.vth
            && self.timer > params.refrac
    }

    fn reset(&mut self, params: &DiehlCookParams, t: f64) {
        self.v = params.v_reset;
        self.timer = 0.0;
        if params.mode == LayerMode::Train {
            self.theta += params.theta_plus;
        }
        self.last_spike = t;
    }

    fn variable(&self, _params: &DiehlCookParams, name: &str, _t: f64) -> Option<f64> {
        match name {
            "v" => Some(self.v),
            "ge" => Some(self.ge),
            "timer" => Some(self.timer),
            "theta" => Some(self.theta),
            _ => None,
        }
    }

    fn target_mut(&mut self, target: SynapticTarget) -> Option<&mut f64> {
        match target {
            SynapticTarget::Conductance => Some(&mut self.ge),
            SynapticTarget::Potential => Some(&mut self.v),
        }
    }

    fn accepts(_target: SynapticTarget) -> bool {
        true
    }
}

/// The firing pattern classes of the Izhikevich neuron.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum IzhikevichPreset {
    /// Regular spiking
    RS,
    /// Intrinsically bursting
    IB,
    /// Chattering
    CH,
    /// Fast spiking
    FS,
    /// Thalamo-cortical
    TC,
    /// Resonator
    RZ,
    /// Low-threshold spiking
    LTS,
}

impl FromStr for IzhikevichPreset {
    type Err = SNNError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RS" => Ok(IzhikevichPreset::RS),
            "IB" => Ok(IzhikevichPreset::IB),
            "CH" => Ok(IzhikevichPreset::CH),
            "FS" => Ok(IzhikevichPreset::FS),
            "TC" => Ok(IzhikevichPreset::TC),
            "RZ" => Ok(IzhikevichPreset::RZ),
            "LTS" => Ok(IzhikevichPreset::LTS),
            _ => Err(SNNError::UnknownModelType(format!(
                "{} is not an Izhikevich model type",
                s
            ))),
        }
    }
}

/// Parameters of the Izhikevich neuron.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct IzhikevichParams {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl From<IzhikevichPreset> for IzhikevichParams {
    fn from(preset: IzhikevichPreset) -> Self {
        let (a, b, c, d) = match preset {
            IzhikevichPreset::RS => (0.02, 0.20, -65.0, 8.00),
            IzhikevichPreset::IB => (0.02, 0.20, -55.0, 4.00),
            IzhikevichPreset::CH => (0.02, 0.20, -50.0, 2.00),
            IzhikevichPreset::FS => (0.10, 0.20, -65.0, 2.00),
            IzhikevichPreset::TC => (0.02, 0.25, -65.0, 0.05),
            IzhikevichPreset::RZ => (0.10, 0.25, -65.0, 2.00),
            IzhikevichPreset::LTS => (0.02, 0.25, -65.0, 2.00),
        };
        IzhikevichParams { a, b, c, d }
    }
}

/// Peak potential at which an Izhikevich neuron fires.
const IZHIKEVICH_PEAK: f64 = 30.0;

/// A two-variable (potential, recovery) Izhikevich neuron.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct IzhikevichNeuron {
    pub v: f64,
    pub u: f64,
    /// External input, in mV/ms.
    pub i: f64,
}

impl IzhikevichNeuron {
    pub fn new(params: &IzhikevichParams) -> Self {
        IzhikevichNeuron {
            v: params.c,
            u: params.b * params.c,
            i: 0.0,
        }
    }
}

impl NeuronDynamics for IzhikevichNeuron {
    type Params = IzhikevichParams;

    fn integrate(&mut self, params: &IzhikevichParams, _t: f64, dt: f64) {
        let dv = 0.04 * self.v * self.v + 5.0 * self.v + 140.0 - self.u + self.i;
        let du = params.a * (params.b * self.v - self.u);
        self.v += dt * dv;
        self.u += dt * du;
    }

    fn crossed(&self, _params: &IzhikevichParams, _t: f64) -> bool {
        self.v > IZHIKEVICH_PEAK
    }

    fn reset(&mut self, params: &IzhikevichParams, _t: f64) {
        self.v = params.c;
        self.u += params.d;
    }

    fn variable(&self, _params: &IzhikevichParams, name: &str, _t: f64) -> Option<f64> {
        match name {
            "v" => Some(self.v),
            "u" => Some(self.u),
            "I" => Some(self.i),
            _ => None,
        }
    }

    fn target_mut(&mut self, target: SynapticTarget) -> Option<&mut f64> {
        match target {
            SynapticTarget::Potential => Some(&mut self.v),
            SynapticTarget::Conductance => None,
        }
    }

    fn accepts(target: SynapticTarget) -> bool {
        target == SynapticTarget::Potential
    }
}

/// Parameters of the current-driven leaky integrate-and-fire neuron.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CurrentBasedLifParams {
    pub v_rest: f64,
    pub tau_m: f64,
    pub tau_ref: f64,
    /// Membrane resistance; drawn uniformly in {2, ..., 15} when not provided.
    pub r: Option<f64>,
}

impl Default for CurrentBasedLifParams {
    fn default() -> Self {
        CurrentBasedLifParams {
            v_rest: 0.0,
            tau_m: 20.0,
            tau_ref: 5.0,
            r: None,
        }
    }
}

/// Threshold increment between two consecutive neurons of a current-driven population.
const CURRENT_BASED_THRESHOLD_STEP: f64 = 30.0;

/// Resolved model of a current-driven population: parameters, resistance and input current.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CurrentBasedLifModel {
    pub params: CurrentBasedLifParams,
    pub r: f64,
    pub input_current: CurrentWaveform,
}

/// A leaky integrate-and-fire neuron driven by an external current waveform.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct CurrentBasedLifNeuron {
    pub v: f64,
    pub g: f64,
    pub vth: f64,
    pub last_spike: f64,
}

impl CurrentBasedLifNeuron {
    /// The `index`-th neuron of a population, whose threshold ramps linearly with its index.
    pub fn rand<R: Rng>(params: &CurrentBasedLifParams, index: usize, rng: &mut R) -> Self {
        CurrentBasedLifNeuron {
            v: params.v_rest + rng.gen::<f64>(),
            g: 0.0,
            vth: CURRENT_BASED_THRESHOLD_STEP * index as f64,
            last_spike: f64::NEG_INFINITY,
        }
    }
}

impl NeuronDynamics for CurrentBasedLifNeuron {
    type Params = CurrentBasedLifModel;

    fn integrate(&mut self, model: &CurrentBasedLifModel, t: f64, dt: f64) {
        let params = &model.params;
        let dv = (self.g * (self.v - params.v_rest) + model.r * model.input_current.at(t))
            / params.tau_m;
        let dg = -self.g / params.tau_m;
        self.v += dt * dv;
        self.g += dt * dg;
    }

    fn crossed(&self, model: &CurrentBasedLifModel, t: f64) -> bool {
        !is_refractory(self.last_spike, model.params.tau_ref, t) && self.v > self.vth
    }

    fn reset(&mut self, model: &CurrentBasedLifModel, t: f64) {
        self.v = model.params.v_rest;
        self.last_spike = t;
    }

    fn variable(&self, model: &CurrentBasedLifModel, name: &str, t: f64) -> Option<f64> {
        match name {
            "v" => Some(self.v),
            "g" => Some(self.g),
            "vth" => Some(self.vth),
            "I" => Some(model.input_current.at(t)),
            _ => None,
        }
    }

    fn target_mut(&mut self, target: SynapticTarget) -> Option<&mut f64> {
        match target {
            SynapticTarget::Potential => Some(&mut self.v),
            SynapticTarget::Conductance => None,
        }
    }

    fn accepts(target: SynapticTarget) -> bool {
        target == SynapticTarget::Potential
    }
}

/// A generator replaying prescribed spikes.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct SpikeGenerator {
    size: usize,
    /// Pairs of (time, neuron index), sorted by time.
    spikes: Vec<(f64, usize)>,
}

impl SpikeGenerator {
    pub fn build(size: usize, indices: &[usize], times: &[f64]) -> Result<Self, SNNError> {
        let mut generator = SpikeGenerator {
            size,
            spikes: vec![],
        };
        generator.set_spikes(indices, times)?;
        Ok(generator)
    }

    /// Replace the programmed spikes.
    pub fn set_spikes(&mut self, indices: &[usize], times: &[f64]) -> Result<(), SNNError> {
        if indices.len() != times.len() {
            return Err(SNNError::DimensionMismatch(format!(
                "{} spike indices for {} spike times",
                indices.len(),
                times.len()
            )));
        }
        if let Some(&i) = indices.iter().find(|&&i| i >= self.size) {
            return Err(SNNError::InvalidParameters(format!(
                "Spike index {} out of bounds for a generator of {} neurons",
                i, self.size
            )));
        }
        if times.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(SNNError::InvalidParameters(
                "Spike times must be finite and non-negative".to_string(),
            ));
        }

        let mut spikes: Vec<(f64, usize)> = times
            .iter()
            .copied()
            .zip(indices.iter().copied())
            .collect();
        spikes.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.spikes = spikes;
        Ok(())
    }

    /// Returns the programmed (time, index) pairs.
    pub fn spikes(&self) -> &[(f64, usize)] {
        &self.spikes
    }

    /// Check that no neuron is programmed to spike twice within one time step of length `dt`.
    pub fn check_time_step(&self, dt: f64) -> Result<(), SNNError> {
        let duplicate = self
            .spikes
            .iter()
            .map(|(time, i)| (*i, (time / dt + 0.5).floor() as i64))
            .duplicates()
            .next();
        match duplicate {
            Some((i, step)) => Err(SNNError::InvalidParameters(format!(
                "Neuron {} spikes more than once around t = {} ms with a time step of {} ms",
                i,
                step as f64 * dt,
                dt
            ))),
            None => Ok(()),
        }
    }

    /// Returns the indices of the neurons spiking in the time bin `[t - dt/2, t + dt/2)`.
    fn emit(&self, t: f64, dt: f64) -> Vec<usize> {
        let lo = self.spikes.partition_point(|(time, _)| *time < t - 0.5 * dt);
        let hi = self.spikes.partition_point(|(time, _)| *time < t + 0.5 * dt);
        self.spikes[lo..hi].iter().map(|(_, i)| *i).collect()
    }
}

/// A population of neurons sharing one model.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Population {
    Lif {
        params: LifParams,
        neurons: Vec<LifNeuron>,
    },
    DiehlCookLif {
        params: DiehlCookParams,
        neurons: Vec<DiehlCookNeuron>,
    },
    Izhikevich {
        preset: IzhikevichPreset,
        params: IzhikevichParams,
        neurons: Vec<IzhikevichNeuron>,
    },
    CurrentBasedLif {
        model: CurrentBasedLifModel,
        neurons: Vec<CurrentBasedLifNeuron>,
    },
    /// Independent Poisson spike sources with a common rate (in Hz).
    PoissonInput { size: usize, rate: f64 },
    SpikeGenerator(SpikeGenerator),
}

/// The numeric state of a population, as saved by a checkpoint.
#[derive(Debug, PartialEq, Clone)]
pub enum PopulationState {
    Lif(Vec<LifNeuron>),
    DiehlCookLif(Vec<DiehlCookNeuron>),
    Izhikevich(Vec<IzhikevichNeuron>),
    CurrentBasedLif(Vec<CurrentBasedLifNeuron>),
    Stateless,
}

impl Population {
    /// Returns the number of neurons in the population.
    pub fn size(&self) -> usize {
        match self {
            Population::Lif { neurons, .. } => neurons.len(),
            Population::DiehlCookLif { neurons, .. } => neurons.len(),
            Population::Izhikevich { neurons, .. } => neurons.len(),
            Population::CurrentBasedLif { neurons, .. } => neurons.len(),
            Population::PoissonInput { size, .. } => *size,
            Population::SpikeGenerator(generator) => generator.size,
        }
    }

    /// Returns the name of the population model.
    pub fn kind(&self) -> &'static str {
        match self {
            Population::Lif { .. } => "LIF",
            Population::DiehlCookLif { .. } => "DiehlCookLIF",
            Population::Izhikevich { .. } => "Izhikevich",
            Population::CurrentBasedLif { .. } => "CurrentBasedLIF",
            Population::PoissonInput { .. } => "PoissonInput",
            Population::SpikeGenerator(_) => "ManualSpikeInput",
        }
    }

    /// Returns true for spike sources without membrane dynamics.
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            Population::PoissonInput { .. } | Population::SpikeGenerator(_)
        )
    }

    /// Returns true if synapses can write to the given state variable of the population.
    pub fn accepts(&self, target: SynapticTarget) -> bool {
        match self {
            Population::Lif { .. } => LifNeuron::accepts(target),
            Population::DiehlCookLif { .. } => DiehlCookNeuron::accepts(target),
            Population::Izhikevich { .. } => IzhikevichNeuron::accepts(target),
            Population::CurrentBasedLif { .. } => CurrentBasedLifNeuron::accepts(target),
            Population::PoissonInput { .. } | Population::SpikeGenerator(_) => false,
        }
    }

    /// Check that the population can be simulated with a time step of length `dt`.
    pub fn check_time_step(&self, dt: f64) -> Result<(), SNNError> {
        match self {
            Population::PoissonInput { rate, .. } if rate * dt / 1000.0 > 1.0 => {
                Err(SNNError::InvalidParameters(format!(
                    "Poisson rate {} Hz is too high for a time step of {} ms",
                    rate, dt
                )))
            }
            Population::SpikeGenerator(generator) => generator.check_time_step(dt),
            _ => Ok(()),
        }
    }

    /// Integrate the population over one time step and returns the indices of the spiking neurons.
    pub fn step<R: Rng>(&mut self, t: f64, dt: f64, rng: &mut R) -> Vec<usize> {
        match self {
            Population::Lif { params, neurons } => step_neurons(neurons, params, t, dt),
            Population::DiehlCookLif { params, neurons } => step_neurons(neurons, params, t, dt),
            Population::Izhikevich {
                params, neurons, ..
            } => step_neurons(neurons, params, t, dt),
            Population::CurrentBasedLif { model, neurons } => step_neurons(neurons, model, t, dt),
            Population::PoissonInput { size, rate } => {
                let p = (*rate * dt / 1000.0).clamp(0.0, 1.0);
                (0..*size).filter(|_| rng.gen_bool(p)).collect()
            }
            Population::SpikeGenerator(generator) => generator.emit(t, dt),
        }
    }

    /// Apply the reset rule to the neurons that spiked at time `t`.
    pub fn reset(&mut self, spikes: &[usize], t: f64) {
        match self {
            Population::Lif { params, neurons } => {
                spikes.iter().for_each(|&i| neurons[i].reset(params, t))
            }
            Population::DiehlCookLif { params, neurons } => {
                spikes.iter().for_each(|&i| neurons[i].reset(params, t))
            }
            Population::Izhikevich {
                params, neurons, ..
            } => spikes.iter().for_each(|&i| neurons[i].reset(params, t)),
            Population::CurrentBasedLif { model, neurons } => {
                spikes.iter().for_each(|&i| neurons[i].reset(model, t))
            }
            Population::PoissonInput { .. } | Population::SpikeGenerator(_) => {}
        }
    }

    /// Add `amount` to the synaptic target of neuron `index`.
    /// Populations without such a target are left untouched; compatibility is checked when wiring the network.
    pub fn inject(&mut self, index: usize, target: SynapticTarget, amount: f64) {
        let value = match self {
            Population::Lif { neurons, .. } => {
                neurons.get_mut(index).and_then(|n| n.target_mut(target))
            }
            Population::DiehlCookLif { neurons, .. } => {
                neurons.get_mut(index).and_then(|n| n.target_mut(target))
            }
            Population::Izhikevich { neurons, .. } => {
                neurons.get_mut(index).and_then(|n| n.target_mut(target))
            }
            Population::CurrentBasedLif { neurons, .. } => {
                neurons.get_mut(index).and_then(|n| n.target_mut(target))
            }
            Population::PoissonInput { .. } | Population::SpikeGenerator(_) => None,
        };
        if let Some(value) = value {
            *value += amount;
        }
    }

    /// Returns the values of a named state variable for all neurons at time `t`, if the model has it.
    pub fn variable(&self, name: &str, t: f64) -> Option<Vec<f64>> {
        fn collect<N: NeuronDynamics>(
            neurons: &[N],
            params: &N::Params,
            name: &str,
            t: f64,
        ) -> Option<Vec<f64>> {
            neurons
                .iter()
                .map(|neuron| neuron.variable(params, name, t))
                .collect()
        }

        match self {
            Population::Lif { params, neurons } => collect(neurons, params, name, t),
            Population::DiehlCookLif { params, neurons } => collect(neurons, params, name, t),
            Population::Izhikevich {
                params, neurons, ..
            } => collect(neurons, params, name, t),
            Population::CurrentBasedLif { model, neurons } => collect(neurons, model, name, t),
            Population::PoissonInput { .. } | Population::SpikeGenerator(_) => None,
        }
    }

    /// Returns a copy of the numeric state of the population.
    pub fn snapshot(&self) -> PopulationState {
        match self {
            Population::Lif { neurons, .. } => PopulationState::Lif(neurons.clone()),
            Population::DiehlCookLif { neurons, .. } => {
                PopulationState::DiehlCookLif(neurons.clone())
            }
            Population::Izhikevich { neurons, .. } => PopulationState::Izhikevich(neurons.clone()),
            Population::CurrentBasedLif { neurons, .. } => {
                PopulationState::CurrentBasedLif(neurons.clone())
            }
            Population::PoissonInput { .. } | Population::SpikeGenerator(_) => {
                PopulationState::Stateless
            }
        }
    }

    /// Overwrite the numeric state of the population with a snapshot taken from it.
    pub fn restore(&mut self, state: &PopulationState) -> Result<(), SNNError> {
        match (self, state) {
            (Population::Lif { neurons, .. }, PopulationState::Lif(saved)) => {
                neurons.clone_from(saved)
            }
            (Population::DiehlCookLif { neurons, .. }, PopulationState::DiehlCookLif(saved)) => {
                neurons.clone_from(saved)
            }
            (Population::Izhikevich { neurons, .. }, PopulationState::Izhikevich(saved)) => {
                neurons.clone_from(saved)
            }
            (
                Population::CurrentBasedLif { neurons, .. },
                PopulationState::CurrentBasedLif(saved),
            ) => neurons.clone_from(saved),
            (
                Population::PoissonInput { .. } | Population::SpikeGenerator(_),
                PopulationState::Stateless,
            ) => {}
            (population, _) => {
                return Err(SNNError::InvalidOperation(format!(
                    "Snapshot does not match a {} population",
                    population.kind()
                )))
            }
        }
        Ok(())
    }
}
