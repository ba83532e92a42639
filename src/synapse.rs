//! Synapse models and plasticity rules.
//!
//! Traces marked as event-driven are only brought up to date when a pre- or postsynaptic spike is processed,
//! using their exact exponential decay since the last event. Clock-driven variables are integrated with Euler.
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::SNNError;
use crate::neuron::SynapticTarget;
use crate::MIN_PARALLEL_NEURONS;

/// Factor biasing the STDP window towards depression.
pub const DEPRESSION_BIAS: f64 = 1.05;

/// Per-synapse dynamics: the pre- and postsynaptic update rules and the clock-driven part.
pub trait SynapseDynamics: Clone + Send + Sync {
    type Params: Sync;

    /// The state variable of the target neuron receiving the synaptic input.
    const TARGET: SynapticTarget;

    /// Process a presynaptic spike at time `t` and returns the amount added to the target neuron.
    fn on_pre(&mut self, params: &Self::Params, t: f64) -> f64;

    /// Process a postsynaptic spike at time `t`.
    fn on_post(&mut self, params: &Self::Params, t: f64);

    /// Advance the clock-driven variables by one Euler step of length `dt`.
    fn integrate(&mut self, _params: &Self::Params, _dt: f64) {}

    /// Move the time of the last trace update by `offset`.
    fn shift_clock(&mut self, _offset: f64) {}

    /// Returns the value of a named state variable, if the model has it.
    fn variable(&self, name: &str) -> Option<f64>;

    /// Returns the efficacy of the synapse.
    fn efficacy(&self) -> f64;
}

fn decay(value: f64, elapsed: f64, tau: f64) -> f64 {
    value * (-elapsed / tau).exp()
}

/// A static synapse adding its weight to the postsynaptic potential.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ForwardSynapse {
    pub w: f64,
}

impl SynapseDynamics for ForwardSynapse {
    type Params = ();

    const TARGET: SynapticTarget = SynapticTarget::Potential;

    fn on_pre(&mut self, _params: &(), _t: f64) -> f64 {
        self.w
    }

    fn on_post(&mut self, _params: &(), _t: f64) {}

    fn variable(&self, name: &str) -> Option<f64> {
        match name {
            "w" => Some(self.w),
            _ => None,
        }
    }

    fn efficacy(&self) -> f64 {
        self.w
    }
}

/// Parameters of the pair-based STDP rule.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct StdpParams {
    pub gmax: f64,
    /// Potentiation amplitude, relative to `gmax`.
    pub d_apre: f64,
    /// Membrane time constant of the neurons the rule was tuned for. Not used by the update.
    pub taum: f64,
    pub taupre: f64,
    pub taupost: f64,
}

impl Default for StdpParams {
    fn default() -> Self {
        StdpParams {
            gmax: 1.0,
            d_apre: 1.0,
            taum: 10.0,
            taupre: 20.0,
            taupost: 20.0,
        }
    }
}

/// The absolute trace increments of the pair-based STDP rule.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct StdpAmplitudes {
    pub d_apre: f64,
    pub d_apost: f64,
}

impl StdpParams {
    pub fn validate(&self) -> Result<(), SNNError> {
        if !(self.gmax >= 0.0) {
            return Err(SNNError::InvalidParameters(
                "STDP maximum weight must be non-negative".to_string(),
            ));
        }
        if !(self.taupre > 0.0 && self.taupost > 0.0) {
            return Err(SNNError::InvalidParameters(
                "STDP trace time constants must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the trace increments, with the depression amplitude balancing the potentiation one.
    /// The parameters themselves are left untouched.
    pub fn amplitudes(&self) -> StdpAmplitudes {
        StdpAmplitudes {
            d_apre: self.d_apre * self.gmax,
            d_apost: -self.d_apre * self.taupre / self.taupost * DEPRESSION_BIAS * self.gmax,
        }
    }
}

/// The resolved STDP rule carried by a connection.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct StdpRule {
    pub params: StdpParams,
    pub amplitudes: StdpAmplitudes,
}

impl From<StdpParams> for StdpRule {
    fn from(params: StdpParams) -> Self {
        let amplitudes = params.amplitudes();
        StdpRule { params, amplitudes }
    }
}

/// A synapse with pair-based STDP on its weight.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct StdpSynapse {
    pub w: f64,
    pub apre: f64,
    pub apost: f64,
    pub last_update: f64,
}

impl StdpSynapse {
    pub fn new(w: f64) -> Self {
        StdpSynapse {
            w,
            apre: 0.0,
            apost: 0.0,
            last_update: 0.0,
        }
    }

    fn update_traces(&mut self, params: &StdpParams, t: f64) {
        let elapsed = t - self.last_update;
        self.apre = decay(self.apre, elapsed, params.taupre);
        self.apost = decay(self.apost, elapsed, params.taupost);
        self.last_update = t;
    }
}

impl SynapseDynamics for StdpSynapse {
    type Params = StdpRule;

    const TARGET: SynapticTarget = SynapticTarget::Conductance;

    fn on_pre(&mut self, rule: &StdpRule, t: f64) -> f64 {
        self.update_traces(&rule.params, t);
        let injected = self.w;
        self.apre += rule.amplitudes.d_apre;
        self.w = (self.w + self.apost).clamp(0.0, rule.params.gmax);
        injected
    }

    fn on_post(&mut self, rule: &StdpRule, t: f64) {
        self.update_traces(&rule.params, t);
        self.apost += rule.amplitudes.d_apost;
        self.w = (self.w + self.apre).clamp(0.0, rule.params.gmax);
    }

    fn shift_clock(&mut self, offset: f64) {
        self.last_update += offset;
    }

    fn variable(&self, name: &str) -> Option<f64> {
        match name {
            "w" => Some(self.w),
            "Apre" => Some(self.apre),
            "Apost" => Some(self.apost),
            _ => None,
        }
    }

    fn efficacy(&self) -> f64 {
        self.w
    }
}

/// Parameters of the triplet-like STDP rule of Diehl and Cook.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DiehlCookStdpParams {
    pub tc_pre: f64,
    pub tc_post_1: f64,
    pub tc_post_2: f64,
    pub nu_pre: f64,
    pub nu_post: f64,
    pub wmax: f64,
    /// Weight-dependence exponent of the postsynaptic update. The update is additive and does not use it.
    pub exp_post: f64,
}

impl Default for DiehlCookStdpParams {
    fn default() -> Self {
        DiehlCookStdpParams {
            tc_pre: 20.0,
            tc_post_1: 20.0,
            tc_post_2: 40.0,
            nu_pre: 0.0001,
            nu_post: 0.01,
            wmax: 1.0,
            exp_post: 0.2,
        }
    }
}

impl DiehlCookStdpParams {
    pub fn validate(&self) -> Result<(), SNNError> {
        if !(self.tc_pre > 0.0 && self.tc_post_1 > 0.0 && self.tc_post_2 > 0.0) {
            return Err(SNNError::InvalidParameters(
                "Trace time constants must be positive".to_string(),
            ));
        }
        if !(self.wmax >= 0.0) {
            return Err(SNNError::InvalidParameters(
                "Maximum weight must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// A synapse with one presynaptic trace and a fast and a slow postsynaptic trace.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DiehlCookSynapse {
    pub w: f64,
    pub pre: f64,
    pub post1: f64,
    pub post2: f64,
    pub post2before: f64,
    pub last_update: f64,
}

impl DiehlCookSynapse {
    pub fn new(w: f64) -> Self {
        DiehlCookSynapse {
            w,
            pre: 0.0,
            post1: 0.0,
            post2: 0.0,
            post2before: 0.0,
            last_update: 0.0,
        }
    }

    fn update_traces(&mut self, params: &DiehlCookStdpParams, t: f64) {
        let elapsed = t - self.last_update;
        self.pre = decay(self.pre, elapsed, params.tc_pre);
        self.post1 = decay(self.post1, elapsed, params.tc_post_1);
        self.post2 = decay(self.post2, elapsed, params.tc_post_2);
        self.last_update = t;
    }
}

impl SynapseDynamics for DiehlCookSynapse {
    type Params = DiehlCookStdpParams;

    const TARGET: SynapticTarget = SynapticTarget::Conductance;

    fn on_pre(&mut self, params: &DiehlCookStdpParams, t: f64) -> f64 {
        self.update_traces(params, t);
        let injected = self.w;
        self.pre = 1.0;
        self.w = (self.w + params.nu_pre * self.post1).clamp(0.0, params.wmax);
        injected
    }

    fn on_post(&mut self, params: &DiehlCookStdpParams, t: f64) {
        self.update_traces(params, t);
        // The slow trace is sampled before the spike resets it
        self.post2before = self.post2;
        self.w = (self.w + params.nu_post * self.pre * self.post2before).clamp(0.0, params.wmax);
        self.post1 = 1.0;
        self.post2 = 1.0;
    }

    fn shift_clock(&mut self, offset: f64) {
        self.last_update += offset;
    }

    fn variable(&self, name: &str) -> Option<f64> {
        match name {
            "w" => Some(self.w),
            "pre" => Some(self.pre),
            "post1" => Some(self.post1),
            "post2" => Some(self.post2),
            "post2before" => Some(self.post2before),
            _ => None,
        }
    }

    fn efficacy(&self) -> f64 {
        self.w
    }
}

/// Parameters of the dopamine-modulated STDP rule.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DaStdpParams {
    pub gmax: f64,
    /// Absolute increment of the presynaptic trace.
    pub d_apre: f64,
    /// Absolute increment of the postsynaptic trace.
    pub d_apost: f64,
    /// Membrane time constant of the neurons the rule was tuned for. Not used by the update.
    pub taum: f64,
    pub taupre: f64,
    pub taupost: f64,
    pub tauc: f64,
    pub taud: f64,
    pub taus: f64,
    /// Dopamine released by one reward.
    pub epsilon_dopa: f64,
}

impl Default for DaStdpParams {
    fn default() -> Self {
        let gmax = 0.01;
        let d_apre = 0.01;
        let taupre = 20.0;
        let taupost = 20.0;
        DaStdpParams {
            gmax,
            d_apre: d_apre * gmax,
            d_apost: -d_apre * taupre / taupost * DEPRESSION_BIAS * gmax,
            taum: 10.0,
            taupre,
            taupost,
            tauc: 1000.0,
            taud: 200.0,
            taus: 1.0,
            epsilon_dopa: 5e-3,
        }
    }
}

impl DaStdpParams {
    pub fn validate(&self) -> Result<(), SNNError> {
        let taus = [self.taupre, self.taupost, self.tauc, self.taud, self.taus];
        if taus.iter().any(|tau| !(*tau > 0.0)) {
            return Err(SNNError::InvalidParameters(
                "Dopamine-modulated STDP time constants must be positive".to_string(),
            ));
        }
        if !(self.gmax >= 0.0) {
            return Err(SNNError::InvalidParameters(
                "Maximum weight must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Initial value of the eligibility trace and the synaptic strength.
const DA_STDP_INIT: f64 = 1e-10;

/// A synapse whose strength integrates the product of an eligibility trace and a dopamine concentration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct DaStdpSynapse {
    /// Plasticity gate: 1 routes STDP to the eligibility trace, 0 applies it to the strength directly.
    pub mode: f64,
    /// Eligibility trace.
    pub c: f64,
    /// Dopamine concentration.
    pub d: f64,
    /// Synaptic strength.
    pub s: f64,
    pub apre: f64,
    pub apost: f64,
    pub last_update: f64,
}

impl DaStdpSynapse {
    pub fn new() -> Self {
        DaStdpSynapse {
            mode: 1.0,
            c: DA_STDP_INIT,
            d: 0.0,
            s: DA_STDP_INIT,
            apre: 0.0,
            apost: 0.0,
            last_update: 0.0,
        }
    }

    fn update_traces(&mut self, params: &DaStdpParams, t: f64) {
        let elapsed = t - self.last_update;
        self.apre = decay(self.apre, elapsed, params.taupre);
        self.apost = decay(self.apost, elapsed, params.taupost);
        self.last_update = t;
    }
}

impl Default for DaStdpSynapse {
    fn default() -> Self {
        Self::new()
    }
}

impl SynapseDynamics for DaStdpSynapse {
    type Params = DaStdpParams;

    const TARGET: SynapticTarget = SynapticTarget::Conductance;

    fn on_pre(&mut self, params: &DaStdpParams, t: f64) -> f64 {
        self.update_traces(params, t);
        let injected = self.s;
        self.apre += params.d_apre;
        self.c = (self.c + self.mode * self.apost).clamp(-params.gmax, params.gmax);
        self.s = (self.s + (1.0 - self.mode) * self.apost).clamp(-params.gmax, params.gmax);
        injected
    }

    fn on_post(&mut self, params: &DaStdpParams, t: f64) {
        self.update_traces(params, t);
        self.apost += params.d_apost;
        self.c = (self.c + self.mode * self.apre).clamp(-params.gmax, params.gmax);
        self.s = (self.s + (1.0 - self.mode) * self.apre).clamp(-params.gmax, params.gmax);
    }

    fn integrate(&mut self, params: &DaStdpParams, dt: f64) {
        let dc = -self.c / params.tauc;
        let dd = -self.d / params.taud;
        let ds = self.mode * self.c * self.d / params.taus;
        self.c += dt * dc;
        self.d += dt * dd;
        self.s += dt * ds;
    }

    fn shift_clock(&mut self, offset: f64) {
        self.last_update += offset;
    }

    fn variable(&self, name: &str) -> Option<f64> {
        match name {
            "s" => Some(self.s),
            "c" => Some(self.c),
            "d" => Some(self.d),
            "mode" => Some(self.mode),
            "Apre" => Some(self.apre),
            "Apost" => Some(self.apost),
            _ => None,
        }
    }

    fn efficacy(&self) -> f64 {
        self.s
    }
}

/// The synapses of one connection, all sharing one model.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub enum Synapses {
    Forward(Vec<ForwardSynapse>),
    Stdp {
        rule: StdpRule,
        synapses: Vec<StdpSynapse>,
    },
    DiehlCookStdp {
        params: DiehlCookStdpParams,
        synapses: Vec<DiehlCookSynapse>,
    },
    DaStdp {
        params: DaStdpParams,
        synapses: Vec<DaStdpSynapse>,
    },
}

/// The numeric state of the synapses of a connection, as saved by a checkpoint.
#[derive(Debug, PartialEq, Clone)]
pub enum SynapsesState {
    Forward(Vec<ForwardSynapse>),
    Stdp(Vec<StdpSynapse>),
    DiehlCookStdp(Vec<DiehlCookSynapse>),
    DaStdp(Vec<DaStdpSynapse>),
}

impl Synapses {
    /// Returns the name of the synapse model.
    pub fn kind(&self) -> &'static str {
        match self {
            Synapses::Forward(_) => "Forward",
            Synapses::Stdp { .. } => "STDP",
            Synapses::DiehlCookStdp { .. } => "DiehlCookSTDP",
            Synapses::DaStdp { .. } => "DA_STDP",
        }
    }

    /// Returns the number of synapses.
    pub fn len(&self) -> usize {
        match self {
            Synapses::Forward(synapses) => synapses.len(),
            Synapses::Stdp { synapses, .. } => synapses.len(),
            Synapses::DiehlCookStdp { synapses, .. } => synapses.len(),
            Synapses::DaStdp { synapses, .. } => synapses.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The state variable of the target neurons receiving the synaptic input.
    pub fn target(&self) -> SynapticTarget {
        match self {
            Synapses::Forward(_) => ForwardSynapse::TARGET,
            Synapses::Stdp { .. } => StdpSynapse::TARGET,
            Synapses::DiehlCookStdp { .. } => DiehlCookSynapse::TARGET,
            Synapses::DaStdp { .. } => DaStdpSynapse::TARGET,
        }
    }

    /// The variables monitored by default for this model.
    pub fn recorded_variables(&self) -> Vec<String> {
        let names: &[&str] = match self {
            Synapses::Forward(_) => &[],
            Synapses::Stdp { .. } | Synapses::DiehlCookStdp { .. } => &["w"],
            Synapses::DaStdp { .. } => &["s", "c", "d"],
        };
        names.iter().map(|name| name.to_string()).collect()
    }

    /// Process a presynaptic spike on synapse `k` and returns the amount added to its target.
    pub fn on_pre(&mut self, k: usize, t: f64) -> f64 {
        match self {
            Synapses::Forward(synapses) => synapses[k].on_pre(&(), t),
            Synapses::Stdp { rule, synapses } => synapses[k].on_pre(rule, t),
            Synapses::DiehlCookStdp { params, synapses } => synapses[k].on_pre(params, t),
            Synapses::DaStdp { params, synapses } => synapses[k].on_pre(params, t),
        }
    }

    /// Process a postsynaptic spike on synapse `k`.
    pub fn on_post(&mut self, k: usize, t: f64) {
        match self {
            Synapses::Forward(synapses) => synapses[k].on_post(&(), t),
            Synapses::Stdp { rule, synapses } => synapses[k].on_post(rule, t),
            Synapses::DiehlCookStdp { params, synapses } => synapses[k].on_post(params, t),
            Synapses::DaStdp { params, synapses } => synapses[k].on_post(params, t),
        }
    }

    /// Advance the clock-driven variables of all synapses by one time step.
    pub fn integrate(&mut self, dt: f64) {
        fn integrate_all<S: SynapseDynamics>(synapses: &mut [S], params: &S::Params, dt: f64) {
            if synapses.len() > MIN_PARALLEL_NEURONS {
                synapses
                    .par_iter_mut()
                    .for_each(|synapse| synapse.integrate(params, dt));
            } else {
                synapses
                    .iter_mut()
                    .for_each(|synapse| synapse.integrate(params, dt));
            }
        }

        // Only the dopamine-modulated rule has clock-driven variables
        if let Synapses::DaStdp { params, synapses } = self {
            integrate_all(synapses, params, dt);
        }
    }

    /// Move the last trace update of all synapses by `offset`, keeping the time elapsed since then
    /// unchanged when the network clock jumps by the same amount.
    pub fn shift_clock(&mut self, offset: f64) {
        match self {
            Synapses::Forward(_) => {}
            Synapses::Stdp { synapses, .. } => {
                synapses.iter_mut().for_each(|s| s.shift_clock(offset))
            }
            Synapses::DiehlCookStdp { synapses, .. } => {
                synapses.iter_mut().for_each(|s| s.shift_clock(offset))
            }
            Synapses::DaStdp { synapses, .. } => {
                synapses.iter_mut().for_each(|s| s.shift_clock(offset))
            }
        }
    }

    /// Returns the value of a named variable of synapse `k`, if the model has it.
    pub fn variable(&self, k: usize, name: &str) -> Option<f64> {
        match self {
            Synapses::Forward(synapses) => synapses.get(k)?.variable(name),
            Synapses::Stdp { synapses, .. } => synapses.get(k)?.variable(name),
            Synapses::DiehlCookStdp { synapses, .. } => synapses.get(k)?.variable(name),
            Synapses::DaStdp { synapses, .. } => synapses.get(k)?.variable(name),
        }
    }

    /// Returns true if the model has a variable with this name.
    pub fn has_variable(&self, name: &str) -> bool {
        match self {
            Synapses::Forward(_) => ForwardSynapse { w: 0.0 }.variable(name).is_some(),
            Synapses::Stdp { .. } => StdpSynapse::new(0.0).variable(name).is_some(),
            Synapses::DiehlCookStdp { .. } => DiehlCookSynapse::new(0.0).variable(name).is_some(),
            Synapses::DaStdp { .. } => DaStdpSynapse::new().variable(name).is_some(),
        }
    }

    /// Returns the efficacies of all synapses (the weight, or the strength for dopamine-modulated synapses).
    pub fn efficacies(&self) -> Vec<f64> {
        match self {
            Synapses::Forward(synapses) => synapses.iter().map(|s| s.efficacy()).collect(),
            Synapses::Stdp { synapses, .. } => synapses.iter().map(|s| s.efficacy()).collect(),
            Synapses::DiehlCookStdp { synapses, .. } => {
                synapses.iter().map(|s| s.efficacy()).collect()
            }
            Synapses::DaStdp { synapses, .. } => synapses.iter().map(|s| s.efficacy()).collect(),
        }
    }

    /// Release one dose of dopamine on every synapse of a dopamine-modulated connection.
    pub fn release_dopamine(&mut self) -> Result<(), SNNError> {
        match self {
            Synapses::DaStdp { params, synapses } => {
                synapses.iter_mut().for_each(|s| s.d += params.epsilon_dopa);
                Ok(())
            }
            other => Err(SNNError::InvalidOperation(format!(
                "Dopamine cannot be released on {} synapses",
                other.kind()
            ))),
        }
    }

    /// Returns a copy of the numeric state of the synapses.
    pub fn snapshot(&self) -> SynapsesState {
        match self {
            Synapses::Forward(synapses) => SynapsesState::Forward(synapses.clone()),
            Synapses::Stdp { synapses, .. } => SynapsesState::Stdp(synapses.clone()),
            Synapses::DiehlCookStdp { synapses, .. } => {
                SynapsesState::DiehlCookStdp(synapses.clone())
            }
            Synapses::DaStdp { synapses, .. } => SynapsesState::DaStdp(synapses.clone()),
        }
    }

    /// Overwrite the numeric state of the synapses with a snapshot taken from them.
    pub fn restore(&mut self, state: &SynapsesState) -> Result<(), SNNError> {
        match (self, state) {
            (Synapses::Forward(synapses), SynapsesState::Forward(saved)) => {
                synapses.clone_from(saved)
            }
            (Synapses::Stdp { synapses, .. }, SynapsesState::Stdp(saved)) => {
                synapses.clone_from(saved)
            }
            (Synapses::DiehlCookStdp { synapses, .. }, SynapsesState::DiehlCookStdp(saved)) => {
                synapses.clone_from(saved)
            }
            (Synapses::DaStdp { synapses, .. }, SynapsesState::DaStdp(saved)) => {
                synapses.clone_from(saved)
            }
            (synapses, _) => {
                return Err(SNNError::InvalidOperation(format!(
                    "Snapshot does not match {} synapses",
                    synapses.kind()
                )))
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_stdp_amplitudes() {
        let params = StdpParams::default();
        let amplitudes = params.amplitudes();
        assert_relative_eq!(amplitudes.d_apre, 1.0);
        assert_relative_eq!(amplitudes.d_apost, -1.05);

        let params = StdpParams {
            gmax: 0.5,
            d_apre: 0.2,
            taupre: 10.0,
            taupost: 40.0,
            ..Default::default()
        };
        let amplitudes = params.amplitudes();
        assert_relative_eq!(amplitudes.d_apre, 0.1);
        assert_relative_eq!(amplitudes.d_apost, -0.2 * 0.25 * 1.05 * 0.5);
        // The caller's parameters are not rescaled
        assert_eq!(params.d_apre, 0.2);
    }

    #[test]
    fn test_da_stdp_default_amplitudes() {
        let params = DaStdpParams::default();
        assert_relative_eq!(params.d_apre, 1e-4);
        assert_relative_eq!(params.d_apost, -1.05e-4);
    }

    #[test]
    fn test_stdp_potentiation_and_depression() {
        let rule = StdpRule::from(StdpParams {
            d_apre: 0.01,
            ..Default::default()
        });

        // Pre then post: potentiation
        let mut synapse = StdpSynapse::new(0.5);
        assert_eq!(synapse.on_pre(&rule, 10.0), 0.5);
        synapse.on_post(&rule, 15.0);
        assert_relative_eq!(synapse.w, 0.5 + 0.01 * (-5.0_f64 / 20.0).exp());

        // Post then pre: depression
        let mut synapse = StdpSynapse::new(0.5);
        synapse.on_post(&rule, 10.0);
        synapse.on_pre(&rule, 15.0);
        assert_relative_eq!(synapse.w, 0.5 - 0.0105 * (-5.0_f64 / 20.0).exp());
    }

    #[test]
    fn test_stdp_weights_stay_clipped() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let rule = StdpRule::from(StdpParams::default());
        let mut synapses: Vec<StdpSynapse> = (0..10).map(|_| StdpSynapse::new(rng.gen())).collect();

        let mut t = 0.0;
        for _ in 0..10_000 {
            t += rng.gen_range(0.0..5.0);
            for synapse in synapses.iter_mut() {
                if rng.gen_bool(0.5) {
                    synapse.on_pre(&rule, t);
                } else {
                    synapse.on_post(&rule, t);
                }
                assert!(synapse.w >= 0.0 && synapse.w <= rule.params.gmax);
            }
        }
    }

    #[test]
    fn test_diehl_cook_weights_stay_clipped() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let params = DiehlCookStdpParams {
            nu_pre: 0.5,
            nu_post: 0.5,
            wmax: 0.8,
            ..Default::default()
        };
        let mut synapse = DiehlCookSynapse::new(0.4);
        let mut t = 0.0;
        for _ in 0..10_000 {
            t += rng.gen_range(0.0..3.0);
            if rng.gen_bool(0.5) {
                synapse.on_pre(&params, t);
            } else {
                synapse.on_post(&params, t);
            }
            assert!(synapse.w >= 0.0 && synapse.w <= params.wmax);
        }
    }

    #[test]
    fn test_diehl_cook_post_uses_slow_trace_before_reset() {
        let params = DiehlCookStdpParams::default();
        let mut synapse = DiehlCookSynapse::new(0.5);
        synapse.on_pre(&params, 0.0);
        synapse.on_post(&params, 10.0);
        // No earlier postsynaptic spike: the slow trace was zero before this one
        assert_eq!(synapse.post2before, 0.0);
        assert_eq!(synapse.w, 0.5);
        assert_eq!(synapse.post2, 1.0);

        synapse.on_post(&params, 50.0);
        let post2before = (-40.0_f64 / 40.0).exp();
        let pre = (-50.0_f64 / 20.0).exp();
        assert_relative_eq!(synapse.post2before, post2before);
        assert_relative_eq!(synapse.w, 0.5 + 0.01 * pre * post2before, epsilon = 1e-12);
    }

    #[test]
    fn test_da_stdp_requires_dopamine() {
        let params = DaStdpParams::default();
        let mut synapse = DaStdpSynapse::new();

        // Causal pairing builds up eligibility but no strength without dopamine
        synapse.on_pre(&params, 0.0);
        synapse.on_post(&params, 5.0);
        assert!(synapse.c > DA_STDP_INIT);
        for _ in 0..1000 {
            synapse.integrate(&params, 0.1);
        }
        assert_relative_eq!(synapse.s, DA_STDP_INIT);

        // Dopamine turns eligibility into strength
        let mut synapses = Synapses::DaStdp {
            params: params.clone(),
            synapses: vec![synapse],
        };
        synapses.release_dopamine().unwrap();
        for _ in 0..1000 {
            synapses.integrate(0.1);
        }
        assert!(synapses.efficacies()[0] > DA_STDP_INIT);
    }

    #[test]
    fn test_da_stdp_mode_gate() {
        let params = DaStdpParams::default();
        let mut synapse = DaStdpSynapse::new();
        synapse.mode = 0.0;
        synapse.on_pre(&params, 0.0);
        synapse.on_post(&params, 5.0);
        // With the gate closed, STDP acts on the strength directly
        assert_relative_eq!(synapse.c, DA_STDP_INIT);
        assert!(synapse.s > DA_STDP_INIT);
        assert!(synapse.s <= params.gmax);
    }

    #[test]
    fn test_release_dopamine_on_static_synapses() {
        let mut synapses = Synapses::Forward(vec![ForwardSynapse { w: 1.0 }]);
        assert!(matches!(
            synapses.release_dopamine(),
            Err(SNNError::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_synapses_snapshot_restore() {
        let mut synapses = Synapses::Stdp {
            rule: StdpRule::from(StdpParams::default()),
            synapses: vec![StdpSynapse::new(0.3), StdpSynapse::new(0.6)],
        };
        let state = synapses.snapshot();
        synapses.on_pre(0, 1.0);
        synapses.on_post(0, 2.0);
        assert_ne!(synapses.snapshot(), state);
        synapses.restore(&state).unwrap();
        assert_eq!(synapses.efficacies(), vec![0.3, 0.6]);
        assert!(synapses
            .restore(&SynapsesState::Forward(vec![]))
            .is_err());
    }

    #[test]
    fn test_shift_clock_preserves_elapsed_time() {
        let mut synapses = Synapses::Stdp {
            rule: StdpRule::from(StdpParams::default()),
            synapses: vec![StdpSynapse::new(0.5)],
        };
        synapses.on_pre(0, 100.0);
        assert_relative_eq!(synapses.variable(0, "Apre").unwrap(), 1.0);

        // The clock jumps back by 100 ms, the next spike comes 10 ms after the previous one
        synapses.shift_clock(-100.0);
        synapses.on_pre(0, 10.0);
        assert_relative_eq!(synapses.variable(0, "Apre").unwrap(), 1.0 + (-0.5_f64).exp());

        let mut forward = Synapses::Forward(vec![ForwardSynapse { w: 0.2 }]);
        forward.shift_clock(-100.0);
        assert_eq!(forward.efficacies(), vec![0.2]);
    }

    #[test]
    fn test_synapses_variables() {
        let synapses = Synapses::DaStdp {
            params: DaStdpParams::default(),
            synapses: vec![DaStdpSynapse::new()],
        };
        assert_eq!(synapses.recorded_variables(), vec!["s", "c", "d"]);
        assert_eq!(synapses.variable(0, "d"), Some(0.0));
        assert_eq!(synapses.variable(1, "d"), None);
        assert!(synapses.has_variable("mode"));
        assert!(!synapses.has_variable("w"));
        assert_eq!(synapses.target(), SynapticTarget::Conductance);

        let synapses = Synapses::Forward(vec![]);
        assert!(synapses.recorded_variables().is_empty());
        assert_eq!(synapses.target(), SynapticTarget::Potential);
    }
}
