//! Connection constructors for every synapse model, and spike propagation.
use rand::Rng;

use crate::error::SNNError;
use crate::neuron::Population;
use crate::synapse::{
    DaStdpParams, DaStdpSynapse, DiehlCookStdpParams, DiehlCookSynapse, ForwardSynapse,
    StdpParams, StdpRule, StdpSynapse, Synapses,
};
use crate::topology::layer::Layer;

/// A named population of synapses from a source layer to a target layer.
/// The layers are referred to by name and must be registered in the same network.
#[derive(Debug, PartialEq, Clone)]
pub struct Connection {
    name: String,
    source: String,
    target: String,
    source_size: usize,
    target_size: usize,
    /// Presynaptic neuron of each synapse.
    pre: Vec<usize>,
    /// Postsynaptic neuron of each synapse.
    post: Vec<usize>,
    synapses: Synapses,
    /// Synapses leaving each source neuron.
    by_pre: Vec<Vec<usize>>,
    /// Synapses reaching each target neuron.
    by_post: Vec<Vec<usize>>,
}

/// Returns the (pre, post) pairs of the synapses, in source-major order.
/// All pairs are connected, unless a connection probability is given.
fn connectivity<R: Rng>(
    source_size: usize,
    target_size: usize,
    connect_prob: Option<f64>,
    rng: &mut R,
) -> Result<Vec<(usize, usize)>, SNNError> {
    let pairs = (0..source_size).flat_map(|i| (0..target_size).map(move |j| (i, j)));
    match connect_prob {
        None => Ok(pairs.collect()),
        Some(p) if (0.0..=1.0).contains(&p) => Ok(pairs.filter(|_| rng.gen_bool(p)).collect()),
        Some(p) => Err(SNNError::InvalidParameters(format!(
            "Connection probability must be in [0, 1], got {}",
            p
        ))),
    }
}

/// Check that a weight matrix indexed `[i][j]` covers all pairs of neurons.
fn check_weights(
    weights: &[Vec<f64>],
    source_size: usize,
    target_size: usize,
) -> Result<(), SNNError> {
    if weights.len() < source_size {
        return Err(SNNError::DimensionMismatch(format!(
            "Weight matrix has {} rows for {} source neurons",
            weights.len(),
            source_size
        )));
    }
    if let Some((i, row)) = weights[..source_size]
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() < target_size)
    {
        return Err(SNNError::DimensionMismatch(format!(
            "Weight matrix row {} has {} columns for {} target neurons",
            i,
            row.len(),
            target_size
        )));
    }
    Ok(())
}

impl Connection {
    fn build(
        name: &str,
        source: &Layer,
        target: &Layer,
        pairs: Vec<(usize, usize)>,
        synapses: Synapses,
    ) -> Self {
        let mut by_pre = vec![vec![]; source.size()];
        let mut by_post = vec![vec![]; target.size()];
        for (k, &(i, j)) in pairs.iter().enumerate() {
            by_pre[i].push(k);
            by_post[j].push(k);
        }
        let (pre, post) = pairs.into_iter().unzip();

        Connection {
            name: name.to_string(),
            source: source.name().to_string(),
            target: target.name().to_string(),
            source_size: source.size(),
            target_size: target.size(),
            pre,
            post,
            synapses,
            by_pre,
            by_post,
        }
    }

    /// Static synapses adding their weight to the postsynaptic potential.
    /// The weights default to zero.
    pub fn forward<R: Rng>(
        name: &str,
        source: &Layer,
        target: &Layer,
        weights: Option<&[Vec<f64>]>,
        connect_prob: Option<f64>,
        rng: &mut R,
    ) -> Result<Self, SNNError> {
        if let Some(weights) = weights {
            check_weights(weights, source.size(), target.size())?;
        }
        let pairs = connectivity(source.size(), target.size(), connect_prob, rng)?;
        let synapses = pairs
            .iter()
            .map(|&(i, j)| ForwardSynapse {
                w: weights.map_or(0.0, |weights| weights[i][j]),
            })
            .collect();
        Ok(Self::build(name, source, target, pairs, Synapses::Forward(synapses)))
    }

    /// Synapses with pair-based STDP.
    /// The weights are clipped into `[0, gmax]`, or drawn uniformly in that range if not provided.
    pub fn stdp<R: Rng>(
        name: &str,
        source: &Layer,
        target: &Layer,
        params: StdpParams,
        weights: Option<&[Vec<f64>]>,
        connect_prob: Option<f64>,
        rng: &mut R,
    ) -> Result<Self, SNNError> {
        params.validate()?;
        if let Some(weights) = weights {
            check_weights(weights, source.size(), target.size())?;
        }
        let pairs = connectivity(source.size(), target.size(), connect_prob, rng)?;
        let synapses = pairs
            .iter()
            .map(|&(i, j)| {
                let w = match weights {
                    Some(weights) => weights[i][j].clamp(0.0, params.gmax),
                    None => rng.gen::<f64>() * params.gmax,
                };
                StdpSynapse::new(w)
            })
            .collect();
        let synapses = Synapses::Stdp {
            rule: StdpRule::from(params),
            synapses,
        };
        Ok(Self::build(name, source, target, pairs, synapses))
    }

    /// Synapses with the STDP rule of Diehl and Cook, initialized from a weight matrix indexed `[i][j]`.
    pub fn diehl_cook_stdp<R: Rng>(
        name: &str,
        source: &Layer,
        target: &Layer,
        params: DiehlCookStdpParams,
        weights: &[Vec<f64>],
        connect_prob: Option<f64>,
        rng: &mut R,
    ) -> Result<Self, SNNError> {
        params.validate()?;
        check_weights(weights, source.size(), target.size())?;
        let pairs = connectivity(source.size(), target.size(), connect_prob, rng)?;
        let synapses = pairs
            .iter()
            .map(|&(i, j)| DiehlCookSynapse::new(weights[i][j].clamp(0.0, params.wmax)))
            .collect();
        let synapses = Synapses::DiehlCookStdp { params, synapses };
        Ok(Self::build(name, source, target, pairs, synapses))
    }

    /// Synapses with dopamine-modulated STDP, with plasticity enabled.
    pub fn da_stdp<R: Rng>(
        name: &str,
        source: &Layer,
        target: &Layer,
        params: DaStdpParams,
        connect_prob: Option<f64>,
        rng: &mut R,
    ) -> Result<Self, SNNError> {
        params.validate()?;
        let pairs = connectivity(source.size(), target.size(), connect_prob, rng)?;
        let synapses = vec![DaStdpSynapse::new(); pairs.len()];
        let synapses = Synapses::DaStdp { params, synapses };
        Ok(Self::build(name, source, target, pairs, synapses))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the source layer.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the name of the target layer.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn source_size(&self) -> usize {
        self.source_size
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    pub fn kind(&self) -> &'static str {
        self.synapses.kind()
    }

    /// Returns the number of synapses.
    pub fn num_synapses(&self) -> usize {
        self.synapses.len()
    }

    pub fn synapses(&self) -> &Synapses {
        &self.synapses
    }

    pub(crate) fn synapses_mut(&mut self) -> &mut Synapses {
        &mut self.synapses
    }

    /// Returns the (pre, post) neurons of synapse `k`.
    pub fn endpoints(&self, k: usize) -> Option<(usize, usize)> {
        Some((*self.pre.get(k)?, *self.post.get(k)?))
    }

    /// The synaptic variables recorded by the connection monitor.
    pub fn recorded_variables(&self) -> Vec<String> {
        self.synapses.recorded_variables()
    }

    /// Returns the weight matrix (or strength matrix for dopamine-modulated synapses), with zeros for missing synapses.
    pub fn weight_matrix(&self) -> Vec<Vec<f64>> {
        let mut matrix = vec![vec![0.0; self.target_size]; self.source_size];
        for (k, w) in self.synapses.efficacies().into_iter().enumerate() {
            matrix[self.pre[k]][self.post[k]] = w;
        }
        matrix
    }

    /// Process the presynaptic spikes, delivering their input to the target population, then the postsynaptic spikes.
    pub(crate) fn propagate(
        &mut self,
        pre_spikes: &[usize],
        post_spikes: &[usize],
        t: f64,
        target: &mut Population,
    ) {
        let variable = self.synapses.target();
        for &i in pre_spikes {
            for &k in &self.by_pre[i] {
                let amount = self.synapses.on_pre(k, t);
                target.inject(self.post[k], variable, amount);
            }
        }
        for &j in post_spikes {
            for &k in &self.by_post[j] {
                self.synapses.on_post(k, t);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neuron::LifParams;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn layers(rng: &mut ChaCha8Rng) -> (Layer, Layer) {
        let source = Layer::poisson_input(2, "source", 10.0).unwrap();
        let target = Layer::lif(3, "target", LifParams::default(), rng).unwrap();
        (source, target)
    }

    #[test]
    fn test_full_connectivity_order() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let (source, target) = layers(&mut rng);
        let connection = Connection::forward("c", &source, &target, None, None, &mut rng).unwrap();
        assert_eq!(connection.num_synapses(), 6);
        assert_eq!(connection.endpoints(0), Some((0, 0)));
        assert_eq!(connection.endpoints(1), Some((0, 1)));
        assert_eq!(connection.endpoints(3), Some((1, 0)));
        assert_eq!(connection.endpoints(6), None);
        assert_eq!(connection.weight_matrix(), vec![vec![0.0; 3]; 2]);
        assert!(connection.recorded_variables().is_empty());
    }

    #[test]
    fn test_probabilistic_connectivity() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let (source, target) = layers(&mut rng);
        let params = DaStdpParams::default();
        let none = Connection::da_stdp("c", &source, &target, params.clone(), Some(0.0), &mut rng)
            .unwrap();
        assert_eq!(none.num_synapses(), 0);
        let all = Connection::da_stdp("c", &source, &target, params.clone(), Some(1.0), &mut rng)
            .unwrap();
        assert_eq!(all.num_synapses(), 6);
        assert!(Connection::da_stdp("c", &source, &target, params, Some(1.5), &mut rng).is_err());
    }

    #[test]
    fn test_stdp_weights_are_clipped() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let (source, target) = layers(&mut rng);
        let weights = vec![vec![-1.0, 0.5, 2.0], vec![0.1, 0.2, 0.3]];
        let connection = Connection::stdp(
            "c",
            &source,
            &target,
            StdpParams::default(),
            Some(&weights),
            None,
            &mut rng,
        )
        .unwrap();
        assert_eq!(
            connection.weight_matrix(),
            vec![vec![0.0, 0.5, 1.0], vec![0.1, 0.2, 0.3]]
        );

        let connection =
            Connection::stdp("c", &source, &target, StdpParams::default(), None, None, &mut rng)
                .unwrap();
        assert!(connection
            .synapses()
            .efficacies()
            .iter()
            .all(|&w| (0.0..=1.0).contains(&w)));
    }

    #[test]
    fn test_weight_dimensions() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let (source, target) = layers(&mut rng);
        let params = DiehlCookStdpParams::default();

        let too_few_rows = vec![vec![0.1; 3]];
        assert!(matches!(
            Connection::diehl_cook_stdp(
                "c",
                &source,
                &target,
                params.clone(),
                &too_few_rows,
                None,
                &mut rng
            ),
            Err(SNNError::DimensionMismatch(_))
        ));
        let too_few_columns = vec![vec![0.1; 3], vec![0.1; 2]];
        assert!(matches!(
            Connection::diehl_cook_stdp(
                "c",
                &source,
                &target,
                params.clone(),
                &too_few_columns,
                None,
                &mut rng
            ),
            Err(SNNError::DimensionMismatch(_))
        ));
        // Larger matrices are truncated
        let larger = vec![vec![0.3; 100]; 4];
        let connection =
            Connection::diehl_cook_stdp("c", &source, &target, params, &larger, None, &mut rng)
                .unwrap();
        assert_eq!(connection.weight_matrix(), vec![vec![0.3; 3]; 2]);
    }

    #[test]
    fn test_propagate() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let (source, mut target) = layers(&mut rng);
        let weights = vec![vec![1.0, 2.0, 3.0], vec![10.0, 20.0, 30.0]];
        let mut connection =
            Connection::forward("c", &source, &target, Some(&weights), None, &mut rng).unwrap();

        let before = target.population().variable("v", 0.0).unwrap();
        connection.propagate(&[1], &[], 0.0, target.population_mut());
        let after = target.population().variable("v", 0.0).unwrap();
        for (j, (b, a)) in before.iter().zip(after.iter()).enumerate() {
            approx::assert_relative_eq!(a - b, weights[1][j], epsilon = 1e-9);
        }
    }
}
