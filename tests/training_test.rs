use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tempfile::NamedTempFile;

use rusty_stdp::dataset::{Dataset, Example};
use rusty_stdp::neuron::{DiehlCookParams, LayerMode, LifParams};
use rusty_stdp::synapse::DiehlCookStdpParams;
use rusty_stdp::topology::{
    Connection, Layer, Network, RestorePolicy, SimulationConfig, TrainingRecord,
};

/// One input neuron connected to `num_hidden` LIF neurons with Diehl and Cook STDP.
fn experiment_network(num_hidden: usize, rng: &mut ChaCha8Rng) -> Network {
    let mut network = Network::new("experiment", SimulationConfig::default());
    let input = Layer::manual_spike_input(&[], 1.0, 1, "input").unwrap();
    let hidden = Layer::lif(num_hidden, "hidden", LifParams::default(), rng).unwrap();
    let weights = vec![(0..100).map(|_| (rng.gen::<f64>() + 0.01) * 0.3).collect()];
    let connection = Connection::diehl_cook_stdp(
        "input_hidden",
        &input,
        &hidden,
        DiehlCookStdpParams::default(),
        &weights,
        None,
        rng,
    )
    .unwrap();
    network.add_layer(input).unwrap();
    network.add_layer(hidden).unwrap();
    network.add_connection(connection).unwrap();
    network
}

#[test]
fn test_train_three_examples_two_labels() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut network = experiment_network(12, &mut rng);

    let dense = vec![1; 100];
    let sparse: Vec<u8> = (0..100).map(|i| (i % 10 == 0) as u8).collect();
    let dataset = Dataset::from(vec![
        Example { spikes: dense.clone(), label: 0 },
        Example { spikes: sparse, label: 1 },
        Example { spikes: dense, label: 0 },
    ]);

    let record = network.train(&dataset, 100.0, RestorePolicy::Checkpoint).unwrap();
    assert_eq!(record.num_labels(), 2);
    assert_eq!(record.counts().len(), 2);
    assert!(record.counts().iter().all(|row| row.len() == 12));

    // The network is rewound after every example, so presenting the same example twice yields
    // the same counts: the row of label 0 is overwritten rather than accumulated
    let mut single = experiment_network(12, &mut ChaCha8Rng::seed_from_u64(42));
    let once = single
        .train(
            &Dataset::from(vec![dataset[0].clone()]),
            100.0,
            RestorePolicy::Checkpoint,
        )
        .unwrap();
    assert_eq!(record.counts_for(0), once.counts_for(0));
}

#[test]
fn test_train_keep_synapses_accumulates_learning() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let mut network = experiment_network(6, &mut rng);
    let before = network.connection("input_hidden").unwrap().weight_matrix();

    let dataset = Dataset::from(vec![
        Example { spikes: vec![1; 200], label: 2 },
        Example { spikes: vec![1; 200], label: 2 },
    ]);
    let record = network
        .train(&dataset, 200.0, RestorePolicy::KeepSynapses)
        .unwrap();
    assert_eq!(record.labels(), &[2]);

    let after = network.connection("input_hidden").unwrap().weight_matrix();
    let wmax = DiehlCookStdpParams::default().wmax;
    assert!(after.iter().flatten().all(|&w| (0.0..=wmax).contains(&w)));
    assert_ne!(before, after);
    assert_eq!(network.time(), 0.0);

    // Traces carried over between examples keep decaying, they never exceed their reset value
    let synapses = network.connection("input_hidden").unwrap().synapses();
    for k in 0..synapses.len() {
        for name in ["pre", "post1", "post2", "post2before"] {
            let value = synapses.variable(k, name).unwrap();
            assert!((0.0..=1.0).contains(&value), "{} = {} on synapse {}", name, value, k);
        }
    }
}

#[test]
fn test_train_empty_dataset() {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let mut network = experiment_network(3, &mut rng);
    let record = network
        .train(&Dataset::default(), 10.0, RestorePolicy::default())
        .unwrap();
    assert_eq!(record.num_labels(), 0);
    assert!(record.assignments().is_empty());
}

#[test]
fn test_training_record_save() {
    let mut rng = ChaCha8Rng::seed_from_u64(9);
    let mut network = experiment_network(4, &mut rng);
    let dataset = Dataset::rand(4, 50, 3, 0.5, &mut rng).unwrap();
    let record = network.train(&dataset, 50.0, RestorePolicy::Checkpoint).unwrap();

    let file = NamedTempFile::new().unwrap();
    record.save_to(file.path()).unwrap();
    let content = std::fs::read_to_string(file.path()).unwrap();
    let loaded: TrainingRecord = serde_json::from_str(&content).unwrap();
    assert_eq!(loaded, record);
}

#[test]
fn test_diehl_cook_layer_train_then_test() {
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let mut network = Network::new("adaptive", SimulationConfig::default());
    let input = Layer::poisson_input(20, "input", 100.0).unwrap();
    let excitatory =
        Layer::diehl_cook_lif::<&str>(5, "exc", DiehlCookParams::default(), None).unwrap();
    let weights = vec![vec![0.5; 5]; 20];
    let connection = Connection::diehl_cook_stdp(
        "input_exc",
        &input,
        &excitatory,
        DiehlCookStdpParams::default(),
        &weights,
        None,
        &mut rng,
    )
    .unwrap();
    network.add_layer(input).unwrap();
    network.add_layer(excitatory).unwrap();
    network.add_connection(connection).unwrap();
    network.run(100.0).unwrap();

    let file = NamedTempFile::new().unwrap();
    let trained = network.layer("exc").unwrap();
    trained.save_theta_to(file.path()).unwrap();

    let test_params = DiehlCookParams {
        mode: LayerMode::Test,
        ..Default::default()
    };
    let frozen = Layer::diehl_cook_lif(5, "exc", test_params, Some(file.path())).unwrap();
    assert_eq!(frozen.theta(), trained.theta());
}
