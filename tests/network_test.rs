use approx::assert_relative_eq;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tempfile::NamedTempFile;

use rusty_stdp::error::SNNError;
use rusty_stdp::neuron::{CurrentBasedLifParams, LifParams};
use rusty_stdp::spike_train::step_current;
use rusty_stdp::synapse::{DaStdpParams, StdpParams};
use rusty_stdp::topology::{Connection, Layer, Monitor, Network, SimulationConfig};

fn random_train(len: usize, p: f64, rng: &mut ChaCha8Rng) -> Vec<u8> {
    (0..len).map(|_| rng.gen_bool(p) as u8).collect()
}

#[test]
fn test_run_one_input_twelve_hidden() {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let train = random_train(300, 2.0 / 3.0, &mut rng);

    let mut network = Network::new("scenario", SimulationConfig::default());
    let input = Layer::manual_spike_input(&train, 1.0, 1, "input").unwrap();
    let hidden = Layer::lif(12, "hidden", LifParams::default(), &mut rng).unwrap();
    let connection = Connection::stdp(
        "input_hidden",
        &input,
        &hidden,
        StdpParams::default(),
        None,
        None,
        &mut rng,
    )
    .unwrap();
    network.add_layer(input).unwrap();
    network.add_layer(hidden).unwrap();
    network.add_connection(connection).unwrap();

    network.run_simulation(300.0).unwrap();

    let counts = network.monitor("hidden").unwrap().spike_counts();
    assert_eq!(counts.len(), 12);
    assert!(counts.iter().all(|&count| count < 3001));

    // Every flag of the train was replayed by the input neuron
    let input = network.monitor("input").unwrap().spikes().unwrap();
    assert_eq!(input.num_spikes(), train.iter().filter(|&&f| f == 1).count());
    assert!(input.indices().iter().all(|&i| i == 0));

    // Weights remain within bounds
    let weights = network.connection("input_hidden").unwrap().weight_matrix();
    assert!(weights.iter().flatten().all(|&w| (0.0..=1.0).contains(&w)));
}

#[test]
fn test_store_restore_keeps_registrations() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut network = Network::new("checkpoint", SimulationConfig::default());
    let input = Layer::poisson_input(10, "input", 100.0).unwrap();
    let hidden = Layer::lif(5, "hidden", LifParams::default(), &mut rng).unwrap();
    let connection = Connection::da_stdp(
        "input_hidden",
        &input,
        &hidden,
        DaStdpParams::default(),
        Some(0.5),
        &mut rng,
    )
    .unwrap();
    network.add_layer(input).unwrap();
    network.add_layer(hidden).unwrap();
    network.add_connection(connection).unwrap();

    let names = |network: &Network| -> Vec<String> {
        network
            .monitors()
            .iter()
            .map(|monitor| monitor.source().to_string())
            .collect()
    };
    let monitors_before = names(&network);
    let hidden_before = network.layer("hidden").unwrap().clone();

    network.store();
    network.run(20.0).unwrap();
    network.reward("input_hidden").unwrap();
    network.run(20.0).unwrap();
    network.restore().unwrap();

    assert_eq!(names(&network), monitors_before);
    assert_eq!(network.layers().len(), 2);
    assert_eq!(network.connections().len(), 1);
    assert_eq!(network.layer("hidden").unwrap(), &hidden_before);
    assert_eq!(network.time(), 0.0);
    assert!(network
        .monitors()
        .iter()
        .filter_map(Monitor::state)
        .all(|state| state.times().is_empty()));
    assert_eq!(
        network.connection("input_hidden").unwrap().synapses().variable(0, "d"),
        Some(0.0)
    );

    // The network can run again after a restore
    network.run(1.0).unwrap();
    assert_relative_eq!(network.time(), 1.0, epsilon = 1e-9);
}

#[test]
fn test_izhikevich_unknown_key() {
    for key in ["", "rs", "XYZ", "RS "] {
        assert!(matches!(
            Layer::izhikevich(3, "izh", key),
            Err(SNNError::UnknownModelType(_))
        ));
    }
    for key in ["RS", "IB", "CH", "FS", "TC", "RZ", "LTS"] {
        assert!(Layer::izhikevich(3, "izh", key).is_ok());
    }
}

#[test]
fn test_izhikevich_layer_driven_forward() {
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let mut network = Network::new("izhikevich", SimulationConfig::default());
    let input = Layer::poisson_input(20, "input", 50.0).unwrap();
    let izhikevich = Layer::izhikevich(4, "izh", "FS").unwrap();
    let weights = vec![vec![5.0; 4]; 20];
    let weights = Some(&weights[..]);
    let connection =
        Connection::forward("input_izh", &input, &izhikevich, weights, None, &mut rng).unwrap();
    network.add_layer(input).unwrap();
    network.add_layer(izhikevich).unwrap();
    network.add_connection(connection).unwrap();

    network.run(200.0).unwrap();
    let state = network.monitor("izh").unwrap().state().unwrap();
    assert_eq!(state.times().len(), 2000);
    assert!(state
        .values("v")
        .unwrap()
        .iter()
        .flatten()
        .all(|v| v.is_finite()));
    assert!(network.monitor("input_izh").is_none());
}

#[test]
fn test_current_based_layer_records_current() {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let mut network = Network::new("current", SimulationConfig::default());
    let current = step_current(10, 50, 3.0, true).unwrap();
    let params = CurrentBasedLifParams {
        r: Some(10.0),
        ..Default::default()
    };
    let layer = Layer::current_based_lif(3, "cb", params, current, &mut rng).unwrap();
    network.add_layer(layer).unwrap();
    network.run(100.0).unwrap();

    let state = network.monitor("cb").unwrap().state().unwrap();
    let currents = state.values("I").unwrap();
    assert_eq!(currents[0], vec![0.0; 3]);
    assert_eq!(currents[200], vec![3.0; 3]);
    assert_eq!(currents[999], vec![0.0; 3]);
    assert_eq!(state.values("vth").unwrap()[0], vec![0.0, 30.0, 60.0]);

    // The first neuron has a zero threshold and fires as soon as it leaves its refractory period
    let counts = network.monitor("cb").unwrap().spike_counts();
    assert!(counts[0] > 0);
}

#[test]
fn test_save_monitors() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let mut network = Network::new("monitors", SimulationConfig { dt: 0.5, seed: 1 });
    let input = Layer::poisson_input(3, "input", 100.0).unwrap();
    let hidden = Layer::lif(2, "hidden", LifParams::default(), &mut rng).unwrap();
    let params = StdpParams::default();
    let connection =
        Connection::stdp("input_hidden", &input, &hidden, params, None, None, &mut rng).unwrap();
    network.add_layer(input).unwrap();
    network.add_layer(hidden).unwrap();
    network.add_connection(connection).unwrap();
    network.run(10.0).unwrap();

    let file = NamedTempFile::new().unwrap();
    network.save_monitors_to(file.path()).unwrap();
    let content = std::fs::read_to_string(file.path()).unwrap();
    let monitors: Vec<Monitor> = serde_json::from_str(&content).unwrap();
    assert_eq!(monitors.len(), 3);
    for (loaded, monitor) in monitors.iter().zip(network.monitors()) {
        assert_eq!(loaded.source(), monitor.source());
        assert_eq!(loaded.spike_counts(), monitor.spike_counts());
        assert_eq!(
            loaded.state().map(|state| state.times().len()),
            monitor.state().map(|state| state.times().len())
        );
    }
}

#[test]
fn test_poisson_inputs_follow_seed() {
    let build = |seed: u64| {
        let mut network = Network::new("poisson", SimulationConfig { dt: 0.1, seed });
        network
            .add_layer(Layer::poisson_input(50, "input", 40.0).unwrap())
            .unwrap();
        network.run(100.0).unwrap();
        network.monitor("input").unwrap().spikes().unwrap().clone()
    };
    assert_eq!(build(1), build(1));
    assert_ne!(build(1), build(2));
}
