use clap::Parser;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use rusty_stdp::dataset::Dataset;
use rusty_stdp::error::SNNError;
use rusty_stdp::neuron::LifParams;
use rusty_stdp::synapse::DiehlCookStdpParams;
use rusty_stdp::topology::{Connection, Layer, Network, RestorePolicy, SimulationConfig};

#[derive(Parser, Debug)]
struct Args {
    /// The seed used for layer, weight and dataset sampling
    #[arg(long, default_value = "0")]
    seed: u64,
    /// The dataset to train on (JSON); a synthetic one is sampled if not provided
    #[arg(long)]
    dataset: Option<String>,
    /// The number of synthetic examples
    #[arg(long, default_value = "3")]
    num_examples: usize,
    /// The number of synthetic labels
    #[arg(long, default_value = "2")]
    num_labels: usize,
    /// The number of time steps (in ms) of the synthetic spike trains
    #[arg(long, default_value = "300")]
    train_len: usize,
    /// The spike probability of the synthetic spike trains
    #[arg(long, default_value_t = 2.0 / 3.0)]
    spike_prob: f64,
    /// The number of hidden neurons
    #[arg(short = 'N', long, default_value = "12")]
    num_hidden: usize,
    /// The duration (in ms) each example is presented for
    #[arg(short = 'T', long, default_value = "300.0")]
    duration: f64,
    /// The simulation time step (in ms)
    #[arg(long, default_value = "0.1")]
    dt: f64,
    /// Keep the learned weights from one example to the next
    #[arg(long)]
    keep_weights: bool,
    /// Where to save the label-wise spike counts (JSON)
    #[arg(long)]
    output: Option<String>,
    /// Where to save the monitor data (JSON)
    #[arg(long)]
    monitors: Option<String>,
    /// Where to write the log, in addition to the console
    #[arg(long)]
    log_file: Option<String>,
    /// Log simulation progress
    #[arg(short, long)]
    verbose: bool,
}

/// Width of the initial weight matrix, wide enough for any hidden layer of the experiment.
const WEIGHT_COLUMNS: usize = 100;

fn init_logging(args: &Args) -> Result<(), SNNError> {
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new("{d(%H:%M:%S)} {l} - {m}\n")))
        .build();

    let mut builder =
        Config::builder().appender(Appender::builder().build("console", Box::new(console)));
    let mut root = Root::builder().appender("console");
    if let Some(path) = &args.log_file {
        let logfile = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new("{l} - {m}\n")))
            .build(path)
            .map_err(|e| SNNError::IOError(e.to_string()))?;
        builder = builder.appender(Appender::builder().build("logfile", Box::new(logfile)));
        root = root.appender("logfile");
    }

    let config = builder
        .build(root.build(level))
        .map_err(|e| SNNError::IOError(e.to_string()))?;
    log4rs::init_config(config).map_err(|e| SNNError::IOError(e.to_string()))?;
    Ok(())
}

fn main() -> Result<(), SNNError> {
    let args = Args::parse();
    init_logging(&args)?;
    log::info!("{:?}", args);

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);

    let dataset = match &args.dataset {
        Some(path) => Dataset::load_from(path)?,
        None => Dataset::rand(
            args.num_examples,
            args.train_len,
            args.num_labels,
            args.spike_prob,
            &mut rng,
        )?,
    };
    log::info!("Dataset loading: done! {} examples", dataset.len());

    // A single input neuron replaying a random train
    if !(0.0..=1.0).contains(&args.spike_prob) {
        return Err(SNNError::InvalidParameters(
            "Spike probability must be in [0, 1]".to_string(),
        ));
    }
    let spike_train: Vec<u8> = (0..args.train_len)
        .map(|_| rng.gen_bool(args.spike_prob) as u8)
        .collect();
    let input = Layer::manual_spike_input(&spike_train, 1.0, 1, "input")?;
    let hidden = Layer::lif(args.num_hidden, "hidden", LifParams::default(), &mut rng)?;

    let weights: Vec<Vec<f64>> = vec![(0..WEIGHT_COLUMNS.max(args.num_hidden))
        .map(|_| (rng.gen::<f64>() + 0.01) * 0.3)
        .collect()];
    let connection = Connection::diehl_cook_stdp(
        "input_hidden",
        &input,
        &hidden,
        DiehlCookStdpParams::default(),
        &weights,
        None,
        &mut rng,
    )?;

    let config = SimulationConfig {
        dt: args.dt,
        seed: args.seed,
    };
    config.validate()?;
    let mut network = Network::new("experiment", config);
    network.add_layer(input)?;
    network.add_layer(hidden)?;
    network.add_connection(connection)?;
    log::info!("Network building: done!\n{}", network);

    let policy = if args.keep_weights {
        RestorePolicy::KeepSynapses
    } else {
        RestorePolicy::Checkpoint
    };
    let record = network.train(&dataset, args.duration, policy)?;
    for (label, counts) in record.labels().iter().zip(record.counts()) {
        log::info!("Label {}: spike counts {:?}", label, counts);
    }
    log::info!("Neuron assignments: {:?}", record.assignments());

    if let Some(path) = &args.output {
        record.save_to(path)?;
        log::info!("Spike counts saved to {}", path);
    }
    if let Some(path) = &args.monitors {
        network.save_monitors_to(path)?;
        log::info!("Monitor data saved to {}", path);
    }

    Ok(())
}
