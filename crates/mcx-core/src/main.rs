//! mcx-core binary: an approximate universal reinforcement-learning agent
//! speaking a binary percept/action protocol on stdin/stdout.

use std::path::PathBuf;

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use mcx_core::config::{AgentConfig, ConfigError, Controller, RewardEncoding, SearchConfig};
use mcx_core::logging;
use mcx_core::protocol::{run_session, SessionOptions};
use mcx_core::snapshot::SnapshotFormat;

/// Monte-Carlo AIXI approximation with a factored context-tree world model.
///
/// The environment communicates percepts to the agent over stdin; the
/// agent responds with actions over stdout. All channels are binary.
#[derive(Parser, Debug)]
#[command(name = "mcx-core", version, about)]
struct Cli {
    /// Maximum depth of the context tree used for prediction
    #[arg(long, default_value_t = 3)]
    ct_depth: u32,

    /// How many bits encode the reward signal
    #[arg(long, default_value_t = 1)]
    reward_bits: u32,

    /// How many bits encode the observation signal
    #[arg(long, default_value_t = 1)]
    observation_bits: u32,

    /// The number of distinct actions the agent can take
    #[arg(long, default_value_t = 4)]
    agent_actions: u32,

    /// The number of percept/action pairs to look forward
    #[arg(long, default_value_t = 16)]
    agent_horizon: u32,

    /// How the agent interprets the reward encoding
    #[arg(long, value_enum, default_value_t = RewardEncoding::Base2)]
    reward_encoding: RewardEncoding,

    /// Control algorithm to use
    #[arg(long, value_enum, default_value_t = Controller::Mcts)]
    controller: Controller,

    /// Number of search threads to use
    #[arg(long, default_value_t = 1)]
    threads: u32,

    /// Probability of playing a random move
    #[arg(long)]
    exploration: Option<f64>,

    /// Geometric decay of the exploration rate, within [0, 1]
    #[arg(long, default_value_t = 1.0)]
    explore_decay: f64,

    /// Use a self-improving playout policy
    #[arg(long)]
    bootstrapped_playouts: bool,

    /// Number of MC simulations per cycle
    #[arg(long)]
    mc_simulations: Option<u64>,

    /// Milliseconds after receiving a percept to choose an action
    #[arg(long)]
    cycle_length_ms: Option<u64>,

    /// Maximum memory used by the search tree, in megabytes
    #[arg(long, default_value_t = 32)]
    memsearch: usize,

    /// How many agent/environment cycles before the agent closes
    #[arg(long)]
    terminate_age: Option<u64>,

    /// Load a pre-existing agent from a file
    #[arg(long)]
    agent_load: Option<PathBuf>,

    /// Save the agent to a file upon exit
    #[arg(long)]
    agent_save: Option<PathBuf>,

    /// Use native (faster but non-portable) binary file i/o
    #[arg(long)]
    binary_io: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

fn build_session(cli: &Cli) -> Result<SessionOptions, ConfigError> {
    let agent_config = AgentConfig {
        ct_depth: cli.ct_depth,
        observation_bits: cli.observation_bits,
        reward_bits: cli.reward_bits,
        actions: cli.agent_actions,
        horizon: cli.agent_horizon,
        reward_encoding: cli.reward_encoding,
        bootstrapped_playouts: cli.bootstrapped_playouts,
    };
    agent_config.validate()?;

    let search_config = SearchConfig {
        controller: cli.controller,
        threads: cli.threads,
        mc_simulations: cli.mc_simulations,
        cycle_length_ms: cli.cycle_length_ms,
        memsearch_mb: cli.memsearch,
        exploration: cli.exploration,
        explore_decay: cli.explore_decay,
        terminate_age: cli.terminate_age,
    };
    search_config.validate()?;

    Ok(SessionOptions {
        agent_config,
        search_config,
        agent_load: cli.agent_load.clone(),
        agent_save: cli.agent_save.clone(),
        snapshot_format: SnapshotFormat::from_binary_flag(cli.binary_io),
    })
}

fn run() -> i32 {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet);

    let options = match build_session(&cli) {
        Ok(options) => options,
        Err(error) => {
            tracing::error!(%error, "invalid configuration");
            return 1;
        }
    };

    let mut rng = StdRng::from_entropy();
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();

    match run_session(stdin.lock(), stdout.lock(), &options, &mut rng) {
        Ok(()) => {
            tracing::info!("agent terminated");
            0
        }
        Err(error) => {
            tracing::error!(%error, "fatal session error");
            1
        }
    }
}

fn main() {
    std::process::exit(run());
}
