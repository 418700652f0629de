//! The agent <-> environment protocol loop.
//!
//! Percepts arrive as ASCII `'0'`/`'1'` lines on the input channel; the
//! agent replies with one MSB-first action line per percept. Lines
//! beginning with `:` are control commands. stdout carries only protocol
//! payloads; every diagnostic goes to the log on stderr.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use mcx_common::{percept_to_symbols, symbols_to_string, Action, SymbolError};
use rand::rngs::StdRng;
use rand::Rng;
use thiserror::Error;

use crate::agent::{Agent, Hive};
use crate::config::{AgentConfig, SearchConfig};
use crate::search::{self, SearchError};
use crate::snapshot::{self, SnapshotError, SnapshotFormat};

/// Session-fatal protocol failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error(transparent)]
    BadPercept(#[from] SymbolError),

    #[error("search failed: {0}")]
    Search(#[from] SearchError),

    #[error("snapshot failure: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("i/o failure on the environment channel: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a session needs, assembled from the CLI.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub agent_config: AgentConfig,
    pub search_config: SearchConfig,
    pub agent_load: Option<PathBuf>,
    pub agent_save: Option<PathBuf>,
    pub snapshot_format: SnapshotFormat,
}

/// A `:`-prefixed control command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Reset,
    Save(Option<String>),
    Load(Option<String>),
    Quit,
    Age,
    Horizon,
    Help,
}

/// Command names and help lines, in dispatch order.
const COMMAND_HELP: &[(&str, &str)] = &[
    ("help", "show this usage message"),
    ("quit", "terminate the agent <-> environment loop"),
    ("load", "load [filename] - replace the hive with an agent from disk"),
    ("reset", "clear the model and history of every hive member"),
    ("save", "save [filename] - save the primary agent to disk"),
    ("age", "show the age of the agent in cycles"),
    ("horizon", "show the search horizon length"),
];

impl Command {
    /// Parse a command line; `None` when the name is not recognised.
    pub fn parse(line: &str) -> Option<Command> {
        let rest = line.strip_prefix(':')?;
        let mut parts = rest.split_whitespace();
        let name = parts.next()?;
        let arg = parts.next().map(str::to_owned);

        match name {
            "reset" => Some(Command::Reset),
            "save" => Some(Command::Save(arg)),
            "load" => Some(Command::Load(arg)),
            "quit" => Some(Command::Quit),
            "age" => Some(Command::Age),
            "horizon" => Some(Command::Horizon),
            "help" => Some(Command::Help),
            _ => None,
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

/// Drive the agent <-> environment loop until the input closes, a
/// `:quit` arrives, or the terminate age is reached.
pub fn run_session(
    input: impl BufRead,
    mut output: impl Write,
    options: &SessionOptions,
    rng: &mut StdRng,
) -> Result<(), ProtocolError> {
    let threads = options.search_config.threads as usize;
    let mut hive = match &options.agent_load {
        Some(path) => {
            let agent = snapshot::load_agent(path, options.snapshot_format)?;
            Hive::from_agent(threads, agent)
        }
        None => Hive::new(threads, &options.agent_config),
    };

    let mut explore_rate = options.search_config.exploration;
    let explore_decay = options.search_config.explore_decay;
    let terminate_age = options
        .search_config
        .terminate_age
        .map(|cycles| hive.primary().age() + cycles);

    let start_age = hive.primary().age();
    let start_reward = hive.primary().total_reward();
    let mut avg_percept_prob = 0.0f64;

    for line in input.lines() {
        let line = line?;

        if line.starts_with(':') {
            match Command::parse(&line) {
                Some(command) => {
                    if let Flow::Quit = dispatch(command, &mut hive, options, &mut output)? {
                        break;
                    }
                }
                None => tracing::error!(line = %line, "unrecognised command"),
            }
            continue;
        }

        if let Some(limit) = terminate_age {
            if hive.primary().age() > limit {
                tracing::info!(limit, "terminate age reached");
                break;
            }
        }

        let percept = percept_to_symbols(&line, hive.primary().percept_bits())?;

        // track predictive accuracy before the model sees the percept
        let percept_prob = hive.primary_mut().percept_probability(&percept);
        let cycles = (hive.primary().age() - start_age) as f64;
        avg_percept_prob = (percept_prob + cycles * avg_percept_prob) / (cycles + 1.0);
        tracing::info!(
            percept_prob,
            session_avg = avg_percept_prob,
            reward = hive.primary().reward_from_percept(&percept),
            age = hive.primary().age(),
            "percept received"
        );

        hive.observe(&percept);

        let action = match explore_rate {
            Some(rate) if rng.gen::<f64>() < rate => {
                tracing::info!(rate, "exploring");
                hive.primary().select_random_action(rng)
            }
            _ => search::select_action(&mut hive, &options.search_config, rng)?,
        };

        send_action(&mut output, hive.primary(), action)?;
        hive.act(action);

        if let Some(rate) = &mut explore_rate {
            *rate *= explore_decay;
        }

        tracing::debug!(
            avg_reward = hive.primary().average_reward(),
            total_reward = hive.primary().total_reward(),
            model_nodes = hive.primary().model_size(),
            "cycle complete"
        );
    }

    let session_cycles = hive.primary().age() - start_age;
    tracing::info!(
        reward = hive.primary().total_reward() - start_reward,
        cycles = session_cycles,
        "session summary"
    );

    // snapshot-on-exit; a failed save is reported, never fatal
    if let Some(path) = &options.agent_save {
        if let Err(error) = snapshot::save_agent(path, hive.primary(), options.snapshot_format) {
            tracing::error!(%error, path = %path.display(), "failed to save agent on exit");
        }
    }

    Ok(())
}

/// Emit one action line, MSB first.
fn send_action(output: &mut impl Write, agent: &Agent, action: Action) -> std::io::Result<()> {
    let encoded = symbols_to_string(&agent.encode_action(action));
    tracing::info!(action, encoded = %encoded, "sending action");
    writeln!(output, "{encoded}")?;
    output.flush()
}

fn dispatch(
    command: Command,
    hive: &mut Hive,
    options: &SessionOptions,
    output: &mut impl Write,
) -> Result<Flow, ProtocolError> {
    match command {
        Command::Reset => {
            hive.reset();
            tracing::info!("agent reset");
        }

        Command::Save(arg) => {
            let path = arg.map(PathBuf::from).or_else(|| options.agent_save.clone());
            match path {
                Some(path) => {
                    if let Err(error) =
                        snapshot::save_agent(&path, hive.primary(), options.snapshot_format)
                    {
                        tracing::error!(%error, path = %path.display(), "save failed");
                    }
                }
                None => tracing::error!("save: no output path configured"),
            }
        }

        Command::Load(arg) => {
            let path = arg.map(PathBuf::from).or_else(|| options.agent_load.clone());
            match path {
                Some(path) => match snapshot::load_agent(&path, options.snapshot_format) {
                    Ok(agent) => *hive = Hive::from_agent(hive.count(), agent),
                    // a failed load leaves the running hive untouched
                    Err(error) => {
                        tracing::error!(%error, path = %path.display(), "load failed")
                    }
                },
                None => tracing::error!("load: no input path configured"),
            }
        }

        Command::Quit => return Ok(Flow::Quit),

        Command::Age => {
            writeln!(output, "{}", hive.primary().age())?;
            output.flush()?;
        }

        Command::Horizon => {
            writeln!(output, "{}", hive.primary().horizon())?;
            output.flush()?;
        }

        Command::Help => {
            for (name, help) in COMMAND_HELP {
                writeln!(output, "{name}\t\t{help}")?;
            }
            output.flush()?;
        }
    }

    Ok(Flow::Continue)
}
