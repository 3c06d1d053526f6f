//! Command-line access to replay decoding, seeking, board classification and layout generation.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use sweeplog_core::*;
use tracing_subscriber::EnvFilter;

mod render;

const DEFAULT_VALIDITY: &str = include_str!("../validity.json");

#[derive(Parser, Debug)]
#[command(name = "sweeplog", version, about = "Minesweeper replay analysis")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Client validity table replacing the built-in one
    #[arg(long, global = true, value_name = "PATH")]
    validity: Option<PathBuf>,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Header and final metrics of a replay
    Info { file: PathBuf },

    /// Per-game summary of a Metasweeper `.evfs` bundle
    Bundle { file: PathBuf },

    /// Metrics, cursor and board at a point in time
    Seek {
        file: PathBuf,
        /// Seconds since the first reveal, negative for the pre-game
        #[arg(short, long, allow_hyphen_values = true)]
        time: f64,
    },

    /// Safe, mined and uncertain cells at a point in time
    Solve {
        file: PathBuf,
        #[arg(short, long, allow_hyphen_values = true)]
        time: f64,
        /// Ignore the total mine count
        #[arg(long)]
        no_mine_count: bool,
        /// Treat flags as covered cells instead of known mines
        #[arg(long)]
        soft_flags: bool,
    },

    /// Random mine layout
    Generate {
        #[arg(long, default_value_t = 16)]
        rows: Coord,
        #[arg(long, default_value_t = 30)]
        cols: Coord,
        #[arg(long, default_value_t = 99)]
        mines: CellCount,
        #[arg(long, default_value_t = 0)]
        open_row: Coord,
        #[arg(long, default_value_t = 0)]
        open_col: Coord,
        #[arg(short, long)]
        seed: Option<u64>,
        #[arg(long, default_value_t = 100_000)]
        max_attempts: u32,
        /// Only accept layouts that can be cleared without guessing
        #[arg(long)]
        solvable: bool,
        /// Search for a solvable layout on all cores
        #[arg(long, requires = "solvable")]
        parallel: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = args.verbose.log_level_filter().to_string().to_lowercase();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Info { ref file } => {
            let session = open_session(file)?;
            let table = load_validity(args.validity.as_deref())?;
            render::info(&session, &table, args.json)
        }
        Command::Bundle { ref file } => {
            let bytes = std::fs::read(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let bundle = decode_bundle(&bytes)
                .with_context(|| format!("failed to decode bundle {}", file.display()))?;
            render::bundle(bundle, args.json)
        }
        Command::Seek { ref file, time } => {
            let mut session = open_session(file)?;
            session.set_current_time(time)?;
            render::seek(&session, args.json)
        }
        Command::Solve {
            ref file,
            time,
            no_mine_count,
            soft_flags,
        } => {
            let mut session = open_session(file)?;
            session.set_current_time(time)?;
            let cfg = AnalysisConfig {
                flag_semantics: if soft_flags {
                    FlagSemantics::Soft
                } else {
                    FlagSemantics::Strict
                },
                mine_count_usage: if no_mine_count {
                    MineCountUsage::Ignore
                } else {
                    MineCountUsage::UseIfKnown
                },
                ..AnalysisConfig::default()
            };
            let classification = session.classify(cfg)?;
            render::solve(&classification, args.json)
        }
        Command::Generate {
            rows,
            cols,
            mines,
            open_row,
            open_col,
            seed,
            max_attempts,
            solvable,
            parallel,
        } => {
            let config = GameConfig::new((rows, cols), mines);
            let open = (open_row, open_col);
            let seed = seed.unwrap_or_else(clock_seed);
            log::info!("generating {rows}x{cols}/{mines} from seed {seed}");
            let layout = if parallel {
                laymine_solvable_parallel(
                    config,
                    open,
                    max_attempts,
                    seed,
                    SolverLimits::default(),
                )?
            } else if solvable {
                laymine_solvable(config, open, max_attempts, seed)?
            } else {
                lay_mine(config, open, seed)?
            };
            render::layout(&layout, seed, args.json)
        }
    }
}

fn open_session(path: &Path) -> Result<ReplaySession> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let name = path.to_string_lossy();
    let mut session = ReplaySession::from_file(bytes, &name)
        .with_context(|| format!("unsupported replay file {name}"))?;
    session
        .parse()
        .with_context(|| format!("failed to decode {name}"))?;
    session.analyse()?;
    Ok(session)
}

fn load_validity(path: Option<&Path>) -> Result<ValidityTable> {
    let Some(path) = path else {
        return Ok(ValidityTable::from_json(DEFAULT_VALIDITY)?);
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let table = ValidityTable::from_json(&text)
        .with_context(|| format!("invalid validity table {}", path.display()))?;
    if table.is_empty() {
        bail!("validity table {} has no entries", path.display());
    }
    Ok(table)
}

fn clock_seed() -> u64 {
    time::OffsetDateTime::now_utc().unix_timestamp_nanos() as u64
}
