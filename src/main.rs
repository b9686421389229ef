use clap::Parser;
use std::{
    fs::{self, File},
    io::{BufReader, stdin, stdout},
    path::PathBuf,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use yeast::{
    config::Config,
    runtime::{
        combinators::CombinatorBase,
        data_structures::memory_image::Mode,
        error,
        session::{ReportStyle, Session, io::LineSource},
        terminal::{install_interrupt_handler, process_interrupt, stdin_is_terminal},
    },
};

/// A stack machine that runs Forth words and combinator terms over one memory image.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "YEAST_CONFIG")]
    config: Option<PathBuf>,

    /// Steps allowed per input unit.
    #[arg(long)]
    fuel: Option<u64>,

    /// Combinators loaded into the core dictionary.
    #[arg(long, value_enum)]
    base: Option<CombinatorBase>,

    /// How input is read when the session starts.
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// What is printed after each successful unit.
    #[arg(long, value_enum)]
    report: Option<ReportStyle>,

    /// Number of memory cells.
    #[arg(long)]
    memory: Option<usize>,

    /// Let user words shadow core words.
    #[arg(long)]
    permit_shadowing: bool,

    /// Report errors with their location and call stack.
    #[arg(long)]
    verbose_errors: bool,

    /// Start from this dump instead of a fresh image.
    #[arg(long)]
    load: Option<PathBuf>,

    /// Write a dump of the image here when the session stops.
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Read input from this file instead of stdin.
    script: Option<PathBuf>,
}

impl Cli {
    /// The configuration file, if any, with the command line laid over it.
    fn config(&self) -> error::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(fuel) = self.fuel {
            config.fuel = fuel;
        }

        if let Some(base) = self.base {
            config.base = base;
        }

        if let Some(mode) = self.mode {
            config.mode = mode;
        }

        if let Some(report) = self.report {
            config.report = report;
        }

        if let Some(memory) = self.memory {
            config.memory_cells = memory;
        }

        config.permit_shadowing |= self.permit_shadowing;
        config.verbose_errors |= self.verbose_errors;

        Ok(config)
    }
}

fn main() -> error::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("YEAST_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;

    let dump = match &cli.load {
        Some(path) => Some(fs::read_to_string(path)?),
        None => None,
    };

    install_interrupt_handler()?;

    let session = Session::start(config, dump.as_deref())?.with_interrupt(process_interrupt());

    let mut session = match &cli.script {
        Some(path) => session
            .with_source_name(&path.display().to_string())
            .with_input(LineSource::new(BufReader::new(File::open(path)?))),
        None => {
            debug!(terminal = stdin_is_terminal(), "Reading from stdin.");
            session.with_input(LineSource::new(stdin().lock()))
        }
    };

    session.run(&mut stdout())?;

    let text = session.stop();

    if let Some(path) = &cli.dump {
        fs::write(path, text)?;
    }

    Ok(())
}
