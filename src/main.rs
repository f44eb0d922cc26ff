mod backup;
mod batch;
mod cli;
mod config;
mod diff;
mod duplicates;
mod interrupt;
mod manifest;
mod record;
mod report;
mod tree;
mod workflow;

use anyhow::Context as _;
use backup::{AssumeYes, Confirm, StdinConfirm};
use batch::BatchStatus;
use cli::{Cli, Command, Targets};
use config::Config;
use interrupt::Interrupt;
use record::RecordMode;
use std::fmt as stdfmt;
use std::io::{IsTerminal, stderr};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Event, Level, Subscriber, debug, error};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use workflow::{Context, Mode};

struct HashcheckExitCode;

impl HashcheckExitCode {
    /// Exit code used when changed or lost files, failed samples or failed
    /// directories were found.
    const PROBLEMS: u8 = 1;

    /// Exit code used when everything is clean but a candidate awaits accept
    /// or a tree needs verify.
    const PENDING: u8 = 3;

    /// Exit code used when the target directories cannot be resolved.
    const DISCOVERY: u8 = 4;

    /// Exit code used for other errors (unreadable config, etc.).
    const ANY_ERROR: u8 = 255;

    fn for_status(status: BatchStatus) -> u8 {
        match status {
            BatchStatus::Clean => 0,
            BatchStatus::Pending => Self::PENDING,
            BatchStatus::Problems => Self::PROBLEMS,
        }
    }
}

/// Per-invocation settings after merging the config file and flags.
struct Settings {
    record_mode: RecordMode,
    sample_rate: f64,
    sample_seed: Option<u64>,
    subset_list: Option<PathBuf>,
    assume_yes: bool,
}

impl Settings {
    fn new(config: &Config, metadata: bool) -> Self {
        Settings {
            record_mode: if metadata {
                RecordMode::Metadata
            } else {
                config.mode
            },
            sample_rate: config.sample_rate,
            sample_seed: config.sample_seed,
            subset_list: None,
            assume_yes: false,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_level);
    interrupt::install_handlers();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(HashcheckExitCode::ANY_ERROR)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<u8> {
    let config = Config::resolve(cli.config.as_deref()).context("Failed to load configuration")?;
    let mut settings = Settings::new(&config, cli.metadata);

    let (mode, targets) = match cli.command {
        Command::Create { dirs } => (Mode::Create, Targets { find: false, dirs }),
        Command::Expand { targets } => (Mode::Expand, targets),
        Command::Verify { targets } => (Mode::Verify, targets),
        Command::Subset { targets, list } => {
            settings.subset_list = list;
            (Mode::Subset, targets)
        }
        Command::Sample {
            targets,
            rate,
            seed,
        } => {
            if let Some(rate) = rate {
                settings.sample_rate = rate;
            }
            if seed.is_some() {
                settings.sample_seed = seed;
            }
            (Mode::Sample, targets)
        }
        Command::Accept { targets } => (Mode::Accept, targets),
        Command::Review { targets } => (Mode::Review, targets),
        Command::Update { targets } => (Mode::Update, targets),
        Command::Backup { targets, yes } => {
            settings.assume_yes = yes;
            (Mode::Backup, targets)
        }
        Command::Match { dirs } => return Ok(handle_match(&dirs)),
    };

    Ok(handle_batch(mode, targets, settings))
}

fn handle_batch(mode: Mode, targets: Targets, settings: Settings) -> u8 {
    let dirs = match batch::resolve_targets(&targets.dirs, targets.find) {
        Ok(dirs) => dirs,
        Err(err) => {
            error!("{err}");
            return HashcheckExitCode::DISCOVERY;
        }
    };

    let provider = record::provider_for(settings.record_mode);
    debug!(
        "Running {} in {} mode on {} directories",
        mode,
        provider.mode(),
        dirs.len()
    );

    let confirm: &dyn Confirm = if settings.assume_yes {
        &AssumeYes
    } else {
        &StdinConfirm
    };

    let ctx = Context {
        provider: provider.as_ref(),
        sample_rate: settings.sample_rate,
        sample_seed: settings.sample_seed,
        subset_list: settings.subset_list,
        confirm,
        interrupt: Interrupt::global(),
    };

    let summary = batch::run_batch(&dirs, mode, &ctx);
    report::print_summary(&summary);

    HashcheckExitCode::for_status(summary.status())
}

fn handle_match(dirs: &[PathBuf]) -> u8 {
    let scans = duplicates::find_duplicates(dirs);
    report::print_scans(&scans);
    0
}

fn init_tracing(verbose: u8, log_level: Option<LevelFilter>) {
    let stderr_is_terminal = stderr().is_terminal();
    let formatter = EmojiFormatter { stderr_is_terminal };

    let filter = match (log_level, verbose) {
        (Some(level), _) => EnvFilter::default().add_directive(level.into()),
        (None, 0) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
        }
        (None, 1) => EnvFilter::new("info"),
        (None, _) => EnvFilter::new("debug"),
    };

    let fmt_layer = tracing_fmt::layer()
        .event_format(formatter)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

struct EmojiFormatter {
    stderr_is_terminal: bool,
}


impl<S, N> FormatEvent<S, N> for EmojiFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        if self.stderr_is_terminal {
            match *event.metadata().level() {
                Level::DEBUG => write!(writer, "🔍 ")?,
                Level::INFO => write!(writer, "ℹ️ ")?,
                Level::WARN => write!(writer, "⚠️  ")?,
                Level::ERROR => write!(writer, "❌️ ")?,
                _ => {}
            }
        } else {
            match *event.metadata().level() {
                Level::DEBUG => writer.write_str("DEBUG: ")?,
                Level::INFO => writer.write_str("INFO: ")?,
                Level::WARN => writer.write_str("WARN: ")?,
                Level::ERROR => writer.write_str("ERROR: ")?,
                _ => {}
            }
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
