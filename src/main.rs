use anyhow::{anyhow, Context, Result};
use clap::Parser;
use console_mux::{Console, ConsoleConfig, ConsoleLogger, ProgressPool};
use log::LevelFilter;
use simplelog::{CombinedLogger, ConfigBuilder, SharedLogger, WriteLogger};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod cli;

/// Interactive shell sharing one terminal between its prompt, background
/// progress bars and log output.
#[derive(Parser, Debug)]
#[command(name = "console-mux", version, about)]
struct Args {
    /// Prefix every line with its line number
    #[arg(long)]
    numbered: bool,

    /// Zero-padded width of line numbers
    #[arg(long, default_value_t = 2)]
    label_width: usize,

    /// Separator between a line number and the line
    #[arg(long, default_value = "| ")]
    gutter: String,

    /// Text shown in front of the input
    #[arg(long, default_value = "> ")]
    prompt: String,

    /// Show the time of day in front of the prompt
    #[arg(long)]
    timestamp: bool,

    /// Redraw interval of millisecond progress bars
    #[arg(long, default_value_t = 50)]
    fine_tick_ms: u64,

    /// End the session after this many seconds
    #[arg(long)]
    exit_after: Option<u64>,

    /// Lowest level shown on the console (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Also write every log event to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Do not colour log events by level
    #[arg(long)]
    no_color: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = ConsoleConfig::default()
        .with_numbered(args.numbered)
        .with_label_width(args.label_width)
        .with_gutter(args.gutter.clone())
        .with_prompt(args.prompt.clone())
        .with_prompt_timestamp(args.timestamp)
        .with_fine_tick(Duration::from_millis(args.fine_tick_ms))
        .with_colored_levels(!args.no_color);
    let console = Arc::new(Console::stdout(config));
    init_logging(&args, console.clone())?;

    let runtime = tokio::runtime::Runtime::new().context("starting the progress runtime")?;
    let pool = Arc::new(ProgressPool::new(console.clone(), runtime.handle().clone()));
    let mut shell = cli::Shell::new(console, pool, runtime.handle().clone());
    if let Some(secs) = args.exit_after {
        shell.end_after(Duration::from_secs(secs));
    }
    shell.run();
    Ok(())
}

fn init_logging(args: &Args, console: Arc<Console>) -> Result<()> {
    let level: LevelFilter = args
        .log_level
        .parse()
        .map_err(|_| anyhow!("unknown log level {:?}", args.log_level))?;
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![ConsoleLogger::new(level, console)];
    if let Some(path) = &args.log_file {
        let file = File::create(path)
            .with_context(|| format!("creating log file {}", path.display()))?;
        loggers.push(WriteLogger::new(
            LevelFilter::Trace,
            ConfigBuilder::new().build(),
            file,
        ));
    }
    CombinedLogger::init(loggers).context("installing the logger")?;
    Ok(())
}
