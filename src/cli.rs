use console_mux::{Console, CrosstermEditor, Granularity, ProgressPool};
use log::Level;
use std::str::FromStr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::runtime::Handle;

/// Command names and descriptions, in the order `help` lists them.
const COMMANDS: &[(&str, &str)] = &[
    ("chatter", "chatter <threads> <count>: log from background threads."),
    ("echo", "echo <text>: print the text."),
    ("exit", "Exits the shell."),
    ("help", "Prints this dialog."),
    ("log", "log <level> <text>: emit a log event."),
    ("progress", "progress <seconds> [ms|min]: run a progress bar in the background."),
];

const CHATTER_PAUSE: Duration = Duration::from_millis(250);

#[derive(Debug, PartialEq)]
pub enum Command {
    Chatter { threads: usize, count: usize },
    Echo(String),
    Exit,
    Help,
    Log(Level, String),
    Progress {
        duration: Duration,
        granularity: Granularity,
    },
}

pub fn parse(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (name, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    match name.to_lowercase().as_str() {
        "chatter" => {
            let mut args = rest.split_whitespace();
            Ok(Command::Chatter {
                threads: number(args.next(), "threads")?,
                count: number(args.next(), "count")?,
            })
        }
        "echo" => Ok(Command::Echo(rest.to_string())),
        "exit" => Ok(Command::Exit),
        "help" => Ok(Command::Help),
        "log" => {
            let (level, text) = rest.split_once(' ').unwrap_or((rest, ""));
            let level = Level::from_str(level).map_err(|_| format!("unknown level {level:?}"))?;
            Ok(Command::Log(level, text.trim().to_string()))
        }
        "progress" => {
            let mut args = rest.split_whitespace();
            let amount: u64 = number(args.next(), "seconds")?;
            let granularity = match args.next() {
                None => Granularity::Seconds,
                Some("ms") => Granularity::Millis,
                Some("min") => Granularity::Minutes,
                Some(other) => return Err(format!("unknown unit {other:?}")),
            };
            Ok(Command::Progress {
                duration: Duration::from_secs(amount),
                granularity,
            })
        }
        _ => Err("No command found.".to_string()),
    }
}

fn number<T: FromStr>(arg: Option<&str>, name: &str) -> Result<T, String> {
    let arg = arg.ok_or_else(|| format!("missing <{name}>"))?;
    arg.parse()
        .map_err(|_| format!("<{name}> must be a number, got {arg:?}"))
}

pub fn help_text() -> String {
    COMMANDS
        .iter()
        .map(|(name, description)| format!("{name:<30}{description}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The read-eval loop on the main thread.
pub struct Shell {
    console: Arc<Console>,
    pool: Arc<ProgressPool>,
    runtime: Handle,
    editor: CrosstermEditor,
}

impl Shell {
    pub fn new(console: Arc<Console>, pool: Arc<ProgressPool>, runtime: Handle) -> Self {
        let editor = CrosstermEditor::new().with_completions(COMMANDS.iter().map(|(name, _)| *name));
        Self {
            console,
            pool,
            runtime,
            editor,
        }
    }

    /// Interrupts the shell once `limit` has passed, even while it waits
    /// for input.
    pub fn end_after(&self, limit: Duration) {
        let interrupt = self.editor.interrupt_handle();
        self.runtime.spawn(async move {
            tokio::time::sleep(limit).await;
            log::info!("session time limit of {limit:?} reached");
            interrupt.store(true, Ordering::Release);
        });
    }

    pub fn run(&mut self) {
        log::info!("ready, type `help` for a list of commands");
        let prompt = self.console.config().prompt.clone();
        loop {
            let line = match self.console.read_line(&mut self.editor, &prompt) {
                Ok(line) => line,
                Err(err) if err.is_interrupt() => {
                    log::trace!("input ended: {err}");
                    break;
                }
                Err(err) => {
                    log::error!("{err}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse(&line) {
                Ok(Command::Exit) => break,
                Ok(command) => self.execute(command),
                Err(message) => {
                    self.console.append_line(&message);
                }
            }
        }
        log::info!("bye");
    }

    fn execute(&self, command: Command) {
        match command {
            Command::Chatter { threads, count } => self.chatter(threads, count),
            Command::Echo(text) => {
                self.console.append_line(&text);
            }
            Command::Exit => {}
            Command::Help => {
                self.console.append_line(&help_text());
            }
            Command::Log(level, text) => log::log!(level, "{text}"),
            Command::Progress {
                duration,
                granularity,
            } => self.progress(duration, granularity),
        }
    }

    /// Starts a bar and lets the runtime finish it once the time is up.
    fn progress(&self, duration: Duration, granularity: Granularity) {
        let header = format!("Waiting {} seconds\n", duration.as_secs());
        match self.pool.start(duration, granularity, &header) {
            Ok(bar) => {
                log::debug!(
                    "progress bar #{} runs {:?} in {:?} steps",
                    bar.id(),
                    bar.duration(),
                    bar.granularity()
                );
                let pool = self.pool.clone();
                self.runtime.spawn(async move {
                    tokio::time::sleep(duration).await;
                    pool.finish(bar).await;
                });
            }
            Err(err) => log::error!("{err}"),
        }
    }

    fn chatter(&self, threads: usize, count: usize) {
        for t in 0..threads {
            let spawned = thread::Builder::new()
                .name(format!("chatter-{t}"))
                .spawn(move || {
                    for i in 0..count {
                        log::info!(target: "chatter", "thread {t} says {i}");
                        thread::sleep(CHATTER_PAUSE);
                    }
                });
            if let Err(err) = spawned {
                log::error!("could not start chatter thread: {err}");
            }
        }
    }
}
