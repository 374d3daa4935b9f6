use crate::config::ConsoleConfig;
use crate::error::{ConsoleError, Result};
use crate::registry::{LineNumber, Target};
use crate::writer::{count_line_breaks, rewrite_prefix, TerminalWriter, WriteRequest};
use parking_lot::Mutex;
use std::io::{self, Write};

type Sink = Box<dyn Write + Send>;

/// The one handle every producer writes through. Construct it once at
/// startup and share it as `Arc<Console>`.
///
/// Every operation takes the same lock for movement, emission and
/// bookkeeping together, so writes are linearised in lock-acquisition order
/// and never interleave on the wire.
///
/// Addressing is purely relative. Once output has scrolled a line off the
/// visible screen, rewriting that line lands in the wrong place; nothing
/// detects or repairs this.
pub struct Console {
    terminal: Mutex<TerminalWriter<Sink>>,
    config: ConsoleConfig,
}

impl Console {
    pub fn new(sink: impl Write + Send + 'static, config: ConsoleConfig) -> Self {
        let sink: Sink = Box::new(sink);
        Self {
            terminal: Mutex::new(TerminalWriter::new(sink, &config)),
            config,
        }
    }

    pub fn stdout(config: ConsoleConfig) -> Self {
        Self::new(io::stdout(), config)
    }

    /// Report dropped output somewhere other than stderr.
    pub fn with_fallback(mut self, fallback: impl Write + Send + 'static) -> Self {
        self.terminal.get_mut().set_fallback(Box::new(fallback));
        self
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// The raw primitive. Returns the line the cursor is left on.
    pub fn write(&self, request: &WriteRequest) -> Result<LineNumber> {
        let mut terminal = self.terminal.lock();
        if let Target::Line(line) = request.target {
            if !terminal.registry().contains(line) {
                return Err(ConsoleError::illegal_state(format!(
                    "line {line} was never allocated (tail is {})",
                    terminal.registry().tail()
                )));
            }
        }
        Ok(terminal.write(request))
    }

    /// Appends `text` as a line of its own and returns the line it starts on.
    pub fn append_line(&self, text: &str) -> LineNumber {
        let payload = format!("{text}\n");
        let request = WriteRequest::append(&payload)
            .numbered(self.config.numbered)
            .fresh_line();
        let end = self.terminal.lock().write(&request);
        end - count_line_breaks(&payload)
    }

    /// Replaces the contents of a line handed out earlier.
    pub fn write_at_line(&self, line: LineNumber, text: &str) -> Result<()> {
        let prefix = rewrite_prefix();
        let request = WriteRequest::at(line, text)
            .prefix(&prefix)
            .numbered(self.config.numbered);
        self.write(&request).map(|_| ())
    }

    /// Appends `header` on a fresh line and draws `body` over the line the
    /// header leaves the cursor on. Both writes happen under one lock, so the
    /// returned line holds `body` before any other producer can append.
    pub fn claim_line(&self, header: &str, body: &str) -> LineNumber {
        let mut terminal = self.terminal.lock();
        let line = terminal.write(
            &WriteRequest::append(header)
                .numbered(self.config.numbered)
                .fresh_line(),
        );
        terminal.write(&WriteRequest::at(line, body).prefix("\r"));
        line
    }

    /// Puts the cursor on `line`. Emits nothing if it is already there.
    pub fn move_to(&self, line: LineNumber) -> Result<LineNumber> {
        self.write(&WriteRequest::at(line, ""))
    }

    /// Moves the cursor `offset` lines down (negative: up), staying within
    /// known output.
    pub fn move_by(&self, offset: i64) -> LineNumber {
        let mut terminal = self.terminal.lock();
        let line = terminal.registry().shift(offset);
        terminal.write(&WriteRequest::at(line, ""))
    }

    /// Starts a new, empty line below everything written so far.
    pub fn reserve_line(&self) -> LineNumber {
        self.terminal.lock().reserve_line()
    }

    /// Terminates the tail line if anything is on it and returns the empty
    /// tail line, with the cursor resting at its start.
    pub fn next_line(&self) -> LineNumber {
        self.terminal
            .lock()
            .write(&WriteRequest::append("").fresh_line())
    }

    pub fn cursor_position(&self) -> LineNumber {
        self.terminal.lock().registry().cursor()
    }

    pub fn tail(&self) -> LineNumber {
        self.terminal.lock().registry().tail()
    }
}
