use crate::config::ConsoleConfig;
use crate::registry::{LineNumber, LineRegistry, Target};
use crossterm::cursor::{MoveDown, MoveUp};
use crossterm::terminal::{Clear, ClearType};
use crossterm::Command;
use std::io::{self, Write};

/// One unit of output: where it goes, the text, and the opaque escapes
/// around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteRequest<'a> {
    pub target: Target,
    pub prefix: &'a str,
    pub payload: &'a str,
    pub suffix: &'a str,
    pub numbered: bool,
    /// Start on a line of its own if the tail line already holds text.
    pub fresh_line: bool,
}

impl<'a> WriteRequest<'a> {
    pub fn append(payload: &'a str) -> Self {
        Self::new(Target::Append, payload)
    }

    pub fn at(line: LineNumber, payload: &'a str) -> Self {
        Self::new(Target::Line(line), payload)
    }

    pub fn new(target: Target, payload: &'a str) -> Self {
        Self {
            target,
            prefix: "",
            payload,
            suffix: "",
            numbered: false,
            fresh_line: false,
        }
    }

    pub fn prefix(mut self, prefix: &'a str) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn suffix(mut self, suffix: &'a str) -> Self {
        self.suffix = suffix;
        self
    }

    pub fn numbered(mut self, numbered: bool) -> Self {
        self.numbered = numbered;
        self
    }

    pub fn fresh_line(mut self) -> Self {
        self.fresh_line = true;
        self
    }
}

/// Escape text for a crossterm command.
pub fn ansi(command: impl Command) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = command.write_ansi(&mut out);
    out
}

/// Carriage return followed by erase-line: start a rewrite from a blank line.
pub fn rewrite_prefix() -> String {
    format!("\r{}", ansi(Clear(ClearType::CurrentLine)))
}

/// The compute-move-emit-record primitive. Not synchronised itself: exactly
/// one of these lives behind the [`Console`](crate::Console) lock, which makes
/// every call indivisible.
pub struct TerminalWriter<W: Write> {
    output: W,
    fallback: Box<dyn Write + Send>,
    registry: LineRegistry,
    label_width: usize,
    gutter: String,
}

impl<W: Write> TerminalWriter<W> {
    pub fn new(output: W, config: &ConsoleConfig) -> Self {
        Self {
            output,
            fallback: Box::new(io::stderr()),
            registry: LineRegistry::new(),
            label_width: config.label_width,
            gutter: config.gutter.clone(),
        }
    }

    /// Where failed writes are reported. Defaults to stderr.
    pub fn set_fallback(&mut self, fallback: Box<dyn Write + Send>) {
        self.fallback = fallback;
    }

    pub fn registry(&self) -> &LineRegistry {
        &self.registry
    }

    pub fn into_inner(self) -> W {
        self.output
    }

    /// Moves to the target, emits the request and records the result.
    /// Returns the line the cursor is left on.
    ///
    /// A `Target::Line` must have been handed out before; the caller checks.
    pub fn write(&mut self, request: &WriteRequest) -> LineNumber {
        let appending = request.target == Target::Append;
        let target = self.registry.resolve(request.target);
        let delta = self.registry.delta(target);

        let mut out = String::new();
        push_movement(&mut out, delta);
        self.registry.place_cursor(target);

        if appending {
            if request.fresh_line && self.registry.is_tail_dirty() {
                out.push_str("\r\n");
                let line = self.registry.allocate();
                self.registry.place_cursor(line);
            } else if delta != 0 && !self.registry.is_tail_dirty() {
                // Relative moves keep the column of the line we came from.
                out.push('\r');
            }
        }

        let first = self.registry.cursor();
        out.push_str(request.prefix);
        out.push_str(&self.compose(request.payload, first, request.numbered));
        out.push_str(request.suffix);

        let line_breaks = count_line_breaks(request.payload);
        if appending {
            self.registry.advance(line_breaks);
        }
        let end = first + line_breaks;
        self.registry.place_cursor(end);
        if end == self.registry.tail() {
            self.track_tail(request.payload, line_breaks);
        }

        self.emit(out.as_bytes());
        end
    }

    /// Hands out a brand new line below all committed output and puts the
    /// cursor on it.
    pub fn reserve_line(&mut self) -> LineNumber {
        let mut out = String::new();
        push_movement(&mut out, self.registry.delta(self.registry.tail()));
        out.push_str("\r\n");
        let line = self.registry.allocate();
        self.registry.place_cursor(line);
        self.emit(out.as_bytes());
        line
    }

    fn track_tail(&mut self, payload: &str, line_breaks: u64) {
        let last_segment = payload.rsplit('\n').next().unwrap_or_default();
        if line_breaks > 0 {
            self.registry.set_tail_dirty(!last_segment.is_empty());
        } else if !payload.is_empty() {
            self.registry.set_tail_dirty(true);
        }
    }

    /// Payload as it goes on the wire: line breaks become CR LF, and with
    /// numbering every segment gets its label, starting at `first`.
    fn compose(&self, payload: &str, first: LineNumber, numbered: bool) -> String {
        if !numbered {
            return payload.replace('\n', "\r\n");
        }
        payload
            .split('\n')
            .enumerate()
            .map(|(i, segment)| {
                let segment: String = segment.chars().filter(|c| *c != '\r').collect();
                format!(
                    "\r{:0width$}{}{}",
                    first + i as LineNumber,
                    self.gutter,
                    segment,
                    width = self.label_width
                )
            })
            .collect::<Vec<_>>()
            .join("\r\n")
    }

    fn emit(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let result = self
            .output
            .write_all(bytes)
            .and_then(|_| self.output.flush());
        if let Err(err) = result {
            let _ = writeln!(
                self.fallback,
                "console: dropped {} bytes of output: {err}",
                bytes.len()
            );
        }
    }
}

pub fn count_line_breaks(payload: &str) -> u64 {
    payload.matches('\n').count() as u64
}

fn push_movement(out: &mut String, delta: i64) {
    let mut remaining = delta.unsigned_abs();
    while remaining > 0 {
        let step = remaining.min(u16::MAX as u64) as u16;
        if delta < 0 {
            out.push_str(&ansi(MoveUp(step)));
        } else {
            out.push_str(&ansi(MoveDown(step)));
        }
        remaining -= step as u64;
    }
}
