//! Blocking line input on a console shared with concurrent writers.
//!
//! [`Console::read_line`] prints the prompt on a line of its own and hands
//! control to a [`LineEditor`]. Editors echo by redrawing that line through
//! the console, so bars and log events keep flowing while the read blocks
//! and never interleave with the echo.

use crate::console::Console;
use crate::error::{ConsoleError, Result};
use crate::registry::LineNumber;
use crate::writer::WriteRequest;
use chrono::{Local, NaiveTime};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The line the prompt was printed on, handed to the editor for echoing.
pub struct PromptLine<'a> {
    console: &'a Console,
    line: LineNumber,
    prompt: &'a str,
}

impl<'a> PromptLine<'a> {
    /// Shows `input` after the prompt, wherever other writers have left the
    /// cursor.
    pub fn redraw(&self, input: &str) -> Result<()> {
        self.console
            .write_at_line(self.line, &format!("{}{}", self.prompt, input))
    }
}

/// Reads one line of keyboard input. History, completion and key bindings
/// are the editor's business.
pub trait LineEditor {
    /// Blocks until a line is submitted. Fails with
    /// [`ConsoleError::UserInterrupt`] on an out-of-band interrupt.
    fn read_line(&mut self, prompt: &PromptLine<'_>) -> Result<String>;
}

impl Console {
    /// Reserves the next line for `prompt` and blocks on `editor`.
    ///
    /// The prompt write also moves the cursor to the true tail, so the
    /// editor's idea of the current line agrees with the registry.
    pub fn read_line(&self, editor: &mut dyn LineEditor, prompt: &str) -> Result<String> {
        let prompt = if self.config().prompt_timestamp {
            timestamped(prompt, Local::now().time())
        } else {
            prompt.to_string()
        };
        let request = WriteRequest::append(&prompt)
            .numbered(self.config().numbered)
            .fresh_line();
        let line = self.write(&request)?;
        let outcome = editor.read_line(&PromptLine {
            console: self,
            line,
            prompt: &prompt,
        });
        self.next_line();
        outcome
    }
}

/// `HH:MM:SS.mmm prompt`
pub fn timestamped(prompt: &str, now: NaiveTime) -> String {
    format!("{} {prompt}", now.format("%H:%M:%S%.3f"))
}

/// What a key press did to the input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    Edited,
    Submit,
    Interrupt,
    EndOfInput,
    Ignored,
}

/// A small raw-mode editor on top of crossterm events.
pub struct CrosstermEditor {
    completions: Vec<String>,
    interrupt: Arc<AtomicBool>,
}

impl Default for CrosstermEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl CrosstermEditor {
    pub fn new() -> Self {
        Self {
            completions: Vec::new(),
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Words offered on Tab.
    pub fn with_completions<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.completions = words.into_iter().map(Into::into).collect();
        self
    }

    /// Raising this flag from any thread interrupts the read in progress.
    /// Raised while no read is pending, it stays set and the next read
    /// fails straight away, so a shutdown request is never lost between
    /// two reads.
    pub fn interrupt_handle(&self) -> Arc<AtomicBool> {
        self.interrupt.clone()
    }

    /// The edit loop over any source of terminal events. `next_event`
    /// returns `None` when nothing arrived within one poll interval.
    fn read_events(
        &mut self,
        prompt: &PromptLine<'_>,
        mut next_event: impl FnMut() -> Result<Option<Event>>,
    ) -> Result<String> {
        let mut buffer = String::new();
        loop {
            if self.interrupt.swap(false, Ordering::AcqRel) {
                return Err(ConsoleError::UserInterrupt);
            }
            let key = match next_event()? {
                Some(Event::Key(key)) if key.kind != KeyEventKind::Release => key,
                _ => continue,
            };
            match apply_key(&mut buffer, key, &self.completions) {
                KeyOutcome::Edited => prompt.redraw(&buffer)?,
                KeyOutcome::Submit => return Ok(buffer),
                KeyOutcome::Interrupt => return Err(ConsoleError::UserInterrupt),
                KeyOutcome::EndOfInput => return Err(ConsoleError::EndOfInput),
                KeyOutcome::Ignored => {}
            }
        }
    }
}

impl LineEditor for CrosstermEditor {
    fn read_line(&mut self, prompt: &PromptLine<'_>) -> Result<String> {
        let _raw = RawMode::enable()?;
        self.read_events(prompt, poll_event)
    }
}

fn poll_event() -> Result<Option<Event>> {
    let ready =
        event::poll(POLL_INTERVAL).map_err(|err| ConsoleError::io("polling for input", err))?;
    if !ready {
        return Ok(None);
    }
    event::read()
        .map(Some)
        .map_err(|err| ConsoleError::io("reading input", err))
}

/// Applies one key press to `buffer`.
pub fn apply_key(buffer: &mut String, key: KeyEvent, completions: &[String]) -> KeyOutcome {
    let control = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if control => KeyOutcome::Interrupt,
        KeyCode::Char('d') if control => {
            if buffer.is_empty() {
                KeyOutcome::EndOfInput
            } else {
                KeyOutcome::Ignored
            }
        }
        KeyCode::Char('u') if control => {
            buffer.clear();
            KeyOutcome::Edited
        }
        KeyCode::Char(_) if control => KeyOutcome::Ignored,
        KeyCode::Char(c) => {
            buffer.push(c);
            KeyOutcome::Edited
        }
        KeyCode::Backspace => match buffer.pop() {
            Some(_) => KeyOutcome::Edited,
            None => KeyOutcome::Ignored,
        },
        KeyCode::Enter => KeyOutcome::Submit,
        KeyCode::Tab => complete(buffer, completions),
        _ => KeyOutcome::Ignored,
    }
}

/// Completes the first word when exactly one candidate matches it.
fn complete(buffer: &mut String, completions: &[String]) -> KeyOutcome {
    if buffer.contains(' ') {
        return KeyOutcome::Ignored;
    }
    let mut candidates = completions.iter().filter(|w| w.starts_with(buffer.as_str()));
    match (candidates.next(), candidates.next()) {
        (Some(word), None) => {
            *buffer = format!("{word} ");
            KeyOutcome::Edited
        }
        _ => KeyOutcome::Ignored,
    }
}

/// Raw mode for the duration of a read, restored on every exit path.
struct RawMode;

impl RawMode {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode().map_err(|err| ConsoleError::io("enabling raw mode", err))?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(err) = terminal::disable_raw_mode() {
            log::warn!("could not restore terminal mode: {err}");
        }
    }
}

#[cfg(test)]
mod test {
    use crate::config::ConsoleConfig;
    use crate::console::Console;
    use crate::error::{ConsoleError, Result};
    use crate::line_editor::{
        apply_key, timestamped, CrosstermEditor, KeyOutcome, LineEditor, PromptLine,
    };
    use crate::log_sink::LogEventSink;
    use crate::test_support::{screen_lines, SharedBuffer};
    use crate::writer::WriteRequest;
    use chrono::NaiveTime;
    use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
    use log::Level;
    use std::collections::VecDeque;
    use std::sync::atomic::Ordering;

    /// Types scripted keys, letting a callback run between them to stand in
    /// for other threads writing while the read blocks.
    struct Scripted<'f> {
        keys: VecDeque<KeyEvent>,
        between: Box<dyn FnMut(usize) + 'f>,
    }

    impl<'f> Scripted<'f> {
        fn typing(text: &str, between: impl FnMut(usize) + 'f) -> Self {
            let mut keys: VecDeque<KeyEvent> = text.chars().map(|c| key(KeyCode::Char(c))).collect();
            keys.push_back(key(KeyCode::Enter));
            Self {
                keys,
                between: Box::new(between),
            }
        }
    }

    impl LineEditor for Scripted<'_> {
        fn read_line(&mut self, prompt: &PromptLine<'_>) -> Result<String> {
            let mut buffer = String::new();
            let mut typed = 0;
            while let Some(key) = self.keys.pop_front() {
                (self.between)(typed);
                typed += 1;
                match apply_key(&mut buffer, key, &[]) {
                    KeyOutcome::Edited => prompt.redraw(&buffer)?,
                    KeyOutcome::Submit => return Ok(buffer),
                    KeyOutcome::Interrupt => return Err(ConsoleError::UserInterrupt),
                    KeyOutcome::EndOfInput => return Err(ConsoleError::EndOfInput),
                    KeyOutcome::Ignored => {}
                }
            }
            Err(ConsoleError::EndOfInput)
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn typed_events(text: &str) -> VecDeque<Event> {
        text.chars()
            .map(|c| key(KeyCode::Char(c)))
            .chain([key(KeyCode::Enter)])
            .map(Event::Key)
            .collect()
    }

    fn prompt_on(console: &Console) -> PromptLine<'_> {
        let line = console.write(&WriteRequest::append("> ")).unwrap();
        PromptLine {
            console,
            line,
            prompt: "> ",
        }
    }

    fn console() -> (Console, SharedBuffer) {
        let output = SharedBuffer::default();
        let config = ConsoleConfig::default().with_colored_levels(false);
        (Console::new(output.clone(), config), output)
    }

    #[test]
    fn editing_keys() {
        let mut buffer = String::new();
        assert_eq!(apply_key(&mut buffer, key(KeyCode::Char('h')), &[]), KeyOutcome::Edited);
        assert_eq!(apply_key(&mut buffer, key(KeyCode::Char('i')), &[]), KeyOutcome::Edited);
        assert_eq!(apply_key(&mut buffer, key(KeyCode::Backspace), &[]), KeyOutcome::Edited);
        assert_eq!(buffer, "h");
        assert_eq!(apply_key(&mut buffer, ctrl('d'), &[]), KeyOutcome::Ignored);
        assert_eq!(apply_key(&mut buffer, ctrl('u'), &[]), KeyOutcome::Edited);
        assert_eq!(buffer, "");
        assert_eq!(apply_key(&mut buffer, key(KeyCode::Backspace), &[]), KeyOutcome::Ignored);
        assert_eq!(apply_key(&mut buffer, ctrl('d'), &[]), KeyOutcome::EndOfInput);
        assert_eq!(apply_key(&mut buffer, ctrl('c'), &[]), KeyOutcome::Interrupt);
        assert_eq!(apply_key(&mut buffer, key(KeyCode::Enter), &[]), KeyOutcome::Submit);
    }

    #[test]
    fn tab_completes_unique_prefix() {
        let words = vec!["help".to_string(), "progress".to_string(), "print".to_string()];
        let mut buffer = "he".to_string();
        assert_eq!(apply_key(&mut buffer, key(KeyCode::Tab), &words), KeyOutcome::Edited);
        assert_eq!(buffer, "help ");

        let mut ambiguous = "pr".to_string();
        assert_eq!(apply_key(&mut ambiguous, key(KeyCode::Tab), &words), KeyOutcome::Ignored);
        assert_eq!(ambiguous, "pr");
    }

    #[test]
    fn read_line_returns_typed_text_and_commits_line() {
        let (console, output) = console();
        console.append_line("welcome");
        let mut editor = Scripted::typing("echo hi", |_| {});
        let line = console.read_line(&mut editor, "> ").unwrap();
        assert_eq!(line, "echo hi");
        assert_eq!(console.tail(), 3);
        assert_eq!(screen_lines(&output.bytes()), vec!["welcome", "> echo hi"]);
    }

    #[test]
    fn echo_survives_concurrent_log_events() {
        let (console, output) = console();
        let writer = &console;
        let mut editor = Scripted::typing("status", |typed| {
            if typed == 2 || typed == 4 {
                writer.on_log_event(Level::Info, &format!("event after {typed} keys"));
            }
        });
        let line = console.read_line(&mut editor, "> ").unwrap();
        assert_eq!(line, "status");
        console.append_line("next");

        insta::assert_snapshot!(screen_lines(&output.bytes()).join("\n"), @r###"
        > status
        event after 2 keys
        event after 4 keys
        next
        "###);
    }

    #[test]
    fn interrupt_is_distinguished() {
        let (console, _) = console();
        let mut editor = Scripted {
            keys: VecDeque::from([key(KeyCode::Char('x')), ctrl('c')]),
            between: Box::new(|_| {}),
        };
        let err = console.read_line(&mut editor, "> ").unwrap_err();
        assert!(matches!(err, ConsoleError::UserInterrupt));
        assert!(err.is_interrupt());
        // The abandoned prompt line is still committed.
        assert_eq!(console.tail(), 2);
    }

    #[test]
    fn interrupt_flag_ends_pending_read() {
        let (console, _) = console();
        let mut editor = CrosstermEditor::new();
        let interrupt = editor.interrupt_handle();
        let prompt = prompt_on(&console);

        let mut polls = 0;
        let err = editor
            .read_events(&prompt, || {
                polls += 1;
                match polls {
                    1 => Ok(Some(Event::Key(key(KeyCode::Char('l'))))),
                    // Another thread asks for shutdown while nothing is typed.
                    2 => {
                        interrupt.store(true, Ordering::Release);
                        Ok(None)
                    }
                    _ => Ok(Some(Event::Key(key(KeyCode::Enter)))),
                }
            })
            .unwrap_err();

        assert!(matches!(err, ConsoleError::UserInterrupt));
        assert_eq!(polls, 2);
        assert!(!interrupt.load(Ordering::Acquire));
    }

    #[test]
    fn interrupt_raised_between_reads_ends_the_next_one() {
        let (console, _) = console();
        let mut editor = CrosstermEditor::new();
        editor.interrupt_handle().store(true, Ordering::Release);
        let prompt = prompt_on(&console);
        let mut events = typed_events("ok");

        let err = editor
            .read_events(&prompt, || Ok(events.pop_front()))
            .unwrap_err();
        assert!(matches!(err, ConsoleError::UserInterrupt));
        assert_eq!(events.len(), 3);

        // Consumed by the read it ended.
        let line = editor
            .read_events(&prompt, || Ok(events.pop_front()))
            .unwrap();
        assert_eq!(line, "ok");
    }

    #[test]
    fn prompt_can_carry_time_of_day() {
        let at = NaiveTime::from_hms_milli_opt(9, 5, 7, 42).unwrap();
        assert_eq!(timestamped("> ", at), "09:05:07.042 > ");

        let output = SharedBuffer::default();
        let config = ConsoleConfig::default().with_prompt_timestamp(true);
        let console = Console::new(output.clone(), config);
        let mut editor = Scripted::typing("hi", |_| {});
        assert_eq!(console.read_line(&mut editor, "> ").unwrap(), "hi");

        let lines = screen_lines(&output.bytes());
        let shown = &lines[0];
        assert_eq!(shown.len(), "00:00:00.000 > hi".len(), "{shown}");
        assert_eq!(&shown[2..3], ":");
        assert_eq!(&shown[8..9], ".");
        assert!(shown.ends_with(" > hi"), "{shown}");
    }
}
