//! Error types for the console core.
//!
//! Output-side I/O failures never show up here: the writer reports them on
//! its fallback stream and carries on.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsoleError {
    /// The caller used an object in a state that does not allow the call,
    /// e.g. starting a progress bar that is already running.
    #[error("illegal state: {message}")]
    IllegalState { message: String },

    /// The blocking read was interrupted (Ctrl-C or the shared interrupt flag).
    #[error("interrupted by user")]
    UserInterrupt,

    /// Ctrl-D on an empty input line.
    #[error("end of input")]
    EndOfInput,

    /// Reading keyboard input or switching terminal modes failed.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConsoleError>;

impl ConsoleError {
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether this is the control-flow signal the command loop should turn
    /// into an orderly shutdown rather than report.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::UserInterrupt | Self::EndOfInput)
    }
}
