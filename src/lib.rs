/*!
Several producers share one terminal: a blocking prompt, ticking progress
bars, and log events arriving from any thread.

A terminal has no random access to lines, only relative cursor moves from
wherever the cursor is now. So every write goes through one lock that covers
the whole job:
    resolve the target line against the registry (tail / cursor)
    emit the relative move, then the bytes
    record where the cursor ended up
Producers remember the line numbers they were handed and address them later;
the registry turns that into `CSI n A` / `CSI n B`.

Known limitation: nothing notices when the viewport scrolls past a line that
is still owned. Rewrites of such a line land in the wrong place.
*/
mod config;
mod console;
mod error;
mod line_editor;
mod log_sink;
mod progress;
mod registry;
mod writer;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod vte_actions;

pub use config::ConsoleConfig;
pub use console::Console;
pub use error::{ConsoleError, Result};
pub use line_editor::{
    apply_key, timestamped, CrosstermEditor, KeyOutcome, LineEditor, PromptLine,
};
pub use log_sink::{render_record, ConsoleLogger, LogEventSink};
pub use progress::{
    eta, format_eta, percent, print_progress, render, Granularity, ProgressBar, ProgressPool,
};
pub use registry::{LineNumber, LineRegistry, Target};
pub use writer::{TerminalWriter, WriteRequest};
