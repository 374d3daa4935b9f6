use std::time::Duration;

/// Settings shared by every producer writing through a [`Console`](crate::Console).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    /// Prefix every emitted line with its zero-padded line number and the gutter.
    pub numbered: bool,
    pub label_width: usize,
    pub gutter: String,
    /// Text printed in front of the line editor's input.
    pub prompt: String,
    /// Put the wall-clock time in front of the prompt.
    pub prompt_timestamp: bool,
    /// Sleep quantum of progress bars measuring sub-second units.
    pub fine_tick: Duration,
    /// Colour log events by level.
    pub colored_levels: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            numbered: false,
            label_width: 2,
            gutter: "| ".to_string(),
            prompt: "> ".to_string(),
            prompt_timestamp: false,
            fine_tick: Duration::from_millis(50),
            colored_levels: true,
        }
    }
}

impl ConsoleConfig {
    pub fn with_numbered(mut self, numbered: bool) -> Self {
        self.numbered = numbered;
        self
    }

    pub fn with_label_width(mut self, label_width: usize) -> Self {
        self.label_width = label_width;
        self
    }

    pub fn with_gutter(mut self, gutter: impl Into<String>) -> Self {
        self.gutter = gutter.into();
        self
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn with_prompt_timestamp(mut self, prompt_timestamp: bool) -> Self {
        self.prompt_timestamp = prompt_timestamp;
        self
    }

    pub fn with_fine_tick(mut self, fine_tick: Duration) -> Self {
        self.fine_tick = fine_tick;
        self
    }

    pub fn with_colored_levels(mut self, colored_levels: bool) -> Self {
        self.colored_levels = colored_levels;
        self
    }
}
