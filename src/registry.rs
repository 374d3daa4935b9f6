/// Identifier of a logical line ever emitted. The first line is 1.
pub type LineNumber = u64;

/// Where a write lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Continue at the end of committed output.
    Append,
    /// Rewrite a line that was handed out earlier.
    Line(LineNumber),
}

/// Bookkeeping of the virtual cursor. Pure arithmetic, no I/O and no locking:
/// it is only ever touched from inside the writer's critical section.
///
/// Invariant: `1 <= cursor <= tail`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRegistry {
    tail: LineNumber,
    cursor: LineNumber,
    tail_dirty: bool,
}

impl Default for LineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LineRegistry {
    pub fn new() -> Self {
        Self {
            tail: 1,
            cursor: 1,
            tail_dirty: false,
        }
    }

    pub fn tail(&self) -> LineNumber {
        self.tail
    }

    pub fn cursor(&self) -> LineNumber {
        self.cursor
    }

    /// Whether the tail line holds text that has not been terminated yet.
    pub fn is_tail_dirty(&self) -> bool {
        self.tail_dirty
    }

    pub fn set_tail_dirty(&mut self, dirty: bool) {
        self.tail_dirty = dirty;
    }

    /// Hands out the next line and makes it the tail.
    pub fn allocate(&mut self) -> LineNumber {
        self.tail += 1;
        self.tail_dirty = false;
        self.tail
    }

    /// Signed distance from the cursor to `target`; positive means down.
    pub fn delta(&self, target: LineNumber) -> i64 {
        target as i64 - self.cursor as i64
    }

    pub fn advance(&mut self, line_breaks: u64) {
        self.tail += line_breaks;
    }

    /// Records where the real cursor ended up, growing the tail if the cursor
    /// went past it.
    pub fn place_cursor(&mut self, line: LineNumber) {
        let line = line.max(1);
        if line > self.tail {
            self.tail = line;
            self.tail_dirty = false;
        }
        self.cursor = line;
    }

    /// The line `offset` lines away from the cursor, clamped to `[1, tail]`.
    pub fn shift(&self, offset: i64) -> LineNumber {
        let target = (self.cursor as i64).saturating_add(offset);
        target.clamp(1, self.tail as i64) as LineNumber
    }

    pub fn resolve(&self, target: Target) -> LineNumber {
        match target {
            Target::Append => self.tail,
            Target::Line(line) => line,
        }
    }

    pub fn contains(&self, line: LineNumber) -> bool {
        (1..=self.tail).contains(&line)
    }
}
