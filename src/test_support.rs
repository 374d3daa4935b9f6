use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

const SCREEN_ROWS: u16 = 60;
const SCREEN_COLS: u16 = 200;

/// A sink whose bytes stay readable after it has been boxed into a console.
#[derive(Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn bytes(&self) -> Vec<u8> {
        self.0.lock().clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A terminal that has gone away.
pub struct BrokenSink;

impl Write for BrokenSink {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Visible rows after feeding `bytes` to a virtual terminal, trailing blanks
/// removed.
pub fn screen_lines(bytes: &[u8]) -> Vec<String> {
    let mut parser = vt100::Parser::new(SCREEN_ROWS, SCREEN_COLS, 0);
    parser.process(bytes);
    let mut lines: Vec<String> = parser
        .screen()
        .rows(0, SCREEN_COLS)
        .map(|row| row.trim_end().to_string())
        .collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}

pub fn screen(bytes: &[u8]) -> String {
    screen_lines(bytes).join("\n")
}
