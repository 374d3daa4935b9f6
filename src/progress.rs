//! Time-based progress bars that each own one line of the console.
//!
//! A bar is drawn from a [`ProgressPool`], started with a header, and then
//! redrawn in place by its own ticking task until its duration runs out or it
//! is finished. Finished bars go back to the pool and are reused.

use crate::console::Console;
use crate::error::{ConsoleError, Result};
use crate::registry::LineNumber;
use crate::writer::WriteRequest;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

/// Number of fill characters in a full bar.
const BAR_WIDTH: u64 = 100;

/// The unit a bar counts progress in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Millis,
    Seconds,
    Minutes,
}

impl Granularity {
    pub fn unit(self) -> Duration {
        match self {
            Granularity::Millis => Duration::from_millis(1),
            Granularity::Seconds => Duration::from_secs(1),
            Granularity::Minutes => Duration::from_secs(60),
        }
    }

    /// Whole units contained in `elapsed`.
    pub fn units(self, elapsed: Duration) -> u64 {
        (elapsed.as_millis() / self.unit().as_millis()) as u64
    }

    /// How long the ticker sleeps between frames. Coarse units tick once per
    /// unit; milliseconds tick every `fine_tick`.
    pub fn tick(self, fine_tick: Duration) -> Duration {
        match self {
            Granularity::Millis => fine_tick,
            _ => self.unit(),
        }
    }
}

pub fn percent(current: u64, total: u64) -> u64 {
    if total == 0 {
        return 100;
    }
    (current.min(total) * 100 / total).min(100)
}

/// Estimated time left, extrapolated from the rate so far. `None` until
/// there is any progress.
pub fn eta(current: u64, total: u64, elapsed: Duration) -> Option<Duration> {
    if current == 0 {
        return None;
    }
    let remaining = total.saturating_sub(current) as u128;
    let millis = remaining * elapsed.as_millis() / current as u128;
    Some(Duration::from_millis(millis as u64))
}

pub fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        None => "N/A".to_string(),
        Some(eta) => {
            let secs = eta.as_secs();
            format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
        }
    }
}

/// One frame: ` 33% [=====>     ]  1/3, ETA: 00:00:02 `.
///
/// Percent and counter are padded to fixed widths so the frame does not
/// jitter as digits are added.
pub fn render(current: u64, total: u64, elapsed: Duration) -> String {
    let current = current.min(total);
    let filled = percent(current, total) * BAR_WIDTH / 100;
    let width = total.to_string().len();
    format!(
        " {:>3}% [{}>{}] {:>width$}/{}, ETA: {} ",
        percent(current, total),
        "=".repeat(filled as usize),
        " ".repeat((BAR_WIDTH - filled) as usize),
        current,
        total,
        format_eta(eta(current, total, elapsed)),
        width = width
    )
}

/// Draws a frame for progress that is driven from outside, e.g. a value
/// polled from another system, on a line the caller owns.
pub fn print_progress(
    console: &Console,
    line: LineNumber,
    elapsed: Duration,
    total: u64,
    current: u64,
) -> Result<()> {
    let frame = render(current, total, elapsed);
    console.write(&WriteRequest::at(line, &frame).prefix("\r"))?;
    Ok(())
}

/// A reusable progress bar. Obtain one from [`ProgressPool`].
pub struct ProgressBar {
    id: usize,
    console: Arc<Console>,
    duration: Duration,
    granularity: Granularity,
    owner_line: LineNumber,
    started: Instant,
    finished: Arc<AtomicBool>,
    wake: Arc<Notify>,
    ticker: Option<JoinHandle<()>>,
}

impl ProgressBar {
    fn new(id: usize, console: Arc<Console>) -> Self {
        Self {
            id,
            console,
            duration: Duration::ZERO,
            granularity: Granularity::Seconds,
            owner_line: 0,
            started: Instant::now(),
            finished: Arc::new(AtomicBool::new(true)),
            wake: Arc::new(Notify::new()),
            ticker: None,
        }
    }

    fn arm(&mut self, duration: Duration, granularity: Granularity) {
        self.duration = duration;
        self.granularity = granularity;
    }

    /// Stable identity of the pooled instance.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Whether the ticking task is still alive.
    pub fn is_ticking(&self) -> bool {
        self.ticker
            .as_ref()
            .is_some_and(|ticker| !ticker.is_finished())
    }

    /// The line this bar draws on, 0 before the first start.
    pub fn owner_line(&self) -> LineNumber {
        self.owner_line
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Prints `header` on a fresh line, claims the line the cursor ends up on
    /// and spawns the ticking task on `runtime`.
    pub fn start(&mut self, header: &str, runtime: &Handle) -> Result<()> {
        if !self.is_finished() {
            return Err(ConsoleError::illegal_state(format!(
                "progress bar #{} is still running",
                self.id
            )));
        }
        let total = self.granularity.units(self.duration);
        self.owner_line = self
            .console
            .claim_line(header, &render(0, total, Duration::ZERO));
        self.started = Instant::now();
        self.wake = Arc::new(Notify::new());
        self.finished.store(false, Ordering::Release);

        let ticker = Ticker {
            console: self.console.clone(),
            line: self.owner_line,
            started: self.started,
            duration: self.duration,
            granularity: self.granularity,
            tick: self.granularity.tick(self.console.config().fine_tick),
            finished: self.finished.clone(),
            wake: self.wake.clone(),
        };
        self.ticker = Some(runtime.spawn(ticker.run()));
        log::trace!("progress bar #{} started on line {}", self.id, self.owner_line);
        Ok(())
    }

    /// Stops the ticker and waits until it has exited, so a later reuse can
    /// never receive a stray frame. Then draws the final frame and releases
    /// the line into history.
    pub async fn finish(&mut self) {
        self.finished.store(true, Ordering::Release);
        self.wake.notify_one();
        let Some(ticker) = self.ticker.take() else {
            return;
        };
        if let Err(err) = ticker.await {
            log::debug!("progress bar #{} ticker ended abnormally: {err}", self.id);
        }
        let total = self.granularity.units(self.duration);
        let _ = print_progress(&self.console, self.owner_line, self.duration, total, total);
        self.console.next_line();
    }
}

impl Drop for ProgressBar {
    fn drop(&mut self) {
        // A bar dropped while running must not leave its ticker drawing.
        self.finished.store(true, Ordering::Release);
        self.wake.notify_one();
    }
}

/// State owned by the ticking task while the bar runs.
struct Ticker {
    console: Arc<Console>,
    line: LineNumber,
    started: Instant,
    duration: Duration,
    granularity: Granularity,
    tick: Duration,
    finished: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl Ticker {
    async fn run(self) {
        let deadline = self.started + self.duration;
        loop {
            if self.finished.load(Ordering::Acquire) {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            self.draw(now - self.started);
            // A wake-up only means "look at the flag again".
            tokio::select! {
                _ = time::sleep(self.tick) => {}
                _ = self.wake.notified() => {}
            }
        }
        self.draw(self.duration);
    }

    fn draw(&self, elapsed: Duration) {
        let total = self.granularity.units(self.duration);
        let current = self.granularity.units(elapsed);
        if let Err(err) = print_progress(&self.console, self.line, elapsed, total, current) {
            log::debug!("progress frame dropped: {err}");
        }
    }
}

/// Hands out idle bars, creating new ones only when every existing bar is
/// in use.
pub struct ProgressPool {
    console: Arc<Console>,
    runtime: Handle,
    idle: Mutex<Vec<ProgressBar>>,
    created: AtomicUsize,
}

impl ProgressPool {
    pub fn new(console: Arc<Console>, runtime: Handle) -> Self {
        Self {
            console,
            runtime,
            idle: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
        }
    }

    pub fn acquire(&self, duration: Duration, granularity: Granularity) -> ProgressBar {
        let idle = self.idle.lock().pop();
        let mut bar = idle.unwrap_or_else(|| {
            let id = self.created.fetch_add(1, Ordering::Relaxed);
            log::debug!("creating progress bar #{id}");
            ProgressBar::new(id, self.console.clone())
        });
        bar.arm(duration, granularity);
        bar
    }

    pub fn start(
        &self,
        duration: Duration,
        granularity: Granularity,
        header: &str,
    ) -> Result<ProgressBar> {
        let mut bar = self.acquire(duration, granularity);
        bar.start(header, &self.runtime)?;
        Ok(bar)
    }

    /// Finishes `bar` and returns it to the pool.
    pub async fn finish(&self, mut bar: ProgressBar) {
        bar.finish().await;
        self.idle.lock().push(bar);
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    /// Number of distinct bars this pool has ever created.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}
