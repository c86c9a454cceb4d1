use crate::harvest::Progress;
use core::fmt::{Debug, Formatter};
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinHandle;

/// Refresh rate for progress updates (10 Hz).
const REFRESH_INTERVAL: Duration = Duration::from_millis(100);

const BAR_WIDTH: usize = 25;

type CountedCallback = Box<dyn Fn() -> (u64, u64, String) + Send + Sync>;
type MessageCallback = Box<dyn Fn() -> String + Send + Sync>;

/// What the bar currently shows.
enum Readout {
    /// `(total, current, message)`, drawn as a filling bar
    Counted(CountedCallback),

    /// A message prefixed with the seconds since `started`
    Spinner { started: Instant, message: MessageCallback },
}

impl Readout {
    fn sample(&self) -> (u64, u64, String) {
        match self {
            Self::Counted(callback) => callback(),
            Self::Spinner { started, message } => (0, 0, format!("{}s: {}", started.elapsed().as_secs(), message())),
        }
    }
}

struct Shared {
    shown_after: Instant,
    shown: AtomicBool,
    readout: Mutex<Readout>,
}

/// A progress bar on stderr that stays hidden until an operation outlasts a delay.
pub struct ProgressReporter {
    bar: ProgressBar,
    shared: Arc<Shared>,
    ticker: JoinHandle<()>,
    colors: bool,
}

impl ProgressReporter {
    /// Create a new progress reporter. Must be called within a tokio runtime.
    #[must_use]
    pub fn new(delay: Duration, colors: bool) -> Self {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden());
        let shared = Arc::new(Shared {
            shown_after: Instant::now() + delay,
            shown: AtomicBool::new(false),
            readout: Mutex::new(Readout::Counted(Box::new(|| (0, 0, String::new())))),
        });

        Self {
            ticker: tokio::spawn(refresh(bar.clone(), Arc::clone(&shared))),
            bar,
            shared,
            colors,
        }
    }

    /// Create a reporter that uses colors when stderr is a terminal.
    #[must_use]
    pub fn for_stderr(delay: Duration) -> Self {
        use std::io::{IsTerminal, stderr};
        Self::new(delay, stderr().is_terminal())
    }

    fn template(&self, body: &str) -> String {
        let prefix = if self.colors { "{prefix:>12.bold.cyan}" } else { "{prefix:>12}" };
        format!("{prefix} [{body}] {{msg}}")
    }

    fn set_readout(&self, readout: Readout) {
        *self.shared.readout.lock().expect("lock poisoned") = readout;
    }
}

impl Progress for ProgressReporter {
    fn set_phase(&self, phase: &str) {
        self.bar.set_prefix(phase.to_string());
    }

    fn set_determinate(&self, callback: Box<dyn Fn() -> (u64, u64, String) + Send + Sync + 'static>) {
        self.set_readout(Readout::Counted(callback));
        self.bar.disable_steady_tick();
        self.bar.set_length(0);
        self.bar.set_position(0);
        self.bar.set_style(
            ProgressStyle::default_bar()
                .template(&self.template("{bar:25}"))
                .expect("could not create progress bar style")
                .progress_chars("=> "),
        );
    }

    fn set_indeterminate(&self, callback: Box<dyn Fn() -> String + Send + Sync + 'static>) {
        self.set_readout(Readout::Spinner {
            started: Instant::now(),
            message: callback,
        });

        let frames = bouncing_frames();
        let frame_refs: Vec<&str> = frames.iter().map(String::as_str).collect();
        self.bar.set_style(
            ProgressStyle::default_spinner()
                .template(&self.template("{spinner}"))
                .expect("could not create progress bar style")
                .tick_strings(&frame_refs),
        );
        self.bar.enable_steady_tick(REFRESH_INTERVAL);
    }

    fn done(&self) {
        self.ticker.abort();
        if self.shared.shown.load(Ordering::Relaxed) {
            self.bar.finish_and_clear();
        }
    }
}

impl Debug for ProgressReporter {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("shown", &self.shared.shown.load(Ordering::Relaxed))
            .field("colors", &self.colors)
            .finish_non_exhaustive()
    }
}

/// Spinner frames of a `===>` marker sweeping right and a `<===` marker sweeping back.
fn bouncing_frames() -> Vec<String> {
    const MARKER: usize = 4;
    let travel = BAR_WIDTH + MARKER;

    let right = (1..=travel).map(|pos| frame_at("===>", pos));
    let left = (0..travel).rev().map(|pos| frame_at("<===", pos));
    right.chain(left).collect()
}

/// Render `marker` starting `pos` cells to the left of the bar's right edge, clipped to the bar.
fn frame_at(marker: &str, pos: usize) -> String {
    let lead = marker.len();
    let padded = format!("{}{marker}{}", " ".repeat(pos), " ".repeat(BAR_WIDTH + lead));
    padded.chars().skip(lead).take(BAR_WIDTH).collect()
}

/// Reveal the bar once the delay has passed, then copy the readout into it on every tick.
async fn refresh(bar: ProgressBar, shared: Arc<Shared>) {
    let mut interval = tokio::time::interval(REFRESH_INTERVAL);
    #[expect(clippy::infinite_loop, reason = "task runs until aborted")]
    loop {
        let _ = interval.tick().await;

        if !shared.shown.load(Ordering::Relaxed) {
            if Instant::now() < shared.shown_after {
                continue;
            }
            shared.shown.store(true, Ordering::Relaxed);
            bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        }

        let (length, position, message) = shared.readout.lock().expect("lock poisoned").sample();
        if length > 0 {
            bar.set_length(length);
            bar.set_position(position);
        }
        bar.set_message(message);
    }
}
