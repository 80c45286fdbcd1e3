//! Progress protocol: structured events sent to the sandbox host.
//!
//! The host learns everything about a run from a stream of
//! [`ProgressEvent`]s, one per completed step, each carrying a failure flag,
//! a human-readable message and an integer percentage. The production
//! reporter ([`JsonLinesReporter`]) writes one JSON object per line to
//! stdout and flushes after every event so the host sees it immediately.
//!
//! Stages never emit events directly; they go through a [`ProgressTracker`],
//! which owns the running percentage and guarantees it never decreases.
//!
//! # Example
//!
//! ```rust
//! use pixelwash::{ProgressEvent, ProgressReporter};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct Collect(Mutex<Vec<ProgressEvent>>);
//!
//! impl ProgressReporter for Collect {
//!     fn report(&self, event: &ProgressEvent) {
//!         self.0.lock().unwrap().push(event.clone());
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// One progress update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// `true` only on the single terminal event of a failed run.
    pub error: bool,
    /// Human-readable description of the step.
    pub text: String,
    /// Integer percentage in `[0, 100]`.
    pub percentage: u8,
}

/// Receives progress events as the pipeline advances.
///
/// Implementations must be `Send + Sync` so a reporter can be shared with
/// the host-facing side of the process.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

/// Writes each event as a JSON line to the wrapped writer, flushing every time.
pub struct JsonLinesReporter<W: Write + Send> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Recover the writer, e.g. to inspect what was written.
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl JsonLinesReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ProgressReporter for JsonLinesReporter<W> {
    fn report(&self, event: &ProgressEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                warn!("Could not serialise progress event: {e}");
                return;
            }
        };
        let mut out = match self.out.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // A host that stopped reading is not a reason to abort the conversion.
        if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            warn!("Could not write progress event: {e}");
        }
    }
}

/// Discards every event.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: &ProgressEvent) {}
}

/// Convenience alias for the shared reporter handle.
pub type Reporter = Arc<dyn ProgressReporter>;

/// Running percentage for one phase, plus the channel events go out on.
pub struct ProgressTracker {
    reporter: Reporter,
    percentage: f64,
    last_text: String,
}

impl ProgressTracker {
    pub fn new(reporter: Reporter, start: f64) -> Self {
        Self {
            reporter,
            percentage: start.clamp(0.0, 100.0),
            last_text: String::new(),
        }
    }

    /// Current internal (fractional) percentage.
    pub fn percentage(&self) -> f64 {
        self.percentage
    }

    /// Text of the most recent event, empty if none was sent.
    pub fn last_text(&self) -> &str {
        &self.last_text
    }

    /// Percentage as reported: truncated toward zero, clamped to `[0, 100]`.
    pub fn reported(&self) -> u8 {
        self.percentage.clamp(0.0, 100.0) as u8
    }

    /// Move forward by a fixed number of points.
    pub fn advance(&mut self, points: f64) {
        self.set(self.percentage + points);
    }

    /// Jump to an absolute value. Values below the current one are ignored.
    pub fn set(&mut self, percentage: f64) {
        let next = percentage.clamp(0.0, 100.0);
        if next > self.percentage {
            self.percentage = next;
        }
    }

    /// Position after `done` of `total` pages in a span of `span` points
    /// starting at `start`.
    ///
    /// Equivalent to accumulating `span / total` per page, without the
    /// floating-point drift that would leave a 7-page run at 49.999…%.
    pub fn set_page_fraction(&mut self, start: f64, span: f64, done: usize, total: usize) {
        if total == 0 {
            return;
        }
        self.set(start + span * done as f64 / total as f64);
    }

    /// Emit a normal progress event at the current percentage.
    pub fn step(&mut self, text: impl Into<String>) {
        let event = ProgressEvent {
            error: false,
            text: text.into(),
            percentage: self.reported(),
        };
        info!("[{:>3}%] {}", event.percentage, event.text);
        self.reporter.report(&event);
        self.last_text = event.text;
    }

    /// Emit the terminal failure event at the current percentage.
    pub fn fail(&mut self, text: impl Into<String>) {
        let event = ProgressEvent {
            error: true,
            text: text.into(),
            percentage: self.reported(),
        };
        warn!("[{:>3}%] {}", event.percentage, event.text);
        self.reporter.report(&event);
        self.last_text = event.text;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collect(Mutex<Vec<ProgressEvent>>);

    impl ProgressReporter for Collect {
        fn report(&self, event: &ProgressEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn json_line_shape() {
        let r = JsonLinesReporter::new(Vec::new());
        r.report(&ProgressEvent {
            error: false,
            text: "Compressing PDF".into(),
            percentage: 97,
        });
        let out = String::from_utf8(r.into_inner()).unwrap();
        assert_eq!(
            out,
            "{\"error\":false,\"text\":\"Compressing PDF\",\"percentage\":97}\n"
        );
    }

    #[test]
    fn event_round_trips_through_json() {
        let line = r#"{"error":true,"text":"boom","percentage":3}"#;
        let ev: ProgressEvent = serde_json::from_str(line).unwrap();
        assert!(ev.error);
        assert_eq!(ev.percentage, 3);
    }

    #[test]
    fn reported_percentage_truncates() {
        let mut t = ProgressTracker::new(Arc::new(NoopReporter), 5.0);
        t.advance(45.0 / 7.0);
        assert_eq!(t.reported(), 11);
        t.set_page_fraction(5.0, 45.0, 7, 7);
        assert_eq!(t.reported(), 50);
        assert_eq!(t.percentage(), 50.0);
    }

    #[test]
    fn tracker_never_goes_backwards() {
        let mut t = ProgressTracker::new(Arc::new(NoopReporter), 50.0);
        t.set(20.0);
        assert_eq!(t.reported(), 50);
        t.advance(80.0);
        assert_eq!(t.reported(), 100);
    }

    #[test]
    fn page_fraction_ignores_zero_total() {
        let mut t = ProgressTracker::new(Arc::new(NoopReporter), 5.0);
        t.set_page_fraction(5.0, 45.0, 0, 0);
        assert_eq!(t.reported(), 5);
    }

    #[test]
    fn step_and_fail_reach_reporter() {
        let collect = Arc::new(Collect::default());
        let mut t = ProgressTracker::new(collect.clone(), 0.0);
        t.step("start");
        t.advance(3.0);
        t.fail("broken");
        assert_eq!(t.last_text(), "broken");
        let events = collect.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ProgressEvent { error: false, text: "start".into(), percentage: 0 });
        assert_eq!(events[1], ProgressEvent { error: true, text: "broken".into(), percentage: 3 });
    }
}
