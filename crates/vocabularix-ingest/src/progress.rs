//! Per-source progress reporting
//!
//! One bar per source: bytes received against the advertised length, elapsed
//! time and the running count of processed records. When progress display is
//! disabled the bar is hidden but the counters keep working, so the run
//! summary always has numbers.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const BAR_TEMPLATE: &str =
    "{prefix} [{wide_bar:.cyan/blue}] {percent}% Elapsed {elapsed_precise} {msg}";
const UNSIZED_TEMPLATE: &str = "{prefix} {spinner:.green} {bytes} Elapsed {elapsed_precise} {msg}";

/// Progress of one source, shared by the pipeline stages
#[derive(Debug, Clone)]
pub struct Progress {
    bar: ProgressBar,
    bytes: Arc<AtomicU64>,
    records: Arc<AtomicU64>,
}

impl Progress {
    pub fn new(label: &str, total_bytes: Option<u64>, visible: bool) -> Self {
        let target = if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };

        let (bar, template) = match total_bytes {
            Some(total) => (ProgressBar::with_draw_target(Some(total), target), BAR_TEMPLATE),
            None => (ProgressBar::with_draw_target(None, target), UNSIZED_TEMPLATE),
        };
        let style = ProgressStyle::default_bar()
            .template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        bar.set_style(style);
        bar.set_prefix(label.to_string());
        bar.set_message("Processed 0");

        Self {
            bar,
            bytes: Arc::new(AtomicU64::new(0)),
            records: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Counters only, nothing is drawn
    pub fn hidden() -> Self {
        Self::new("", None, false)
    }

    /// A chunk of `len` compressed bytes arrived
    pub fn add_bytes(&self, len: u64) {
        let total = self.bytes.fetch_add(len, Ordering::Relaxed) + len;
        self.bar.set_position(total);
        self.bar
            .set_message(format!("Processed {}", self.records.load(Ordering::Relaxed)));
    }

    pub fn add_record(&self) {
        self.records.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    pub fn finish(&self) {
        self.bar.finish_with_message(format!("Processed {}", self.records()));
    }

    /// Leave the bar where it stopped
    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

/// Format bytes into human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
