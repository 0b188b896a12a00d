use crate::import::ProgressSink;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Terminal progress bar over an import batch.
///
/// Hidden when stdout is not a terminal, so piped runs stay quiet.
pub struct ImportProgress {
    pb: ProgressBar,
}

impl ImportProgress {
    pub fn new() -> Self {
        Self {
            pb: ProgressBar::hidden(),
        }
    }
}

impl Default for ImportProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ImportProgress {
    fn begin(&mut self, total: usize) {
        self.pb = if console::Term::stdout().is_term() {
            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            pb
        } else {
            ProgressBar::hidden()
        };
    }

    fn advance(&mut self, label: &str) {
        self.pb.inc(1);
        self.pb.set_message(label.to_string());
    }

    fn finish(&mut self) {
        self.pb.finish_and_clear();
    }
}

pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_message(message.to_string());
        if console::Term::stdout().is_term() {
            pb.enable_steady_tick(Duration::from_millis(100));
        }
        Self { pb }
    }

    pub fn finish_with_message(&self, msg: &str) {
        self.pb.finish_with_message(msg.to_string());
    }
}
